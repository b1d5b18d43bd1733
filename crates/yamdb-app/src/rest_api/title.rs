use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::get,
    Json,
};
use garde::Validate;
use http::StatusCode;
use serde::Deserialize;
use yamdb_dal::title::{CreateTitle, TitleFilter, TitleRepository, UpdateTitle};
use yamdb_types::policy::Scope;

use crate::{
    auth::access::AccessLayer,
    error::ApiResult,
    rest_api::{Page, Paging},
    state::AppState,
    validate::Valid,
};

crate::repository_from_request!(TitleRepository);

/// Filters for titles listing, genre and category are slugs
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[cfg_attr(feature = "openapi", derive(utoipa::IntoParams))]
#[cfg_attr(feature = "openapi", into_params(parameter_in = Query))]
pub struct TitleQuery {
    #[garde(length(min = 1, max = 50))]
    pub genre: Option<String>,
    #[garde(length(min = 1, max = 50))]
    pub category: Option<String>,
    #[garde(skip)]
    pub year: Option<i32>,
    #[garde(length(min = 1, max = 100))]
    pub name: Option<String>,
}

impl From<TitleQuery> for TitleFilter {
    fn from(value: TitleQuery) -> Self {
        TitleFilter {
            genre: value.genre,
            category: value.category,
            year: value.year,
            name: value.name,
        }
    }
}

#[cfg_attr(feature = "openapi",  utoipa::path(get, path = "", tag = "Titles", operation_id = "listTitles",
    params(Paging, TitleQuery), responses((status = StatusCode::OK, description = "List paginated", body = Page<yamdb_dal::title::Title>))))]
pub async fn list(
    repository: TitleRepository,
    State(state): State<AppState>,
    Valid(Query(paging)): Valid<Query<Paging>>,
    Valid(Query(query)): Valid<Query<TitleQuery>>,
) -> ApiResult<impl IntoResponse> {
    let default_page_size = state.config().default_page_size;
    let page_size = paging.page_size(default_page_size);
    let listing_params = paging.into_listing_params(default_page_size)?;
    let batch = repository.list(listing_params, query.into()).await?;
    Ok((StatusCode::OK, Json(Page::from_batch(batch, page_size)?)))
}

#[cfg_attr(feature = "openapi",  utoipa::path(post, path = "", tag = "Titles", operation_id = "createTitle",
    request_body = CreateTitle,
    responses((status = StatusCode::CREATED, description = "Created Title", body = yamdb_dal::title::Title))))]
pub async fn create(
    repository: TitleRepository,
    Valid(Json(payload)): Valid<Json<CreateTitle>>,
) -> ApiResult<impl IntoResponse> {
    let record = repository.create(payload).await?;

    Ok((StatusCode::CREATED, Json(record)))
}

#[cfg_attr(feature = "openapi",  utoipa::path(get, path = "/{title_id}", tag = "Titles", operation_id = "getTitle",
    responses((status = StatusCode::OK, description = "Get one", body = yamdb_dal::title::Title))))]
pub async fn get_title(
    Path(title_id): Path<i64>,
    repository: TitleRepository,
) -> ApiResult<impl IntoResponse> {
    let record = repository.get(title_id).await?;

    Ok((StatusCode::OK, Json(record)))
}

#[cfg_attr(feature = "openapi",  utoipa::path(patch, path = "/{title_id}", tag = "Titles", operation_id = "updateTitle",
    request_body = UpdateTitle,
    responses((status = StatusCode::OK, description = "Updated Title", body = yamdb_dal::title::Title))))]
pub async fn update(
    Path(title_id): Path<i64>,
    repository: TitleRepository,
    Valid(Json(payload)): Valid<Json<UpdateTitle>>,
) -> ApiResult<impl IntoResponse> {
    let record = repository.update(title_id, payload).await?;

    Ok((StatusCode::OK, Json(record)))
}

#[cfg_attr(feature = "openapi",  utoipa::path(delete, path = "/{title_id}", tag = "Titles", operation_id = "deleteTitle",
    responses((status = StatusCode::NO_CONTENT, description = "Deleted with its reviews and comments"))))]
pub async fn delete(
    Path(title_id): Path<i64>,
    repository: TitleRepository,
) -> ApiResult<impl IntoResponse> {
    repository.delete(title_id).await?;

    Ok((StatusCode::NO_CONTENT, ()))
}

#[cfg(feature = "openapi")]
#[derive(utoipa::OpenApi)]
#[openapi(paths(list, create, get_title, update, delete))]
struct ModuleDocs;

#[cfg(feature = "openapi")]
pub fn api_docs() -> utoipa::openapi::OpenApi {
    use utoipa::OpenApi as _;
    ModuleDocs::openapi()
}

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route("/", get(list).post(create))
        .route("/{title_id}", get(get_title).patch(update).delete(delete))
        .route_layer(AccessLayer::new(Scope::Titles))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_query() {
        let query = TitleQuery {
            genre: Some("drama".into()),
            year: Some(1999),
            ..Default::default()
        };
        assert!(query.validate().is_ok());
        let filter: TitleFilter = query.into();
        assert_eq!(filter.genre.as_deref(), Some("drama"));
        assert_eq!(filter.year, Some(1999));
        assert!(filter.category.is_none());

        let bad = TitleQuery {
            name: Some(String::new()),
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }
}
