//! Reviews of a title, nested under `/titles/{title_id}/reviews`.
//!
//! Anybody can read reviews, any authenticated user can write one review per
//! title. Only the author, moderators and admins can change or remove it.

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::get,
    Json,
};
use http::StatusCode;
use tracing::debug;
use yamdb_dal::{
    review::{CreateReview, Review, ReviewRepository, UpdateReview},
    title::TitleRepository,
};
use yamdb_types::{
    claim::Principal,
    policy::{check, Action, Resource, Scope},
};

use crate::{
    auth::access::AccessLayer,
    error::{ApiError, ApiResult},
    rest_api::{Page, Paging},
    state::AppState,
    validate::Valid,
};

crate::repository_from_request!(ReviewRepository);

pub(crate) async fn ensure_title(titles: &TitleRepository, title_id: i64) -> ApiResult<()> {
    if titles.exists(title_id).await? {
        Ok(())
    } else {
        Err(ApiError::ResourceNotFound("Title".to_string()))
    }
}

fn check_owner(principal: &Principal, action: Action, review: &Review) -> ApiResult<()> {
    let resource = Resource::Owned {
        scope: Scope::Reviews,
        author_id: review.author_id,
    };
    check(Some(principal), action, &resource)?;
    Ok(())
}

#[cfg_attr(feature = "openapi",  utoipa::path(get, path = "", tag = "Reviews", operation_id = "listReviews",
    params(Paging), responses((status = StatusCode::OK, description = "List paginated", body = Page<Review>))))]
pub async fn list(
    Path(title_id): Path<i64>,
    titles: TitleRepository,
    repository: ReviewRepository,
    State(state): State<AppState>,
    Valid(Query(paging)): Valid<Query<Paging>>,
) -> ApiResult<impl IntoResponse> {
    ensure_title(&titles, title_id).await?;
    let default_page_size = state.config().default_page_size;
    let page_size = paging.page_size(default_page_size);
    let listing_params = paging.into_listing_params(default_page_size)?;
    let batch = repository.list(title_id, listing_params).await?;
    Ok((StatusCode::OK, Json(Page::from_batch(batch, page_size)?)))
}

#[cfg_attr(feature = "openapi",  utoipa::path(post, path = "", tag = "Reviews", operation_id = "createReview",
    request_body = CreateReview,
    responses((status = StatusCode::CREATED, description = "Created Review", body = Review))))]
pub async fn create(
    Path(title_id): Path<i64>,
    principal: Principal,
    titles: TitleRepository,
    repository: ReviewRepository,
    Valid(Json(payload)): Valid<Json<CreateReview>>,
) -> ApiResult<impl IntoResponse> {
    ensure_title(&titles, title_id).await?;
    if repository.exists_for(title_id, principal.id).await? {
        debug!(
            "User {} already reviewed title {title_id}",
            principal.username
        );
        return Err(ApiError::Validation(
            "You have already reviewed this title".to_string(),
        ));
    }
    let record = repository.create(title_id, principal.id, payload).await?;

    Ok((StatusCode::CREATED, Json(record)))
}

#[cfg_attr(feature = "openapi",  utoipa::path(get, path = "/{review_id}", tag = "Reviews", operation_id = "getReview",
    responses((status = StatusCode::OK, description = "Get one", body = Review))))]
pub async fn get_review(
    Path((title_id, review_id)): Path<(i64, i64)>,
    titles: TitleRepository,
    repository: ReviewRepository,
) -> ApiResult<impl IntoResponse> {
    ensure_title(&titles, title_id).await?;
    let record = repository.get(title_id, review_id).await?;

    Ok((StatusCode::OK, Json(record)))
}

#[cfg_attr(feature = "openapi",  utoipa::path(patch, path = "/{review_id}", tag = "Reviews", operation_id = "updateReview",
    request_body = UpdateReview,
    responses((status = StatusCode::OK, description = "Updated Review", body = Review))))]
pub async fn update(
    Path((title_id, review_id)): Path<(i64, i64)>,
    principal: Principal,
    titles: TitleRepository,
    repository: ReviewRepository,
    Valid(Json(payload)): Valid<Json<UpdateReview>>,
) -> ApiResult<impl IntoResponse> {
    ensure_title(&titles, title_id).await?;
    let review = repository.get(title_id, review_id).await?;
    check_owner(&principal, Action::Update, &review)?;
    let record = repository.update(title_id, review_id, payload).await?;

    Ok((StatusCode::OK, Json(record)))
}

#[cfg_attr(feature = "openapi",  utoipa::path(delete, path = "/{review_id}", tag = "Reviews", operation_id = "deleteReview",
    responses((status = StatusCode::NO_CONTENT, description = "Deleted with its comments"))))]
pub async fn delete(
    Path((title_id, review_id)): Path<(i64, i64)>,
    principal: Principal,
    titles: TitleRepository,
    repository: ReviewRepository,
) -> ApiResult<impl IntoResponse> {
    ensure_title(&titles, title_id).await?;
    let review = repository.get(title_id, review_id).await?;
    check_owner(&principal, Action::Delete, &review)?;
    repository.delete(title_id, review_id).await?;

    Ok((StatusCode::NO_CONTENT, ()))
}

#[cfg(feature = "openapi")]
#[derive(utoipa::OpenApi)]
#[openapi(paths(list, create, get_review, update, delete))]
struct ModuleDocs;

#[cfg(feature = "openapi")]
pub fn api_docs() -> utoipa::openapi::OpenApi {
    use utoipa::OpenApi as _;
    ModuleDocs::openapi()
}

/// Must be nested on `/titles/{title_id}/reviews`
pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route("/", get(list).post(create))
        .route("/{review_id}", get(get_review).patch(update).delete(delete))
        .route_layer(AccessLayer::new(Scope::Reviews))
}
