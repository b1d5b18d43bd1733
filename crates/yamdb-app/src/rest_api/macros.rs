/// Handlers and router for reference entities addressed by slug
/// (list with paging and name search, create, delete)
#[macro_export]
macro_rules! slug_api {
    ($entity:ident, $tag:literal, $scope:ident) => {
        type EntityRepository = paste::paste! {[<$entity Repository>]};
        crate::repository_from_request!(EntityRepository);

        pub mod crud_api {
            use super::*;
            use crate::error::ApiResult;
            use crate::rest_api::{Page, Paging, SearchQuery};
            use crate::state::AppState;
            use axum::{
                extract::{Path, Query, State},
                response::IntoResponse,
                Json,
            };
            use $crate::validate::Valid;
            use http::StatusCode;

            type CreateEntity = paste::paste! {[<Create $entity>]};

            #[cfg_attr(feature = "openapi",  utoipa::path(get, path = "", tag = $tag, operation_id = concat!("list", stringify!($entity)),
            params(Paging, SearchQuery), responses((status = StatusCode::OK, description = "List paginated", body = crate::rest_api::Page<$entity>))))]
            pub async fn list(
                repository: EntityRepository,
                State(state): State<AppState>,
                Valid(Query(paging)): Valid<Query<Paging>>,
                Valid(Query(query)): Valid<Query<SearchQuery>>,
            ) -> ApiResult<impl IntoResponse> {
                let default_page_size = state.config().default_page_size;
                let page_size = paging.page_size(default_page_size);
                let listing_params = paging.into_listing_params(default_page_size)?;
                let batch = repository
                    .list(listing_params, query.search.as_deref())
                    .await?;
                Ok((StatusCode::OK, Json(Page::from_batch(batch, page_size)?)))
            }

            #[cfg_attr(feature = "openapi",  utoipa::path(post, path = "", tag = $tag, operation_id = concat!("create", stringify!($entity)),
            request_body = CreateEntity,
            responses((status = StatusCode::CREATED, description = concat!("Created ", stringify!($entity)), body = $entity))))]
            pub async fn create(
                repository: EntityRepository,
                Valid(Json(payload)): Valid<Json<CreateEntity>>,
            ) -> ApiResult<impl IntoResponse> {
                let record = repository.create(payload).await?;

                Ok((StatusCode::CREATED, Json(record)))
            }

            #[cfg_attr(feature = "openapi",  utoipa::path(delete, path = "/{slug}", tag = $tag, operation_id = concat!("delete", stringify!($entity)),
            responses((status = StatusCode::NO_CONTENT, description = "Deleted successfully"))))]
            pub async fn delete(
                Path(slug): Path<String>,
                repository: EntityRepository,
            ) -> ApiResult<impl IntoResponse> {
                repository.delete(&slug).await?;

                Ok((StatusCode::NO_CONTENT, ()))
            }

            #[cfg(feature = "openapi")]
            #[derive(utoipa::OpenApi)]
            #[openapi(paths(list, create, delete))]
            struct ApiDocs;

            #[cfg(feature = "openapi")]
            pub(super) fn api_docs() -> utoipa::openapi::OpenApi {
                use utoipa::OpenApi as _;
                ApiDocs::openapi()
            }
        }

        #[cfg(feature = "openapi")]
        pub fn api_docs() -> utoipa::openapi::OpenApi {
            crud_api::api_docs()
        }

        pub fn router() -> axum::Router<crate::state::AppState> {
            use crate::auth::access::AccessLayer;
            use axum::routing::{delete, get};
            use yamdb_types::policy::Scope;
            axum::Router::new()
                .route("/", get(crud_api::list).post(crud_api::create))
                .route("/{slug}", delete(crud_api::delete))
                .route_layer(AccessLayer::new(Scope::$scope))
        }
    };
}
