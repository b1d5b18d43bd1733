use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::get,
    Json,
};
use http::StatusCode;
use yamdb_dal::{
    comment::{Comment, CommentRepository, CreateComment, UpdateComment},
    review::ReviewRepository,
    title::TitleRepository,
};
use yamdb_types::{
    claim::Principal,
    policy::{check, Action, Resource, Scope},
};

use crate::{
    auth::access::AccessLayer,
    error::ApiResult,
    rest_api::{review::ensure_title, Page, Paging},
    state::AppState,
    validate::Valid,
};

crate::repository_from_request!(CommentRepository);

/// Review must belong to the title from the path
async fn ensure_review(
    titles: &TitleRepository,
    reviews: &ReviewRepository,
    title_id: i64,
    review_id: i64,
) -> ApiResult<()> {
    ensure_title(titles, title_id).await?;
    reviews.get(title_id, review_id).await?;
    Ok(())
}

fn check_owner(principal: &Principal, action: Action, comment: &Comment) -> ApiResult<()> {
    let resource = Resource::Owned {
        scope: Scope::Comments,
        author_id: comment.author_id,
    };
    check(Some(principal), action, &resource)?;
    Ok(())
}

#[cfg_attr(feature = "openapi",  utoipa::path(get, path = "", tag = "Comments", operation_id = "listComments",
    params(Paging), responses((status = StatusCode::OK, description = "List paginated", body = Page<Comment>))))]
pub async fn list(
    Path((title_id, review_id)): Path<(i64, i64)>,
    titles: TitleRepository,
    reviews: ReviewRepository,
    repository: CommentRepository,
    State(state): State<AppState>,
    Valid(Query(paging)): Valid<Query<Paging>>,
) -> ApiResult<impl IntoResponse> {
    ensure_review(&titles, &reviews, title_id, review_id).await?;
    let default_page_size = state.config().default_page_size;
    let page_size = paging.page_size(default_page_size);
    let listing_params = paging.into_listing_params(default_page_size)?;
    let batch = repository.list(review_id, listing_params).await?;
    Ok((StatusCode::OK, Json(Page::from_batch(batch, page_size)?)))
}

#[cfg_attr(feature = "openapi",  utoipa::path(post, path = "", tag = "Comments", operation_id = "createComment",
    request_body = CreateComment,
    responses((status = StatusCode::CREATED, description = "Created Comment", body = Comment))))]
pub async fn create(
    Path((title_id, review_id)): Path<(i64, i64)>,
    principal: Principal,
    titles: TitleRepository,
    reviews: ReviewRepository,
    repository: CommentRepository,
    Valid(Json(payload)): Valid<Json<CreateComment>>,
) -> ApiResult<impl IntoResponse> {
    ensure_review(&titles, &reviews, title_id, review_id).await?;
    let record = repository.create(review_id, principal.id, payload).await?;

    Ok((StatusCode::CREATED, Json(record)))
}

#[cfg_attr(feature = "openapi",  utoipa::path(get, path = "/{comment_id}", tag = "Comments", operation_id = "getComment",
    responses((status = StatusCode::OK, description = "Get one", body = Comment))))]
pub async fn get_comment(
    Path((title_id, review_id, comment_id)): Path<(i64, i64, i64)>,
    titles: TitleRepository,
    reviews: ReviewRepository,
    repository: CommentRepository,
) -> ApiResult<impl IntoResponse> {
    ensure_review(&titles, &reviews, title_id, review_id).await?;
    let record = repository.get(review_id, comment_id).await?;

    Ok((StatusCode::OK, Json(record)))
}

#[cfg_attr(feature = "openapi",  utoipa::path(patch, path = "/{comment_id}", tag = "Comments", operation_id = "updateComment",
    request_body = UpdateComment,
    responses((status = StatusCode::OK, description = "Updated Comment", body = Comment))))]
pub async fn update(
    Path((title_id, review_id, comment_id)): Path<(i64, i64, i64)>,
    principal: Principal,
    titles: TitleRepository,
    reviews: ReviewRepository,
    repository: CommentRepository,
    Valid(Json(payload)): Valid<Json<UpdateComment>>,
) -> ApiResult<impl IntoResponse> {
    ensure_review(&titles, &reviews, title_id, review_id).await?;
    let comment = repository.get(review_id, comment_id).await?;
    check_owner(&principal, Action::Update, &comment)?;
    let record = repository.update(review_id, comment_id, payload).await?;

    Ok((StatusCode::OK, Json(record)))
}

#[cfg_attr(feature = "openapi",  utoipa::path(delete, path = "/{comment_id}", tag = "Comments", operation_id = "deleteComment",
    responses((status = StatusCode::NO_CONTENT, description = "Deleted successfully"))))]
pub async fn delete(
    Path((title_id, review_id, comment_id)): Path<(i64, i64, i64)>,
    principal: Principal,
    titles: TitleRepository,
    reviews: ReviewRepository,
    repository: CommentRepository,
) -> ApiResult<impl IntoResponse> {
    ensure_review(&titles, &reviews, title_id, review_id).await?;
    let comment = repository.get(review_id, comment_id).await?;
    check_owner(&principal, Action::Delete, &comment)?;
    repository.delete(review_id, comment_id).await?;

    Ok((StatusCode::NO_CONTENT, ()))
}

#[cfg(feature = "openapi")]
#[derive(utoipa::OpenApi)]
#[openapi(paths(list, create, get_comment, update, delete))]
struct ModuleDocs;

#[cfg(feature = "openapi")]
pub fn api_docs() -> utoipa::openapi::OpenApi {
    use utoipa::OpenApi as _;
    ModuleDocs::openapi()
}

/// Must be nested on `/titles/{title_id}/reviews/{review_id}/comments`
pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route("/", get(list).post(create))
        .route("/{comment_id}", get(get_comment).patch(update).delete(delete))
        .route_layer(AccessLayer::new(Scope::Comments))
}
