use crate::{
    auth::access::AccessLayer,
    error::ApiResult,
    repository_from_request,
    rest_api::{Page, Paging, SearchQuery},
    validate::Valid,
};
use tracing::debug;
use yamdb_dal::user::{CreateUser, UpdateUser, User, UserRepository};

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::get,
    Json,
};
use http::StatusCode;
use yamdb_types::{claim::Principal, policy::Scope};

use crate::state::AppState;

repository_from_request!(UserRepository);

#[cfg(feature = "openapi")]
#[derive(utoipa::OpenApi)]
#[openapi(paths(
    create_user,
    list_users,
    get_user,
    update_user,
    delete_user,
    get_me,
    update_me
))]
struct ModuleDocs;

#[cfg(feature = "openapi")]
pub fn api_docs() -> utoipa::openapi::OpenApi {
    use utoipa::OpenApi as _;
    ModuleDocs::openapi()
}

#[cfg_attr(feature = "openapi",  utoipa::path(post, path = "", tag = "Users", operation_id = "createUser",
    request_body = CreateUser,
    responses((status = StatusCode::CREATED, description = "Create new User", body = User))))]
pub async fn create_user(
    user_registry: UserRepository,
    Valid(Json(payload)): Valid<Json<CreateUser>>,
) -> ApiResult<impl IntoResponse> {
    let user = user_registry.create(payload).await?;

    Ok((StatusCode::CREATED, Json(user)))
}

#[cfg_attr(feature = "openapi",  utoipa::path(get, path = "", tag = "Users", operation_id = "listUsers",
    params(Paging, SearchQuery),
    responses((status = StatusCode::OK, description = "List Users", body = Page<User>))))]
async fn list_users(
    user_registry: UserRepository,
    State(state): State<AppState>,
    Valid(Query(paging)): Valid<Query<Paging>>,
    Valid(Query(query)): Valid<Query<SearchQuery>>,
) -> ApiResult<impl IntoResponse> {
    let default_page_size = state.config().default_page_size;
    let page_size = paging.page_size(default_page_size);
    let listing_params = paging.into_listing_params(default_page_size)?;
    let users = user_registry
        .list(listing_params, query.search.as_deref())
        .await?;
    Ok((StatusCode::OK, Json(Page::from_batch(users, page_size)?)))
}

#[cfg_attr(feature = "openapi",  utoipa::path(get, path = "/{username}", tag = "Users", operation_id = "getUser",
    responses((status = StatusCode::OK, description = "Get User", body = User))))]
async fn get_user(
    Path(username): Path<String>,
    user_registry: UserRepository,
) -> ApiResult<impl IntoResponse> {
    let user = user_registry.get_by_username(&username).await?;
    Ok((StatusCode::OK, Json(user)))
}

#[cfg_attr(feature = "openapi",  utoipa::path(patch, path = "/{username}", tag = "Users", operation_id = "updateUser",
    request_body = UpdateUser,
    responses((status = StatusCode::OK, description = "Updated User", body = User))))]
async fn update_user(
    Path(username): Path<String>,
    user_registry: UserRepository,
    Valid(Json(payload)): Valid<Json<UpdateUser>>,
) -> ApiResult<impl IntoResponse> {
    let user = user_registry.get_by_username(&username).await?;
    let user = user_registry.update(user.id, payload).await?;
    Ok((StatusCode::OK, Json(user)))
}

#[cfg_attr(feature = "openapi",  utoipa::path(delete, path = "/{username}", tag = "Users", operation_id = "deleteUser",
    responses((status = StatusCode::NO_CONTENT, description = "Deleted successfully"))))]
async fn delete_user(
    Path(username): Path<String>,
    user_registry: UserRepository,
) -> ApiResult<impl IntoResponse> {
    user_registry.delete_by_username(&username).await?;

    Ok((StatusCode::NO_CONTENT, ()))
}

#[cfg_attr(feature = "openapi",  utoipa::path(get, path = "/me", tag = "Users", operation_id = "getMe",
    responses((status = StatusCode::OK, description = "Own account", body = User))))]
async fn get_me(principal: Principal, user_registry: UserRepository) -> ApiResult<impl IntoResponse> {
    let user = user_registry.get(principal.id).await?;
    Ok((StatusCode::OK, Json(user)))
}

/// Users cannot change their own role
fn own_update(mut payload: UpdateUser) -> UpdateUser {
    if let Some(role) = payload.role.take() {
        debug!("Ignoring role {role} in own account update");
    }
    payload
}

#[cfg_attr(feature = "openapi",  utoipa::path(patch, path = "/me", tag = "Users", operation_id = "updateMe",
    request_body = UpdateUser,
    responses((status = StatusCode::OK, description = "Updated own account, role is ignored", body = User))))]
async fn update_me(
    principal: Principal,
    user_registry: UserRepository,
    Valid(Json(payload)): Valid<Json<UpdateUser>>,
) -> ApiResult<impl IntoResponse> {
    let user = user_registry
        .update(principal.id, own_update(payload))
        .await?;
    Ok((StatusCode::OK, Json(user)))
}

pub fn users_router() -> axum::Router<AppState> {
    let own_account = axum::Router::new()
        .route("/me", get(get_me).patch(update_me))
        .route_layer(AccessLayer::new(Scope::OwnAccount));
    axum::Router::new()
        .route("/", get(list_users).post(create_user))
        .route(
            "/{username}",
            get(get_user).patch(update_user).delete(delete_user),
        )
        .route_layer(AccessLayer::new(Scope::Users))
        .merge(own_account)
}
