use axum::{extract::State, response::IntoResponse, routing::post, Json};
use garde::Validate;
use http::StatusCode;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::{debug, info};
use yamdb_auth::code::{confirmation_code, is_expired};
use yamdb_dal::user::{SignupUser, User, UserRepository};

use crate::{
    error::{ApiError, ApiResult},
    state::AppState,
    validate::Valid,
};

pub mod access;
pub mod token;

const INVALID_CODE: &str = "Invalid confirmation code";

#[derive(Debug, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct SignupResponse {
    pub email: String,
    pub username: String,
}

#[derive(Debug, Deserialize, Validate)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct TokenRequest {
    #[garde(length(min = 1, max = 150))]
    pub username: String,
    #[garde(length(min = 1, max = 255))]
    pub confirmation_code: String,
}

#[derive(Debug, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct TokenResponse {
    pub access: String,
}

#[cfg_attr(feature = "openapi",  utoipa::path(post, path = "/signup", tag = "Auth", operation_id = "signup",
    request_body = SignupUser,
    responses((status = StatusCode::OK, description = "Confirmation code sent to email", body = SignupResponse))))]
pub async fn signup(
    State(state): State<AppState>,
    repository: UserRepository,
    Valid(Json(payload)): Valid<Json<SignupUser>>,
) -> ApiResult<impl IntoResponse> {
    let code = confirmation_code();
    let mailer = state.mailer();
    let sent_code = code.clone();
    let user = repository
        .register(payload, &code, |user: User| async move {
            mailer
                .send_confirmation_code(&user.email, &user.username, &sent_code)
                .await
        })
        .await?;
    info!(username = %user.username, "Confirmation code issued");

    Ok((
        StatusCode::OK,
        Json(SignupResponse {
            email: user.email,
            username: user.username,
        }),
    ))
}

#[cfg_attr(feature = "openapi",  utoipa::path(post, path = "/token", tag = "Auth", operation_id = "obtainToken",
    request_body = TokenRequest,
    responses((status = StatusCode::OK, description = "Access token", body = TokenResponse))))]
pub async fn token(
    State(state): State<AppState>,
    repository: UserRepository,
    Valid(Json(payload)): Valid<Json<TokenRequest>>,
) -> ApiResult<impl IntoResponse> {
    let user = repository.get_by_username(&payload.username).await?;

    let Some(stored) = repository
        .check_code(user.id, &payload.confirmation_code)
        .await?
    else {
        debug!("Wrong confirmation code for {}", user.username);
        return Err(ApiError::Validation(INVALID_CODE.to_string()));
    };

    let now = OffsetDateTime::now_utc().unix_timestamp();
    if is_expired(stored.created, now, state.config().code_validity) {
        debug!("Expired confirmation code for {}", user.username);
        return Err(ApiError::Validation(
            "Confirmation code has expired, sign up again to get a new one".to_string(),
        ));
    }

    // a concurrent exchange or signup may have used or replaced the code meanwhile
    if !repository.consume_code(user.id, &stored).await? {
        return Err(ApiError::Validation(INVALID_CODE.to_string()));
    }

    let access = state.tokens().issue(user.id, &user.username)?;
    info!(username = %user.username, "Access token issued");
    Ok((StatusCode::OK, Json(TokenResponse { access })))
}

#[cfg(feature = "openapi")]
#[derive(utoipa::OpenApi)]
#[openapi(paths(signup, token))]
struct ModuleDocs;

#[cfg(feature = "openapi")]
pub fn api_docs() -> utoipa::openapi::OpenApi {
    use utoipa::OpenApi as _;
    ModuleDocs::openapi()
}

/// Builds authentication router - must be nested on /auth path!
pub fn auth_router() -> axum::Router<AppState> {
    axum::Router::new()
        .route("/signup", post(signup))
        .route("/token", post(token))
}

#[cfg(test)]
mod tests {
    use std::{path::Path, str::FromStr as _, time::Duration};

    use axum::body::{to_bytes, Body};
    use serde_json::{json, Value};
    use tower::ServiceExt as _;
    use yamdb_auth::token::TokenManager;
    use yamdb_dal::user::CreateUser;
    use yamdb_types::{
        claim::Role,
        general::{ValidEmail, ValidUsername},
    };

    use super::*;
    use crate::{
        mail::{MailConfig, Mailer, DEFAULT_SMTP_PORT},
        state::AppConfig,
    };

    const HOUR: Duration = Duration::from_secs(3600);

    async fn test_state(dir: &Path) -> AppState {
        let db_url = format!("sqlite://{}", dir.join("yamdb.db").display());
        let pool = yamdb_dal::new_pool(&db_url).await.unwrap();
        yamdb_dal::migrate(&pool).await.unwrap();
        let mailer = Mailer::new(MailConfig {
            smtp_host: None,
            smtp_port: DEFAULT_SMTP_PORT,
            smtp_user: None,
            smtp_password: None,
            from_address: "YaMDb <noreply@yamdb.local>".to_string(),
            mail_dir: dir.join("sent_emails"),
        })
        .unwrap();
        let config = AppConfig {
            default_page_size: 10,
            code_validity: HOUR,
        };
        AppState::new(config, pool, TokenManager::new("secret", HOUR), mailer)
    }

    async fn post(state: &AppState, path: &str, body: Value) -> (StatusCode, Value) {
        let request = http::Request::builder()
            .method(http::Method::POST)
            .uri(path)
            .header(http::header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = auth_router()
            .with_state(state.clone())
            .oneshot(request)
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    async fn user_with_code(state: &AppState, username: &str, code: &str) -> User {
        let repository = UserRepository::new(state.pool().clone());
        let user = repository
            .create(CreateUser {
                username: ValidUsername::from_str(username).unwrap(),
                email: ValidEmail::from_str(&format!("{username}@example.com")).unwrap(),
                first_name: None,
                last_name: None,
                bio: None,
                role: Role::User,
            })
            .await
            .unwrap();
        repository.issue_code(user.id, code).await.unwrap();
        user
    }

    #[tokio::test]
    async fn test_invalid_payload_is_bad_request_with_detail() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path()).await;

        let (status, body) = post(
            &state,
            "/signup",
            json!({"email": "me@example.com", "username": "Me"}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["detail"].as_str().unwrap().contains("reserved"));

        let (status, body) = post(
            &state,
            "/signup",
            json!({"email": "not-an-email", "username": "ivan"}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["detail"].is_string());

        let (status, body) = post(
            &state,
            "/signup",
            json!({"email": "ivan@example.com", "username": "ivan"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"email": "ivan@example.com", "username": "ivan"}));
    }

    #[tokio::test]
    async fn test_code_length_limit() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path()).await;
        user_with_code(&state, "ivan", "right-code").await;

        // longest allowed code passes validation and is just wrong
        let (status, body) = post(
            &state,
            "/token",
            json!({"username": "ivan", "confirmation_code": "x".repeat(255)}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["detail"], INVALID_CODE);

        let (status, body) = post(
            &state,
            "/token",
            json!({"username": "ivan", "confirmation_code": "x".repeat(256)}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_ne!(body["detail"], INVALID_CODE);
    }

    #[tokio::test]
    async fn test_expired_code_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path()).await;
        let user = user_with_code(&state, "ivan", "old-code").await;

        sqlx::query("UPDATE confirmation_code SET created = created - ? WHERE user_id = ?")
            .bind(HOUR.as_secs() as i64 + 60)
            .bind(user.id)
            .execute(state.pool())
            .await
            .unwrap();

        let (status, body) = post(
            &state,
            "/token",
            json!({"username": "ivan", "confirmation_code": "old-code"}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["detail"].as_str().unwrap().contains("expired"));
        assert!(body.get("access").is_none());

        UserRepository::new(state.pool().clone())
            .issue_code(user.id, "new-code")
            .await
            .unwrap();
        let (status, body) = post(
            &state,
            "/token",
            json!({"username": "ivan", "confirmation_code": "new-code"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let subject = state
            .tokens()
            .validate(body["access"].as_str().unwrap())
            .unwrap();
        assert_eq!(subject.user_id, user.id);
        assert_eq!(subject.username, "ivan");

        // single use
        let (status, _) = post(
            &state,
            "/token",
            json!({"username": "ivan", "confirmation_code": "new-code"}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
