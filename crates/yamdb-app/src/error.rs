use axum::{response::IntoResponse, Json};
use http::StatusCode;
use serde::Serialize;
use tracing::{debug, error};
use yamdb_types::policy::Denied;

pub type ApiResult<T, E = ApiError> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Unauthenticated(String),

    #[error("You do not have sufficient rights for this action.")]
    InsufficientRights,

    #[error("{0} not found")]
    ResourceNotFound(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    detail: &'a str,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            ApiError::InsufficientRights => StatusCode::FORBIDDEN,
            ApiError::ResourceNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::InvalidQuery(_) | ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        let message = match &self {
            ApiError::Internal(msg) => {
                error!("Internal error: {msg}");
                "Internal server error".to_string()
            }
            other => {
                debug!("Request failed with {status}: {other}");
                other.to_string()
            }
        };
        (status, Json(ErrorBody { detail: &message })).into_response()
    }
}

impl From<yamdb_dal::Error> for ApiError {
    fn from(value: yamdb_dal::Error) -> Self {
        use yamdb_dal::Error;
        match value {
            Error::RecordNotFound(what) => ApiError::ResourceNotFound(what),
            Error::InvalidOrderByField(field) => {
                ApiError::InvalidQuery(format!("Cannot sort by {field}"))
            }
            Error::Duplicate(msg) | Error::InvalidReference(msg) => ApiError::Validation(msg),
            Error::Conflict(msg) => ApiError::Conflict(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<Denied> for ApiError {
    fn from(value: Denied) -> Self {
        match value {
            Denied::AuthenticationRequired => ApiError::Unauthenticated(value.to_string()),
            Denied::InsufficientRights => ApiError::InsufficientRights,
        }
    }
}

impl From<yamdb_auth::Error> for ApiError {
    fn from(value: yamdb_auth::Error) -> Self {
        ApiError::Internal(format!("Token error: {value}"))
    }
}

impl From<crate::mail::MailError> for ApiError {
    fn from(value: crate::mail::MailError) -> Self {
        ApiError::Internal(format!("Mail error: {value}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dal_error_mapping() {
        let e: ApiError = yamdb_dal::Error::RecordNotFound("Title".into()).into();
        assert_eq!(e.status(), StatusCode::NOT_FOUND);
        assert_eq!(e.to_string(), "Title not found");

        let e: ApiError = yamdb_dal::Error::Duplicate("taken".into()).into();
        assert_eq!(e.status(), StatusCode::BAD_REQUEST);

        let e: ApiError = yamdb_dal::Error::Conflict("race".into()).into();
        assert_eq!(e.status(), StatusCode::CONFLICT);

        let e: ApiError = yamdb_dal::Error::ImportError("boom".into()).into();
        assert_eq!(e.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_denied_mapping() {
        let e: ApiError = Denied::AuthenticationRequired.into();
        assert_eq!(e.status(), StatusCode::UNAUTHORIZED);
        let e: ApiError = Denied::InsufficientRights.into();
        assert_eq!(e.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            e.to_string(),
            "You do not have sufficient rights for this action."
        );
    }
}
