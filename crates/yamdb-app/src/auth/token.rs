use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use axum::{
    extract::{FromRequestParts, Request},
    response::{IntoResponse, Response},
};
use headers::{authorization::Bearer, Authorization, HeaderMapExt as _};
use http::{request::Parts, HeaderMap};
use tower::{Layer, Service};
use tracing::debug;
use yamdb_dal::user::UserRepository;
use yamdb_types::claim::Principal;

use crate::{
    error::{ApiError, ApiResult},
    state::AppState,
};

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Resolves the bearer token into the current [`Principal`].
/// Requests without a token pass through as anonymous.
#[derive(Clone)]
pub struct TokenLayer {
    state: AppState,
}

impl TokenLayer {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }
}

impl<S> Layer<S> for TokenLayer {
    type Service = TokenService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TokenService {
            inner,
            state: self.state.clone(),
        }
    }
}

#[derive(Clone)]
pub struct TokenService<S> {
    inner: S,
    state: AppState,
}

impl<S> Service<Request> for TokenService<S>
where
    S: Service<Request, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request) -> Self::Future {
        let state = self.state.clone();
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        Box::pin(async move {
            match authenticate(&state, request.headers()).await {
                Ok(Some(principal)) => {
                    request.extensions_mut().insert(principal);
                }
                Ok(None) => {}
                Err(e) => return Ok(e.into_response()),
            }
            inner.call(request).await
        })
    }
}

async fn authenticate(state: &AppState, headers: &HeaderMap) -> ApiResult<Option<Principal>> {
    let Some(Authorization(bearer)) = headers.typed_get::<Authorization<Bearer>>() else {
        return Ok(None);
    };

    let subject = state
        .tokens()
        .validate(bearer.token())
        .map_err(|e| match e {
            yamdb_auth::Error::Expired => ApiError::Unauthenticated("Token has expired".to_string()),
            other => {
                debug!("Failed to validate token: {other}");
                ApiError::Unauthenticated("Given token is not valid".to_string())
            }
        })?;
    let user_id = subject.user_id;

    let principal = UserRepository::new(state.pool().clone())
        .principal(user_id)
        .await?
        .ok_or_else(|| {
            debug!("User {} ({user_id}) from token does not exist", subject.username);
            ApiError::Unauthenticated("User not found".to_string())
        })?;
    Ok(Some(principal))
}

impl FromRequestParts<AppState> for Principal {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<Principal>().cloned().ok_or_else(|| {
            ApiError::Unauthenticated("Authentication credentials were not provided.".to_string())
        })
    }
}
