use std::task::{Context, Poll};

use axum::{
    extract::Request,
    response::{IntoResponse, Response},
};
use futures::future::{BoxFuture, Either};
use http::Method;
use tower::{Layer, Service};
use yamdb_types::{
    claim::Principal,
    policy::{check, Action, Resource, Scope},
};

use crate::error::ApiError;

pub fn action_for(method: &Method) -> Action {
    match *method {
        Method::GET | Method::HEAD | Method::OPTIONS => Action::Read,
        Method::POST => Action::Create,
        Method::PUT | Method::PATCH => Action::Update,
        Method::DELETE => Action::Delete,
        _ => Action::Update,
    }
}

/// Endpoint level access check for routes of one [`Scope`].
/// Must be placed inside `TokenLayer`, which provides the principal.
#[derive(Clone, Copy)]
pub struct AccessLayer {
    scope: Scope,
}

impl AccessLayer {
    pub fn new(scope: Scope) -> Self {
        Self { scope }
    }
}

impl<S> Layer<S> for AccessLayer {
    type Service = AccessService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AccessService {
            inner,
            scope: self.scope,
        }
    }
}

#[derive(Clone)]
pub struct AccessService<S> {
    inner: S,
    scope: Scope,
}

impl<S> Service<Request> for AccessService<S>
where
    S: Service<Request, Response = Response> + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = Either<S::Future, BoxFuture<'static, Result<Response, S::Error>>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request) -> Self::Future {
        let action = action_for(request.method());
        let principal = request.extensions().get::<Principal>();
        match check(principal, action, &Resource::Endpoint(self.scope)) {
            Ok(()) => Either::Left(self.inner.call(request)),
            Err(denied) => {
                let response = ApiError::from(denied).into_response();
                Either::Right(Box::pin(async move { Ok(response) }))
            }
        }
    }
}
