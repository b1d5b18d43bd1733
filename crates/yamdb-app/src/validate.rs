//! Validated extractors.
//!
//! [`Valid`] runs `garde` rules through [`axum_valid::Garde`] and turns a failed
//! validation into [`ApiError::Validation`], so the client gets the usual
//! `{"detail": ..}` body with 400. Rejections of the inner extractor (bad JSON,
//! wrong content type, unparsable query) are passed through unchanged.

use axum::{
    extract::{FromRef, FromRequest, FromRequestParts, Request},
    response::{IntoResponse, Response},
};
use axum_valid::{Garde, GardeRejection};
use http::request::Parts;

use crate::{error::ApiError, state::AppState};

/// Payloads are validated without context
impl FromRef<AppState> for () {
    fn from_ref(_input: &AppState) -> Self {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Valid<E>(pub E);

impl<E> Valid<E> {
    pub fn into_inner(self) -> E {
        self.0
    }
}

fn reject<R: IntoResponse>(rejection: GardeRejection<R>) -> Response {
    match rejection {
        GardeRejection::Valid(report) => ApiError::Validation(report.to_string()).into_response(),
        GardeRejection::Inner(inner) => inner.into_response(),
    }
}

impl<E, R> FromRequest<AppState> for Valid<E>
where
    Garde<E>: FromRequest<AppState, Rejection = GardeRejection<R>>,
    R: IntoResponse,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        Garde::<E>::from_request(req, state)
            .await
            .map(|Garde(inner)| Valid(inner))
            .map_err(reject)
    }
}

impl<E, R> FromRequestParts<AppState> for Valid<E>
where
    Garde<E>: FromRequestParts<AppState, Rejection = GardeRejection<R>>,
    R: IntoResponse,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        Garde::<E>::from_request_parts(parts, state)
            .await
            .map(|Garde(inner)| Valid(inner))
            .map_err(reject)
    }
}
