use axum::{
    Json,
    extract::{FromRequest, OptionalFromRequest, Request, rejection::JsonRejection},
};
use serde::de::DeserializeOwned;
use tracing::debug;
use wingrow_core::DomainError;

use crate::error::ApiError;

/// `Json` whose rejections use the `{kind, message}` error body.
///
/// As `Option<ApiJson<T>>` a request without a JSON content type yields
/// `None`; a JSON body that fails to parse is still a ValidationError.
#[derive(Debug, Default)]
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = <Json<T> as FromRequest<S>>::from_request(req, state)
            .await
            .map_err(rejected_body)?;
        Ok(Self(value))
    }
}

impl<S, T> OptionalFromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Option<Self>, Self::Rejection> {
        let body = <Json<T> as OptionalFromRequest<S>>::from_request(req, state)
            .await
            .map_err(rejected_body)?;
        Ok(body.map(|Json(value)| Self(value)))
    }
}

fn rejected_body(rejection: JsonRejection) -> ApiError {
    debug!(status = %rejection.status(), "request body rejected");
    DomainError::validation(rejection.body_text()).into()
}
