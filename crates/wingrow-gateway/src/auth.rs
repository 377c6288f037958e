use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use tracing::warn;
use wingrow_core::CallerContext;

use crate::{app::AppState, error::ApiError};

/// Authenticated caller resolved from the bearer token.
pub struct Caller(pub CallerContext);

impl FromRequestParts<AppState> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok());

        match state.verifier.verify_header(header) {
            Ok(caller) => Ok(Caller(caller)),
            Err(err) => {
                warn!(error = %err, uri = %parts.uri, "request authentication failed");
                Err(err.into())
            }
        }
    }
}
