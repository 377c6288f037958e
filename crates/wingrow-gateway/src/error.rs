use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::error;
use wingrow_core::DomainError;
use wingrow_platform::ErrorBody;

pub type ApiResult<T> = Result<Json<T>, ApiError>;

/// Maps lifecycle failures onto HTTP statuses with a `{kind, message}` body.
#[derive(Debug)]
pub struct ApiError(DomainError);

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        Self(err)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            DomainError::Validation(_)
            | DomainError::InvalidState(_)
            | DomainError::InsufficientStock { .. } => StatusCode::BAD_REQUEST,
            DomainError::NotFound(_) => StatusCode::NOT_FOUND,
            DomainError::Forbidden(_) => StatusCode::FORBIDDEN,
            DomainError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            DomainError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self.0 {
            DomainError::Storage(err) => {
                error!(error = %err, "storage failure");
                "internal error".to_string()
            }
            other => other.to_string(),
        };

        let body = ErrorBody {
            kind: self.0.kind().to_string(),
            message,
        };
        (status, Json(body)).into_response()
    }
}
