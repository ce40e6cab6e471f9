use crate::{Error, ErrorType};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::error;

/// What clients see when anything goes wrong upstream.
pub(crate) const GENERIC_MESSAGE: &str = "An error occurred";

/// Wraps an `Error` so that handlers can return it. Every failure is a 500; only configuration
/// problems are described to the client, everything else gets `GENERIC_MESSAGE`.
#[derive(Debug)]
pub struct ApiError(Error);

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let error_type = self.0.error_type();
        error!("Request failed ({error_type}): {:?}", self.0.inner());
        let message = match error_type {
            ErrorType::Config => self.0.to_string(),
            ErrorType::Source | ErrorType::Internal => GENERIC_MESSAGE.to_string(),
        };
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorBody { error: message }),
        )
            .into_response()
    }
}
