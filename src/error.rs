//! HTTP-facing error type.

use crate::document_store::StoreError;
use crate::gemini::InferenceError;
use crate::schema::ErrorBody;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use tracing::error;

/// Message for a query body that is missing a required field.
pub const MISSING_QUERY_FIELDS: &str = "Missing text, prompt, filename, or pageNumber";

/// Message shown for any inference failure. Details only go to the log.
pub const INFERENCE_FAILED: &str = "Failed to query Gemini API";

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Storage(#[from] StoreError),
    #[error(transparent)]
    RemoteInference(#[from] InferenceError),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Storage(StoreError::Empty) => StatusCode::BAD_REQUEST,
            AppError::Storage(StoreError::NotFound(_)) => StatusCode::NOT_FOUND,
            AppError::Storage(StoreError::Write(_) | StoreError::Read(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::RemoteInference(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Text sent to the client.
    fn public_message(&self) -> String {
        match self {
            AppError::RemoteInference(_) => INFERENCE_FAILED.to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("{}", self);
        }
        let body = ErrorBody {
            error: self.public_message(),
        };
        (status, Json(body)).into_response()
    }
}
