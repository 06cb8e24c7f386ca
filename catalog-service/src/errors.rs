use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

use crate::models::storage::StorageError;

/// Request-level failures. Clients get the not-found signal, an upload
/// rejection, or the generic storage-failure message; storage detail is
/// logged server-side and never serialized into a response.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Book not found")]
    NotFound,
    #[error("{0}")]
    InvalidUpload(&'static str),
    #[error("Database query failed")]
    Storage(#[from] StorageError),
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::InvalidUpload(_) => StatusCode::BAD_REQUEST,
            ApiError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            ApiError::Storage(e) => error!("Storage failure: {}", e),
            ApiError::InvalidUpload(reason) => warn!("Rejected upload: {}", reason),
            ApiError::NotFound => {}
        }

        let status = self.status_code();
        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

impl From<std::io::Error> for ApiError {
    fn from(err: std::io::Error) -> Self {
        ApiError::Storage(StorageError::Io(err))
    }
}
