//! Error types for the package server

use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use compliance_engine::EngineError;
use pdfjoin_core::PdfJoinError;
use serde::Serialize;
use thiserror::Error;

/// Server error types
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Operation timed out after {0}ms")]
    Timeout(u64),

    #[error("Invalid rule: {0}")]
    InvalidRule(#[from] EngineError),

    #[error("PDF processing failed: {0}")]
    Pdf(#[from] PdfJoinError),

    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<MultipartError> for ServerError {
    fn from(err: MultipartError) -> Self {
        ServerError::InvalidRequest(format!("Malformed upload: {}", err))
    }
}

/// Error response body
#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    error: String,
    code: String,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ServerError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "INVALID_REQUEST"),
            ServerError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ServerError::Timeout(_) => (StatusCode::REQUEST_TIMEOUT, "TIMEOUT"),
            ServerError::InvalidRule(_) => (StatusCode::BAD_REQUEST, "INVALID_RULE"),
            ServerError::Pdf(PdfJoinError::ParseError(_) | PdfJoinError::InvalidRange(_)) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "PDF_ERROR")
            }
            ServerError::Pdf(_) | ServerError::Storage(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "IO_ERROR")
            }
            ServerError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };

        if status.is_server_error() {
            tracing::error!("{}", self);
        }

        let body = ErrorResponse {
            success: false,
            error: self.to_string(),
            code: code.to_string(),
        };

        (status, Json(body)).into_response()
    }
}
