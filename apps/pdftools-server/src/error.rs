//! Error types for the PDF tools server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use pdftools_core::PdfToolsError;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Server error types
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("File size too large. Maximum {0}MB per file.")]
    FileTooLarge(usize),

    #[error("Processing timeout after {0}ms")]
    Timeout(u64),

    #[error(transparent)]
    Pdf(#[from] PdfToolsError),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error response body
#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    error: String,
    code: String,
}

impl ServerError {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            ServerError::InvalidRequest(msg) => {
                (StatusCode::BAD_REQUEST, "INVALID_REQUEST", msg.clone())
            }
            ServerError::FileTooLarge(_) => {
                (StatusCode::BAD_REQUEST, "FILE_TOO_LARGE", self.to_string())
            }
            ServerError::Timeout(_) => (StatusCode::REQUEST_TIMEOUT, "TIMEOUT", self.to_string()),
            ServerError::Pdf(err) => match err {
                PdfToolsError::Validation(_) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", err.to_string())
                }
                PdfToolsError::InvalidRange(_) => {
                    (StatusCode::BAD_REQUEST, "INVALID_RANGE", err.to_string())
                }
                PdfToolsError::ParseError(_) => {
                    (StatusCode::BAD_REQUEST, "PARSE_ERROR", err.to_string())
                }
                PdfToolsError::Unsupported(_) => {
                    (StatusCode::NOT_IMPLEMENTED, "NOT_SUPPORTED", err.to_string())
                }
                PdfToolsError::Cancelled => (
                    StatusCode::REQUEST_TIMEOUT,
                    "TIMEOUT",
                    "Processing took too long and was cancelled".to_string(),
                ),
                PdfToolsError::OperationError(_) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "OPERATION_FAILED",
                    "Failed to process PDF. Please try again.".to_string(),
                ),
            },
            ServerError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "Failed to process PDF. Please try again.".to_string(),
            ),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();
        if status.is_server_error() {
            error!("{}", self);
        }

        let body = ErrorResponse {
            success: false,
            error: message,
            code: code.to_string(),
        };

        (status, Json(body)).into_response()
    }
}
