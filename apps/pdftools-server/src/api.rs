//! API handlers for the PDF tools server
//!
//! - GET /health
//! - POST /api/pdf-tools (multipart form, one operation per request)

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::{
        header::{CONTENT_DISPOSITION, CONTENT_TYPE},
        HeaderMap, HeaderValue, StatusCode,
    },
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use pdftools_core::{execute, CancelToken, CommandOutput, ProcessResult};
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::error::ServerError;
use crate::form::UploadForm;
use crate::state::AppState;

/// Routes without the per-IP rate limiter, which needs peer addresses
pub fn router(state: AppState) -> Router {
    let body_limit = state.limits.body_limit();
    Router::new()
        .route("/health", get(handle_health))
        .route("/api/pdf-tools", post(handle_pdf_tools))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

/// Handler: GET /health
pub async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "pdftools-server",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Split response: one envelope per requested range
#[derive(Serialize)]
pub struct SplitResponse {
    pub success: bool,
    pub message: String,
    pub results: Vec<ProcessResult>,
}

/// Handler: POST /api/pdf-tools
pub async fn handle_pdf_tools(
    State(state): State<AppState>,
    request_headers: HeaderMap,
    multipart: Multipart,
) -> Result<Response, ServerError> {
    // The tool pages name the operation in a header rather than a field
    let header_operation = request_headers
        .get("x-operation")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let form = UploadForm::from_multipart(multipart, &state.limits)
        .await?
        .with_fallback_operation(header_operation.as_deref());
    let command = form.into_command()?;
    let operation = command.name();
    info!("Processing {} request", operation);

    let cancel = CancelToken::with_timeout(state.timeout);
    let worker_cancel = cancel.clone();
    let task = tokio::task::spawn_blocking(move || execute(command, &worker_cancel));

    let output = match tokio::time::timeout(state.timeout, task).await {
        Ok(joined) => {
            joined.map_err(|e| ServerError::Internal(format!("worker panicked: {}", e)))??
        }
        Err(_) => {
            cancel.cancel();
            warn!("{} exceeded {:?}", operation, state.timeout);
            return Err(ServerError::Timeout(state.timeout.as_millis() as u64));
        }
    };

    match output {
        CommandOutput::Document(result) => pdf_response(operation, result),
        CommandOutput::Documents(results) => {
            let produced = results.iter().filter(|r| r.success).count();
            Ok(Json(SplitResponse {
                success: produced > 0,
                message: format!("Successfully split into {} files", produced),
                results,
            })
            .into_response())
        }
        CommandOutput::Analysis(report) => Ok(Json(report).into_response()),
        CommandOutput::Info(info) => Ok(Json(serde_json::json!({
            "success": true,
            "info": info,
        }))
        .into_response()),
    }
}

/// Single-document results go back as the PDF itself
fn pdf_response(operation: &str, result: ProcessResult) -> Result<Response, ServerError> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/pdf"));

    let disposition = format!("attachment; filename=\"{}-result.pdf\"", operation);
    headers.insert(
        CONTENT_DISPOSITION,
        HeaderValue::from_str(&disposition).map_err(|e| ServerError::Internal(e.to_string()))?,
    );

    if let Some(pages) = result.page_count {
        headers.insert("x-page-count", HeaderValue::from(pages));
    }
    if let Some(metrics) = &result.metrics {
        headers.insert(
            "x-processing-time-ms",
            HeaderValue::from(metrics.processing_time_ms),
        );
    }
    if !result.warnings.is_empty() {
        // Warnings quoting non-ASCII input cannot travel in a header
        if let Ok(value) = HeaderValue::from_str(&result.warnings.join("; ")) {
            headers.insert("x-warnings", value);
        }
    }

    let bytes = result
        .data
        .ok_or_else(|| ServerError::Internal(format!("{} produced no document", operation)))?;

    Ok((StatusCode::OK, headers, bytes).into_response())
}
