use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Failure of the underlying datastore. Carried up to callers, which decide
/// whether to serve an empty listing or a 503.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("datastore unavailable: {0}")]
    Unavailable(#[from] sqlx::Error),

    #[error("unsupported database url scheme: {0}")]
    UnsupportedUrl(String),
}

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    /// A submitted form failed validation. `code` names the first bad field.
    #[error("Invalid request ({code}): {message}")]
    Validation { code: &'static str, message: String },

    #[error("Datastore error: {0}")]
    DatastoreUnavailable(#[from] StoreError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation { code, message } => (StatusCode::BAD_REQUEST, *code, message.clone()),
            AppError::DatastoreUnavailable(e) => {
                tracing::error!("Datastore error: {e}");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "DATASTORE_UNAVAILABLE",
                    "The job datastore is unavailable".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
