//! Webhook gateway errors mapped to HTTP responses

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use super::signature::SignatureError;

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("Unknown provider '{0}'")]
    UnknownProvider(String),

    #[error("Signature verification failed: {0}")]
    Signature(#[from] SignatureError),

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Processing failed: {0}")]
    Processing(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl WebhookError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            WebhookError::UnknownProvider(_)
            | WebhookError::MalformedPayload(_)
            | WebhookError::Validation(_) => StatusCode::BAD_REQUEST,
            WebhookError::Signature(_) => StatusCode::UNAUTHORIZED,
            WebhookError::Processing(_) | WebhookError::Database(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            WebhookError::UnknownProvider(_) => "UNKNOWN_PROVIDER",
            WebhookError::Signature(_) => "SIGNATURE_INVALID",
            WebhookError::MalformedPayload(_) => "MALFORMED_PAYLOAD",
            WebhookError::Validation(_) => "VALIDATION_FAILED",
            WebhookError::Processing(_) => "PROCESSING_FAILED",
            WebhookError::Database(_) => "DATABASE_ERROR",
        }
    }
}

impl From<sqlx::Error> for WebhookError {
    fn from(e: sqlx::Error) -> Self {
        WebhookError::Database(e.to_string())
    }
}

impl From<crate::ledger::LedgerError> for WebhookError {
    fn from(e: crate::ledger::LedgerError) -> Self {
        WebhookError::Processing(e.to_string())
    }
}

impl From<crate::collaborators::CollaboratorError> for WebhookError {
    fn from(e: crate::collaborators::CollaboratorError) -> Self {
        WebhookError::Database(e.to_string())
    }
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        // Secrets never appear in error messages; safe to echo
        let body = Json(json!({
            "received": false,
            "code": self.code(),
            "error": self.to_string(),
        }));
        (self.status_code(), body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            WebhookError::Signature(SignatureError::NoSecretMatched { candidates: 2 })
                .status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            WebhookError::MalformedPayload("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            WebhookError::Database("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
