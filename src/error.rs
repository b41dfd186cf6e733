//! Engine-wide error type and its HTTP mapping.
//!
//! Every subsystem returns `EngineError`; the action router converts it into
//! the `{ "error": ... }` envelope with a status code matching the kind.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Market-data or bridge HTTP call failed, timed out, or returned an
    /// unparseable payload.
    #[error("upstream unavailable: {0}")]
    Upstream(String),

    /// Upstream rejected the call because of rate limiting; retryable.
    #[error("upstream rate limited: {0}")]
    RateLimited(String),

    /// Missing or invalid request parameters.
    #[error("invalid request: {0}")]
    Validation(String),

    /// Not enough candles for the requested analysis.
    #[error("insufficient data: {0}")]
    InsufficientData(String),

    /// A store read or write failed.
    #[error("store failure: {0}")]
    Store(String),

    /// The execution provider reported a failure for one of its operations.
    #[error("provider failure in {endpoint}: {message}")]
    Provider { endpoint: String, message: String },

    /// A required configuration value is missing or malformed.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl EngineError {
    pub fn provider(endpoint: &str, message: impl Into<String>) -> Self {
        EngineError::Provider {
            endpoint: endpoint.to_string(),
            message: message.into(),
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            EngineError::Upstream(_) => StatusCode::BAD_GATEWAY,
            EngineError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            EngineError::Validation(_) => StatusCode::BAD_REQUEST,
            EngineError::InsufficientData(_) => StatusCode::UNPROCESSABLE_ENTITY,
            EngineError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            EngineError::Provider { .. } => StatusCode::BAD_GATEWAY,
            EngineError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<sqlx::Error> for EngineError {
    fn from(err: sqlx::Error) -> Self {
        EngineError::Store(err.to_string())
    }
}

impl IntoResponse for EngineError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_maps_to_bad_request() {
        let err = EngineError::Validation("startDate is required".into());
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn rate_limited_maps_to_429() {
        let err = EngineError::RateLimited("call frequency exceeded".into());
        assert_eq!(err.status_code(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn provider_error_carries_endpoint() {
        let err = EngineError::provider("order/close", "ticket not found");
        assert!(err.to_string().contains("order/close"));
        assert!(err.to_string().contains("ticket not found"));
    }
}
