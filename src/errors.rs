use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;

/// Standardized error body for HTTP responses.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "error": "Not Found",
    "message": "Gift card not found",
    "details": null,
    "timestamp": "2025-07-09T10:30:00.000Z"
}))]
pub struct ErrorResponse {
    /// HTTP status category (e.g., "Not Found", "Bad Request")
    #[schema(example = "Not Found")]
    pub error: String,
    /// Human-readable error description
    #[schema(example = "Gift card not found")]
    pub message: String,
    /// Additional error details (validation errors)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// ISO 8601 timestamp when the error occurred
    pub timestamp: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("{0}")]
    FraudRejected(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("{0}")]
    PaymentFailed(String),

    #[error("Gift card service error: {0}")]
    GiftCardServiceError(String),

    #[error("Compensation error: {0}")]
    CompensationError(String),

    #[error("Event error: {0}")]
    EventError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Internal server error")]
    InternalServerError,

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

impl ServiceError {
    /// Returns the HTTP status code for this error.
    /// This is the single source of truth for error-to-status mapping.
    ///
    /// Rejections raised before any side effect map to 4xx; anything that
    /// fails after money moved (or inside a collaborator) maps to 5xx.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::ValidationError(_)
            | Self::InvalidInput(_)
            | Self::InvalidOperation(_)
            | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::FraudRejected(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::PaymentFailed(_) | Self::GiftCardServiceError(_) => StatusCode::BAD_GATEWAY,
            Self::CompensationError(_)
            | Self::EventError(_)
            | Self::SerializationError(_)
            | Self::InternalError(_)
            | Self::InternalServerError
            | Self::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Returns the error message suitable for HTTP responses.
    /// Internal errors return generic messages to avoid leaking implementation details.
    pub fn response_message(&self) -> String {
        match self {
            Self::EventError(_)
            | Self::SerializationError(_)
            | Self::InternalError(_)
            | Self::Other(_) => "Internal server error".to_string(),
            Self::InternalServerError => "Internal server error".to_string(),
            // Compensation errors are logged where they happen and must never
            // replace the failure that triggered them; if one ever reaches a
            // response it is reported generically.
            Self::CompensationError(_) => "Internal server error".to_string(),
            Self::ServiceUnavailable(msg) => format!("Service unavailable: {}", msg),
            // For user-facing errors, return the actual message
            _ => self.to_string(),
        }
    }

    /// Appends the voided-gift-card note to the message a caller will see.
    ///
    /// Used once compensation has been attempted for a failed checkout; the
    /// note is appended regardless of whether the compensating credit itself
    /// succeeded, so the caller always gets one coherent failure message.
    pub fn with_voided_note(self) -> Self {
        const NOTE: &str = "Gift card transaction has been voided.";
        match self {
            Self::PaymentFailed(msg) => Self::PaymentFailed(format!("{} {}", msg, NOTE)),
            Self::GiftCardServiceError(msg) => {
                Self::GiftCardServiceError(format!("{}. {}", msg, NOTE))
            }
            Self::ValidationError(msg) => Self::ValidationError(format!("{}. {}", msg, NOTE)),
            Self::InvalidOperation(msg) => Self::InvalidOperation(format!("{}. {}", msg, NOTE)),
            Self::InternalError(msg) => Self::InternalError(format!("{}. {}", msg, NOTE)),
            other => other,
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_message = self.response_message();

        let err = ErrorResponse {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            message: error_message,
            details: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        (status, Json(err)).into_response()
    }
}
