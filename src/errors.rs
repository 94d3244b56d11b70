use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Error body returned by every non-webhook endpoint.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "error": "Conflict",
    "code": "order:token:already-claimed",
    "message": "order has already been claimed",
    "timestamp": "2025-03-01T10:30:00.000Z"
}))]
pub struct ErrorResponse {
    /// HTTP status category (e.g., "Not Found", "Conflict")
    pub error: String,
    /// Stable machine-readable error code
    #[schema(example = "order:not-found")]
    pub code: String,
    /// Human-readable error description
    pub message: String,
    /// RFC 3339 timestamp when the error was produced
    pub timestamp: String,
}

/// Coarse failure categories surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Expired,
    Conflict,
    Unauthorized,
    ValidationFailed,
    UpstreamFailure,
    InternalFailure,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sea_orm::error::DbErr),

    #[error("order token not found")]
    TokenNotFound,

    #[error("order token has expired")]
    TokenExpired,

    #[error("order has already been claimed")]
    AlreadyClaimed,

    #[error("order is already assigned to another user")]
    OrderAlreadyAssigned,

    #[error("order has already been paid")]
    OrderAlreadyPaid,

    #[error("order not found")]
    OrderNotFound,

    #[error("profile not found")]
    ProfileNotFound,

    #[error("invalid order ID format")]
    InvalidOrderId,

    #[error("invalid order status: {0}")]
    InvalidStatus(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Payment failed: {0}")]
    PaymentFailed(String),

    #[error("External service error: {0}")]
    ExternalServiceError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        ServiceError::ExternalServiceError(err.to_string())
    }
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::TokenNotFound | Self::OrderNotFound | Self::ProfileNotFound => {
                ErrorKind::NotFound
            }
            Self::TokenExpired => ErrorKind::Expired,
            Self::AlreadyClaimed | Self::OrderAlreadyAssigned | Self::OrderAlreadyPaid => {
                ErrorKind::Conflict
            }
            Self::Unauthorized(_) | Self::Forbidden(_) => ErrorKind::Unauthorized,
            Self::InvalidOrderId | Self::InvalidStatus(_) | Self::ValidationError(_) => {
                ErrorKind::ValidationFailed
            }
            Self::PaymentFailed(_) | Self::ExternalServiceError(_) => ErrorKind::UpstreamFailure,
            Self::DatabaseError(_) | Self::InternalError(_) => ErrorKind::InternalFailure,
        }
    }

    /// Stable machine-readable code included in error responses.
    pub fn code(&self) -> &'static str {
        match self {
            Self::TokenNotFound => "order:token:not-found",
            Self::TokenExpired => "order:token:expired",
            Self::AlreadyClaimed => "order:token:already-claimed",
            Self::OrderAlreadyAssigned => "order:already-assigned",
            Self::OrderAlreadyPaid => "order:already-paid",
            Self::OrderNotFound => "order:not-found",
            Self::ProfileNotFound => "profile:not-found",
            Self::InvalidOrderId => "order:invalid-id",
            Self::InvalidStatus(_) => "order:invalid-status",
            Self::PaymentFailed(_) => "order:payment-failed",
            Self::ValidationError(_) => "common:validation-error",
            Self::Unauthorized(_) => "common:unauthorized",
            Self::Forbidden(_) => "common:forbidden",
            Self::ExternalServiceError(_) => "common:upstream-error",
            Self::DatabaseError(_) | Self::InternalError(_) => "common:internal-server-error",
        }
    }

    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::TokenNotFound | Self::OrderNotFound | Self::ProfileNotFound => {
                StatusCode::NOT_FOUND
            }
            Self::TokenExpired
            | Self::InvalidOrderId
            | Self::InvalidStatus(_)
            | Self::ValidationError(_) => StatusCode::BAD_REQUEST,
            Self::AlreadyClaimed | Self::OrderAlreadyAssigned | Self::OrderAlreadyPaid => {
                StatusCode::CONFLICT
            }
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::PaymentFailed(_) => StatusCode::PAYMENT_REQUIRED,
            Self::ExternalServiceError(_) => StatusCode::BAD_GATEWAY,
            Self::DatabaseError(_) | Self::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message suitable for HTTP responses. Internal failures get a generic
    /// message so storage details never reach the caller.
    pub fn response_message(&self) -> String {
        match self.kind() {
            ErrorKind::InternalFailure => "internal server error".to_string(),
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if self.kind() == ErrorKind::InternalFailure {
            tracing::error!(error = %self, "request failed with internal error");
        }

        let body = ErrorResponse {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            code: self.code().to_string(),
            message: self.response_message(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        (status, Json(body)).into_response()
    }
}
