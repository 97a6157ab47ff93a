use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sqlx::migrate::MigrateError;
use serde::Serialize;
use thiserror::Error;

/// Top-level error type for the entire application
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Payment error: {0}")]
    Payment(#[from] PaymentError),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),
}

/// Payment gateway client errors.
///
/// The gateway is untrusted: requests may time out, return unexpected
/// statuses, or succeed without the caller ever seeing the response.
/// Everything except `RetryBudgetExhausted` is retried internally.
#[derive(Error, Debug)]
pub enum PaymentError {
    #[error("gateway transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("[GET /payments] unexpected status code ({0})")]
    UnexpectedStatus(reqwest::StatusCode),

    #[error("unexpected number of payments: {local} != {remote}")]
    ReconciliationMismatch { local: usize, remote: usize },

    #[error("ride ledger read failed: {0}")]
    Ledger(#[source] anyhow::Error),

    #[error("maximum retry limit reached: {0}")]
    RetryBudgetExhausted(#[source] Box<PaymentError>),
}

/// API error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match &self {
            AppError::NotFound(what) => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                format!("Not found: {}", what),
            ),
            AppError::BadRequest(reason) => (
                StatusCode::BAD_REQUEST,
                "BAD_REQUEST",
                reason.clone(),
            ),
            AppError::Payment(PaymentError::RetryBudgetExhausted(cause)) => (
                StatusCode::BAD_GATEWAY,
                "SETTLEMENT_RETRY_EXHAUSTED",
                format!("maximum retry limit reached: {}", cause),
            ),
            AppError::Payment(err) => (
                StatusCode::BAD_GATEWAY,
                "SETTLEMENT_FAILED",
                err.to_string(),
            ),
            AppError::Database(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "DATABASE_ERROR",
                "A database error occurred".to_string(),
            ),
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
            ),
        };

        let body = Json(ErrorResponse {
            error: message,
            error_code: error_code.to_string(),
            details: None,
        });

        (status, body).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        AppError::Internal(format!("Error converting: {:?}", error))
    }
}

impl From<MigrateError> for AppError {
    fn from(error: MigrateError) -> Self {
        AppError::Internal(format!("Migration error: {:?}", error))
    }
}

/// Result type alias for the application
pub type AppResult<T> = Result<T, AppError>;
