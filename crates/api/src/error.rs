//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use checkout::CheckoutError;

/// Message returned for every 5xx response. Details go to the log only.
const INTERNAL_MESSAGE: &str = "internal server error";

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// No authenticated user.
    Unauthorized(String),
    /// Checkout or order lookup error.
    Checkout(CheckoutError),
    /// Internal server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, error_body(msg)),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, error_body(msg)),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, error_body(msg)),
            ApiError::Checkout(err) => checkout_error_to_response(err),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    error_body(INTERNAL_MESSAGE.to_string()),
                )
            }
        };

        (status, axum::Json(body)).into_response()
    }
}

fn error_body(message: String) -> serde_json::Value {
    serde_json::json!({ "error": message })
}

fn checkout_error_to_response(err: CheckoutError) -> (StatusCode, serde_json::Value) {
    match &err {
        CheckoutError::Validation(_) => (StatusCode::BAD_REQUEST, error_body(err.to_string())),
        CheckoutError::ProductNotFound(_) | CheckoutError::OrderNotFound(_) => {
            (StatusCode::NOT_FOUND, error_body(err.to_string()))
        }
        CheckoutError::InsufficientStock { .. } => {
            (StatusCode::CONFLICT, error_body(err.to_string()))
        }
        CheckoutError::PaymentDeclined { order_id } => (
            StatusCode::PAYMENT_REQUIRED,
            serde_json::json!({
                "error": "Payment declined",
                "orderId": order_id,
            }),
        ),
        CheckoutError::Payment(_) | CheckoutError::Storage(_) | CheckoutError::Internal(_) => {
            tracing::error!(error = %err, "checkout failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_body(INTERNAL_MESSAGE.to_string()),
            )
        }
    }
}

impl From<CheckoutError> for ApiError {
    fn from(err: CheckoutError) -> Self {
        ApiError::Checkout(err)
    }
}
