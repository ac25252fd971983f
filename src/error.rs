use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

pub type AppResult<T> = Result<T, PaymentError>;

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("Payment gateway unavailable: {message}")]
    GatewayUnavailable { message: String },

    #[error("Payment gateway protocol error: {message}")]
    GatewayProtocol { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Malformed callback: {message}")]
    MalformedCallback { message: String },

    #[error("Callback failed integrity verification for reference {reference}")]
    Unverified { reference: String },

    #[error("Unknown transaction reference: {reference}")]
    UnknownReference { reference: String },

    #[error("Transaction {reference} is already settled")]
    AlreadySettled { reference: String },

    #[error("Transaction reference {reference} is already recorded")]
    DuplicateReference { reference: String },
}

impl PaymentError {
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    pub fn gateway_unavailable(message: impl Into<String>) -> Self {
        Self::GatewayUnavailable {
            message: message.into(),
        }
    }

    pub fn gateway_protocol(message: impl Into<String>) -> Self {
        Self::GatewayProtocol {
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn malformed_callback(message: impl Into<String>) -> Self {
        Self::MalformedCallback {
            message: message.into(),
        }
    }

    pub fn unverified(reference: impl Into<String>) -> Self {
        Self::Unverified {
            reference: reference.into(),
        }
    }

    pub fn unknown_reference(reference: impl Into<String>) -> Self {
        Self::UnknownReference {
            reference: reference.into(),
        }
    }

    pub fn already_settled(reference: impl Into<String>) -> Self {
        Self::AlreadySettled {
            reference: reference.into(),
        }
    }

    pub fn duplicate_reference(reference: impl Into<String>) -> Self {
        Self::DuplicateReference {
            reference: reference.into(),
        }
    }

    /// Errors raised while talking to the gateway. Both surface as 502.
    pub fn is_gateway_failure(&self) -> bool {
        matches!(
            self,
            PaymentError::GatewayUnavailable { .. } | PaymentError::GatewayProtocol { .. }
        )
    }

    /// Errors produced by the callback receiver. These are logged and
    /// acknowledged, never returned to a client.
    pub fn is_callback_rejection(&self) -> bool {
        matches!(
            self,
            PaymentError::MalformedCallback { .. }
                | PaymentError::Unverified { .. }
                | PaymentError::UnknownReference { .. }
                | PaymentError::AlreadySettled { .. }
        )
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl IntoResponse for PaymentError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match &self {
            PaymentError::InvalidRequest { message } => {
                (StatusCode::BAD_REQUEST, "invalid_request", message.clone())
            }
            PaymentError::GatewayUnavailable { .. } => (
                StatusCode::BAD_GATEWAY,
                "gateway_unavailable",
                "Payment gateway is unavailable. Please try again later.".to_string(),
            ),
            PaymentError::GatewayProtocol { .. } => (
                StatusCode::BAD_GATEWAY,
                "gateway_error",
                "Payment gateway rejected the request.".to_string(),
            ),
            PaymentError::Configuration { .. } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "configuration_error",
                "Payment integration is misconfigured.".to_string(),
            ),
            PaymentError::MalformedCallback { message } => {
                (StatusCode::BAD_REQUEST, "malformed_callback", message.clone())
            }
            PaymentError::Unverified { .. } => (
                StatusCode::BAD_REQUEST,
                "unverified",
                "Notification could not be verified.".to_string(),
            ),
            PaymentError::UnknownReference { reference } => (
                StatusCode::NOT_FOUND,
                "unknown_reference",
                format!("Unknown reference {}", reference),
            ),
            PaymentError::AlreadySettled { reference } => (
                StatusCode::CONFLICT,
                "already_settled",
                format!("Transaction {} is already settled", reference),
            ),
            PaymentError::DuplicateReference { .. } => (
                StatusCode::CONFLICT,
                "duplicate_reference",
                "Payment reference collided with an existing transaction.".to_string(),
            ),
        };

        let body = ErrorResponse {
            error: error_type.to_string(),
            message,
        };

        (status, Json(body)).into_response()
    }
}

impl From<reqwest::Error> for PaymentError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            PaymentError::gateway_unavailable(format!("request timed out: {}", err))
        } else if err.is_connect() {
            PaymentError::gateway_unavailable(format!("connection failed: {}", err))
        } else if err.is_decode() {
            PaymentError::gateway_protocol(format!("unreadable response: {}", err))
        } else {
            PaymentError::gateway_unavailable(format!("request error: {}", err))
        }
    }
}
