//! Error types for the ApiGateway and their HTTP mapping

use account_service::{AccountServiceError, ErrorKind};
use serde::Serialize;
use std::convert::Infallible;
use thiserror::Error;
use tracing::error;
use warp::http::StatusCode;
use warp::{Rejection, Reply};

/// Errors that can occur in the ApiGateway
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error(transparent)]
    Account(#[from] AccountServiceError),

    #[error("Authentication failed: {0}")]
    Unauthorized(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl warp::reject::Reject for GatewayError {}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::Account(e) => match e.kind() {
                ErrorKind::NotFound => StatusCode::NOT_FOUND,
                ErrorKind::Validation => StatusCode::BAD_REQUEST,
                ErrorKind::Persistence => StatusCode::INTERNAL_SERVER_ERROR,
            },
            GatewayError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            GatewayError::Serialization(_) | GatewayError::Config(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn code(&self) -> &'static str {
        match self.status() {
            StatusCode::NOT_FOUND => "NOT_FOUND",
            StatusCode::BAD_REQUEST => "VALIDATION_FAILED",
            StatusCode::UNAUTHORIZED => "UNAUTHORIZED",
            _ => "INTERNAL_ERROR",
        }
    }
}

/// Result type for ApiGateway operations
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Turn a service error into a warp rejection
pub fn reject(err: impl Into<GatewayError>) -> Rejection {
    warp::reject::custom(err.into())
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
    pub timestamp: String,
}

/// Error detail
#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail { code: code.to_string(), message: message.into() },
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Render any rejection as a JSON error body with a matching status
pub async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let (status, body) = if err.is_not_found() {
        (StatusCode::NOT_FOUND, ErrorResponse::new("NOT_FOUND", "Route not found"))
    } else if let Some(e) = err.find::<GatewayError>() {
        let status = e.status();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("Request failed: {}", e);
            (status, ErrorResponse::new(e.code(), "Internal server error"))
        } else {
            (status, ErrorResponse::new(e.code(), e.to_string()))
        }
    } else if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
        (StatusCode::BAD_REQUEST, ErrorResponse::new("VALIDATION_FAILED", e.to_string()))
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        (StatusCode::PAYLOAD_TOO_LARGE, ErrorResponse::new("PAYLOAD_TOO_LARGE", "Request body too large"))
    } else if err.find::<warp::reject::UnsupportedMediaType>().is_some() {
        (
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ErrorResponse::new("UNSUPPORTED_MEDIA_TYPE", "Expected application/json"),
        )
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, ErrorResponse::new("METHOD_NOT_ALLOWED", "Method not allowed"))
    } else {
        error!("Unhandled rejection: {:?}", err);
        (StatusCode::INTERNAL_SERVER_ERROR, ErrorResponse::new("INTERNAL_ERROR", "Internal server error"))
    };

    Ok(warp::reply::with_status(warp::reply::json(&body), status))
}
