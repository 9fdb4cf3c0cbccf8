use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// ServiceResponse
///
/// The uniform JSON envelope returned by every endpoint, successful or not:
/// `{ "success": bool, "message": string, "status_code": number, "data": T | null }`.
/// The HTTP status of the response always equals `status_code`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceResponse<T> {
    pub success: bool,
    pub message: String,
    pub status_code: u16,
    pub data: Option<T>,
}

impl<T> ServiceResponse<T> {
    pub fn ok(data: T) -> Self {
        Self::with_status(StatusCode::OK, "OK", data)
    }

    pub fn created(data: T) -> Self {
        Self::with_status(StatusCode::CREATED, "Created", data)
    }

    pub fn with_status(status: StatusCode, message: impl Into<String>, data: T) -> Self {
        Self {
            success: status.is_success(),
            message: message.into(),
            status_code: status.as_u16(),
            data: Some(data),
        }
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }
}

impl ServiceResponse<()> {
    pub fn failure(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            status_code: status.as_u16(),
            data: None,
        }
    }
}

impl<T: Serialize> IntoResponse for ServiceResponse<T> {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::OK);
        (status, Json(self)).into_response()
    }
}

/// ServiceError
///
/// Failure cases raised by services and handlers. Each variant maps to one HTTP status
/// and renders as a `ServiceResponse` with `success = false`.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    PaymentRequired(String),
    #[error("payment gateway error: {0}")]
    Gateway(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("{0}")]
    Internal(String),
}

impl ServiceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServiceError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ServiceError::Forbidden(_) => StatusCode::FORBIDDEN,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Conflict(_) => StatusCode::CONFLICT,
            ServiceError::PaymentRequired(_) => StatusCode::PAYMENT_REQUIRED,
            ServiceError::Gateway(_) => StatusCode::BAD_GATEWAY,
            ServiceError::Database(_) | ServiceError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn not_found(what: &str) -> Self {
        ServiceError::NotFound(format!("{} not found", what))
    }

    pub fn forbidden() -> Self {
        ServiceError::Forbidden("You do not have permission to perform this action".to_string())
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        // Internal details stay in the logs.
        let message = match &self {
            ServiceError::Database(e) => {
                tracing::error!("database error: {:?}", e);
                "Internal server error".to_string()
            }
            ServiceError::Internal(msg) => {
                tracing::error!("internal error: {}", msg);
                "Internal server error".to_string()
            }
            ServiceError::Gateway(msg) => {
                tracing::error!("payment gateway error: {}", msg);
                self.to_string()
            }
            other => other.to_string(),
        };
        ServiceResponse::failure(status, message).into_response()
    }
}

/// Result alias used by every handler.
pub type ApiResult<T> = Result<ServiceResponse<T>, ServiceError>;

/// Result alias used by services.
pub type ServiceResult<T> = Result<T, ServiceError>;
