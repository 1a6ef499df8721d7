use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Authorization error: {0}")]
    Authorization(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Concurrent update retries exhausted after {attempts} attempts")]
    ConflictExhausted { attempts: u32 },

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("Rate limit exceeded")]
    RateLimit,
}

/// Stable error codes carried in every error body; clients match on these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorCode {
    NotFound,
    Unavailable,
    ConflictExhausted,
    Unauthenticated,
    Permission,
    BadRequest,
    RateLimited,
    Internal,
}

impl ErrorCode {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorCode::Unavailable | ErrorCode::ConflictExhausted | ErrorCode::RateLimited
        )
    }
}

impl AppError {
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Database(e) if is_connectivity_error(e) => ErrorCode::Unavailable,
            AppError::Database(sqlx::Error::RowNotFound) => ErrorCode::NotFound,
            AppError::Database(_) => ErrorCode::Internal,
            AppError::Redis(_) => ErrorCode::Unavailable,
            AppError::Authentication(_) | AppError::Jwt(_) => ErrorCode::Unauthenticated,
            AppError::Authorization(_) => ErrorCode::Permission,
            AppError::NotFound(_) => ErrorCode::NotFound,
            AppError::ConflictExhausted { .. } => ErrorCode::ConflictExhausted,
            AppError::Unavailable(_) => ErrorCode::Unavailable,
            AppError::BadRequest(_) => ErrorCode::BadRequest,
            AppError::Internal(_) => ErrorCode::Internal,
            AppError::RateLimit => ErrorCode::RateLimited,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.code().is_retryable()
    }

    fn status(&self) -> StatusCode {
        match self.code() {
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorCode::ConflictExhausted => StatusCode::CONFLICT,
            ErrorCode::Unauthenticated => StatusCode::UNAUTHORIZED,
            ErrorCode::Permission => StatusCode::FORBIDDEN,
            ErrorCode::BadRequest => StatusCode::BAD_REQUEST,
            ErrorCode::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

fn is_connectivity_error(e: &sqlx::Error) -> bool {
    matches!(
        e,
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_)
    )
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();

        let error_message = match self {
            AppError::Database(ref e) => {
                tracing::error!("Database error: {:?}", e);
                if code == ErrorCode::Unavailable {
                    "Service temporarily unavailable".to_string()
                } else {
                    "Internal server error".to_string()
                }
            }
            AppError::Redis(ref e) => {
                tracing::error!("Redis error: {:?}", e);
                "Service temporarily unavailable".to_string()
            }
            AppError::Internal(ref message) => {
                tracing::error!("Internal error: {}", message);
                "Internal server error".to_string()
            }
            AppError::Unavailable(ref message) => {
                tracing::error!("Store unavailable: {}", message);
                "Service temporarily unavailable".to_string()
            }
            AppError::Jwt(ref e) => {
                tracing::debug!("JWT error: {:?}", e);
                "Invalid token".to_string()
            }
            AppError::Authentication(ref message)
            | AppError::Authorization(ref message)
            | AppError::NotFound(ref message)
            | AppError::BadRequest(ref message) => message.clone(),
            AppError::ConflictExhausted { .. } | AppError::RateLimit => self.to_string(),
        };

        let body = Json(json!({
            "error": error_message,
            "code": code,
            "status": status.as_u16(),
            "retryable": code.is_retryable(),
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
