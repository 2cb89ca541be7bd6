use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::types::ApiErrorResponse;

/// Application error codes following the pattern E{area}{sequence}
///
/// Ranges:
/// - E0xxx: Shared/infrastructure errors
/// - E2xxx: User and discovery errors
/// - E3xxx: Like and match errors
/// - E4xxx: Messaging errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    // Shared (E0xxx)
    InternalError,
    ValidationError,
    NotFound,
    Forbidden,
    ServiceUnavailable,
    BadRequest,

    // User / discovery (E2xxx)
    UserNotFound,
    LocationUnavailable,
    DailyLimitReached,

    // Likes / matches (E3xxx)
    CannotLikeSelf,
    InsufficientSuperLikes,
    MatchNotFound,

    // Messaging (E4xxx)
    NotMatchParticipant,
    PremiumRequired,
    EmptyMessage,
}

impl ErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            // Shared
            Self::InternalError => "E0001",
            Self::ValidationError => "E0002",
            Self::NotFound => "E0003",
            Self::Forbidden => "E0005",
            Self::ServiceUnavailable => "E0007",
            Self::BadRequest => "E0008",

            // User / discovery
            Self::UserNotFound => "E2001",
            Self::LocationUnavailable => "E2002",
            Self::DailyLimitReached => "E2003",

            // Likes / matches
            Self::CannotLikeSelf => "E3001",
            Self::InsufficientSuperLikes => "E3002",
            Self::MatchNotFound => "E3003",

            // Messaging
            Self::NotMatchParticipant => "E4001",
            Self::PremiumRequired => "E4002",
            Self::EmptyMessage => "E4003",
        }
    }

    /// Short, stable label rendered as the `error` field of the response body.
    pub fn title(&self) -> &'static str {
        match self {
            Self::InternalError => "Internal server error",
            Self::ValidationError => "Validation failed",
            Self::NotFound => "Not found",
            Self::Forbidden => "Forbidden",
            Self::ServiceUnavailable => "Service unavailable",
            Self::BadRequest => "Bad request",
            Self::UserNotFound => "User not found",
            Self::LocationUnavailable => "User location not available",
            Self::DailyLimitReached => "Daily limit reached",
            Self::CannotLikeSelf => "Cannot like yourself",
            Self::InsufficientSuperLikes => "Insufficient super likes",
            Self::MatchNotFound => "Match not found",
            Self::NotMatchParticipant => "Not a match participant",
            Self::PremiumRequired => "Premium required",
            Self::EmptyMessage => "Message content required",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::ValidationError | Self::BadRequest | Self::LocationUnavailable
            | Self::CannotLikeSelf | Self::EmptyMessage => StatusCode::BAD_REQUEST,
            Self::NotFound | Self::UserNotFound | Self::MatchNotFound => StatusCode::NOT_FOUND,
            Self::Forbidden | Self::DailyLimitReached | Self::InsufficientSuperLikes
            | Self::NotMatchParticipant | Self::PremiumRequired => StatusCode::FORBIDDEN,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{message}")]
    Known {
        code: ErrorCode,
        message: String,
        details: Option<serde_json::Value>,
    },

    #[error("internal server error")]
    Internal(#[from] anyhow::Error),

    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("validation error: {0}")]
    Validation(String),
}

impl AppError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Known {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(code: ErrorCode, message: impl Into<String>, details: serde_json::Value) -> Self {
        Self::Known {
            code,
            message: message.into(),
            details: Some(details),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::BadRequest, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Forbidden, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    pub fn user_not_found() -> Self {
        Self::new(ErrorCode::UserNotFound, "user not found")
    }

    /// The classified code, if any. Unclassified failures report `None`.
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            AppError::Known { code, .. } => Some(*code),
            AppError::Validation(_) => Some(ErrorCode::ValidationError),
            AppError::Database(diesel::result::Error::NotFound) => Some(ErrorCode::NotFound),
            AppError::Internal(_) | AppError::Database(_) => None,
        }
    }

    /// Replaces an unclassified failure with a fixed, route-specific 500 message.
    /// Classified errors pass through untouched.
    pub fn or_fail(self, message: &'static str) -> Self {
        match self {
            AppError::Internal(ref err) => {
                tracing::error!(error = %err, "{message}");
                Self::internal(message)
            }
            AppError::Database(ref err) if !matches!(err, diesel::result::Error::NotFound) => {
                tracing::error!(error = %err, "{message}");
                Self::internal(message)
            }
            other => other,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_response) = match &self {
            AppError::Known { code, message, details } => {
                let status = code.status_code();
                let mut resp = ApiErrorResponse::new(code.code(), code.title()).with_message(message);
                if let Some(d) = details {
                    resp = resp.with_details(d.clone());
                }
                (status, resp)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiErrorResponse::new("E0001", "Internal server error"),
                )
            }
            AppError::Database(err) => {
                tracing::error!(error = %err, "database error");
                match err {
                    diesel::result::Error::NotFound => (
                        StatusCode::NOT_FOUND,
                        ApiErrorResponse::new("E0003", "Not found"),
                    ),
                    _ => (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        ApiErrorResponse::new("E0001", "Database error"),
                    ),
                }
            }
            AppError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                ApiErrorResponse::new("E0002", "Validation failed").with_message(msg),
            ),
        };

        (status, Json(error_response)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
