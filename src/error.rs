use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Rejections produced while validating user input (ids and subscription patterns).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("user id can't be blank")]
    EmptyUserId,

    #[error("incorrect format, expected format: \"Mon 15:00 2\"")]
    BadFormat,

    #[error("unknown day of the week: {0}")]
    UnknownWeekday(String),

    #[error("incorrect time format: \"{0}\", expected HH:MM between 00:00 and 23:59")]
    BadTimeFormat(String),

    #[error("incorrect duration: \"{0}\", must be a whole number equal or greater than 1")]
    BadDuration(String),
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Persistence error: {0}")]
    Persistence(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Upstream fetch error: {0}")]
    UpstreamFetch(String),

    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Telegram error: {0}")]
    Telegram(String),

    #[error("Internal error")]
    Internal(#[from] anyhow::Error),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

/// Machine-readable shape of an error, used by the HTTP surface.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

impl AppError {
    pub fn user_not_found() -> Self {
        AppError::NotFound("user not found".to_string())
    }

    pub fn subscription_not_found() -> Self {
        AppError::NotFound("subscription not found".to_string())
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Persistence(_) => "PERSISTENCE_ERROR",
            AppError::Serialization(_) => "SERIALIZATION_ERROR",
            AppError::UpstreamFetch(_) | AppError::Request(_) => "UPSTREAM_FETCH_FAILED",
            AppError::Telegram(_) => "TELEGRAM_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::UpstreamFetch(_) | AppError::Request(_) | AppError::Telegram(_) => {
                StatusCode::BAD_GATEWAY
            }
            AppError::Persistence(_) | AppError::Serialization(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Text shown to the chat user who issued a command.
    ///
    /// Input problems are echoed verbatim so the user can fix their command;
    /// everything else is logged and replaced with a generic message.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Validation(e) => e.to_string(),
            AppError::NotFound(msg) => msg.clone(),
            AppError::Persistence(e) => {
                tracing::error!("Persistence error: {:?}", e);
                "your change was applied but could not be saved, please try again later"
                    .to_string()
            }
            AppError::UpstreamFetch(msg) => {
                tracing::error!("Upstream fetch error: {}", msg);
                "booking data is unavailable right now, please try again later".to_string()
            }
            AppError::Request(e) => {
                tracing::error!("HTTP request error: {:?}", e);
                "booking data is unavailable right now, please try again later".to_string()
            }
            other => {
                tracing::error!("Internal error: {:?}", other);
                "something went wrong, please try again later".to_string()
            }
        }
    }

    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            code: self.code(),
            message: self.user_message(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorResponse { error: self.body() };
        (self.status(), Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
