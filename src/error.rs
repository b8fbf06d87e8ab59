use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use derive_more::Display;
use serde_json::json;

/// Typed failure of a ledger, register, report or approval operation.
#[derive(Debug, Display, Clone, PartialEq)]
pub enum AppError {
    /// Missing or malformed input, rejected before any side effect.
    #[display(fmt = "{}", _0)]
    Validation(String),

    #[display(fmt = "{}", _0)]
    NotFound(String),

    /// The request is well formed but the current state does not allow it.
    #[display(fmt = "{}", _0)]
    State(String),

    /// Spreadsheet, email or database unavailable or rejecting the call.
    #[display(fmt = "{} error: {}", service, message)]
    ExternalService {
        service: &'static str,
        message: String,
    },
}

impl std::error::Error for AppError {}

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        AppError::NotFound(msg.into())
    }

    pub fn state(msg: impl Into<String>) -> Self {
        AppError::State(msg.into())
    }

    pub fn external(service: &'static str, err: impl std::fmt::Display) -> Self {
        AppError::ExternalService {
            service,
            message: err.to_string(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation",
            AppError::NotFound(_) => "not_found",
            AppError::State(_) => "state",
            AppError::ExternalService { .. } => "external_service",
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        AppError::external("database", e)
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::State(_) => StatusCode::CONFLICT,
            AppError::ExternalService { service, .. } if *service == "database" => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::ExternalService { .. } => StatusCode::BAD_GATEWAY,
        }
    }

    fn error_response(&self) -> HttpResponse {
        // Database details stay in the log
        let message = match self {
            AppError::ExternalService { service, .. } if *service == "database" => {
                "Internal Server Error".to_string()
            }
            other => other.to_string(),
        };

        HttpResponse::build(self.status_code()).json(json!({
            "error": message,
            "kind": self.kind(),
        }))
    }
}
