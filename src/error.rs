use actix_web::error::{JsonPayloadError, QueryPayloadError};
use actix_web::{HttpRequest, HttpResponse, ResponseError, http::StatusCode};
use derive_more::Display;
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{debug, error};

use crate::model::permission::PermKey;

#[derive(Debug, Display)]
pub enum AppError {
    /// Bad form input. `input` echoes what was submitted so the client can
    /// re-render the form.
    #[display(fmt = "{}", message)]
    Validation {
        message: String,
        input: Option<Value>,
    },
    #[display(fmt = "Login required")]
    Unauthorized,
    #[display(fmt = "Invalid credentials")]
    InvalidCredentials,
    #[display(fmt = "No permission for {}", _0)]
    Forbidden(PermKey),
    #[display(fmt = "Only the master account may manage users and permissions")]
    AdminOnly,
    #[display(fmt = "{} not found", _0)]
    NotFound(&'static str),
    #[display(fmt = "{}", _0)]
    Conflict(String),
    #[display(fmt = "Database error: {}", _0)]
    Database(sqlx::Error),
    #[display(fmt = "Internal error: {}", _0)]
    Internal(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation {
            message: message.into(),
            input: None,
        }
    }

    pub fn invalid_input<T: Serialize>(message: impl Into<String>, input: &T) -> Self {
        AppError::Validation {
            message: message.into(),
            input: serde_json::to_value(input).ok(),
        }
    }
}

/// Body that does not deserialize into the handler's form type.
pub fn json_error_handler(err: JsonPayloadError, req: &HttpRequest) -> actix_web::Error {
    debug!(path = %req.path(), error = %err, "Rejected request body");
    let message = match &err {
        JsonPayloadError::Deserialize(e) => format!("Invalid form data: {e}"),
        other => other.to_string(),
    };
    AppError::validation(message).into()
}

/// Query string that does not deserialize; the raw query is echoed back.
pub fn query_error_handler(err: QueryPayloadError, req: &HttpRequest) -> actix_web::Error {
    debug!(path = %req.path(), error = %err, "Rejected query string");
    AppError::invalid_input(
        format!("Invalid query: {err}"),
        &json!({ "query": req.query_string() }),
    )
    .into()
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        AppError::Database(e)
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation { .. } => StatusCode::BAD_REQUEST,
            AppError::Unauthorized | AppError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) | AppError::AdminOnly => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = match self {
            AppError::Validation { message, input } => json!({
                "error": "validation",
                "message": message,
                "input": input,
            }),
            AppError::Unauthorized | AppError::InvalidCredentials => json!({
                "error": "unauthorized",
                "message": self.to_string(),
            }),
            AppError::Forbidden(key) => json!({
                "error": "no_permission",
                "message": self.to_string(),
                "permission": key,
            }),
            AppError::AdminOnly => json!({
                "error": "no_permission",
                "message": self.to_string(),
            }),
            AppError::NotFound(_) => json!({
                "error": "not_found",
                "message": self.to_string(),
            }),
            AppError::Conflict(message) => json!({
                "error": "conflict",
                "message": message,
            }),
            AppError::Database(e) => {
                error!(error = %e, "Database failure");
                json!({
                    "error": "internal",
                    "message": "Something went wrong, Contact with system admin",
                })
            }
            AppError::Internal(e) => {
                error!(error = %e, "Internal failure");
                json!({
                    "error": "internal",
                    "message": "Something went wrong, Contact with system admin",
                })
            }
        };
        HttpResponse::build(self.status_code()).json(body)
    }
}
