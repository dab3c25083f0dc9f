use std::collections::BTreeMap;

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Field name -> validation messages, serialized as the `errors` object.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

#[derive(Debug)]
pub enum AppError {
    NotFound(String),
    Unauthorized(String),
    BadRequest(String),
    RateLimited(String),
    Validation(FieldErrors),
    BadGateway(String),
    Internal(String),
    Database(sqlx::Error),
}

impl AppError {
    /// Single-field validation failure.
    pub fn invalid_field(field: &str, message: &str) -> Self {
        let mut errors = FieldErrors::new();
        errors.insert(field.to_string(), vec![message.to_string()]);
        AppError::Validation(errors)
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            AppError::Internal(_) | AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The message shown to clients. Server-side detail stays in the log.
    fn public_message(&self) -> &str {
        match self {
            AppError::NotFound(msg)
            | AppError::Unauthorized(msg)
            | AppError::BadRequest(msg)
            | AppError::RateLimited(msg)
            | AppError::BadGateway(msg) => msg,
            AppError::Validation(_) => "Validation failed",
            AppError::Internal(_) | AppError::Database(_) => "Internal server error",
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppError::Validation(errors) => {
                let fields: Vec<&str> = errors.keys().map(String::as_str).collect();
                write!(f, "validation failed on {}", fields.join(", "))
            }
            AppError::Internal(msg) => write!(f, "internal error: {msg}"),
            AppError::Database(err) => write!(f, "database error: {err}"),
            other => write!(f, "{} ({})", other.public_message(), other.status()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            AppError::Internal(_) | AppError::Database(_) => tracing::error!("{self}"),
            AppError::BadGateway(msg) => tracing::warn!("Upstream error: {msg}"),
            _ => {}
        }

        let mut body = json!({ "success": false, "message": self.public_message() });
        if let AppError::Validation(errors) = self {
            body["errors"] = json!(errors);
        }
        (status, axum::Json(body)).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(format!("Invalid request body: {}", rejection.body_text()))
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Database(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_is_unprocessable() {
        let err = AppError::invalid_field("cpf", "The cpf is not a valid CPF.");
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.public_message(), "Validation failed");
        assert_eq!(err.to_string(), "validation failed on cpf");
    }

    #[test]
    fn internal_detail_is_hidden() {
        let err = AppError::Internal("argon2 exploded".to_string());
        assert_eq!(err.public_message(), "Internal server error");
        assert!(err.to_string().contains("argon2 exploded"));
    }
}
