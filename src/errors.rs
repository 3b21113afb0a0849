use std::collections::BTreeMap;

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

use crate::JsonResponse;

#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("not found: {0}")]
    NotFound(&'static str),
    #[error("not authorized: {0}")]
    NotAuthorized(&'static str),
    #[error("forbidden: {0}")]
    Forbidden(&'static str),
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("validation failed: {0:?}")]
    Validation(FieldErrors),
    #[error("internal server error")]
    ServerError,
    #[error("database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

/// Validation messages keyed by the offending field.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_owned())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[cfg(test)]
    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    /// `Ok(())` when nothing was recorded, otherwise a validation error.
    pub fn into_result(self) -> Result<(), RequestError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(RequestError::Validation(self))
        }
    }
}

#[derive(Serialize)]
pub struct RequestErrorJson {
    detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<FieldErrors>,
}

impl RequestErrorJson {
    pub fn new(detail: &str) -> RequestErrorJson {
        RequestErrorJson {
            detail: detail.to_string(),
            errors: None,
        }
    }
}

impl IntoResponse for RequestError {
    fn into_response(self) -> axum::response::Response {
        self.to_json_response().into_response()
    }
}

impl RequestError {
    pub fn to_json_response(&self) -> JsonResponse<RequestErrorJson> {
        let (status_code, json) = match self {
            RequestError::NotFound(message) => {
                (StatusCode::NOT_FOUND, RequestErrorJson::new(message))
            }
            RequestError::NotAuthorized(message) => {
                (StatusCode::UNAUTHORIZED, RequestErrorJson::new(message))
            }
            RequestError::Forbidden(message) => {
                (StatusCode::FORBIDDEN, RequestErrorJson::new(message))
            }
            RequestError::InvalidCredentials => (
                StatusCode::BAD_REQUEST,
                RequestErrorJson::new("Invalid credentials"),
            ),
            RequestError::Validation(errors) => (
                StatusCode::BAD_REQUEST,
                RequestErrorJson {
                    detail: "Invalid input.".to_string(),
                    errors: Some(errors.clone()),
                },
            ),
            RequestError::ServerError => (
                StatusCode::INTERNAL_SERVER_ERROR,
                RequestErrorJson::new("Internal Server Error"),
            ),
            RequestError::DatabaseError(e) => {
                tracing::error!(error = %e, "database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    RequestErrorJson::new("Internal Server Error"),
                )
            }
        };
        (status_code, Json(json))
    }

    /// Maps a UNIQUE constraint failure on `table.column` to a field error,
    /// passing every other error through.
    pub fn on_unique_violation(self, table_column: &str, field: &str, message: &str) -> Self {
        if let RequestError::DatabaseError(sqlx::Error::Database(e)) = &self {
            if e.message().contains("UNIQUE constraint failed")
                && e.message().contains(table_column)
            {
                return RequestError::Validation(FieldErrors::single(field, message));
            }
        }
        self
    }
}
