use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use storefront_core::{DomainError, FieldErrors};
use storefront_infra::RepositoryError;

use crate::app::dto::Envelope;

pub type ApiResult<T> = Result<T, ApiError>;

/// Everything a handler can fail with, mapped onto the response envelope.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Unparsable body, id or query parameter.
    #[error("{message}: {detail}")]
    BadInput {
        message: &'static str,
        detail: String,
    },

    #[error("validation failed: {0}")]
    Validation(FieldErrors),

    #[error("Missing or malformed token")]
    MissingToken,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Invalid username or password")]
    InvalidCredentials,

    /// Absent resource, or one the caller may not see.
    #[error("{0}")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(&'static str),

    #[error("storage failure: {0}")]
    Storage(String),

    /// Hashing, signing or task failures.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self::BadInput {
            message: "Bad request",
            detail: detail.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadInput { .. } | ApiError::Validation(_) | ApiError::MissingToken => {
                StatusCode::BAD_REQUEST
            }
            ApiError::InvalidToken | ApiError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Storage(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            ApiError::BadInput { message, detail } => Envelope::failure(message, Some(json!(detail))),
            ApiError::Validation(fields) => {
                let message = fields.to_string();
                Envelope::failure(message, Some(json!(fields)))
            }
            ApiError::Storage(detail) => {
                tracing::error!(error = %detail, "storage failure");
                Envelope::failure("Internal server error", Some(json!(detail)))
            }
            ApiError::Internal(detail) => {
                tracing::error!(error = %detail, "internal failure");
                Envelope::failure("Internal server error", None)
            }
            other => Envelope::failure(other.to_string(), None),
        };
        (status, Json(body)).into_response()
    }
}

impl From<FieldErrors> for ApiError {
    fn from(value: FieldErrors) -> Self {
        Self::Validation(value)
    }
}

impl From<DomainError> for ApiError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(fields) => Self::Validation(fields),
            DomainError::InvalidId(msg) | DomainError::InvalidParameter(msg) => Self::bad_request(msg),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(value: JsonRejection) -> Self {
        Self::BadInput {
            message: "Failed to parse the request body",
            detail: value.body_text(),
        }
    }
}

/// Repository errors out of context. Call sites that know which resource
/// went missing map `NotFound` themselves.
impl From<RepositoryError> for ApiError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::NotFound(_) => Self::NotFound("Not found"),
            RepositoryError::Conflict(_) => Self::Conflict("Username already in use"),
            err @ (RepositoryError::Timeout { .. } | RepositoryError::Backend(_)) => {
                Self::Storage(err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn statuses_follow_the_error_kind() {
        assert_eq!(ApiError::MissingToken.status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::InvalidToken.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::NotFound("Store not found").status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::from(RepositoryError::Conflict("username")).status(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn timeouts_surface_as_storage_failures() {
        let err = ApiError::from(RepositoryError::Timeout {
            operation: "accounts.get",
            budget: Duration::from_secs(1),
        });
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.to_string().contains("timed out"));
    }

    #[test]
    fn invalid_page_is_bad_input() {
        let err = ApiError::from(DomainError::invalid_parameter("page must be >= 1"));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }
}
