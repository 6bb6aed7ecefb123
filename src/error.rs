use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::db::StoreError;

const INTERNAL_SERVER_ERROR_MESSAGE: &str = "internal server error";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("validation failed")]
    Validation(Vec<FieldError>),

    /// Body could not be read at all; keeps the rejection's own status.
    #[error("{message}")]
    Rejected { status: StatusCode, message: String },

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection {
            JsonRejection::BytesRejection(e) => ApiError::Rejected {
                status: e.status(),
                message: e.body_text(),
            },
            other => ApiError::Validation(vec![FieldError::new("body", other.body_text())]),
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::Validation(vec![FieldError::new("query", rejection.body_text())])
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::Validation(vec![FieldError::new("path", rejection.body_text())])
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            ApiError::Validation(errors) => (StatusCode::UNPROCESSABLE_ENTITY, json!(errors)),
            ApiError::Rejected { status, message } => (status, json!(message)),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, json!(msg)),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, json!(msg)),
            ApiError::Store(StoreError::Duplicate) => {
                (StatusCode::CONFLICT, json!("resource already exists"))
            }
            ApiError::Store(e) => {
                error!(error = %e, source = ?std::error::Error::source(&e), "store failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!(INTERNAL_SERVER_ERROR_MESSAGE),
                )
            }
            ApiError::Internal(e) => {
                error!(error = %e, "internal failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!(INTERNAL_SERVER_ERROR_MESSAGE),
                )
            }
        };

        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_failures_hide_internal_detail() {
        let response = ApiError::Store(StoreError::Unavailable(sqlx::Error::PoolTimedOut))
            .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn duplicate_maps_to_conflict() {
        let response = ApiError::Store(StoreError::Duplicate).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn domain_errors_keep_their_status() {
        assert_eq!(
            ApiError::NotFound("gone".into()).into_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::Validation(vec![FieldError::new("email", "bad")])
                .into_response()
                .status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }
}
