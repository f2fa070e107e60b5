//! HTTP-facing error type.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::error;

use db::DbError;
use engine::EngineError;

/// Every handler returns `Result<_, ApiError>`; the response body is
/// `{"error": {"message": ...}}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(&'static str),

    #[error("{0}")]
    BadRequest(String),

    /// A run failed; the message is the execution's recorded error.
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Database(#[from] DbError),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    /// Map a lookup failure, naming the missing record on `NotFound`.
    pub fn lookup(err: DbError, missing: &'static str) -> Self {
        match err {
            DbError::NotFound => Self::NotFound(missing),
            other => Self::Database(other),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Database(DbError::NotFound) => StatusCode::NOT_FOUND,
            Self::Engine(_) | Self::Database(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(%status, "request failed: {self}");
        }
        let body = json!({ "error": { "message": self.to_string() } });
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookups_name_the_missing_record() {
        let err = ApiError::lookup(DbError::NotFound, "Workflow not found");
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.to_string(), "Workflow not found");

        let err = ApiError::lookup(DbError::ExecutionFinished(uuid::Uuid::nil()), "x");
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn validation_and_engine_errors_map_to_status() {
        assert_eq!(
            ApiError::BadRequest("duplicate node ID: 'a'".into()).status(),
            StatusCode::BAD_REQUEST
        );
        let engine = ApiError::from(EngineError::NoTriggerNode);
        assert_eq!(engine.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(engine.to_string(), "workflow has no trigger node");
    }
}
