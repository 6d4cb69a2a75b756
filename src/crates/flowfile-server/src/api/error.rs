//! API error type and its HTTP conversion, grounded on
//! `orchestrator::api::error::ApiError` (a `thiserror` enum with a
//! `status_code` match arm per variant and a blanket `IntoResponse`), but
//! with the response body narrowed to spec §6's `{"detail": "..."}` shape
//! rather than the teacher's richer `{error, message, code}` envelope.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use flowfile_types::FlowfileError;
use serde::Serialize;
use thiserror::Error;

use crate::db::DatabaseError;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub detail: String,
}

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Flow(#[from] FlowfileError),

    #[error(transparent)]
    Runtime(#[from] flowfile_runtime::RuntimeError),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Flow(FlowfileError::Validation { .. })
            | ApiError::Flow(FlowfileError::PlanInvalid { .. }) => StatusCode::BAD_REQUEST,
            ApiError::Flow(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Runtime(flowfile_runtime::RuntimeError::UnknownRun(_)) => StatusCode::NOT_FOUND,
            ApiError::Runtime(flowfile_runtime::RuntimeError::AlreadyRunning) => StatusCode::CONFLICT,
            ApiError::Runtime(flowfile_runtime::RuntimeError::Flow(inner)) => {
                ApiError::Flow(inner.clone()).status_code()
            }
            ApiError::Database(db) if db.is_not_found() => StatusCode::NOT_FOUND,
            ApiError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "request failed");
        }
        (status, Json(ErrorBody { detail: self.to_string() })).into_response()
    }
}
