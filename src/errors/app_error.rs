use axum::{
    Json,
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::engine::EngineError;
use crate::core::mastering::MasteringError;

/// Header carrying the per-request correlation token
pub const REQUEST_ID_HEADER: &str = "x-request-id";

pub type AppResult<T> = Result<T, AppError>;

/// Errors surfaced by the synthesis API
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad or missing client input
    #[error("{0}")]
    Validation(String),

    /// A server-side asset the request depends on is missing
    #[error("{0}")]
    ResourceNotFound(String),

    /// Synthesis or mastering failed
    #[error("{0}")]
    Engine(String),

    #[error("{0}")]
    Internal(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            // Unknown speakers are reported as a server asset gap, not a 404.
            AppError::ResourceNotFound(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Engine(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short machine-readable name used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation",
            AppError::ResourceNotFound(_) => "resource_not_found",
            AppError::Engine(_) => "engine",
            AppError::Internal(_) => "internal",
        }
    }

    /// Build the JSON error response tagged with `request_id`
    pub fn into_response_with_id(self, request_id: &str) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: self.to_string(),
            request_id: request_id.to_string(),
        };
        let mut response = (status, Json(body)).into_response();
        if let Ok(value) = HeaderValue::from_str(request_id) {
            response.headers_mut().insert(REQUEST_ID_HEADER, value);
        }
        response
    }
}

/// Error body returned to clients
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorResponse {
    pub error: String,
    pub request_id: String,
}

impl From<EngineError> for AppError {
    fn from(err: EngineError) -> Self {
        match err {
            // Failing to build the engine is not a synthesis failure.
            EngineError::Construction(_) | EngineError::ProgramNotFound(_) => {
                AppError::Internal(err.to_string())
            }
            other => AppError::Engine(other.to_string()),
        }
    }
}

impl From<MasteringError> for AppError {
    fn from(err: MasteringError) -> Self {
        AppError::Engine(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}
