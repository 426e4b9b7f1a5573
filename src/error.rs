use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dispatch::DispatchError;
use crate::store::StoreError;

/// Error response type
#[derive(Serialize, Deserialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

/// Custom error type for API endpoints
///
/// Every failure on the management surface and the mock surface ends up
/// here, mapped to a status code and a `{"error": ...}` JSON body.
#[derive(Debug)]
pub enum ApiError {
    /// Invalid UUID format in path parameter
    InvalidUuid(String),
    /// Missing or out-of-range field in a request body
    Validation(String),
    /// JSON parsing error
    JsonError(serde_json::Error),
    /// Invalid query parameter
    InvalidQueryParam(String),
    /// Missing or wrong `X-API-Key`
    Unauthorized,
    /// No route record with this id
    RouteNotFound(Uuid),
    /// No active route record for this path
    PathNotFound(String),
    /// Path exists but does not accept the method
    MethodNotAllowed { method: String, path: String },
    /// Another record already owns the path
    Conflict(String),
    /// Database operation error
    DatabaseError(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            ApiError::InvalidUuid(id) => (
                StatusCode::BAD_REQUEST,
                format!("Invalid UUID format: expected format like '550e8400-e29b-41d4-a716-446655440000', got '{}'", id),
            ),
            ApiError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                format!("Validation failed: {}", msg),
            ),
            ApiError::JsonError(err) => (
                StatusCode::BAD_REQUEST,
                format!("JSON parse error: {}", err),
            ),
            ApiError::InvalidQueryParam(msg) => (
                StatusCode::BAD_REQUEST,
                format!("Invalid query parameter: {}", msg),
            ),
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "Unauthorized".to_string(),
            ),
            ApiError::RouteNotFound(id) => (
                StatusCode::NOT_FOUND,
                format!("Route not found: {}", id),
            ),
            ApiError::PathNotFound(path) => (
                StatusCode::NOT_FOUND,
                format!("No route configured for path: {}", path),
            ),
            ApiError::MethodNotAllowed { method, path } => (
                StatusCode::METHOD_NOT_ALLOWED,
                format!("Method {} not allowed for path: {}", method, path),
            ),
            ApiError::Conflict(path) => (
                StatusCode::CONFLICT,
                format!("Route already exists for path: {}", path),
            ),
            ApiError::DatabaseError(err) => {
                tracing::error!("Database error: {:#}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("Database error: {}", err),
                )
            }
        };

        let body = Json(ErrorResponse {
            error: error_message,
        });

        (status, body).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => ApiError::RouteNotFound(id),
            StoreError::Conflict(path) => ApiError::Conflict(path),
            StoreError::Backend(err) => ApiError::DatabaseError(err),
        }
    }
}

impl From<DispatchError> for ApiError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::NotFound(path) => ApiError::PathNotFound(path),
            DispatchError::MethodNotAllowed { method, path } => {
                ApiError::MethodNotAllowed { method, path }
            }
            DispatchError::Store(err) => err.into(),
        }
    }
}

impl From<uuid::Error> for ApiError {
    fn from(err: uuid::Error) -> Self {
        ApiError::InvalidUuid(err.to_string())
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::DatabaseError(err)
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::JsonError(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(err: JsonRejection) -> Self {
        ApiError::Validation(err.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(err: QueryRejection) -> Self {
        ApiError::InvalidQueryParam(err.body_text())
    }
}
