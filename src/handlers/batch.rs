use crate::error::{ApiError, ErrorResponse};
use crate::models::{BatchRequest, BatchResponse};
use crate::routes;
use crate::state::AppState;
use crate::store::BatchOperation;
use axum::{extract::rejection::JsonRejection, extract::State, http::StatusCode, Json};

/// POST /_manage/routes/batch handler - Activate, deactivate or hard delete many routes
///
/// Unknown ids are skipped; `affected` counts the rows actually touched.
#[utoipa::path(
    post,
    path = routes::ROUTES_BATCH,
    request_body = BatchRequest,
    responses(
        (status = 200, description = "Operation applied", body = BatchResponse),
        (status = 400, description = "Unknown operation or invalid body", body = ErrorResponse),
        (status = 401, description = "Missing or wrong API key", body = ErrorResponse),
        (status = 500, description = "Database error", body = ErrorResponse)
    ),
    security(("api_key" = [])),
    tag = "routes"
)]
pub async fn batch_handler(
    State(state): State<AppState>,
    payload: Result<Json<BatchRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<BatchResponse>), ApiError> {
    let Json(request) = payload?;
    let operation = BatchOperation::parse(&request.operation).ok_or_else(|| {
        ApiError::Validation(format!(
            "operation must be one of: activate, deactivate, delete, got '{}'",
            request.operation
        ))
    })?;

    let affected = state
        .store
        .batch_mutate(&request.route_ids, operation)
        .await?;

    tracing::info!(
        "Batch {} applied to {} of {} routes",
        operation.as_str(),
        affected,
        request.route_ids.len()
    );
    Ok((
        StatusCode::OK,
        Json(BatchResponse {
            message: format!("Batch {} completed", operation.as_str()),
            affected,
        }),
    ))
}
