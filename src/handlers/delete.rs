use crate::error::{ApiError, ErrorResponse};
use crate::models::MessageResponse;
use crate::routes;
use crate::state::AppState;
use axum::{extract::State, extract::Path, http::StatusCode, Json};
use uuid::Uuid;

/// POST /_manage/routes/delete1/{id} handler - Soft delete
///
/// The record stays in the store with `is_active = false`, so its path stays taken.
#[utoipa::path(
    post,
    path = routes::ROUTE_SOFT_DELETE,
    params(
        ("id" = String, Path, description = "UUID of the route")
    ),
    responses(
        (status = 200, description = "Route deactivated", body = MessageResponse),
        (status = 400, description = "Invalid UUID format", body = ErrorResponse),
        (status = 401, description = "Missing or wrong API key", body = ErrorResponse),
        (status = 404, description = "Route not found", body = ErrorResponse),
        (status = 500, description = "Database error", body = ErrorResponse)
    ),
    security(("api_key" = [])),
    tag = "routes"
)]
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(id_str): Path<String>,
) -> Result<(StatusCode, Json<MessageResponse>), ApiError> {
    let id = Uuid::parse_str(&id_str).map_err(|_| ApiError::InvalidUuid(id_str.clone()))?;

    state.store.soft_delete(id).await?;

    tracing::info!("Soft deleted route {}", id);
    Ok((
        StatusCode::OK,
        Json(MessageResponse {
            message: "Route deleted".to_string(),
        }),
    ))
}
