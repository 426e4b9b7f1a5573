use crate::error::{ApiError, ErrorResponse};
use crate::models::RouteResponse;
use crate::routes;
use crate::state::AppState;
use axum::{extract::State, extract::Path, http::StatusCode, Json};
use uuid::Uuid;

/// GET /_manage/routes/{id} handler - Fetch one route, active or not
#[utoipa::path(
    get,
    path = routes::ROUTE_ITEM,
    params(
        ("id" = String, Path, description = "UUID of the route")
    ),
    responses(
        (status = 200, description = "Route found", body = RouteResponse),
        (status = 400, description = "Invalid UUID format", body = ErrorResponse),
        (status = 401, description = "Missing or wrong API key", body = ErrorResponse),
        (status = 404, description = "Route not found", body = ErrorResponse),
        (status = 500, description = "Database error", body = ErrorResponse)
    ),
    security(("api_key" = [])),
    tag = "routes"
)]
pub async fn get_handler(
    State(state): State<AppState>,
    Path(id_str): Path<String>,
) -> Result<(StatusCode, Json<RouteResponse>), ApiError> {
    let id = Uuid::parse_str(&id_str).map_err(|_| ApiError::InvalidUuid(id_str.clone()))?;

    match state.store.get(id).await? {
        Some(record) => {
            tracing::debug!("Retrieved route {} ({})", id, record.path);
            Ok((StatusCode::OK, Json(RouteResponse::from(record))))
        }
        None => {
            tracing::info!("Route not found with id: {}", id);
            Err(ApiError::RouteNotFound(id))
        }
    }
}
