use crate::error::{ApiError, ErrorResponse};
use crate::models::{CreateRouteRequest, RouteMutationResponse, RouteResponse};
use crate::routes;
use crate::state::AppState;
use axum::{extract::rejection::JsonRejection, extract::State, http::StatusCode, Json};

/// POST /_manage/routes handler - Register a mock route
///
/// Fails with 409 when any route, active or not, already owns the path.
#[utoipa::path(
    post,
    path = routes::ROUTES,
    request_body = CreateRouteRequest,
    responses(
        (status = 201, description = "Route created", body = RouteMutationResponse),
        (status = 400, description = "Missing or invalid field", body = ErrorResponse),
        (status = 401, description = "Missing or wrong API key", body = ErrorResponse),
        (status = 409, description = "Path already registered", body = ErrorResponse),
        (status = 500, description = "Database error", body = ErrorResponse)
    ),
    security(("api_key" = [])),
    tag = "routes"
)]
pub async fn create_handler(
    State(state): State<AppState>,
    payload: Result<Json<CreateRouteRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<RouteMutationResponse>), ApiError> {
    let Json(request) = payload?;
    let route = request.into_new_route()?;

    let record = state.store.create(route).await?;

    tracing::info!(
        "Created route {} {} {:?} -> {}",
        record.id,
        record.path,
        record.methods,
        record.status_code
    );
    Ok((
        StatusCode::CREATED,
        Json(RouteMutationResponse {
            message: "Route created".to_string(),
            route: RouteResponse::from(record),
        }),
    ))
}
