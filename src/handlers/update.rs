use crate::error::{ApiError, ErrorResponse};
use crate::models::{RouteMutationResponse, RouteResponse, UpdateRouteRequest};
use crate::routes;
use crate::state::AppState;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

/// POST /_manage/routes/{id} handler - Partially update a route
///
/// Only the fields present in the body change. The path cannot be changed.
#[utoipa::path(
    post,
    path = routes::ROUTE_ITEM,
    params(
        ("id" = String, Path, description = "UUID of the route")
    ),
    request_body = UpdateRouteRequest,
    responses(
        (status = 200, description = "Route updated", body = RouteMutationResponse),
        (status = 400, description = "Invalid UUID or field", body = ErrorResponse),
        (status = 401, description = "Missing or wrong API key", body = ErrorResponse),
        (status = 404, description = "Route not found", body = ErrorResponse),
        (status = 500, description = "Database error", body = ErrorResponse)
    ),
    security(("api_key" = [])),
    tag = "routes"
)]
pub async fn update_handler(
    State(state): State<AppState>,
    Path(id_str): Path<String>,
    payload: Result<Json<UpdateRouteRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<RouteMutationResponse>), ApiError> {
    let id = Uuid::parse_str(&id_str).map_err(|_| ApiError::InvalidUuid(id_str.clone()))?;
    let Json(request) = payload?;
    let update = request.into_update()?;

    let record = state.store.update(id, update).await?;

    tracing::info!("Updated route {} ({})", id, record.path);
    Ok((
        StatusCode::OK,
        Json(RouteMutationResponse {
            message: "Route updated".to_string(),
            route: RouteResponse::from(record),
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::router;
    use crate::routes::tests::send_admin;
    use crate::state::tests::memory_state;
    use crate::store::NewRoute;
    use serde_json::json;

    #[tokio::test]
    async fn test_partial_update() {
        let state = memory_state();
        let mut route = NewRoute::new("/api/ping", json!("pong"));
        route.description = Some("old".to_string());
        let created = state.store.create(route).await.unwrap();
        let app = router(state);
        let uri = format!("/_manage/routes/{}", created.id);

        let (status, body) = send_admin(
            &app,
            "POST",
            &uri,
            Some(json!({"methods": ["post"], "status_code": 202, "description": null})),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let updated: RouteMutationResponse = serde_json::from_value(body).unwrap();
        assert_eq!(updated.message, "Route updated");
        assert_eq!(updated.route.methods, vec!["POST"]);
        assert_eq!(updated.route.status_code, 202);
        assert_eq!(updated.route.description, None);
        // untouched fields keep their values
        assert_eq!(updated.route.response, json!("pong"));
        assert_eq!(updated.route.path, "/api/ping");
        assert_eq!(updated.route.created_at, created.created_at.to_rfc3339());
    }

    #[tokio::test]
    async fn test_update_ignores_path() {
        let state = memory_state();
        let created = state.store.create(NewRoute::new("/fixed", json!(1))).await.unwrap();
        let app = router(state);

        let (status, body) = send_admin(
            &app,
            "POST",
            &format!("/_manage/routes/{}", created.id),
            Some(json!({"path": "/moved", "response": 2})),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["route"]["path"], "/fixed");
        assert_eq!(body["route"]["response"], 2);
    }

    #[tokio::test]
    async fn test_update_not_found() {
        let app = router(memory_state());
        let (status, _) = send_admin(
            &app,
            "POST",
            &format!("/_manage/routes/{}", Uuid::new_v4()),
            Some(json!({"is_active": false})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_update_validation() {
        let state = memory_state();
        let created = state.store.create(NewRoute::new("/v", json!(1))).await.unwrap();
        let app = router(state);

        let (status, _) = send_admin(
            &app,
            "POST",
            &format!("/_manage/routes/{}", created.id),
            Some(json!({"headers": "nope"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send_admin(&app, "POST", "/_manage/routes/xyz", Some(json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
