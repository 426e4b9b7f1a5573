use crate::models::HealthResponse;
use crate::routes;
use crate::state::AppState;
use crate::store::RouteCounts;
use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;

/// GET /_manage/health handler - Health check endpoint
///
/// Pings the route store and reports route counts. Always answers 200 so
/// liveness probes see the process; store trouble shows up in `database`.
#[utoipa::path(
    get,
    path = routes::HEALTH,
    responses(
        (status = 200, description = "Service is up; database field carries store status", body = HealthResponse)
    ),
    tag = "health"
)]
pub async fn health_handler(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let probe = match state.store.health_check().await {
        Ok(()) => state.store.counts().await,
        Err(e) => Err(e),
    };

    let (database, counts) = match probe {
        Ok(counts) => {
            tracing::debug!("Health check passed");
            ("connected".to_string(), counts)
        }
        Err(e) => {
            tracing::error!("Health check failed: {}", e);
            (format!("error: {}", e), RouteCounts::default())
        }
    };

    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
            database,
            timestamp: Utc::now().timestamp_micros() as f64 / 1_000_000.0,
            total_routes: counts.total,
            active_routes: counts.active,
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::router;
    use crate::routes::tests::send;
    use crate::state::tests::memory_state;
    use crate::store::{
        BatchOperation, NewRoute, RoutePage, RouteQuery, RouteRecord, RouteStore, RouteUpdate,
        StoreError, StoreResult,
    };
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Arc;
    use uuid::Uuid;

    /// A store whose backend is always down
    struct UnreachableStore;

    fn down<T>() -> StoreResult<T> {
        Err(StoreError::Backend(anyhow::anyhow!("connection refused")))
    }

    #[async_trait]
    impl RouteStore for UnreachableStore {
        async fn find_active_by_path(&self, _path: &str) -> StoreResult<Option<RouteRecord>> {
            down()
        }
        async fn list_active(&self) -> StoreResult<Vec<RouteRecord>> {
            down()
        }
        async fn list(&self, _query: &RouteQuery) -> StoreResult<RoutePage> {
            down()
        }
        async fn get(&self, _id: Uuid) -> StoreResult<Option<RouteRecord>> {
            down()
        }
        async fn create(&self, _route: NewRoute) -> StoreResult<RouteRecord> {
            down()
        }
        async fn update(&self, _id: Uuid, _update: RouteUpdate) -> StoreResult<RouteRecord> {
            down()
        }
        async fn soft_delete(&self, _id: Uuid) -> StoreResult<()> {
            down()
        }
        async fn batch_mutate(&self, _ids: &[Uuid], _op: BatchOperation) -> StoreResult<u64> {
            down()
        }
        async fn counts(&self) -> StoreResult<RouteCounts> {
            down()
        }
        async fn health_check(&self) -> StoreResult<()> {
            down()
        }
    }

    #[tokio::test]
    async fn test_health_endpoint_healthy() {
        let state = memory_state();
        state.store.create(NewRoute::new("/a", json!(1))).await.unwrap();
        let b = state.store.create(NewRoute::new("/b", json!(2))).await.unwrap();
        state.store.soft_delete(b.id).await.unwrap();
        let app = router(state);

        let (status, body) = send(&app, "GET", routes::HEALTH, None, None).await;

        assert_eq!(status, StatusCode::OK);
        let health: HealthResponse = serde_json::from_value(body).unwrap();
        assert_eq!(health.status, "healthy");
        assert_eq!(health.database, "connected");
        assert_eq!(health.total_routes, 2);
        assert_eq!(health.active_routes, 1);
        assert!(health.timestamp > 1_600_000_000.0);
    }

    #[tokio::test]
    async fn test_health_endpoint_store_down() {
        let mut state = memory_state();
        state.store = Arc::new(UnreachableStore);
        let app = router(state);

        let (status, body) = send(&app, "GET", routes::HEALTH, None, None).await;

        assert_eq!(status, StatusCode::OK);
        let health: HealthResponse = serde_json::from_value(body).unwrap();
        assert!(health.database.starts_with("error: "));
        assert!(health.database.contains("connection refused"));
        assert_eq!(health.total_routes, 0);
        assert_eq!(health.active_routes, 0);

        // Mock traffic against a dead store is a 500, not a crash
        let (status, body) = send(&app, "GET", "/anything", None, None).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].as_str().unwrap().contains("connection refused"));
    }
}
