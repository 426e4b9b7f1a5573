use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    BatchOperation, NewRoute, RouteCounts, RoutePage, RouteQuery, RouteRecord, RouteStore,
    RouteUpdate, StoreError, StoreResult,
};

/// Route store kept in process memory
///
/// Records are held in insertion order, so "newest first" is a reverse walk.
/// Every mutation takes the write lock, which makes the path check in
/// `create` and the insert a single atomic step.
#[derive(Debug, Default)]
pub struct InMemoryRouteStore {
    routes: RwLock<Vec<RouteRecord>>,
}

impl InMemoryRouteStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn matches_search(record: &RouteRecord, needle: &str) -> bool {
    record.path.to_lowercase().contains(needle)
        || record
            .description
            .as_deref()
            .is_some_and(|d| d.to_lowercase().contains(needle))
}

#[async_trait]
impl RouteStore for InMemoryRouteStore {
    async fn find_active_by_path(&self, path: &str) -> StoreResult<Option<RouteRecord>> {
        let routes = self.routes.read().await;
        Ok(routes
            .iter()
            .find(|r| r.is_active && r.path == path)
            .cloned())
    }

    async fn list_active(&self) -> StoreResult<Vec<RouteRecord>> {
        let routes = self.routes.read().await;
        Ok(routes.iter().rev().filter(|r| r.is_active).cloned().collect())
    }

    async fn list(&self, query: &RouteQuery) -> StoreResult<RoutePage> {
        let needle = query
            .search
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase);

        let routes = self.routes.read().await;
        let matching: Vec<&RouteRecord> = routes
            .iter()
            .rev()
            .filter(|r| !query.active_only || r.is_active)
            .filter(|r| needle.as_deref().is_none_or(|n| matches_search(r, n)))
            .collect();

        let total = matching.len() as u64;
        let page = matching
            .into_iter()
            .skip(query.offset() as usize)
            .take(query.per_page as usize)
            .cloned()
            .collect();

        Ok(RoutePage {
            routes: page,
            total,
        })
    }

    async fn get(&self, id: Uuid) -> StoreResult<Option<RouteRecord>> {
        let routes = self.routes.read().await;
        Ok(routes.iter().find(|r| r.id == id).cloned())
    }

    async fn create(&self, route: NewRoute) -> StoreResult<RouteRecord> {
        let mut routes = self.routes.write().await;
        if routes.iter().any(|r| r.path == route.path) {
            return Err(StoreError::Conflict(route.path));
        }

        let record = route.into_record(Uuid::new_v4(), Utc::now());
        routes.push(record.clone());
        tracing::debug!("Stored route {} at {}", record.id, record.path);
        Ok(record)
    }

    async fn update(&self, id: Uuid, update: RouteUpdate) -> StoreResult<RouteRecord> {
        let mut routes = self.routes.write().await;
        let record = routes
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(StoreError::NotFound(id))?;

        update.apply_to(record);
        record.updated_at = Utc::now();
        Ok(record.clone())
    }

    async fn soft_delete(&self, id: Uuid) -> StoreResult<()> {
        self.update(id, RouteUpdate::deactivate()).await.map(|_| ())
    }

    async fn batch_mutate(&self, ids: &[Uuid], operation: BatchOperation) -> StoreResult<u64> {
        let mut routes = self.routes.write().await;
        let affected = match operation {
            BatchOperation::Delete => {
                let before = routes.len();
                routes.retain(|r| !ids.contains(&r.id));
                before - routes.len()
            }
            BatchOperation::Activate | BatchOperation::Deactivate => {
                let active = operation == BatchOperation::Activate;
                let now = Utc::now();
                let mut touched = 0;
                for record in routes.iter_mut().filter(|r| ids.contains(&r.id)) {
                    record.is_active = active;
                    record.updated_at = now;
                    touched += 1;
                }
                touched
            }
        };
        Ok(affected as u64)
    }

    async fn counts(&self) -> StoreResult<RouteCounts> {
        let routes = self.routes.read().await;
        Ok(RouteCounts {
            total: routes.len() as u64,
            active: routes.iter().filter(|r| r.is_active).count() as u64,
        })
    }

    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }
}
