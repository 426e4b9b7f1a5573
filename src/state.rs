use crate::config::Config;
use crate::store::RouteStore;
use std::sync::Arc;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn RouteStore>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(store: Arc<dyn RouteStore>, config: Config) -> Self {
        Self {
            store,
            config: Arc::new(config),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::StoreBackend;
    use crate::store::InMemoryRouteStore;

    pub(crate) const TEST_API_KEY: &str = "test-key";

    /// State over an empty in-memory store
    pub(crate) fn memory_state() -> AppState {
        let config = Config {
            store_backend: StoreBackend::Memory,
            spanner: None,
            service_port: 5000,
            service_host: "127.0.0.1".to_string(),
            api_key: TEST_API_KEY.to_string(),
            seed_sample_routes: false,
        };
        AppState::new(Arc::new(InMemoryRouteStore::new()), config)
    }
}
