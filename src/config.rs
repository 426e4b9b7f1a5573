use anyhow::{Context, Result, bail};
use std::env;
use std::fmt;

/// Which route store backs the server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Spanner,
    Memory,
}

impl StoreBackend {
    fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "spanner" => Ok(StoreBackend::Spanner),
            "memory" => Ok(StoreBackend::Memory),
            other => bail!("ROUTE_STORE must be 'spanner' or 'memory', got '{}'", other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpannerConfig {
    pub emulator_host: Option<String>,
    pub project: String,
    pub instance: String,
    pub database: String,
}

impl SpannerConfig {
    pub fn from_env() -> Result<Self> {
        Ok(SpannerConfig {
            emulator_host: env::var("SPANNER_EMULATOR_HOST").ok(),
            project: env::var("SPANNER_PROJECT")
                .context("SPANNER_PROJECT environment variable is required")?,
            instance: env::var("SPANNER_INSTANCE")
                .context("SPANNER_INSTANCE environment variable is required")?,
            database: env::var("SPANNER_DATABASE")
                .context("SPANNER_DATABASE environment variable is required")?,
        })
    }

    pub fn database_path(&self) -> String {
        format!(
            "projects/{}/instances/{}/databases/{}",
            self.project, self.instance, self.database
        )
    }
}

#[derive(Clone)]
pub struct Config {
    pub store_backend: StoreBackend,
    /// Present only when `store_backend` is Spanner
    pub spanner: Option<SpannerConfig>,
    pub service_port: u16,
    pub service_host: String,
    /// Shared secret expected in the `X-API-Key` header
    pub api_key: String,
    pub seed_sample_routes: bool,
}

// Hand-written so the API key never ends up in logs
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("store_backend", &self.store_backend)
            .field("spanner", &self.spanner)
            .field("service_port", &self.service_port)
            .field("service_host", &self.service_host)
            .field("api_key", &"<redacted>")
            .field("seed_sample_routes", &self.seed_sample_routes)
            .finish()
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let store_backend = StoreBackend::parse(
            &env::var("ROUTE_STORE").unwrap_or_else(|_| "spanner".to_string()),
        )?;

        let spanner = match store_backend {
            StoreBackend::Spanner => Some(SpannerConfig::from_env()?),
            StoreBackend::Memory => None,
        };

        let service_port = env::var("SERVICE_PORT")
            .unwrap_or_else(|_| "5000".to_string())
            .parse::<u16>()
            .context("SERVICE_PORT must be a valid port number (0-65535)")?;

        let service_host = env::var("SERVICE_HOST")
            .unwrap_or_else(|_| "0.0.0.0".to_string());

        let api_key = env::var("API_KEY")
            .unwrap_or_else(|_| "mock-server-admin".to_string());

        let seed_sample_routes = env::var("SEED_SAMPLE_ROUTES")
            .unwrap_or_else(|_| "false".to_string())
            .parse::<bool>()
            .context("SEED_SAMPLE_ROUTES must be 'true' or 'false'")?;

        Ok(Config {
            store_backend,
            spanner,
            service_port,
            service_host,
            api_key,
            seed_sample_routes,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.service_host, self.service_port)
    }

    pub fn log_startup(&self) {
        tracing::info!("Configuration loaded:");
        tracing::info!("  Route store: {:?}", self.store_backend);
        if let Some(spanner) = &self.spanner {
            tracing::info!("  Spanner emulator: {}",
                spanner.emulator_host.as_deref().unwrap_or("disabled (using production)"));
            tracing::info!("  Spanner project: {}", spanner.project);
            tracing::info!("  Spanner instance: {}", spanner.instance);
            tracing::info!("  Spanner database: {}", spanner.database);
        }
        tracing::info!("  Seed sample routes: {}", self.seed_sample_routes);
        tracing::info!("  Service listening on: {}", self.bind_address());
    }
}
