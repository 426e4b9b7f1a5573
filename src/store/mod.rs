//! Route persistence boundary.
//!
//! The dispatcher only needs [`RouteStore::find_active_by_path`]; the
//! management surface uses the rest of the trait. Backends are responsible
//! for their own isolation: `create` is an atomic compare-and-create, so two
//! concurrent creates of the same path can never both succeed.

pub mod memory;
pub mod spanner;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

pub use memory::InMemoryRouteStore;
pub use spanner::SpannerRouteStore;

/// A persisted mock route
#[derive(Debug, Clone, PartialEq)]
pub struct RouteRecord {
    pub id: Uuid,
    pub path: String,
    pub methods: Vec<String>,
    pub response: JsonValue,
    pub status_code: u16,
    pub headers: JsonValue,
    pub delay: f64,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RouteRecord {
    /// Whether `method` is one of the record's allowed methods.
    pub fn allows(&self, method: &str) -> bool {
        self.methods.iter().any(|m| m.eq_ignore_ascii_case(method))
    }

    /// Artificial delay to apply before answering, if any.
    pub fn delay_duration(&self) -> Option<Duration> {
        if self.delay > 0.0 {
            Duration::try_from_secs_f64(self.delay).ok()
        } else {
            None
        }
    }
}

/// Fields for a route that does not exist yet
#[derive(Debug, Clone, PartialEq)]
pub struct NewRoute {
    pub path: String,
    pub methods: Vec<String>,
    pub response: JsonValue,
    pub status_code: u16,
    pub headers: JsonValue,
    pub delay: f64,
    pub description: Option<String>,
    pub is_active: bool,
}

impl NewRoute {
    /// A GET route answering 200 with `response` and no extras.
    pub fn new(path: impl Into<String>, response: JsonValue) -> Self {
        Self {
            path: path.into(),
            methods: vec!["GET".to_string()],
            response,
            status_code: 200,
            headers: JsonValue::Object(Default::default()),
            delay: 0.0,
            description: None,
            is_active: true,
        }
    }

    pub(crate) fn into_record(self, id: Uuid, now: DateTime<Utc>) -> RouteRecord {
        RouteRecord {
            id,
            path: self.path,
            methods: self.methods,
            response: self.response,
            status_code: self.status_code,
            headers: self.headers,
            delay: self.delay,
            description: self.description,
            is_active: self.is_active,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update; `None` leaves the column untouched.
///
/// `description` is doubly optional so that an explicit clear
/// (`Some(None)`) can be told apart from "not provided".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RouteUpdate {
    pub methods: Option<Vec<String>>,
    pub response: Option<JsonValue>,
    pub status_code: Option<u16>,
    pub headers: Option<JsonValue>,
    pub delay: Option<f64>,
    pub description: Option<Option<String>>,
    pub is_active: Option<bool>,
}

impl RouteUpdate {
    pub fn deactivate() -> Self {
        Self {
            is_active: Some(false),
            ..Default::default()
        }
    }

    pub(crate) fn apply_to(self, record: &mut RouteRecord) {
        if let Some(methods) = self.methods {
            record.methods = methods;
        }
        if let Some(response) = self.response {
            record.response = response;
        }
        if let Some(status_code) = self.status_code {
            record.status_code = status_code;
        }
        if let Some(headers) = self.headers {
            record.headers = headers;
        }
        if let Some(delay) = self.delay {
            record.delay = delay;
        }
        if let Some(description) = self.description {
            record.description = description;
        }
        if let Some(is_active) = self.is_active {
            record.is_active = is_active;
        }
    }
}

/// Bulk operations over a set of route ids
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOperation {
    Activate,
    Deactivate,
    /// Hard delete: rows are removed from storage.
    Delete,
}

impl BatchOperation {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "activate" => Some(BatchOperation::Activate),
            "deactivate" => Some(BatchOperation::Deactivate),
            "delete" => Some(BatchOperation::Delete),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BatchOperation::Activate => "activate",
            BatchOperation::Deactivate => "deactivate",
            BatchOperation::Delete => "delete",
        }
    }
}

/// Listing filter for the management surface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteQuery {
    /// 1-based page number
    pub page: u32,
    pub per_page: u32,
    /// Case-insensitive substring matched against path or description
    pub search: Option<String>,
    pub active_only: bool,
}

impl Default for RouteQuery {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 10,
            search: None,
            active_only: false,
        }
    }
}

impl RouteQuery {
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.per_page)
    }
}

/// One page of routes, newest first, plus the unpaginated match count
#[derive(Debug, Clone, PartialEq)]
pub struct RoutePage {
    pub routes: Vec<RouteRecord>,
    pub total: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouteCounts {
    pub total: u64,
    pub active: u64,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("route not found: {0}")]
    NotFound(Uuid),
    #[error("route already exists for path: {0}")]
    Conflict(String),
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// CRUD and lookup contract over route records
#[async_trait]
pub trait RouteStore: Send + Sync {
    /// The active record whose path equals `path` exactly.
    async fn find_active_by_path(&self, path: &str) -> StoreResult<Option<RouteRecord>>;

    /// Every active record, newest first.
    async fn list_active(&self) -> StoreResult<Vec<RouteRecord>>;

    async fn list(&self, query: &RouteQuery) -> StoreResult<RoutePage>;

    /// Fetch by id regardless of the active flag.
    async fn get(&self, id: Uuid) -> StoreResult<Option<RouteRecord>>;

    /// Atomically insert unless any record, active or not, already owns the path.
    async fn create(&self, route: NewRoute) -> StoreResult<RouteRecord>;

    async fn update(&self, id: Uuid, update: RouteUpdate) -> StoreResult<RouteRecord>;

    /// Mark the record inactive; the row is kept.
    async fn soft_delete(&self, id: Uuid) -> StoreResult<()>;

    /// Apply `operation` to every listed id, returning the number of rows touched.
    async fn batch_mutate(&self, ids: &[Uuid], operation: BatchOperation) -> StoreResult<u64>;

    async fn counts(&self) -> StoreResult<RouteCounts>;

    async fn health_check(&self) -> StoreResult<()>;
}
