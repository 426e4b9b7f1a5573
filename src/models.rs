use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::dispatch::is_management_path;
use crate::error::ApiError;
use crate::store::{NewRoute, RouteRecord, RouteUpdate};

pub const DEFAULT_PER_PAGE: u32 = 10;
pub const MAX_PER_PAGE: u32 = 100;

/// A route record as returned by the management API
#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct RouteResponse {
    pub id: Uuid,
    pub path: String,
    pub methods: Vec<String>,
    pub response: serde_json::Value,
    pub status_code: u16,
    pub headers: serde_json::Value,
    pub delay: f64,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl From<RouteRecord> for RouteResponse {
    fn from(record: RouteRecord) -> Self {
        Self {
            id: record.id,
            path: record.path,
            methods: record.methods,
            response: record.response,
            status_code: record.status_code,
            headers: record.headers,
            delay: record.delay,
            description: record.description,
            is_active: record.is_active,
            created_at: record.created_at.to_rfc3339(),
            updated_at: record.updated_at.to_rfc3339(),
        }
    }
}

/// Query parameters for the list endpoint
#[derive(Deserialize, utoipa::ToSchema)]
pub struct ListQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub search: Option<String>,
    pub active_only: Option<String>,
}

/// Response type for the list endpoint
#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ListResponse {
    pub routes: Vec<RouteResponse>,
    pub total: u64,
    pub pages: u64,
    pub current_page: u32,
}

/// Methods may be sent as a list or as one comma-joined string
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum MethodList {
    List(Vec<String>),
    Joined(String),
}

impl MethodList {
    /// Trimmed, uppercased, de-duplicated; first occurrence wins the order.
    pub fn normalize(self) -> Result<Vec<String>, ApiError> {
        let raw = match self {
            MethodList::List(items) => items,
            MethodList::Joined(joined) => joined.split(',').map(str::to_string).collect(),
        };

        let mut methods: Vec<String> = Vec::new();
        for method in raw {
            let method = method.trim().to_ascii_uppercase();
            if method.is_empty() || methods.contains(&method) {
                continue;
            }
            if !method.chars().all(|c| c.is_ascii_alphabetic()) {
                return Err(ApiError::Validation(format!("invalid HTTP method '{}'", method)));
            }
            methods.push(method);
        }

        if methods.is_empty() {
            return Err(ApiError::Validation("methods must not be empty".to_string()));
        }
        Ok(methods)
    }
}

/// Request body for creating a route
#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct CreateRouteRequest {
    pub path: Option<String>,
    #[schema(value_type = Option<Vec<String>>)]
    pub methods: Option<MethodList>,
    pub response: Option<serde_json::Value>,
    pub status_code: Option<i64>,
    pub headers: Option<serde_json::Value>,
    pub delay: Option<f64>,
    pub description: Option<String>,
    pub is_active: Option<bool>,
}

impl CreateRouteRequest {
    pub fn into_new_route(self) -> Result<NewRoute, ApiError> {
        let (Some(path), Some(response)) = (self.path, self.response) else {
            return Err(ApiError::Validation("path and response are required".to_string()));
        };
        validate_path(&path)?;

        let methods = match self.methods {
            Some(methods) => methods.normalize()?,
            None => vec!["GET".to_string()],
        };
        let headers = match self.headers {
            Some(headers) => validate_headers(headers)?,
            None => serde_json::Value::Object(Default::default()),
        };

        Ok(NewRoute {
            path,
            methods,
            response,
            status_code: self.status_code.map(validate_status).transpose()?.unwrap_or(200),
            headers,
            delay: self.delay.map(validate_delay).transpose()?.unwrap_or(0.0),
            description: self.description,
            is_active: self.is_active.unwrap_or(true),
        })
    }
}

/// Request body for a partial update; omitted fields are left as they are
#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct UpdateRouteRequest {
    #[schema(value_type = Option<Vec<String>>)]
    pub methods: Option<MethodList>,
    pub response: Option<serde_json::Value>,
    pub status_code: Option<i64>,
    pub headers: Option<serde_json::Value>,
    pub delay: Option<f64>,
    /// `null` clears the description
    #[serde(default, deserialize_with = "present_or_null")]
    #[schema(value_type = Option<String>)]
    pub description: Option<Option<String>>,
    pub is_active: Option<bool>,
}

impl UpdateRouteRequest {
    pub fn into_update(self) -> Result<RouteUpdate, ApiError> {
        Ok(RouteUpdate {
            methods: self.methods.map(MethodList::normalize).transpose()?,
            response: self.response,
            status_code: self.status_code.map(validate_status).transpose()?,
            headers: self.headers.map(validate_headers).transpose()?,
            delay: self.delay.map(validate_delay).transpose()?,
            description: self.description,
            is_active: self.is_active,
        })
    }
}

/// Distinguishes an explicit `null` from an absent field
fn present_or_null<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

fn validate_path(path: &str) -> Result<(), ApiError> {
    if !path.starts_with('/') {
        return Err(ApiError::Validation(format!("path must start with '/', got '{}'", path)));
    }
    if is_management_path(path) {
        return Err(ApiError::Validation(format!("path '{}' is reserved for the management API", path)));
    }
    Ok(())
}

fn validate_status(code: i64) -> Result<u16, ApiError> {
    match u16::try_from(code) {
        Ok(code) if (100..=999).contains(&code) => Ok(code),
        _ => Err(ApiError::Validation(format!("status_code must be between 100 and 999, got {}", code))),
    }
}

fn validate_delay(delay: f64) -> Result<f64, ApiError> {
    if delay.is_finite() && delay >= 0.0 {
        Ok(delay)
    } else {
        Err(ApiError::Validation(format!("delay must be a non-negative number of seconds, got {}", delay)))
    }
}

fn validate_headers(headers: serde_json::Value) -> Result<serde_json::Value, ApiError> {
    if headers.is_object() {
        Ok(headers)
    } else {
        Err(ApiError::Validation("headers must be a JSON object".to_string()))
    }
}

/// Request body for batch operations
#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct BatchRequest {
    pub operation: String,
    #[serde(default)]
    pub route_ids: Vec<Uuid>,
}

#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

/// Response type for create and update
#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct RouteMutationResponse {
    pub message: String,
    pub route: RouteResponse,
}

#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct BatchResponse {
    pub message: String,
    pub affected: u64,
}

/// Response type for the health endpoint
#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: String,
    /// `connected`, or `error: <reason>`
    pub database: String,
    pub timestamp: f64,
    pub total_routes: u64,
    pub active_routes: u64,
}
