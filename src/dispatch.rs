//! Matching inbound requests to stored routes.

use serde_json::Value as JsonValue;
use thiserror::Error;

use crate::store::{RouteRecord, RouteStore, StoreError};
use crate::template::{evaluate, RequestContext};

/// Paths under this prefix belong to the management API and are never
/// matched against stored routes.
pub const MANAGEMENT_PREFIX: &str = "/_manage";

/// A synthesized mock response
#[derive(Debug, Clone, PartialEq)]
pub struct MockResponse {
    pub status_code: u16,
    /// Evaluated headers, applied over whatever the transport sets
    pub headers: Vec<(String, String)>,
    pub body: JsonValue,
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("No route configured for path: {0}")]
    NotFound(String),
    #[error("Method {method} not allowed for path: {path}")]
    MethodNotAllowed { method: String, path: String },
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub fn is_management_path(path: &str) -> bool {
    path.starts_with(MANAGEMENT_PREFIX)
}

/// Ensure a leading slash; the empty path is the root.
pub fn normalize_path(raw: &str) -> String {
    if raw.starts_with('/') {
        raw.to_string()
    } else {
        format!("/{}", raw)
    }
}

/// Apply the path and method gates to a lookup result.
pub fn match_route(
    record: Option<RouteRecord>,
    method: &str,
    path: &str,
) -> Result<RouteRecord, DispatchError> {
    let record = record.ok_or_else(|| DispatchError::NotFound(path.to_string()))?;
    if !record.allows(method) {
        return Err(DispatchError::MethodNotAllowed {
            method: method.to_string(),
            path: path.to_string(),
        });
    }
    Ok(record)
}

/// Resolve `ctx` against the store and build the mock response.
///
/// The route's delay is an async sleep, so only this request waits.
pub async fn dispatch(
    store: &dyn RouteStore,
    ctx: &RequestContext,
) -> Result<MockResponse, DispatchError> {
    let path = normalize_path(&ctx.path);
    let record = store.find_active_by_path(&path).await?;
    let route = match_route(record, &ctx.method, &path)?;

    if let Some(delay) = route.delay_duration() {
        tracing::debug!("Delaying {} {} by {:?}", ctx.method, path, delay);
        tokio::time::sleep(delay).await;
    }

    let body = evaluate(&route.response, ctx);
    let headers = header_pairs(evaluate(&route.headers, ctx));

    Ok(MockResponse {
        status_code: route.status_code,
        headers,
        body,
    })
}

fn header_pairs(evaluated: JsonValue) -> Vec<(String, String)> {
    match evaluated {
        JsonValue::Object(map) => map
            .into_iter()
            .map(|(name, value)| {
                let value = match value {
                    JsonValue::String(text) => text,
                    other => other.to_string(),
                };
                (name, value)
            })
            .collect(),
        _ => Vec::new(),
    }
}
