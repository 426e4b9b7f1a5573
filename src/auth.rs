use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::error::ApiError;
use crate::state::AppState;

pub const API_KEY_HEADER: &str = "X-API-Key";

/// Rejects management requests that do not carry the configured API key.
pub async fn require_api_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let rejection = match request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|h| h.to_str().ok())
    {
        Some(key) if key == state.config.api_key => None,
        Some(_) => Some("wrong API key"),
        None => Some("missing API key"),
    };

    if let Some(reason) = rejection {
        tracing::warn!(
            "Rejected {} {}: {}",
            request.method(),
            request.uri().path(),
            reason
        );
        return Err(ApiError::Unauthorized);
    }

    Ok(next.run(request).await)
}
