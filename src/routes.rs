// Route path constants - single source of truth for all API paths

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api_doc::ApiDoc;
use crate::auth::require_api_key;
use crate::handlers;
use crate::state::AppState;

pub const HEALTH: &str = "/_manage/health";
pub const ROUTES: &str = "/_manage/routes";
pub const ROUTES_BATCH: &str = "/_manage/routes/batch";
pub const ROUTE_ITEM: &str = "/_manage/routes/{id}";
pub const ROUTE_SOFT_DELETE: &str = "/_manage/routes/delete1/{id}";
pub const DOCS: &str = "/_manage/docs";
pub const OPENAPI_JSON: &str = "/_manage/openapi.json";

/// Management API behind the key check, health and docs without it, and every
/// other path falling through to the mock dispatcher.
pub fn router(state: AppState) -> Router {
    let management = Router::new()
        .route(
            ROUTES,
            get(handlers::list_handler).post(handlers::create_handler),
        )
        .route(ROUTES_BATCH, post(handlers::batch_handler))
        .route(
            ROUTE_ITEM,
            get(handlers::get_handler).post(handlers::update_handler),
        )
        .route(ROUTE_SOFT_DELETE, post(handlers::delete_handler))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_api_key,
        ));

    Router::new()
        .merge(management)
        .route(HEALTH, get(handlers::health_handler))
        .merge(SwaggerUi::new(DOCS).url(OPENAPI_JSON, ApiDoc::openapi()))
        .fallback(handlers::mock_handler)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
