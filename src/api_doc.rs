use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::auth::API_KEY_HEADER;
use crate::error::ErrorResponse;
use crate::handlers;
use crate::models::{
    BatchRequest, BatchResponse, CreateRouteRequest, HealthResponse, ListResponse,
    MessageResponse, RouteMutationResponse, RouteResponse, UpdateRouteRequest,
};

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "rust-spanner-mock API",
        version = "1.0.0",
        description = "Management API of a dynamic HTTP mock server backed by Google Cloud Spanner. \
                       Every path outside /_manage is answered from the registered routes."
    ),
    paths(
        handlers::health::health_handler,
        handlers::list::list_handler,
        handlers::get::get_handler,
        handlers::create::create_handler,
        handlers::update::update_handler,
        handlers::delete::delete_handler,
        handlers::batch::batch_handler
    ),
    components(
        schemas(
            RouteResponse,
            ListResponse,
            CreateRouteRequest,
            UpdateRouteRequest,
            RouteMutationResponse,
            BatchRequest,
            BatchResponse,
            MessageResponse,
            HealthResponse,
            ErrorResponse
        )
    ),
    modifiers(&ApiKeyAuth),
    tags(
        (name = "health", description = "Health check operations"),
        (name = "routes", description = "Mock route management")
    )
)]
pub struct ApiDoc;

struct ApiKeyAuth;

impl Modify for ApiKeyAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "api_key",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new(API_KEY_HEADER))),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes;

    #[test]
    fn test_document_lists_management_paths() {
        let doc = ApiDoc::openapi();
        for path in [
            routes::HEALTH,
            routes::ROUTES,
            routes::ROUTES_BATCH,
            routes::ROUTE_ITEM,
            routes::ROUTE_SOFT_DELETE,
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {}", path);
        }
    }

    #[test]
    fn test_api_key_scheme_registered() {
        let doc = ApiDoc::openapi();
        let components = doc.components.unwrap();
        assert!(components.security_schemes.contains_key("api_key"));
    }
}
