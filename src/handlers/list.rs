use crate::error::{ApiError, ErrorResponse};
use crate::models::{ListQuery, ListResponse, RouteResponse, DEFAULT_PER_PAGE, MAX_PER_PAGE};
use crate::routes;
use crate::state::AppState;
use crate::store::RouteQuery;
use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::StatusCode,
    Json,
};

/// GET /_manage/routes handler - List route records
///
/// Returns a paginated, searchable list of routes, newest first.
/// Query parameters:
/// - page: 1-based page number (optional, default: 1)
/// - per_page: Page size between 1 and 100 (optional, default: 10)
/// - search: Case-insensitive substring of the path or description (optional)
/// - active_only: Any value except `false`/`0` hides inactive routes (optional)
#[utoipa::path(
    get,
    path = routes::ROUTES,
    params(
        ("page" = Option<u32>, Query, description = "1-based page number"),
        ("per_page" = Option<u32>, Query, description = "Page size, 1 to 100"),
        ("search" = Option<String>, Query, description = "Substring of path or description"),
        ("active_only" = Option<String>, Query, description = "Only list active routes")
    ),
    responses(
        (status = 200, description = "Page of routes", body = ListResponse),
        (status = 400, description = "Invalid query parameter", body = ErrorResponse),
        (status = 401, description = "Missing or wrong API key", body = ErrorResponse),
        (status = 500, description = "Database error", body = ErrorResponse)
    ),
    security(("api_key" = [])),
    tag = "routes"
)]
pub async fn list_handler(
    State(state): State<AppState>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> Result<(StatusCode, Json<ListResponse>), ApiError> {
    let Query(query) = query?;
    let route_query = route_query(query)?;

    let page = state.store.list(&route_query).await?;
    let per_page = u64::from(route_query.per_page);

    let response = ListResponse {
        pages: page.total.div_ceil(per_page),
        total: page.total,
        current_page: route_query.page,
        routes: page.routes.into_iter().map(RouteResponse::from).collect(),
    };

    tracing::info!(
        "Listed {} routes (total: {}, page: {}, per_page: {}, search: {:?}, active_only: {})",
        response.routes.len(),
        response.total,
        route_query.page,
        route_query.per_page,
        route_query.search,
        route_query.active_only
    );

    Ok((StatusCode::OK, Json(response)))
}

fn route_query(query: ListQuery) -> Result<RouteQuery, ApiError> {
    let page = query.page.unwrap_or(1);
    if page == 0 {
        return Err(ApiError::InvalidQueryParam(
            "page must be at least 1".to_string(),
        ));
    }

    let per_page = query.per_page.unwrap_or(DEFAULT_PER_PAGE);
    if !(1..=MAX_PER_PAGE).contains(&per_page) {
        return Err(ApiError::InvalidQueryParam(format!(
            "per_page must be between 1 and {}, got {}",
            MAX_PER_PAGE, per_page
        )));
    }

    let active_only = query
        .active_only
        .as_deref()
        .map(|flag| !matches!(flag.trim().to_ascii_lowercase().as_str(), "" | "false" | "0"))
        .unwrap_or(false);

    Ok(RouteQuery {
        page,
        per_page,
        search: query.search.filter(|s| !s.trim().is_empty()),
        active_only,
    })
}
