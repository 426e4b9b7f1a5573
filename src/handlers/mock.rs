use crate::dispatch::{dispatch, is_management_path, MockResponse};
use crate::error::ApiError;
use crate::state::AppState;
use crate::template::RequestContext;
use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json,
};
use std::collections::HashMap;

/// Fallback handler - every path that is not a management route
///
/// Unknown paths under the management prefix are answered with 404 here and
/// never reach the dispatcher.
pub async fn mock_handler(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let path = uri.path();
    if is_management_path(path) {
        return Err(ApiError::PathNotFound(path.to_string()));
    }

    let ctx = request_context(&method, &uri, &headers, &body);
    tracing::info!("Mock request received: {} {}", ctx.method, ctx.path);

    let mock = dispatch(state.store.as_ref(), &ctx).await?;
    Ok(into_response(mock))
}

fn request_context(method: &Method, uri: &Uri, headers: &HeaderMap, body: &Bytes) -> RequestContext {
    let mut ctx = RequestContext::new(method.as_str(), uri.path()).with_body(body);

    ctx.headers = headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect();

    if let Some(query) = uri.query() {
        ctx.query = parse_pairs(query.as_bytes());
    }

    let is_form = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"));
    if is_form {
        ctx.form = parse_pairs(body);
    }

    ctx
}

fn parse_pairs(input: &[u8]) -> HashMap<String, String> {
    url::form_urlencoded::parse(input).into_owned().collect()
}

fn into_response(mock: MockResponse) -> Response {
    let status = StatusCode::from_u16(mock.status_code).unwrap_or_else(|_| {
        tracing::warn!("Stored status code {} is not valid, answering 500", mock.status_code);
        StatusCode::INTERNAL_SERVER_ERROR
    });

    let mut response = (status, Json(mock.body)).into_response();
    for (name, value) in mock.headers {
        match (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(&value)) {
            (Ok(header_name), Ok(header_value)) => {
                response.headers_mut().insert(header_name, header_value);
            }
            _ => tracing::warn!("Skipping invalid response header {:?}: {:?}", name, value),
        }
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::router;
    use crate::routes::tests::{send, send_admin};
    use crate::state::tests::memory_state;
    use crate::store::NewRoute;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::{json, Value as JsonValue};
    use tower::ServiceExt;

    async fn app_with(routes: Vec<NewRoute>) -> axum::Router {
        let state = memory_state();
        for route in routes {
            state.store.create(route).await.unwrap();
        }
        router(state)
    }

    #[tokio::test]
    async fn test_ping_end_to_end() {
        let app = router(memory_state());

        let (status, _) = send_admin(
            &app,
            "POST",
            "/_manage/routes",
            Some(json!({
                "path": "/api/ping",
                "methods": ["GET"],
                "response": {"msg": "pong-{{random_choice([A,B])}}"}
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = send(&app, "GET", "/api/ping", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body == json!({"msg": "pong-A"}) || body == json!({"msg": "pong-B"}));

        let (status, body) = send(&app, "DELETE", "/api/ping", None, None).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert!(body["error"].as_str().unwrap().contains("DELETE"));

        let (status, _) = send(&app, "GET", "/api/missing", None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_request_body_interpolation() {
        let mut route = NewRoute::new(
            "/greet",
            json!({"greeting": "Hello {{request.json.name}}", "age": "{{request.json.age}}"}),
        );
        route.methods = vec!["POST".to_string()];
        let app = app_with(vec![route]).await;

        let (status, body) = send(
            &app,
            "POST",
            "/greet",
            None,
            Some(json!({"name": "Ann", "age": 31})),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"greeting": "Hello Ann", "age": 31}));
    }

    #[tokio::test]
    async fn test_status_and_headers_override_defaults() {
        let mut route = NewRoute::new("/teapot", json!({"short": "stout"}));
        route.status_code = 418;
        route.headers = json!({
            "Content-Type": "application/problem+json",
            "X-Request-Path": "{{request.json.missing}}",
            "Bad Header": "dropped"
        });
        let app = app_with(vec![route]).await;

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/teapot")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::IM_A_TEAPOT);
        let headers = response.headers();
        assert_eq!(headers[header::CONTENT_TYPE], "application/problem+json");
        assert_eq!(headers["x-request-path"], "{{request.json.missing}}");
        assert!(headers.get("bad header").is_none());

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: JsonValue = serde_json::from_slice(&body).unwrap();
        assert_eq!(json, json!({"short": "stout"}));
    }

    #[tokio::test]
    async fn test_default_content_type_is_json() {
        let app = app_with(vec![NewRoute::new("/plain", json!("text"))]).await;
        let response = app
            .oneshot(Request::builder().uri("/plain").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
    }

    #[tokio::test]
    async fn test_non_json_body_is_ignored() {
        let mut route = NewRoute::new("/echo", json!("{{request.json.name}}"));
        route.methods = vec!["POST".to_string()];
        let app = app_with(vec![route]).await;

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/echo")
                    .header("content-type", "text/plain")
                    .body(Body::from("name=Ann"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: JsonValue = serde_json::from_slice(&body).unwrap();
        assert_eq!(json, json!("{{request.json.name}}"));
    }

    #[test]
    fn test_request_context_collects_query_form_and_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/x-www-form-urlencoded"),
        );
        headers.insert("x-trace", HeaderValue::from_static("abc"));
        let uri: Uri = "/search?q=rust+lang&page=2".parse().unwrap();
        let body = Bytes::from_static(b"user=ann&city=Z%C3%BCrich");

        let ctx = request_context(&Method::POST, &uri, &headers, &body);

        assert_eq!(ctx.method, "POST");
        assert_eq!(ctx.path, "/search");
        assert_eq!(ctx.query.get("q").map(String::as_str), Some("rust lang"));
        assert_eq!(ctx.query.get("page").map(String::as_str), Some("2"));
        assert_eq!(ctx.form.get("city").map(String::as_str), Some("Zürich"));
        assert_eq!(ctx.headers.get("x-trace").map(String::as_str), Some("abc"));
        assert!(ctx.json.is_empty());
    }

    #[tokio::test]
    async fn test_root_path_route() {
        let app = app_with(vec![NewRoute::new("/", json!({"root": true}))]).await;
        let (status, body) = send(&app, "GET", "/", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"root": true}));
    }
}
