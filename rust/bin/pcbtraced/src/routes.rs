//! Route registration: system endpoints, module routes and the layer stack.

use std::any::Any;
use std::time::Duration;

use axum::extract::{Request, State};
use axum::http::{HeaderValue, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use pcbtrace_core::{ServerSection, ServiceError};

/// Build the complete router: system endpoints, every module's routes,
/// and the request deadline, panic, tracing and CORS layers.
pub fn build_router(server: &ServerSection, module_routes: Vec<(&str, Router)>) -> Router {
    let mut app = Router::new()
        .route("/", get(index))
        .route("/health", get(health));

    for (name, router) in module_routes {
        tracing::debug!(module = name, "mounting module routes");
        app = app.merge(router);
    }

    let deadline = Duration::from_secs(server.request_timeout_secs);
    let app = app
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(deadline, enforce_deadline))
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http());

    match cors_layer(&server.cors_origins) {
        Some(cors) => app.layer(cors),
        None => app,
    }
}

fn cors_layer(origins: &[String]) -> Option<CorsLayer> {
    if origins.is_empty() {
        return None;
    }
    let layer = CorsLayer::new().allow_methods([Method::GET, Method::POST]);
    if origins.iter().any(|o| o == "*") {
        return Some(layer.allow_origin(tower_http::cors::Any).allow_headers(tower_http::cors::Any));
    }
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = %o, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    Some(
        layer
            .allow_origin(AllowOrigin::list(allowed))
            .allow_headers([axum::http::header::CONTENT_TYPE]),
    )
}

async fn enforce_deadline(State(limit): State<Duration>, req: Request, next: Next) -> Response {
    let uri = req.uri().clone();
    match tokio::time::timeout(limit, next.run(req)).await {
        Ok(resp) => resp,
        Err(_) => {
            tracing::warn!(%uri, limit_secs = limit.as_secs_f64(), "request timed out");
            ServiceError::Unavailable("request timed out".into()).into_response()
        }
    }
}

fn panic_response(_: Box<dyn Any + Send + 'static>) -> Response {
    tracing::error!("handler panicked");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "Internal server error" })),
    )
        .into_response()
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "Endpoint not found" })))
}

async fn index() -> impl IntoResponse {
    Json(json!({
        "message": "Manufacturing Data API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "search_get": "GET /api/search/{pcb_sr_no}",
            "search_post": "POST /api/search {\"pcb_sr_no\": \"...\"}",
            "search_by_lot": "GET /api/search-by-lot/{lot_no}",
            "search_by_model": "GET /api/search-by-model/{model}",
            "all_records": "GET /api/all?page=1&per_page=10",
            "stats": "GET /api/stats",
            "health": "GET /health",
        }
    }))
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}
