// src/routes/mod.rs
pub mod chat;

use std::path::Path;

use crate::{message::HealthResponse, state::SharedState};
use axum::{
    Json, Router,
    extract::Request,
    http::{HeaderValue, Method, header::CONTENT_TYPE, header::InvalidHeaderValue},
    middleware::{self, Next},
    response::Response,
    routing::{get, get_service, post},
};
use chat::{chat_handler, end_handler};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

pub fn create_router(static_dir: impl AsRef<Path>) -> Router<SharedState> {
    let static_dir = static_dir.as_ref();

    Router::new()
        .route("/", get_service(ServeFile::new(static_dir.join("index.html"))))
        .route("/health", get(health_handler))
        .route("/chat", post(chat_handler))
        .route("/end", post(end_handler))
        .nest_service("/static", ServeDir::new(static_dir))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(request_id_middleware))
}

pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}

/// CORS policy from the configured origins: none, `*`, or an explicit list.
pub fn cors_layer(allow_origins: &[String]) -> Result<CorsLayer, InvalidHeaderValue> {
    let origins: Vec<&str> = allow_origins
        .iter()
        .map(|o| o.trim())
        .filter(|o| !o.is_empty())
        .collect();

    if origins.is_empty() {
        return Ok(CorsLayer::new());
    }
    if origins.contains(&"*") {
        return Ok(CorsLayer::very_permissive());
    }

    let origins = origins
        .into_iter()
        .map(HeaderValue::from_str)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE]))
}

async fn request_id_middleware(mut req: Request, next: Next) -> Response {
    let request_id = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        req.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    let mut response = next.run(req).await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}
