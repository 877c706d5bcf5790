//! API routes.

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::limit::RequestBodyLimitLayer;

use crate::handlers::{
    clip_videos, create_reels, delete_embeddings, download_video, extract_images, health, map_script,
    retrieve_embeddings, store_embeddings,
};
use crate::metrics::metrics_middleware;
use crate::middleware::{
    cors_layer, rate_limit_middleware, request_id, request_logging, request_timeout, security_headers,
    RateLimiterCache,
};
use crate::state::AppState;

/// Create the API router.
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let rate_limiter = Arc::new(RateLimiterCache::new(state.config.rate_limit_rps));

    let stage_routes = Router::new()
        // Scenes and frames
        .route("/clip_videos", post(clip_videos))
        .route("/extract_images", post(extract_images))
        .route("/download_video", post(download_video))
        // Vector index
        .route("/store_embeddings", post(store_embeddings))
        .route("/retrieve_embeddings", post(retrieve_embeddings))
        .route("/delete_embeddings", post(delete_embeddings))
        .route("/map_script", post(map_script))
        // Reels
        .route("/create_reels", post(create_reels))
        .layer(middleware::from_fn_with_state(
            state.config.request_timeout,
            request_timeout,
        ))
        .layer(middleware::from_fn_with_state(rate_limiter, rate_limit_middleware));

    let metrics_routes = match metrics_handle {
        Some(handle) => Router::new().route("/metrics", get(move || async move { handle.render() })),
        None => Router::new(),
    };

    Router::new()
        .merge(stage_routes)
        .route("/health", get(health))
        .merge(metrics_routes)
        // Uploads are bounded by the configured limit, not axum's default.
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(state.config.max_body_size))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(security_headers))
        .layer(middleware::from_fn(request_logging))
        .layer(middleware::from_fn(request_id))
        .layer(cors_layer(&state.config.cors_origins))
        .with_state(state)
}
