//! review-server library - review validation HTTP service
//!
//! Serves review queues from the warehouse, records reviewer decisions in the
//! evaluation table and, when configured, suggests similar reviews.

use axum::{
    http::{header::CONTENT_TYPE, HeaderValue, Method},
    Router,
};
use std::path::PathBuf;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};
use tracing::{info, warn};

pub mod api;
pub mod error;
pub mod mock;
pub mod service;

use service::ReviewService;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ReviewService>,
    /// Built frontend, served at `/` when present
    pub frontend_dir: Option<PathBuf>,
    /// Allowed CORS origins; empty allows any origin
    pub cors_origins: Vec<String>,
}

impl AppState {
    pub fn new(service: ReviewService) -> Self {
        Self {
            service: Arc::new(service),
            frontend_dir: None,
            cors_origins: Vec::new(),
        }
    }

    pub fn with_frontend_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.frontend_dir = dir;
        self
    }

    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = origins;
        self
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE]);

    if origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let allowed = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect::<Vec<_>>();

    layer.allow_origin(allowed).allow_credentials(true)
}

/// Build application router
///
/// API routes live under `/api/v1`. Anything else falls through to the frontend
/// build when it exists, otherwise `/` answers with a JSON banner.
pub fn build_router(state: AppState) -> Router {
    use axum::routing::{get, post};

    let v1 = Router::new()
        .route("/reviews", get(api::list_reviews))
        .route("/reviews/:id", get(api::get_review))
        .route("/reviews/:id/similar", get(api::get_similar_reviews))
        .route("/reviews/:id/validate", post(api::validate_review))
        .route("/refresh-random-sample", post(api::refresh_random_sample))
        .route("/metrics/overview", get(api::get_metrics_overview))
        .route("/recommendations", get(api::get_recommendation_groups))
        .route(
            "/recommendations/:source_review_id",
            get(api::get_recommendations_by_source),
        )
        .route("/test-connection", get(api::test_connection))
        .route("/test-evaluation-table", get(api::test_evaluation_table))
        .merge(api::health_routes());

    let router = Router::new()
        .nest("/api/v1", v1)
        .route("/api/debug/frontend", get(api::debug_frontend));

    let router = match state.frontend_dir.as_ref().filter(|d| d.is_dir()) {
        Some(dir) => {
            info!("Serving frontend from {}", dir.display());
            let index = dir.join("index.html");
            router.fallback_service(ServeDir::new(dir).fallback(ServeFile::new(index)))
        }
        None => {
            if let Some(dir) = &state.frontend_dir {
                warn!("Frontend build not found: {}", dir.display());
            }
            router.route("/", get(api::root_banner))
        }
    };

    let middleware = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&state.cors_origins));

    router.layer(middleware).with_state(state)
}
