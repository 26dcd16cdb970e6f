use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::extract::ExtractOrchestrator;
use crate::search::SearchService;

pub mod handlers;
pub mod models;

#[derive(Clone)]
pub struct AppState {
    pub search: Arc<SearchService>,
    pub extract: Arc<ExtractOrchestrator>,
}

pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/search", post(handlers::search_handler))
        .route("/extract", post(handlers::extract_handler))
        .route("/health", get(handlers::health_handler))
        .route("/robots.txt", get(handlers::robots_handler))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
}
