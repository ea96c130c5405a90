//! HTTP routes of the push endpoint.

mod monitors;
mod pubsub;
mod request;
mod response;

use avroload_pipeline::IngestPipeline;
use axum::Router;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

/// Shared state of every handler.
#[derive(Debug, Clone)]
pub struct AppState {
    pipeline: IngestPipeline,
}

impl AppState {
    pub fn new(pipeline: IngestPipeline) -> Self {
        Self { pipeline }
    }

    pub fn pipeline(&self) -> &IngestPipeline {
        &self.pipeline
    }
}

/// Returns the router with every route and request tracing applied.
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(monitors::health_status))
        .route("/pubsub", post(pubsub::receive_message))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
