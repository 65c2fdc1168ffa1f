//! HTTP server for the graph API

use super::handler::{
    graph_data_handler, health_handler, paper_lab_id_handler, pdf_url_handler, rag_chat_handler,
    rebuild_handler, recommendations_handler, status_handler,
};
use crate::cache::CacheStore;
use crate::config::{ConfigResult, PipelineConfig};
use crate::pipeline::RebuildPipeline;
use crate::services::{DocumentUrlIssuer, KnowledgeService};
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<CacheStore>,
    pub pipeline: Arc<RebuildPipeline>,
    pub url_issuer: Arc<dyn DocumentUrlIssuer>,
    pub knowledge: Arc<dyn KnowledgeService>,
}

impl AppState {
    /// Wire the cache, pipeline and collaborators from configuration
    pub fn from_config(config: &PipelineConfig) -> ConfigResult<Self> {
        let cache = Arc::new(config.build_cache());
        Ok(Self {
            pipeline: Arc::new(config.build_pipeline(cache.clone())?),
            cache,
            url_issuer: config.build_url_issuer()?,
            knowledge: config.build_knowledge_service()?,
        })
    }
}

/// All API routes with permissive CORS
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/graph/data", get(graph_data_handler))
        .route("/api/graph/rebuild-cache", post(rebuild_handler))
        .route("/api/graph/paper-lab-id", post(paper_lab_id_handler))
        .route("/api/pdf/url", post(pdf_url_handler))
        .route("/api/rag/chat", post(rag_chat_handler))
        .route("/api/recommendations/from-resume", post(recommendations_handler))
        .route("/api/status", get(status_handler))
        .route("/health", get(health_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// HTTP server serving the graph API
pub struct HttpServer {
    state: AppState,
    address: String,
}

impl HttpServer {
    pub fn new(state: AppState, address: impl Into<String>) -> Self {
        Self {
            state,
            address: address.into(),
        }
    }

    /// Bind and serve until the process exits
    pub async fn start(&self) -> std::io::Result<()> {
        let app = router(self.state.clone());
        let listener = tokio::net::TcpListener::bind(&self.address).await?;

        info!("Graph API listening on http://{}", self.address);

        axum::serve(listener, app).await
    }
}
