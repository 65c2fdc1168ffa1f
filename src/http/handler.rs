//! HTTP handlers for the graph API

use super::server::AppState;
use crate::cache::{CacheState, SnapshotOrigin};
use crate::pipeline::PipelineError;
use crate::services::ServiceError;
use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

fn service_error_response(err: ServiceError) -> Response {
    let status = match err {
        ServiceError::NotConfigured(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::BAD_GATEWAY,
    };
    warn!("Collaborator call failed: {}", err);
    error_response(status, err.to_string())
}

/// Non-empty value of an optional request field
fn required(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Serve the current snapshot; never fails
pub async fn graph_data_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.cache.get().await)
}

/// Rebuild the snapshot from the store
pub async fn rebuild_handler(State(state): State<AppState>) -> Response {
    match state.pipeline.rebuild().await {
        Ok(summary) => Json(json!({
            "ok": true,
            "nodes": summary.nodes,
            "links": summary.links,
            "duration_ms": summary.duration_ms,
            "finished_at": summary.finished_at,
        }))
        .into_response(),
        Err(e) => {
            let status = match e {
                PipelineError::ReadOnly => StatusCode::SERVICE_UNAVAILABLE,
                PipelineError::RebuildInProgress => StatusCode::CONFLICT,
                PipelineError::Fetch(_) | PipelineError::Persist(_) => StatusCode::INTERNAL_SERVER_ERROR,
            };
            (status, Json(json!({ "ok": false, "reason": e.to_string() }))).into_response()
        }
    }
}

#[derive(Deserialize)]
pub struct PaperLabRequest {
    #[serde(default)]
    pub document_id: Option<String>,
}

/// Owning lab of a document, `null` when unknown
pub async fn paper_lab_id_handler(
    State(state): State<AppState>,
    Json(payload): Json<PaperLabRequest>,
) -> Response {
    let Some(document_id) = required(&payload.document_id) else {
        return error_response(StatusCode::BAD_REQUEST, "document_id is required");
    };

    let ids = [document_id.to_string()];
    match state.pipeline.fetcher().fetch_publications_by_ids(&ids).await {
        Ok(found) => {
            let lab_id = found.get(document_id).and_then(|p| p.lab_id.clone());
            Json(json!({ "lab_id": lab_id })).into_response()
        }
        Err(e) => error_response(StatusCode::BAD_GATEWAY, e.to_string()),
    }
}

#[derive(Deserialize)]
pub struct DocumentUrlRequest {
    #[serde(default)]
    pub lab_id: Option<String>,
    #[serde(default)]
    pub document_id: Option<String>,
}

/// Time-limited link to a document PDF
pub async fn pdf_url_handler(
    State(state): State<AppState>,
    Json(payload): Json<DocumentUrlRequest>,
) -> Response {
    let (Some(lab_id), Some(document_id)) = (required(&payload.lab_id), required(&payload.document_id)) else {
        return error_response(StatusCode::BAD_REQUEST, "Missing lab_id or document_id");
    };

    match state.url_issuer.presign(lab_id, document_id).await {
        Ok(url) => Json(json!({ "url": url })).into_response(),
        Err(e) => service_error_response(e),
    }
}

#[derive(Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub document_id: Option<String>,
}

/// Question answering over one document
pub async fn rag_chat_handler(
    State(state): State<AppState>,
    Json(payload): Json<ChatRequest>,
) -> Response {
    let (Some(query), Some(document_id)) = (required(&payload.query), required(&payload.document_id)) else {
        return error_response(StatusCode::BAD_REQUEST, "Missing query or document_id");
    };

    match state.knowledge.chat(query, document_id).await {
        Ok(answer) => Json(answer).into_response(),
        Err(e) => service_error_response(e),
    }
}

#[derive(Deserialize)]
pub struct RecommendationRequest {
    #[serde(default)]
    pub resume_text: Option<String>,
}

/// Researcher recommendations for a resume
pub async fn recommendations_handler(
    State(state): State<AppState>,
    Json(payload): Json<RecommendationRequest>,
) -> Response {
    let Some(resume_text) = required(&payload.resume_text) else {
        return error_response(StatusCode::BAD_REQUEST, "Missing resume_text");
    };

    match state.knowledge.recommend(resume_text).await {
        Ok(recommendations) => Json(json!({ "recommendations": recommendations })).into_response(),
        Err(e) => service_error_response(e),
    }
}

pub async fn health_handler() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// Handler for system status
pub async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.cache.get().await;
    let stats = snapshot.stats();
    let origin = match state.cache.state().await {
        CacheState::Unloaded => "unloaded".to_string(),
        CacheState::Loaded(SnapshotOrigin::File(path)) => path.display().to_string(),
        CacheState::Loaded(SnapshotOrigin::Empty) => "empty".to_string(),
        CacheState::Loaded(SnapshotOrigin::Rebuilt) => "rebuilt".to_string(),
    };

    Json(json!({
        "status": "healthy",
        "version": crate::VERSION,
        "read_only": state.pipeline.is_read_only(),
        "snapshot": {
            "origin": origin,
            "nodes": stats.node_count,
            "links": stats.edge_count,
            "nodes_by_kind": stats.nodes_by_kind,
            "links_by_kind": stats.edges_by_kind,
        }
    }))
}
