//! External collaborators
//!
//! Document links and knowledge-base answers come from managed services the
//! pipeline does not own. They sit behind two narrow traits so the HTTP layer
//! can be served with real clients, disabled stand-ins, or test doubles.

pub mod http;

pub use http::{HttpKnowledgeService, HttpUrlIssuer};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Default lifetime of an issued document URL
pub const DEFAULT_URL_EXPIRY_SECS: u64 = 3600;

/// Collaborator errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ServiceError {
    #[error("Service not configured: {0}")]
    NotConfigured(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Answer to a question about one document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatAnswer {
    pub answer: String,
    #[serde(default)]
    pub citations: Vec<Value>,
}

/// Issues time-limited links to stored documents
#[async_trait]
pub trait DocumentUrlIssuer: Send + Sync {
    /// Link to the PDF of `document_id` owned by `lab_id`
    async fn presign(&self, lab_id: &str, document_id: &str) -> ServiceResult<String>;
}

/// Retrieval-augmented answers over the document corpus
#[async_trait]
pub trait KnowledgeService: Send + Sync {
    async fn chat(&self, query: &str, document_id: &str) -> ServiceResult<ChatAnswer>;

    /// Ranked researcher recommendations for free text such as a resume
    async fn recommend(&self, text: &str) -> ServiceResult<Vec<Value>>;
}

/// Storage key of a document's PDF
pub fn object_key(lab_id: &str, document_id: &str) -> String {
    format!("{}/{}.pdf", lab_id, document_id)
}

/// Extract `recommendations` from model output text
///
/// The model is asked for `{"recommendations": [...]}`; anything else yields
/// an empty list.
pub fn parse_recommendations(output_text: &str) -> Vec<Value> {
    match serde_json::from_str::<Value>(output_text) {
        Ok(Value::Object(mut parsed)) => match parsed.remove("recommendations") {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

/// Stand-in used when no collaborator endpoint is configured
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledServices;

#[async_trait]
impl DocumentUrlIssuer for DisabledServices {
    async fn presign(&self, _lab_id: &str, _document_id: &str) -> ServiceResult<String> {
        Err(ServiceError::NotConfigured("document storage".to_string()))
    }
}

#[async_trait]
impl KnowledgeService for DisabledServices {
    async fn chat(&self, _query: &str, _document_id: &str) -> ServiceResult<ChatAnswer> {
        Err(ServiceError::NotConfigured("knowledge base".to_string()))
    }

    async fn recommend(&self, _text: &str) -> ServiceResult<Vec<Value>> {
        Err(ServiceError::NotConfigured("knowledge base".to_string()))
    }
}
