//! HTTP clients for the collaborator services
//!
//! Both talk JSON to a gateway in front of the managed services:
//! - `POST {endpoint}/presign` `{key, expires_in}` -> `{url}`
//! - `POST {endpoint}/retrieve-and-generate` `{input, document_id?}` ->
//!   `{output: {text}, citations}`

use super::{
    object_key, parse_recommendations, ChatAnswer, DocumentUrlIssuer, KnowledgeService, ServiceError,
    ServiceResult,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

const NO_ANSWER: &str = "No answer generated";

/// Shared JSON-over-HTTP plumbing
struct Gateway {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl Gateway {
    fn new(endpoint: &str, api_key: Option<String>, timeout: Duration) -> ServiceResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServiceError::NotConfigured(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    async fn post<B: Serialize, R: DeserializeOwned>(&self, path: &str, body: &B) -> ServiceResult<R> {
        let url = format!("{}/{}", self.endpoint, path);
        let mut request = self.client.post(&url).json(body);
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        let resp = request
            .send()
            .await
            .map_err(|e| ServiceError::Network(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(ServiceError::Api(format!("{} returned {}", url, resp.status())));
        }

        resp.json()
            .await
            .map_err(|e| ServiceError::Serialization(e.to_string()))
    }
}

/// Presigned document links from the storage gateway
pub struct HttpUrlIssuer {
    gateway: Gateway,
    expiry_secs: u64,
}

impl HttpUrlIssuer {
    pub fn new(endpoint: &str, api_key: Option<String>, timeout: Duration, expiry_secs: u64) -> ServiceResult<Self> {
        Ok(Self {
            gateway: Gateway::new(endpoint, api_key, timeout)?,
            expiry_secs,
        })
    }
}

#[async_trait]
impl DocumentUrlIssuer for HttpUrlIssuer {
    async fn presign(&self, lab_id: &str, document_id: &str) -> ServiceResult<String> {
        #[derive(Serialize)]
        struct Request {
            key: String,
            expires_in: u64,
        }

        #[derive(Deserialize)]
        struct Response {
            url: String,
        }

        let key = object_key(lab_id, document_id);
        debug!("Presigning {} for {}s", key, self.expiry_secs);
        let resp: Response = self
            .gateway
            .post(
                "presign",
                &Request {
                    key,
                    expires_in: self.expiry_secs,
                },
            )
            .await?;
        Ok(resp.url)
    }
}

/// Retrieval-augmented generation through the knowledge-base gateway
pub struct HttpKnowledgeService {
    gateway: Gateway,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    input: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    document_id: Option<&'a str>,
}

#[derive(Deserialize, Default)]
struct GenerateOutput {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    output: GenerateOutput,
    #[serde(default)]
    citations: Vec<Value>,
}

impl HttpKnowledgeService {
    pub fn new(endpoint: &str, api_key: Option<String>, timeout: Duration) -> ServiceResult<Self> {
        Ok(Self {
            gateway: Gateway::new(endpoint, api_key, timeout)?,
        })
    }

    async fn generate(&self, input: &str, document_id: Option<&str>) -> ServiceResult<GenerateResponse> {
        self.gateway
            .post("retrieve-and-generate", &GenerateRequest { input, document_id })
            .await
    }
}

#[async_trait]
impl KnowledgeService for HttpKnowledgeService {
    async fn chat(&self, query: &str, document_id: &str) -> ServiceResult<ChatAnswer> {
        let resp = self.generate(query, Some(document_id)).await?;
        Ok(ChatAnswer {
            answer: resp.output.text.unwrap_or_else(|| NO_ANSWER.to_string()),
            citations: resp.citations,
        })
    }

    async fn recommend(&self, text: &str) -> ServiceResult<Vec<Value>> {
        let resp = self.generate(text, None).await?;
        Ok(parse_recommendations(resp.output.text.as_deref().unwrap_or_default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_is_normalized() {
        let issuer = HttpUrlIssuer::new("https://docs.example.org/", None, Duration::from_secs(5), 3600).unwrap();
        assert_eq!(issuer.gateway.endpoint, "https://docs.example.org");
        assert_eq!(issuer.expiry_secs, 3600);
    }

    #[test]
    fn test_generate_response_defaults() {
        let resp: GenerateResponse = serde_json::from_str("{}").unwrap();
        assert!(resp.output.text.is_none());
        assert!(resp.citations.is_empty());
    }

    #[test]
    fn test_generate_request_omits_missing_document() {
        let body = serde_json::to_value(GenerateRequest {
            input: "resume",
            document_id: None,
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({"input": "resume"}));
    }
}
