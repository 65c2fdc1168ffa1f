//! HTTP gateway store client
//!
//! Talks to a JSON gateway in front of the document store:
//! - `POST {endpoint}/scan` `{table, next_token}` -> `{items, next_token}`
//! - `POST {endpoint}/batch-get` `{table, key, keys}` -> `{items}`
//!
//! Each scan request returns one page; callers follow `next_token` until the
//! gateway stops returning one.

use super::{RecordStore, ScanPage, StoreError, StoreResult, DEFAULT_MAX_BATCH_KEYS};
use crate::records::Item;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

pub struct HttpStore {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    max_batch_keys: usize,
}

#[derive(Serialize)]
struct ScanRequest<'a> {
    table: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    next_token: Option<&'a str>,
}

#[derive(Deserialize)]
struct ScanResponse {
    #[serde(default)]
    items: Vec<Item>,
    #[serde(default)]
    next_token: Option<String>,
}

#[derive(Serialize)]
struct BatchGetRequest<'a> {
    table: &'a str,
    key: &'a str,
    keys: &'a [String],
}

#[derive(Deserialize)]
struct BatchGetResponse {
    #[serde(default)]
    items: Vec<Item>,
}

impl HttpStore {
    pub fn new(endpoint: &str, timeout: Duration) -> StoreResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StoreError::Request(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key: None,
            max_batch_keys: DEFAULT_MAX_BATCH_KEYS,
        })
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }

    pub fn with_max_batch_keys(mut self, max: usize) -> Self {
        self.max_batch_keys = max.max(1);
        self
    }

    async fn post<B: Serialize, R: for<'de> Deserialize<'de>>(&self, path: &str, body: &B) -> StoreResult<R> {
        let url = format!("{}/{}", self.endpoint, path);
        let mut request = self.client.post(&url).json(body);
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        let resp = request.send().await.map_err(|e| {
            if e.is_timeout() {
                StoreError::Unavailable(format!("request to {} timed out", url))
            } else {
                StoreError::Unavailable(e.to_string())
            }
        })?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(classify_status(status, text));
        }

        resp.json().await.map_err(|e| StoreError::Decode(e.to_string()))
    }
}

fn classify_status(status: StatusCode, body: String) -> StoreError {
    let message = format!("{}: {}", status, body);
    if status == StatusCode::TOO_MANY_REQUESTS {
        StoreError::Throttled(message)
    } else if status.is_server_error() {
        StoreError::Unavailable(message)
    } else if status == StatusCode::NOT_FOUND {
        StoreError::TableNotFound(message)
    } else {
        StoreError::Request(message)
    }
}

#[async_trait]
impl RecordStore for HttpStore {
    async fn scan_page(&self, table: &str, next_token: Option<&str>) -> StoreResult<ScanPage> {
        let resp: ScanResponse = self.post("scan", &ScanRequest { table, next_token }).await?;
        debug!(
            "Scan {} page: {} items, more: {}",
            table,
            resp.items.len(),
            resp.next_token.is_some()
        );
        Ok(ScanPage {
            items: resp.items,
            next_token: resp.next_token.filter(|token| !token.is_empty()),
        })
    }

    async fn batch_get(&self, table: &str, key: &str, ids: &[String]) -> StoreResult<Vec<Item>> {
        if ids.len() > self.max_batch_keys {
            return Err(StoreError::TooManyKeys {
                requested: ids.len(),
                max: self.max_batch_keys,
            });
        }
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let resp: BatchGetResponse = self
            .post("batch-get", &BatchGetRequest { table, key, keys: ids })
            .await?;
        Ok(resp.items)
    }

    fn max_batch_keys(&self) -> usize {
        self.max_batch_keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(classify_status(StatusCode::SERVICE_UNAVAILABLE, String::new()).is_transient());
        assert!(classify_status(StatusCode::TOO_MANY_REQUESTS, String::new()).is_transient());
        assert!(!classify_status(StatusCode::BAD_REQUEST, String::new()).is_transient());
        assert!(matches!(
            classify_status(StatusCode::NOT_FOUND, "no such table".into()),
            StoreError::TableNotFound(_)
        ));
    }

    #[test]
    fn test_endpoint_is_normalized() {
        let store = HttpStore::new("http://localhost:9000/", Duration::from_secs(5)).unwrap();
        assert_eq!(store.endpoint, "http://localhost:9000");
        assert_eq!(store.max_batch_keys(), DEFAULT_MAX_BATCH_KEYS);
    }
}
