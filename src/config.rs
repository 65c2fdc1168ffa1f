//! Pipeline configuration
//!
//! Loaded from an optional YAML file, then overridden by environment
//! variables. Each setting accepts a list of variable names and takes the
//! first one that is set and non-empty.
//!
//! Supported environment variables:
//! - `PIGEON_HOST`, `PIGEON_PORT` (or `PORT`): listen address
//! - `PIGEON_STORE_KIND`: `disabled` (default), `memory`, `json_dir` or `http`
//! - `PIGEON_STORE_ENDPOINT`, `PIGEON_STORE_DIR`, `PIGEON_STORE_API_KEY`
//! - `PIGEON_MAX_BATCH_KEYS`, `PIGEON_REQUEST_TIMEOUT_MS`
//! - `PIGEON_CACHE_PATH`: snapshot write path, also read first
//! - `PIGEON_READ_ONLY`; the presence of `VERCEL` forces read-only mode
//! - `PIGEON_DOCUMENT_ENDPOINT`, `PIGEON_KNOWLEDGE_ENDPOINT`, `PIGEON_SERVICES_API_KEY`
//! - `PIGEON_URL_EXPIRY_SECS`
//! - `PIGEON_LOG_LEVEL`

use crate::assemble::GraphAssembler;
use crate::cache::{CacheStore, SnapshotWriter};
use crate::fetch::{RecordFetcher, RetryPolicy, TableNames};
use crate::pipeline::RebuildPipeline;
use crate::services::{
    DisabledServices, DocumentUrlIssuer, HttpKnowledgeService, HttpUrlIssuer, KnowledgeService,
    DEFAULT_URL_EXPIRY_SECS,
};
use crate::store::{
    DisabledStore, HttpStore, JsonDirStore, MemoryStore, RecordStore, DEFAULT_MAX_BATCH_KEYS,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn, Level};

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read config file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config file: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
        }
    }
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Which [`RecordStore`] implementation to build
///
/// Defaults to `Disabled`: rebuilds fail until a real store is configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreKind {
    #[default]
    Disabled,
    Memory,
    JsonDir,
    Http,
}

impl FromStr for StoreKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "disabled" | "none" => Ok(StoreKind::Disabled),
            "memory" => Ok(StoreKind::Memory),
            "json_dir" | "json-dir" | "dir" => Ok(StoreKind::JsonDir),
            "http" => Ok(StoreKind::Http),
            other => Err(ConfigError::Invalid(format!("unknown store kind '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub kind: StoreKind,
    /// Gateway URL for the `http` store
    pub endpoint: Option<String>,
    /// Export directory for the `json_dir` store
    pub directory: Option<PathBuf>,
    pub api_key: Option<String>,
    pub max_batch_keys: usize,
    pub request_timeout_ms: u64,
    pub tables: TableNames,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            kind: StoreKind::Disabled,
            endpoint: None,
            directory: None,
            api_key: None,
            max_batch_keys: DEFAULT_MAX_BATCH_KEYS,
            request_timeout_ms: 10_000,
            tables: TableNames::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Snapshot sources, highest priority first
    pub snapshot_paths: Vec<PathBuf>,
    /// Where rebuilds persist the snapshot
    pub write_path: PathBuf,
    pub read_only: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            snapshot_paths: vec![
                PathBuf::from("cache/graph_cache.json"),
                PathBuf::from("public/graph_cache.json"),
                PathBuf::from("dist/graph_cache.json"),
            ],
            write_path: PathBuf::from("cache/graph_cache.json"),
            read_only: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServicesConfig {
    pub document_endpoint: Option<String>,
    pub knowledge_endpoint: Option<String>,
    pub api_key: Option<String>,
    pub url_expiry_secs: u64,
    pub timeout_secs: u64,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            document_endpoint: None,
            knowledge_endpoint: None,
            api_key: None,
            url_expiry_secs: DEFAULT_URL_EXPIRY_SECS,
            timeout_secs: 60,
        }
    }
}

/// Complete configuration of the server and CLI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub retry: RetryPolicy,
    pub cache: CacheConfig,
    pub services: ServicesConfig,
    pub log_level: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            store: StoreConfig::default(),
            retry: RetryPolicy::default(),
            cache: CacheConfig::default(),
            services: ServicesConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

impl PipelineConfig {
    /// Parse a YAML config file
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok(serde_yaml::from_str(&content)?)
    }

    /// Load with priority: environment > file > defaults
    pub fn load(config_file: Option<&Path>) -> ConfigResult<Self> {
        let mut config = match config_file {
            Some(path) if path.exists() => {
                info!("Loading configuration from {}", path.display());
                Self::from_file(path)?
            }
            Some(path) => {
                warn!("Config file {} not found, using defaults", path.display());
                Self::default()
            }
            None => Self::default(),
        };
        config.apply_env_with(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from `lookup`, which maps a variable name to its value
    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let first = |names: &[&str]| {
            names
                .iter()
                .filter_map(|&name| lookup(name))
                .find(|value| !value.trim().is_empty())
        };

        if let Some(host) = first(&["PIGEON_HOST"]) {
            self.server.host = host;
        }
        if let Some(port) = first(&["PIGEON_PORT", "PORT"]).and_then(|v| v.parse().ok()) {
            self.server.port = port;
        }

        if let Some(kind) = first(&["PIGEON_STORE_KIND"]) {
            match kind.parse() {
                Ok(kind) => self.store.kind = kind,
                Err(e) => warn!("Ignoring PIGEON_STORE_KIND: {}", e),
            }
        }
        if let Some(endpoint) = first(&["PIGEON_STORE_ENDPOINT"]) {
            self.store.endpoint = Some(endpoint);
        }
        if let Some(dir) = first(&["PIGEON_STORE_DIR"]) {
            self.store.directory = Some(PathBuf::from(dir));
        }
        if let Some(key) = first(&["PIGEON_STORE_API_KEY"]) {
            self.store.api_key = Some(key);
        }
        if let Some(max) = first(&["PIGEON_MAX_BATCH_KEYS"]).and_then(|v| v.parse().ok()) {
            self.store.max_batch_keys = max;
        }
        if let Some(ms) = first(&["PIGEON_REQUEST_TIMEOUT_MS"]).and_then(|v| v.parse().ok()) {
            self.store.request_timeout_ms = ms;
        }

        if let Some(path) = first(&["PIGEON_CACHE_PATH"]) {
            let path = PathBuf::from(path);
            self.cache.snapshot_paths.retain(|p| p != &path);
            self.cache.snapshot_paths.insert(0, path.clone());
            self.cache.write_path = path;
        }
        if let Some(flag) = first(&["PIGEON_READ_ONLY"]) {
            self.cache.read_only = parse_flag(&flag);
        }
        if lookup("VERCEL").is_some() {
            self.cache.read_only = true;
        }

        if let Some(endpoint) = first(&["PIGEON_DOCUMENT_ENDPOINT"]) {
            self.services.document_endpoint = Some(endpoint);
        }
        if let Some(endpoint) = first(&["PIGEON_KNOWLEDGE_ENDPOINT"]) {
            self.services.knowledge_endpoint = Some(endpoint);
        }
        if let Some(key) = first(&["PIGEON_SERVICES_API_KEY"]) {
            self.services.api_key = Some(key);
        }
        if let Some(secs) = first(&["PIGEON_URL_EXPIRY_SECS"]).and_then(|v| v.parse().ok()) {
            self.services.url_expiry_secs = secs;
        }

        if let Some(level) = first(&["PIGEON_LOG_LEVEL"]) {
            self.log_level = level;
        }
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.store.max_batch_keys == 0 || self.store.max_batch_keys > DEFAULT_MAX_BATCH_KEYS {
            return Err(ConfigError::Invalid(format!(
                "store.max_batch_keys must be between 1 and {}",
                DEFAULT_MAX_BATCH_KEYS
            )));
        }
        match self.store.kind {
            StoreKind::Http if self.store.endpoint.is_none() => Err(ConfigError::Invalid(
                "store.endpoint is required for the http store".to_string(),
            )),
            StoreKind::JsonDir if self.store.directory.is_none() => Err(ConfigError::Invalid(
                "store.directory is required for the json_dir store".to_string(),
            )),
            _ => Ok(()),
        }
    }

    /// Max level for the tracing subscriber, `INFO` when unparseable
    pub fn tracing_level(&self) -> Level {
        self.log_level.parse().unwrap_or(Level::INFO)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.store.request_timeout_ms)
    }

    pub fn build_store(&self) -> ConfigResult<Arc<dyn RecordStore>> {
        let max = self.store.max_batch_keys;
        let store: Arc<dyn RecordStore> = match self.store.kind {
            StoreKind::Disabled => {
                warn!("No record store configured, rebuilds will fail");
                Arc::new(DisabledStore)
            }
            StoreKind::Memory => Arc::new(MemoryStore::new().with_max_batch_keys(max)),
            StoreKind::JsonDir => {
                let dir = self.store.directory.as_ref().ok_or_else(|| {
                    ConfigError::Invalid("store.directory is required for the json_dir store".to_string())
                })?;
                Arc::new(JsonDirStore::new(dir).with_max_batch_keys(max))
            }
            StoreKind::Http => {
                let endpoint = self.store.endpoint.as_deref().ok_or_else(|| {
                    ConfigError::Invalid("store.endpoint is required for the http store".to_string())
                })?;
                let store = HttpStore::new(endpoint, self.request_timeout())
                    .map_err(|e| ConfigError::Invalid(e.to_string()))?
                    .with_api_key(self.store.api_key.clone())
                    .with_max_batch_keys(max);
                Arc::new(store)
            }
        };
        Ok(store)
    }

    pub fn build_fetcher(&self) -> ConfigResult<RecordFetcher> {
        Ok(RecordFetcher::new(self.build_store()?)
            .with_tables(self.store.tables.clone())
            .with_retry(self.retry.clone())
            .with_timeout(self.request_timeout()))
    }

    pub fn build_cache(&self) -> CacheStore {
        CacheStore::new(self.cache.snapshot_paths.clone())
    }

    pub fn build_pipeline(&self, cache: Arc<CacheStore>) -> ConfigResult<RebuildPipeline> {
        Ok(RebuildPipeline::new(
            self.build_fetcher()?,
            GraphAssembler::default(),
            cache,
            SnapshotWriter::new(self.cache.write_path.clone()),
        )
        .with_read_only(self.cache.read_only))
    }

    pub fn build_url_issuer(&self) -> ConfigResult<Arc<dyn DocumentUrlIssuer>> {
        match &self.services.document_endpoint {
            Some(endpoint) => {
                let issuer = HttpUrlIssuer::new(
                    endpoint,
                    self.services.api_key.clone(),
                    Duration::from_secs(self.services.timeout_secs),
                    self.services.url_expiry_secs,
                )
                .map_err(|e| ConfigError::Invalid(e.to_string()))?;
                Ok(Arc::new(issuer))
            }
            None => Ok(Arc::new(DisabledServices)),
        }
    }

    pub fn build_knowledge_service(&self) -> ConfigResult<Arc<dyn KnowledgeService>> {
        match &self.services.knowledge_endpoint {
            Some(endpoint) => {
                let service = HttpKnowledgeService::new(
                    endpoint,
                    self.services.api_key.clone(),
                    Duration::from_secs(self.services.timeout_secs),
                )
                .map_err(|e| ConfigError::Invalid(e.to_string()))?;
                Ok(Arc::new(service))
            }
            None => Ok(Arc::new(DisabledServices)),
        }
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}
