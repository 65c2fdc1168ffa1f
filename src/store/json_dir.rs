//! Table exports on disk
//!
//! Each table is a file `<dir>/<table>.json` holding either a JSON array of
//! items or a scan export of the form `{"Items": [...]}`.

use super::{RecordStore, ScanPage, StoreError, StoreResult, DEFAULT_MAX_BATCH_KEYS};
use crate::records::{item_key, Item};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Read-only store over a directory of table exports
pub struct JsonDirStore {
    dir: PathBuf,
    max_batch_keys: usize,
}

impl JsonDirStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            max_batch_keys: DEFAULT_MAX_BATCH_KEYS,
        }
    }

    pub fn with_max_batch_keys(mut self, max: usize) -> Self {
        self.max_batch_keys = max.max(1);
        self
    }

    fn table_path(&self, table: &str) -> PathBuf {
        self.dir.join(format!("{}.json", table))
    }

    async fn load_table(&self, table: &str) -> StoreResult<Vec<Item>> {
        let path = self.table_path(table);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::TableNotFound(table.to_string()));
            }
            Err(e) => return Err(StoreError::Unavailable(format!("{}: {}", path.display(), e))),
        };

        let document: Value = serde_json::from_slice(&bytes)
            .map_err(|e| StoreError::Decode(format!("{}: {}", path.display(), e)))?;
        let rows = match document {
            Value::Array(rows) => rows,
            Value::Object(mut export) => match export.remove("Items") {
                Some(Value::Array(rows)) => rows,
                _ => {
                    return Err(StoreError::Decode(format!(
                        "{}: expected an array or an object with an \"Items\" array",
                        path.display()
                    )))
                }
            },
            _ => {
                return Err(StoreError::Decode(format!(
                    "{}: expected an array of items",
                    path.display()
                )))
            }
        };

        let items: Vec<Item> = rows
            .into_iter()
            .filter_map(|row| match row {
                Value::Object(item) => Some(item),
                _ => None,
            })
            .collect();
        debug!("Loaded {} items from {}", items.len(), path.display());
        Ok(items)
    }
}

#[async_trait]
impl RecordStore for JsonDirStore {
    async fn scan_page(&self, table: &str, _next_token: Option<&str>) -> StoreResult<ScanPage> {
        Ok(ScanPage::last(self.load_table(table).await?))
    }

    async fn batch_get(&self, table: &str, key: &str, ids: &[String]) -> StoreResult<Vec<Item>> {
        if ids.len() > self.max_batch_keys {
            return Err(StoreError::TooManyKeys {
                requested: ids.len(),
                max: self.max_batch_keys,
            });
        }
        let wanted: HashSet<&str> = ids.iter().map(String::as_str).collect();
        Ok(self
            .load_table(table)
            .await?
            .into_iter()
            .filter(|item| item_key(item, key).is_some_and(|id| wanted.contains(id)))
            .collect())
    }

    fn max_batch_keys(&self) -> usize {
        self.max_batch_keys
    }
}
