//! JSON schedule file.

use std::path::PathBuf;

use async_trait::async_trait;
use facstat_reconcile::{ContentMarker, SourceEntry};
use serde::de::Error as _;
use serde_json::Value;
use tracing::{debug, warn};

use super::{ScheduleSource, SourceBatch, SourceError};

/// A schedule source backed by a JSON file.
///
/// The file holds either an array of entries or an object keyed by
/// identifier. In the keyed form the key becomes the entry's `id` unless the
/// entry names one itself.
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    async fn read(&self) -> Result<Vec<u8>, SourceError> {
        tokio::fs::read(&self.path)
            .await
            .map_err(|source| SourceError::Io {
                path: self.path.clone(),
                source,
            })
    }

    fn parse_error(&self, source: serde_json::Error) -> SourceError {
        SourceError::Parse {
            path: self.path.clone(),
            source,
        }
    }
}

#[async_trait]
impl ScheduleSource for JsonFileSource {
    async fn current_marker(&self) -> Result<String, SourceError> {
        let bytes = self.read().await?;
        let marker = match serde_json::from_slice::<Value>(&bytes) {
            Ok(json) => ContentMarker::from_json(&json),
            Err(_) => ContentMarker::from_bytes(&bytes),
        };
        Ok(marker.into_string())
    }

    async fn load(&self) -> Result<SourceBatch, SourceError> {
        let bytes = self.read().await?;
        let json: Value = serde_json::from_slice(&bytes).map_err(|e| self.parse_error(e))?;

        let mut batch = SourceBatch::default();
        match json {
            Value::Array(items) => {
                for (index, item) in items.into_iter().enumerate() {
                    match serde_json::from_value::<SourceEntry>(item) {
                        Ok(entry) => batch.entries.push(entry),
                        Err(e) => {
                            warn!(index, error = %e, "Skipping malformed schedule entry");
                            batch.rejected += 1;
                        }
                    }
                }
            }
            Value::Object(map) => {
                for (key, value) in map {
                    match serde_json::from_value::<SourceEntry>(value) {
                        Ok(mut entry) => {
                            if entry.id.is_none() {
                                entry.id = Some(key);
                            }
                            batch.entries.push(entry);
                        }
                        Err(e) => {
                            warn!(key = %key, error = %e, "Skipping malformed schedule entry");
                            batch.rejected += 1;
                        }
                    }
                }
            }
            _ => {
                return Err(self.parse_error(serde_json::Error::custom(
                    "expected an array of entries or an object keyed by identifier",
                )))
            }
        }

        debug!(
            path = %self.path.display(),
            entries = batch.entries.len(),
            rejected = batch.rejected,
            "Loaded schedule source"
        );
        Ok(batch)
    }
}
