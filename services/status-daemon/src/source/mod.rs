//! External schedule sources.
//!
//! A source is the administrator-edited roster that reconciliation merges into
//! the store. Only source adapters touch the filesystem.

mod file;

use std::path::PathBuf;

use async_trait::async_trait;
use facstat_reconcile::SourceEntry;
use thiserror::Error;

pub use file::JsonFileSource;

/// Errors reading a schedule source.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Entries read from a source in one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceBatch {
    pub entries: Vec<SourceEntry>,

    /// Entries that could not be decoded and were left out.
    pub rejected: usize,
}

impl SourceBatch {
    pub fn new(entries: Vec<SourceEntry>) -> Self {
        Self {
            entries,
            rejected: 0,
        }
    }
}

/// A schedule source with change detection.
#[async_trait]
pub trait ScheduleSource: Send + Sync {
    /// Fingerprint of the source's current content.
    async fn current_marker(&self) -> Result<String, SourceError>;

    /// Whether the source differs from the content last synced as `last`.
    async fn has_changed(&self, last: Option<&str>) -> Result<bool, SourceError> {
        let current = self.current_marker().await?;
        Ok(last != Some(current.as_str()))
    }

    /// Read every entry that decodes.
    ///
    /// A malformed entry is dropped and counted in
    /// [`SourceBatch::rejected`]; only an unreadable or unparseable document
    /// is an error. Array sources keep file order. Keyed sources arrive
    /// sorted by key.
    async fn load(&self) -> Result<SourceBatch, SourceError>;
}
