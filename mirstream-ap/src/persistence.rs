//! Feature log: JSON record of features served over HTTP
//!
//! The file always holds one JSON array. It is reset to `[]` at startup and
//! rewritten in full on every append; appends are serialized by an async mutex.

use crate::error::{Error, Result};
use mirstream_common::FeatureRecord;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info};

pub struct FeatureLog {
    path: PathBuf,
    entries: Mutex<Vec<FeatureRecord>>,
}

impl FeatureLog {
    /// Create (or truncate) the log file with an empty array
    pub fn create(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, "[]").map_err(|e| {
            Error::Persistence(format!("Failed to reset {}: {}", path.display(), e))
        })?;
        info!("Feature log reset: {}", path.display());

        Ok(Self {
            path,
            entries: Mutex::new(Vec::new()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a record and rewrite the file
    pub async fn append(&self, record: FeatureRecord) -> Result<()> {
        let mut entries = self.entries.lock().await;
        entries.push(record);

        let json = serde_json::to_vec_pretty(&*entries)?;
        tokio::fs::write(&self.path, json).await.map_err(|e| {
            Error::Persistence(format!("Failed to write {}: {}", self.path.display(), e))
        })?;

        debug!("Feature log: {} entries", entries.len());
        Ok(())
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
