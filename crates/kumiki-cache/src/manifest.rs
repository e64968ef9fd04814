//! On-disk manifest of cached artifacts.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, warn};

use crate::error::CacheResult;

/// Manifest format version.
pub const MANIFEST_VERSION: &str = "1.0";

/// Manifest file name inside each cache directory.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Index of one cache directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub version: String,
    #[serde(default)]
    pub entries: Vec<CacheEntry>,
}

impl Default for Manifest {
    fn default() -> Self {
        Self {
            version: MANIFEST_VERSION.to_string(),
            entries: Vec::new(),
        }
    }
}

/// One cached artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    /// Normalized request parameters the artifact was generated from.
    pub params: serde_json::Value,
    pub metadata: EntryMetadata,
    pub usage: EntryUsage,
}

/// Generation metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryMetadata {
    pub generated_at: DateTime<Utc>,
    pub model: String,
    pub file_size: u64,
    pub mime_type: String,
    /// Kind-specific fields such as `duration` or `sampleRate`.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Usage statistics, bumped on every hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryUsage {
    pub last_used: DateTime<Utc>,
    pub use_count: u64,
    #[serde(default)]
    pub projects: Vec<String>,
}

impl EntryUsage {
    pub fn new(now: DateTime<Utc>, project: Option<&str>) -> Self {
        Self {
            last_used: now,
            use_count: 1,
            projects: project.map(|p| vec![p.to_string()]).unwrap_or_default(),
        }
    }

    /// Record a hit from `project`.
    pub fn touch(&mut self, now: DateTime<Utc>, project: Option<&str>) {
        self.last_used = now;
        self.use_count += 1;
        if let Some(project) = project {
            if !self.projects.iter().any(|p| p == project) {
                self.projects.push(project.to_string());
            }
        }
    }
}

impl Manifest {
    /// Load a manifest; a missing or unreadable file yields an empty one.
    pub async fn load(path: &Path) -> Self {
        let data = match fs::read(path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No manifest yet, starting empty");
                return Self::default();
            }
            Err(e) => {
                warn!(path = %path.display(), "Failed to read cache manifest: {}", e);
                return Self::default();
            }
        };

        match serde_json::from_slice(&data) {
            Ok(manifest) => manifest,
            Err(e) => {
                warn!(path = %path.display(), "Corrupt cache manifest, starting empty: {}", e);
                Self::default()
            }
        }
    }

    /// Write the manifest through a sibling temp file.
    pub async fn save(&self, path: &Path) -> CacheResult<()> {
        let json = serde_json::to_vec_pretty(self)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).await?;
        fs::rename(&tmp, path).await?;
        Ok(())
    }

    pub fn find(&self, key: &str) -> Option<&CacheEntry> {
        self.entries.iter().find(|e| e.key == key)
    }

    pub fn find_mut(&mut self, key: &str) -> Option<&mut CacheEntry> {
        self.entries.iter_mut().find(|e| e.key == key)
    }

    /// Insert or replace the entry with the same key.
    pub fn upsert(&mut self, entry: CacheEntry) {
        match self.entries.iter().position(|e| e.key == entry.key) {
            Some(idx) => self.entries[idx] = entry,
            None => self.entries.push(entry),
        }
    }

    /// Remove an entry; returns whether one was present.
    pub fn remove(&mut self, key: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.key != key);
        self.entries.len() != before
    }
}
