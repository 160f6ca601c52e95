//! Work items and outcome records.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::StorageConfig;

use super::handle::JobHandle;
use super::state::{ExternalStatus, JobState};

/// A container plus a prefix inside it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub container_url: String,
    pub prefix: String,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}",
            self.container_url.trim_end_matches('/'),
            self.prefix
        )
    }
}

/// How folder numbers map onto source and target locations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageLayout {
    pub source_url: String,
    pub target_url: String,
    pub source_prefix: String,
    pub target_prefix: String,
}

impl From<&StorageConfig> for StorageLayout {
    fn from(cfg: &StorageConfig) -> Self {
        Self {
            source_url: cfg.source_url.clone(),
            target_url: cfg.target_url.clone(),
            source_prefix: cfg.source_prefix.clone(),
            target_prefix: cfg.target_prefix.clone(),
        }
    }
}

/// `<root>/<id>/`, or `<id>/` when the root is empty.
fn folder_prefix(root: &str, id: u64) -> String {
    let root = root.trim_matches('/');
    if root.is_empty() {
        format!("{id}/")
    } else {
        format!("{root}/{id}/")
    }
}

/// One folder to de-identify.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: u64,
    pub source: Location,
    pub target: Location,
}

impl WorkItem {
    pub fn new(id: u64, layout: &StorageLayout) -> Self {
        Self {
            id,
            source: Location {
                container_url: layout.source_url.clone(),
                prefix: folder_prefix(&layout.source_prefix, id),
            },
            target: Location {
                container_url: layout.target_url.clone(),
                prefix: folder_prefix(&layout.target_prefix, id),
            },
        }
    }
}

/// Terminal result for one work item. Exactly one per item per run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeRecord {
    pub item_id: u64,
    /// None only when the task died before a handle was generated.
    pub handle: Option<JobHandle>,
    pub source: Location,
    pub target: Location,
    pub state: JobState,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Last status the service reported (set in poll mode).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_external: Option<ExternalStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl OutcomeRecord {
    pub fn handle_str(&self) -> &str {
        self.handle.as_ref().map(JobHandle::as_str).unwrap_or("-")
    }

    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout(source_prefix: &str, target_prefix: &str) -> StorageLayout {
        StorageLayout {
            source_url: "https://acct.blob.core.windows.net/input".into(),
            target_url: "https://acct.blob.core.windows.net/output/".into(),
            source_prefix: source_prefix.into(),
            target_prefix: target_prefix.into(),
        }
    }

    #[test]
    fn work_item_without_root_prefix() {
        let item = WorkItem::new(7, &layout("", ""));
        assert_eq!(item.source.prefix, "7/");
        assert_eq!(item.target.prefix, "7/");
        assert_eq!(
            item.source.to_string(),
            "https://acct.blob.core.windows.net/input/7/"
        );
        assert_eq!(
            item.target.to_string(),
            "https://acct.blob.core.windows.net/output/7/"
        );
    }

    #[test]
    fn work_item_with_root_prefix() {
        let item = WorkItem::new(12, &layout("/notes/raw/", "notes/clean"));
        assert_eq!(item.source.prefix, "notes/raw/12/");
        assert_eq!(item.target.prefix, "notes/clean/12/");
    }

    #[test]
    fn layout_from_storage_config() {
        let cfg = StorageConfig {
            source_url: "https://a/in".into(),
            target_url: "https://a/out".into(),
            source_prefix: "x".into(),
            target_prefix: "y".into(),
            ..StorageConfig::default()
        };
        let layout = StorageLayout::from(&cfg);
        assert_eq!(layout.source_url, "https://a/in");
        assert_eq!(layout.target_prefix, "y");
    }
}
