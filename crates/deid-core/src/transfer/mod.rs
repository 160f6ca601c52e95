//! Moving folder contents between a local tree and object storage.
//!
//! `stage_inputs` uploads `<local_root>/<id>/**` to each item's source prefix
//! before dispatch. `collect_results` downloads each item's target prefix to
//! `<out_dir>/<id>/` afterwards, noting a SHA-256 per file in the event log.
//! A failing item does not stop the others; failures are reported per item.

mod sanitize;

pub use sanitize::{local_relative_path, sanitize_component};

use std::path::Path;

use anyhow::{Context, Result};

use crate::checksum;
use crate::job::{JobState, OutcomeRecord, WorkItem};
use crate::recorder::OutcomeRecorder;
use crate::storage::{self, ObjectStore};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferReport {
    pub files: usize,
    pub bytes: u64,
    /// Items that had nothing to transfer.
    pub empty: Vec<u64>,
    /// Items that failed part way, with the error.
    pub failed: Vec<(u64, String)>,
}

impl TransferReport {
    fn absorb(&mut self, id: u64, result: Result<(usize, u64)>) {
        match result {
            Ok((0, _)) => self.empty.push(id),
            Ok((files, bytes)) => {
                self.files += files;
                self.bytes += bytes;
            }
            Err(e) => self.failed.push((id, format!("{e:#}"))),
        }
    }
}

async fn stage_item(store: &dyn ObjectStore, local_root: &Path, item: &WorkItem) -> Result<(usize, u64)> {
    let dir = local_root.join(item.id.to_string());
    let scan_dir = dir.clone();
    let files = tokio::task::spawn_blocking(move || storage::files_under(&scan_dir))
        .await
        .context("scan task")??;

    let mut bytes = 0u64;
    for (path, rel) in &files {
        let data = tokio::fs::read(path)
            .await
            .with_context(|| format!("read {}", path.display()))?;
        bytes += data.len() as u64;
        let name = format!("{}{}", item.source.prefix, rel);
        store
            .put(&name, data)
            .await
            .with_context(|| format!("upload {name}"))?;
        tracing::debug!(item = item.id, object = %name, "staged");
    }
    Ok((files.len(), bytes))
}

/// Uploads each item's local folder to its source prefix.
pub async fn stage_inputs(
    store: &dyn ObjectStore,
    local_root: &Path,
    items: &[WorkItem],
) -> TransferReport {
    let mut report = TransferReport::default();
    for item in items {
        let result = stage_item(store, local_root, item).await;
        match &result {
            Ok((0, _)) => tracing::warn!(item = item.id, "no local files to stage"),
            Ok((files, _)) => tracing::info!(item = item.id, files, "staged folder"),
            Err(e) => tracing::error!(item = item.id, "staging failed: {:#}", e),
        }
        report.absorb(item.id, result);
    }
    report
}

async fn collect_item(
    store: &dyn ObjectStore,
    item: &WorkItem,
    out_dir: &Path,
    delete_after: bool,
    recorder: &OutcomeRecorder,
) -> Result<(usize, u64)> {
    let names = store
        .list(&item.target.prefix)
        .await
        .with_context(|| format!("list {}", item.target))?;

    let item_dir = out_dir.join(item.id.to_string());
    let mut files = 0usize;
    let mut bytes = 0u64;
    for name in names {
        let rel = name.strip_prefix(&item.target.prefix).unwrap_or(&name);
        let Some(rel_path) = local_relative_path(rel) else {
            tracing::warn!(object = %name, "skipping object with no usable name");
            continue;
        };
        let Some(data) = store
            .get(&name)
            .await
            .with_context(|| format!("download {name}"))?
        else {
            // Listed but gone: removed between list and get.
            continue;
        };

        let dest = item_dir.join(&rel_path);
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("create {}", parent.display()))?;
        }
        bytes += data.len() as u64;
        tokio::fs::write(&dest, data)
            .await
            .with_context(|| format!("write {}", dest.display()))?;
        let digest = checksum::sha256_file(&dest).await?;
        recorder.note(format!(
            "folder {} collected {} sha256 {}",
            item.id,
            rel_path.display(),
            digest
        ));
        files += 1;

        if delete_after {
            store
                .delete(&name)
                .await
                .with_context(|| format!("delete {name}"))?;
        }
    }
    Ok((files, bytes))
}

/// Downloads each item's target prefix to `<out_dir>/<id>/`.
pub async fn collect_results(
    store: &dyn ObjectStore,
    items: &[WorkItem],
    out_dir: &Path,
    delete_after: bool,
    recorder: &OutcomeRecorder,
) -> TransferReport {
    let mut report = TransferReport::default();
    for item in items {
        let result = collect_item(store, item, out_dir, delete_after, recorder).await;
        match &result {
            Ok((0, _)) => tracing::warn!(item = item.id, "no results to collect"),
            Ok((files, _)) => tracing::info!(item = item.id, files, "collected folder"),
            Err(e) => {
                tracing::error!(item = item.id, "collect failed: {:#}", e);
                recorder.note(format!("folder {} collect failed: {:#}", item.id, e));
            }
        }
        report.absorb(item.id, result);
    }
    report
}

/// Work items of the records that succeeded.
pub fn succeeded_items(records: &[OutcomeRecord]) -> Vec<WorkItem> {
    records
        .iter()
        .filter(|r| r.state == JobState::Succeeded)
        .map(|r| WorkItem {
            id: r.item_id,
            source: r.source.clone(),
            target: r.target.clone(),
        })
        .collect()
}
