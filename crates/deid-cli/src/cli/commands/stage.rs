//! `deid stage` – upload local folders to the source container.

use std::path::Path;

use anyhow::{bail, Result};
use deid_core::config::DeidConfig;
use deid_core::job::{StorageLayout, WorkItem};
use deid_core::range::FolderRange;
use deid_core::storage::BlobStore;
use deid_core::transfer;

pub async fn run_stage(cfg: &DeidConfig, range: &str, local_root: &Path) -> Result<()> {
    let range: FolderRange = range.parse()?;
    range.ensure_within(cfg.dispatch.max_folders)?;
    if !local_root.is_dir() {
        bail!("{} is not a directory", local_root.display());
    }
    let store = BlobStore::from_env(&cfg.storage.source_url, &cfg.storage.sas_env)?;
    let layout = StorageLayout::from(&cfg.storage);
    let items: Vec<WorkItem> = range.items().map(|id| WorkItem::new(id, &layout)).collect();

    let report = transfer::stage_inputs(&store, local_root, &items).await;
    println!(
        "Staged {} file(s), {} byte(s) for folders {}.",
        report.files, report.bytes, range
    );
    if !report.empty.is_empty() {
        println!("No local files for folder(s): {:?}", report.empty);
    }
    for (id, err) in &report.failed {
        eprintln!("  folder {id}: {err}");
    }
    if !report.failed.is_empty() {
        bail!("{} folder(s) failed to stage", report.failed.len());
    }
    Ok(())
}
