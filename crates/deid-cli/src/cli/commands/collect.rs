//! `deid collect` – download de-identified results for a folder range.

use std::path::Path;

use anyhow::{bail, Result};
use deid_core::config::DeidConfig;
use deid_core::job::{StorageLayout, WorkItem};
use deid_core::range::FolderRange;
use deid_core::recorder::{LogNames, OutcomeRecorder};
use deid_core::run::RunContext;
use deid_core::transfer;

pub async fn run_collect(cfg: &DeidConfig, range: &str, out_dir: &Path, delete: bool) -> Result<()> {
    let range: FolderRange = range.parse()?;
    range.ensure_within(cfg.dispatch.max_folders)?;
    let ctx = RunContext::from_config(cfg)?;
    let layout = StorageLayout::from(&cfg.storage);
    let items: Vec<WorkItem> = range.items().map(|id| WorkItem::new(id, &layout)).collect();

    let recorder = OutcomeRecorder::new();
    let report =
        transfer::collect_results(ctx.target_store.as_ref(), &items, out_dir, delete, &recorder)
            .await;
    recorder.note(format!(
        "collect {} finished: {} file(s), {} failed folder(s)",
        range,
        report.files,
        report.failed.len()
    ));
    let names = LogNames {
        event_log: cfg.sink.event_log_name.clone(),
        tracking_log: cfg.sink.tracking_log_name.clone(),
    };
    recorder.flush(ctx.sink.as_ref(), &names).await?;

    println!(
        "Collected {} file(s), {} byte(s) into {}.",
        report.files,
        report.bytes,
        out_dir.display()
    );
    if !report.empty.is_empty() {
        println!("No results for folder(s): {:?}", report.empty);
    }
    for (id, err) in &report.failed {
        eprintln!("  folder {id}: {err}");
    }
    if !report.failed.is_empty() {
        bail!("{} folder(s) failed to collect", report.failed.len());
    }
    Ok(())
}
