//! `deid merge` – merge collected CSVs into pattern-matched and other files.

use anyhow::{Context, Result};
use deid_core::tabular::{self, MergeOptions, MergedFile};

fn print_output(label: &str, merged: Option<&MergedFile>) {
    match merged {
        Some(m) => println!(
            "{label}: {} ({} file(s), {} row(s); columns: {})",
            m.path.display(),
            m.files,
            m.rows,
            m.columns.join(", ")
        ),
        None => println!("{label}: no files"),
    }
}

pub async fn run_merge(opts: MergeOptions) -> Result<()> {
    let pattern = opts.pattern.clone();
    let report = tokio::task::spawn_blocking(move || tabular::merge_csv(&opts))
        .await
        .context("merge task")??;

    for folder in &report.missing {
        eprintln!("  subfolder not found: {folder}");
    }
    for (path, err) in &report.skipped {
        eprintln!("  skipped {}: {err}", path.display());
    }
    print_output(&format!("Matching {pattern:?}"), report.matched.as_ref());
    print_output("Other", report.other.as_ref());
    Ok(())
}
