//! `deid split` – cut a large CSV into chunks of about SIZE_MB each.

use std::path::PathBuf;

use anyhow::{Context, Result};
use deid_core::tabular::{self, SplitOptions};

pub struct SplitArgs {
    pub input: PathBuf,
    pub size_mb: f64,
    pub output_dir: Option<PathBuf>,
    pub no_header: bool,
    pub folders: Option<u64>,
}

impl SplitArgs {
    pub fn options(&self) -> Result<SplitOptions> {
        let mut opts = SplitOptions::with_target_mb(self.size_mb)?;
        opts.keep_header = !self.no_header;
        opts.out_dir = self.output_dir.clone();
        opts.folder_start = self.folders;
        Ok(opts)
    }
}

pub async fn run_split(args: SplitArgs) -> Result<()> {
    let opts = args.options()?;
    let input = args.input.clone();
    let chunks = tokio::task::spawn_blocking(move || tabular::split_csv(&input, &opts))
        .await
        .context("split task")??;

    for chunk in &chunks {
        println!(
            "  {} ({} row(s), {:.2} MB)",
            chunk.path.display(),
            chunk.rows,
            chunk.bytes as f64 / (1024.0 * 1024.0)
        );
    }
    let total: u64 = chunks.iter().map(|c| c.bytes).sum();
    println!(
        "Split {} into {} chunk(s), {:.2} MB total.",
        args.input.display(),
        chunks.len(),
        total as f64 / (1024.0 * 1024.0)
    );
    Ok(())
}
