//! `deid run` – dispatch one job per folder and wait for the outcomes.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use deid_core::config::DeidConfig;
use deid_core::dispatcher::DispatchMode;
use deid_core::job::OutcomeRecord;
use deid_core::run::{run_range, RunRequest};

/// Parsed `run` arguments.
#[derive(Debug, Clone)]
pub struct RunArgs {
    pub range: String,
    pub jobs: Option<usize>,
    pub mode: Option<DispatchMode>,
    pub poll_interval: Option<u64>,
    pub max_wait: Option<u64>,
    pub collect: Option<PathBuf>,
    pub json: bool,
}

impl RunArgs {
    pub fn into_request(self) -> RunRequest {
        RunRequest {
            range: self.range,
            mode: self.mode,
            concurrency: self.jobs,
            poll_interval: self.poll_interval.map(Duration::from_secs),
            max_wait: self.max_wait.map(Duration::from_secs),
            collect_to: self.collect,
        }
    }
}

fn outcome_line(r: &OutcomeRecord) -> String {
    let secs = r.duration_ms() as f64 / 1000.0;
    let mut line = format!(
        "  folder {:<6} {:<36} {:<16} {:>8.1}s",
        r.item_id,
        r.handle_str(),
        r.state.as_str(),
        secs
    );
    if let Some(err) = &r.error {
        line.push_str("  ");
        line.push_str(err);
    }
    line
}

pub async fn run_range_command(cfg: &DeidConfig, args: RunArgs) -> Result<()> {
    let json = args.json;
    let (tx, mut rx) = tokio::sync::mpsc::channel::<OutcomeRecord>(16);
    let printer = tokio::spawn(async move {
        while let Some(record) = rx.recv().await {
            if !json {
                println!("{}", outcome_line(&record));
            }
        }
    });

    let result = run_range(cfg, args.into_request(), Some(tx)).await;
    let _ = printer.await;
    let report = result?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report.records)?);
        return Ok(());
    }
    println!("Run {}: {}", report.range, report.summary);
    println!("Most jobs in flight at once: {}", report.peak_in_flight);
    if let Some(collected) = &report.collected {
        println!(
            "Collected {} file(s), {} byte(s); {} folder(s) failed to collect.",
            collected.files,
            collected.bytes,
            collected.failed.len()
        );
    }
    Ok(())
}
