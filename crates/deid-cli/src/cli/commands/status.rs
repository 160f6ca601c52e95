//! `deid status` – query one job.

use anyhow::{bail, Result};
use deid_core::config::DeidConfig;
use deid_core::job::JobHandle;
use deid_core::service::{DeidClient, JobService};

pub async fn run_status(cfg: &DeidConfig, handle: &str) -> Result<()> {
    if cfg.service.endpoint.trim().is_empty() {
        bail!("service.endpoint is not set");
    }
    let client = DeidClient::from_config(&cfg.service);
    let handle = JobHandle::from_raw(handle.trim());
    let report = client.query_status(&handle).await?;
    println!(
        "{:<36} {:<10} {}",
        handle,
        report.status,
        report.detail.as_deref().unwrap_or("")
    );
    Ok(())
}
