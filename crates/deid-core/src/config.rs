use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::dispatcher::DispatchMode;
use crate::sink::SinkKind;

/// Environment variable that overrides `service.endpoint` when set.
pub const ENDPOINT_ENV: &str = "DEID_ENDPOINT";

/// De-identification service connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Service base URL, e.g. `https://<name>.api.deid.azure.com`.
    pub endpoint: String,
    /// `api-version` query parameter sent with every request.
    pub api_version: String,
    /// Job operation: "Surrogate", "Redact" or "Tag".
    pub operation: String,
    /// Name of the environment variable holding the bearer token.
    pub token_env: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            api_version: "2024-11-15".to_string(),
            operation: "Surrogate".to_string(),
            token_env: "DEID_ACCESS_TOKEN".to_string(),
        }
    }
}

/// Where each folder's input lives and where its output goes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Container URL holding the input folders.
    pub source_url: String,
    /// Container URL receiving the de-identified output.
    pub target_url: String,
    /// Root prefix under the source container (folder `<id>` lives at `<prefix>/<id>/`).
    pub source_prefix: String,
    /// Root prefix under the target container.
    pub target_prefix: String,
    /// Name of the environment variable holding the storage SAS query string.
    pub sas_env: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            source_url: String::new(),
            target_url: String::new(),
            source_prefix: String::new(),
            target_prefix: String::new(),
            sas_env: "DEID_STORAGE_SAS".to_string(),
        }
    }
}

/// Dispatch policy defaults (CLI flags override per run).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    pub mode: DispatchMode,
    /// Maximum jobs in flight at once; clamped to [1, 10].
    pub concurrency: usize,
    pub poll_interval_secs: u64,
    /// Wall-clock budget per job, measured from submission.
    pub max_wait_secs: u64,
    /// Widest folder range accepted by one run.
    pub max_folders: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            mode: DispatchMode::PollToCompletion,
            concurrency: 5,
            poll_interval_secs: 30,
            max_wait_secs: 3600,
            max_folders: 1000,
        }
    }
}

impl DispatchConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn max_wait(&self) -> Duration {
        Duration::from_secs(self.max_wait_secs)
    }
}

/// Where the event log and the tracking CSV are written.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkConfig {
    pub kind: SinkKind,
    /// Directory for the file sink; None = XDG state dir.
    pub dir: Option<PathBuf>,
    /// Prefix inside the target container for the blob sink.
    pub blob_prefix: String,
    pub event_log_name: String,
    pub tracking_log_name: String,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            kind: SinkKind::File,
            dir: None,
            blob_prefix: "logs".to_string(),
            event_log_name: "deid_events.log".to_string(),
            tracking_log_name: "deid_tracking.csv".to_string(),
        }
    }
}

/// Global configuration loaded from `~/.config/deid/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DeidConfig {
    pub service: ServiceConfig,
    pub storage: StorageConfig,
    pub dispatch: DispatchConfig,
    pub sink: SinkConfig,
}

impl DeidConfig {
    /// Checks values that would otherwise fail once per item at dispatch time.
    pub fn validate(&self) -> Result<()> {
        if self.dispatch.poll_interval_secs == 0 {
            bail!("dispatch.poll_interval_secs must be greater than zero");
        }
        if self.dispatch.max_wait_secs == 0 {
            bail!("dispatch.max_wait_secs must be greater than zero");
        }
        if self.dispatch.max_folders == 0 {
            bail!("dispatch.max_folders must be greater than zero");
        }
        if self.service.endpoint.trim().is_empty() {
            bail!("service.endpoint is not set (config file or {})", ENDPOINT_ENV);
        }
        check_http_url("service.endpoint", &self.service.endpoint)?;
        check_http_url("storage.source_url", &self.storage.source_url)?;
        check_http_url("storage.target_url", &self.storage.target_url)?;
        Ok(())
    }

    /// Environment variables take precedence over file values.
    fn apply_env(&mut self) {
        if let Ok(endpoint) = std::env::var(ENDPOINT_ENV) {
            if !endpoint.trim().is_empty() {
                self.service.endpoint = endpoint.trim().to_string();
            }
        }
    }
}

fn check_http_url(field: &str, value: &str) -> Result<()> {
    let parsed = url::Url::parse(value).with_context(|| format!("{field} is not a valid URL"))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => bail!("{field} must be http(s), got scheme {other:?}"),
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("deid")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<DeidConfig> {
    let path = config_path()?;
    if !path.exists() {
        let mut default_cfg = DeidConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        default_cfg.apply_env();
        return Ok(default_cfg);
    }

    load_from_path(&path)
}

/// Load configuration from an explicit path (e.g. `--config`).
pub fn load_from_path(path: &Path) -> Result<DeidConfig> {
    let data =
        fs::read_to_string(path).with_context(|| format!("read config {}", path.display()))?;
    let mut cfg: DeidConfig =
        toml::from_str(&data).with_context(|| format!("parse config {}", path.display()))?;
    cfg.apply_env();
    Ok(cfg)
}
