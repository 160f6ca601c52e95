//! Tracing setup.
//!
//! deid keeps everything that outlives a run in one state directory
//! (`~/.local/state/deid` on Debian): the tracing log `deid.log` and, unless
//! `sink.dir` is set, the event log and the tracking CSV.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

/// Filter directives for deid; `RUST_LOG` is read only when this is unset.
pub const LOG_ENV: &str = "DEID_LOG";

const DEFAULT_FILTER: &str = "info,deid=debug,deid_core=debug";
const LOG_FILE: &str = "deid.log";

/// Where tracing output goes for this process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogDestination {
    File(PathBuf),
    Stderr,
}

pub fn state_dir() -> Result<PathBuf> {
    let dirs = xdg::BaseDirectories::with_prefix("deid")?;
    Ok(dirs.get_state_home())
}

/// Opens `<dir>/deid.log` for appending, creating `dir` first.
pub fn open_log_file(dir: &Path) -> Result<(File, PathBuf)> {
    fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    let path = dir.join(LOG_FILE);
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("open {}", path.display()))?;
    Ok((file, path))
}

fn filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

fn install<W>(writer: W)
where
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    // A subscriber may already be set (tests, embedding); keep that one.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter())
        .with_writer(writer)
        .with_ansi(false)
        .try_init();
}

/// Installs the global subscriber writing to `deid.log` in the state
/// directory. If the file cannot be opened, logs go to stderr instead and the
/// reason is logged there; the CLI keeps running either way.
pub fn init() -> LogDestination {
    match state_dir().and_then(|dir| open_log_file(&dir)) {
        Ok((file, path)) => {
            install(Mutex::new(file));
            tracing::info!(path = %path.display(), "deid logging initialized");
            LogDestination::File(path)
        }
        Err(e) => {
            install(std::io::stderr);
            tracing::warn!("file logging unavailable, using stderr: {:#}", e);
            LogDestination::Stderr
        }
    }
}
