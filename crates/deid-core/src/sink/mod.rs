//! Destinations for the event log and the tracking CSV.
//!
//! Both sinks share one contract: append text to a named log, writing the
//! header first when the log is new or empty.

mod blob;
mod file;

pub use blob::BlobSink;
pub use file::FileSink;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Sink selected in config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    /// Local or mounted network directory.
    #[default]
    File,
    /// Blob in the target container.
    Blob,
}

#[async_trait]
pub trait LogSink: Send + Sync {
    /// Appends `text` to the log `name`. `header` is written (followed by a
    /// newline) only if the log does not exist yet or is empty.
    async fn append(&self, name: &str, header: Option<&str>, text: &str) -> Result<()>;
}
