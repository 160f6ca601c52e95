//! Append-only log files in a directory.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use super::LogSink;

/// Writes each log as `<dir>/<name>`, opened in append mode per call.
#[derive(Debug, Clone)]
pub struct FileSink {
    dir: PathBuf,
}

impl FileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl LogSink for FileSink {
    async fn append(&self, name: &str, header: Option<&str>, text: &str) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("create log dir {}", self.dir.display()))?;
        let path = self.dir.join(name);

        let mut f = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .with_context(|| format!("open {}", path.display()))?;

        // Single write per call: O_APPEND keeps concurrent writers from splitting it.
        let mut buf = String::with_capacity(text.len() + 64);
        if let Some(h) = header {
            let len = f.metadata().await.map(|m| m.len()).unwrap_or(0);
            if len == 0 {
                buf.push_str(h);
                buf.push('\n');
            }
        }
        buf.push_str(text);
        f.write_all(buf.as_bytes())
            .await
            .with_context(|| format!("append {}", path.display()))?;
        f.flush().await?;
        Ok(())
    }
}
