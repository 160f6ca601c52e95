//! Logs kept as objects in an object store.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::storage::ObjectStore;

use super::LogSink;

/// Appends by read-modify-upload of `<prefix>/<name>`.
///
/// Appends through one sink are serialized so two flushes cannot lose each
/// other's text.
pub struct BlobSink {
    store: Arc<dyn ObjectStore>,
    prefix: String,
    write_lock: Mutex<()>,
}

impl BlobSink {
    pub fn new(store: Arc<dyn ObjectStore>, prefix: &str) -> Self {
        Self {
            store,
            prefix: prefix.trim_matches('/').to_string(),
            write_lock: Mutex::new(()),
        }
    }

    fn object_name(&self, name: &str) -> String {
        if self.prefix.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", self.prefix, name)
        }
    }
}

#[async_trait]
impl LogSink for BlobSink {
    async fn append(&self, name: &str, header: Option<&str>, text: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let object = self.object_name(name);
        let mut content = self.store.get(&object).await?.unwrap_or_default();
        if content.is_empty() {
            if let Some(h) = header {
                content.extend_from_slice(h.as_bytes());
                content.push(b'\n');
            }
        }
        content.extend_from_slice(text.as_bytes());
        self.store.put(&object, content).await?;
        tracing::debug!(object = %object, "log blob updated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::LocalStore;

    #[tokio::test]
    async fn appends_under_prefix() {
        let tmp = tempfile::tempdir().unwrap();
        let store: Arc<dyn ObjectStore> = Arc::new(LocalStore::new(tmp.path()));
        let sink = BlobSink::new(Arc::clone(&store), "/logs/");
        sink.append("t.csv", Some("h1,h2"), "a,b\n").await.unwrap();
        sink.append("t.csv", Some("h1,h2"), "c,d\n").await.unwrap();
        let bytes = store.get("logs/t.csv").await.unwrap().unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), "h1,h2\na,b\nc,d\n");
    }

    #[tokio::test]
    async fn empty_prefix_uses_bare_name() {
        let tmp = tempfile::tempdir().unwrap();
        let store: Arc<dyn ObjectStore> = Arc::new(LocalStore::new(tmp.path()));
        let sink = BlobSink::new(Arc::clone(&store), "");
        sink.append("events.log", None, "x\n").await.unwrap();
        assert!(store.get("events.log").await.unwrap().is_some());
    }
}
