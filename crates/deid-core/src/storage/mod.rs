//! Object storage seam: list, get, put, delete by object name.
//!
//! Names are `/`-separated relative paths (`notes/12/a.txt`). Two backends:
//! a directory tree ([`LocalStore`]) and an Azure Blob container over REST
//! ([`BlobStore`]).

mod blob;
mod local;

pub use blob::BlobStore;
pub use local::LocalStore;
pub(crate) use local::files_under;

use anyhow::Result;
use async_trait::async_trait;

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Names of all objects starting with `prefix`, sorted.
    async fn list(&self, prefix: &str) -> Result<Vec<String>>;

    /// Object bytes, or None if it does not exist.
    async fn get(&self, name: &str) -> Result<Option<Vec<u8>>>;

    /// Creates or replaces the object.
    async fn put(&self, name: &str, bytes: Vec<u8>) -> Result<()>;

    /// Deletes the object; deleting a missing object is not an error.
    async fn delete(&self, name: &str) -> Result<()>;
}
