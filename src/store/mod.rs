//! Local record store keyed by content hash
//!
//! Persists the upload metadata for each unique piece of content so repeated
//! uploads of identical bytes are answered locally.

pub mod file;
pub mod memory;

pub use file::FileRecordStore;
pub use memory::MemoryRecordStore;

use crate::models::ImageRecord;
use crate::Result;
use async_trait::async_trait;

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Returns the record for `hash`. Undecodable entries read as absent.
    async fn get(&self, hash: &str) -> Result<Option<ImageRecord>>;
    /// Inserts or overwrites the record for `hash`.
    async fn set(&self, hash: &str, record: &ImageRecord) -> Result<()>;
    async fn remove(&self, hash: &str) -> Result<()>;
    /// Unordered snapshot of every decodable record.
    async fn list_all(&self) -> Result<Vec<ImageRecord>>;
    async fn clear(&self) -> Result<()>;

    /// False when `set` is known to fail, e.g. a store written by a newer version.
    fn is_writable(&self) -> bool {
        true
    }
}
