//! Upload history and deletion.

use crate::gateway::UploadGateway;
use crate::models::ImageRecord;
use crate::store::RecordStore;
use crate::{Error, Result};
use std::sync::Arc;
use tracing::{info, warn};

pub struct History {
    gateway: Arc<dyn UploadGateway>,
    store: Arc<dyn RecordStore>,
}

impl History {
    pub fn new(gateway: Arc<dyn UploadGateway>, store: Arc<dyn RecordStore>) -> Self {
        Self { gateway, store }
    }

    /// All records, newest first.
    pub async fn list(&self) -> Result<Vec<ImageRecord>> {
        let mut records = self.store.list_all().await?;
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }

    pub async fn find(&self, hash: &str) -> Result<Option<ImageRecord>> {
        self.store.get(hash).await
    }

    /// Deletes the remote object, then the local record.
    ///
    /// The local record is only removed after the remote side confirmed the
    /// delete. On any failure it stays in place and the error is returned.
    pub async fn delete_image(&self, record: &ImageRecord) -> Result<()> {
        let remote_id = record
            .remote_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| Error::MissingRemoteId(record.hash.clone()))?;

        if let Err(e) = self.gateway.delete(remote_id).await {
            warn!("Keeping local record {}: {}", record.hash, e);
            return Err(e);
        }

        // A crash here leaves a stale record pointing at a deleted object.
        self.store.remove(&record.hash).await?;
        info!("Deleted {} ({})", record.hash, record.url);
        Ok(())
    }

    /// Forgets every local record without touching the remote store.
    pub async fn clear_local(&self) -> Result<()> {
        self.store.clear().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::MockGateway;
    use crate::models::Provenance;
    use crate::store::MemoryRecordStore;
    use pretty_assertions::assert_eq;

    fn record(hash: &str, created_at: i64) -> ImageRecord {
        ImageRecord {
            hash: hash.to_string(),
            source: format!("/tmp/{}.png", hash),
            from: Provenance::Finder,
            format: "png".to_string(),
            remote_id: Some(format!("mock_{}.png", hash)),
            url: format!("https://mock-cdn.example.com/{}.png", hash),
            thumbnail_url: None,
            size: 10,
            width: None,
            height: None,
            created_at,
        }
    }

    #[tokio::test]
    async fn test_list_is_newest_first() {
        let store = MemoryRecordStore::new()
            .with_record(record("a", 100))
            .with_record(record("b", 300))
            .with_record(record("c", 200));
        let history = History::new(Arc::new(MockGateway::new()), Arc::new(store));

        let order: Vec<i64> = history
            .list()
            .await
            .unwrap()
            .iter()
            .map(|r| r.created_at)
            .collect();

        assert_eq!(order, vec![300, 200, 100]);
    }

    #[tokio::test]
    async fn test_delete_success_removes_record() {
        let gateway = MockGateway::new();
        gateway.upload(b"x", "a.png").await.unwrap();
        let store = MemoryRecordStore::new().with_record(record("a", 1));
        let history = History::new(Arc::new(gateway.clone()), Arc::new(store.clone()));

        history.delete_image(&record("a", 1)).await.unwrap();

        assert!(store.get("a").await.unwrap().is_none());
        assert_eq!(gateway.get_delete_count(), 1);
    }

    #[tokio::test]
    async fn test_delete_failure_keeps_record_unchanged() {
        let gateway = MockGateway::new().with_delete_failure(true);
        let store = MemoryRecordStore::new().with_record(record("a", 1));
        let history = History::new(Arc::new(gateway), Arc::new(store.clone()));

        let err = history.delete_image(&record("a", 1)).await.unwrap_err();

        assert!(err.is_delete_failure());
        assert_eq!(store.get("a").await.unwrap(), Some(record("a", 1)));
    }

    #[tokio::test]
    async fn test_delete_without_remote_id_is_refused() {
        let gateway = MockGateway::new();
        let mut legacy = record("old", 1);
        legacy.remote_id = None;
        let store = MemoryRecordStore::new().with_record(legacy.clone());
        let history = History::new(Arc::new(gateway.clone()), Arc::new(store.clone()));

        let err = history.delete_image(&legacy).await.unwrap_err();

        assert!(matches!(err, Error::MissingRemoteId(_)));
        assert_eq!(gateway.get_delete_count(), 0);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_clear_local_leaves_remote_alone() {
        let gateway = MockGateway::new();
        let store = MemoryRecordStore::new()
            .with_record(record("a", 1))
            .with_record(record("b", 2));
        let history = History::new(Arc::new(gateway.clone()), Arc::new(store.clone()));

        history.clear_local().await.unwrap();

        assert!(store.is_empty());
        assert_eq!(gateway.get_delete_count(), 0);
    }
}
