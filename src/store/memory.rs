use super::RecordStore;
use crate::models::ImageRecord;
use crate::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Process-local store, used for dry runs and tests.
#[derive(Clone, Default)]
pub struct MemoryRecordStore {
    records: Arc<RwLock<HashMap<String, ImageRecord>>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_record(self, record: ImageRecord) -> Self {
        self.records
            .write()
            .unwrap()
            .insert(record.hash.clone(), record);
        self
    }

    pub fn len(&self) -> usize {
        self.records.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn get(&self, hash: &str) -> Result<Option<ImageRecord>> {
        Ok(self.records.read().unwrap().get(hash).cloned())
    }

    async fn set(&self, hash: &str, record: &ImageRecord) -> Result<()> {
        self.records
            .write()
            .unwrap()
            .insert(hash.to_string(), record.clone());
        Ok(())
    }

    async fn remove(&self, hash: &str) -> Result<()> {
        self.records.write().unwrap().remove(hash);
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<ImageRecord>> {
        Ok(self.records.read().unwrap().values().cloned().collect())
    }

    async fn clear(&self) -> Result<()> {
        self.records.write().unwrap().clear();
        Ok(())
    }
}
