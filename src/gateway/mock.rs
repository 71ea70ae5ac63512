use super::{UploadGateway, UploadedFile};
use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Clone)]
pub struct MockGateway {
    files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    base_url: String,
    upload_count: Arc<Mutex<usize>>,
    delete_count: Arc<Mutex<usize>>,
    fail_uploads: Arc<Mutex<bool>>,
    fail_deletes: Arc<Mutex<bool>>,
    report_metadata: bool,
    upload_delay: Option<Duration>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self {
            files: Arc::new(Mutex::new(HashMap::new())),
            base_url: "https://mock-cdn.example.com".to_string(),
            upload_count: Arc::new(Mutex::new(0)),
            delete_count: Arc::new(Mutex::new(0)),
            fail_uploads: Arc::new(Mutex::new(false)),
            fail_deletes: Arc::new(Mutex::new(false)),
            report_metadata: true,
            upload_delay: None,
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    pub fn with_upload_failure(self, should_fail: bool) -> Self {
        self.set_upload_failure(should_fail);
        self
    }

    pub fn with_delete_failure(self, should_fail: bool) -> Self {
        self.set_delete_failure(should_fail);
        self
    }

    /// Responds with only `fileId` and `url`, like a sparse provider payload.
    pub fn without_metadata(mut self) -> Self {
        self.report_metadata = false;
        self
    }

    pub fn with_upload_delay(mut self, delay: Duration) -> Self {
        self.upload_delay = Some(delay);
        self
    }

    pub fn set_upload_failure(&self, should_fail: bool) {
        *self.fail_uploads.lock().unwrap() = should_fail;
    }

    pub fn set_delete_failure(&self, should_fail: bool) {
        *self.fail_deletes.lock().unwrap() = should_fail;
    }

    pub fn get_upload_count(&self) -> usize {
        *self.upload_count.lock().unwrap()
    }

    pub fn get_delete_count(&self) -> usize {
        *self.delete_count.lock().unwrap()
    }

    pub fn get_files(&self) -> HashMap<String, Vec<u8>> {
        self.files.lock().unwrap().clone()
    }
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UploadGateway for MockGateway {
    async fn upload(&self, data: &[u8], file_name: &str) -> Result<UploadedFile> {
        *self.upload_count.lock().unwrap() += 1;

        if let Some(delay) = self.upload_delay {
            tokio::time::sleep(delay).await;
        }

        if *self.fail_uploads.lock().unwrap() {
            return Err(Error::Upload("Mock upload failure".to_string()));
        }

        self.files
            .lock()
            .unwrap()
            .insert(file_name.to_string(), data.to_vec());

        let url = format!("{}/{}", self.base_url, file_name);
        Ok(UploadedFile {
            remote_id: format!("mock_{}", file_name),
            thumbnail_url: self
                .report_metadata
                .then(|| format!("{}/tr:n-thumb/{}", self.base_url, file_name)),
            size: self.report_metadata.then_some(data.len() as u64),
            width: None,
            height: None,
            url,
        })
    }

    async fn delete(&self, remote_id: &str) -> Result<()> {
        *self.delete_count.lock().unwrap() += 1;

        if *self.fail_deletes.lock().unwrap() {
            return Err(Error::Delete(format!("Mock delete failure for {}", remote_id)));
        }

        let file_name = remote_id.strip_prefix("mock_").unwrap_or(remote_id);
        match self.files.lock().unwrap().remove(file_name) {
            Some(_) => Ok(()),
            None => Err(Error::Delete(format!("File not found: {}", remote_id))),
        }
    }
}
