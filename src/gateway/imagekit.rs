use super::{UploadGateway, UploadedFile};
use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use std::time::Duration;

const DEFAULT_UPLOAD_URL: &str = "https://upload.imagekit.io";
const DEFAULT_API_URL: &str = "https://api.imagekit.io";

/// The only status ImageKit uses to confirm a delete.
const DELETE_SUCCESS: StatusCode = StatusCode::NO_CONTENT;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadResponse {
    file_id: String,
    #[serde(default)]
    url: String,
    thumbnail_url: Option<String>,
    size: Option<u64>,
    width: Option<u32>,
    height: Option<u32>,
}

pub struct ImageKitGateway {
    client: Client,
    private_key: String,
    upload_url: String,
    api_url: String,
}

impl ImageKitGateway {
    pub fn new(private_key: String, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::new_with_client(private_key, client))
    }

    pub fn new_with_client(private_key: String, client: Client) -> Self {
        Self {
            client,
            private_key,
            upload_url: DEFAULT_UPLOAD_URL.to_string(),
            api_url: DEFAULT_API_URL.to_string(),
        }
    }

    /// `{api_url}/v1/files/{remote_id}` with the id percent-encoded as one segment.
    fn file_url(&self, remote_id: &str) -> Result<Url> {
        let mut url = Url::parse(&self.api_url)
            .map_err(|e| Error::Config(format!("Invalid ImageKit API url {}: {}", self.api_url, e)))?;
        url.path_segments_mut()
            .map_err(|_| Error::Config(format!("ImageKit API url {} cannot have a path", self.api_url)))?
            .pop_if_empty()
            .extend(["v1", "files", remote_id]);
        Ok(url)
    }

    pub fn with_urls(mut self, upload_url: String, api_url: String) -> Self {
        self.upload_url = upload_url.trim_end_matches('/').to_string();
        self.api_url = api_url.trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl UploadGateway for ImageKitGateway {
    async fn upload(&self, data: &[u8], file_name: &str) -> Result<UploadedFile> {
        tracing::debug!("Uploading {} ({} bytes) to ImageKit", file_name, data.len());

        let form = Form::new()
            .part(
                "file",
                Part::bytes(data.to_vec()).file_name(file_name.to_string()),
            )
            .text("fileName", file_name.to_string())
            .text("useUniqueFileName", "false");

        let response = self
            .client
            .post(format!("{}/api/v1/files/upload", self.upload_url))
            .basic_auth(&self.private_key, Some(""))
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Failed to send upload request to ImageKit: {}", e);
                Error::Upload(format!("request to ImageKit failed: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!("ImageKit upload error (status {}): {}", status, error_text);
            return Err(Error::Upload(format!(
                "ImageKit rejected upload (status {}): {}",
                status, error_text
            )));
        }

        let body = response.text().await.map_err(|e| {
            tracing::error!("Failed to read ImageKit upload response: {}", e);
            Error::Upload(format!("reading ImageKit response failed: {}", e))
        })?;
        let parsed: UploadResponse = serde_json::from_str(&body).map_err(|e| {
            tracing::error!("Failed to parse ImageKit response: {}\nBody: {}", e, body);
            Error::Upload(format!("Failed to parse ImageKit response: {}", e))
        })?;

        if parsed.url.is_empty() || parsed.file_id.is_empty() {
            return Err(Error::Upload(
                "ImageKit response is missing url or fileId".to_string(),
            ));
        }

        Ok(UploadedFile {
            remote_id: parsed.file_id,
            url: parsed.url,
            thumbnail_url: parsed.thumbnail_url.filter(|u| !u.is_empty()),
            size: parsed.size,
            width: parsed.width,
            height: parsed.height,
        })
    }

    async fn delete(&self, remote_id: &str) -> Result<()> {
        let response = self
            .client
            .delete(self.file_url(remote_id)?)
            .basic_auth(&self.private_key, Some(""))
            .send()
            .await
            .map_err(|e| Error::Delete(format!("request to ImageKit failed: {}", e)))?;

        let status = response.status();
        if status != DELETE_SUCCESS {
            let error_text = response.text().await.unwrap_or_default();
            tracing::warn!(
                "ImageKit delete of {} not confirmed (status {}): {}",
                remote_id,
                status,
                error_text
            );
            return Err(Error::Delete(format!(
                "ImageKit returned status {} for {}",
                status, remote_id
            )));
        }

        tracing::debug!("Deleted {} from ImageKit", remote_id);
        Ok(())
    }
}
