//! Application wiring for the upload pipeline and history.

use crate::gateway::{ImageKitGateway, MockGateway, S3Gateway, UploadGateway};
use crate::history::History;
use crate::models::{Config, ImageInput, ImageRecord, PipelineState, UploadProvider};
use crate::store::{FileRecordStore, MemoryRecordStore, RecordStore};
use crate::uploader::Uploader;
use crate::{Error, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Owns the shared gateway and store and exposes the user-facing operations.
pub struct App {
    uploader: Uploader,
    history: History,
}

/// Injectable service bundle used to construct [`App`] in tests/harnesses.
pub struct AppServices {
    pub gateway: Arc<dyn UploadGateway>,
    pub store: Arc<dyn RecordStore>,
}

impl App {
    /// Build an app from concrete service dependencies.
    pub fn with_services(services: AppServices) -> Self {
        Self {
            uploader: Uploader::new(services.gateway.clone(), services.store.clone()),
            history: History::new(services.gateway, services.store),
        }
    }

    /// Construct an app from environment configuration (`Config::from_env`).
    pub async fn new() -> Result<Self> {
        let config = Config::from_env()?;
        Self::from_config(&config).await
    }

    pub async fn from_config(config: &Config) -> Result<Self> {
        let gateway = Self::build_gateway(config).await?;

        let store: Arc<dyn RecordStore> = if config.dry_run {
            Arc::new(MemoryRecordStore::new())
        } else {
            Arc::new(FileRecordStore::open(&config.store_path).await?)
        };

        Ok(Self::with_services(AppServices { gateway, store }))
    }

    async fn build_gateway(config: &Config) -> Result<Arc<dyn UploadGateway>> {
        if config.dry_run {
            info!("DRY_RUN enabled; uploads go to an in-memory mock");
            return Ok(Arc::new(MockGateway::new()));
        }

        match config.provider {
            UploadProvider::ImageKit => {
                info!("Upload provider: ImageKit");
                let private_key = config
                    .imagekit_private_key
                    .clone()
                    .ok_or_else(|| Error::Config("IMAGEKIT_PRIVATE_KEY not set".to_string()))?;
                let gateway = ImageKitGateway::new(
                    private_key,
                    Duration::from_secs(config.upload_timeout_secs),
                )?
                .with_urls(
                    config.imagekit_upload_url.clone(),
                    config.imagekit_api_url.clone(),
                );
                Ok(Arc::new(gateway))
            }
            UploadProvider::S3 => {
                info!("Upload provider: S3 ({})", config.cdn_endpoint);
                let gateway = S3Gateway::new(
                    config
                        .cdn_access_key_id
                        .clone()
                        .ok_or_else(|| Error::Config("CDN_ACCESS_KEY_ID not set".to_string()))?,
                    config.cdn_secret_access_key.clone().ok_or_else(|| {
                        Error::Config("CDN_SECRET_ACCESS_KEY not set".to_string())
                    })?,
                    config.cdn_endpoint.clone(),
                    config.cdn_bucket.clone(),
                    config.cdn_base_url.clone(),
                    config.cdn_prefix.clone(),
                )
                .await?;
                Ok(Arc::new(gateway))
            }
        }
    }

    pub fn uploader(&self) -> &Uploader {
        &self.uploader
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// Uploads every input, stopping early (best effort) on Ctrl-C.
    pub async fn upload(&self, inputs: Vec<ImageInput>) -> Vec<PipelineState> {
        self.uploader
            .run_until(inputs, async {
                if tokio::signal::ctrl_c().await.is_err() {
                    std::future::pending::<()>().await;
                }
            })
            .await
    }

    /// Deletes the record stored under `hash`, remote object first.
    pub async fn delete(&self, hash: &str) -> Result<ImageRecord> {
        let record = self
            .history
            .find(hash)
            .await?
            .ok_or_else(|| Error::NotFound(hash.to_string()))?;
        self.history.delete_image(&record).await?;
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::{App, AppServices};
    use crate::gateway::MockGateway;
    use crate::models::{ImageInput, PipelineState, Provenance};
    use crate::store::{FileRecordStore, RecordStore};
    use std::sync::Arc;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_upload_then_delete_through_app() {
        let dir = tempdir().unwrap();
        let image = dir.path().join("photo.gif");
        std::fs::write(&image, b"GIF89a\x01\x00\x01\x00\x00\x00\x00;").unwrap();

        let gateway = MockGateway::new().with_base_url("https://cdn.test".to_string());
        let store = Arc::new(
            FileRecordStore::open(dir.path().join("records.json"))
                .await
                .unwrap(),
        );
        let app = App::with_services(AppServices {
            gateway: Arc::new(gateway.clone()),
            store: store.clone(),
        });

        let states = app
            .upload(vec![ImageInput::file(&image, Provenance::Finder)])
            .await;
        let hash = match &states[0] {
            PipelineState::Succeeded { cache, image } => {
                assert!(!cache);
                assert_eq!(image.format, "gif");
                assert!(image.url.starts_with("https://cdn.test/"));
                image.hash.clone()
            }
            other => panic!("unexpected state: {:?}", other),
        };

        let deleted = app.delete(&hash).await.unwrap();
        assert_eq!(deleted.hash, hash);
        assert!(store.get(&hash).await.unwrap().is_none());
        assert!(gateway.get_files().is_empty());
    }

    #[tokio::test]
    async fn test_delete_unknown_hash_is_error() {
        let app = App::with_services(AppServices {
            gateway: Arc::new(MockGateway::new()),
            store: Arc::new(crate::store::MemoryRecordStore::new()),
        });
        assert!(matches!(
            app.delete("nope").await,
            Err(crate::Error::NotFound(_))
        ));
    }
}
