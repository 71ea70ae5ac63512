//! Remote upload/delete integration
//!
//! Wraps the CDN-backed object store behind one trait so the pipeline never
//! depends on a particular provider. ImageKit is the primary backend; any
//! S3-compatible bucket (DigitalOcean Spaces, MinIO) works as well.

pub mod imagekit;
pub mod mock;
pub mod s3;

pub use imagekit::ImageKitGateway;
pub use mock::MockGateway;
pub use s3::S3Gateway;

use crate::Result;
use async_trait::async_trait;

/// What the remote store reports back for a completed upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub remote_id: String,
    pub url: String,
    pub thumbnail_url: Option<String>,
    pub size: Option<u64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

#[async_trait]
pub trait UploadGateway: Send + Sync {
    /// Uploads `data` under exactly `file_name`, never a uniquified variant.
    ///
    /// Failures surface as [`crate::Error::Upload`] (or the transport error)
    /// and are never retried here.
    async fn upload(&self, data: &[u8], file_name: &str) -> Result<UploadedFile>;

    /// Deletes the object. `Ok` only when the service explicitly confirmed it.
    async fn delete(&self, remote_id: &str) -> Result<()>;
}
