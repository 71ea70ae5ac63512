use super::{UploadGateway, UploadedFile};
use crate::{Error, Result};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::{config::Region, types::ObjectCannedAcl, Client as S3Client};

/// S3-compatible backend. The object key doubles as the remote id.
pub struct S3Gateway {
    client: S3Client,
    bucket: String,
    base_url: String,
    prefix: String,
}

impl S3Gateway {
    pub async fn new(
        access_key_id: String,
        secret_access_key: String,
        endpoint: String,
        bucket: String,
        base_url: String,
        prefix: String,
    ) -> Result<Self> {
        let credentials = aws_sdk_s3::config::Credentials::new(
            access_key_id,
            secret_access_key,
            None,
            None,
            "imagedrop",
        );

        let config = aws_config::defaults(BehaviorVersion::latest())
            .credentials_provider(credentials)
            .region(Region::new("us-east-1")) // Spaces ignores the region
            .endpoint_url(endpoint)
            .load()
            .await;

        Ok(Self {
            client: S3Client::new(&config),
            bucket,
            base_url: base_url.trim_end_matches('/').to_string(),
            prefix: prefix.trim_matches('/').to_string(),
        })
    }

    fn object_key(&self, file_name: &str) -> String {
        object_key(&self.prefix, file_name)
    }

    fn get_public_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url, key)
    }
}

fn object_key(prefix: &str, file_name: &str) -> String {
    if prefix.is_empty() {
        file_name.to_string()
    } else {
        format!("{}/{}", prefix, file_name)
    }
}

fn content_type(file_name: &str) -> &'static str {
    match file_name.rsplit_once('.').map(|(_, ext)| ext) {
        Some("png") => "image/png",
        Some("jpg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        Some("avif") => "image/avif",
        Some("bmp") => "image/bmp",
        Some("tiff") => "image/tiff",
        Some("ico") => "image/x-icon",
        _ => "application/octet-stream",
    }
}

#[async_trait]
impl UploadGateway for S3Gateway {
    async fn upload(&self, data: &[u8], file_name: &str) -> Result<UploadedFile> {
        let key = self.object_key(file_name);
        let body = ByteStream::from(data.to_vec());

        // PUT replaces any object at `key`, which is what a content-derived name wants.
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(body)
            .content_type(content_type(file_name))
            .acl(ObjectCannedAcl::PublicRead)
            .send()
            .await
            .map_err(|e| Error::Upload(format!("Failed to upload {}: {}", key, e)))?;

        Ok(UploadedFile {
            url: self.get_public_url(&key),
            remote_id: key,
            thumbnail_url: None,
            size: Some(data.len() as u64),
            width: None,
            height: None,
        })
    }

    async fn delete(&self, remote_id: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(remote_id)
            .send()
            .await
            .map_err(|e| Error::Delete(format!("Failed to delete {}: {}", remote_id, e)))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_key_prefix() {
        assert_eq!(object_key("images", "abc.png"), "images/abc.png");
        assert_eq!(object_key("", "abc.png"), "abc.png");
    }

    #[test]
    fn test_content_type_from_name() {
        assert_eq!(content_type("abc.jpg"), "image/jpeg");
        assert_eq!(content_type("abc.svg"), "image/svg+xml");
        assert_eq!(content_type("abc"), "application/octet-stream");
    }
}
