//! Data models and structures
//!
//! Defines the persisted upload record, pipeline inputs and outcomes, and
//! the environment-driven configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

/// Where an image entered the pipeline.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    #[default]
    Finder,
    Clipboard,
    Form,
}

impl FromStr for Provenance {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "finder" => Ok(Provenance::Finder),
            "clipboard" => Ok(Provenance::Clipboard),
            "form" => Ok(Provenance::Form),
            other => Err(format!(
                "Unknown provenance '{}'. Expected finder, clipboard or form",
                other
            )),
        }
    }
}

/// Persisted metadata for one uploaded piece of content, keyed by its hash.
///
/// Every field other than `url` tolerates being absent so that records
/// written by older versions still load.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", from = "StoredImageRecord")]
pub struct ImageRecord {
    pub hash: String,
    pub source: String,
    pub from: Provenance,
    pub format: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_id: Option<String>,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    pub size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    pub created_at: i64,
}

/// Wire shape accepted when reading records, including the legacy `fileId`.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredImageRecord {
    #[serde(default)]
    hash: String,
    #[serde(default)]
    source: String,
    #[serde(default)]
    from: Provenance,
    #[serde(default)]
    format: String,
    #[serde(default)]
    remote_id: Option<String>,
    #[serde(default)]
    file_id: Option<String>,
    url: String,
    #[serde(default)]
    thumbnail_url: Option<String>,
    #[serde(default)]
    size: u64,
    #[serde(default)]
    width: Option<u32>,
    #[serde(default)]
    height: Option<u32>,
    #[serde(default)]
    created_at: i64,
}

impl From<StoredImageRecord> for ImageRecord {
    fn from(stored: StoredImageRecord) -> Self {
        Self {
            hash: stored.hash,
            source: stored.source,
            from: stored.from,
            format: stored.format,
            remote_id: stored.remote_id.or(stored.file_id),
            url: stored.url,
            thumbnail_url: stored.thumbnail_url,
            size: stored.size,
            width: stored.width,
            height: stored.height,
            created_at: stored.created_at,
        }
    }
}

/// A single image handed to the pipeline.
#[derive(Debug, Clone)]
pub enum ImageInput {
    /// A local file, read when its run starts.
    File { path: PathBuf, from: Provenance },
    /// Bytes already in memory, e.g. from a form or the clipboard.
    Bytes {
        source: String,
        data: Vec<u8>,
        from: Provenance,
    },
}

impl ImageInput {
    pub fn file(path: impl Into<PathBuf>, from: Provenance) -> Self {
        ImageInput::File {
            path: path.into(),
            from,
        }
    }

    pub fn bytes(source: impl Into<String>, data: Vec<u8>, from: Provenance) -> Self {
        ImageInput::Bytes {
            source: source.into(),
            data,
            from,
        }
    }

    /// Human readable origin, stored as the record's `source`.
    pub fn source(&self) -> String {
        match self {
            ImageInput::File { path, .. } => path.display().to_string(),
            ImageInput::Bytes { source, .. } => source.clone(),
        }
    }

    pub fn provenance(&self) -> Provenance {
        match self {
            ImageInput::File { from, .. } | ImageInput::Bytes { from, .. } => *from,
        }
    }
}

/// Result of one successful pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOutcome {
    /// True when the record was served from the local store without uploading.
    pub cache: bool,
    pub image: ImageRecord,
}

/// Terminal (or initial) state of a pipeline run, consumed by the caller's UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineState {
    Initial,
    NoInput,
    Canceled,
    Succeeded { cache: bool, image: ImageRecord },
    Failed { source: String, message: String },
}

impl From<UploadOutcome> for PipelineState {
    fn from(outcome: UploadOutcome) -> Self {
        PipelineState::Succeeded {
            cache: outcome.cache,
            image: outcome.image,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadProvider {
    ImageKit,
    S3,
}

impl FromStr for UploadProvider {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "imagekit" => Ok(UploadProvider::ImageKit),
            "s3" => Ok(UploadProvider::S3),
            other => Err(crate::Error::Config(format!(
                "Unknown UPLOAD_PROVIDER '{}'. Expected imagekit or s3",
                other
            ))),
        }
    }
}

// Configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub provider: UploadProvider,
    pub imagekit_public_key: Option<String>,
    pub imagekit_private_key: Option<String>,
    pub imagekit_upload_url: String,
    pub imagekit_api_url: String,
    pub cdn_access_key_id: Option<String>,
    pub cdn_secret_access_key: Option<String>,
    pub cdn_endpoint: String,
    pub cdn_bucket: String,
    pub cdn_base_url: String,
    pub cdn_prefix: String,
    pub store_path: PathBuf,
    pub upload_timeout_secs: u64,
    pub dry_run: bool,
}

impl Config {
    pub fn from_env() -> crate::Result<Self> {
        dotenvy::dotenv().ok();

        let provider = match std::env::var("UPLOAD_PROVIDER") {
            Ok(value) => value.parse()?,
            Err(_) => UploadProvider::ImageKit,
        };
        let dry_run = std::env::var("DRY_RUN")
            .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        let config = Self {
            provider,
            imagekit_public_key: std::env::var("IMAGEKIT_PUBLIC_KEY").ok(),
            imagekit_private_key: std::env::var("IMAGEKIT_PRIVATE_KEY").ok(),
            imagekit_upload_url: std::env::var("IMAGEKIT_UPLOAD_URL")
                .unwrap_or_else(|_| "https://upload.imagekit.io".to_string()),
            imagekit_api_url: std::env::var("IMAGEKIT_API_URL")
                .unwrap_or_else(|_| "https://api.imagekit.io".to_string()),
            cdn_access_key_id: std::env::var("CDN_ACCESS_KEY_ID").ok(),
            cdn_secret_access_key: std::env::var("CDN_SECRET_ACCESS_KEY").ok(),
            cdn_endpoint: std::env::var("CDN_ENDPOINT")
                .unwrap_or_else(|_| "https://nyc3.digitaloceanspaces.com".to_string()),
            cdn_bucket: std::env::var("CDN_BUCKET").unwrap_or_else(|_| "imagedrop".to_string()),
            cdn_base_url: std::env::var("CDN_BASE_URL")
                .unwrap_or_else(|_| "https://cdn.example.com".to_string()),
            cdn_prefix: std::env::var("CDN_PREFIX").unwrap_or_else(|_| "images".to_string()),
            store_path: std::env::var("IMAGEDROP_STORE")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(".imagedrop/records.json")),
            upload_timeout_secs: match std::env::var("UPLOAD_TIMEOUT_SECS") {
                Ok(v) => v.parse().map_err(|_| {
                    crate::Error::Config(format!("UPLOAD_TIMEOUT_SECS must be a number, got '{}'", v))
                })?,
                Err(_) => 60,
            },
            dry_run,
        };

        config.validate()?;
        Ok(config)
    }

    /// Checks that the credentials the selected provider needs are present.
    pub fn validate(&self) -> crate::Result<()> {
        if self.dry_run {
            return Ok(());
        }
        match self.provider {
            UploadProvider::ImageKit => {
                if self.imagekit_private_key.is_none() {
                    return Err(crate::Error::Config(
                        "IMAGEKIT_PRIVATE_KEY not set".to_string(),
                    ));
                }
            }
            UploadProvider::S3 => {
                if self.cdn_access_key_id.is_none() {
                    return Err(crate::Error::Config("CDN_ACCESS_KEY_ID not set".to_string()));
                }
                if self.cdn_secret_access_key.is_none() {
                    return Err(crate::Error::Config(
                        "CDN_SECRET_ACCESS_KEY not set".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> ImageRecord {
        ImageRecord {
            hash: "abc".to_string(),
            source: "/tmp/cat.png".to_string(),
            from: Provenance::Clipboard,
            format: "png".to_string(),
            remote_id: Some("file_1".to_string()),
            url: "https://ik.imagekit.io/demo/abc.png".to_string(),
            thumbnail_url: None,
            size: 42,
            width: Some(10),
            height: None,
            created_at: 1_700_000_000_000,
        }
    }

    #[test]
    fn test_record_uses_camel_case_field_names() {
        let json = serde_json::to_string(&sample_record()).unwrap();
        assert!(json.contains("\"remoteId\":\"file_1\""));
        assert!(json.contains("\"createdAt\":1700000000000"));
        assert!(json.contains("\"from\":\"clipboard\""));
        assert!(!json.contains("thumbnailUrl"));
        assert!(!json.contains("height"));
    }

    #[test]
    fn test_legacy_record_without_optional_fields() {
        let json = r#"{"source":"/a/b.jpg","format":"jpg","url":"https://x/y.jpg","size":7,"createdAt":5}"#;
        let record: ImageRecord = serde_json::from_str(json).unwrap();

        assert_eq!(record.hash, "");
        assert_eq!(record.from, Provenance::Finder);
        assert!(record.remote_id.is_none());
        assert!(record.width.is_none());
        assert_eq!(record.size, 7);
    }

    #[test]
    fn test_file_id_alias_maps_to_remote_id() {
        let json = r#"{"hash":"h","fileId":"legacy_1","url":"https://x/y.png"}"#;
        let record: ImageRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.remote_id.as_deref(), Some("legacy_1"));
    }

    #[test]
    fn test_remote_id_wins_over_legacy_file_id() {
        let json = r#"{"hash":"h","fileId":"old","remoteId":"new","url":"https://x/y.png"}"#;
        let record: ImageRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.remote_id.as_deref(), Some("new"));

        let written = serde_json::to_string(&record).unwrap();
        assert!(!written.contains("fileId"));
    }

    #[test]
    fn test_unknown_fields_are_ignored() {
        let json = r#"{"hash":"h","url":"https://x/y.png","someFutureField":true}"#;
        assert!(serde_json::from_str::<ImageRecord>(json).is_ok());
    }

    #[test]
    fn test_provenance_parsing() {
        assert_eq!("Clipboard".parse::<Provenance>().unwrap(), Provenance::Clipboard);
        assert!("desktop".parse::<Provenance>().is_err());
    }

    #[test]
    fn test_provider_parsing() {
        assert_eq!(
            "imagekit".parse::<UploadProvider>().unwrap(),
            UploadProvider::ImageKit
        );
        assert_eq!(" S3 ".parse::<UploadProvider>().unwrap(), UploadProvider::S3);
        assert!("gcs".parse::<UploadProvider>().is_err());
    }
}
