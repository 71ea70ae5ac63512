use super::RecordStore;
use crate::models::ImageRecord;
use crate::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Version of the on-disk layout. Files with a newer version are not read
/// or overwritten.
const STORE_VERSION: u32 = 1;

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreFile {
    version: u32,
    #[serde(default)]
    records: HashMap<String, serde_json::Value>,
}

/// JSON file backed store.
///
/// Entries stay as raw JSON in memory and are decoded on access, so a single
/// corrupt record only costs a re-upload of that content.
pub struct FileRecordStore {
    path: PathBuf,
    entries: RwLock<HashMap<String, serde_json::Value>>,
    read_only: bool,
}

impl FileRecordStore {
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let (entries, read_only) = match tokio::fs::read(&path).await {
            Ok(bytes) => Self::parse(&path, &bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No record store at {}, starting empty", path.display());
                (HashMap::new(), false)
            }
            Err(e) => return Err(e.into()),
        };

        info!(
            "Opened record store {} ({} entries)",
            path.display(),
            entries.len()
        );

        Ok(Self {
            path,
            entries: RwLock::new(entries),
            read_only,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn parse(path: &Path, bytes: &[u8]) -> (HashMap<String, serde_json::Value>, bool) {
        match serde_json::from_slice::<StoreFile>(bytes) {
            Ok(file) if file.version > STORE_VERSION => {
                warn!(
                    "Record store {} has version {} (supported: {}); ignoring it",
                    path.display(),
                    file.version,
                    STORE_VERSION
                );
                (HashMap::new(), true)
            }
            Ok(file) => (file.records, false),
            Err(e) => {
                warn!(
                    "Record store {} is unreadable ({}); starting empty",
                    path.display(),
                    e
                );
                (HashMap::new(), false)
            }
        }
    }

    fn decode(hash: &str, value: &serde_json::Value) -> Option<ImageRecord> {
        match serde_json::from_value::<ImageRecord>(value.clone()) {
            Ok(record) if record.url.is_empty() => {
                warn!("Cache record {} has no url; treating as a miss", hash);
                None
            }
            Ok(mut record) => {
                if record.hash.is_empty() {
                    record.hash = hash.to_string();
                }
                Some(record)
            }
            Err(e) => {
                warn!("Cache record {} is corrupt ({}); treating as a miss", hash, e);
                None
            }
        }
    }

    async fn persist(&self, entries: &HashMap<String, serde_json::Value>) -> Result<()> {
        if self.read_only {
            return Err(Error::Invariant(format!(
                "Refusing to overwrite record store {} written by a newer version",
                self.path.display()
            )));
        }

        let file = StoreFile {
            version: STORE_VERSION,
            records: entries.clone(),
        };
        let json = serde_json::to_vec_pretty(&file)?;
        let path = self.path.clone();

        tokio::task::spawn_blocking(move || write_atomically(&path, &json))
            .await
            .map_err(|e| Error::Invariant(format!("Record store write task join error: {}", e)))?
    }
}

fn write_atomically(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
    tmp.write_all(contents)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| Error::Io(e.error))?;
    Ok(())
}

#[async_trait]
impl RecordStore for FileRecordStore {
    async fn get(&self, hash: &str) -> Result<Option<ImageRecord>> {
        let entries = self.entries.read().await;
        Ok(entries.get(hash).and_then(|value| Self::decode(hash, value)))
    }

    async fn set(&self, hash: &str, record: &ImageRecord) -> Result<()> {
        let mut entries = self.entries.write().await;
        let previous = entries.insert(hash.to_string(), serde_json::to_value(record)?);
        if previous.is_some() {
            debug!("Overwriting existing record {}", hash);
        }

        if let Err(e) = self.persist(&entries).await {
            match previous {
                Some(value) => entries.insert(hash.to_string(), value),
                None => entries.remove(hash),
            };
            return Err(e);
        }
        Ok(())
    }

    async fn remove(&self, hash: &str) -> Result<()> {
        let mut entries = self.entries.write().await;
        let Some(previous) = entries.remove(hash) else {
            return Ok(());
        };

        if let Err(e) = self.persist(&entries).await {
            entries.insert(hash.to_string(), previous);
            return Err(e);
        }
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<ImageRecord>> {
        let entries = self.entries.read().await;
        Ok(entries
            .iter()
            .filter_map(|(hash, value)| Self::decode(hash, value))
            .collect())
    }

    async fn clear(&self) -> Result<()> {
        let mut entries = self.entries.write().await;
        let previous = std::mem::take(&mut *entries);

        if let Err(e) = self.persist(&entries).await {
            *entries = previous;
            return Err(e);
        }
        info!("Cleared record store {}", self.path.display());
        Ok(())
    }

    fn is_writable(&self) -> bool {
        !self.read_only
    }
}
