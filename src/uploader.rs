//! Content-addressed upload pipeline.
//!
//! Each image goes hash -> cache lookup -> (hit) or (upload -> persist). The
//! remote store only ever sees a given content hash once as long as its
//! record survives locally.

use crate::gateway::UploadGateway;
use crate::hasher::{self, ContentDigest};
use crate::models::{ImageInput, ImageRecord, PipelineState, Provenance, UploadOutcome};
use crate::store::RecordStore;
use crate::{Error, Result};
use chrono::Utc;
use futures::future::join_all;
use std::borrow::Cow;
use std::collections::HashMap;
use std::future::Future;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, error, info, warn};

type InFlight = Arc<Mutex<HashMap<String, InFlightEntry>>>;

/// Per-hash lock plus the number of runs holding or waiting on it.
struct InFlightEntry {
    lock: Arc<AsyncMutex<()>>,
    holders: usize,
}

/// Runs the upload pipeline against an injected gateway and record store.
///
/// Cheap to clone; clones share the same gateway, store and per-hash locks.
#[derive(Clone)]
pub struct Uploader {
    gateway: Arc<dyn UploadGateway>,
    store: Arc<dyn RecordStore>,
    in_flight: InFlight,
}

/// Registration for one pipeline run on a hash. Created before waiting on
/// the lock, so a run dropped mid-wait still releases its map entry.
struct HashLease {
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
    in_flight: InFlight,
}

impl Drop for HashLease {
    fn drop(&mut self) {
        self.guard.take();
        let mut map = self
            .in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(entry) = map.get_mut(&self.key) {
            entry.holders -= 1;
            if entry.holders == 0 {
                map.remove(&self.key);
            }
        }
    }
}

impl Uploader {
    pub fn new(gateway: Arc<dyn UploadGateway>, store: Arc<dyn RecordStore>) -> Self {
        Self {
            gateway,
            store,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Runs every input concurrently. A failed run never aborts its siblings.
    ///
    /// An empty selection yields a single [`PipelineState::NoInput`].
    pub async fn run(&self, inputs: Vec<ImageInput>) -> Vec<PipelineState> {
        if inputs.is_empty() {
            info!("No images selected");
            return vec![PipelineState::NoInput];
        }

        info!("Processing {} image(s)", inputs.len());
        let runs = inputs.iter().map(|input| async move {
            match self.upload(input).await {
                Ok(outcome) => outcome.into(),
                Err(e) => {
                    error!("[{}] Pipeline failed: {}", input.source(), e);
                    PipelineState::Failed {
                        source: input.source(),
                        message: e.to_string(),
                    }
                }
            }
        });

        join_all(runs).await
    }

    /// Like [`Uploader::run`], but gives up waiting once `cancel` resolves.
    ///
    /// Cancellation is best effort: uploads already issued keep running in
    /// the background and still persist their records. Only the caller stops
    /// hearing about them.
    pub async fn run_until<F>(&self, inputs: Vec<ImageInput>, cancel: F) -> Vec<PipelineState>
    where
        F: Future<Output = ()>,
    {
        let uploader = self.clone();
        let mut handle = tokio::spawn(async move { uploader.run(inputs).await });

        tokio::select! {
            joined = &mut handle => match joined {
                Ok(states) => states,
                Err(e) => {
                    error!("Upload batch task failed: {}", e);
                    vec![PipelineState::Failed {
                        source: "batch".to_string(),
                        message: e.to_string(),
                    }]
                }
            },
            _ = cancel => {
                warn!("Upload batch canceled; in-flight uploads continue in the background");
                vec![PipelineState::Canceled]
            }
        }
    }

    /// Runs the pipeline for one image.
    pub async fn upload(&self, input: &ImageInput) -> Result<UploadOutcome> {
        let (data, path): (Cow<'_, [u8]>, &Path) = match input {
            ImageInput::File { path, .. } => {
                let data = tokio::fs::read(path).await.map_err(|source| Error::Read {
                    path: path.clone(),
                    source,
                })?;
                (Cow::Owned(data), path.as_path())
            }
            ImageInput::Bytes { source, data, .. } => {
                (Cow::Borrowed(data.as_slice()), Path::new(source.as_str()))
            }
        };

        let digest = hasher::digest(&data, Some(path));
        self.upload_digest(&data, digest, input.source(), input.provenance())
            .await
    }

    async fn upload_digest(
        &self,
        data: &[u8],
        digest: ContentDigest,
        source: String,
        from: Provenance,
    ) -> Result<UploadOutcome> {
        let _lease = self.lease(&digest.hash).await;

        if let Some(image) = self.store.get(&digest.hash).await? {
            info!("[{}] Cache hit for {}", source, digest.hash);
            return Ok(UploadOutcome { cache: true, image });
        }

        if !self.store.is_writable() {
            return Err(Error::Invariant(format!(
                "Record store is read-only; not uploading {}",
                digest.hash
            )));
        }

        let file_name = remote_file_name(&digest);
        info!("[{}] Cache miss, uploading as {}", source, file_name);
        let uploaded = self.gateway.upload(data, &file_name).await?;

        let record = ImageRecord {
            hash: digest.hash.clone(),
            source: source.clone(),
            from,
            format: digest.format,
            remote_id: Some(uploaded.remote_id),
            url: uploaded.url,
            thumbnail_url: uploaded.thumbnail_url,
            size: uploaded.size.unwrap_or(data.len() as u64),
            width: positive(uploaded.width).or(digest.width),
            height: positive(uploaded.height).or(digest.height),
            created_at: Utc::now().timestamp_millis(),
        };

        if let Err(e) = self.store.set(&digest.hash, &record).await {
            error!(
                "[{}] Uploaded {} but could not persist its record: {}",
                source, record.url, e
            );
            return Err(e);
        }

        info!("[{}] Uploaded to {}", source, record.url);
        Ok(UploadOutcome {
            cache: false,
            image: record,
        })
    }

    async fn lease(&self, hash: &str) -> HashLease {
        let lock = {
            let mut map = self
                .in_flight
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            let entry = map.entry(hash.to_string()).or_insert_with(|| InFlightEntry {
                lock: Arc::new(AsyncMutex::new(())),
                holders: 0,
            });
            entry.holders += 1;
            entry.lock.clone()
        };

        let mut lease = HashLease {
            key: hash.to_string(),
            guard: None,
            in_flight: self.in_flight.clone(),
        };

        if lock.try_lock().is_err() {
            debug!("Waiting for in-flight upload of {}", hash);
        }
        lease.guard = Some(lock.lock_owned().await);
        lease
    }
}

fn positive(dimension: Option<u32>) -> Option<u32> {
    dimension.filter(|d| *d > 0)
}

fn remote_file_name(digest: &ContentDigest) -> String {
    if digest.format.is_empty() {
        digest.hash.clone()
    } else {
        format!("{}.{}", digest.hash, digest.format)
    }
}
