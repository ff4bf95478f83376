//! Local filesystem backend
//!
//! Buckets and keys map straight onto directories and files. An upload is a
//! streaming file copy; the locator is the composed path.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use filestore_core::{Error, LocalConfig, Locator, Result};
use tokio::fs;
use tokio::io::{AsyncRead, AsyncWriteExt};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::path;
use crate::{Bucket, FileStore, Key};

/// Local filesystem store
///
/// Without a root, bucket names are used as paths directly (relative to the
/// working directory, or absolute).
#[derive(Debug, Clone, Default)]
pub struct LocalStore {
    inner: Arc<LocalInner>,
}

#[derive(Debug, Default)]
struct LocalInner {
    root: Option<String>,
    atomic_writes: bool,
}

impl LocalStore {
    /// Create a store that resolves bucket names as plain paths
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store rooted at `root`
    pub fn with_root(root: impl Into<String>) -> Self {
        Self::from_config(&LocalConfig {
            root: Some(root.into()),
            ..Default::default()
        })
    }

    pub fn from_config(config: &LocalConfig) -> Self {
        Self {
            inner: Arc::new(LocalInner {
                root: config.root.clone(),
                atomic_writes: config.atomic_writes,
            }),
        }
    }

    /// Write through a temporary sibling file renamed into place
    ///
    /// Off by default: a failed upload may then leave a truncated file at the
    /// destination.
    pub fn with_atomic_writes(self, atomic_writes: bool) -> Self {
        Self {
            inner: Arc::new(LocalInner {
                root: self.inner.root.clone(),
                atomic_writes,
            }),
        }
    }

    pub fn root(&self) -> Option<&str> {
        self.inner.root.as_deref()
    }

    /// Typed counterpart of [`FileStore::bucket`]
    pub fn local_bucket(&self, name: &str) -> LocalBucket {
        LocalBucket {
            store: self.clone(),
            name: name.to_string(),
        }
    }
}

impl FileStore for LocalStore {
    fn bucket(&self, name: &str) -> Box<dyn Bucket> {
        Box::new(self.local_bucket(name))
    }
}

/// Directory within a [`LocalStore`]
#[derive(Debug, Clone)]
pub struct LocalBucket {
    store: LocalStore,
    name: String,
}

impl LocalBucket {
    /// Typed counterpart of [`Bucket::key`]
    pub fn local_key(&self, name: &str) -> LocalKey {
        LocalKey {
            bucket: self.clone(),
            name: name.to_string(),
        }
    }
}

impl Bucket for LocalBucket {
    fn name(&self) -> &str {
        &self.name
    }

    fn key(&self, name: &str) -> Box<dyn Key> {
        Box::new(self.local_key(name))
    }
}

/// File within a [`LocalBucket`]
#[derive(Debug, Clone)]
pub struct LocalKey {
    bucket: LocalBucket,
    name: String,
}

impl LocalKey {
    /// Normalized `root/bucket/key` path
    pub fn path(&self) -> String {
        let root = self.bucket.store.root().unwrap_or_default();
        path::join([root, self.bucket.name.as_str(), self.name.as_str()])
    }

    /// Generate a unique temporary file path next to the destination
    fn temp_path(full_path: &std::path::Path) -> PathBuf {
        let temp_name = format!(
            ".{}.{}.tmp",
            full_path.file_name().unwrap_or_default().to_string_lossy(),
            Uuid::new_v4()
        );
        full_path.with_file_name(temp_name)
    }

    /// Create `write_path`, stream `body` into it and sync
    ///
    /// The file handle is dropped before returning on every path, so the
    /// descriptor is closed whether or not the copy succeeded.
    async fn write_file(
        write_path: &std::path::Path,
        body: &mut (dyn AsyncRead + Unpin + Send),
    ) -> Result<u64> {
        let mut file = fs::File::create(write_path)
            .await
            .map_err(|e| Error::Backend {
                message: format!("Failed to create file {:?}: {}", write_path, e),
            })?;

        let copied = match tokio::io::copy(body, &mut file).await {
            Ok(copied) => copied,
            Err(e) => {
                // Settle any write still in flight so dropping the handle
                // closes the descriptor here rather than on the blocking pool.
                let _ = file.flush().await;
                return Err(Error::Io(e));
            }
        };

        file.flush().await.map_err(|e| Error::Backend {
            message: format!("Failed to flush {:?}: {}", write_path, e),
        })?;

        file.sync_all().await.map_err(|e| Error::Backend {
            message: format!("Failed to sync file: {}", e),
        })?;

        Ok(copied)
    }
}

#[async_trait]
impl Key for LocalKey {
    fn bucket_name(&self) -> &str {
        &self.bucket.name
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn uri(&self) -> Result<Locator> {
        Ok(Locator::new(self.path()))
    }

    #[instrument(skip(self, body), fields(backend = "local", bucket = %self.bucket.name, key = %self.name))]
    async fn upload(&self, body: &mut (dyn AsyncRead + Unpin + Send)) -> Result<String> {
        let location = self.path();
        let full_path = PathBuf::from(&location);
        debug!(?full_path, "Uploading file");

        // Ensure parent directory exists
        if let Some(parent) = full_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            let mut builder = fs::DirBuilder::new();
            builder.recursive(true);
            #[cfg(unix)]
            builder.mode(0o777);
            builder.create(parent).await.map_err(|e| Error::Backend {
                message: format!("Failed to create directory {:?}: {}", parent, e),
            })?;
        }

        if !self.bucket.store.inner.atomic_writes {
            let size = Self::write_file(&full_path, body).await?;
            debug!(?full_path, size, "File uploaded");
            return Ok(location);
        }

        let temp_path = Self::temp_path(&full_path);
        debug!(?temp_path, "Writing through temporary file");

        let size = match Self::write_file(&temp_path, body).await {
            Ok(size) => size,
            Err(e) => {
                if let Err(cleanup) = fs::remove_file(&temp_path).await {
                    warn!(?temp_path, error = %cleanup, "Failed to remove temporary file");
                }
                return Err(e);
            }
        };

        // Atomic rename
        if let Err(e) = fs::rename(&temp_path, &full_path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(Error::Backend {
                message: format!("Failed to rename {:?} to {:?}: {}", temp_path, full_path, e),
            });
        }

        debug!(?full_path, size, "File uploaded atomically");
        Ok(location)
    }
}
