//! Store / bucket / key trait definitions
//!
//! Defines the contract both backends satisfy. Navigation (`bucket`, `key`)
//! is pure and never fails; only the leaf [`Key`] talks to storage.

use async_trait::async_trait;
use filestore_core::{Locator, Result};
use tokio::io::AsyncRead;

/// Namespace root resolving bucket names
///
/// A store carries nothing but its backend configuration. Buckets are built
/// fresh on every call and are never cached.
pub trait FileStore: Send + Sync {
    /// Resolve a bucket by name
    fn bucket(&self, name: &str) -> Box<dyn Bucket>;
}

/// Named partition within a store
pub trait Bucket: Send + Sync {
    fn name(&self) -> &str;

    /// Resolve a key by name
    fn key(&self, name: &str) -> Box<dyn Key>;
}

/// Addressable location for a single object
#[async_trait]
pub trait Key: Send + Sync {
    /// Name of the owning bucket
    fn bucket_name(&self) -> &str;

    fn name(&self) -> &str;

    /// Locator for this key
    ///
    /// The local backend computes a path and never fails, whether or not the
    /// file exists. The S3 backend presigns a GET request and reports signing
    /// failures as [`filestore_core::Error::Backend`].
    async fn uri(&self) -> Result<Locator>;

    /// Copy every byte of `body` to this key
    ///
    /// Returns a non-empty location on success.
    ///
    /// # Errors
    /// * [`filestore_core::Error::Io`] if `body` cannot be fully read
    /// * [`filestore_core::Error::Backend`] if the destination cannot be
    ///   created or written, or the remote rejects the transfer
    async fn upload(&self, body: &mut (dyn AsyncRead + Unpin + Send)) -> Result<String>;
}
