//! Filestore - Upload byte streams to named locations and get back a URI
//!
//! A three-level naming hierarchy (store → bucket → key) with two
//! interchangeable backends:
//! - Local filesystem (default feature)
//! - Amazon S3 / S3-compatible storage (with `s3` feature)
//!
//! # Example
//!
//! ```no_run
//! use filestore::{FileStore, LocalStore};
//!
//! # async fn example() -> filestore_core::Result<()> {
//! let store = LocalStore::with_root("/tmp/uploads");
//! let key = store.bucket("reports").key("2024/q1.csv");
//!
//! let mut body: &[u8] = b"region,total\nnorth,12\n";
//! let location = key.upload(&mut body).await?;
//! assert_eq!(key.uri().await?.as_str(), location);
//! # Ok(())
//! # }
//! ```

mod backend;
mod local;
mod open;
mod path;

#[cfg(feature = "s3")]
mod s3;

pub use backend::{Bucket, FileStore, Key};
pub use filestore_core::{Error, Locator, Result};
pub use local::{LocalBucket, LocalKey, LocalStore};
pub use open::open;

#[cfg(feature = "s3")]
pub use s3::{S3Bucket, S3Key, S3Store};
