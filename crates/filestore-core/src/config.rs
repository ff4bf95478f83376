//! Store configuration types

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Smallest part S3 accepts for every part but the last (5 MiB)
pub const MIN_PART_SIZE: u64 = 5 * 1024 * 1024;

/// Largest part S3 accepts (5 GiB)
pub const MAX_PART_SIZE: u64 = 5 * 1024 * 1024 * 1024;

/// Longest lifetime SigV4 allows for a presigned URL (7 days)
pub const MAX_PRESIGN_EXPIRY: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Top-level store configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Which backend to build and how
    pub backend: BackendConfig,
}

/// Backend selection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum BackendConfig {
    /// Local filesystem
    Local(LocalConfig),

    /// S3-compatible object storage
    S3(S3Config),
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig::Local(LocalConfig::default())
    }
}

impl BackendConfig {
    /// Short backend name used in logs and errors
    pub fn name(&self) -> &'static str {
        match self {
            BackendConfig::Local(_) => "local",
            BackendConfig::S3(_) => "s3",
        }
    }
}

/// Local filesystem backend configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalConfig {
    /// Directory prepended to every bucket path. Bucket names are used
    /// as-is (relative to the working directory, or absolute) when unset.
    pub root: Option<String>,

    /// Write to a temporary sibling file and rename it into place
    pub atomic_writes: bool,
}

/// S3 backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct S3Config {
    /// AWS region (default: "us-east-1")
    pub region: String,

    /// Optional custom endpoint URL (for MinIO, LocalStack, etc.)
    pub endpoint_url: Option<String>,

    /// Force path-style addressing (required for MinIO)
    pub force_path_style: bool,

    /// Static access key; the default credential chain is used when unset
    pub access_key_id: Option<String>,

    /// Static secret key, paired with `access_key_id`
    pub secret_access_key: Option<String>,

    /// Lifetime of URLs returned by `Key::uri`
    #[serde(with = "humantime_serde")]
    pub presign_expiry: Duration,

    /// Chunk size for managed uploads; bodies larger than this go multipart
    pub part_size: u64,
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            region: "us-east-1".to_string(),
            endpoint_url: None,
            force_path_style: false,
            access_key_id: None,
            secret_access_key: None,
            presign_expiry: Duration::from_secs(60 * 60),
            part_size: MIN_PART_SIZE,
        }
    }
}

impl S3Config {
    /// Check the settings against the limits S3 enforces
    pub fn validate(&self) -> Result<()> {
        if self.region.trim().is_empty() {
            return Err(invalid("s3 region must not be empty"));
        }

        if !(MIN_PART_SIZE..=MAX_PART_SIZE).contains(&self.part_size) {
            return Err(invalid(format!(
                "s3 part_size must be between {} and {} bytes, got {}",
                MIN_PART_SIZE, MAX_PART_SIZE, self.part_size
            )));
        }

        if self.presign_expiry.is_zero() || self.presign_expiry > MAX_PRESIGN_EXPIRY {
            return Err(invalid(format!(
                "s3 presign_expiry must be between 1ms and {}s, got {}ms",
                MAX_PRESIGN_EXPIRY.as_secs(),
                self.presign_expiry.as_millis()
            )));
        }

        if self.access_key_id.is_some() != self.secret_access_key.is_some() {
            return Err(invalid(
                "s3 access_key_id and secret_access_key must be set together",
            ));
        }

        Ok(())
    }
}

impl StoreConfig {
    /// Parse a JSON document
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read and parse a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| Error::InvalidConfig {
            message: format!("Failed to read {}: {}", path.display(), e),
        })?;
        Self::from_json_str(&contents)
    }

    /// Validate the selected backend's settings
    pub fn validate(&self) -> Result<()> {
        match &self.backend {
            BackendConfig::Local(_) => Ok(()),
            BackendConfig::S3(s3) => s3.validate(),
        }
    }
}

fn invalid(message: impl Into<String>) -> Error {
    Error::InvalidConfig {
        message: message.into(),
    }
}

/// Duration serialization helper for human-readable formats
mod humantime_serde {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
