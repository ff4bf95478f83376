//! Filestore Core - Foundation shared by every filestore backend
//!
//! Provides the error taxonomy, backend configuration, the `Locator`
//! value returned by `Key::uri`, and tracing setup helpers.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod types;

pub use config::{BackendConfig, LocalConfig, S3Config, StoreConfig};
pub use error::{Error, Result};
pub use types::Locator;
