//! Build a store from configuration

use std::sync::Arc;

use filestore_core::{BackendConfig, Result, StoreConfig};
use tracing::info;

use crate::{FileStore, LocalStore};

/// Validate `config` and construct the backend it selects
///
/// Returns [`filestore_core::Error::BackendUnavailable`] when the configuration names a
/// backend this build was compiled without.
pub async fn open(config: &StoreConfig) -> Result<Arc<dyn FileStore>> {
    config.validate()?;
    info!(backend = config.backend.name(), "Opening file store");

    match &config.backend {
        BackendConfig::Local(local) => Ok(Arc::new(LocalStore::from_config(local))),

        #[cfg(feature = "s3")]
        BackendConfig::S3(s3) => Ok(Arc::new(crate::s3::S3Store::connect(s3.clone()).await?)),

        #[cfg(not(feature = "s3"))]
        BackendConfig::S3(_) => Err(filestore_core::Error::BackendUnavailable {
            backend: config.backend.name().to_string(),
        }),
    }
}
