//! S3 storage backend
//!
//! Provides S3-compatible object storage with:
//! - Presigned GET URLs as key locators
//! - Managed uploads (single PUT, or multipart for large bodies)
//! - Custom endpoint support (for MinIO, LocalStack, etc.)

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::{
    config::{Builder as S3ConfigBuilder, Credentials, Region},
    error::DisplayErrorContext,
    presigning::PresigningConfig,
    primitives::ByteStream,
    types::{CompletedMultipartUpload, CompletedPart},
    Client,
};
use bytes::Bytes;
use filestore_core::{Error, Locator, Result, S3Config};
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, instrument, warn};

use crate::path;
use crate::{Bucket, FileStore, Key};

/// S3-compatible store
///
/// Wraps a shared `aws_sdk_s3::Client`; buckets and keys are plain names
/// resolved against it.
#[derive(Debug, Clone)]
pub struct S3Store {
    inner: Arc<S3Inner>,
}

#[derive(Debug)]
struct S3Inner {
    client: Client,
    presign_expiry: Duration,
    part_size: usize,
    endpoint: ObjectEndpoint,
}

/// Enough of the client's addressing settings to render object URLs
#[derive(Debug, Clone)]
struct ObjectEndpoint {
    endpoint_url: Option<String>,
    region: String,
    force_path_style: bool,
}

impl ObjectEndpoint {
    fn from_config(config: &S3Config) -> Self {
        Self {
            endpoint_url: config.endpoint_url.clone(),
            region: config.region.clone(),
            force_path_style: config.force_path_style,
        }
    }

    /// URL of an object as the service addresses it
    fn object_url(&self, bucket: &str, key: &str) -> String {
        let key = path::encode_object_key(key);
        match &self.endpoint_url {
            Some(endpoint) => {
                let endpoint = endpoint.trim_end_matches('/');
                match endpoint.split_once("://") {
                    Some((scheme, host)) if !self.force_path_style => {
                        format!("{}://{}.{}/{}", scheme, bucket, host, key)
                    }
                    _ => format!("{}/{}/{}", endpoint, bucket, key),
                }
            }
            None if self.force_path_style => {
                format!("https://s3.{}.amazonaws.com/{}/{}", self.region, bucket, key)
            }
            None => format!("https://{}.s3.{}.amazonaws.com/{}", bucket, self.region, key),
        }
    }
}

impl S3Store {
    /// Build a client from the default AWS configuration chain, overridden
    /// by whatever `config` sets
    pub async fn connect(config: S3Config) -> Result<Self> {
        config.validate()?;

        let mut loader =
            aws_config::defaults(BehaviorVersion::latest()).region(Region::new(config.region.clone()));

        if let (Some(access_key_id), Some(secret_access_key)) =
            (&config.access_key_id, &config.secret_access_key)
        {
            loader = loader.credentials_provider(Credentials::new(
                access_key_id,
                secret_access_key,
                None,
                None,
                "filestore-static",
            ));
        }

        let aws_config = loader.load().await;
        let mut s3_config_builder = S3ConfigBuilder::from(&aws_config);

        if let Some(endpoint) = &config.endpoint_url {
            s3_config_builder = s3_config_builder.endpoint_url(endpoint);
        }

        if config.force_path_style {
            s3_config_builder = s3_config_builder.force_path_style(true);
        }

        let client = Client::from_conf(s3_config_builder.build());
        debug!(region = %config.region, endpoint = ?config.endpoint_url, "Connected S3 store");

        Self::from_client(client, &config)
    }

    /// Wrap an existing client
    ///
    /// `config` supplies the presign expiry, the part size, and the endpoint
    /// settings used to render upload locations; it should describe the same
    /// endpoint the client talks to. It is validated like [`S3Store::connect`]
    /// validates its own.
    pub fn from_client(client: Client, config: &S3Config) -> Result<Self> {
        config.validate()?;

        let part_size = usize::try_from(config.part_size).map_err(|_| Error::InvalidConfig {
            message: format!(
                "s3 part_size {} does not fit in memory on this target",
                config.part_size
            ),
        })?;

        Ok(Self {
            inner: Arc::new(S3Inner {
                client,
                presign_expiry: config.presign_expiry,
                part_size,
                endpoint: ObjectEndpoint::from_config(config),
            }),
        })
    }

    pub fn client(&self) -> &Client {
        &self.inner.client
    }

    /// Typed counterpart of [`FileStore::bucket`]
    pub fn s3_bucket(&self, name: &str) -> S3Bucket {
        S3Bucket {
            store: self.clone(),
            name: name.to_string(),
        }
    }
}

impl FileStore for S3Store {
    fn bucket(&self, name: &str) -> Box<dyn Bucket> {
        Box::new(self.s3_bucket(name))
    }
}

/// S3 bucket within an [`S3Store`]
#[derive(Debug, Clone)]
pub struct S3Bucket {
    store: S3Store,
    name: String,
}

impl S3Bucket {
    /// Typed counterpart of [`Bucket::key`]
    pub fn s3_key(&self, name: &str) -> S3Key {
        S3Key {
            bucket: self.clone(),
            name: name.to_string(),
        }
    }
}

impl Bucket for S3Bucket {
    fn name(&self) -> &str {
        &self.name
    }

    fn key(&self, name: &str) -> Box<dyn Key> {
        Box::new(self.s3_key(name))
    }
}

/// Object key within an [`S3Bucket`]
#[derive(Debug, Clone)]
pub struct S3Key {
    bucket: S3Bucket,
    name: String,
}

impl S3Key {
    fn inner(&self) -> &S3Inner {
        &self.bucket.store.inner
    }

    /// Object URL reported as the location of single-request uploads
    pub fn object_url(&self) -> String {
        self.inner()
            .endpoint
            .object_url(&self.bucket.name, &self.name)
    }

    /// S3 rejects empty bucket and key names; fail before building a request
    fn check_names(&self) -> Result<()> {
        if self.bucket.name.is_empty() {
            return Err(Error::backend("S3 bucket name must not be empty"));
        }
        if self.name.is_empty() {
            return Err(Error::backend("S3 key name must not be empty"));
        }
        Ok(())
    }

    /// Upload a body that fits in one part with a single PutObject
    async fn put_object(&self, data: Bytes) -> Result<String> {
        let size = data.len();
        self.inner()
            .client
            .put_object()
            .bucket(&self.bucket.name)
            .key(&self.name)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| Error::Backend {
                message: format!("S3 put_object failed: {}", DisplayErrorContext(&e)),
            })?;

        debug!(size, "Uploaded object");
        Ok(self.object_url())
    }

    /// Perform multipart upload for bodies larger than one part
    async fn multipart_upload(
        &self,
        first: Bytes,
        body: &mut (dyn AsyncRead + Unpin + Send),
    ) -> Result<String> {
        let create_result = self
            .inner()
            .client
            .create_multipart_upload()
            .bucket(&self.bucket.name)
            .key(&self.name)
            .send()
            .await
            .map_err(|e| Error::Backend {
                message: format!(
                    "Failed to initiate multipart upload: {}",
                    DisplayErrorContext(&e)
                ),
            })?;

        let upload_id = create_result
            .upload_id()
            .ok_or_else(|| Error::backend("No upload_id returned"))?
            .to_string();

        debug!(%upload_id, "Started multipart upload");

        match self.upload_parts(&upload_id, first, body).await {
            Ok(location) => Ok(location),
            Err(e) => {
                self.abort_multipart_upload(&upload_id).await;
                Err(e)
            }
        }
    }

    /// Stream the remaining parts and complete the upload
    async fn upload_parts(
        &self,
        upload_id: &str,
        first: Bytes,
        body: &mut (dyn AsyncRead + Unpin + Send),
    ) -> Result<String> {
        let part_size = self.inner().part_size;
        let mut completed_parts = Vec::new();
        let mut part_number = 1;
        let mut chunk = first;

        loop {
            let is_last = chunk.len() < part_size;
            let chunk_len = chunk.len();

            let upload_part_result = self
                .inner()
                .client
                .upload_part()
                .bucket(&self.bucket.name)
                .key(&self.name)
                .upload_id(upload_id)
                .part_number(part_number)
                .body(ByteStream::from(chunk))
                .send()
                .await
                .map_err(|e| Error::Backend {
                    message: format!(
                        "Failed to upload part {}: {}",
                        part_number,
                        DisplayErrorContext(&e)
                    ),
                })?;

            completed_parts.push(
                CompletedPart::builder()
                    .part_number(part_number)
                    .set_e_tag(upload_part_result.e_tag().map(String::from))
                    .build(),
            );
            debug!(part_number, size = chunk_len, "Uploaded part");

            if is_last {
                break;
            }
            chunk = read_chunk(body, part_size).await?;
            if chunk.is_empty() {
                break;
            }
            part_number += 1;
        }

        let completed_upload = CompletedMultipartUpload::builder()
            .set_parts(Some(completed_parts))
            .build();

        let output = self
            .inner()
            .client
            .complete_multipart_upload()
            .bucket(&self.bucket.name)
            .key(&self.name)
            .upload_id(upload_id)
            .multipart_upload(completed_upload)
            .send()
            .await
            .map_err(|e| Error::Backend {
                message: format!(
                    "Failed to complete multipart upload: {}",
                    DisplayErrorContext(&e)
                ),
            })?;

        debug!(parts = part_number, "Completed multipart upload");
        Ok(output
            .location()
            .filter(|location| !location.is_empty())
            .map(String::from)
            .unwrap_or_else(|| self.object_url()))
    }

    /// Abort a multipart upload (best effort, for cleanup)
    async fn abort_multipart_upload(&self, upload_id: &str) {
        let result = self
            .inner()
            .client
            .abort_multipart_upload()
            .bucket(&self.bucket.name)
            .key(&self.name)
            .upload_id(upload_id)
            .send()
            .await;

        if let Err(e) = result {
            warn!(%upload_id, error = %DisplayErrorContext(&e), "Failed to abort multipart upload");
        }
    }
}

/// Read up to `size` bytes, stopping early only at end of stream
async fn read_chunk(body: &mut (dyn AsyncRead + Unpin + Send), size: usize) -> Result<Bytes> {
    let mut buf = Vec::new();
    (&mut *body).take(size as u64).read_to_end(&mut buf).await?;
    Ok(Bytes::from(buf))
}

#[async_trait]
impl Key for S3Key {
    fn bucket_name(&self) -> &str {
        &self.bucket.name
    }

    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(skip(self), fields(backend = "s3", bucket = %self.bucket.name, key = %self.name))]
    async fn uri(&self) -> Result<Locator> {
        self.check_names()?;

        let expiry = self.inner().presign_expiry;
        let presigning_config = PresigningConfig::expires_in(expiry).map_err(|e| Error::Backend {
            message: format!("Invalid presign expiry {:?}: {}", expiry, e),
        })?;

        let presigned = self
            .inner()
            .client
            .get_object()
            .bucket(&self.bucket.name)
            .key(&self.name)
            .presigned(presigning_config)
            .await
            .map_err(|e| Error::Backend {
                message: format!("Failed to presign get_object: {}", DisplayErrorContext(&e)),
            })?;

        debug!(expires_in = ?expiry, "Presigned object URL");
        Ok(Locator::new(presigned.uri().to_string()))
    }

    #[instrument(skip(self, body), fields(backend = "s3", bucket = %self.bucket.name, key = %self.name))]
    async fn upload(&self, body: &mut (dyn AsyncRead + Unpin + Send)) -> Result<String> {
        self.check_names()?;

        let part_size = self.inner().part_size;
        let first = read_chunk(body, part_size).await?;

        if first.len() < part_size {
            return self.put_object(first).await;
        }

        debug!(part_size, "Body exceeds one part, switching to multipart");
        self.multipart_upload(first, body).await
    }
}
