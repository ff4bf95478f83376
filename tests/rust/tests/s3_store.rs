//! S3 backend against an in-process mock object store
//!
//! The mock answers just enough of the S3 REST surface for uploads: PutObject,
//! the multipart calls, and a GET echo. Like a real service it rejects PUTs it
//! does not expect, here any PUT whose path lacks the test key.

use anyhow::Result;
use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{header, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use filestore::{Error, FileStore, S3Store};
use filestore_core::{telemetry, BackendConfig, S3Config, StoreConfig};
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, ReadBuf};
use tokio::sync::oneshot;

const TEST_BUCKET: &str = "testbucket";
const TEST_KEY: &str = "testkey";
const PART_SIZE: usize = 5 * 1024 * 1024;
const S3_XMLNS: &str = "http://s3.amazonaws.com/doc/2006-03-01/";

#[derive(Debug, Clone)]
struct Recorded {
    method: Method,
    path: String,
    query: String,
}

#[derive(Clone, Default)]
struct MockS3 {
    requests: Arc<Mutex<Vec<Recorded>>>,
}

impl MockS3 {
    fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    fn count(&self, method: Method, query_marker: &str) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.method == method && r.query.contains(query_marker))
            .count()
    }
}

async fn s3_handler(State(mock): State<MockS3>, method: Method, uri: Uri, _body: Bytes) -> Response {
    let path = uri.path().to_string();
    let query = uri.query().unwrap_or_default().to_string();
    tracing::debug!(%method, %path, %query, "mock s3 request");

    mock.requests.lock().unwrap().push(Recorded {
        method: method.clone(),
        path: path.clone(),
        query: query.clone(),
    });

    match method {
        Method::PUT if !path.contains(TEST_KEY) => (StatusCode::BAD_REQUEST, path).into_response(),
        Method::PUT if query.contains("partNumber=") => {
            let part = query
                .split('&')
                .find_map(|kv| kv.strip_prefix("partNumber="))
                .unwrap_or("0")
                .to_string();
            (StatusCode::OK, [(header::ETAG, format!("\"etag-{}\"", part))], "").into_response()
        }
        Method::POST if query.contains("uploads") => xml(format!(
            "<InitiateMultipartUploadResult xmlns=\"{}\"><Bucket>{}</Bucket><Key>{}</Key>\
             <UploadId>upload-1</UploadId></InitiateMultipartUploadResult>",
            S3_XMLNS,
            TEST_BUCKET,
            path.trim_start_matches(&format!("/{}/", TEST_BUCKET))
        )),
        Method::POST if query.contains("uploadId=") => xml(format!(
            "<CompleteMultipartUploadResult xmlns=\"{}\"><Location>http://mock-s3{}</Location>\
             <Bucket>{}</Bucket><ETag>\"etag-final\"</ETag></CompleteMultipartUploadResult>",
            S3_XMLNS, path, TEST_BUCKET
        )),
        Method::DELETE => StatusCode::NO_CONTENT.into_response(),
        _ => (StatusCode::OK, path).into_response(),
    }
}

fn xml(body: String) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/xml")],
        format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{}", body),
    )
        .into_response()
}

// Start the mock on a free port and return its endpoint + shutdown sender
async fn start_mock_s3() -> Result<(String, MockS3, oneshot::Sender<()>)> {
    telemetry::init_tracing("filestore=debug,s3_store=debug");

    let mock = MockS3::default();
    let app = Router::new()
        .fallback(s3_handler)
        .layer(DefaultBodyLimit::disable())
        .with_state(mock.clone());

    let port = portpicker::pick_unused_port().expect("No ports free");
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port)).await?;
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                rx.await.ok();
            })
            .await
            .ok();
    });

    Ok((format!("http://127.0.0.1:{}", port), mock, tx))
}

fn mock_config(endpoint: &str) -> S3Config {
    S3Config {
        region: "us-east-1".to_string(),
        endpoint_url: Some(endpoint.to_string()),
        force_path_style: true,
        access_key_id: Some("akia".to_string()),
        secret_access_key: Some("zing".to_string()),
        ..Default::default()
    }
}

/// Yields `remaining` filler bytes, then fails every read
struct FlakyReader {
    remaining: usize,
}

impl AsyncRead for FlakyReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        if self.remaining == 0 {
            return Poll::Ready(Err(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "source went away",
            )));
        }
        let n = self.remaining.min(buf.remaining());
        buf.put_slice(&vec![b'x'; n]);
        self.remaining -= n;
        Poll::Ready(Ok(()))
    }
}

#[tokio::test]
async fn test_presigned_uri() -> Result<()> {
    let (endpoint, mock, _shutdown) = start_mock_s3().await?;
    let store = S3Store::connect(mock_config(&endpoint)).await?;

    let key = store.bucket(TEST_BUCKET).key(TEST_KEY);
    let uri = key.uri().await?;

    assert!(uri.path().contains("testbucket/testkey"), "uri was {}", uri);
    assert_eq!(uri.authority(), endpoint.strip_prefix("http://"));
    assert!(uri.query().unwrap_or_default().contains("X-Amz-Signature="));
    // Presigning happens client-side
    assert!(mock.requests().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_upload() -> Result<()> {
    let (endpoint, mock, _shutdown) = start_mock_s3().await?;
    let store = S3Store::connect(mock_config(&endpoint)).await?;

    let key = store.bucket(TEST_BUCKET).key(TEST_KEY);
    let mut body: &[u8] = b"This is a test";
    let location = key.upload(&mut body).await?;

    assert!(!location.is_empty());
    assert_eq!(location, format!("{}/testbucket/testkey", endpoint));

    let puts: Vec<_> = mock
        .requests()
        .into_iter()
        .filter(|r| r.method == Method::PUT)
        .collect();
    assert_eq!(puts.len(), 1);
    assert_eq!(puts[0].path, "/testbucket/testkey");
    Ok(())
}

#[tokio::test]
async fn test_upload_empty_key_fails() -> Result<()> {
    let (endpoint, mock, _shutdown) = start_mock_s3().await?;
    let store = S3Store::connect(mock_config(&endpoint)).await?;

    let key = store.bucket(TEST_BUCKET).key("");
    let result = key.upload(&mut &b"asdf"[..]).await;

    assert!(matches!(result, Err(Error::Backend { .. })));
    assert!(mock.requests().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_upload_rejected_by_service() -> Result<()> {
    let (endpoint, _mock, _shutdown) = start_mock_s3().await?;
    let store = S3Store::connect(mock_config(&endpoint)).await?;

    let key = store.bucket(TEST_BUCKET).key("unexpected");
    let result = key.upload(&mut &b"asdf"[..]).await;

    match result {
        Err(Error::Backend { message }) => assert!(message.contains("put_object")),
        other => panic!("expected backend error, got {:?}", other),
    }
    Ok(())
}

#[tokio::test]
async fn test_from_client_rejects_unusable_config() -> Result<()> {
    let (endpoint, mock, _shutdown) = start_mock_s3().await?;
    let connected = S3Store::connect(mock_config(&endpoint)).await?;

    let zero_parts = S3Config {
        part_size: 0,
        ..mock_config(&endpoint)
    };
    let result = S3Store::from_client(connected.client().clone(), &zero_parts);
    assert!(matches!(result, Err(Error::InvalidConfig { .. })));

    let long_expiry = S3Config {
        presign_expiry: Duration::from_secs(8 * 24 * 60 * 60),
        ..mock_config(&endpoint)
    };
    let result = S3Store::from_client(connected.client().clone(), &long_expiry);
    assert!(matches!(result, Err(Error::InvalidConfig { .. })));

    // A store built over the same client with a valid config uploads the whole body
    let store = S3Store::from_client(connected.client().clone(), &mock_config(&endpoint))?;
    let mut body: &[u8] = b"This is a test";
    store.bucket(TEST_BUCKET).key(TEST_KEY).upload(&mut body).await?;

    assert!(body.is_empty());
    assert_eq!(mock.count(Method::PUT, ""), 1);
    assert_eq!(mock.count(Method::PUT, "partNumber="), 0);
    Ok(())
}

#[tokio::test]
async fn test_multipart_upload() -> Result<()> {
    let (endpoint, mock, _shutdown) = start_mock_s3().await?;
    let store = S3Store::connect(mock_config(&endpoint)).await?;

    let key = store.bucket(TEST_BUCKET).key("testkey-large");
    let data = vec![42u8; PART_SIZE + 1234];
    let location = key.upload(&mut data.as_slice()).await?;

    assert_eq!(location, "http://mock-s3/testbucket/testkey-large");
    assert_eq!(mock.count(Method::POST, "uploads"), 1);
    assert_eq!(mock.count(Method::PUT, "partNumber=1"), 1);
    assert_eq!(mock.count(Method::PUT, "partNumber=2"), 1);
    assert_eq!(mock.count(Method::PUT, "partNumber=3"), 0);
    assert_eq!(mock.count(Method::POST, "uploadId=upload-1"), 1);
    assert_eq!(mock.count(Method::DELETE, ""), 0);
    Ok(())
}

#[tokio::test]
async fn test_multipart_read_error_aborts() -> Result<()> {
    let (endpoint, mock, _shutdown) = start_mock_s3().await?;
    let store = S3Store::connect(mock_config(&endpoint)).await?;

    let key = store.bucket(TEST_BUCKET).key("testkey-flaky");
    let mut body = FlakyReader {
        remaining: PART_SIZE + 10,
    };
    let result = key.upload(&mut body).await;

    assert!(matches!(result, Err(Error::Io(_))));
    assert_eq!(mock.count(Method::PUT, "partNumber=1"), 1);
    assert_eq!(mock.count(Method::POST, "uploadId="), 0);
    assert_eq!(mock.count(Method::DELETE, "uploadId=upload-1"), 1);
    Ok(())
}

#[tokio::test]
async fn test_small_read_error_sends_nothing() -> Result<()> {
    let (endpoint, mock, _shutdown) = start_mock_s3().await?;
    let store = S3Store::connect(mock_config(&endpoint)).await?;

    let key = store.bucket(TEST_BUCKET).key(TEST_KEY);
    let result = key.upload(&mut FlakyReader { remaining: 3 }).await;

    assert!(matches!(result, Err(Error::Io(_))));
    assert!(mock.requests().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_open_from_config() -> Result<()> {
    let (endpoint, _mock, _shutdown) = start_mock_s3().await?;
    let config = StoreConfig {
        backend: BackendConfig::S3(mock_config(&endpoint)),
    };

    let store = filestore::open(&config).await?;
    let location = store
        .bucket(TEST_BUCKET)
        .key(TEST_KEY)
        .upload(&mut &b"through config"[..])
        .await?;

    assert_eq!(location, format!("{}/testbucket/testkey", endpoint));
    Ok(())
}
