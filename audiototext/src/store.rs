use std::fmt;
use std::path::Path;

use async_trait::async_trait;
use tracing::info;

use crate::error::{Error, Result};

/// An object inside a bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locator {
    pub bucket: String,
    pub key: String,
}

impl Locator {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    /// Parse `s3://bucket/key` or an S3 HTTPS URL.
    ///
    /// Both path-style (`https://s3.<region>.amazonaws.com/bucket/key`) and
    /// virtual-hosted (`https://bucket.s3.<region>.amazonaws.com/key`)
    /// URLs are understood.
    pub fn parse(uri: &str) -> Result<Self> {
        let invalid = || Error::InvalidLocator(uri.to_string());

        if let Some(rest) = uri.strip_prefix("s3://") {
            let (bucket, key) = rest.split_once('/').ok_or_else(invalid)?;
            return Self::checked(bucket, key).ok_or_else(invalid);
        }

        let rest = uri
            .strip_prefix("https://")
            .or_else(|| uri.strip_prefix("http://"))
            .ok_or_else(invalid)?;
        let rest = rest.split(['?', '#']).next().unwrap_or_default();
        let (host, path) = rest.split_once('/').ok_or_else(invalid)?;

        let located = if host.starts_with("s3.") || host.starts_with("s3-") {
            path.split_once('/')
                .and_then(|(bucket, key)| Self::checked(bucket, key))
        } else if let Some(idx) = host.find(".s3.").or_else(|| host.find(".s3-")) {
            Self::checked(&host[..idx], path)
        } else {
            None
        };

        located.ok_or_else(invalid)
    }

    fn checked(bucket: &str, key: &str) -> Option<Self> {
        (!bucket.is_empty() && !key.is_empty()).then(|| Self::new(bucket, key))
    }

    /// Last path segment of the key, i.e. the object's file name.
    pub fn file_name(&self) -> &str {
        self.key.rsplit('/').next().unwrap_or(&self.key)
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s3://{}/{}", self.bucket, self.key)
    }
}

/// Bucket-based object storage.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `body` under `key`.
    async fn upload(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<Locator>;

    /// Fetch the full body of `key`.
    async fn download(&self, bucket: &str, key: &str) -> Result<Vec<u8>>;

    /// Upload a local file under its base name.
    async fn put(&self, local_path: &Path, bucket: &str) -> Result<Locator> {
        let key = local_path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| {
                Error::InvalidOption(format!(
                    "{} has no usable file name",
                    local_path.display()
                ))
            })?
            .to_string();

        let body = tokio::fs::read(local_path)
            .await
            .map_err(|e| Error::io(local_path, e))?;

        info!(path = %local_path.display(), bucket, %key, bytes = body.len(), "uploading");
        self.upload(bucket, &key, body).await
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        self.download(bucket, key).await
    }
}

#[cfg(feature = "aws")]
pub use self::s3::S3Store;

#[cfg(feature = "aws")]
mod s3 {
    use async_trait::async_trait;
    use aws_sdk_s3::error::DisplayErrorContext;
    use aws_sdk_s3::primitives::ByteStream;
    use tracing::debug;

    use super::{Locator, ObjectStore};
    use crate::error::{Error, Result};

    /// [`ObjectStore`] backed by Amazon S3.
    #[derive(Debug, Clone)]
    pub struct S3Store {
        client: aws_sdk_s3::Client,
    }

    impl S3Store {
        pub fn new(client: aws_sdk_s3::Client) -> Self {
            Self { client }
        }
    }

    #[async_trait]
    impl ObjectStore for S3Store {
        async fn upload(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<Locator> {
            self.client
                .put_object()
                .bucket(bucket)
                .key(key)
                .body(ByteStream::from(body))
                .send()
                .await
                .map_err(|e| {
                    Error::Upload(format!(
                        "{key} to bucket {bucket}: {}",
                        DisplayErrorContext(&e)
                    ))
                })?;

            let locator = Locator::new(bucket, key);
            debug!(%locator, "uploaded");
            Ok(locator)
        }

        async fn download(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
            let output = self
                .client
                .get_object()
                .bucket(bucket)
                .key(key)
                .send()
                .await
                .map_err(|e| match e.as_service_error() {
                    Some(service) if service.is_no_such_key() => Error::NotFound {
                        bucket: bucket.to_string(),
                        key: key.to_string(),
                    },
                    _ => Error::Transfer(format!(
                        "s3://{bucket}/{key}: {}",
                        DisplayErrorContext(&e)
                    )),
                })?;

            let body = output
                .body
                .collect()
                .await
                .map_err(|e| Error::Transfer(format!("reading s3://{bucket}/{key}: {e}")))?;

            Ok(body.into_bytes().to_vec())
        }
    }
}
