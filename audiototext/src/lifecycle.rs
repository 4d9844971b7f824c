use async_trait::async_trait;
use tracing::{info, warn};

use crate::error::Result;

/// Creates and removes the buckets a run owns.
#[async_trait]
pub trait BucketLifecycle: Send + Sync {
    /// Create `name` and return once it is usable.
    async fn create_bucket(&self, name: &str) -> Result<()>;

    /// Empty and delete `name`, returning once it is gone.
    async fn delete_bucket(&self, name: &str) -> Result<()>;
}

/// Create every bucket in `names`. If one fails, the ones already created
/// are removed again before the error is returned.
pub async fn provision(lifecycle: &dyn BucketLifecycle, names: &[String]) -> Result<()> {
    for (i, name) in names.iter().enumerate() {
        if let Err(e) = lifecycle.create_bucket(name).await {
            cleanup(lifecycle, &names[..i]).await;
            return Err(e);
        }
        info!(bucket = %name, "created bucket");
    }
    Ok(())
}

/// Delete every bucket in `names`, logging failures instead of returning them.
/// Returns the buckets that are left behind.
pub async fn cleanup(lifecycle: &dyn BucketLifecycle, names: &[String]) -> Vec<String> {
    let mut leftover = Vec::new();
    for name in names {
        match lifecycle.delete_bucket(name).await {
            Ok(()) => info!(bucket = %name, "deleted bucket"),
            Err(e) => {
                warn!(bucket = %name, error = %e, "you'll have to delete this bucket yourself");
                leftover.push(name.clone());
            }
        }
    }
    leftover
}

#[cfg(feature = "aws")]
pub use self::s3::S3Buckets;

#[cfg(feature = "aws")]
mod s3 {
    use std::time::Duration;

    use async_trait::async_trait;
    use aws_sdk_s3::client::Waiters;
    use aws_sdk_s3::error::DisplayErrorContext;
    use aws_sdk_s3::types::{
        BucketLocationConstraint, CreateBucketConfiguration, Delete, ObjectIdentifier,
    };
    use tracing::debug;

    use super::BucketLifecycle;
    use crate::error::{Error, Result};

    /// How long to wait for a bucket to appear or disappear.
    const WAIT_TIMEOUT: Duration = Duration::from_secs(120);

    /// Buckets in the default region need no location constraint.
    const DEFAULT_REGION: &str = "us-east-1";

    /// [`BucketLifecycle`] backed by Amazon S3.
    #[derive(Debug, Clone)]
    pub struct S3Buckets {
        client: aws_sdk_s3::Client,
    }

    impl S3Buckets {
        pub fn new(client: aws_sdk_s3::Client) -> Self {
            Self { client }
        }

        fn location(&self) -> Option<CreateBucketConfiguration> {
            let region = self.client.config().region()?.as_ref().to_string();
            if region == DEFAULT_REGION {
                return None;
            }
            Some(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(region.as_str()))
                    .build(),
            )
        }

        async fn empty_bucket(&self, name: &str) -> Result<()> {
            let mut pages = self
                .client
                .list_objects_v2()
                .bucket(name)
                .into_paginator()
                .send();

            while let Some(page) = pages.next().await {
                let page = page.map_err(|e| {
                    Error::Bucket(format!("listing {name}: {}", DisplayErrorContext(&e)))
                })?;

                let objects = page
                    .contents()
                    .iter()
                    .filter_map(|object| object.key())
                    .map(|key| ObjectIdentifier::builder().key(key).build())
                    .collect::<std::result::Result<Vec<_>, _>>()
                    .map_err(|e| Error::Bucket(e.to_string()))?;
                if objects.is_empty() {
                    continue;
                }

                debug!(bucket = name, count = objects.len(), "deleting objects");
                let delete = Delete::builder()
                    .set_objects(Some(objects))
                    .quiet(true)
                    .build()
                    .map_err(|e| Error::Bucket(e.to_string()))?;
                self.client
                    .delete_objects()
                    .bucket(name)
                    .delete(delete)
                    .send()
                    .await
                    .map_err(|e| {
                        Error::Bucket(format!("emptying {name}: {}", DisplayErrorContext(&e)))
                    })?;
            }
            Ok(())
        }
    }

    #[async_trait]
    impl BucketLifecycle for S3Buckets {
        async fn create_bucket(&self, name: &str) -> Result<()> {
            self.client
                .create_bucket()
                .bucket(name)
                .set_create_bucket_configuration(self.location())
                .send()
                .await
                .map_err(|e| {
                    Error::Bucket(format!("creating {name}: {}", DisplayErrorContext(&e)))
                })?;

            self.client
                .wait_until_bucket_exists()
                .bucket(name)
                .wait(WAIT_TIMEOUT)
                .await
                .map_err(|e| {
                    Error::Bucket(format!("waiting for {name}: {}", DisplayErrorContext(&e)))
                })?;
            Ok(())
        }

        async fn delete_bucket(&self, name: &str) -> Result<()> {
            self.empty_bucket(name).await?;

            self.client
                .delete_bucket()
                .bucket(name)
                .send()
                .await
                .map_err(|e| {
                    Error::Bucket(format!("deleting {name}: {}", DisplayErrorContext(&e)))
                })?;

            self.client
                .wait_until_bucket_not_exists()
                .bucket(name)
                .wait(WAIT_TIMEOUT)
                .await
                .map_err(|e| {
                    Error::Bucket(format!(
                        "waiting for {name} to go away: {}",
                        DisplayErrorContext(&e)
                    ))
                })?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::testing::RecordingBuckets;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_provision_creates_in_order() {
        let buckets = RecordingBuckets::default();
        provision(&buckets, &names(&["input-a", "output-a"]))
            .await
            .unwrap();
        assert_eq!(buckets.created(), names(&["input-a", "output-a"]));
        assert!(buckets.deleted().is_empty());
    }

    #[tokio::test]
    async fn test_provision_rolls_back_on_failure() {
        let buckets = RecordingBuckets::failing_create("output-a");
        let err = provision(&buckets, &names(&["input-a", "output-a"]))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Bucket(_)));
        assert_eq!(buckets.created(), names(&["input-a"]));
        assert_eq!(buckets.deleted(), names(&["input-a"]));
    }

    #[tokio::test]
    async fn test_cleanup_keeps_going_after_failure() {
        let buckets = RecordingBuckets::failing_delete("input-a");
        let leftover = cleanup(&buckets, &names(&["input-a", "output-a"])).await;
        assert_eq!(leftover, names(&["input-a"]));
        assert_eq!(buckets.deleted(), names(&["output-a"]));
    }
}
