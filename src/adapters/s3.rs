//! S3 Object Adapter
//!
//! Implements the `ObjectBackend` port on an S3 bucket. A custom endpoint
//! switches to path-style addressing so S3-compatible stores (MinIO, Ceph
//! RGW) work unchanged.
//!
//! A missing object (`NoSuchKey`) is an absence. Everything else the SDK
//! reports is a fault carrying the SDK's error context.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{BucketLocationConstraint, CreateBucketConfiguration};
use aws_sdk_s3::Client;
use bytes::Bytes;
use tracing::{debug, info};

use crate::domain::ObjectBackend;
use crate::error::{Error, Result};

/// Region that rejects an explicit location constraint
const DEFAULT_AWS_REGION: &str = "us-east-1";

/// S3 connection settings
#[derive(Debug, Clone)]
pub struct S3Config {
    /// Bucket holding the durable entries
    pub bucket: String,
    /// Bucket region
    pub region: String,
    /// Custom endpoint for S3-compatible stores
    pub endpoint: Option<String>,
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            bucket: "readthrough-store".to_string(),
            region: "ap-southeast-2".to_string(),
            endpoint: None,
        }
    }
}

/// Result of bucket provisioning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketProvisioning {
    Created,
    AlreadyExists,
}

/// S3-backed object adapter
#[derive(Clone)]
pub struct S3ObjectBackend {
    client: Client,
    bucket: String,
    region: String,
}

impl S3ObjectBackend {
    /// Build a client from the ambient AWS configuration (env, profile, IMDS)
    pub async fn from_env(config: &S3Config) -> Self {
        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .load()
            .await;

        let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config);
        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        Self::new(
            Client::from_conf(builder.build()),
            config.bucket.clone(),
            config.region.clone(),
        )
    }

    /// Wrap an existing client
    pub fn new(client: Client, bucket: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            region: region.into(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Create the bucket unless it already exists.
    ///
    /// "Already exists" and "already owned by you" are both success.
    pub async fn ensure_bucket(&self) -> Result<BucketProvisioning> {
        let mut request = self.client.create_bucket().bucket(&self.bucket);
        if let Some(constraint) = location_constraint(&self.region) {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(constraint)
                    .build(),
            );
        }

        match request.send().await {
            Ok(_) => {
                info!("Successfully created bucket: {}", self.bucket);
                Ok(BucketProvisioning::Created)
            }
            Err(err)
                if err.as_service_error().is_some_and(|e| {
                    e.is_bucket_already_owned_by_you() || e.is_bucket_already_exists()
                }) =>
            {
                info!("Bucket {} already exists", self.bucket);
                Ok(BucketProvisioning::AlreadyExists)
            }
            Err(err) => Err(Error::ObjectStore(format!(
                "Could not create bucket {}: {}",
                self.bucket,
                DisplayErrorContext(&err)
            ))),
        }
    }
}

impl std::fmt::Debug for S3ObjectBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3ObjectBackend")
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .finish()
    }
}

/// Location constraint for `region`; none for the default AWS region.
fn location_constraint(region: &str) -> Option<BucketLocationConstraint> {
    if region.is_empty() || region == DEFAULT_AWS_REGION {
        None
    } else {
        Some(BucketLocationConstraint::from(region))
    }
}

#[async_trait]
impl ObjectBackend for S3ObjectBackend {
    async fn get_object(&self, key: &str) -> Result<Option<Bytes>> {
        let output = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(output) => output,
            Err(err) if err.as_service_error().is_some_and(|e| e.is_no_such_key()) => {
                debug!(bucket = %self.bucket, key = %key, "Could not find object in S3");
                return Ok(None);
            }
            Err(err) => {
                return Err(Error::ObjectStore(format!(
                    "Could not read s3://{}/{}: {}",
                    self.bucket,
                    key,
                    DisplayErrorContext(&err)
                )))
            }
        };

        let body = output.body.collect().await.map_err(|e| {
            Error::ObjectStore(format!(
                "Could not read body of s3://{}/{}: {}",
                self.bucket, key, e
            ))
        })?;

        Ok(Some(body.into_bytes()))
    }

    async fn put_object(&self, key: &str, body: Bytes) -> Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type("application/json")
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|err| {
                Error::ObjectStore(format!(
                    "Could not write s3://{}/{}: {}",
                    self.bucket,
                    key,
                    DisplayErrorContext(&err)
                ))
            })?;

        debug!("Successfully uploaded data to {}/{}", self.bucket, key);
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map(|_| ())
            .map_err(|err| {
                Error::ObjectStore(format!(
                    "Bucket {} unreachable: {}",
                    self.bucket,
                    DisplayErrorContext(&err)
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use aws_sdk_s3::config::retry::RetryConfig;
    use aws_sdk_s3::config::Credentials;

    fn unreachable_backend() -> S3ObjectBackend {
        let config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .endpoint_url("http://127.0.0.1:1")
            .force_path_style(true)
            .retry_config(RetryConfig::disabled())
            .credentials_provider(Credentials::new("test", "test", None, None, "static"))
            .build();
        S3ObjectBackend::new(Client::from_conf(config), "bucket", "us-east-1")
    }

    #[test]
    fn test_location_constraint() {
        assert!(location_constraint("us-east-1").is_none());
        assert!(location_constraint("").is_none());
        assert_eq!(
            location_constraint("ap-southeast-2"),
            Some(BucketLocationConstraint::ApSoutheast2)
        );
    }

    #[test]
    fn test_default_config() {
        let config = S3Config::default();
        assert_eq!(config.region, "ap-southeast-2");
        assert!(config.endpoint.is_none());
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_a_fault_not_absence() {
        let backend = unreachable_backend();
        assert_matches!(
            backend.get_object("wikipedia-Rust").await,
            Err(Error::ObjectStore(msg)) if msg.contains("s3://bucket/wikipedia-Rust")
        );
        assert!(backend.ping().await.is_err());
    }
}
