//! S3 implementation of the blob store capability trait.
//!
//! Provides `S3BlobStore` for offloaded feature payloads. Keys are the
//! opaque paths the feature store hands down (already content-addressed),
//! optionally nested under a bucket-level prefix.

use crate::error::{AwsStorageError, Result};
use async_trait::async_trait;
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use aws_smithy_types::timeout::TimeoutConfig;
use meridian_core::BlobStore;
use std::fmt::Debug;
use std::time::Duration;

/// S3 blob store configuration
#[derive(Debug, Clone, Default)]
pub struct S3Config {
    /// S3 bucket name
    pub bucket: String,
    /// Optional key prefix
    pub prefix: Option<String>,
    /// Optional endpoint override (e.g. LocalStack/MinIO)
    pub endpoint: Option<String>,
    /// Operation timeout in milliseconds (optional)
    pub timeout_ms: Option<u64>,
}

/// S3-backed blob store
#[derive(Clone)]
pub struct S3BlobStore {
    client: Client,
    bucket: String,
    prefix: Option<String>,
}

impl Debug for S3BlobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3BlobStore")
            .field("bucket", &self.bucket)
            .field("prefix", &self.prefix)
            .finish()
    }
}

impl S3BlobStore {
    /// Create a new S3 blob store
    pub async fn new(sdk_config: &aws_config::SdkConfig, config: S3Config) -> Result<Self> {
        if sdk_config.region().is_none() {
            return Err(AwsStorageError::MissingRegion);
        }
        if config.bucket.is_empty() {
            return Err(AwsStorageError::invalid_config("bucket is required"));
        }

        let mut builder = aws_sdk_s3::config::Builder::from(sdk_config);
        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }
        if let Some(timeout_ms) = config.timeout_ms {
            let timeout_config = TimeoutConfig::builder()
                .operation_timeout(Duration::from_millis(timeout_ms))
                .build();
            builder = builder.timeout_config(timeout_config);
        }

        Ok(Self {
            client: Client::from_conf(builder.build()),
            bucket: config.bucket,
            prefix: config.prefix,
        })
    }

    /// Create from a pre-built client (for testing)
    pub fn from_client(client: Client, bucket: String, prefix: Option<String>) -> Self {
        Self {
            client,
            bucket,
            prefix,
        }
    }

    /// Get the bucket name
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    fn object_key(&self, key: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{prefix}/{key}"),
            None => key.to_string(),
        }
    }

    fn is_no_such_key(err: &SdkError<GetObjectError>) -> bool {
        match err {
            SdkError::ServiceError(service_err) => {
                matches!(service_err.err(), GetObjectError::NoSuchKey(_))
            }
            _ => false,
        }
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn put_object(&self, key: &str, bytes: &[u8]) -> meridian_core::Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(self.object_key(key))
            .body(ByteStream::from(bytes.to_vec()))
            .send()
            .await
            .map_err(|e| AwsStorageError::s3(format!("PutObject failed: {e}")))?;
        Ok(())
    }

    async fn get_object(&self, key: &str) -> meridian_core::Result<Vec<u8>> {
        let response = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(self.object_key(key))
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) if Self::is_no_such_key(&e) => {
                return Err(AwsStorageError::not_found(key).into());
            }
            Err(e) => {
                return Err(AwsStorageError::s3(format!("GetObject failed: {e}")).into());
            }
        };

        let bytes = response
            .body
            .collect()
            .await
            .map_err(|e| AwsStorageError::io(format!("GetObject body read failed: {e}")))?;
        Ok(bytes.into_bytes().to_vec())
    }

    async fn delete_object(&self, key: &str) -> meridian_core::Result<()> {
        // Idempotent: S3 deletes of missing keys succeed.
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(self.object_key(key))
            .send()
            .await
            .map_err(|e| AwsStorageError::s3(format!("DeleteObject failed: {e}")))?;
        Ok(())
    }
}
