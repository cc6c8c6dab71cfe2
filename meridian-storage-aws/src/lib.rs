//! AWS storage backends for the Meridian feature store
//!
//! This crate provides the production implementations of the two backing
//! stores the feature store consumes:
//!
//! - **DynamoDB key-value store** (`dynamodb` feature): one table keyed
//!   `(dataset, id)` with conditional writes, atomic adds, and
//!   floor/ceiling updates for the monotonic envelope
//! - **S3 blob store** (`s3` feature): offloaded feature payloads
//!
//! ## Usage
//!
//! ```ignore
//! use meridian_storage_aws::dynamodb::{DynamoConfig, DynamoKvStore};
//! use meridian_storage_aws::s3::{S3BlobStore, S3Config};
//! use meridian_store::{FeatureStore, StoreConfig};
//! use std::sync::Arc;
//!
//! let sdk_config = aws_config::load_defaults(BehaviorVersion::latest()).await;
//!
//! let kv = DynamoKvStore::new(&sdk_config, DynamoConfig {
//!     table_name: "geo".to_string(),
//!     region: None,
//!     endpoint: None,
//!     timeout_ms: Some(30000),
//! }).await?;
//!
//! let blobs = S3BlobStore::new(&sdk_config, S3Config {
//!     bucket: "geo-payloads".to_string(),
//!     prefix: Some("features".to_string()),
//!     ..Default::default()
//! }).await?;
//!
//! let store = FeatureStore::new(Arc::new(kv), Arc::new(blobs), StoreConfig::default());
//! ```

pub mod error;

#[cfg(feature = "s3")]
pub mod s3;

#[cfg(feature = "dynamodb")]
pub mod dynamodb;

// Re-export main types
pub use error::{AwsStorageError, Result};

#[cfg(feature = "s3")]
pub use s3::{S3BlobStore, S3Config};

#[cfg(feature = "dynamodb")]
pub use dynamodb::{DynamoConfig, DynamoKvStore};

// Re-export core traits for convenience
pub use meridian_core::{BlobStore, KeyValueStore};
