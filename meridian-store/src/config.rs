//! Feature store configuration.

use meridian_spatial::CoveringConfig;
use serde::{Deserialize, Serialize};

/// Configuration for a [`crate::FeatureStore`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Covering grid configuration used for the spatial index.
    pub covering: CoveringConfig,

    /// Serialized payloads larger than this many bytes are offloaded to
    /// the blob store instead of stored inline.
    /// Default: 64 KiB
    pub blob_threshold: usize,

    /// Key prefix for offloaded payloads in the blob store.
    pub blob_prefix: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            covering: CoveringConfig::default(),
            blob_threshold: 64 * 1024,
            blob_prefix: "meridian".to_string(),
        }
    }
}

impl StoreConfig {
    /// Set the covering grid configuration.
    pub fn with_covering(mut self, covering: CoveringConfig) -> Self {
        self.covering = covering;
        self
    }

    /// Set the blob offload threshold in bytes.
    pub fn with_blob_threshold(mut self, threshold: usize) -> Self {
        self.blob_threshold = threshold;
        self
    }

    /// Set the blob key prefix.
    pub fn with_blob_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.blob_prefix = prefix.into();
        self
    }
}
