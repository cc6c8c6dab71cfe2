//! Geospatial feature store over a sorted key-value store and a blob store.
//!
//! Meridian persists arbitrary GeoJSON features under named datasets,
//! maintains a multi-resolution spatial index for bounding-box queries,
//! and keeps per-dataset aggregate metadata (feature count, byte size,
//! bounding envelope). Everything hangs off [`FeatureStore`]:
//!
//! ```ignore
//! use meridian_store::{FeatureStore, StoreConfig};
//! use meridian_core::{MemoryBlobStore, MemoryKvStore};
//! use std::sync::Arc;
//!
//! let store = FeatureStore::new(
//!     Arc::new(MemoryKvStore::new()),
//!     Arc::new(MemoryBlobStore::new()),
//!     StoreConfig::default(),
//! );
//! let written = store.insert(&feature, "default").await?;
//! let found = store.bbox_query([-10.0, -10.0, 10.0, 10.0], "default").await?;
//! ```
//!
//! # Architecture
//!
//! - [`feature`]: feature model, record encoding, blob offload
//! - [`index`]: spatial index reader/writer (cover math in `meridian-spatial`)
//! - [`metadata`]: per-dataset aggregates — atomic count/size deltas and a
//!   monotonic bounding envelope
//! - [`store`]: the public surface and the idempotent write coordinator
//! - [`catalog`]: dataset enumeration, bulk delete, dumps
//!
//! There is no in-process locking and no cross-store transaction:
//! correctness under concurrency rests on the key-value store's
//! conditional and atomic primitives, and write operations are designed
//! to be safely replayed by clients after unknown-outcome failures.

pub mod catalog;
pub mod config;
pub mod error;
pub mod feature;
pub mod index;
pub mod keys;
pub mod metadata;
pub mod store;

pub use config::StoreConfig;
pub use error::{Error, Result};
pub use feature::{
    collection, empty_collection, encode, extent, feature_id, secondary_id, with_id,
    FeatureRecord, Payload,
};
pub use index::SpatialIndex;
pub use metadata::{DatasetInfo, Metadata};
pub use store::{FeatureStore, WriteResult};

// Re-export the pieces callers wire together.
pub use geojson::{Feature, FeatureCollection};
pub use meridian_core::{
    AttrValue, BlobStore, Item, KeyValueStore, MemoryBlobStore, MemoryKvStore,
};
pub use meridian_spatial::{BBox, CoveringConfig};
