//! The feature store surface and its idempotent write coordinator.
//!
//! Writes compose three backends in a strict sequence — canonical record,
//! spatial cover, metadata — with no cross-store transaction. Safety under
//! client retry comes from how each step is phrased:
//!
//! - blob writes are content-addressed (re-put is a no-op)
//! - the record write is conditional (create-only, or version-guarded)
//! - cover writes and the envelope union are idempotent
//! - the exact count/size delta is applied exactly when an insert wins its
//!   conditional create; replays re-run only the idempotent steps
//!
//! A replayed `insert` that finds a byte-identical record (minus the
//! version stamp) reports success; a replayed `update` deterministically
//! fails its version guard without touching state. Backing-store errors
//! abort the attempt and surface verbatim — the caller's retry re-enters
//! the same state machine.

use crate::config::StoreConfig;
use crate::error::{Error, Result};
use crate::feature::{
    build_record, empty_collection, feature_id, with_id, Feature, FeatureCollection,
    FeatureRecord, Payload, ATTR_VERSION,
};
use crate::index::SpatialIndex;
use crate::keys::feature_key;
use crate::metadata::{DatasetInfo, Metadata};
use futures::{StreamExt, TryStreamExt};
use geojson::feature::Id;
use meridian_core::{AttrValue, BlobStore, Condition, KeyValueStore};
use meridian_spatial::BBox;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

/// Concurrency bound for bulk fan-out (payload decodes, bulk deletes).
pub(crate) const BULK_CONCURRENCY: usize = 8;

/// Identity and version stamp of a written feature.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteResult {
    pub id: String,
    pub version: i64,
}

/// A geospatial feature store over a key-value store and a blob store.
///
/// Construct with explicit store handles and configuration; handles are
/// shared trait objects, so production and in-memory backends are
/// interchangeable.
#[derive(Debug, Clone)]
pub struct FeatureStore {
    pub(crate) kv: Arc<dyn KeyValueStore>,
    pub(crate) blobs: Arc<dyn BlobStore>,
    pub(crate) config: StoreConfig,
    pub(crate) index: SpatialIndex,
}

impl FeatureStore {
    /// Create a feature store over the given backends.
    pub fn new(kv: Arc<dyn KeyValueStore>, blobs: Arc<dyn BlobStore>, config: StoreConfig) -> Self {
        let index = SpatialIndex::new(kv.clone(), config.covering.clone());
        Self {
            kv,
            blobs,
            config,
            index,
        }
    }

    /// The metadata aggregator for a dataset.
    pub fn metadata(&self, dataset: &str) -> Metadata {
        Metadata::new(self.kv.clone(), dataset)
    }

    /// The spatial index handle.
    pub fn index(&self) -> &SpatialIndex {
        &self.index
    }

    fn now_millis() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0)
    }

    /// Idempotent create-if-absent.
    ///
    /// Requires a client-supplied id. Re-running the same call against any
    /// state a prior attempt left behind either completes the remaining
    /// steps or reports success; content that differs from the stored
    /// record surfaces as [`Error::ConcurrencyConflict`].
    pub async fn insert(&self, feature: &Feature, dataset: &str) -> Result<WriteResult> {
        let id = feature_id(feature).ok_or_else(Error::missing_id)?;
        let normalized = with_id(feature, &id);
        let mut version = Self::now_millis();
        let (record, bytes, blob_key) =
            build_record(&normalized, &id, version, dataset, &self.config)?;

        if let Some(key) = &blob_key {
            self.blobs.put_object(key, &bytes).await?;
        }

        let condition = Condition::AttributeNotExists(meridian_core::ATTR_ID.to_string());
        let created = match self.kv.put_item(record.to_item(dataset), Some(condition)).await {
            Ok(()) => true,
            Err(err) if err.is_conditional_check_failed() => {
                let existing = self
                    .kv
                    .get_item(dataset, &feature_key(&id))
                    .await?
                    .ok_or(Error::ConcurrencyConflict)?;
                let existing = FeatureRecord::from_item(&existing)?;
                if !existing.content_eq(&record) {
                    return Err(Error::ConcurrencyConflict);
                }
                // A prior attempt already created this exact record; finish
                // the idempotent steps and report its identity.
                debug!(feature = %id, dataset, "insert replay detected");
                version = existing.version;
                false
            }
            Err(err) => return Err(err.into()),
        };

        let cover = self.index.cover(&record.extent);
        self.index.write_cover(dataset, &id, &cover, &[]).await?;

        let meta = self.metadata(dataset);
        if created {
            meta.add_feature(record.size, &record.extent).await?;
        } else {
            meta.default_info().await?;
            meta.adjust_bounds(&record.extent).await?;
        }

        Ok(WriteResult { id, version })
    }

    /// Optimistic-concurrency replace.
    ///
    /// The version guard serves both true conflicts and replay detection:
    /// a successful prior attempt already advanced the version, so
    /// replaying with the old token deterministically fails.
    pub async fn update(
        &self,
        feature: &Feature,
        dataset: &str,
        expected_version: i64,
    ) -> Result<WriteResult> {
        let id = feature_id(feature).ok_or_else(Error::missing_id)?;
        let normalized = with_id(feature, &id);

        let previous = self
            .kv
            .get_item(dataset, &feature_key(&id))
            .await?
            .ok_or(Error::ConcurrencyConflict)?;
        let previous = FeatureRecord::from_item(&previous)?;

        let version = Self::now_millis().max(expected_version + 1);
        let (record, bytes, blob_key) =
            build_record(&normalized, &id, version, dataset, &self.config)?;

        if let Some(key) = &blob_key {
            self.blobs.put_object(key, &bytes).await?;
        }

        let guard = Condition::AttributeEquals(
            ATTR_VERSION.to_string(),
            AttrValue::N(expected_version as f64),
        );
        self.kv
            .put_item(record.to_item(dataset), Some(guard))
            .await
            .map_err(Error::from)?;

        let old_cover = self.index.cover(&previous.extent);
        let new_cover = self.index.cover(&record.extent);
        self.index
            .write_cover(dataset, &id, &new_cover, &old_cover)
            .await?;

        let meta = self.metadata(dataset);
        meta.default_info().await?;
        meta.update_feature(previous.size, record.size, &record.extent)
            .await?;

        // The replace committed; the superseded blob is unreachable.
        if let Payload::Blob(old_key) = &previous.payload {
            if blob_key.as_deref() != Some(old_key.as_str()) {
                if let Err(err) = self.blobs.delete_object(old_key).await {
                    warn!(feature = %id, dataset, %err, "stale blob cleanup failed");
                }
            }
        }

        Ok(WriteResult { id, version })
    }

    /// Low-level write, bypassing the coordinator's idempotency envelope.
    ///
    /// Assigns an id when the feature has none. With `expected_version`
    /// this is a conditional replace; without, an unconditional
    /// create-or-replace. Does not index — see [`Self::add_feature_indexes`].
    pub async fn put(
        &self,
        feature: &Feature,
        dataset: &str,
        expected_version: Option<i64>,
    ) -> Result<WriteResult> {
        let id = feature_id(feature).unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let normalized = with_id(feature, &id);
        let version = match expected_version {
            Some(v) => Self::now_millis().max(v + 1),
            None => Self::now_millis(),
        };
        let (record, bytes, blob_key) =
            build_record(&normalized, &id, version, dataset, &self.config)?;

        if let Some(key) = &blob_key {
            self.blobs.put_object(key, &bytes).await?;
        }

        let guard = expected_version.map(|v| {
            Condition::AttributeEquals(ATTR_VERSION.to_string(), AttrValue::N(v as f64))
        });
        self.kv
            .put_item(record.to_item(dataset), guard)
            .await
            .map_err(Error::from)?;

        let meta = self.metadata(dataset);
        meta.default_info().await?;
        meta.adjust_bounds(&record.extent).await?;

        Ok(WriteResult { id, version })
    }

    /// Fetch one feature as a collection; empty when absent.
    pub async fn get(&self, id: &str, dataset: &str) -> Result<FeatureCollection> {
        match self.kv.get_item(dataset, &feature_key(id)).await? {
            None => Ok(empty_collection()),
            Some(item) => {
                let record = FeatureRecord::from_item(&item)?;
                let feature = self.decode_record(&record).await?;
                Ok(crate::feature::collection(vec![feature]))
            }
        }
    }

    /// Delete a feature, its index rows, its blob, and its metadata
    /// contribution. Idempotent: removing a missing feature succeeds.
    pub async fn remove(&self, id: &str, dataset: &str) -> Result<()> {
        let Some(item) = self.kv.get_item(dataset, &feature_key(id)).await? else {
            return Ok(());
        };
        let record = FeatureRecord::from_item(&item)?;

        let cover = self.index.cover(&record.extent);
        self.index.delete_cover(dataset, id, &cover).await?;

        if let Payload::Blob(key) = &record.payload {
            self.blobs.delete_object(key).await?;
        }
        self.kv.delete_item(dataset, &feature_key(id)).await?;

        self.metadata(dataset).delete_feature(record.size).await
    }

    /// Write the spatial index rows for an already-stored feature.
    ///
    /// For callers on the [`Self::put`] path, which does not index.
    pub async fn add_feature_indexes(&self, id: &str, dataset: &str) -> Result<()> {
        let item = self
            .kv
            .get_item(dataset, &feature_key(id))
            .await?
            .ok_or(Error::ConcurrencyConflict)?;
        let record = FeatureRecord::from_item(&item)?;
        let cover = self.index.cover(&record.extent);
        self.index.write_cover(dataset, id, &cover, &[]).await
    }

    /// Bounding-box query: candidates from the index, exact bbox filter on
    /// stored extents, payload decode.
    pub async fn bbox_query(&self, bbox: [f64; 4], dataset: &str) -> Result<FeatureCollection> {
        let bbox = BBox::from_array(bbox).normalized();
        let candidates = self.index.candidates(dataset, &bbox).await?;
        if candidates.is_empty() {
            return Ok(empty_collection());
        }

        let keys: Vec<String> = candidates.iter().map(|id| feature_key(id)).collect();
        let items = self.kv.batch_get(dataset, &keys).await?;

        let mut matching = Vec::new();
        for item in &items {
            let record = FeatureRecord::from_item(item)?;
            if record.extent.intersects(&bbox) {
                matching.push(record);
            }
        }

        let features = futures::stream::iter(matching.iter().map(|rec| self.decode_record(rec)))
            .buffered(BULK_CONCURRENCY)
            .try_collect::<Vec<_>>()
            .await?;
        Ok(crate::feature::collection(features))
    }

    /// Features whose user-supplied secondary id (`properties.id`) matches.
    pub async fn get_by_secondary_id(
        &self,
        user_id: &str,
        dataset: &str,
    ) -> Result<FeatureCollection> {
        let items = self
            .kv
            .query_prefix(dataset, crate::keys::FEATURE_KEY_PREFIX)
            .await?;

        let mut matching = Vec::new();
        for item in &items {
            let record = FeatureRecord::from_item(item)?;
            if record.usr.as_deref() == Some(user_id) {
                matching.push(record);
            }
        }

        let features = futures::stream::iter(matching.iter().map(|rec| self.decode_record(rec)))
            .buffered(BULK_CONCURRENCY)
            .try_collect::<Vec<_>>()
            .await?;
        Ok(crate::feature::collection(features))
    }

    /// The dataset's aggregate metadata; `None` when no record exists yet.
    pub async fn get_dataset_info(&self, dataset: &str) -> Result<Option<DatasetInfo>> {
        self.metadata(dataset).get_info().await
    }

    /// Decode a record's payload back into a feature, fetching the blob
    /// when offloaded. The stored identity wins over any id in the payload.
    pub(crate) async fn decode_record(&self, record: &FeatureRecord) -> Result<Feature> {
        let bytes = match &record.payload {
            Payload::Inline(bytes) => bytes.clone(),
            Payload::Blob(key) => self.blobs.get_object(key).await?,
        };
        let mut feature: Feature = serde_json::from_slice(&bytes)?;
        feature.id = Some(Id::String(record.id.clone()));
        Ok(feature)
    }
}
