//! Per-dataset aggregate metadata.
//!
//! One record per dataset (`metadata!{dataset}`) carries an exact feature
//! count, an exact byte-size total, and a conservative bounding envelope.
//! `count`/`size` move both ways via atomic adds; the envelope only ever
//! grows (min of wests, max of easts) and is never recomputed from scratch,
//! so after deletes or shrinking updates it may exceed the true extent.
//!
//! Every adjust operation is guarded on the record existing and treats a
//! failed guard as a silent no-op: metadata bookkeeping never blocks the
//! primary write path, and a retried write can replay its bookkeeping
//! against whatever state the previous attempt left.

use crate::error::Result;
use crate::keys::metadata_key;
use meridian_core::{
    AttrValue, Condition, Item, KeyValueStore, UpdateAction, Updates, ATTR_ID,
};
use meridian_spatial::BBox;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Feature count attribute.
pub const ATTR_COUNT: &str = "count";
/// Byte-size total attribute.
pub const ATTR_SIZE: &str = "size";
/// Envelope attributes.
pub const ATTR_WEST: &str = "west";
pub const ATTR_SOUTH: &str = "south";
pub const ATTR_EAST: &str = "east";
pub const ATTR_NORTH: &str = "north";

// Maximally-exclusive envelope sentinels: in range for the store's number
// type, narrower than any real extent, so the first union replaces all four.
const EMPTY_WEST: f64 = 180.0;
const EMPTY_SOUTH: f64 = 90.0;
const EMPTY_EAST: f64 = -180.0;
const EMPTY_NORTH: f64 = -90.0;

/// A dataset's aggregate metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetInfo {
    pub dataset: String,
    pub count: i64,
    pub size: i64,
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl DatasetInfo {
    /// Decode from a stored metadata item; missing attributes read as the
    /// zeroed defaults.
    pub fn from_item(dataset: &str, item: &Item) -> Self {
        let number = |name: &str, default: f64| -> f64 {
            item.get(name).and_then(AttrValue::as_n).unwrap_or(default)
        };
        Self {
            dataset: dataset.to_string(),
            count: number(ATTR_COUNT, 0.0) as i64,
            size: number(ATTR_SIZE, 0.0) as i64,
            west: number(ATTR_WEST, EMPTY_WEST),
            south: number(ATTR_SOUTH, EMPTY_SOUTH),
            east: number(ATTR_EAST, EMPTY_EAST),
            north: number(ATTR_NORTH, EMPTY_NORTH),
        }
    }
}

/// Metadata aggregator for one dataset.
#[derive(Debug, Clone)]
pub struct Metadata {
    kv: Arc<dyn KeyValueStore>,
    dataset: String,
}

impl Metadata {
    /// Create an aggregator over the given store and dataset.
    pub fn new(kv: Arc<dyn KeyValueStore>, dataset: impl Into<String>) -> Self {
        Self {
            kv,
            dataset: dataset.into(),
        }
    }

    /// The metadata record's row key.
    pub fn record_key(&self) -> String {
        metadata_key(&self.dataset)
    }

    /// Fetch the dataset's metadata; `None` (not an error) when no record
    /// exists yet.
    pub async fn get_info(&self) -> Result<Option<DatasetInfo>> {
        let item = self.kv.get_item(&self.dataset, &self.record_key()).await?;
        Ok(item.map(|item| DatasetInfo::from_item(&self.dataset, &item)))
    }

    /// Conditionally create the zeroed record. Returns whether it actually
    /// created one; finding an existing record is not an error.
    pub async fn default_info(&self) -> Result<bool> {
        let mut item = Item::new();
        item.insert(
            meridian_core::ATTR_DATASET.to_string(),
            AttrValue::S(self.dataset.clone()),
        );
        item.insert(ATTR_ID.to_string(), AttrValue::S(self.record_key()));
        item.insert(ATTR_COUNT.to_string(), AttrValue::N(0.0));
        item.insert(ATTR_SIZE.to_string(), AttrValue::N(0.0));
        item.insert(ATTR_WEST.to_string(), AttrValue::N(EMPTY_WEST));
        item.insert(ATTR_SOUTH.to_string(), AttrValue::N(EMPTY_SOUTH));
        item.insert(ATTR_EAST.to_string(), AttrValue::N(EMPTY_EAST));
        item.insert(ATTR_NORTH.to_string(), AttrValue::N(EMPTY_NORTH));

        let condition = Condition::AttributeNotExists(ATTR_ID.to_string());
        match self.kv.put_item(item, Some(condition)).await {
            Ok(()) => Ok(true),
            Err(err) if err.is_conditional_check_failed() => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    /// Atomically apply signed deltas to `count` and `size`.
    ///
    /// No-op if the record does not exist; atomic adds at the store keep
    /// concurrent adjustments from losing updates.
    pub async fn adjust_properties(&self, count_delta: i64, size_delta: i64) -> Result<()> {
        let mut updates = Updates::new();
        if count_delta != 0 {
            updates.insert(ATTR_COUNT.to_string(), UpdateAction::Add(count_delta as f64));
        }
        if size_delta != 0 {
            updates.insert(ATTR_SIZE.to_string(), UpdateAction::Add(size_delta as f64));
        }
        if updates.is_empty() {
            return Ok(());
        }
        self.guarded_update(updates).await
    }

    /// Atomically widen the envelope to cover the given bbox.
    ///
    /// No-op if the record does not exist. Each component moves only in
    /// the widening direction, so concurrent applications commute.
    pub async fn adjust_bounds(&self, bbox: &BBox) -> Result<()> {
        let mut updates = Updates::new();
        updates.insert(ATTR_WEST.to_string(), UpdateAction::Min(bbox.west));
        updates.insert(ATTR_SOUTH.to_string(), UpdateAction::Min(bbox.south));
        updates.insert(ATTR_EAST.to_string(), UpdateAction::Max(bbox.east));
        updates.insert(ATTR_NORTH.to_string(), UpdateAction::Max(bbox.north));
        self.guarded_update(updates).await
    }

    /// Bookkeeping for a newly created feature: create the record if
    /// absent, count it, and widen the envelope.
    pub async fn add_feature(&self, size: i64, extent: &BBox) -> Result<()> {
        self.default_info().await?;
        self.adjust_properties(1, size).await?;
        self.adjust_bounds(extent).await
    }

    /// Bookkeeping for a replaced feature: size delta plus envelope union.
    ///
    /// The count is untouched (the feature already existed) and the
    /// envelope never shrinks, even when the edit is smaller.
    pub async fn update_feature(
        &self,
        original_size: i64,
        edited_size: i64,
        edited_extent: &BBox,
    ) -> Result<()> {
        self.adjust_properties(0, edited_size - original_size).await?;
        self.adjust_bounds(edited_extent).await
    }

    /// Bookkeeping for a removed feature. The envelope is left untouched.
    pub async fn delete_feature(&self, size: i64) -> Result<()> {
        self.adjust_properties(-1, -size).await
    }

    /// Apply updates guarded on the record existing; a failed guard is the
    /// expected missing-record case and is absorbed as a no-op.
    async fn guarded_update(&self, updates: Updates) -> Result<()> {
        let condition = Condition::AttributeExists(ATTR_ID.to_string());
        match self
            .kv
            .update_item(&self.dataset, &self.record_key(), updates, Some(condition))
            .await
        {
            Ok(()) => Ok(()),
            Err(err) if err.is_conditional_check_failed() => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}
