//! Spatial index reader/writer.
//!
//! Index rows are bare keys (`cell!{level}!{path}!{featureId}`); their
//! presence is the whole assertion "this feature's bbox overlaps this cell".
//! Writes are unconditional puts and deletes are idempotent, so replacing
//! a cover is safe to re-run against state left by a half-completed prior
//! attempt. Row writes for one feature are independent and issued in
//! parallel.

use crate::error::Result;
use meridian_core::{AttrValue, Item, KeyValueStore, ATTR_DATASET, ATTR_ID};
use meridian_spatial::{
    compute_cover, feature_id_from_index_key, scan_prefixes, BBox, Cell, CoveringConfig,
};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Spatial index over one key-value store.
#[derive(Debug, Clone)]
pub struct SpatialIndex {
    kv: Arc<dyn KeyValueStore>,
    config: CoveringConfig,
}

impl SpatialIndex {
    /// Create an index over the given store.
    pub fn new(kv: Arc<dyn KeyValueStore>, config: CoveringConfig) -> Self {
        Self { kv, config }
    }

    /// The covering set for a feature extent under this index's config.
    pub fn cover(&self, extent: &BBox) -> Vec<Cell> {
        compute_cover(extent, &self.config)
    }

    /// Replace a feature's index rows: delete `previous \ cover`, insert
    /// `cover \ previous`. Idempotent — inserting an existing row or
    /// deleting an absent one is a no-op.
    pub async fn write_cover(
        &self,
        dataset: &str,
        feature_id: &str,
        cover: &[Cell],
        previous: &[Cell],
    ) -> Result<()> {
        let next: BTreeSet<String> = cover.iter().map(|c| c.index_key(feature_id)).collect();
        let prior: BTreeSet<String> = previous.iter().map(|c| c.index_key(feature_id)).collect();

        let deletes = prior.difference(&next).map(|key| {
            let kv = self.kv.clone();
            let dataset = dataset.to_string();
            let key = key.clone();
            async move { kv.delete_item(&dataset, &key).await }
        });
        futures::future::try_join_all(deletes).await?;

        let puts = next.difference(&prior).map(|key| {
            let kv = self.kv.clone();
            let mut item = Item::new();
            item.insert(ATTR_DATASET.to_string(), AttrValue::from(dataset));
            item.insert(ATTR_ID.to_string(), AttrValue::S(key.clone()));
            async move { kv.put_item(item, None).await }
        });
        futures::future::try_join_all(puts).await?;
        Ok(())
    }

    /// Delete all of a feature's rows for the given cover.
    pub async fn delete_cover(
        &self,
        dataset: &str,
        feature_id: &str,
        cover: &[Cell],
    ) -> Result<()> {
        self.write_cover(dataset, feature_id, &[], cover).await
    }

    /// Candidate feature ids for a bbox query.
    ///
    /// Issues one prefix range scan per plan entry and unions the ids.
    /// Candidates may be false positives — cell overlap is coarser than
    /// bbox intersection — and must go through the exact filter.
    pub async fn candidates(&self, dataset: &str, bbox: &BBox) -> Result<Vec<String>> {
        let scans = scan_prefixes(bbox, &self.config).into_iter().map(|prefix| {
            let kv = self.kv.clone();
            let dataset = dataset.to_string();
            async move { kv.query_prefix(&dataset, &prefix).await }
        });
        let pages = futures::future::try_join_all(scans).await?;

        let mut ids = BTreeSet::new();
        for item in pages.into_iter().flatten() {
            if let Some(id) = meridian_core::item_id(&item).and_then(feature_id_from_index_key) {
                ids.insert(id.to_string());
            }
        }
        Ok(ids.into_iter().collect())
    }
}
