//! Dataset catalog: enumeration, bulk listing, bulk delete, dumps.
//!
//! Thin plumbing over the key-value store's range and scan operations;
//! none of it participates in the write coordinator's guarantees.

use crate::error::Result;
use crate::feature::{collection, FeatureCollection, FeatureRecord, ATTR_BLOB};
use crate::keys::FEATURE_KEY_PREFIX;
use crate::store::{FeatureStore, BULK_CONCURRENCY};
use futures::{StreamExt, TryStreamExt};
use meridian_core::{item_dataset, item_id, AttrValue, Item};
use std::collections::BTreeSet;

impl FeatureStore {
    /// All row keys in a dataset, in sort order (features, index rows, and
    /// the metadata record alike).
    pub async fn list_ids(&self, dataset: &str) -> Result<Vec<String>> {
        let items = self.kv.query_prefix(dataset, "").await?;
        Ok(items
            .iter()
            .filter_map(|item| item_id(item).map(String::from))
            .collect())
    }

    /// Every dataset with at least one row, sorted.
    pub async fn list_datasets(&self) -> Result<Vec<String>> {
        let items = self.kv.scan().await?;
        let datasets: BTreeSet<String> = items
            .iter()
            .filter_map(|item| item_dataset(item).map(String::from))
            .collect();
        Ok(datasets.into_iter().collect())
    }

    /// Delete every row of a dataset — features, index rows, metadata —
    /// and any offloaded payloads they reference.
    ///
    /// Per-row deletes are independently retryable and run with bounded
    /// concurrency; this is not a transaction.
    pub async fn del_dataset(&self, dataset: &str) -> Result<()> {
        let items = self.kv.query_prefix(dataset, "").await?;
        futures::stream::iter(items.into_iter().map(|item| self.delete_row(dataset, item)))
            .buffer_unordered(BULK_CONCURRENCY)
            .try_collect::<Vec<_>>()
            .await?;
        Ok(())
    }

    async fn delete_row(&self, dataset: &str, item: Item) -> Result<()> {
        if let Some(blob_key) = item.get(ATTR_BLOB).and_then(AttrValue::as_s) {
            self.blobs.delete_object(blob_key).await?;
        }
        if let Some(key) = item_id(&item) {
            self.kv.delete_item(dataset, key).await?;
        }
        Ok(())
    }

    /// Every raw row in the store, across all datasets.
    pub async fn dump(&self) -> Result<Vec<Item>> {
        Ok(self.kv.scan().await?)
    }

    /// Every stored feature, across all datasets, as a collection.
    pub async fn dump_geojson(&self) -> Result<FeatureCollection> {
        let items = self.kv.scan().await?;
        let records: Vec<FeatureRecord> = items
            .iter()
            .filter(|item| {
                item_id(item).is_some_and(|key| key.starts_with(FEATURE_KEY_PREFIX))
            })
            .map(FeatureRecord::from_item)
            .collect::<Result<_>>()?;

        let features = futures::stream::iter(records.iter().map(|rec| self.decode_record(rec)))
            .buffered(BULK_CONCURRENCY)
            .try_collect::<Vec<_>>()
            .await?;
        Ok(collection(features))
    }
}
