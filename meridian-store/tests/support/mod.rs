//! Shared fixtures and fault-injection backends for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use meridian_core::{
    BlobStore, Condition, Error as CoreError, Item, KeyValueStore, MemoryBlobStore, MemoryKvStore,
    Updates,
};
use meridian_store::{Feature, FeatureStore, StoreConfig};
use serde_json::json;
use std::sync::Arc;

/// A store over fresh in-memory backends, plus handles to both for
/// white-box assertions.
pub fn store() -> (FeatureStore, MemoryKvStore, MemoryBlobStore) {
    store_with_config(StoreConfig::default())
}

pub fn store_with_config(config: StoreConfig) -> (FeatureStore, MemoryKvStore, MemoryBlobStore) {
    let kv = MemoryKvStore::new();
    let blobs = MemoryBlobStore::new();
    let store = FeatureStore::new(Arc::new(kv.clone()), Arc::new(blobs.clone()), config);
    (store, kv, blobs)
}

pub fn feature(value: serde_json::Value) -> Feature {
    serde_json::from_value(value).expect("valid feature fixture")
}

/// Point feature at (0, 0), no id.
pub fn null_island() -> Feature {
    feature(json!({
        "type": "Feature",
        "geometry": { "type": "Point", "coordinates": [0.0, 0.0] },
        "properties": {}
    }))
}

/// Point feature in Washington, DC.
pub fn dc() -> Feature {
    feature(json!({
        "type": "Feature",
        "geometry": { "type": "Point", "coordinates": [-77.0366, 38.8977] },
        "properties": { "name": "dc" }
    }))
}

/// Polygon over Haiti with a user-supplied secondary id.
pub fn haiti() -> Feature {
    feature(json!({
        "type": "Feature",
        "geometry": {
            "type": "Polygon",
            "coordinates": [[
                [-73.0, 18.0], [-72.0, 18.0], [-72.0, 19.0], [-73.0, 19.0], [-73.0, 18.0]
            ]]
        },
        "properties": { "id": "haitipolygonid" }
    }))
}

/// LineString over Haiti.
pub fn haiti_line() -> Feature {
    feature(json!({
        "type": "Feature",
        "geometry": {
            "type": "LineString",
            "coordinates": [
                [-72.9, 18.1], [-72.6, 18.3], [-72.3, 18.6], [-72.1, 18.9]
            ]
        },
        "properties": {}
    }))
}

/// Census-block-sized polygon in Idaho.
pub fn idaho() -> Feature {
    feature(json!({
        "type": "Feature",
        "geometry": {
            "type": "Polygon",
            "coordinates": [[
                [-115.09, 45.72], [-114.78, 45.72], [-114.78, 45.94],
                [-115.09, 45.94], [-115.09, 45.72]
            ]]
        },
        "properties": { "GEOID": "16049960100" }
    }))
}

/// A copy of the feature carrying the given id.
pub fn with_id(feature: &Feature, id: &str) -> Feature {
    meridian_store::with_id(feature, id)
}

/// Blob store whose writes always fail.
#[derive(Debug, Clone, Default)]
pub struct FailingBlobStore;

#[async_trait]
impl BlobStore for FailingBlobStore {
    async fn put_object(&self, _key: &str, _bytes: &[u8]) -> meridian_core::Result<()> {
        Err(CoreError::io("I will never work"))
    }

    async fn get_object(&self, key: &str) -> meridian_core::Result<Vec<u8>> {
        Err(CoreError::not_found(key))
    }

    async fn delete_object(&self, _key: &str) -> meridian_core::Result<()> {
        Ok(())
    }
}

/// Key-value store wrapper that fails a chosen operation family, leaving
/// the rest delegated to a real in-memory store.
#[derive(Debug, Clone)]
pub struct FaultyKvStore {
    pub inner: MemoryKvStore,
    pub fail_puts: bool,
    pub fail_updates: bool,
}

impl FaultyKvStore {
    pub fn failing_puts(inner: MemoryKvStore) -> Self {
        Self {
            inner,
            fail_puts: true,
            fail_updates: false,
        }
    }

    pub fn failing_updates(inner: MemoryKvStore) -> Self {
        Self {
            inner,
            fail_puts: false,
            fail_updates: true,
        }
    }
}

#[async_trait]
impl KeyValueStore for FaultyKvStore {
    async fn get_item(&self, dataset: &str, key: &str) -> meridian_core::Result<Option<Item>> {
        self.inner.get_item(dataset, key).await
    }

    async fn put_item(&self, item: Item, condition: Option<Condition>) -> meridian_core::Result<()> {
        if self.fail_puts {
            return Err(CoreError::io("I will never work"));
        }
        self.inner.put_item(item, condition).await
    }

    async fn update_item(
        &self,
        dataset: &str,
        key: &str,
        updates: Updates,
        condition: Option<Condition>,
    ) -> meridian_core::Result<()> {
        if self.fail_updates {
            return Err(CoreError::io("I will never work"));
        }
        self.inner.update_item(dataset, key, updates, condition).await
    }

    async fn query_prefix(&self, dataset: &str, key_prefix: &str) -> meridian_core::Result<Vec<Item>> {
        self.inner.query_prefix(dataset, key_prefix).await
    }

    async fn batch_get(&self, dataset: &str, keys: &[String]) -> meridian_core::Result<Vec<Item>> {
        self.inner.batch_get(dataset, keys).await
    }

    async fn delete_item(&self, dataset: &str, key: &str) -> meridian_core::Result<()> {
        self.inner.delete_item(dataset, key).await
    }

    async fn scan(&self) -> meridian_core::Result<Vec<Item>> {
        self.inner.scan().await
    }
}
