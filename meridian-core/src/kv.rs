//! Sorted key-value store capability trait.
//!
//! This module defines the narrow key-value interface the feature store
//! consumes: conditional puts, atomic in-place updates, prefix range
//! queries within a dataset partition, batch gets, and a full scan for
//! catalog/debug use. The trait is runtime-agnostic and uses `async_trait`
//! for async support.
//!
//! Production backends (e.g. DynamoDB in `meridian-storage-aws`) and the
//! in-memory reference implementation below are interchangeable behind
//! this trait; components receive a handle at construction.

use crate::error::{Error, Result};
use crate::item::{item_dataset, item_id, AttrValue, Item, ATTR_DATASET, ATTR_ID};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::{Arc, RwLock};

/// Server-evaluated predicate guarding a write.
///
/// Evaluated against the item currently stored under the write's key (or
/// against "no item"). A failed condition rejects the write with
/// [`Error::ConditionalCheckFailed`].
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// The named attribute must not exist (typically: no item at this key).
    AttributeNotExists(String),
    /// The named attribute must exist.
    AttributeExists(String),
    /// The named attribute must exist and equal the given value.
    AttributeEquals(String, AttrValue),
}

/// A single attribute mutation inside an `update_item` call.
///
/// `Add`, `Min`, and `Max` are atomic at the store: concurrent
/// applications from different writers commute and never lose an update.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateAction {
    /// Set the attribute to the given value.
    Put(AttrValue),
    /// Atomically add the delta to a numeric attribute (creating it at the
    /// delta if absent).
    Add(f64),
    /// Atomically lower a numeric attribute to the given value if it is
    /// currently greater (or absent).
    Min(f64),
    /// Atomically raise a numeric attribute to the given value if it is
    /// currently smaller (or absent).
    Max(f64),
    /// Remove the attribute.
    Remove,
}

/// Attribute mutations for one `update_item` call, keyed by attribute name.
pub type Updates = BTreeMap<String, UpdateAction>;

/// Sorted key-value store keyed by `(dataset, id)`.
#[async_trait]
pub trait KeyValueStore: Debug + Send + Sync {
    /// Fetch a single item; `Ok(None)` when absent.
    async fn get_item(&self, dataset: &str, key: &str) -> Result<Option<Item>>;

    /// Write a full item, optionally guarded by a condition on current state.
    ///
    /// The item must carry `dataset` and `id` attributes.
    async fn put_item(&self, item: Item, condition: Option<Condition>) -> Result<()>;

    /// Apply attribute mutations in place, optionally guarded.
    ///
    /// An unconditional update on a missing key creates the item (upsert);
    /// guard with [`Condition::AttributeExists`] to avoid that. The update
    /// either fully applies or fails.
    async fn update_item(
        &self,
        dataset: &str,
        key: &str,
        updates: Updates,
        condition: Option<Condition>,
    ) -> Result<()>;

    /// All items in the dataset partition whose key starts with the prefix,
    /// in key order. An empty prefix returns the whole partition.
    async fn query_prefix(&self, dataset: &str, key_prefix: &str) -> Result<Vec<Item>>;

    /// Fetch many items by key; missing keys are silently absent from the
    /// result.
    async fn batch_get(&self, dataset: &str, keys: &[String]) -> Result<Vec<Item>>;

    /// Delete an item. Idempotent: deleting a missing key succeeds.
    async fn delete_item(&self, dataset: &str, key: &str) -> Result<()>;

    /// Every item in the store, across all datasets.
    ///
    /// # Warning
    ///
    /// Full-table scan; intended for catalog enumeration, dumps, and tests,
    /// not the query path.
    async fn scan(&self) -> Result<Vec<Item>>;
}

fn check_condition(condition: &Condition, current: Option<&Item>) -> Result<()> {
    let holds = match condition {
        Condition::AttributeNotExists(name) => {
            current.map_or(true, |item| !item.contains_key(name))
        }
        Condition::AttributeExists(name) => current.is_some_and(|item| item.contains_key(name)),
        Condition::AttributeEquals(name, expected) => {
            current.and_then(|item| item.get(name)) == Some(expected)
        }
    };
    if holds {
        Ok(())
    } else {
        Err(Error::ConditionalCheckFailed)
    }
}

fn require_keyed(item: &Item) -> Result<(String, String)> {
    let dataset = item_dataset(item)
        .ok_or_else(|| Error::invalid_item("item has no dataset attribute"))?;
    let id = item_id(item).ok_or_else(|| Error::invalid_item("item has no id attribute"))?;
    Ok((dataset.to_string(), id.to_string()))
}

// ============================================================================
// MemoryKvStore Implementation
// ============================================================================

/// In-memory key-value store with full condition/atomic-action semantics.
///
/// Backs every integration test and doubles as an embedded backend. Interior
/// mutability (`Arc<RwLock<..>>`) keeps handles cheaply cloneable, matching
/// how production store clients are shared.
#[derive(Debug, Clone, Default)]
pub struct MemoryKvStore {
    data: Arc<RwLock<BTreeMap<(String, String), Item>>>,
}

impl MemoryKvStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored items (test helper).
    pub fn len(&self) -> usize {
        self.data.read().expect("RwLock poisoned").len()
    }

    /// True when the store holds no items.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn apply_updates(item: &mut Item, updates: Updates) {
    for (name, action) in updates {
        match action {
            UpdateAction::Put(value) => {
                item.insert(name, value);
            }
            UpdateAction::Add(delta) => {
                let current = item.get(&name).and_then(AttrValue::as_n).unwrap_or(0.0);
                item.insert(name, AttrValue::N(current + delta));
            }
            UpdateAction::Min(value) => {
                let next = match item.get(&name).and_then(AttrValue::as_n) {
                    Some(current) => current.min(value),
                    None => value,
                };
                item.insert(name, AttrValue::N(next));
            }
            UpdateAction::Max(value) => {
                let next = match item.get(&name).and_then(AttrValue::as_n) {
                    Some(current) => current.max(value),
                    None => value,
                };
                item.insert(name, AttrValue::N(next));
            }
            UpdateAction::Remove => {
                item.remove(&name);
            }
        }
    }
}

#[async_trait]
impl KeyValueStore for MemoryKvStore {
    async fn get_item(&self, dataset: &str, key: &str) -> Result<Option<Item>> {
        Ok(self
            .data
            .read()
            .expect("RwLock poisoned")
            .get(&(dataset.to_string(), key.to_string()))
            .cloned())
    }

    async fn put_item(&self, item: Item, condition: Option<Condition>) -> Result<()> {
        let (dataset, id) = require_keyed(&item)?;
        let mut data = self.data.write().expect("RwLock poisoned");
        let slot = (dataset, id);
        if let Some(condition) = &condition {
            check_condition(condition, data.get(&slot))?;
        }
        data.insert(slot, item);
        Ok(())
    }

    async fn update_item(
        &self,
        dataset: &str,
        key: &str,
        updates: Updates,
        condition: Option<Condition>,
    ) -> Result<()> {
        let mut data = self.data.write().expect("RwLock poisoned");
        let slot = (dataset.to_string(), key.to_string());
        if let Some(condition) = &condition {
            check_condition(condition, data.get(&slot))?;
        }
        let item = data.entry(slot).or_insert_with(|| {
            let mut fresh = Item::new();
            fresh.insert(ATTR_DATASET.to_string(), AttrValue::S(dataset.to_string()));
            fresh.insert(ATTR_ID.to_string(), AttrValue::S(key.to_string()));
            fresh
        });
        apply_updates(item, updates);
        Ok(())
    }

    async fn query_prefix(&self, dataset: &str, key_prefix: &str) -> Result<Vec<Item>> {
        let data = self.data.read().expect("RwLock poisoned");
        Ok(data
            .iter()
            .filter(|((ds, id), _)| ds == dataset && id.starts_with(key_prefix))
            .map(|(_, item)| item.clone())
            .collect())
    }

    async fn batch_get(&self, dataset: &str, keys: &[String]) -> Result<Vec<Item>> {
        let data = self.data.read().expect("RwLock poisoned");
        Ok(keys
            .iter()
            .filter_map(|key| data.get(&(dataset.to_string(), key.clone())).cloned())
            .collect())
    }

    async fn delete_item(&self, dataset: &str, key: &str) -> Result<()> {
        // Idempotent: ok even if not found
        self.data
            .write()
            .expect("RwLock poisoned")
            .remove(&(dataset.to_string(), key.to_string()));
        Ok(())
    }

    async fn scan(&self) -> Result<Vec<Item>> {
        let data = self.data.read().expect("RwLock poisoned");
        Ok(data.values().cloned().collect())
    }
}

// ============================================================================
// Tests
// ============================================================================
