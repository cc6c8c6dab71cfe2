//! Attribute-map item model for the sorted key-value store.
//!
//! Items are flat maps of named attributes. The model is deliberately the
//! narrow subset of a document-store attribute system this crate's consumers
//! need: strings, numbers, and binary payloads. Every persisted item carries
//! a `dataset` partition attribute and an `id` sort attribute.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Partition attribute present on every item.
pub const ATTR_DATASET: &str = "dataset";

/// Sort-key attribute present on every item.
pub const ATTR_ID: &str = "id";

/// A single attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttrValue {
    /// UTF-8 string
    S(String),
    /// Number (integers and floats share one representation, as in the
    /// backing stores this models)
    N(f64),
    /// Raw bytes
    B(Vec<u8>),
}

impl AttrValue {
    /// String accessor; `None` for non-string values.
    pub fn as_s(&self) -> Option<&str> {
        match self {
            AttrValue::S(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric accessor; `None` for non-numeric values.
    pub fn as_n(&self) -> Option<f64> {
        match self {
            AttrValue::N(n) => Some(*n),
            _ => None,
        }
    }

    /// Binary accessor; `None` for non-binary values.
    pub fn as_b(&self) -> Option<&[u8]> {
        match self {
            AttrValue::B(b) => Some(b),
            _ => None,
        }
    }
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        AttrValue::S(s.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(s: String) -> Self {
        AttrValue::S(s)
    }
}

impl From<f64> for AttrValue {
    fn from(n: f64) -> Self {
        AttrValue::N(n)
    }
}

impl From<i64> for AttrValue {
    fn from(n: i64) -> Self {
        AttrValue::N(n as f64)
    }
}

impl From<Vec<u8>> for AttrValue {
    fn from(b: Vec<u8>) -> Self {
        AttrValue::B(b)
    }
}

/// A stored item: named attributes in sorted order.
pub type Item = BTreeMap<String, AttrValue>;

/// Read the sort-key attribute of an item.
pub fn item_id(item: &Item) -> Option<&str> {
    item.get(ATTR_ID).and_then(AttrValue::as_s)
}

/// Read the partition attribute of an item.
pub fn item_dataset(item: &Item) -> Option<&str> {
    item.get(ATTR_DATASET).and_then(AttrValue::as_s)
}
