//! Feature model and record encoding.
//!
//! The canonical persisted form of a feature is a key-value item keyed
//! `id!{featureId}` inside its dataset partition, carrying the version
//! stamp, serialized byte size, the feature's own extent (denormalized so
//! exact bbox filtering and cover replay never need the payload), the
//! user-supplied secondary id when present, and the payload itself —
//! inline when small, offloaded to the blob store when it exceeds the
//! configured threshold.
//!
//! Offloaded payloads use content-addressed blob keys
//! (`{prefix}/{dataset}/{featureId}/{sha256hex}`): re-writing the same
//! content is a no-op at the blob store, and record equality minus the
//! version stamp is payload equality — the property the idempotent insert
//! path relies on.

use crate::config::StoreConfig;
use crate::error::{Error, Result};
use crate::keys::feature_key;
use geojson::feature::Id;
pub use geojson::{Feature, FeatureCollection};
use meridian_core::{AttrValue, Item, ATTR_DATASET, ATTR_ID};
use meridian_spatial::BBox;
use sha2::Digest;

/// Version stamp attribute (epoch milliseconds, optimistic-concurrency token).
pub const ATTR_VERSION: &str = "version";
/// Serialized payload size in bytes.
pub const ATTR_SIZE: &str = "size";
/// Feature extent attributes.
pub const ATTR_WEST: &str = "west";
pub const ATTR_SOUTH: &str = "south";
pub const ATTR_EAST: &str = "east";
pub const ATTR_NORTH: &str = "north";
/// User-supplied secondary id (`properties.id`).
pub const ATTR_USR: &str = "usr";
/// Inline payload bytes.
pub const ATTR_VAL: &str = "val";
/// Blob-store key of an offloaded payload.
pub const ATTR_BLOB: &str = "blob";

/// Where a record's payload lives.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Serialized feature stored inline on the item.
    Inline(Vec<u8>),
    /// Serialized feature offloaded to the blob store under this key.
    Blob(String),
}

/// The canonical feature record, decoded from (or encoded to) a stored item.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRecord {
    pub id: String,
    pub version: i64,
    pub size: i64,
    pub extent: BBox,
    pub usr: Option<String>,
    pub payload: Payload,
}

impl FeatureRecord {
    /// Render as a stored item for the given dataset.
    pub fn to_item(&self, dataset: &str) -> Item {
        let mut item = Item::new();
        item.insert(ATTR_DATASET.to_string(), AttrValue::from(dataset));
        item.insert(ATTR_ID.to_string(), AttrValue::S(feature_key(&self.id)));
        item.insert(ATTR_VERSION.to_string(), AttrValue::from(self.version));
        item.insert(ATTR_SIZE.to_string(), AttrValue::from(self.size));
        item.insert(ATTR_WEST.to_string(), AttrValue::N(self.extent.west));
        item.insert(ATTR_SOUTH.to_string(), AttrValue::N(self.extent.south));
        item.insert(ATTR_EAST.to_string(), AttrValue::N(self.extent.east));
        item.insert(ATTR_NORTH.to_string(), AttrValue::N(self.extent.north));
        if let Some(usr) = &self.usr {
            item.insert(ATTR_USR.to_string(), AttrValue::S(usr.clone()));
        }
        match &self.payload {
            Payload::Inline(bytes) => {
                item.insert(ATTR_VAL.to_string(), AttrValue::B(bytes.clone()));
            }
            Payload::Blob(key) => {
                item.insert(ATTR_BLOB.to_string(), AttrValue::S(key.clone()));
            }
        }
        item
    }

    /// Decode from a stored item.
    pub fn from_item(item: &Item) -> Result<Self> {
        let key = meridian_core::item_id(item)
            .ok_or_else(|| storage_corrupt("feature item has no id attribute"))?;
        let id = crate::keys::feature_id_from_key(key)
            .ok_or_else(|| storage_corrupt("feature item key lacks the id! prefix"))?
            .to_string();

        let number = |name: &str| -> Result<f64> {
            item.get(name)
                .and_then(AttrValue::as_n)
                .ok_or_else(|| storage_corrupt(format!("feature item missing {name}")))
        };

        let payload = if let Some(bytes) = item.get(ATTR_VAL).and_then(AttrValue::as_b) {
            Payload::Inline(bytes.to_vec())
        } else if let Some(key) = item.get(ATTR_BLOB).and_then(AttrValue::as_s) {
            Payload::Blob(key.to_string())
        } else {
            return Err(storage_corrupt("feature item has neither val nor blob"));
        };

        Ok(Self {
            id,
            version: number(ATTR_VERSION)? as i64,
            size: number(ATTR_SIZE)? as i64,
            extent: BBox::new(
                number(ATTR_WEST)?,
                number(ATTR_SOUTH)?,
                number(ATTR_EAST)?,
                number(ATTR_NORTH)?,
            ),
            usr: item.get(ATTR_USR).and_then(AttrValue::as_s).map(String::from),
            payload,
        })
    }

    /// Content equality, excluding the version stamp.
    ///
    /// Blob payloads compare by key; keys are content-addressed, so key
    /// equality is content equality.
    pub fn content_eq(&self, other: &FeatureRecord) -> bool {
        self.id == other.id
            && self.size == other.size
            && self.extent == other.extent
            && self.usr == other.usr
            && self.payload == other.payload
    }
}

fn storage_corrupt(msg: impl Into<String>) -> Error {
    Error::Storage(meridian_core::Error::invalid_item(msg))
}

/// Compute SHA-256 of bytes as a hex string (blob key component).
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = sha2::Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// The feature's client-supplied id, if any.
pub fn feature_id(feature: &Feature) -> Option<String> {
    match &feature.id {
        Some(Id::String(s)) => Some(s.clone()),
        Some(Id::Number(n)) => Some(n.to_string()),
        None => None,
    }
}

/// The user-supplied secondary identifier (`properties.id`), if any.
pub fn secondary_id(feature: &Feature) -> Option<String> {
    match feature.properties.as_ref()?.get("id")? {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// A copy of the feature carrying the given id.
pub fn with_id(feature: &Feature, id: &str) -> Feature {
    let mut feature = feature.clone();
    feature.id = Some(Id::String(id.to_string()));
    feature
}

/// Serialize a feature to its stored byte form.
pub fn encode(feature: &Feature) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(feature)?)
}

/// The feature's bounding box.
///
/// Features without a located geometry cannot be stored or indexed.
pub fn extent(feature: &Feature) -> Result<BBox> {
    let geometry = feature
        .geometry
        .as_ref()
        .ok_or_else(|| Error::validation("Feature has no geometry"))?;
    BBox::from_geometry(geometry)
        .ok_or_else(|| Error::validation("Feature geometry has no extent"))
}

/// An empty feature collection (the empty-result envelope).
pub fn empty_collection() -> FeatureCollection {
    FeatureCollection {
        bbox: None,
        features: Vec::new(),
        foreign_members: None,
    }
}

/// Wrap features in the standard collection envelope.
pub fn collection(features: Vec<Feature>) -> FeatureCollection {
    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

/// Build the record (and the blob write it implies, if any) for a feature.
///
/// Returns the record, the encoded payload bytes, and the blob key to
/// write when the payload exceeds the offload threshold.
pub fn build_record(
    feature: &Feature,
    id: &str,
    version: i64,
    dataset: &str,
    config: &StoreConfig,
) -> Result<(FeatureRecord, Vec<u8>, Option<String>)> {
    let bytes = encode(feature)?;
    let extent = extent(feature)?;
    let usr = secondary_id(feature);

    let (payload, blob_key) = if bytes.len() > config.blob_threshold {
        let key = format!(
            "{}/{}/{}/{}",
            config.blob_prefix,
            dataset,
            id,
            sha256_hex(&bytes)
        );
        (Payload::Blob(key.clone()), Some(key))
    } else {
        (Payload::Inline(bytes.clone()), None)
    };

    let record = FeatureRecord {
        id: id.to_string(),
        version,
        size: bytes.len() as i64,
        extent,
        usr,
        payload,
    };
    Ok((record, bytes, blob_key))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point_feature(id: Option<&str>) -> Feature {
        Feature {
            bbox: None,
            geometry: Some(geojson::Geometry::new(geojson::Value::Point(vec![
                -77.0, 38.9,
            ]))),
            id: id.map(|s| Id::String(s.to_string())),
            properties: Some(
                [("id".to_string(), serde_json::json!("user-7"))]
                    .into_iter()
                    .collect(),
            ),
            foreign_members: None,
        }
    }

    #[test]
    fn record_item_roundtrip() {
        let feature = point_feature(Some("f1"));
        let config = StoreConfig::default();
        let (record, bytes, blob_key) =
            build_record(&feature, "f1", 1700000000000, "default", &config).unwrap();
        assert!(blob_key.is_none());
        assert_eq!(record.size as usize, bytes.len());
        assert_eq!(record.usr.as_deref(), Some("user-7"));

        let item = record.to_item("default");
        assert_eq!(meridian_core::item_id(&item), Some("id!f1"));
        let decoded = FeatureRecord::from_item(&item).unwrap();
        assert_eq!(decoded, record);
        assert!(decoded.content_eq(&record));
    }

    #[test]
    fn content_eq_ignores_version() {
        let feature = point_feature(Some("f1"));
        let config = StoreConfig::default();
        let (a, _, _) = build_record(&feature, "f1", 1, "default", &config).unwrap();
        let (b, _, _) = build_record(&feature, "f1", 2, "default", &config).unwrap();
        assert!(a.content_eq(&b));
        assert_ne!(a, b);
    }

    #[test]
    fn large_payload_offloads_to_blob() {
        let feature = point_feature(Some("f1"));
        let config = StoreConfig::default().with_blob_threshold(0);
        let (record, bytes, blob_key) =
            build_record(&feature, "f1", 1, "default", &config).unwrap();
        let key = blob_key.expect("payload should offload");
        assert!(key.starts_with("meridian/default/f1/"));
        assert!(key.ends_with(&sha256_hex(&bytes)));
        assert_eq!(record.payload, Payload::Blob(key));
    }

    #[test]
    fn extent_requires_geometry() {
        let mut feature = point_feature(Some("f1"));
        feature.geometry = None;
        assert!(extent(&feature).unwrap_err().is_validation());
    }
}
