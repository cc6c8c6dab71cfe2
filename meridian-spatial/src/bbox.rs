//! Axis-aligned bounding boxes in lon/lat degrees.

use geo::BoundingRect;
use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box, `[west, south, east, north]` in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl BBox {
    /// Create a new bounding box.
    pub fn new(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self {
            west,
            south,
            east,
            north,
        }
    }

    /// Check if this bbox intersects another (closed edges).
    pub fn intersects(&self, other: &BBox) -> bool {
        self.west <= other.east
            && self.east >= other.west
            && self.south <= other.north
            && self.north >= other.south
    }

    /// The smallest bbox containing both.
    pub fn union(&self, other: &BBox) -> BBox {
        BBox {
            west: self.west.min(other.west),
            south: self.south.min(other.south),
            east: self.east.max(other.east),
            north: self.north.max(other.north),
        }
    }

    /// Compute from a GeoJSON geometry.
    ///
    /// Returns `None` for geometries with no extent (e.g. an empty
    /// collection) or coordinates that fail conversion.
    pub fn from_geometry(geometry: &geojson::Geometry) -> Option<Self> {
        let geom = geo_types::Geometry::<f64>::try_from(geometry).ok()?;
        let rect = geom.bounding_rect()?;
        Some(Self {
            west: rect.min().x,
            south: rect.min().y,
            east: rect.max().x,
            north: rect.max().y,
        })
    }

    /// A copy with the coordinate pairs ordered west<=east, south<=north.
    ///
    /// Query callers sometimes hand in inverted boxes; exact-intersection
    /// checks need them well-formed.
    pub fn normalized(&self) -> BBox {
        BBox {
            west: self.west.min(self.east),
            south: self.south.min(self.north),
            east: self.west.max(self.east),
            north: self.south.max(self.north),
        }
    }

    /// `[west, south, east, north]` array form, as used on the wire.
    pub fn to_array(&self) -> [f64; 4] {
        [self.west, self.south, self.east, self.north]
    }

    /// Build from the `[west, south, east, north]` array form.
    pub fn from_array(bbox: [f64; 4]) -> Self {
        Self::new(bbox[0], bbox[1], bbox[2], bbox[3])
    }
}
