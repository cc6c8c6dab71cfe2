//! Multi-resolution covering grid for the Meridian feature store.
//!
//! Pure spatial-index math, no I/O:
//!
//! - [`BBox`]: lon/lat bounding boxes, including extraction from GeoJSON
//!   geometries
//! - [`compute_cover`]: the covering-cell set for a geometry's bbox, at a
//!   resolution chosen so fan-out stays within a configured bound
//! - [`scan_prefixes`]: the key-prefix range scans a bbox query must issue
//!   so that features indexed at any level are found
//!
//! A multi-resolution grid keeps index fan-out proportional to feature
//! size: one fixed fine grid would explode row counts for large polygons,
//! one fixed coarse grid would drown small queries in false positives.
//! Queries always post-filter candidates against actual extents; cell
//! overlap is coarser than bbox intersection.

pub mod bbox;
pub mod cell;
pub mod config;

pub use bbox::BBox;
pub use cell::{
    cells_at_level, choose_level, compute_cover, feature_id_from_index_key, scan_prefixes, Cell,
    CELL_KEY_PREFIX,
};
pub use config::CoveringConfig;
