//! Quadkey cells, cover computation, and bbox-query scan planning.
//!
//! The grid is an equirectangular quadtree: level `L` divides the world
//! (lon [-180, 180] x lat [-90, 90]) into `2^L x 2^L` cells. A cell is
//! named by its quadkey path: one digit (0-3) per level, most significant
//! first, with the origin at the north-west corner. Path length equals the
//! cell's level, so a coarser cell's path is a string prefix of every
//! descendant's path -- the property the index key layout and the query
//! planner are built on.
//!
//! Index rows are keyed `cell!{level}!{path}!{featureId}` and retrieved by
//! key prefix.
//!
//! # Level selection
//!
//! A geometry is indexed at the finest level in `[min_level, max_level]`
//! whose covering of its bounding box needs at most `max_cells` cells
//! (falling back to `min_level`). Index fan-out per feature is therefore
//! bounded by the configuration, not by geometry size.
//!
//! # Query planning
//!
//! Features sit at one level each, chosen by their own extent, so a bbox
//! query must consult every level in the configured band. With `Q` the
//! query bbox's own cover level:
//!
//! - levels `L <= Q`: one delimiter-anchored prefix per level-`L` cell
//!   intersecting the bbox (coarser levels need fewer cells, never more
//!   than the level-`Q` covering)
//! - levels `L > Q`: one prefix per level-`Q` cover cell, matching every
//!   level-`L` descendant of that cell by the path-prefix property
//!
//! Omitting a level would drop features indexed there; that is a
//! correctness bug, not a performance knob.

use crate::bbox::BBox;
use crate::config::CoveringConfig;

/// Key prefix shared by all spatial index rows.
pub const CELL_KEY_PREFIX: &str = "cell!";

/// A grid cell at a given resolution level.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Cell {
    /// Resolution level; path length equals this.
    pub level: u8,
    /// Quadkey path, digits 0-3, most significant first.
    pub path: String,
}

impl Cell {
    /// Render the index row key for a feature in this cell.
    pub fn index_key(&self, feature_id: &str) -> String {
        format!("{}{}!{}!{}", CELL_KEY_PREFIX, self.level, self.path, feature_id)
    }
}

/// Extract the feature id from an index row key.
///
/// Keys look like `cell!{level}!{path}!{featureId}`; everything after the
/// third delimiter is the id.
pub fn feature_id_from_index_key(key: &str) -> Option<&str> {
    let mut parts = key.splitn(4, '!');
    let tag = parts.next()?;
    if tag != "cell" {
        return None;
    }
    parts.next()?; // level
    parts.next()?; // path
    parts.next()
}

fn axis_index(frac: f64, n: u64) -> u64 {
    let idx = (frac * n as f64).floor() as i64;
    idx.clamp(0, n as i64 - 1) as u64
}

/// Inclusive cell index ranges `(x0, x1, y0, y1)` covering the bbox at a
/// level. Coordinates are clamped to world bounds; the east/north edges are
/// half-open except at the world boundary.
fn cell_range(bbox: &BBox, level: u8) -> (u64, u64, u64, u64) {
    let n = 1u64 << level;
    let xa = axis_index((bbox.west + 180.0) / 360.0, n);
    let xb = axis_index((bbox.east + 180.0) / 360.0, n);
    // y counts from the north edge down. Callers may hand us inverted
    // boxes (west > east); min/max keeps the range well-formed.
    let ya = axis_index((90.0 - bbox.north) / 180.0, n);
    let yb = axis_index((90.0 - bbox.south) / 180.0, n);
    (xa.min(xb), xa.max(xb), ya.min(yb), ya.max(yb))
}

fn range_count(bbox: &BBox, level: u8) -> u64 {
    let (x0, x1, y0, y1) = cell_range(bbox, level);
    (x1 - x0 + 1) * (y1 - y0 + 1)
}

fn quad_path(x: u64, y: u64, level: u8) -> String {
    let mut path = String::with_capacity(level as usize);
    for i in (0..level).rev() {
        let digit = ((x >> i) & 1) | (((y >> i) & 1) << 1);
        path.push(char::from(b'0' + digit as u8));
    }
    path
}

/// The finest level in the configured band whose covering of the bbox
/// needs at most `max_cells` cells; `min_level` when none qualifies.
pub fn choose_level(bbox: &BBox, config: &CoveringConfig) -> u8 {
    for level in (config.min_level..=config.max_level).rev() {
        if range_count(bbox, level) as usize <= config.max_cells {
            return level;
        }
    }
    config.min_level
}

/// Every cell of the given level intersecting the bbox, in path order.
pub fn cells_at_level(bbox: &BBox, level: u8) -> Vec<Cell> {
    let (x0, x1, y0, y1) = cell_range(bbox, level);
    let mut cells = Vec::with_capacity(((x1 - x0 + 1) * (y1 - y0 + 1)) as usize);
    for y in y0..=y1 {
        for x in x0..=x1 {
            cells.push(Cell {
                level,
                path: quad_path(x, y, level),
            });
        }
    }
    cells.sort();
    cells
}

/// The covering set for a geometry's bounding box: cells of the chosen
/// level (see [`choose_level`]) intersecting the bbox.
///
/// Pure and deterministic; fan-out is bounded by `config.max_cells`.
pub fn compute_cover(bbox: &BBox, config: &CoveringConfig) -> Vec<Cell> {
    cells_at_level(bbox, choose_level(bbox, config))
}

/// The key prefixes a bbox query must range-scan, across every level of
/// the configured band.
pub fn scan_prefixes(bbox: &BBox, config: &CoveringConfig) -> Vec<String> {
    let query_level = choose_level(bbox, config);
    let query_cover = cells_at_level(bbox, query_level);

    let mut prefixes = Vec::new();
    for level in config.min_level..=config.max_level {
        if level <= query_level {
            for cell in cells_at_level(bbox, level) {
                // Full path: anchor with the delimiter so e.g. path "01"
                // does not match a level-mislabeled "010".
                prefixes.push(format!("{}{}!{}!", CELL_KEY_PREFIX, level, cell.path));
            }
        } else {
            for cell in &query_cover {
                // Ancestor path: matches every finer descendant cell.
                prefixes.push(format!("{}{}!{}", CELL_KEY_PREFIX, level, cell.path));
            }
        }
    }
    prefixes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(min_level: u8, max_level: u8, max_cells: usize) -> CoveringConfig {
        CoveringConfig {
            min_level,
            max_level,
            max_cells,
        }
    }

    #[test]
    fn quad_path_digits() {
        // Level 1: world splits into 4; (0,0) is NW, digit 0.
        assert_eq!(quad_path(0, 0, 1), "0");
        assert_eq!(quad_path(1, 0, 1), "1");
        assert_eq!(quad_path(0, 1, 1), "2");
        assert_eq!(quad_path(1, 1, 1), "3");
        // Descendant paths extend the ancestor's.
        assert_eq!(quad_path(2, 2, 2), "30");
        assert!(quad_path(2, 3, 2).starts_with("3"));
    }

    #[test]
    fn point_covers_one_finest_cell() {
        let cfg = CoveringConfig::default();
        let point = BBox::new(0.0, 0.0, 0.0, 0.0);
        let cover = compute_cover(&point, &cfg);
        assert_eq!(cover.len(), 1);
        assert_eq!(cover[0].level, cfg.max_level);
        assert_eq!(cover[0].path.len(), cfg.max_level as usize);
    }

    #[test]
    fn large_bbox_indexes_coarse() {
        let cfg = config(1, 12, 4);
        // A quarter of the world cannot fit 4 cells at any fine level.
        let wide = BBox::new(-180.0, 0.0, 0.0, 90.0);
        let cover = compute_cover(&wide, &cfg);
        assert!(cover.len() <= 4);
        assert!(cover[0].level < 12);
    }

    #[test]
    fn cover_is_bounded_by_max_cells() {
        let cfg = config(1, 12, 16);
        let boxes = [
            BBox::new(-180.0, -90.0, 180.0, 90.0),
            BBox::new(-115.1, 45.7, -114.7, 45.9),
            BBox::new(0.0, 0.0, 0.1, 0.1),
            BBox::new(-72.6, 18.1, -72.5, 18.2),
            BBox::new(-10.0, -10.0, 10.0, 10.0),
        ];
        for bbox in &boxes {
            let cover = compute_cover(bbox, &cfg);
            // min_level = 1 has only 4 cells total, so the bound holds
            // even on the fallback path.
            assert!(cover.len() <= 16, "cover too large for {:?}", bbox);
            assert!(!cover.is_empty());
        }
    }

    #[test]
    fn cover_is_deterministic() {
        let cfg = CoveringConfig::default();
        let bbox = BBox::new(-76.0, 38.0, -72.0, 40.0);
        assert_eq!(compute_cover(&bbox, &cfg), compute_cover(&bbox, &cfg));
    }

    #[test]
    fn index_key_grammar() {
        let cell = Cell {
            level: 3,
            path: "012".to_string(),
        };
        let key = cell.index_key("abc");
        assert_eq!(key, "cell!3!012!abc");
        assert_eq!(feature_id_from_index_key(&key), Some("abc"));
        assert_eq!(feature_id_from_index_key("id!abc"), None);
    }

    /// Every feature whose bbox intersects the query bbox must have at
    /// least one of its index keys matched by a scan prefix.
    #[test]
    fn no_false_negatives_across_levels() {
        let cfg = config(1, 10, 8);
        let features = [
            BBox::new(0.0, 0.0, 0.0, 0.0),                // point
            BBox::new(-115.1, 45.7, -114.7, 45.9),        // small box
            BBox::new(-180.0, -90.0, 180.0, 90.0),        // the world
            BBox::new(-76.0, 38.0, -72.0, 40.0),          // mid box
            BBox::new(-0.01, -0.01, 0.01, 0.01),          // tiny around origin
            BBox::new(120.0, -45.0, 170.0, 10.0),         // large box
        ];
        let queries = [
            BBox::new(-10.0, -10.0, 10.0, 10.0),
            BBox::new(30.0, 30.0, 40.0, 40.0),
            BBox::new(-115.09, 45.71, -114.77, 45.94),
            BBox::new(-180.0, -90.0, 180.0, 90.0),
            BBox::new(150.0, -20.0, 160.0, -10.0),
        ];

        for feature in &features {
            let keys: Vec<String> = compute_cover(feature, &cfg)
                .iter()
                .map(|cell| cell.index_key("f"))
                .collect();
            for query in &queries {
                if !feature.intersects(query) {
                    continue;
                }
                let prefixes = scan_prefixes(query, &cfg);
                let hit = keys
                    .iter()
                    .any(|key| prefixes.iter().any(|prefix| key.starts_with(prefix)));
                assert!(
                    hit,
                    "feature {:?} not reachable from query {:?}",
                    feature, query
                );
            }
        }
    }

    #[test]
    fn inverted_bbox_is_tolerated() {
        let cfg = CoveringConfig::default();
        let inverted = BBox::new(-76.0, 38.0, -79.0, 40.0);
        let normalized = BBox::new(-79.0, 38.0, -76.0, 40.0);
        assert_eq!(compute_cover(&inverted, &cfg), compute_cover(&normalized, &cfg));
    }

    #[test]
    fn scan_prefix_count_is_bounded() {
        let cfg = config(1, 12, 8);
        let bbox = BBox::new(-79.0, 38.0, -76.0, 40.0);
        let prefixes = scan_prefixes(&bbox, &cfg);
        let levels = (cfg.max_level - cfg.min_level + 1) as usize;
        assert!(prefixes.len() <= levels * cfg.max_cells);
    }
}
