//! Covering grid configuration.

use serde::{Deserialize, Serialize};

/// Configuration for covering generation.
///
/// Controls the granularity and cell count of grid coverings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoveringConfig {
    /// Coarsest grid level (0-28). Lower = larger cells.
    /// Default: 1 (four cells for the whole world)
    pub min_level: u8,

    /// Finest grid level (0-28). Higher = smaller cells.
    /// Default: 12 (cells of ~0.09° of longitude)
    pub max_level: u8,

    /// Maximum number of cells in a covering. A geometry is indexed at the
    /// finest level whose covering stays within this bound.
    /// Default: 32
    pub max_cells: usize,
}

impl Default for CoveringConfig {
    fn default() -> Self {
        Self {
            min_level: 1,
            max_level: 12,
            max_cells: 32,
        }
    }
}
