//! Immutable occupancy grid storage.

use crate::error::{MapError, Result};

/// Geometric properties of a grid map.
///
/// Width and height are expressed in cells, the resolution in meters per
/// cell.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Metadata {
    pub width: usize,
    pub height: usize,
    /// Physical size represented by a single grid cell (meters)
    pub resolution: f32,
}

impl Metadata {
    /// Total number of cells described by the metadata
    #[inline]
    pub fn cell_count(&self) -> usize {
        self.width * self.height
    }

    /// Concise human-readable summary, e.g. `64x48 @ 0.05m`
    pub fn summary(&self) -> String {
        format!("{}x{} @ {}m", self.width, self.height, self.resolution)
    }
}

/// Immutable grid map storing occupancy or traversal values per cell.
///
/// Values are stored row-major with the origin at the bottom-left corner.
#[derive(Clone, Debug)]
pub struct Grid {
    metadata: Metadata,
    cells: Vec<f32>,
}

impl Grid {
    /// Sentinel value marking a cell with no data. Never traversable.
    pub const MISSING_DATA: f32 = -1.0;

    /// Construct a grid from metadata and row-major cell values.
    ///
    /// Fails when a dimension is zero or the cell count does not match the
    /// metadata.
    pub fn new(metadata: Metadata, cells: Vec<f32>) -> Result<Self> {
        if metadata.width == 0 || metadata.height == 0 {
            return Err(MapError::InvalidDimensions);
        }
        if cells.len() != metadata.cell_count() {
            return Err(MapError::SizeMismatch {
                got: cells.len(),
                expected: metadata.cell_count(),
            });
        }
        Ok(Self { metadata, cells })
    }

    /// Grid metadata
    #[inline]
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Raw row-major cell values
    #[inline]
    pub fn cells(&self) -> &[f32] {
        &self.cells
    }

    /// Value stored at `(x, y)`. The coordinate must be in bounds.
    #[inline]
    pub fn value_at(&self, x: usize, y: usize) -> f32 {
        debug_assert!(x < self.metadata.width && y < self.metadata.height);
        self.cells[y * self.metadata.width + x]
    }

    /// Whether the cell at `(x, y)` is marked as missing data
    #[inline]
    pub fn is_missing(&self, x: usize, y: usize) -> bool {
        self.value_at(x, y) == Self::MISSING_DATA
    }
}
