//! Costmap layer with disk-shaped obstacle inflation.
//!
//! Planning happens on the original point lattice, so a circular agent is
//! approximated by expanding every obstacle outward by the agent radius. The
//! layer also records which cells became blocked purely because of inflation,
//! for display by a rendering collaborator.

use log::debug;

use crate::core::{GridCoord, GridPoint};
use crate::error::{MapError, Result};
use crate::grid::{Grid, Metadata};

const OBSTACLE_THRESHOLD: f32 = 1.0;

/// Inflated cost grid derived from a base occupancy grid.
#[derive(Clone, Debug)]
pub struct CostmapLayer {
    metadata: Metadata,
    cells: Vec<f32>,
    inflation_mask: Vec<bool>,
    inflation_centers: Vec<GridPoint>,
}

impl CostmapLayer {
    /// Create an empty layer shaped like `metadata`.
    pub fn new(metadata: Metadata) -> Self {
        let cell_count = metadata.cell_count();
        Self {
            metadata,
            cells: vec![0.0; cell_count],
            inflation_mask: vec![false; cell_count],
            inflation_centers: Vec::new(),
        }
    }

    /// Rebuild the layer from base cell values and an inflation radius in
    /// cells.
    ///
    /// Every cell within `radius` of a base obstacle is forced to the
    /// obstacle threshold unless it carries missing data. Cells newly blocked
    /// by inflation are recorded as center points exactly once. A radius of
    /// zero leaves the output identical to the input.
    ///
    /// Fails when `base_cells` does not match the layer's metadata; that is a
    /// programming bug in the caller.
    pub fn update(&mut self, base_cells: &[f32], inflation_radius_cells: f32) -> Result<()> {
        if base_cells.len() != self.metadata.cell_count() {
            return Err(MapError::SizeMismatch {
                got: base_cells.len(),
                expected: self.metadata.cell_count(),
            });
        }

        self.cells.clear();
        self.cells.extend_from_slice(base_cells);
        self.inflation_mask.fill(false);
        self.inflation_centers.clear();

        if self.metadata.width == 0 || self.metadata.height == 0 {
            return Ok(());
        }

        let radius = inflation_radius_cells.max(0.0);
        if radius <= 0.0 {
            return Ok(());
        }

        let radius_squared = radius * radius;
        let radius_ceil = (radius.ceil() as i32).max(1);
        let width = self.metadata.width;
        let height = self.metadata.height;

        for idx in 0..base_cells.len() {
            if base_cells[idx] < OBSTACLE_THRESHOLD {
                continue;
            }

            let base_x = (idx % width) as i32;
            let base_y = (idx / width) as i32;

            for dy in -radius_ceil..=radius_ceil {
                let ny = base_y + dy;
                if ny < 0 || ny >= height as i32 {
                    continue;
                }

                for dx in -radius_ceil..=radius_ceil {
                    let nx = base_x + dx;
                    if nx < 0 || nx >= width as i32 {
                        continue;
                    }

                    if (dx * dx + dy * dy) as f32 > radius_squared {
                        continue;
                    }

                    let n_idx = ny as usize * width + nx as usize;
                    let base_value = base_cells[n_idx];

                    // Base obstacles and missing data keep their values and
                    // never count as inflation.
                    if base_value >= OBSTACLE_THRESHOLD || base_value <= Grid::MISSING_DATA {
                        continue;
                    }

                    self.cells[n_idx] = OBSTACLE_THRESHOLD;
                    if !self.inflation_mask[n_idx] {
                        self.inflation_mask[n_idx] = true;
                        self.inflation_centers
                            .push(GridCoord::new(nx, ny).center());
                    }
                }
            }
        }

        debug!(
            "[Costmap] inflated radius {:.2} cells, {} cells newly blocked",
            radius,
            self.inflation_centers.len()
        );

        Ok(())
    }

    /// Inflated row-major cell values
    #[inline]
    pub fn cells(&self) -> &[f32] {
        &self.cells
    }

    /// Centers of cells that became blocked due to inflation
    #[inline]
    pub fn inflation_centers(&self) -> &[GridPoint] {
        &self.inflation_centers
    }

    /// Build an immutable [`Grid`] snapshot of the inflated cells.
    pub fn to_grid(&self) -> Result<Grid> {
        Grid::new(self.metadata, self.cells.clone())
    }

    /// Whether a cell is traversable on the inflated layer
    pub fn is_traversable(&self, cell: GridCoord) -> bool {
        if cell.x < 0 || cell.y < 0 {
            return false;
        }
        let (x, y) = (cell.x as usize, cell.y as usize);
        if x >= self.metadata.width || y >= self.metadata.height {
            return false;
        }

        let value = self.cells[y * self.metadata.width + x];
        if value <= Grid::MISSING_DATA {
            return false;
        }
        value < OBSTACLE_THRESHOLD
    }
}
