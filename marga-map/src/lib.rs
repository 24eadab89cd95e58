//! # Marga-Map: Occupancy Grids for Interactive Path Planning
//!
//! The map layer of the Marga planning engine. Provides:
//!
//! - **Grid storage**: Immutable row-major occupancy grids with a
//!   missing-data sentinel and per-cell traversal costs
//! - **Map loading**: A plain-text map format with comments, a dimension
//!   header and row-major cell values
//! - **Costmap inflation**: Expands obstacles by a disk radius so a circular
//!   agent can plan on the original point lattice
//!
//! ## Cell Semantics
//!
//! Each cell stores a single `f32`:
//!
//! - `-1.0` marks missing data and is never traversable
//! - values in `[0.0, 1.0)` are traversable; the value is an additive
//!   traversal cost
//! - values `>= 1.0` are obstacles
//!
//! ## Coordinate Frame
//!
//! Cells are addressed by integer `(x, y)` with `x` as the column and `y` as
//! the row; the origin sits at the bottom-left corner. Continuous positions
//! ([`GridPoint`]) are expressed in cell units, so the center of cell
//! `(x, y)` is `(x + 0.5, y + 0.5)`. The metadata resolution only converts
//! physical agent dimensions into cells.

pub mod core;
pub mod costmap;
pub mod error;
pub mod grid;
pub mod io;

pub use crate::core::{GridCoord, GridPoint};
pub use crate::costmap::CostmapLayer;
pub use crate::error::{MapError, Result};
pub use crate::grid::{Grid, Metadata};
