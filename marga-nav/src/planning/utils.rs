//! Shared grid predicates, edge costs and the octile heuristic.

use marga_map::{Grid, GridCoord};

/// 8-connected neighbor offsets, cardinals first.
pub const NEIGHBOR_OFFSETS: [(i32, i32); 8] = [
    (1, 0),
    (-1, 0),
    (0, 1),
    (0, -1),
    (1, 1),
    (1, -1),
    (-1, 1),
    (-1, -1),
];

/// Whether `cell` lies inside the grid bounds.
#[inline]
pub fn in_bounds(grid: &Grid, cell: GridCoord) -> bool {
    if cell.x < 0 || cell.y < 0 {
        return false;
    }
    let metadata = grid.metadata();
    (cell.x as usize) < metadata.width && (cell.y as usize) < metadata.height
}

/// Whether `cell` is in bounds, carries data and is not an obstacle.
pub fn is_traversable(grid: &Grid, cell: GridCoord) -> bool {
    if !in_bounds(grid, cell) {
        return false;
    }

    let (x, y) = (cell.x as usize, cell.y as usize);
    if grid.is_missing(x, y) {
        return false;
    }

    grid.value_at(x, y) < 1.0
}

/// Cost of stepping into `cell`.
///
/// The base step cost (`sqrt(2)` for diagonals, `1` otherwise) is scaled by
/// the cell's additive cost. Negative values other than the missing-data
/// sentinel clamp to zero.
pub fn traversal_cost(grid: &Grid, cell: GridCoord, diagonal: bool) -> f32 {
    let value = grid.value_at(cell.x as usize, cell.y as usize);
    let clamped = value.max(0.0);
    let base_cost = if diagonal { std::f32::consts::SQRT_2 } else { 1.0 };
    base_cost * (1.0 + clamped)
}

/// Octile distance between two cells.
///
/// Admissible and consistent on an 8-connected grid with unit and `sqrt(2)`
/// edges.
pub fn heuristic(a: GridCoord, b: GridCoord) -> f32 {
    let dx = (b.x - a.x).abs();
    let dy = (b.y - a.y).abs();
    let min_delta = dx.min(dy);
    let max_delta = dx.max(dy);
    (max_delta - min_delta) as f32 + std::f32::consts::SQRT_2 * min_delta as f32
}

/// Whether a diagonal step from `from` by `(dx, dy)` cuts an obstacle corner.
///
/// A diagonal move is only allowed when both orthogonal neighbors are in
/// bounds and traversable, so the agent cannot squeeze between two
/// kitty-corner obstacles.
#[inline]
pub fn diagonal_clear(grid: &Grid, from: GridCoord, dx: i32, dy: i32) -> bool {
    is_traversable(grid, from.offset(dx, 0)) && is_traversable(grid, from.offset(0, dy))
}

/// Reachable 8-connected neighbors of `cell` with their diagonal flag.
///
/// Applies bounds, traversability and the corner-cutting policy.
pub fn neighbors(grid: &Grid, cell: GridCoord) -> Vec<(GridCoord, bool)> {
    let mut result = Vec::with_capacity(8);

    for &(dx, dy) in &NEIGHBOR_OFFSETS {
        let candidate = cell.offset(dx, dy);
        if !in_bounds(grid, candidate) {
            continue;
        }

        let diagonal = dx != 0 && dy != 0;
        if diagonal && !diagonal_clear(grid, cell, dx, dy) {
            continue;
        }

        if !is_traversable(grid, candidate) {
            continue;
        }

        result.push((candidate, diagonal));
    }

    result
}
