//! One-shot A* planner over an inflated grid.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};

use tracing::debug;

use marga_map::{Grid, GridCoord};

use crate::error::{NavError, Result};

use super::utils::{self, heuristic};
use super::{PathPlanner, PlannedPath};

/// A node in the A* open set.
#[derive(Clone, Debug)]
struct AStarNode {
    cell: GridCoord,
    g: f32,
    f: f32,
}

impl Eq for AStarNode {}

impl PartialEq for AStarNode {
    fn eq(&self, other: &Self) -> bool {
        self.cell == other.cell
    }
}

impl Ord for AStarNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap behavior
        other.f.partial_cmp(&self.f).unwrap_or(Ordering::Equal)
    }
}

impl PartialOrd for AStarNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// One-shot shortest-path planner.
///
/// Recomputes the full search on every `compute_path` call. Expanded cells
/// are reported in pop order for visualization.
#[derive(Default)]
pub struct AStarPlanner {
    map: Option<Grid>,
    start: Option<GridCoord>,
    goal: Option<GridCoord>,
}

impl AStarPlanner {
    /// Create a planner with no map, start or goal configured.
    pub fn new() -> Self {
        Self::default()
    }

    fn solve(grid: &Grid, start: GridCoord, goal: GridCoord) -> PlannedPath {
        let mut path = PlannedPath::default();

        if !utils::is_traversable(grid, start) || !utils::is_traversable(grid, goal) {
            debug!(
                "astar: start {:?} or goal {:?} blocked or out of bounds",
                start, goal
            );
            return path;
        }

        if start == goal {
            path.explored_cells = vec![start];
            path.waypoints = vec![start.center()];
            path.success = true;
            return path;
        }

        let mut open_set = BinaryHeap::new();
        let mut closed_set: HashSet<GridCoord> = HashSet::new();
        let mut came_from: HashMap<GridCoord, GridCoord> = HashMap::new();
        let mut g_scores: HashMap<GridCoord, f32> = HashMap::new();

        g_scores.insert(start, 0.0);
        open_set.push(AStarNode {
            cell: start,
            g: 0.0,
            f: heuristic(start, goal),
        });

        while let Some(current) = open_set.pop() {
            if closed_set.contains(&current.cell) {
                continue;
            }
            closed_set.insert(current.cell);
            path.explored_cells.push(current.cell);

            if current.cell == goal {
                let cells = reconstruct_path(&came_from, current.cell);
                path.waypoints = cells.iter().map(|c| c.center()).collect();
                path.success = true;
                return path;
            }

            for (neighbor, diagonal) in utils::neighbors(grid, current.cell) {
                let tentative_g = current.g + utils::traversal_cost(grid, neighbor, diagonal);

                let known_g = g_scores.get(&neighbor).copied().unwrap_or(f32::INFINITY);
                if tentative_g < known_g {
                    came_from.insert(neighbor, current.cell);
                    g_scores.insert(neighbor, tentative_g);
                    open_set.push(AStarNode {
                        cell: neighbor,
                        g: tentative_g,
                        f: tentative_g + heuristic(neighbor, goal),
                    });
                }
            }
        }

        debug!(
            "astar: no path after expanding {} cells",
            path.explored_cells.len()
        );
        path
    }
}

fn reconstruct_path(came_from: &HashMap<GridCoord, GridCoord>, goal: GridCoord) -> Vec<GridCoord> {
    let mut cells = vec![goal];
    let mut current = goal;
    while let Some(&prev) = came_from.get(&current) {
        cells.push(prev);
        current = prev;
    }
    cells.reverse();
    cells
}

impl PathPlanner for AStarPlanner {
    fn set_map(&mut self, grid: Grid) {
        self.map = Some(grid);
    }

    fn set_start(&mut self, cell: GridCoord) {
        self.start = Some(cell);
    }

    fn set_goal(&mut self, cell: GridCoord) {
        self.goal = Some(cell);
    }

    fn compute_path(&mut self) -> Result<PlannedPath> {
        let grid = self.map.as_ref().ok_or(NavError::MissingMap)?;
        let start = self.start.ok_or(NavError::MissingStart)?;
        let goal = self.goal.ok_or(NavError::MissingGoal)?;

        Ok(Self::solve(grid, start, goal))
    }
}
