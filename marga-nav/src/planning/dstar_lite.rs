//! Incremental D* Lite planner.
//!
//! Maintains cost-to-goal estimates for every visited cell so that when edge
//! costs change or the start moves, only the affected region is re-expanded.
//! The search runs backwards from the goal; replans after a handful of cell
//! changes are sub-linear in the grid size.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};

use tracing::debug;

use marga_map::{Grid, GridCoord};

use crate::error::Result;

use super::utils::{self, heuristic};
use super::{PathPlanner, PlannedPath};

/// Cost-to-goal pair for a visited cell.
///
/// `g` is the best known cost to the goal, `rhs` the one-step-lookahead
/// estimate. A cell is locally consistent iff the two agree.
#[derive(Clone, Copy, Debug)]
struct NodeData {
    g: f32,
    rhs: f32,
}

impl Default for NodeData {
    fn default() -> Self {
        Self {
            g: f32::INFINITY,
            rhs: f32::INFINITY,
        }
    }
}

/// Lexicographic priority of an open cell.
#[derive(Clone, Copy, Debug, PartialEq)]
struct Key {
    k1: f32,
    k2: f32,
}

impl Key {
    fn less(&self, other: &Key) -> bool {
        if self.k1 < other.k1 {
            return true;
        }
        if self.k1 > other.k1 {
            return false;
        }
        self.k2 < other.k2
    }

    fn ordering(&self, other: &Key) -> Ordering {
        if self.less(other) {
            Ordering::Less
        } else if other.less(self) {
            Ordering::Greater
        } else {
            Ordering::Equal
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct QueueEntry {
    cell: GridCoord,
    key: Key,
    /// Insertion counter making heap comparisons total
    sequence: u64,
}

impl Eq for QueueEntry {}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cell == other.cell && self.key == other.key && self.sequence == other.sequence
    }
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap behavior; earlier insertions win ties.
        other
            .key
            .ordering(&self.key)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Backwards-search bookkeeping, kept apart from the map so the borrow of the
/// grid stays disjoint from the mutable search state.
#[derive(Default)]
struct SearchState {
    start: Option<GridCoord>,
    goal: Option<GridCoord>,
    last_start: GridCoord,
    initialized: bool,
    /// Key modifier compensating for start movement without re-keying
    key_modifier: f32,
    queue_sequence: u64,
    open_list: BinaryHeap<QueueEntry>,
    open_table: HashMap<GridCoord, Key>,
    node_info: HashMap<GridCoord, NodeData>,
    expanded_nodes: Vec<GridCoord>,
}

impl SearchState {
    fn reset(&mut self) {
        self.open_list.clear();
        self.open_table.clear();
        self.node_info.clear();
        self.expanded_nodes.clear();
        self.key_modifier = 0.0;
        self.queue_sequence = 0;
        self.initialized = false;
    }

    fn g(&self, cell: GridCoord) -> f32 {
        self.node_info.get(&cell).map_or(f32::INFINITY, |n| n.g)
    }

    fn rhs(&self, cell: GridCoord) -> f32 {
        self.node_info.get(&cell).map_or(f32::INFINITY, |n| n.rhs)
    }

    fn set_g(&mut self, cell: GridCoord, value: f32) {
        self.node_info.entry(cell).or_default().g = value;
    }

    fn set_rhs(&mut self, cell: GridCoord, value: f32) {
        self.node_info.entry(cell).or_default().rhs = value;
    }

    fn calculate_key(&self, cell: GridCoord) -> Key {
        let start = self.start.expect("key calculation requires a start");
        let min_val = self.g(cell).min(self.rhs(cell));
        Key {
            k1: min_val + heuristic(start, cell) + self.key_modifier,
            k2: min_val,
        }
    }

    fn push_open(&mut self, cell: GridCoord, key: Key) {
        self.open_list.push(QueueEntry {
            cell,
            key,
            sequence: self.queue_sequence,
        });
        self.queue_sequence += 1;
        self.open_table.insert(cell, key);
    }

    /// Seed the backwards search from the goal.
    fn initialize(&mut self) {
        self.reset();

        let goal = self.goal.expect("initialization requires a goal");
        self.set_rhs(goal, 0.0);
        let key = self.calculate_key(goal);
        self.push_open(goal, key);
        self.last_start = self.start.expect("initialization requires a start");
        self.initialized = true;
    }

    /// Recompute `rhs` for `cell` and requeue it if it became inconsistent.
    fn update_vertex(&mut self, grid: &Grid, cell: GridCoord) {
        if Some(cell) == self.goal {
            self.set_rhs(cell, 0.0);
        } else {
            let mut min_rhs = f32::INFINITY;
            for (neighbor, diagonal) in utils::neighbors(grid, cell) {
                let cost = utils::traversal_cost(grid, neighbor, diagonal);
                min_rhs = min_rhs.min(cost + self.g(neighbor));
            }
            self.set_rhs(cell, min_rhs);
        }

        if self.g(cell) != self.rhs(cell) {
            let key = self.calculate_key(cell);
            self.push_open(cell, key);
        } else {
            self.open_table.remove(&cell);
        }
    }

    /// Expand inconsistent cells until the start is consistent and no open
    /// key precedes it.
    fn compute_shortest_path(&mut self, grid: &Grid) {
        let start = self.start.expect("search requires a start");
        self.expanded_nodes.clear();
        let mut expanded_set: HashSet<GridCoord> = HashSet::new();

        while let Some(&top) = self.open_list.peek() {
            // Lazy deletion: a popped entry whose key no longer matches the
            // side table is stale.
            match self.open_table.get(&top.cell) {
                Some(current) if *current == top.key => {}
                _ => {
                    self.open_list.pop();
                    continue;
                }
            }

            let start_key = self.calculate_key(start);
            if !top.key.less(&start_key) && self.rhs(start) == self.g(start) {
                break;
            }

            self.open_list.pop();
            self.open_table.remove(&top.cell);

            if expanded_set.insert(top.cell) {
                self.expanded_nodes.push(top.cell);
            }

            let g_old = self.g(top.cell);
            let rhs_val = self.rhs(top.cell);

            if g_old > rhs_val {
                // Overconsistent: the better estimate propagates to the
                // predecessors.
                self.set_g(top.cell, rhs_val);
                for (neighbor, _) in utils::neighbors(grid, top.cell) {
                    self.update_vertex(grid, neighbor);
                }
            } else {
                // Underconsistent: invalidate and recompute locally.
                self.set_g(top.cell, f32::INFINITY);
                self.update_vertex(grid, top.cell);
                for (neighbor, _) in utils::neighbors(grid, top.cell) {
                    self.update_vertex(grid, neighbor);
                }
            }
        }
    }
}

/// Incremental planner responding to dynamic cost changes.
#[derive(Default)]
pub struct DStarLitePlanner {
    map: Option<Grid>,
    pending_updates: HashSet<GridCoord>,
    search: SearchState,
}

impl DStarLitePlanner {
    /// Create a planner with no map, start or goal configured.
    pub fn new() -> Self {
        Self::default()
    }

    fn is_valid_start_goal(&self) -> bool {
        let (Some(grid), Some(start), Some(goal)) =
            (self.map.as_ref(), self.search.start, self.search.goal)
        else {
            return false;
        };

        if !utils::in_bounds(grid, start) || !utils::in_bounds(grid, goal) {
            return false;
        }
        if !utils::is_traversable(grid, goal) {
            return false;
        }
        if start != goal && !utils::is_traversable(grid, start) {
            return false;
        }
        true
    }

    /// Re-evaluate every pending cell and its neighborhood.
    fn apply_pending_updates(&mut self) {
        if self.pending_updates.is_empty() {
            return;
        }

        let grid = self.map.as_ref().expect("pending updates require a map");

        let mut to_process: Vec<GridCoord> = Vec::with_capacity(self.pending_updates.len() * 5);
        let mut seen: HashSet<GridCoord> = HashSet::new();
        for &cell in &self.pending_updates {
            if seen.insert(cell) {
                to_process.push(cell);
            }
            for &(dx, dy) in &utils::NEIGHBOR_OFFSETS {
                let neighbor = cell.offset(dx, dy);
                if utils::in_bounds(grid, neighbor) && seen.insert(neighbor) {
                    to_process.push(neighbor);
                }
            }
        }
        self.pending_updates.clear();

        for cell in to_process {
            self.search.update_vertex(grid, cell);
        }
    }

    /// Follow decreasing `g` values from the start to the goal.
    fn extract_path(&self, grid: &Grid, path: &mut PlannedPath) -> bool {
        let start = self.search.start.expect("extraction requires a start");
        let goal = self.search.goal.expect("extraction requires a goal");

        let mut cells = Vec::new();
        cells.push(start);

        let mut current = start;
        let limit = grid.metadata().cell_count() + 1;

        for _ in 0..limit {
            if current == goal {
                break;
            }

            let mut best_score = f32::INFINITY;
            let mut best_cell = current;
            for (neighbor, diagonal) in utils::neighbors(grid, current) {
                let cost = utils::traversal_cost(grid, neighbor, diagonal);
                let score = cost + self.search.g(neighbor);
                if score < best_score {
                    best_score = score;
                    best_cell = neighbor;
                }
            }

            if best_cell == current || !best_score.is_finite() {
                debug!("dstar: path extraction stalled at {:?}", current);
                return false;
            }

            current = best_cell;
            cells.push(current);
        }

        if *cells.last().expect("path has at least the start") != goal {
            debug!("dstar: extraction exceeded the step limit");
            return false;
        }

        path.waypoints = cells.iter().map(|c| c.center()).collect();
        true
    }
}

impl PathPlanner for DStarLitePlanner {
    fn set_map(&mut self, grid: Grid) {
        let Some(old) = self.map.as_ref() else {
            self.map = Some(grid);
            self.search.reset();
            self.pending_updates.clear();
            return;
        };

        let old_meta = *old.metadata();
        let new_meta = *grid.metadata();
        if old_meta.width != new_meta.width || old_meta.height != new_meta.height {
            self.map = Some(grid);
            self.pending_updates.clear();
            self.search.reset();
            return;
        }

        // Same shape: queue every cell whose blocked status flipped.
        let blocked = |value: f32| value >= 1.0 || value == Grid::MISSING_DATA;
        let old_cells = old.cells();
        let new_cells = grid.cells();
        for idx in 0..old_cells.len().min(new_cells.len()) {
            if blocked(old_cells[idx]) != blocked(new_cells[idx]) {
                let x = (idx % new_meta.width) as i32;
                let y = (idx / new_meta.width) as i32;
                self.pending_updates.insert(GridCoord::new(x, y));
            }
        }

        self.map = Some(grid);
    }

    fn set_start(&mut self, cell: GridCoord) {
        if self.map.is_none() {
            self.search.start = Some(cell);
            self.search.last_start = cell;
            return;
        }

        // Shifting the start inflates every queued key by at most the
        // heuristic distance moved; bumping the modifier keeps them ordered
        // without touching the queue.
        if self.search.start.is_some() {
            self.search.key_modifier += heuristic(self.search.last_start, cell);
        }

        self.search.start = Some(cell);
        if !self.search.initialized {
            self.search.last_start = cell;
        }
    }

    fn set_goal(&mut self, cell: GridCoord) {
        // A new goal invalidates the whole backwards search.
        self.search.goal = Some(cell);
        self.search.initialized = false;
    }

    fn compute_path(&mut self) -> Result<PlannedPath> {
        if !self.is_valid_start_goal() {
            return Ok(PlannedPath::failed());
        }

        if !self.search.initialized {
            self.search.initialize();
        }

        let start = self.search.start.expect("validated above");
        if self.search.last_start != start {
            self.search.key_modifier += heuristic(self.search.last_start, start);
            self.search.last_start = start;
        }

        self.apply_pending_updates();

        let grid = self.map.as_ref().expect("validated above");
        self.search.update_vertex(grid, start);
        self.search.compute_shortest_path(grid);

        let mut path = PlannedPath {
            explored_cells: self.search.expanded_nodes.clone(),
            ..Default::default()
        };

        if !self.search.rhs(start).is_finite() {
            debug!("dstar: start {:?} is disconnected from the goal", start);
            return Ok(path);
        }

        if !self.extract_path(grid, &mut path) {
            path.explored_cells.clear();
            return Ok(path);
        }

        path.success = true;
        Ok(path)
    }
}
