//! Runtime board state.
//!
//! The board holds everything the session mutates at runtime: the runtime
//! copy of the base cells, the dynamic-obstacle sets, the start/goal markers,
//! the latest plan and the stitched travel history. It owns the agent;
//! rendering collaborators read the exposed accessors between controller
//! steps.

use std::collections::HashSet;

use marga_map::{Grid, GridCoord, GridPoint};

use crate::agent::Agent;
use crate::planning::PlannedPath;

const HISTORY_POINT_EPSILON: f32 = 1e-3;

/// Whether a dynamic obstacle starts out revealed or hidden.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObstacleVisibility {
    /// Present in the world but unobserved; ignored by planning
    Hidden,
    /// Revealed; blocks the runtime grid
    Visible,
}

fn points_approximately_equal(a: &GridPoint, b: &GridPoint) -> bool {
    a.distance(b) <= HISTORY_POINT_EPSILON
}

/// Circle-versus-cell intersection used by the observation reveal.
///
/// A disk centered at `center` touches the unit cell at `cell` iff the center
/// lies inside the cell or any cell corner is within the radius.
fn disk_touches_cell(center: &GridPoint, radius_squared: f32, cell: GridCoord) -> bool {
    let left = cell.x as f32;
    let bottom = cell.y as f32;
    let right = left + 1.0;
    let top = bottom + 1.0;

    if center.x >= left && center.x <= right && center.y >= bottom && center.y <= top {
        return true;
    }

    let corners = [
        GridPoint::new(left, bottom),
        GridPoint::new(right, bottom),
        GridPoint::new(left, top),
        GridPoint::new(right, top),
    ];

    corners
        .iter()
        .any(|corner| corner.distance_squared(center) <= radius_squared)
}

/// Mutable session state rooted at the controller.
pub struct Board {
    base_grid: Grid,
    runtime_cells: Vec<f32>,
    visible_obstacles: HashSet<GridCoord>,
    hidden_obstacles: HashSet<GridCoord>,
    start_cell: Option<GridCoord>,
    goal_cell: Option<GridCoord>,
    latest_path: Option<PlannedPath>,
    travel_history: Vec<GridPoint>,
    inflation_overlay: Vec<GridPoint>,
    agent: Agent,
}

impl Board {
    /// Create a board over a loaded base grid.
    pub fn new(base_grid: Grid, agent: Agent) -> Self {
        let runtime_cells = base_grid.cells().to_vec();
        Self {
            base_grid,
            runtime_cells,
            visible_obstacles: HashSet::new(),
            hidden_obstacles: HashSet::new(),
            start_cell: None,
            goal_cell: None,
            latest_path: None,
            travel_history: Vec::new(),
            inflation_overlay: Vec::new(),
            agent,
        }
    }

    /// Base grid as loaded, never mutated after startup
    pub fn base_grid(&self) -> &Grid {
        &self.base_grid
    }

    /// Runtime cell values including discovered obstacles
    pub fn runtime_cells(&self) -> &[f32] {
        &self.runtime_cells
    }

    /// Whether `cell` lies on the board
    pub fn contains_cell(&self, cell: GridCoord) -> bool {
        let metadata = self.base_grid.metadata();
        cell.x >= 0
            && cell.y >= 0
            && (cell.x as usize) < metadata.width
            && (cell.y as usize) < metadata.height
    }

    fn cell_index(&self, cell: GridCoord) -> Option<usize> {
        if !self.contains_cell(cell) {
            return None;
        }
        Some(cell.y as usize * self.base_grid.metadata().width + cell.x as usize)
    }

    /// Force the runtime value of `cell` to the obstacle threshold.
    ///
    /// Returns false when the cell is out of bounds or already blocked.
    pub fn block_runtime_cell(&mut self, cell: GridCoord) -> bool {
        let Some(idx) = self.cell_index(cell) else {
            return false;
        };
        if self.runtime_cells[idx] >= 1.0 {
            return false;
        }
        self.runtime_cells[idx] = 1.0;
        true
    }

    /// Restore the runtime value of `cell` from the base grid.
    ///
    /// Returns false when nothing changed.
    pub fn restore_runtime_cell(&mut self, cell: GridCoord) -> bool {
        let Some(idx) = self.cell_index(cell) else {
            return false;
        };
        let base_value = self.base_grid.cells()[idx];
        if (self.runtime_cells[idx] - base_value).abs() < 1e-6 {
            return false;
        }
        self.runtime_cells[idx] = base_value;
        true
    }

    /// Reset every runtime cell back to its base value.
    pub fn reset_runtime_cells(&mut self) {
        self.runtime_cells.clear();
        self.runtime_cells.extend_from_slice(self.base_grid.cells());
    }

    /// Start marker, when set and in bounds
    pub fn start_cell(&self) -> Option<GridCoord> {
        self.start_cell
    }

    /// Goal marker, when set and in bounds
    pub fn goal_cell(&self) -> Option<GridCoord> {
        self.goal_cell
    }

    /// Place the start marker. Out-of-bounds cells are ignored.
    pub fn set_start_marker(&mut self, cell: GridCoord) {
        if self.contains_cell(cell) {
            self.start_cell = Some(cell);
        }
    }

    /// Place the goal marker. Out-of-bounds cells are ignored.
    pub fn set_goal_marker(&mut self, cell: GridCoord) {
        if self.contains_cell(cell) {
            self.goal_cell = Some(cell);
        }
    }

    /// Register a dynamic obstacle.
    ///
    /// Rejects cells off the board, the current markers and duplicates. The
    /// hidden and visible sets stay disjoint by construction.
    pub fn add_dynamic_obstacle(&mut self, cell: GridCoord, visibility: ObstacleVisibility) -> bool {
        if !self.contains_cell(cell) {
            return false;
        }
        if Some(cell) == self.start_cell || Some(cell) == self.goal_cell {
            return false;
        }
        if self.visible_obstacles.contains(&cell) || self.hidden_obstacles.contains(&cell) {
            return false;
        }

        match visibility {
            ObstacleVisibility::Visible => self.visible_obstacles.insert(cell),
            ObstacleVisibility::Hidden => self.hidden_obstacles.insert(cell),
        };
        true
    }

    /// Move a hidden obstacle into the visible set.
    pub fn reveal_dynamic_obstacle(&mut self, cell: GridCoord) -> bool {
        if !self.hidden_obstacles.remove(&cell) {
            return false;
        }
        self.visible_obstacles.insert(cell);
        true
    }

    /// Remove a dynamic obstacle from either set.
    pub fn remove_dynamic_obstacle(&mut self, cell: GridCoord) -> bool {
        self.visible_obstacles.remove(&cell) || self.hidden_obstacles.remove(&cell)
    }

    /// Drop all dynamic obstacles.
    pub fn clear_dynamic_obstacles(&mut self) {
        self.visible_obstacles.clear();
        self.hidden_obstacles.clear();
    }

    pub fn is_dynamic_obstacle(&self, cell: GridCoord) -> bool {
        self.is_visible_obstacle(cell) || self.is_hidden_obstacle(cell)
    }

    pub fn is_visible_obstacle(&self, cell: GridCoord) -> bool {
        self.visible_obstacles.contains(&cell)
    }

    pub fn is_hidden_obstacle(&self, cell: GridCoord) -> bool {
        self.hidden_obstacles.contains(&cell)
    }

    pub fn has_dynamic_obstacles(&self) -> bool {
        !self.visible_obstacles.is_empty() || !self.hidden_obstacles.is_empty()
    }

    /// Reveal every hidden obstacle whose cell intersects the observation
    /// disk. Returns the newly revealed cells.
    pub fn reveal_obstacles_within_radius(
        &mut self,
        center: GridPoint,
        radius: f32,
    ) -> Vec<GridCoord> {
        let mut discovered = Vec::new();
        if self.hidden_obstacles.is_empty() || radius <= 0.0 {
            return discovered;
        }

        let radius_squared = radius * radius;
        let to_reveal: Vec<GridCoord> = self
            .hidden_obstacles
            .iter()
            .copied()
            .filter(|&cell| disk_touches_cell(&center, radius_squared, cell))
            .collect();

        for cell in to_reveal {
            if self.reveal_dynamic_obstacle(cell) {
                discovered.push(cell);
            }
        }

        discovered
    }

    /// Latest planner result
    pub fn latest_path(&self) -> Option<&PlannedPath> {
        self.latest_path.as_ref()
    }

    /// Adopt a new plan and stitch the travel history.
    ///
    /// `history` carries the polyline travelled before this replan; when it
    /// is empty and the new plan starts away from the stored history, the
    /// history is flushed so the rendered trail never jumps.
    pub fn set_path(&mut self, path: PlannedPath, history: &[GridPoint]) {
        if !history.is_empty() {
            self.append_travel_history(history);
        } else if !self.travel_history.is_empty() {
            if let Some(new_start) = path.waypoints.first() {
                let last = self
                    .travel_history
                    .last()
                    .expect("history checked non-empty");
                if !points_approximately_equal(last, new_start) {
                    self.travel_history.clear();
                }
            }
        }

        let usable = path.success && path.waypoints.len() >= 2;
        if usable {
            self.agent.on_new_path(&path);
        } else {
            self.agent.reset();
        }
        self.latest_path = Some(path);
    }

    /// Drop the current plan, travel history and agent progress.
    pub fn clear_path(&mut self) {
        self.latest_path = None;
        self.travel_history.clear();
        self.agent.reset();
    }

    /// Stitched polyline of everything travelled so far
    pub fn travel_history(&self) -> &[GridPoint] {
        &self.travel_history
    }

    /// Merge a freshly travelled polyline into the stored history.
    ///
    /// The new polyline usually overlaps the stored tail; points after the
    /// overlap are appended. A polyline that shares no point with the stored
    /// history replaces it.
    fn append_travel_history(&mut self, polyline: &[GridPoint]) {
        if polyline.is_empty() {
            return;
        }

        if self.travel_history.is_empty() {
            for point in polyline {
                self.push_history_point(*point);
            }
            return;
        }

        let last_stored = *self
            .travel_history
            .last()
            .expect("history checked non-empty");
        let overlap = polyline
            .iter()
            .position(|p| points_approximately_equal(p, &last_stored));

        match overlap {
            Some(index) => {
                for point in &polyline[index + 1..] {
                    self.push_history_point(*point);
                }
            }
            None => {
                self.travel_history.clear();
                for point in polyline {
                    self.push_history_point(*point);
                }
            }
        }
    }

    fn push_history_point(&mut self, point: GridPoint) {
        if self
            .travel_history
            .last()
            .map_or(true, |last| !points_approximately_equal(last, &point))
        {
            self.travel_history.push(point);
        }
    }

    /// Inflation-center overlay for the rendering collaborator
    pub fn inflation_overlay(&self) -> &[GridPoint] {
        &self.inflation_overlay
    }

    pub fn set_inflation_overlay(&mut self, centers: Vec<GridPoint>) {
        self.inflation_overlay = centers;
    }

    /// The agent owned by this board
    pub fn agent(&self) -> &Agent {
        &self.agent
    }

    pub fn agent_mut(&mut self) -> &mut Agent {
        &mut self.agent
    }

    /// Cell under the agent, when it is following a path on the board
    pub fn agent_current_cell(&self) -> Option<GridCoord> {
        if !self.agent.has_path() {
            return None;
        }
        let cell = self.agent.current_position().cell();
        self.contains_cell(cell).then_some(cell)
    }

    /// Observation disk of the agent, when it has a path
    pub fn agent_observation(&self) -> Option<(GridPoint, f32)> {
        if !self.agent.has_path() {
            return None;
        }
        Some((
            self.agent.current_position(),
            self.agent.observation_radius_cells(),
        ))
    }
}
