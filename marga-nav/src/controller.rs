//! Discovery/replan controller.
//!
//! Drives the closed loop: advance the agent, reveal hidden obstacles under
//! its observation disk, fold them into the runtime costmap and replan when
//! the current path is invalidated. The controller owns the board and the
//! planner; the original viewer's static singletons become one value threaded
//! through the session.

use tracing::info;

use marga_map::{CostmapLayer, Grid, GridCoord, GridPoint};

use crate::agent::Agent;
use crate::board::{Board, ObstacleVisibility};
use crate::error::Result;
use crate::planning::{
    compute_path_timed, make_planner, PathPlanner, PlannerAlgorithm,
};

const INFLATION_MULTIPLIER: f32 = 1.5;
const MINIMUM_INFLATION_RADIUS: f32 = 1.0;
const PATH_HIT_EPSILON: f32 = 1e-3;

/// Lifecycle of the planning session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControllerState {
    /// No plan exists
    Idle,
    /// A planner invocation is in flight (transient within a call)
    Planning,
    /// A plan is set and the agent is advancing
    Following,
    /// The agent reached the end of the plan
    Completed,
    /// The planner returned no path
    Failed,
}

fn distance_squared_to_segment(point: &GridPoint, a: &GridPoint, b: &GridPoint) -> f32 {
    let ab = *b - *a;
    let ab_len_sq = ab.dot(&ab);
    if ab_len_sq <= 1e-6 {
        return point.distance_squared(a);
    }

    let t = ((*point - *a).dot(&ab) / ab_len_sq).clamp(0.0, 1.0);
    let projection = *a + ab * t;
    point.distance_squared(&projection)
}

/// Orchestrates planning, traversal and fog-of-war discovery.
pub struct Controller {
    board: Board,
    costmap: CostmapLayer,
    planner: Box<dyn PathPlanner>,
    algorithm: PlannerAlgorithm,
    state: ControllerState,
}

impl Controller {
    /// Build a controller over a loaded base grid.
    ///
    /// The agent must already carry its physical configuration; the initial
    /// costmap is inflated and handed to the planner immediately.
    pub fn new(base_grid: Grid, algorithm: PlannerAlgorithm, agent: Agent) -> Result<Self> {
        let metadata = *base_grid.metadata();
        let mut controller = Self {
            board: Board::new(base_grid, agent),
            costmap: CostmapLayer::new(metadata),
            planner: make_planner(algorithm),
            algorithm,
            state: ControllerState::Idle,
        };
        controller.update_planner_map()?;
        Ok(controller)
    }

    /// Current session state
    pub fn state(&self) -> ControllerState {
        self.state
    }

    /// The board owned by this controller
    pub fn board(&self) -> &Board {
        &self.board
    }

    /// Selected planning algorithm
    pub fn algorithm(&self) -> PlannerAlgorithm {
        self.algorithm
    }

    /// Advance one frame: move the agent, reveal obstacles in range and
    /// replan when the plan was invalidated.
    pub fn tick(&mut self, delta_seconds: f32) -> Result<()> {
        self.board.agent_mut().update(delta_seconds);
        if self.state == ControllerState::Following && self.board.agent().is_complete() {
            self.state = ControllerState::Completed;
        }

        let Some((center, radius)) = self.board.agent_observation() else {
            return Ok(());
        };

        let discovered = self.board.reveal_obstacles_within_radius(center, radius);
        if discovered.is_empty() {
            return Ok(());
        }

        info!(
            "discovered {} dynamic obstacle(s) within the observation radius",
            discovered.len()
        );
        self.integrate_discovered(&discovered)
    }

    /// Place the start marker and replan.
    ///
    /// Returns false when the cell cannot be selected.
    pub fn set_start_marker(&mut self, cell: GridCoord) -> Result<bool> {
        if !self.is_traversable_for_selection(cell) {
            info!("cell ({}, {}) is not traversable", cell.x, cell.y);
            return Ok(false);
        }

        let start_changed = self.board.start_cell() != Some(cell);
        // An incremental planner keys its search on the agent cell; moving
        // the start marker discards the stale traversal first.
        if start_changed && self.algorithm == PlannerAlgorithm::DStarLite {
            self.board.clear_path();
        }

        self.board.set_start_marker(cell);
        self.run_planner()?;
        Ok(true)
    }

    /// Place the goal marker and replan.
    pub fn set_goal_marker(&mut self, cell: GridCoord) -> Result<bool> {
        if !self.is_traversable_for_selection(cell) {
            info!("cell ({}, {}) is not traversable", cell.x, cell.y);
            return Ok(false);
        }

        self.board.set_goal_marker(cell);
        self.run_planner()?;
        Ok(true)
    }

    /// Register a dynamic obstacle.
    ///
    /// Hidden obstacles only touch the board until the agent observes them;
    /// visible obstacles block the runtime grid immediately.
    pub fn add_dynamic_obstacle(
        &mut self,
        cell: GridCoord,
        visibility: ObstacleVisibility,
    ) -> Result<bool> {
        if !self.board.add_dynamic_obstacle(cell, visibility) {
            return Ok(false);
        }

        if visibility == ObstacleVisibility::Visible {
            self.integrate_discovered(&[cell])?;
        }
        Ok(true)
    }

    /// Reveal a hidden obstacle by hand, as if the agent had observed it.
    pub fn reveal_dynamic_obstacle(&mut self, cell: GridCoord) -> Result<bool> {
        if !self.board.reveal_dynamic_obstacle(cell) {
            return Ok(false);
        }
        self.integrate_discovered(&[cell])?;
        Ok(true)
    }

    /// Remove a dynamic obstacle.
    ///
    /// Removing a visible obstacle restores the base cell value, re-inflates
    /// and replans; removing a hidden one only updates the board.
    pub fn remove_dynamic_obstacle(&mut self, cell: GridCoord) -> Result<bool> {
        let was_visible = self.board.is_visible_obstacle(cell);
        if !self.board.remove_dynamic_obstacle(cell) {
            return Ok(false);
        }

        if !was_visible {
            return Ok(true);
        }

        if self.board.restore_runtime_cell(cell) {
            self.update_planner_map()?;
        }
        self.run_planner()?;
        Ok(true)
    }

    /// Drop every dynamic obstacle and restore the base grid.
    pub fn clear_dynamic_obstacles(&mut self) -> Result<()> {
        if !self.board.has_dynamic_obstacles() {
            return Ok(());
        }

        self.board.clear_dynamic_obstacles();
        self.board.reset_runtime_cells();
        self.update_planner_map()?;
        self.run_planner()?;
        Ok(())
    }

    /// Pick an initial start near the bottom-left corner and a goal near the
    /// top-right one. Returns whether both endpoints were found.
    pub fn auto_select_endpoints(&mut self) -> Result<bool> {
        let start = self.find_traversable_from_corner(false);
        let mut goal = self.find_traversable_from_corner(true);

        if start.is_some() && goal == start {
            goal = match start {
                Some(start_cell) => self.find_fallback_goal(start_cell).or(start),
                None => None,
            };
        }

        if let Some(cell) = start {
            self.board.set_start_marker(cell);
        }
        if let Some(cell) = goal {
            self.board.set_goal_marker(cell);
        }

        if start.is_some() && goal.is_some() {
            self.run_planner()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn find_traversable_from_corner(&self, reverse: bool) -> Option<GridCoord> {
        let metadata = self.board.base_grid().metadata();
        let (width, height) = (metadata.width as i32, metadata.height as i32);

        let rows: Vec<i32> = if reverse {
            (0..height).rev().collect()
        } else {
            (0..height).collect()
        };
        let cols: Vec<i32> = if reverse {
            (0..width).rev().collect()
        } else {
            (0..width).collect()
        };

        for &y in &rows {
            for &x in &cols {
                let cell = GridCoord::new(x, y);
                if self.is_traversable_for_selection(cell) {
                    return Some(cell);
                }
            }
        }
        None
    }

    fn find_fallback_goal(&self, start: GridCoord) -> Option<GridCoord> {
        let metadata = self.board.base_grid().metadata();
        for y in 0..metadata.height as i32 {
            for x in 0..metadata.width as i32 {
                let cell = GridCoord::new(x, y);
                if cell != start && self.is_traversable_for_selection(cell) {
                    return Some(cell);
                }
            }
        }
        None
    }

    fn is_traversable_for_selection(&self, cell: GridCoord) -> bool {
        self.costmap.is_traversable(cell) && !self.board.is_dynamic_obstacle(cell)
    }

    fn inflation_radius(&self) -> f32 {
        let agent_radius = self.board.agent().footprint_radius_cells();
        if agent_radius <= 0.0 {
            return MINIMUM_INFLATION_RADIUS;
        }
        (agent_radius * INFLATION_MULTIPLIER).max(MINIMUM_INFLATION_RADIUS)
    }

    /// Re-inflate the runtime cells and hand the result to the planner.
    fn update_planner_map(&mut self) -> Result<()> {
        let radius = self.inflation_radius();
        self.costmap.update(self.board.runtime_cells(), radius)?;
        self.board
            .set_inflation_overlay(self.costmap.inflation_centers().to_vec());
        self.planner.set_map(self.costmap.to_grid()?);
        Ok(())
    }

    /// Fold newly revealed obstacles into the runtime grid and decide
    /// whether to replan.
    fn integrate_discovered(&mut self, cells: &[GridCoord]) -> Result<()> {
        let mut runtime_updated = false;
        let mut requires_replan = false;

        for &cell in cells {
            runtime_updated = self.board.block_runtime_cell(cell) || runtime_updated;
            if self.obstacle_blocks_current_path(cell) {
                requires_replan = true;
            }
        }

        if runtime_updated {
            self.update_planner_map()?;
            // Inflation can block waypoints that were not direct hits.
            if !requires_replan && self.current_path_blocked_by_costmap() {
                requires_replan = true;
            }
        }

        // An incremental planner is refreshed on every runtime change so its
        // pending updates never go stale.
        let incremental_replan =
            runtime_updated && self.algorithm == PlannerAlgorithm::DStarLite;

        if requires_replan || incremental_replan {
            if requires_replan {
                info!("newly discovered obstacle blocks the current path; replanning");
            } else {
                info!("map updated with newly discovered obstacle; refreshing plan");
            }
            self.run_planner()?;
        }

        Ok(())
    }

    /// Whether a discovered cell lies on the current plan.
    fn obstacle_blocks_current_path(&self, cell: GridCoord) -> bool {
        if self.board.agent_current_cell() == Some(cell) {
            return true;
        }

        let Some(latest) = self.board.latest_path() else {
            return false;
        };
        if !latest.success || latest.waypoints.len() < 2 {
            return false;
        }

        if latest.waypoints.iter().any(|w| w.cell() == cell) {
            return true;
        }

        let cell_center = cell.center();
        let max_distance_sq = (0.5 + PATH_HIT_EPSILON) * (0.5 + PATH_HIT_EPSILON);
        latest.waypoints.windows(2).any(|pair| {
            distance_squared_to_segment(&cell_center, &pair[0], &pair[1]) <= max_distance_sq
        })
    }

    /// Whether the inflated costmap blocks any waypoint of the latest plan.
    fn current_path_blocked_by_costmap(&self) -> bool {
        let Some(latest) = self.board.latest_path() else {
            return false;
        };
        if !latest.success {
            return false;
        }

        let metadata = self.board.base_grid().metadata();
        let cost_cells = self.costmap.cells();
        if cost_cells.len() != metadata.cell_count() {
            return false;
        }

        latest.waypoints.iter().any(|waypoint| {
            let cell = waypoint.cell();
            if !self.board.contains_cell(cell) {
                return false;
            }
            cost_cells[cell.y as usize * metadata.width + cell.x as usize] >= 1.0
        })
    }

    /// Run the configured planner against the current markers and adopt the
    /// outcome.
    fn run_planner(&mut self) -> Result<()> {
        let goal_cell = self.board.goal_cell();

        let mut planner_start = self.board.start_cell();
        // The incremental planner continues from wherever the agent is; the
        // one-shot planner always starts at the user marker.
        if self.algorithm == PlannerAlgorithm::DStarLite {
            if let Some(agent_cell) = self.board.agent_current_cell() {
                planner_start = Some(agent_cell);
            }
        }

        let (Some(start), Some(goal)) = (planner_start, goal_cell) else {
            self.board.clear_path();
            self.state = ControllerState::Idle;
            return Ok(());
        };

        self.state = ControllerState::Planning;
        self.update_planner_map()?;
        self.planner.set_start(start);
        self.planner.set_goal(goal);

        let label = format!(
            "start=({}, {}) goal=({}, {})",
            start.x, start.y, goal.x, goal.y
        );
        let path = compute_path_timed(self.planner.as_mut(), &label)?;

        if path.success {
            let mut history = Vec::new();
            if self.algorithm == PlannerAlgorithm::DStarLite {
                history = self.board.agent().travelled_polyline();
                if let (Some(last), Some(new_start)) =
                    (history.last().copied(), path.waypoints.first().copied())
                {
                    if last.distance(&new_start) > PATH_HIT_EPSILON {
                        history.push(new_start);
                    }
                }
            }

            info!("planner: path updated with {} waypoints", path.waypoints.len());
            self.board.set_path(path, &history);
            self.state = ControllerState::Following;
        } else {
            info!("planner: no path found for the current start/goal");
            self.board.clear_path();
            self.state = ControllerState::Failed;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use marga_map::Metadata;

    fn create_test_grid(width: usize, height: usize, obstacles: &[(i32, i32)]) -> Grid {
        let mut cells = vec![0.0; width * height];
        for &(x, y) in obstacles {
            cells[y as usize * width + x as usize] = 1.0;
        }
        Grid::new(
            Metadata {
                width,
                height,
                resolution: 1.0,
            },
            cells,
        )
        .unwrap()
    }

    fn create_test_agent(speed: f32, observation_range: f32) -> Agent {
        let mut agent = Agent::new(speed);
        // A small body keeps the inflation radius at the 1-cell minimum.
        agent.configure_physical_size(1.0, 1.0);
        agent.set_observation_range_meters(observation_range);
        agent
    }

    fn create_controller(
        grid: Grid,
        algorithm: PlannerAlgorithm,
        speed: f32,
        observation_range: f32,
    ) -> Controller {
        Controller::new(grid, algorithm, create_test_agent(speed, observation_range)).unwrap()
    }

    #[test]
    fn test_marker_selection_plans_a_path() {
        let mut controller = create_controller(
            create_test_grid(10, 10, &[]),
            PlannerAlgorithm::AStar,
            1.0,
            2.0,
        );
        assert_eq!(controller.state(), ControllerState::Idle);

        assert!(controller.set_start_marker(GridCoord::new(0, 0)).unwrap());
        // Only a start: still idle.
        assert_eq!(controller.state(), ControllerState::Idle);

        assert!(controller.set_goal_marker(GridCoord::new(9, 0)).unwrap());
        assert_eq!(controller.state(), ControllerState::Following);

        let path = controller.board().latest_path().unwrap();
        assert!(path.success);
        assert_eq!(path.waypoints.len(), 10);
    }

    #[test]
    fn test_rejects_marker_on_obstacle() {
        let mut controller = create_controller(
            create_test_grid(8, 8, &[(4, 4)]),
            PlannerAlgorithm::AStar,
            1.0,
            2.0,
        );

        assert!(!controller.set_start_marker(GridCoord::new(4, 4)).unwrap());
        // Cells swallowed by inflation are not selectable either.
        assert!(!controller.set_start_marker(GridCoord::new(4, 5)).unwrap());
        assert!(controller.set_start_marker(GridCoord::new(0, 0)).unwrap());
    }

    #[test]
    fn test_unreachable_goal_fails() {
        // A wall splits the map in two.
        let wall: Vec<(i32, i32)> = (0..8).map(|y| (4, y)).collect();
        let mut controller = create_controller(
            create_test_grid(9, 8, &wall),
            PlannerAlgorithm::AStar,
            1.0,
            2.0,
        );

        controller.set_start_marker(GridCoord::new(0, 0)).unwrap();
        controller.set_goal_marker(GridCoord::new(8, 7)).unwrap();

        assert_eq!(controller.state(), ControllerState::Failed);
        assert!(controller.board().latest_path().is_none());
    }

    #[test]
    fn test_agent_completes_plan() {
        let mut controller = create_controller(
            create_test_grid(6, 1, &[]),
            PlannerAlgorithm::AStar,
            5.0,
            1.0,
        );
        controller.set_start_marker(GridCoord::new(0, 0)).unwrap();
        controller.set_goal_marker(GridCoord::new(5, 0)).unwrap();
        assert_eq!(controller.state(), ControllerState::Following);

        for _ in 0..40 {
            controller.tick(0.05).unwrap();
        }
        assert_eq!(controller.state(), ControllerState::Completed);
    }

    #[test]
    fn test_hidden_obstacle_is_invisible_until_observed() {
        let mut controller = create_controller(
            create_test_grid(10, 10, &[]),
            PlannerAlgorithm::AStar,
            1.0,
            2.0,
        );
        controller.set_start_marker(GridCoord::new(0, 0)).unwrap();
        controller.set_goal_marker(GridCoord::new(9, 0)).unwrap();

        assert!(controller
            .add_dynamic_obstacle(GridCoord::new(5, 0), ObstacleVisibility::Hidden)
            .unwrap());

        // The runtime grid and the plan are untouched.
        let idx = 5;
        assert_eq!(controller.board().runtime_cells()[idx], 0.0);
        assert!(controller.board().latest_path().unwrap().success);
        assert_eq!(
            controller.board().latest_path().unwrap().waypoints.len(),
            10
        );
    }

    #[test]
    fn test_visible_obstacle_forces_immediate_replan() {
        let mut controller = create_controller(
            create_test_grid(10, 10, &[]),
            PlannerAlgorithm::AStar,
            1.0,
            2.0,
        );
        controller.set_start_marker(GridCoord::new(0, 0)).unwrap();
        controller.set_goal_marker(GridCoord::new(9, 0)).unwrap();
        let straight_length = controller.board().latest_path().unwrap().total_length();

        assert!(controller
            .add_dynamic_obstacle(GridCoord::new(5, 0), ObstacleVisibility::Visible)
            .unwrap());

        assert_eq!(controller.board().runtime_cells()[5], 1.0);
        let replanned = controller.board().latest_path().unwrap();
        assert!(replanned.success);
        assert!(replanned.total_length() > straight_length);
        assert!(replanned
            .waypoints
            .iter()
            .all(|w| w.cell() != GridCoord::new(5, 0)));
    }

    #[test]
    fn test_remove_visible_obstacle_restores_straight_path() {
        let mut controller = create_controller(
            create_test_grid(10, 10, &[]),
            PlannerAlgorithm::AStar,
            1.0,
            2.0,
        );
        controller.set_start_marker(GridCoord::new(0, 0)).unwrap();
        controller.set_goal_marker(GridCoord::new(9, 0)).unwrap();

        controller
            .add_dynamic_obstacle(GridCoord::new(5, 0), ObstacleVisibility::Visible)
            .unwrap();
        assert!(controller
            .remove_dynamic_obstacle(GridCoord::new(5, 0))
            .unwrap());

        assert_eq!(controller.board().runtime_cells()[5], 0.0);
        let path = controller.board().latest_path().unwrap();
        assert!((path.total_length() - 9.0).abs() < 1e-4);
    }

    #[test]
    fn test_fog_of_war_discovery_triggers_detour() {
        let mut controller = create_controller(
            create_test_grid(10, 10, &[]),
            PlannerAlgorithm::DStarLite,
            1.0,
            2.0,
        );
        controller.set_start_marker(GridCoord::new(0, 0)).unwrap();
        controller.set_goal_marker(GridCoord::new(9, 0)).unwrap();
        controller
            .add_dynamic_obstacle(GridCoord::new(5, 0), ObstacleVisibility::Hidden)
            .unwrap();

        // The initial plan runs straight through the hidden obstacle's cell.
        assert!((controller.board().latest_path().unwrap().total_length() - 9.0).abs() < 1e-4);

        // Four simulated seconds at 1 cell/s bring the observation disk
        // within reach of the obstacle.
        for _ in 0..80 {
            controller.tick(0.05).unwrap();
        }

        assert!(controller.board().is_visible_obstacle(GridCoord::new(5, 0)));
        assert_eq!(controller.board().runtime_cells()[5], 1.0);
        assert_eq!(controller.state(), ControllerState::Following);

        let replanned = controller.board().latest_path().unwrap();
        assert!(replanned.success);
        // The detour leaves row 0 around the discovery.
        assert!(replanned.waypoints.iter().any(|w| w.y > 1.0));
        assert!(replanned
            .waypoints
            .iter()
            .all(|w| w.cell() != GridCoord::new(5, 0)));
        assert_eq!(
            replanned.waypoints.last().map(|w| w.cell()),
            Some(GridCoord::new(9, 0))
        );

        // The travel trail stays continuous across the replan.
        let history = controller.board().travel_history();
        assert!(!history.is_empty());
        assert_eq!(history[0], GridPoint::new(0.5, 0.5));

        // Let the agent finish the detour.
        for _ in 0..400 {
            controller.tick(0.05).unwrap();
        }
        assert_eq!(controller.state(), ControllerState::Completed);
    }

    #[test]
    fn test_off_path_discovery_keeps_astar_plan() {
        let mut controller = create_controller(
            create_test_grid(10, 10, &[]),
            PlannerAlgorithm::AStar,
            1.0,
            3.0,
        );
        controller.set_start_marker(GridCoord::new(0, 0)).unwrap();
        controller.set_goal_marker(GridCoord::new(9, 0)).unwrap();
        let original = controller.board().latest_path().unwrap().clone();

        // Hidden obstacle within observation range but clear of the path and
        // of the inflation radius around it.
        controller
            .add_dynamic_obstacle(GridCoord::new(2, 3), ObstacleVisibility::Hidden)
            .unwrap();
        for _ in 0..20 {
            controller.tick(0.05).unwrap();
        }

        assert!(controller.board().is_visible_obstacle(GridCoord::new(2, 3)));
        let current = controller.board().latest_path().unwrap();
        assert_eq!(original.waypoints, current.waypoints);
    }

    #[test]
    fn test_auto_select_endpoints() {
        let mut controller = create_controller(
            create_test_grid(6, 6, &[]),
            PlannerAlgorithm::AStar,
            1.0,
            2.0,
        );

        assert!(controller.auto_select_endpoints().unwrap());
        assert_eq!(controller.board().start_cell(), Some(GridCoord::new(0, 0)));
        assert_eq!(controller.board().goal_cell(), Some(GridCoord::new(5, 5)));
        assert_eq!(controller.state(), ControllerState::Following);
    }

    #[test]
    fn test_clear_dynamic_obstacles_resets_runtime() {
        let mut controller = create_controller(
            create_test_grid(10, 10, &[]),
            PlannerAlgorithm::AStar,
            1.0,
            2.0,
        );
        controller.set_start_marker(GridCoord::new(0, 0)).unwrap();
        controller.set_goal_marker(GridCoord::new(9, 0)).unwrap();

        controller
            .add_dynamic_obstacle(GridCoord::new(4, 0), ObstacleVisibility::Visible)
            .unwrap();
        controller
            .add_dynamic_obstacle(GridCoord::new(6, 2), ObstacleVisibility::Hidden)
            .unwrap();

        controller.clear_dynamic_obstacles().unwrap();

        assert!(!controller.board().has_dynamic_obstacles());
        assert!(controller.board().runtime_cells().iter().all(|&v| v == 0.0));
        let path = controller.board().latest_path().unwrap();
        assert!((path.total_length() - 9.0).abs() < 1e-4);
    }
}
