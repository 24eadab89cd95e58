//! End-to-end planning scenarios exercising both planners and the
//! discovery loop.

mod common;

use common::{controller_with_endpoints, grid_with_obstacles};

use marga_map::{CostmapLayer, GridCoord, Metadata};
use marga_nav::{
    AStarPlanner, ControllerState, DStarLitePlanner, ObstacleVisibility, PathPlanner,
    PlannedPath, PlannerAlgorithm,
};

const SQRT_2: f32 = std::f32::consts::SQRT_2;

fn plan_with(planner: &mut dyn PathPlanner, start: (i32, i32), goal: (i32, i32)) -> PlannedPath {
    planner.set_start(GridCoord::new(start.0, start.1));
    planner.set_goal(GridCoord::new(goal.0, goal.1));
    planner.compute_path().unwrap()
}

#[test]
fn straight_line_five_cells() {
    let grid = grid_with_obstacles(5, 1, &[]);
    let mut planner = AStarPlanner::new();
    planner.set_map(grid);

    let path = plan_with(&mut planner, (0, 0), (4, 0));

    assert!(path.success);
    assert_eq!(path.waypoints.len(), 5);
    for (i, waypoint) in path.waypoints.iter().enumerate() {
        assert!((waypoint.x - (i as f32 + 0.5)).abs() < 1e-6);
        assert!((waypoint.y - 0.5).abs() < 1e-6);
    }
    assert!((path.total_length() - 4.0).abs() < 1e-6);
    assert!(!path.explored_cells.is_empty());
}

#[test]
fn corner_cut_diagonal_is_rejected() {
    // Obstacles at (1, 0) and (0, 1): the diagonal to (1, 1) would squeeze
    // between them and no alternative exists.
    let grid = grid_with_obstacles(3, 3, &[(1, 0), (0, 1)]);

    let mut astar = AStarPlanner::new();
    astar.set_map(grid.clone());
    let astar_path = plan_with(&mut astar, (0, 0), (1, 1));
    assert!(!astar_path.success);
    assert!(astar_path.waypoints.is_empty());

    let mut dstar = DStarLitePlanner::new();
    dstar.set_map(grid);
    let dstar_path = plan_with(&mut dstar, (0, 0), (1, 1));
    assert!(!dstar_path.success);
    assert!(dstar_path.waypoints.is_empty());
}

#[test]
fn detour_around_wall() {
    // A wall at column 2, rows 0..=1, forces the path over the top.
    let grid = grid_with_obstacles(5, 3, &[(2, 0), (2, 1)]);
    let mut planner = AStarPlanner::new();
    planner.set_map(grid);

    let path = plan_with(&mut planner, (0, 1), (4, 1));

    assert!(path.success);
    assert!((path.total_length() - (2.0 + 2.0 * SQRT_2)).abs() < 1e-4);
}

#[test]
fn inflation_blocks_neighbors_once() {
    let mut layer = CostmapLayer::new(Metadata {
        width: 5,
        height: 5,
        resolution: 1.0,
    });
    let mut base = vec![0.0; 25];
    base[2 * 5 + 2] = 1.0;

    layer.update(&base, 1.5).unwrap();

    for dy in -1..=1i32 {
        for dx in -1..=1i32 {
            assert!(!layer.is_traversable(GridCoord::new(2 + dx, 2 + dy)));
        }
    }
    for cell in [
        GridCoord::new(0, 2),
        GridCoord::new(4, 2),
        GridCoord::new(2, 0),
        GridCoord::new(2, 4),
    ] {
        assert!(layer.is_traversable(cell));
    }
    assert_eq!(layer.inflation_centers().len(), 8);
}

#[test]
fn planners_agree_on_path_length() {
    let obstacles = [(3, 2), (3, 3), (3, 4), (6, 6), (7, 2)];
    let grid = grid_with_obstacles(10, 10, &obstacles);

    let mut astar = AStarPlanner::new();
    astar.set_map(grid.clone());
    let astar_path = plan_with(&mut astar, (0, 0), (9, 9));

    let mut dstar = DStarLitePlanner::new();
    dstar.set_map(grid);
    let dstar_path = plan_with(&mut dstar, (0, 0), (9, 9));

    assert!(astar_path.success);
    assert!(dstar_path.success);
    // The cell sequences may differ on ties, the lengths may not.
    assert!((astar_path.total_length() - dstar_path.total_length()).abs() < 1e-3);
}

#[test]
fn dstar_incremental_obstacle() {
    let mut planner = DStarLitePlanner::new();
    planner.set_map(grid_with_obstacles(10, 10, &[]));

    let original = plan_with(&mut planner, (0, 0), (9, 9));
    assert!(original.success);
    let crossed = original
        .waypoints
        .iter()
        .any(|w| w.cell() == GridCoord::new(5, 5));

    planner.set_map(grid_with_obstacles(10, 10, &[(5, 5)]));
    let replanned = planner.compute_path().unwrap();

    assert!(replanned.success);
    assert!(replanned.total_length() >= 9.0 * SQRT_2 - 1e-3);
    if crossed {
        assert!(replanned.total_length() > original.total_length() + 1e-3);
    }
}

#[test]
fn dstar_second_compute_expands_nothing() {
    let mut planner = DStarLitePlanner::new();
    planner.set_map(grid_with_obstacles(12, 12, &[(6, 6), (6, 7)]));

    let first = plan_with(&mut planner, (0, 0), (11, 11));
    assert!(first.success);

    let second = planner.compute_path().unwrap();
    assert!(second.success);
    assert_eq!(first.waypoints, second.waypoints);
    assert!(second.explored_cells.is_empty());
}

#[test]
fn fog_of_war_discovery_detours() {
    let mut controller = controller_with_endpoints(
        grid_with_obstacles(10, 10, &[]),
        PlannerAlgorithm::DStarLite,
        (0, 0),
        (9, 0),
    );
    controller
        .add_dynamic_obstacle(GridCoord::new(5, 0), ObstacleVisibility::Hidden)
        .unwrap();

    let initial = controller.board().latest_path().unwrap();
    assert!((initial.total_length() - 9.0).abs() < 1e-4);

    // Roughly four seconds at 1 cell/s puts the 2-cell observation disk on
    // the hidden obstacle.
    for _ in 0..80 {
        controller.tick(0.05).unwrap();
    }

    assert!(controller.board().is_visible_obstacle(GridCoord::new(5, 0)));
    assert_eq!(controller.board().runtime_cells()[5], 1.0);

    let replanned = controller.board().latest_path().unwrap();
    assert!(replanned.success);
    assert!(replanned.waypoints.iter().any(|w| w.y > 1.0));
    assert_eq!(
        replanned.waypoints.last().map(|w| w.cell()),
        Some(GridCoord::new(9, 0))
    );

    // The session runs to completion on the detour.
    for _ in 0..600 {
        controller.tick(0.05).unwrap();
    }
    assert_eq!(controller.state(), ControllerState::Completed);
}

#[test]
fn fog_of_war_dead_end_reports_failure() {
    // A wall at column 3 leaves a single opening at (3, 3). Once the hidden
    // obstacle there is discovered, inflation seals the opening and no path
    // remains.
    let wall = [(3, 0), (3, 1), (3, 5), (3, 6)];
    let mut controller = controller_with_endpoints(
        grid_with_obstacles(8, 7, &wall),
        PlannerAlgorithm::AStar,
        (0, 3),
        (7, 3),
    );
    assert_eq!(controller.state(), ControllerState::Following);

    controller
        .add_dynamic_obstacle(GridCoord::new(3, 3), ObstacleVisibility::Hidden)
        .unwrap();

    for _ in 0..100 {
        controller.tick(0.05).unwrap();
    }

    // Discovery walls off the only opening; the replan must fail.
    assert!(controller.board().is_visible_obstacle(GridCoord::new(3, 3)));
    assert_eq!(controller.state(), ControllerState::Failed);
    assert!(controller.board().latest_path().is_none());
}
