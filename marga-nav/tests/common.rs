//! Test utilities for end-to-end planning scenarios.

#![allow(dead_code)]

use marga_map::{Grid, GridCoord, Metadata};
use marga_nav::{Agent, Controller, PlannerAlgorithm};

/// Build a grid with the given obstacles set to `1.0`.
pub fn grid_with_obstacles(width: usize, height: usize, obstacles: &[(i32, i32)]) -> Grid {
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

/// Agent with a 1-cell-diameter body so the costmap inflates by the 1-cell
/// minimum, and the given speed and observation range.
pub fn small_agent(speed_cells_per_sec: f32, observation_range_cells: f32) -> Agent {
    let mut agent = Agent::new(speed_cells_per_sec);
    agent.configure_physical_size(1.0, 1.0);
    agent.set_observation_range_meters(observation_range_cells);
    agent
}

/// Controller over an empty grid with start and goal markers placed.
pub fn controller_with_endpoints(
    grid: Grid,
    algorithm: PlannerAlgorithm,
    start: (i32, i32),
    goal: (i32, i32),
) -> Controller {
    let mut controller = Controller::new(grid, algorithm, small_agent(1.0, 2.0)).unwrap();
    assert!(controller
        .set_start_marker(GridCoord::new(start.0, start.1))
        .unwrap());
    assert!(controller
        .set_goal_marker(GridCoord::new(goal.0, goal.1))
        .unwrap());
    controller
}
