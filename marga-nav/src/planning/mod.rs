//! Path planning types, the planner interface and shared grid predicates.

mod astar;
mod dstar_lite;
pub mod utils;

pub use astar::AStarPlanner;
pub use dstar_lite::DStarLitePlanner;

use std::time::Instant;

use serde::Deserialize;
use tracing::info;

use marga_map::{Grid, GridCoord, GridPoint};

use crate::error::Result;

/// Supported path serialization styles.
///
/// Only polylines exist today; continuous styles can be added later.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PathStyle {
    #[default]
    Polyline,
}

/// Outcome of a planner invocation.
#[derive(Clone, Debug, Default)]
pub struct PlannedPath {
    /// Representation format of the generated path
    pub style: PathStyle,
    /// Ordered waypoints at cell centers, start to goal
    pub waypoints: Vec<GridPoint>,
    /// Cells expanded during planning, in expansion order, for visualization
    pub explored_cells: Vec<GridCoord>,
    /// Whether a valid path was found
    pub success: bool,
}

impl PlannedPath {
    /// A failed path with no waypoints.
    pub fn failed() -> Self {
        Self::default()
    }

    /// Sum of the waypoint segment lengths, in cells.
    pub fn total_length(&self) -> f32 {
        self.waypoints
            .windows(2)
            .map(|pair| pair[0].distance(&pair[1]))
            .sum()
    }
}

/// Planner algorithm selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlannerAlgorithm {
    AStar,
    DStarLite,
}

/// Common interface for grid path planners.
///
/// Planners are stateful: the map, start and goal are configured up front and
/// `compute_path` may be called repeatedly as any of them change. Incremental
/// planners exploit this to reuse work between calls.
pub trait PathPlanner {
    /// Supply a grid map that may change over time.
    fn set_map(&mut self, grid: Grid);

    /// Configure the start cell.
    fn set_start(&mut self, cell: GridCoord);

    /// Configure the goal cell.
    fn set_goal(&mut self, cell: GridCoord);

    /// Compute a path honouring previously observed map changes.
    ///
    /// Unreachable goals and blocked endpoints yield a failed [`PlannedPath`].
    /// Missing configuration is implementation-defined: [`AStarPlanner`]
    /// returns an error when the map, start or goal was never set, while
    /// [`DStarLitePlanner`] folds an unconfigured planner into its general
    /// invalid-start/goal failed-path case. Generic callers must handle both
    /// `Err` and `success == false`.
    fn compute_path(&mut self) -> Result<PlannedPath>;
}

/// Build a planner instance for the selected algorithm.
pub fn make_planner(algorithm: PlannerAlgorithm) -> Box<dyn PathPlanner> {
    match algorithm {
        PlannerAlgorithm::AStar => Box::new(AStarPlanner::new()),
        PlannerAlgorithm::DStarLite => Box::new(DStarLitePlanner::new()),
    }
}

/// Run `compute_path` and log how long the invocation took.
pub fn compute_path_timed(planner: &mut dyn PathPlanner, label: &str) -> Result<PlannedPath> {
    let started = Instant::now();
    let path = planner.compute_path()?;
    info!(
        "planner [{}] took {:.2} ms",
        label,
        started.elapsed().as_secs_f64() * 1000.0
    );
    Ok(path)
}
