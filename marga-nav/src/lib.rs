//! # Marga-Nav: Grid Path Planning with Fog-of-War Discovery
//!
//! The planning and control layer of the Marga engine. A closed loop ties
//! the pieces together:
//!
//! ```text
//!   plan -> traverse -> observe -> update costmap -> replan
//! ```
//!
//! - [`planning`] holds the planner interface, the one-shot A\* planner and
//!   the incremental D\* Lite planner, all sharing the same 8-connected
//!   topology, octile heuristic and corner-cutting policy
//! - [`agent`] moves a disk-shaped agent along plan waypoints at constant
//!   speed and exposes its observation radius
//! - [`board`] keeps the runtime session state: runtime cell values,
//!   hidden/visible dynamic obstacles, markers, the latest plan and the
//!   stitched travel history
//! - [`controller`] drives the per-frame loop, revealing hidden obstacles
//!   under the agent's observation disk and replanning when the plan is
//!   invalidated
//!
//! Everything is single-threaded cooperative: one `tick` call runs the
//! pipeline in a strict order, so a costmap mutation made by an observation
//! is always visible to the planner invocation later in the same frame.

pub mod agent;
pub mod board;
pub mod config;
pub mod controller;
pub mod error;
pub mod planning;

pub use agent::Agent;
pub use board::{Board, ObstacleVisibility};
pub use config::NavConfig;
pub use controller::{Controller, ControllerState};
pub use error::{NavError, Result};
pub use planning::{
    AStarPlanner, DStarLitePlanner, PathPlanner, PathStyle, PlannedPath, PlannerAlgorithm,
};
