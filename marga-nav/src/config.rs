//! Configuration loading for the navigation layer.

use serde::Deserialize;
use std::path::Path;

use crate::error::{NavError, Result};
use crate::planning::PlannerAlgorithm;

/// Main configuration structure
#[derive(Clone, Debug, Deserialize)]
pub struct NavConfig {
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub planner: PlannerConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub scenario: ScenarioConfig,
}

/// Agent physical parameters
#[derive(Clone, Debug, Deserialize)]
pub struct AgentConfig {
    /// Travel speed along the plan in cells per second (default: 4.0)
    #[serde(default = "default_speed")]
    pub speed_cells_per_sec: f32,

    /// Physical agent diameter in meters (default: 2.0)
    #[serde(default = "default_diameter")]
    pub diameter_meters: f32,

    /// Observation range in meters (default: 5.0)
    #[serde(default = "default_observation_range")]
    pub observation_range_meters: f32,
}

/// Planner selection
#[derive(Clone, Debug, Deserialize)]
pub struct PlannerConfig {
    /// Planning algorithm: `a-star` or `d-star-lite` (default: `a-star`)
    #[serde(default = "default_algorithm")]
    pub algorithm: PlannerAlgorithm,
}

/// Headless simulation parameters
#[derive(Clone, Debug, Deserialize)]
pub struct SimulationConfig {
    /// Tick rate driving the discovery loop (default: 60 Hz)
    #[serde(default = "default_tick_hz")]
    pub tick_hz: f32,

    /// Wall-clock limit on the simulated session in seconds (default: 120)
    #[serde(default = "default_time_limit")]
    pub time_limit_secs: f32,
}

/// Obstacles placed before the simulation starts
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ScenarioConfig {
    /// Cells holding obstacles the agent has to discover, as `[x, y]` pairs
    #[serde(default)]
    pub hidden_obstacles: Vec<[i32; 2]>,
}

// Default value functions
fn default_speed() -> f32 {
    4.0
}
fn default_diameter() -> f32 {
    2.0
}
fn default_observation_range() -> f32 {
    5.0
}
fn default_algorithm() -> PlannerAlgorithm {
    PlannerAlgorithm::AStar
}
fn default_tick_hz() -> f32 {
    60.0
}
fn default_time_limit() -> f32 {
    120.0
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            speed_cells_per_sec: default_speed(),
            diameter_meters: default_diameter(),
            observation_range_meters: default_observation_range(),
        }
    }
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            algorithm: default_algorithm(),
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick_hz: default_tick_hz(),
            time_limit_secs: default_time_limit(),
        }
    }
}

impl Default for NavConfig {
    fn default() -> Self {
        Self {
            agent: AgentConfig::default(),
            planner: PlannerConfig::default(),
            simulation: SimulationConfig::default(),
            scenario: ScenarioConfig::default(),
        }
    }
}

impl NavConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| NavError::Config(format!("failed to read config file: {}", e)))?;
        let config: NavConfig = toml::from_str(&content)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = NavConfig::default();
        assert_eq!(config.agent.speed_cells_per_sec, 4.0);
        assert_eq!(config.agent.diameter_meters, 2.0);
        assert_eq!(config.planner.algorithm, PlannerAlgorithm::AStar);
        assert_eq!(config.simulation.tick_hz, 60.0);
    }

    #[test]
    fn test_parse_partial_config() {
        let config: NavConfig = toml::from_str(
            r#"
            [agent]
            speed_cells_per_sec = 2.5

            [planner]
            algorithm = "d-star-lite"

            [scenario]
            hidden_obstacles = [[5, 0], [6, 3]]
            "#,
        )
        .unwrap();

        assert_eq!(config.agent.speed_cells_per_sec, 2.5);
        // Unspecified fields keep their defaults.
        assert_eq!(config.agent.diameter_meters, 2.0);
        assert_eq!(config.planner.algorithm, PlannerAlgorithm::DStarLite);
        assert_eq!(config.scenario.hidden_obstacles, vec![[5, 0], [6, 3]]);
    }

    #[test]
    fn test_rejects_unknown_algorithm() {
        let result: std::result::Result<NavConfig, _> = toml::from_str(
            r#"
            [planner]
            algorithm = "dijkstra"
            "#,
        );
        assert!(result.is_err());
    }
}
