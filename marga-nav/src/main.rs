//! Marga-Nav - headless fog-of-war planning simulation.
//!
//! Loads a map, auto-selects start and goal cells, then drives the
//! plan/traverse/observe/replan loop until the agent reaches the goal or the
//! time limit expires. Hidden obstacles listed in the scenario are revealed
//! as the agent's observation disk sweeps over them.

use std::path::Path;

use tracing::{info, warn};

use marga_map::io::load_map;
use marga_map::GridCoord;
use marga_nav::{Agent, Controller, ControllerState, NavConfig, ObstacleVisibility, Result};

const DEFAULT_CONFIG_PATH: &str = "marga.toml";
const DEFAULT_MAP_PATH: &str = "data/office.map";

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("marga_nav=info".parse().expect("static directive parses")),
        )
        .init();

    // Parse command line arguments
    let args: Vec<String> = std::env::args().collect();

    let config = if args.len() > 1 && !args[1].starts_with("--") {
        let config_path = Path::new(&args[1]);
        info!("Loading configuration from {:?}", config_path);
        NavConfig::load(config_path)?
    } else if Path::new(DEFAULT_CONFIG_PATH).exists() {
        info!("Loading configuration from {}", DEFAULT_CONFIG_PATH);
        NavConfig::load(Path::new(DEFAULT_CONFIG_PATH))?
    } else {
        info!("Using default configuration");
        NavConfig::default()
    };

    let map_path = args
        .iter()
        .position(|a| a == "--map")
        .and_then(|i| args.get(i + 1))
        .cloned()
        .unwrap_or_else(|| DEFAULT_MAP_PATH.to_string());

    info!("Marga-Nav v{}", env!("CARGO_PKG_VERSION"));

    // Load the map
    let grid = load_map(Path::new(&map_path))?;
    info!("Loaded map {}: {}", map_path, grid.metadata().summary());

    // Configure the agent from physical parameters
    let mut agent = Agent::new(config.agent.speed_cells_per_sec);
    agent.configure_physical_size(config.agent.diameter_meters, grid.metadata().resolution);
    agent.set_observation_range_meters(config.agent.observation_range_meters);
    info!(
        "Agent: speed {:.1} cells/s, footprint {:.2} cells, observation {:.2} cells",
        config.agent.speed_cells_per_sec,
        agent.footprint_radius_cells(),
        agent.observation_radius_cells()
    );

    let mut controller = Controller::new(grid, config.planner.algorithm, agent)?;
    info!("Planner: {:?}", controller.algorithm());

    if !controller.auto_select_endpoints()? {
        warn!("Unable to auto-select traversable start/goal cells on this map");
        return Ok(());
    }

    // Seed the scenario's hidden obstacles; they stay invisible to the
    // planner until the agent observes them.
    for &[x, y] in &config.scenario.hidden_obstacles {
        let cell = GridCoord::new(x, y);
        if controller.add_dynamic_obstacle(cell, ObstacleVisibility::Hidden)? {
            info!("Hidden obstacle placed at ({}, {})", x, y);
        } else {
            warn!("Ignoring hidden obstacle at ({}, {})", x, y);
        }
    }

    let board = controller.board();
    info!(
        "Start {:?}, goal {:?}",
        board.start_cell(),
        board.goal_cell()
    );
    match board.latest_path() {
        Some(path) if path.success => {
            info!(
                "Initial path: {} waypoints, {:.2} cells",
                path.waypoints.len(),
                path.total_length()
            );
        }
        _ => {
            warn!("No initial path between the selected start and goal");
            return Ok(());
        }
    }

    // Drive the closed loop
    let delta = 1.0 / config.simulation.tick_hz.max(1.0);
    let mut elapsed = 0.0f32;

    while elapsed < config.simulation.time_limit_secs {
        controller.tick(delta)?;
        elapsed += delta;

        match controller.state() {
            ControllerState::Completed => {
                info!("Agent reached the goal after {:.1} simulated seconds", elapsed);
                return Ok(());
            }
            ControllerState::Failed => {
                warn!("Planner found no path after {:.1} simulated seconds", elapsed);
                return Ok(());
            }
            _ => {}
        }
    }

    warn!(
        "Time limit of {:.0}s reached in state {:?}",
        config.simulation.time_limit_secs,
        controller.state()
    );
    Ok(())
}
