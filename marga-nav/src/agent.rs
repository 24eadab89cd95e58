//! Constant-speed agent following a planned polyline.
//!
//! The agent adopts the waypoints of the latest plan, advances along them at
//! a fixed speed in cells per second and exposes its interpolated position,
//! its observation radius and the polyline it has already travelled.

use tracing::debug;

use marga_map::GridPoint;

use crate::planning::PlannedPath;

const MIN_RESOLUTION: f32 = 1e-3;
const DEFAULT_SPEED_CELLS_PER_SEC: f32 = 4.0;
const DEFAULT_DIAMETER_METERS: f32 = 2.0;
const DEFAULT_OBSERVATION_RANGE_METERS: f32 = 5.0;

/// Disk-shaped agent traversing plan waypoints.
pub struct Agent {
    waypoints: Vec<GridPoint>,
    segment_lengths: Vec<f32>,
    total_length: f32,
    distance_travelled: f32,
    /// Travel speed in cells per second
    speed: f32,
    current_position: GridPoint,
    path_available: bool,
    playing: bool,

    diameter_meters: f32,
    resolution: f32,
    observation_range_meters: f32,
    footprint_radius_cells: f32,
    observation_radius_cells: f32,
}

impl Agent {
    /// Create an agent with the given speed in cells per second.
    pub fn new(speed_cells_per_second: f32) -> Self {
        let mut agent = Self {
            waypoints: Vec::new(),
            segment_lengths: Vec::new(),
            total_length: 0.0,
            distance_travelled: 0.0,
            speed: speed_cells_per_second,
            current_position: GridPoint::default(),
            path_available: false,
            playing: false,
            diameter_meters: DEFAULT_DIAMETER_METERS,
            resolution: 1.0,
            observation_range_meters: DEFAULT_OBSERVATION_RANGE_METERS,
            footprint_radius_cells: 0.0,
            observation_radius_cells: 0.0,
        };
        agent.recalculate_radii();
        agent
    }

    /// Set the physical diameter and the map resolution used to convert it
    /// into cells.
    pub fn configure_physical_size(&mut self, diameter_meters: f32, resolution: f32) {
        self.diameter_meters = diameter_meters.max(0.0);
        self.resolution = resolution.max(MIN_RESOLUTION);
        self.recalculate_radii();
    }

    /// Set the observation range in meters.
    pub fn set_observation_range_meters(&mut self, range_meters: f32) {
        self.observation_range_meters = range_meters.max(0.0);
        self.recalculate_radii();
    }

    fn recalculate_radii(&mut self) {
        let radius_meters = self.diameter_meters * 0.5;
        self.footprint_radius_cells = (radius_meters / self.resolution).max(0.0);
        // The agent always sees at least as far as its own body reaches.
        let observation_meters = self.observation_range_meters.max(radius_meters);
        self.observation_radius_cells =
            (observation_meters / self.resolution).max(self.footprint_radius_cells);
    }

    /// Adopt a new plan, or reset when it is unusable.
    pub fn on_new_path(&mut self, path: &PlannedPath) {
        if !path.success || path.waypoints.len() < 2 {
            self.reset();
            return;
        }

        self.waypoints = path.waypoints.clone();
        self.recompute_segments();
        self.current_position = self.waypoints[0];
        self.distance_travelled = 0.0;
        self.path_available = true;
        self.playing = true;
        debug!(
            "agent: new path with {} waypoints, {:.2} cells total",
            self.waypoints.len(),
            self.total_length
        );
    }

    /// Clear the path and stop.
    pub fn reset(&mut self) {
        self.waypoints.clear();
        self.segment_lengths.clear();
        self.total_length = 0.0;
        self.distance_travelled = 0.0;
        self.path_available = false;
        self.playing = false;
    }

    /// Advance along the path by `delta_seconds`.
    pub fn update(&mut self, delta_seconds: f32) {
        if !self.playing {
            return;
        }

        if self.segment_lengths.is_empty() || self.total_length <= 0.0 {
            self.playing = false;
            return;
        }

        self.distance_travelled =
            (self.distance_travelled + self.speed * delta_seconds).min(self.total_length);
        self.update_current_position();

        if self.distance_travelled >= self.total_length {
            self.playing = false;
        }
    }

    /// Whether a path has been adopted
    pub fn has_path(&self) -> bool {
        self.path_available
    }

    /// Whether the agent is currently advancing
    pub fn is_active(&self) -> bool {
        self.playing
    }

    /// Whether the adopted path has been traversed to its end
    pub fn is_complete(&self) -> bool {
        self.path_available && self.total_length > 0.0 && self.distance_travelled >= self.total_length
    }

    /// Interpolated position along the path
    pub fn current_position(&self) -> GridPoint {
        self.current_position
    }

    /// Footprint radius in cells
    pub fn footprint_radius_cells(&self) -> f32 {
        self.footprint_radius_cells
    }

    /// Observation radius in cells
    pub fn observation_radius_cells(&self) -> f32 {
        self.observation_radius_cells
    }

    /// Fraction of the path travelled, in `[0, 1]`
    pub fn traversal_ratio(&self) -> f32 {
        if !self.path_available || self.total_length <= 1e-6 {
            return 0.0;
        }
        (self.distance_travelled / self.total_length).clamp(0.0, 1.0)
    }

    /// Waypoints fully passed so far, followed by the current position.
    pub fn travelled_polyline(&self) -> Vec<GridPoint> {
        let mut history = Vec::new();
        if !self.path_available || self.waypoints.is_empty() {
            return history;
        }

        history.push(self.waypoints[0]);

        if self.segment_lengths.is_empty() || self.distance_travelled <= 0.0 {
            history.push(self.current_position);
            return history;
        }

        let mut remaining = self.distance_travelled.clamp(0.0, self.total_length);

        for (i, &segment_length) in self.segment_lengths.iter().enumerate() {
            if segment_length <= 1e-6 {
                history.push(self.waypoints[i + 1]);
                continue;
            }

            if remaining >= segment_length {
                history.push(self.waypoints[i + 1]);
                remaining -= segment_length;
                continue;
            }

            let t = (remaining / segment_length).clamp(0.0, 1.0);
            history.push(self.waypoints[i].lerp(&self.waypoints[i + 1], t));
            remaining = 0.0;
            break;
        }

        if remaining > 0.0 && self.waypoints.len() >= 2 {
            history.push(*self.waypoints.last().expect("waypoints checked above"));
        }

        if history
            .last()
            .map_or(true, |last| *last != self.current_position)
        {
            history.push(self.current_position);
        }

        history
    }

    fn recompute_segments(&mut self) {
        self.segment_lengths.clear();
        self.total_length = 0.0;

        for pair in self.waypoints.windows(2) {
            let length = pair[0].distance(&pair[1]);
            self.segment_lengths.push(length);
            self.total_length += length;
        }
    }

    fn update_current_position(&mut self) {
        if self.segment_lengths.is_empty() {
            self.current_position = self
                .waypoints
                .last()
                .copied()
                .unwrap_or_default();
            return;
        }

        let mut remaining = self.distance_travelled;

        for (i, &segment_length) in self.segment_lengths.iter().enumerate() {
            if segment_length <= 0.0 {
                continue;
            }

            if remaining > segment_length {
                remaining -= segment_length;
                continue;
            }

            let t = (remaining / segment_length).clamp(0.0, 1.0);
            self.current_position = self.waypoints[i].lerp(&self.waypoints[i + 1], t);
            return;
        }

        self.current_position = *self.waypoints.last().expect("segments imply waypoints");
    }
}

impl Default for Agent {
    fn default() -> Self {
        Self::new(DEFAULT_SPEED_CELLS_PER_SEC)
    }
}
