//! Main simulation world that ties everything together
//!
//! Owns the intersection geometry, the traffic light, the congestion counter
//! and every vehicle, and advances them all in a fixed order on each tick.

use anyhow::{bail, Context, Result};
use log::{debug, trace};
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::Rng;
use rand::SeedableRng;
use std::collections::HashMap;

use super::config::{SimConfig, DEFAULT_SPEED_CHOICES};
use super::counter::{CongestionCounter, CongestionSnapshot};
use super::intersection::IntersectionGeometry;
use super::lane_manager::{self, LaneOrder};
use super::traffic_light::{Countdown, LaneSignal, PhaseChange, SignalPhase, TrafficLightController};
use super::types::{LaneId, SimId, VehicleId, VehicleType};
use super::vehicle::SimVehicle;

/// Phase changes kept for [`SimWorld::drain_phase_changes`]
const MAX_PENDING_PHASE_CHANGES: usize = 64;

/// Running totals for a simulation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimStats {
    pub vehicles_spawned: usize,
    pub vehicles_exited: usize,
    /// Spawn attempts refused because the lane was too crowded. A lane that
    /// stays blocked across several ticks counts once.
    pub spawns_rejected: usize,
    pub phase_changes: usize,
    /// Simulated seconds
    pub elapsed: f32,
}

/// The main simulation world
pub struct SimWorld {
    config: SimConfig,

    /// Box, lanes and stop lines
    pub geometry: IntersectionGeometry,

    /// All vehicles
    pub vehicles: HashMap<VehicleId, SimVehicle>,

    traffic_light: TrafficLightController,

    counter: CongestionCounter,

    /// Seconds until each lane may spawn again, indexed by [`LaneId::index`]
    spawn_cooldowns: [f32; 4],

    /// Lanes whose last automatic spawn was refused
    spawn_blocked: [bool; 4],

    /// Next ID to assign
    next_id: usize,

    /// Simulation time
    pub time: f32,

    /// Optional seeded RNG for reproducible simulations
    rng: Option<StdRng>,

    stats: SimStats,

    pending_phase_changes: Vec<PhaseChange>,
}

impl Default for SimWorld {
    fn default() -> Self {
        Self::new_internal(SimConfig::default())
    }
}

impl SimWorld {
    fn new_internal(config: SimConfig) -> Self {
        let geometry =
            IntersectionGeometry::new(config.area, config.road_width, config.stop_line_margin_ratio);
        let traffic_light = if config.signals_enabled {
            TrafficLightController::new(config.timing)
        } else {
            TrafficLightController::new_off(config.timing)
        };
        Self {
            geometry,
            vehicles: HashMap::new(),
            traffic_light,
            counter: CongestionCounter::new(config.congestion),
            spawn_cooldowns: [0.0; 4],
            spawn_blocked: [false; 4],
            next_id: 0,
            time: 0.0,
            rng: config.seed.map(StdRng::seed_from_u64),
            stats: SimStats::default(),
            pending_phase_changes: Vec::new(),
            config,
        }
    }

    /// Create a world from a configuration, rejecting unusable parameters
    pub fn new(config: SimConfig) -> Result<Self> {
        config
            .validate()
            .context("Invalid simulation configuration")?;
        Ok(Self::new_internal(config))
    }

    /// Create a new SimWorld with a seeded RNG for reproducible simulations
    pub fn new_with_seed(seed: u64) -> Self {
        Self::new_internal(SimConfig {
            seed: Some(seed),
            ..SimConfig::default()
        })
    }

    /// Default 600x600 intersection with signals and spawning enabled
    pub fn create_demo_world() -> Self {
        Self::default()
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn traffic_light(&self) -> &TrafficLightController {
        &self.traffic_light
    }

    pub fn traffic_light_mut(&mut self) -> &mut TrafficLightController {
        &mut self.traffic_light
    }

    pub fn counter(&self) -> &CongestionCounter {
        &self.counter
    }

    pub fn counter_mut(&mut self) -> &mut CongestionCounter {
        &mut self.counter
    }

    pub fn stats(&self) -> &SimStats {
        &self.stats
    }

    pub fn signal_phase(&self) -> SignalPhase {
        self.traffic_light.phase()
    }

    pub fn lane_signal(&self, lane: LaneId) -> LaneSignal {
        self.traffic_light.lane_signal(lane)
    }

    pub fn countdown(&self) -> Countdown {
        self.traffic_light.remaining()
    }

    /// Turn automatic spawning on or off
    pub fn set_spawning(&mut self, enabled: bool) {
        self.config.spawn.enabled = enabled;
    }

    pub fn vehicle(&self, id: VehicleId) -> Option<&SimVehicle> {
        self.vehicles.get(&id)
    }

    pub fn vehicle_checked(&self, id: VehicleId) -> Result<&SimVehicle> {
        self.vehicles
            .get(&id)
            .with_context(|| format!("Vehicle {:?} not found", id))
    }

    pub fn vehicle_count(&self) -> usize {
        self.vehicles.len()
    }

    /// Active vehicles of a lane, front of the queue first
    pub fn vehicles_in_lane(&self, lane: LaneId) -> Vec<&SimVehicle> {
        lane_manager::lane_order(&self.vehicles, lane)
            .iter()
            .rev()
            .filter_map(|(_, id)| self.vehicles.get(id))
            .collect()
    }

    /// Phase changes since the last call, oldest first
    pub fn drain_phase_changes(&mut self) -> Vec<PhaseChange> {
        std::mem::take(&mut self.pending_phase_changes)
    }

    /// Count waiting traffic right now (the light samples on its own at the
    /// end of each caution phase)
    pub fn sample_congestion(&mut self) -> CongestionSnapshot {
        self.counter.sample(self.vehicles.values(), &self.geometry)
    }

    /// Get a random value in the given range, using seeded RNG if available
    fn random_range(&mut self, range: std::ops::RangeInclusive<f32>) -> f32 {
        match &mut self.rng {
            Some(rng) => rng.random_range(range),
            None => rand::rng().random_range(range),
        }
    }

    fn choose_vehicle_type(&mut self) -> VehicleType {
        let weight = |vehicle_type: &VehicleType| vehicle_type.spawn_weight();
        let choice = match &mut self.rng {
            Some(rng) => VehicleType::ALL.choose_weighted(rng, weight).copied(),
            None => VehicleType::ALL
                .choose_weighted(&mut rand::rng(), weight)
                .copied(),
        };
        choice.unwrap_or(VehicleType::Sedan)
    }

    fn choose_speed(&mut self) -> f32 {
        let choices = &self.config.spawn.speed_choices;
        let choice = match &mut self.rng {
            Some(rng) => choices.choose(rng),
            None => choices.choose(&mut rand::rng()),
        };
        choice.copied().unwrap_or(DEFAULT_SPEED_CHOICES[0])
    }

    fn next_spawn_interval(&mut self) -> f32 {
        let spawn = &self.config.spawn;
        let (min, max) = (spawn.interval_min, spawn.interval_max);
        self.random_range(min..=max)
    }

    fn peek_vehicle_id(&self) -> VehicleId {
        VehicleId(SimId(self.next_id))
    }

    fn insert_vehicle(&mut self, vehicle: SimVehicle) -> VehicleId {
        let id = vehicle.id;
        self.next_id += 1;
        self.vehicles.insert(id, vehicle);
        self.stats.vehicles_spawned += 1;
        id
    }

    /// Try to spawn a random vehicle at the lane's spawn point.
    ///
    /// Ignores the lane's cooldown and population cap but not its spacing.
    pub fn spawn_vehicle(&mut self, lane: LaneId) -> Option<VehicleId> {
        let spawned = self.try_spawn(lane);
        if spawned.is_none() {
            self.stats.spawns_rejected += 1;
        }
        spawned
    }

    fn try_spawn(&mut self, lane: LaneId) -> Option<VehicleId> {
        let vehicle_type = self.choose_vehicle_type();
        let base_speed = self.choose_speed();
        let spawned = lane_manager::spawn_vehicle(
            self.peek_vehicle_id(),
            lane,
            vehicle_type,
            base_speed,
            &self.geometry,
            &self.config.spawn,
            self.config.dynamics,
            &self.vehicles,
        );

        match spawned {
            Some(vehicle) => {
                debug!(
                    "Spawned {:?} in lane {} at {:.0} px/s",
                    vehicle_type,
                    lane.name(),
                    base_speed
                );
                Some(self.insert_vehicle(vehicle))
            }
            None => {
                trace!("Spawn rejected in lane {}: no room", lane.name());
                None
            }
        }
    }

    /// Place a vehicle with its leading edge `distance_to_stop_line` before
    /// the lane's stop line, driving at its base speed
    pub fn place_vehicle(
        &mut self,
        lane: LaneId,
        vehicle_type: VehicleType,
        base_speed: f32,
        distance_to_stop_line: f32,
    ) -> Result<VehicleId> {
        if !(base_speed >= 0.0) || !base_speed.is_finite() {
            bail!("Base speed must be a non-negative number, got {}", base_speed);
        }
        if !distance_to_stop_line.is_finite() {
            bail!("Placement distance must be finite");
        }

        let size = vehicle_type.dimensions(lane.axis());
        let front = self.geometry.stop_line_progress(lane) - distance_to_stop_line;
        let position = self.geometry.top_left_for_front(lane, size, front);
        let vehicle = SimVehicle::new(
            self.peek_vehicle_id(),
            vehicle_type,
            lane,
            base_speed,
            position,
            self.config.dynamics,
        );

        let lane_vehicles = self.vehicles.values().filter(|other| other.lane == lane);
        if !lane_manager::has_clearance(&vehicle, lane_vehicles, 0.0) {
            bail!(
                "Vehicle placement in lane {} overlaps an existing vehicle",
                lane.name()
            );
        }
        Ok(self.insert_vehicle(vehicle))
    }

    /// Discard every vehicle and switch the light off.
    ///
    /// Totals in [`SimStats`] are kept.
    pub fn clear(&mut self) {
        self.vehicles.clear();
        self.spawn_cooldowns = [0.0; 4];
        self.spawn_blocked = [false; 4];
        self.pending_phase_changes.clear();
        self.traffic_light.switch_off();
    }

    /// Advance the simulation by `delta_secs` seconds.
    ///
    /// Non-positive or non-finite steps are ignored.
    pub fn tick(&mut self, delta_secs: f32) {
        if !(delta_secs > 0.0) || !delta_secs.is_finite() {
            return;
        }
        self.time += delta_secs;
        self.stats.elapsed += delta_secs;

        // Light first, so vehicles react to this tick's signals
        self.update_traffic_light(delta_secs);

        self.update_spawning(delta_secs);

        let departed = lane_manager::remove_departed(
            &mut self.vehicles,
            &self.geometry,
            self.config.spawn.exit_margin,
        );
        if !departed.is_empty() {
            trace!("{} vehicle(s) left the area", departed.len());
            self.stats.vehicles_exited += departed.len();
        }

        let orders: Vec<(LaneId, LaneOrder)> = LaneId::ALL
            .iter()
            .map(|lane| (*lane, lane_manager::lane_order(&self.vehicles, *lane)))
            .collect();

        for (lane, order) in &orders {
            let signal = self.traffic_light.lane_signal(*lane);
            lane_manager::steer_lane(
                &mut self.vehicles,
                *lane,
                order,
                signal,
                &self.geometry,
                &self.config.gating,
            );
        }

        for vehicle in self.vehicles.values_mut() {
            vehicle.update(delta_secs);
        }

        for (_, order) in &orders {
            lane_manager::correct_overlaps(
                &mut self.vehicles,
                order,
                self.config.dynamics.standstill_gap,
            );
        }
    }

    fn update_traffic_light(&mut self, dt: f32) {
        let counter = &mut self.counter;
        let vehicles = &self.vehicles;
        let geometry = &self.geometry;
        let changes = self
            .traffic_light
            .tick(dt, || counter.sample(vehicles.values(), geometry));
        if changes.is_empty() {
            return;
        }

        self.stats.phase_changes += changes.len();
        self.pending_phase_changes.extend(changes);
        let excess = self
            .pending_phase_changes
            .len()
            .saturating_sub(MAX_PENDING_PHASE_CHANGES);
        self.pending_phase_changes.drain(..excess);
    }

    fn update_spawning(&mut self, dt: f32) {
        for lane in LaneId::ALL {
            let index = lane.index();
            self.spawn_cooldowns[index] = (self.spawn_cooldowns[index] - dt).max(0.0);

            if !self.config.spawn.enabled || self.spawn_cooldowns[index] > 0.0 {
                continue;
            }
            if lane_manager::lane_population(&self.vehicles, lane) >= self.config.spawn.max_per_lane
            {
                continue;
            }
            // A rejected spawn is retried next tick
            if self.try_spawn(lane).is_some() {
                self.spawn_blocked[index] = false;
                self.spawn_cooldowns[index] = self.next_spawn_interval();
            } else if !self.spawn_blocked[index] {
                self.spawn_blocked[index] = true;
                self.stats.spawns_rejected += 1;
            }
        }
    }

    /// Multi-line status report
    pub fn summary(&self) -> String {
        let mut lines = vec![
            "=== Intersection Simulation Summary ===".to_string(),
            format!("Time: {:.2}s", self.time),
            format!(
                "Signal: {} ({})",
                self.traffic_light.phase(),
                self.traffic_light.countdown_label()
            ),
            format!("Vehicles: {}", self.vehicles.len()),
        ];

        for lane in LaneId::ALL {
            let queue = self.vehicles_in_lane(lane);
            let stopped = queue.iter().filter(|v| v.current_speed <= 0.0).count();
            lines.push(format!(
                "  {:<17} {:?}: {} vehicle(s), {} stopped",
                lane.name(),
                self.traffic_light.lane_signal(lane),
                queue.len(),
                stopped
            ));
        }

        let congestion = self.counter.summary();
        lines.push(format!(
            "Last count: horizontal {} ({:.0} px), vertical {} ({:.0} px)",
            congestion.horizontal.count,
            congestion.horizontal.length,
            congestion.vertical.count,
            congestion.vertical.length
        ));
        lines.push(format!(
            "Spawned: {}, exited: {}, rejected: {}",
            self.stats.vehicles_spawned, self.stats.vehicles_exited, self.stats.spawns_rejected
        ));
        lines.join("\n")
    }

    pub fn print_summary(&self) {
        println!("{}", self.summary());
    }

    /// Coarse character map of the area, `cell` pixels per character
    pub fn render_map(&self, cell: f32) -> String {
        let area = self.geometry.area;
        let cell = if cell > 0.0 { cell } else { 20.0 };
        let columns = ((area.width / cell).ceil() as usize).max(1);
        let rows = ((area.height / cell).ceil() as usize).max(1);
        let mut grid = vec![vec![' '; columns]; rows];

        let to_grid = |x: f32, y: f32| -> Option<(usize, usize)> {
            let col = ((x - area.left()) / cell).floor();
            let row = ((y - area.top()) / cell).floor();
            if col < 0.0 || row < 0.0 {
                return None;
            }
            let (col, row) = (col as usize, row as usize);
            (col < columns && row < rows).then_some((row, col))
        };

        let bounds = self.geometry.bounds;
        for (row, line) in grid.iter_mut().enumerate() {
            for (col, slot) in line.iter_mut().enumerate() {
                let x = area.left() + (col as f32 + 0.5) * cell;
                let y = area.top() + (row as f32 + 0.5) * cell;
                let on_horizontal = y >= bounds.top() && y <= bounds.bottom();
                let on_vertical = x >= bounds.left() && x <= bounds.right();
                *slot = match (on_horizontal, on_vertical) {
                    (true, true) => '+',
                    (true, false) => '-',
                    (false, true) => '|',
                    (false, false) => ' ',
                };
            }
        }

        for vehicle in self.vehicles.values() {
            let center = vehicle.center();
            if let Some((row, col)) = to_grid(center.x, center.y) {
                grid[row][col] = vehicle.vehicle_type.glyph();
            }
        }

        let mut out = vec![
            "=== Intersection Map ===".to_string(),
            format!(
                "Signal: {} ({})  Legend: +=box, -/|=road, letters=vehicles",
                self.traffic_light.phase(),
                self.traffic_light.countdown_label()
            ),
        ];
        out.extend(grid.iter().map(|row| row.iter().collect::<String>()));
        out.join("\n")
    }

    /// Draw a visual map of the intersection in the terminal
    pub fn draw_map(&self) {
        println!("\n{}\n", self.render_map(20.0));
    }
}
