//! Tunable parameters for the simulation
//!
//! Every number the simulation uses lives here. Defaults reproduce the
//! reference behavior; all of them may be overridden before building a world.

use anyhow::{bail, Result};

use super::types::Rect;

/// Width of the crossing roads in world units
pub const DEFAULT_ROAD_WIDTH: f32 = 100.0;

/// Stop line distance from the intersection as a fraction of the road width
pub const DEFAULT_STOP_LINE_MARGIN_RATIO: f32 = 0.25;

/// Discrete base speeds a spawned vehicle picks from (units per second)
pub const DEFAULT_SPEED_CHOICES: [f32; 5] = [90.0, 110.0, 130.0, 150.0, 170.0];

/// Traffic light phase durations in seconds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalTiming {
    /// Shortest green a phase can be granted
    pub min_green: f32,
    /// Longest green a phase can be granted
    pub max_green: f32,
    /// All-red interval between two green phases
    pub caution: f32,
    /// Green duration of the very first phase, before any congestion sample
    pub initial_green: f32,
}

impl Default for SignalTiming {
    fn default() -> Self {
        Self {
            min_green: 10.0,
            max_green: 20.0,
            caution: 3.0,
            initial_green: 10.0,
        }
    }
}

/// Thresholds classifying a lane as congested
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CongestionThresholds {
    /// Vehicles waiting in a lane
    pub count: usize,
    /// Summed vehicle length waiting in a lane
    pub length: f32,
    /// Two axes are "similar" when min/max >= 1 - tolerance
    pub similarity_tolerance: f32,
}

impl Default for CongestionThresholds {
    fn default() -> Self {
        Self {
            count: 8,
            length: 400.0,
            similarity_tolerance: 0.3,
        }
    }
}

/// Spawning behavior of the lane manager
#[derive(Debug, Clone, PartialEq)]
pub struct SpawnConfig {
    /// Automatic spawning on/off (manual placement always works)
    pub enabled: bool,
    /// Cooldown between successful spawns in a lane, drawn from [min, max]
    pub interval_min: f32,
    pub interval_max: f32,
    /// Population cap per lane
    pub max_per_lane: usize,
    /// How far outside the visible area vehicles appear
    pub spawn_offset: f32,
    /// Required free gap ahead of a new vehicle, in multiples of its
    /// deceleration distance
    pub gap_factor: f32,
    /// How far past the far edge a vehicle must be before it is removed
    pub exit_margin: f32,
    /// Base speeds a new vehicle picks from
    pub speed_choices: Vec<f32>,
}

impl Default for SpawnConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_min: 1.5,
            interval_max: 3.0,
            max_per_lane: 5,
            spawn_offset: 50.0,
            gap_factor: 1.0,
            exit_margin: 10.0,
            speed_choices: DEFAULT_SPEED_CHOICES.to_vec(),
        }
    }
}

/// Per-vehicle kinematics and car-following parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VehicleDynamics {
    /// Closing rate (1/s) when speeding up
    pub accel_rate: f32,
    /// Closing rate (1/s) when slowing down
    pub decel_rate: f32,
    /// Gap below which the follower matches a fraction of the leader speed,
    /// in multiples of own length
    pub safe_multiplier: f32,
    /// Gap below which the follower tracks the leader speed
    pub decel_multiplier: f32,
    /// Gap at and beyond which the follower drives at its base speed
    pub accel_multiplier: f32,
    /// Fraction of the leader speed kept when closer than the safe distance
    pub close_factor: f32,
    /// Speed floor when closer than the safe distance (never above leader)
    pub close_floor: f32,
    /// Speed floor between safe and deceleration distance (never above leader)
    pub approach_floor: f32,
    /// Multiplier on the acceleration rate while clearing the intersection
    pub clearing_boost: f32,
    /// Bumper-to-bumper gap enforced by position correction
    pub standstill_gap: f32,
}

impl Default for VehicleDynamics {
    fn default() -> Self {
        Self {
            accel_rate: 3.0,
            decel_rate: 4.0,
            safe_multiplier: 2.0,
            decel_multiplier: 5.0,
            accel_multiplier: 7.0,
            close_factor: 0.85,
            close_floor: 40.0,
            approach_floor: 50.0,
            clearing_boost: 2.0,
            standstill_gap: 4.0,
        }
    }
}

/// How a lead vehicle reacts to a red or yellow signal
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalGating {
    /// Beyond this distance from the stop line the signal imposes no cap
    pub stopping_distance: f32,
    /// Within this distance the cap is zero
    pub emergency_brake_distance: f32,
    /// Lowest cap on the ramp between the two distances above
    pub ramp_floor: f32,
    /// Below this distance the vehicle is snapped onto the stop boundary
    pub stop_epsilon: f32,
    /// Stop boundary = stop line minus this margin
    pub stop_safety_margin: f32,
}

impl Default for SignalGating {
    fn default() -> Self {
        Self {
            stopping_distance: 150.0,
            emergency_brake_distance: 75.0,
            ramp_floor: 20.0,
            stop_epsilon: 1.0,
            stop_safety_margin: 0.5,
        }
    }
}

/// Full simulation configuration
#[derive(Debug, Clone, PartialEq)]
pub struct SimConfig {
    /// Visible simulation area; geometry is derived from it
    pub area: Rect,
    pub road_width: f32,
    pub stop_line_margin_ratio: f32,
    pub timing: SignalTiming,
    pub congestion: CongestionThresholds,
    pub spawn: SpawnConfig,
    pub dynamics: VehicleDynamics,
    pub gating: SignalGating,
    /// Start with the traffic light running (otherwise it starts off)
    pub signals_enabled: bool,
    /// Seed for reproducible spawning
    pub seed: Option<u64>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            area: Rect::new(0.0, 0.0, 600.0, 600.0),
            road_width: DEFAULT_ROAD_WIDTH,
            stop_line_margin_ratio: DEFAULT_STOP_LINE_MARGIN_RATIO,
            timing: SignalTiming::default(),
            congestion: CongestionThresholds::default(),
            spawn: SpawnConfig::default(),
            dynamics: VehicleDynamics::default(),
            gating: SignalGating::default(),
            signals_enabled: true,
            seed: None,
        }
    }
}

impl SimConfig {
    /// Default configuration over a custom area
    pub fn with_area(area: Rect) -> Self {
        Self {
            area,
            ..Self::default()
        }
    }

    /// Every scalar parameter with its name, for checks that apply to all
    fn numeric_fields(&self) -> Vec<(&'static str, f32)> {
        let mut fields = vec![
            ("area x", self.area.x),
            ("area y", self.area.y),
            ("area width", self.area.width),
            ("area height", self.area.height),
            ("road width", self.road_width),
            ("stop line margin ratio", self.stop_line_margin_ratio),
            ("minimum green", self.timing.min_green),
            ("maximum green", self.timing.max_green),
            ("caution duration", self.timing.caution),
            ("initial green", self.timing.initial_green),
            ("congestion length", self.congestion.length),
            ("similarity tolerance", self.congestion.similarity_tolerance),
            ("spawn interval minimum", self.spawn.interval_min),
            ("spawn interval maximum", self.spawn.interval_max),
            ("spawn offset", self.spawn.spawn_offset),
            ("spawn gap factor", self.spawn.gap_factor),
            ("exit margin", self.spawn.exit_margin),
            ("acceleration rate", self.dynamics.accel_rate),
            ("deceleration rate", self.dynamics.decel_rate),
            ("safe distance multiplier", self.dynamics.safe_multiplier),
            ("deceleration distance multiplier", self.dynamics.decel_multiplier),
            ("acceleration distance multiplier", self.dynamics.accel_multiplier),
            ("close factor", self.dynamics.close_factor),
            ("close floor", self.dynamics.close_floor),
            ("approach floor", self.dynamics.approach_floor),
            ("clearing boost", self.dynamics.clearing_boost),
            ("standstill gap", self.dynamics.standstill_gap),
            ("stopping distance", self.gating.stopping_distance),
            ("emergency brake distance", self.gating.emergency_brake_distance),
            ("ramp floor", self.gating.ramp_floor),
            ("stop epsilon", self.gating.stop_epsilon),
            ("stop safety margin", self.gating.stop_safety_margin),
        ];
        fields.extend(
            self.spawn
                .speed_choices
                .iter()
                .map(|speed| ("spawn speed", *speed)),
        );
        fields
    }

    /// Check that the parameters describe a usable simulation
    pub fn validate(&self) -> Result<()> {
        if let Some((name, value)) = self
            .numeric_fields()
            .into_iter()
            .find(|(_, value)| !value.is_finite())
        {
            bail!("{} must be a finite number, got {}", name, value);
        }

        let area = &self.area;
        if !(area.width > 0.0 && area.height > 0.0) {
            bail!(
                "Simulation area must have a positive size, got {}x{}",
                area.width,
                area.height
            );
        }
        if !(self.road_width > 0.0) {
            bail!("Road width must be positive, got {}", self.road_width);
        }
        if self.road_width > area.width.min(area.height) {
            bail!(
                "Road width {} does not fit in a {}x{} area",
                self.road_width,
                area.width,
                area.height
            );
        }
        if self.stop_line_margin_ratio < 0.0 {
            bail!("Stop line margin ratio must not be negative");
        }

        let timing = &self.timing;
        if !(timing.min_green > 0.0) || timing.min_green > timing.max_green {
            bail!(
                "Green duration range [{}, {}] is invalid",
                timing.min_green,
                timing.max_green
            );
        }
        if !(timing.caution > 0.0) {
            bail!("Caution duration must be positive, got {}", timing.caution);
        }
        if !(timing.initial_green > 0.0) {
            bail!("Initial green duration must be positive");
        }

        let congestion = &self.congestion;
        if !(0.0..=1.0).contains(&congestion.similarity_tolerance) {
            bail!(
                "Similarity tolerance must lie in [0, 1], got {}",
                congestion.similarity_tolerance
            );
        }
        if congestion.length < 0.0 {
            bail!("Congestion length threshold must not be negative");
        }

        let spawn = &self.spawn;
        if spawn.interval_min < 0.0 || spawn.interval_min > spawn.interval_max {
            bail!(
                "Spawn interval range [{}, {}] is invalid",
                spawn.interval_min,
                spawn.interval_max
            );
        }
        if spawn.speed_choices.is_empty() {
            bail!("At least one spawn speed is required");
        }
        if spawn.speed_choices.iter().any(|speed| !(*speed > 0.0)) {
            bail!("Spawn speeds must be positive");
        }
        if spawn.spawn_offset < 0.0 || spawn.gap_factor < 0.0 || spawn.exit_margin < 0.0 {
            bail!("Spawn offset, gap factor and exit margin must not be negative");
        }

        let dynamics = &self.dynamics;
        if !(dynamics.accel_rate > 0.0 && dynamics.decel_rate > 0.0) {
            bail!("Acceleration and deceleration rates must be positive");
        }
        if dynamics.safe_multiplier < 0.0
            || dynamics.safe_multiplier > dynamics.decel_multiplier
            || dynamics.decel_multiplier > dynamics.accel_multiplier
        {
            bail!(
                "Following distances must satisfy 0 <= safe ({}) <= deceleration ({}) <= acceleration ({})",
                dynamics.safe_multiplier,
                dynamics.decel_multiplier,
                dynamics.accel_multiplier
            );
        }
        if dynamics.clearing_boost < 1.0 {
            bail!("Clearing boost must be at least 1.0");
        }
        if dynamics.standstill_gap < 0.0 {
            bail!("Standstill gap must not be negative");
        }

        let gating = &self.gating;
        if gating.emergency_brake_distance < 0.0
            || gating.emergency_brake_distance > gating.stopping_distance
        {
            bail!(
                "Emergency brake distance {} must lie in [0, stopping distance {}]",
                gating.emergency_brake_distance,
                gating.stopping_distance
            );
        }
        if gating.stop_epsilon < 0.0 || gating.stop_safety_margin < 0.0 || gating.ramp_floor < 0.0 {
            bail!("Stop epsilon, safety margin and ramp floor must not be negative");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(SimConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_inverted_green_range() {
        let mut config = SimConfig::default();
        config.timing.min_green = 30.0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("Green duration range"));
    }

    #[test]
    fn rejects_road_wider_than_area() {
        let mut config = SimConfig::with_area(Rect::new(0.0, 0.0, 80.0, 600.0));
        config.road_width = 100.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_unordered_following_distances() {
        let mut config = SimConfig::default();
        config.dynamics.decel_multiplier = 9.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn equal_following_distances_are_allowed() {
        let mut config = SimConfig::default();
        config.dynamics.decel_multiplier = 7.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_empty_speed_choices() {
        let mut config = SimConfig::default();
        config.spawn.speed_choices.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_non_finite_spawn_intervals() {
        for bad in [f32::INFINITY, f32::NAN] {
            let mut config = SimConfig::default();
            config.spawn.interval_max = bad;
            let err = config.validate().unwrap_err();
            assert!(err.to_string().contains("spawn interval maximum"), "{}", err);

            let mut config = SimConfig::default();
            config.spawn.interval_min = bad;
            assert!(config.validate().is_err());
        }
    }

    #[test]
    fn rejects_non_finite_area_and_timing() {
        let mut config = SimConfig::with_area(Rect::new(0.0, 0.0, f32::INFINITY, 600.0));
        assert!(config.validate().is_err());

        config = SimConfig::default();
        config.timing.max_green = f32::INFINITY;
        assert!(config.validate().is_err());

        config = SimConfig::default();
        config.spawn.speed_choices.push(f32::NAN);
        assert!(config.validate().is_err());
    }
}
