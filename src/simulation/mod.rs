//! Standalone intersection simulation module
//!
//! This module contains the traffic simulation logic for a single signalised
//! four-way intersection: geometry, vehicles, the lane manager, the adaptive
//! traffic light and the congestion counter. It has no rendering and can be
//! driven headless from tests or the console.

mod config;
mod counter;
mod intersection;
mod lane_manager;
mod traffic_light;
mod types;
mod vehicle;
mod world;

// Re-export public types for external use
// These may not be used within this crate but are part of the public API
#[allow(unused_imports)]
pub use config::{
    CongestionThresholds, SignalGating, SignalTiming, SimConfig, SpawnConfig, VehicleDynamics,
    DEFAULT_ROAD_WIDTH, DEFAULT_SPEED_CHOICES, DEFAULT_STOP_LINE_MARGIN_RATIO,
};
#[allow(unused_imports)]
pub use counter::{
    AxisTotals, CongestionCounter, CongestionSnapshot, CongestionSummary, LaneStats, LaneSummary,
};
#[allow(unused_imports)]
pub use intersection::IntersectionGeometry;
#[allow(unused_imports)]
pub use lane_manager::{
    correct_overlaps, has_clearance, lane_order, lane_population, remove_departed, spawn_vehicle,
    steer_lane, LaneOrder,
};
#[allow(unused_imports)]
pub use traffic_light::{
    decide_green_duration, Countdown, DurationCase, DurationDecision, LaneSignal, PhaseChange,
    SignalPhase, TrafficLightController,
};
#[allow(unused_imports)]
pub use types::{
    Axis, Direction, LaneId, Rect, SimId, Vec2, VehicleId, VehicleType, VEHICLE_BREADTH,
};
#[allow(unused_imports)]
pub use vehicle::{approach_speed, Leader, SignalApproach, SignalGated, SignalRole, SimVehicle};
pub use world::{SimStats, SimWorld};
