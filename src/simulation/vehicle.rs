//! Vehicle kinematics and car-following for the intersection simulation
//!
//! A vehicle owns its speed controller: the lane manager tells it about the
//! vehicle ahead ([`SimVehicle::adjust_speed_for_traffic`]) and, when it is
//! the lane's lead vehicle, about the signal ([`SignalGated`]). The vehicle
//! then integrates its own motion in [`SimVehicle::update`].

use super::config::{SignalGating, VehicleDynamics};
use super::traffic_light::LaneSignal;
use super::types::{LaneId, Vec2, VehicleId, VehicleType};

/// The vehicle directly ahead in the same lane, as seen by a follower
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Leader {
    /// Bumper-to-bumper distance
    pub gap: f32,
    /// Leader's current speed
    pub speed: f32,
}

/// How the signal relates to a vehicle this tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SignalRole {
    /// Behind another approaching vehicle; gated only through car-following
    #[default]
    Following,
    /// Closest vehicle to the stop line that has not crossed it
    Lead,
    /// Past the stop line, still inside or before the far edge of the box
    Clearing,
    /// Past the far edge of the box; never gated again
    Cleared,
}

/// What a gated vehicle needs to know about its approach to the stop line
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalApproach {
    pub signal: LaneSignal,
    /// Signed distance from the leading edge to the stop line
    pub distance_to_stop_line: f32,
    pub stop_line_progress: f32,
}

/// Capability of reacting directly to a traffic signal
pub trait SignalGated {
    /// Apply the signal on top of the car-following target chosen this tick
    fn obey_signal(&mut self, approach: &SignalApproach, gating: &SignalGating);

    /// Drop any signal-imposed limit
    fn release_signal(&mut self);
}

/// Move `current` towards `target` with a first-order filter.
///
/// The step is `diff * dt * rate` with the deceleration rate used when
/// slowing down. A step that would pass the target lands on it instead.
pub fn approach_speed(current: f32, target: f32, dt: f32, accel_rate: f32, decel_rate: f32) -> f32 {
    let diff = target - current;
    if diff == 0.0 || !(dt > 0.0) {
        return current;
    }
    let rate = if diff > 0.0 { accel_rate } else { decel_rate };
    let adjustment = diff * dt * rate;
    if adjustment.abs() >= diff.abs() {
        target
    } else {
        current + adjustment
    }
}

/// Position of `value` inside `[start, end]` as a 0..1 ratio.
/// An empty band has no interior, so the outer boundary wins.
fn band_ratio(value: f32, start: f32, end: f32) -> f32 {
    let span = end - start;
    if span <= f32::EPSILON {
        return if value >= end { 1.0 } else { 0.0 };
    }
    ((value - start) / span).clamp(0.0, 1.0)
}

/// A vehicle in the simulation
#[derive(Debug, Clone)]
pub struct SimVehicle {
    pub id: VehicleId,
    pub vehicle_type: VehicleType,
    pub lane: LaneId,
    /// Top-left corner of the footprint
    pub position: Vec2,
    /// Width and height of the footprint
    pub size: Vec2,
    /// Free-flow speed
    pub base_speed: f32,
    pub current_speed: f32,
    pub target_speed: f32,
    pub role: SignalRole,
    active: bool,
    dynamics: VehicleDynamics,
    /// Leading edge may not pass this progress (set while stopping for a signal)
    stop_limit: Option<f32>,
    /// Boosted acceleration while clearing the box under red
    clearing: bool,
}

impl SimVehicle {
    pub fn new(
        id: VehicleId,
        vehicle_type: VehicleType,
        lane: LaneId,
        base_speed: f32,
        position: Vec2,
        dynamics: VehicleDynamics,
    ) -> Self {
        Self {
            id,
            vehicle_type,
            lane,
            position,
            size: vehicle_type.dimensions(lane.axis()),
            base_speed,
            current_speed: base_speed,
            target_speed: base_speed,
            role: SignalRole::Following,
            active: true,
            dynamics,
            stop_limit: None,
            clearing: false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn deactivate(&mut self) {
        self.active = false;
        self.current_speed = 0.0;
        self.target_speed = 0.0;
    }

    /// Footprint extent along the direction of travel
    pub fn length(&self) -> f32 {
        self.size.along(self.lane.axis())
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(
            self.position.x + self.size.x / 2.0,
            self.position.y + self.size.y / 2.0,
        )
    }

    /// Progress of the leading edge
    pub fn front_progress(&self) -> f32 {
        let start = self.position.along(self.lane.axis());
        if self.lane.sign() > 0.0 {
            self.lane.progress(start + self.length())
        } else {
            self.lane.progress(start)
        }
    }

    /// Progress of the trailing edge
    pub fn rear_progress(&self) -> f32 {
        self.front_progress() - self.length()
    }

    /// Move the vehicle along its lane so its leading edge sits at `front`
    pub fn set_front_progress(&mut self, front: f32) {
        let shift = front - self.front_progress();
        let sign = self.lane.sign();
        *self.position.along_mut(self.lane.axis()) += shift * sign;
    }

    pub fn velocity(&self) -> Vec2 {
        let mut velocity = Vec2::default();
        *velocity.along_mut(self.lane.axis()) = self.current_speed * self.lane.sign();
        velocity
    }

    pub fn safe_distance(&self) -> f32 {
        self.length() * self.dynamics.safe_multiplier
    }

    pub fn deceleration_distance(&self) -> f32 {
        self.length() * self.dynamics.decel_multiplier
    }

    pub fn acceleration_distance(&self) -> f32 {
        self.length() * self.dynamics.accel_multiplier
    }

    pub fn stop_limit(&self) -> Option<f32> {
        self.stop_limit
    }

    pub fn is_clearing(&self) -> bool {
        self.clearing
    }

    /// Car-following target speed for a given leader (or free road).
    ///
    /// Non-decreasing in the gap for a fixed leader speed and never above the
    /// base speed. Floors never exceed the leader's own speed, so a stopped
    /// leader brings its followers to a stop.
    pub fn following_target(&self, leader: Option<Leader>) -> f32 {
        let base = self.base_speed;
        let Some(leader) = leader else {
            return base;
        };

        let dynamics = &self.dynamics;
        let lead_speed = leader.speed.max(0.0);
        let safe = self.safe_distance();
        let decel = self.deceleration_distance();
        let accel = self.acceleration_distance();

        let close = (lead_speed * dynamics.close_factor)
            .max(dynamics.close_floor)
            .min(lead_speed);

        let target = if leader.gap < safe {
            close
        } else if leader.gap < decel {
            let t = band_ratio(leader.gap, safe, decel);
            let blended = close + (lead_speed - close) * t;
            blended.max(dynamics.approach_floor.min(lead_speed))
        } else if leader.gap < accel {
            let t = band_ratio(leader.gap, decel, accel);
            lead_speed + (base - lead_speed) * t
        } else {
            base
        };

        target.clamp(0.0, base)
    }

    /// Pick this tick's target speed from the vehicle ahead
    pub fn adjust_speed_for_traffic(&mut self, leader: Option<Leader>) {
        self.target_speed = self.following_target(leader);
    }

    /// Advance speed and position by `dt` seconds
    pub fn update(&mut self, dt: f32) {
        if !self.active || !(dt > 0.0) {
            return;
        }

        let accel_rate = if self.clearing {
            self.dynamics.accel_rate * self.dynamics.clearing_boost
        } else {
            self.dynamics.accel_rate
        };
        self.current_speed = approach_speed(
            self.current_speed,
            self.target_speed,
            dt,
            accel_rate,
            self.dynamics.decel_rate,
        )
        .max(0.0);

        let velocity = self.velocity();
        self.position.x += velocity.x * dt;
        self.position.y += velocity.y * dt;

        // Integration error must never carry a stopping vehicle over its line
        if let Some(limit) = self.stop_limit {
            if self.front_progress() > limit {
                self.set_front_progress(limit);
                self.current_speed = 0.0;
            }
        }
    }
}

impl SignalGated for SimVehicle {
    fn obey_signal(&mut self, approach: &SignalApproach, gating: &SignalGating) {
        self.release_signal();
        if !approach.signal.requires_stop() {
            return;
        }

        let distance = approach.distance_to_stop_line;
        if distance < 0.0 {
            // Already over the line when the light changed: get out of the box
            self.clearing = true;
            return;
        }

        let boundary = approach.stop_line_progress - gating.stop_safety_margin;
        self.stop_limit = Some(boundary);

        let cap = if distance > gating.stopping_distance {
            None
        } else if distance > gating.emergency_brake_distance {
            let t = band_ratio(
                distance,
                gating.emergency_brake_distance,
                gating.stopping_distance,
            );
            Some((self.base_speed * t).max(gating.ramp_floor))
        } else {
            Some(0.0)
        };
        if let Some(cap) = cap {
            self.target_speed = self.target_speed.min(cap);
        }

        if distance < gating.stop_epsilon {
            if self.front_progress() > boundary {
                self.set_front_progress(boundary);
            }
            self.current_speed = 0.0;
            self.target_speed = 0.0;
        }
    }

    fn release_signal(&mut self) {
        self.stop_limit = None;
        self.clearing = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::types::SimId;

    fn vehicle(lane: LaneId, base_speed: f32) -> SimVehicle {
        SimVehicle::new(
            VehicleId(SimId(0)),
            VehicleType::Sedan,
            lane,
            base_speed,
            Vec2::new(0.0, 0.0),
            VehicleDynamics::default(),
        )
    }

    fn approach(signal: LaneSignal, v: &SimVehicle, stop_line_progress: f32) -> SignalApproach {
        SignalApproach {
            signal,
            distance_to_stop_line: stop_line_progress - v.front_progress(),
            stop_line_progress,
        }
    }

    #[test]
    fn approach_speed_never_overshoots() {
        let targets = [0.0, 20.0, 90.0, 170.0];
        let currents = [0.0, 5.0, 60.0, 130.0, 200.0];
        let dts = [0.001, 0.016, 0.1, 0.3, 1.0, 5.0];
        for &target in &targets {
            for &current in &currents {
                if current == target {
                    continue;
                }
                for &dt in &dts {
                    let next = approach_speed(current, target, dt, 3.0, 4.0);
                    assert!(
                        (next - target).abs() < (current - target).abs(),
                        "gap did not shrink: {} -> {} (target {}, dt {})",
                        current,
                        next,
                        target,
                        dt
                    );
                    let crossed = (current - target).signum() != (next - target).signum()
                        && next != target;
                    assert!(!crossed, "overshot {} from {} with dt {}", target, current, dt);
                }
            }
        }
    }

    #[test]
    fn deceleration_closes_faster_than_acceleration() {
        let speeding_up = approach_speed(100.0, 150.0, 0.1, 3.0, 4.0) - 100.0;
        let slowing_down = 150.0 - approach_speed(150.0, 100.0, 0.1, 3.0, 4.0);
        assert!(slowing_down > speeding_up);
    }

    #[test]
    fn following_target_is_monotone_and_bounded() {
        let follower = vehicle(LaneId::HorizontalBottom, 130.0);
        for &lead_speed in &[0.0, 10.0, 45.0, 90.0, 130.0, 170.0] {
            let mut previous = f32::MIN;
            let mut gap = -20.0;
            while gap < 500.0 {
                let target = follower.following_target(Some(Leader {
                    gap,
                    speed: lead_speed,
                }));
                assert!(target >= 0.0);
                assert!(target <= follower.base_speed);
                assert!(
                    target + 1e-4 >= previous,
                    "target fell from {} to {} at gap {} (leader {})",
                    previous,
                    target,
                    gap,
                    lead_speed
                );
                previous = target;
                gap += 2.5;
            }
        }
    }

    #[test]
    fn free_road_means_base_speed() {
        let v = vehicle(LaneId::VerticalLeft, 110.0);
        assert_eq!(v.following_target(None), 110.0);
        let far = Leader {
            gap: v.acceleration_distance() + 1.0,
            speed: 0.0,
        };
        assert_eq!(v.following_target(Some(far)), 110.0);
    }

    #[test]
    fn stopped_leader_cascades_to_zero() {
        let v = vehicle(LaneId::HorizontalTop, 150.0);
        let close = Leader {
            gap: v.safe_distance() * 0.5,
            speed: 0.0,
        };
        assert_eq!(v.following_target(Some(close)), 0.0);
    }

    #[test]
    fn moving_leader_keeps_close_floor() {
        let v = vehicle(LaneId::HorizontalTop, 150.0);
        let close = Leader {
            gap: 10.0,
            speed: 45.0,
        };
        // 0.85 * 45 = 38.25, raised to the 40 floor
        assert!((v.following_target(Some(close)) - 40.0).abs() < 1e-4);
    }

    #[test]
    fn equal_band_edges_do_not_divide_by_zero() {
        let mut dynamics = VehicleDynamics::default();
        dynamics.decel_multiplier = 7.0;
        let v = SimVehicle::new(
            VehicleId(SimId(1)),
            VehicleType::Sedan,
            LaneId::HorizontalBottom,
            100.0,
            Vec2::default(),
            dynamics,
        );
        let at_edge = Leader {
            gap: v.acceleration_distance(),
            speed: 20.0,
        };
        let target = v.following_target(Some(at_edge));
        assert!(target.is_finite());
        assert_eq!(target, 100.0);
    }

    #[test]
    fn update_moves_along_lane_direction() {
        let mut v = vehicle(LaneId::HorizontalTop, 100.0);
        v.position = Vec2::new(500.0, 262.5);
        v.update(0.5);
        assert!((v.position.x - 450.0).abs() < 1e-4);
        assert_eq!(v.position.y, 262.5);

        let mut v = vehicle(LaneId::VerticalLeft, 100.0);
        v.update(0.5);
        assert!((v.position.y - 50.0).abs() < 1e-4);
    }

    #[test]
    fn non_positive_dt_is_a_no_op() {
        let mut v = vehicle(LaneId::HorizontalBottom, 100.0);
        v.target_speed = 0.0;
        v.update(0.0);
        v.update(-1.0);
        v.update(f32::NAN);
        assert_eq!(v.position, Vec2::default());
        assert_eq!(v.current_speed, 100.0);
    }

    #[test]
    fn red_signal_far_away_imposes_no_cap() {
        let gating = SignalGating::default();
        let mut v = vehicle(LaneId::HorizontalBottom, 150.0);
        let line = v.front_progress() + gating.stopping_distance + 10.0;
        v.adjust_speed_for_traffic(None);
        v.obey_signal(&approach(LaneSignal::Red, &v, line), &gating);
        assert_eq!(v.target_speed, 150.0);
        assert!(v.stop_limit().is_some());
    }

    #[test]
    fn red_signal_ramps_down_between_thresholds() {
        let gating = SignalGating::default();
        let mut v = vehicle(LaneId::HorizontalBottom, 150.0);
        let midway = (gating.stopping_distance + gating.emergency_brake_distance) / 2.0;
        let line = v.front_progress() + midway;
        v.adjust_speed_for_traffic(None);
        v.obey_signal(&approach(LaneSignal::Red, &v, line), &gating);
        assert!((v.target_speed - 75.0).abs() < 1e-3);

        let near = gating.emergency_brake_distance + 1.0;
        let line = v.front_progress() + near;
        v.adjust_speed_for_traffic(None);
        v.obey_signal(&approach(LaneSignal::Yellow, &v, line), &gating);
        assert_eq!(v.target_speed, gating.ramp_floor);
    }

    #[test]
    fn red_signal_inside_brake_distance_stops() {
        let gating = SignalGating::default();
        let mut v = vehicle(LaneId::VerticalRight, 150.0);
        let line = v.front_progress() + 30.0;
        v.adjust_speed_for_traffic(None);
        v.obey_signal(&approach(LaneSignal::Red, &v, line), &gating);
        assert_eq!(v.target_speed, 0.0);
    }

    #[test]
    fn vehicle_at_the_line_is_snapped_behind_it() {
        let gating = SignalGating::default();
        let mut v = vehicle(LaneId::HorizontalBottom, 150.0);
        let line = v.front_progress() + 0.2;
        v.adjust_speed_for_traffic(None);
        v.obey_signal(&approach(LaneSignal::Red, &v, line), &gating);
        assert_eq!(v.current_speed, 0.0);
        assert!(v.front_progress() <= line - gating.stop_safety_margin + 1e-4);
    }

    #[test]
    fn stop_limit_holds_for_large_steps() {
        let gating = SignalGating::default();
        let mut v = vehicle(LaneId::HorizontalBottom, 170.0);
        // Outside the stopping distance, so nothing slows it down this tick
        let line = v.front_progress() + gating.stopping_distance + 5.0;
        v.adjust_speed_for_traffic(None);
        v.obey_signal(&approach(LaneSignal::Red, &v, line), &gating);
        assert_eq!(v.target_speed, 170.0);
        v.update(1.0);
        assert!(v.front_progress() <= line - gating.stop_safety_margin + 1e-4);
    }

    #[test]
    fn committed_vehicle_clears_with_boost() {
        let gating = SignalGating::default();
        let mut v = vehicle(LaneId::HorizontalBottom, 150.0);
        let line = v.front_progress() - 3.0;
        v.adjust_speed_for_traffic(None);
        v.obey_signal(&approach(LaneSignal::Yellow, &v, line), &gating);
        assert_eq!(v.target_speed, 150.0);
        assert!(v.is_clearing());
        assert!(v.stop_limit().is_none());

        v.current_speed = 50.0;
        let mut plain = v.clone();
        plain.release_signal();
        v.update(0.05);
        plain.update(0.05);
        assert!(v.current_speed > plain.current_speed);
    }

    #[test]
    fn green_and_no_light_do_not_gate() {
        let gating = SignalGating::default();
        for signal in [LaneSignal::Green, LaneSignal::NoLight] {
            let mut v = vehicle(LaneId::VerticalLeft, 130.0);
            let line = v.front_progress() + 10.0;
            v.adjust_speed_for_traffic(None);
            v.obey_signal(&approach(signal, &v, line), &gating);
            assert_eq!(v.target_speed, 130.0);
            assert!(v.stop_limit().is_none());
        }
    }
}
