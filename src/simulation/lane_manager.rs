//! Lane bookkeeping for the intersection simulation
//!
//! This module contains functions for spawning, removing, ordering and
//! steering vehicles lane by lane. It separates per-lane logic from the main
//! world coordination.

use std::collections::HashMap;

use ordered_float::OrderedFloat;
use sorted_vec::SortedVec;

use super::config::{SignalGating, SpawnConfig, VehicleDynamics};
use super::intersection::IntersectionGeometry;
use super::traffic_light::LaneSignal;
use super::types::{LaneId, VehicleId, VehicleType};
use super::vehicle::{Leader, SignalApproach, SignalGated, SignalRole, SimVehicle};

/// Vehicles of one lane sorted by leading-edge progress, rearmost first
pub type LaneOrder = SortedVec<(OrderedFloat<f32>, VehicleId)>;

/// Sort the active vehicles of a lane along its direction of travel
pub fn lane_order(vehicles: &HashMap<VehicleId, SimVehicle>, lane: LaneId) -> LaneOrder {
    let mut order = SortedVec::new();
    for vehicle in vehicles.values() {
        if vehicle.lane == lane && vehicle.is_active() {
            order.insert((OrderedFloat(vehicle.front_progress()), vehicle.id));
        }
    }
    order
}

/// Number of active vehicles in a lane
pub fn lane_population(vehicles: &HashMap<VehicleId, SimVehicle>, lane: LaneId) -> usize {
    vehicles
        .values()
        .filter(|vehicle| vehicle.lane == lane && vehicle.is_active())
        .count()
}

/// Whether `candidate` keeps at least `min_gap` to every vehicle ahead of it
/// and overlaps none
pub fn has_clearance<'a>(
    candidate: &SimVehicle,
    lane_vehicles: impl IntoIterator<Item = &'a SimVehicle>,
    min_gap: f32,
) -> bool {
    lane_vehicles.into_iter().all(|other| {
        if !other.is_active() || other.id == candidate.id {
            return true;
        }
        let behind = candidate.rear_progress() - other.front_progress();
        if behind >= 0.0 {
            return true;
        }
        other.rear_progress() - candidate.front_progress() >= min_gap
    })
}

/// Build a vehicle at the lane's spawn point.
///
/// Returns `None` without touching anything when the lane is too crowded
/// near the spawn point.
#[allow(clippy::too_many_arguments)]
pub fn spawn_vehicle(
    id: VehicleId,
    lane: LaneId,
    vehicle_type: VehicleType,
    base_speed: f32,
    geometry: &IntersectionGeometry,
    spawn: &SpawnConfig,
    dynamics: VehicleDynamics,
    vehicles: &HashMap<VehicleId, SimVehicle>,
) -> Option<SimVehicle> {
    let size = vehicle_type.dimensions(lane.axis());
    let front = geometry.spawn_front_progress(lane, spawn.spawn_offset);
    let position = geometry.top_left_for_front(lane, size, front);
    let candidate = SimVehicle::new(id, vehicle_type, lane, base_speed, position, dynamics);

    let min_gap = candidate.deceleration_distance() * spawn.gap_factor;
    let lane_vehicles = vehicles.values().filter(|vehicle| vehicle.lane == lane);
    if has_clearance(&candidate, lane_vehicles, min_gap) {
        Some(candidate)
    } else {
        None
    }
}

/// Remove vehicles that are inactive or have left the area.
///
/// Returns the removed IDs.
pub fn remove_departed(
    vehicles: &mut HashMap<VehicleId, SimVehicle>,
    geometry: &IntersectionGeometry,
    exit_margin: f32,
) -> Vec<VehicleId> {
    let mut departed: Vec<VehicleId> = vehicles
        .values()
        .filter(|vehicle| {
            !vehicle.is_active()
                || geometry.is_out_of_bounds(vehicle.lane, vehicle.rear_progress(), exit_margin)
        })
        .map(|vehicle| vehicle.id)
        .collect();
    departed.sort();

    for id in &departed {
        vehicles.remove(id);
    }
    departed
}

/// Per-vehicle facts captured before any vehicle of the lane is modified
#[derive(Debug, Clone, Copy)]
struct LaneEntry {
    id: VehicleId,
    front: f32,
    rear: f32,
    speed: f32,
}

fn snapshot_lane(vehicles: &HashMap<VehicleId, SimVehicle>, order: &LaneOrder) -> Vec<LaneEntry> {
    order
        .iter()
        .filter_map(|(_, id)| vehicles.get(id))
        .map(|vehicle| LaneEntry {
            id: vehicle.id,
            front: vehicle.front_progress(),
            rear: vehicle.rear_progress(),
            speed: vehicle.current_speed,
        })
        .collect()
}

/// Assign signal roles, resolve leaders and set every vehicle's target speed
/// for this tick.
///
/// The lead vehicle is the one furthest along among those that have not
/// crossed the stop line; it alone is gated by `signal`. Vehicles past the
/// stop line but not yet clear of the box are told about the signal too, so
/// they can hurry out. Everyone else follows the vehicle ahead.
pub fn steer_lane(
    vehicles: &mut HashMap<VehicleId, SimVehicle>,
    lane: LaneId,
    order: &LaneOrder,
    signal: LaneSignal,
    geometry: &IntersectionGeometry,
    gating: &SignalGating,
) {
    let entries = snapshot_lane(vehicles, order);
    let stop_line_progress = geometry.stop_line_progress(lane);

    let mut lead: Option<VehicleId> = None;
    for entry in &entries {
        let Some(vehicle) = vehicles.get_mut(&entry.id) else {
            continue;
        };
        vehicle.role = if vehicle.role == SignalRole::Cleared
            || geometry.has_crossed(lane, entry.front)
        {
            SignalRole::Cleared
        } else if geometry.distance_to_stop_line(lane, entry.front) < 0.0 {
            SignalRole::Clearing
        } else {
            // Entries run rearmost first, so the last one seen wins
            lead = Some(entry.id);
            SignalRole::Following
        };
    }
    if let Some(vehicle) = lead.and_then(|id| vehicles.get_mut(&id)) {
        vehicle.role = SignalRole::Lead;
    }

    for (index, entry) in entries.iter().enumerate() {
        let leader = entries[index + 1..]
            .iter()
            .find(|ahead| ahead.front > entry.front)
            .map(|ahead| Leader {
                gap: ahead.rear - entry.front,
                speed: ahead.speed,
            });

        let Some(vehicle) = vehicles.get_mut(&entry.id) else {
            continue;
        };
        vehicle.adjust_speed_for_traffic(leader);
        match vehicle.role {
            SignalRole::Lead | SignalRole::Clearing => {
                let approach = SignalApproach {
                    signal,
                    distance_to_stop_line: stop_line_progress - vehicle.front_progress(),
                    stop_line_progress,
                };
                vehicle.obey_signal(&approach, gating);
            }
            SignalRole::Following | SignalRole::Cleared => vehicle.release_signal(),
        }
    }
}

/// Push back any follower whose leading edge ran into the vehicle ahead.
///
/// `order` is the lane order from before the kinematic update. Returns the
/// number of vehicles corrected.
pub fn correct_overlaps(
    vehicles: &mut HashMap<VehicleId, SimVehicle>,
    order: &LaneOrder,
    standstill_gap: f32,
) -> usize {
    let mut corrected = 0;
    // Front to back, so each limit uses the already-corrected leader
    let ids: Vec<VehicleId> = order.iter().rev().map(|(_, id)| *id).collect();
    let mut ahead: Option<(f32, f32)> = None;

    for id in ids {
        let Some(vehicle) = vehicles.get_mut(&id) else {
            continue;
        };
        if let Some((leader_rear, leader_speed)) = ahead {
            let limit = leader_rear - standstill_gap;
            if vehicle.front_progress() > limit {
                vehicle.set_front_progress(limit);
                vehicle.current_speed = vehicle.current_speed.min(leader_speed);
                corrected += 1;
            }
        }
        ahead = Some((vehicle.rear_progress(), vehicle.current_speed));
    }
    corrected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::types::{Rect, SimId};

    fn geometry() -> IntersectionGeometry {
        IntersectionGeometry::new(Rect::new(0.0, 0.0, 600.0, 600.0), 100.0, 0.25)
    }

    fn insert_at(
        vehicles: &mut HashMap<VehicleId, SimVehicle>,
        id: usize,
        lane: LaneId,
        front: f32,
        speed: f32,
    ) -> VehicleId {
        let g = geometry();
        let size = VehicleType::Sedan.dimensions(lane.axis());
        let position = g.top_left_for_front(lane, size, front);
        let vehicle_id = VehicleId(SimId(id));
        let mut vehicle = SimVehicle::new(
            vehicle_id,
            VehicleType::Sedan,
            lane,
            speed,
            position,
            VehicleDynamics::default(),
        );
        vehicle.current_speed = speed;
        vehicles.insert(vehicle_id, vehicle);
        vehicle_id
    }

    #[test]
    fn order_runs_rear_to_front() {
        let mut vehicles = HashMap::new();
        let lane = LaneId::HorizontalTop;
        let middle = insert_at(&mut vehicles, 0, lane, -400.0, 100.0);
        let front = insert_at(&mut vehicles, 1, lane, -390.0, 100.0);
        let rear = insert_at(&mut vehicles, 2, lane, -600.0, 100.0);
        insert_at(&mut vehicles, 3, LaneId::VerticalLeft, 100.0, 100.0);

        let order = lane_order(&vehicles, lane);
        let ids: Vec<VehicleId> = order.iter().map(|(_, id)| *id).collect();
        assert_eq!(ids, vec![rear, middle, front]);
    }

    #[test]
    fn spawn_rejected_when_lane_is_crowded() {
        let g = geometry();
        let spawn = SpawnConfig::default();
        let lane = LaneId::HorizontalBottom;
        let mut vehicles = HashMap::new();
        // Just ahead of the spawn point
        insert_at(&mut vehicles, 0, lane, g.spawn_front_progress(lane, spawn.spawn_offset) + 80.0, 90.0);

        let rejected = spawn_vehicle(
            VehicleId(SimId(1)),
            lane,
            VehicleType::Sedan,
            110.0,
            &g,
            &spawn,
            VehicleDynamics::default(),
            &vehicles,
        );
        assert!(rejected.is_none());

        // The opposite lane is unaffected
        let accepted = spawn_vehicle(
            VehicleId(SimId(1)),
            LaneId::HorizontalTop,
            VehicleType::Sedan,
            110.0,
            &g,
            &spawn,
            VehicleDynamics::default(),
            &vehicles,
        );
        let vehicle = accepted.expect("opposite lane should accept a spawn");
        assert!(vehicle.position.x > g.area.right());
    }

    #[test]
    fn spawn_accepted_once_gap_opens() {
        let g = geometry();
        let spawn = SpawnConfig::default();
        let lane = LaneId::VerticalLeft;
        let mut vehicles = HashMap::new();
        let spawn_front = g.spawn_front_progress(lane, spawn.spawn_offset);
        // Sedan deceleration distance is 250; rear edge 260 ahead of the new front
        insert_at(&mut vehicles, 0, lane, spawn_front + 310.0, 90.0);

        let spawned = spawn_vehicle(
            VehicleId(SimId(1)),
            lane,
            VehicleType::Sedan,
            110.0,
            &g,
            &spawn,
            VehicleDynamics::default(),
            &vehicles,
        );
        assert!(spawned.is_some());
    }

    #[test]
    fn departed_and_inactive_vehicles_are_removed() {
        let g = geometry();
        let mut vehicles = HashMap::new();
        let gone = insert_at(&mut vehicles, 0, LaneId::HorizontalBottom, 700.0, 100.0);
        let stays = insert_at(&mut vehicles, 1, LaneId::HorizontalBottom, 300.0, 100.0);
        let inactive = insert_at(&mut vehicles, 2, LaneId::VerticalRight, -500.0, 100.0);
        vehicles.get_mut(&inactive).unwrap().deactivate();

        let removed = remove_departed(&mut vehicles, &g, 10.0);
        assert_eq!(removed, vec![gone, inactive]);
        assert!(vehicles.contains_key(&stays));
    }

    #[test]
    fn only_the_lead_vehicle_is_gated() {
        let g = geometry();
        let lane = LaneId::HorizontalBottom;
        let mut vehicles = HashMap::new();
        // Stop line at 225
        let lead = insert_at(&mut vehicles, 0, lane, 200.0, 130.0);
        let follower = insert_at(&mut vehicles, 1, lane, -100.0, 130.0);
        let order = lane_order(&vehicles, lane);

        steer_lane(&mut vehicles, lane, &order, LaneSignal::Red, &g, &SignalGating::default());

        assert_eq!(vehicles[&lead].role, SignalRole::Lead);
        assert_eq!(vehicles[&lead].target_speed, 0.0);
        assert!(vehicles[&lead].stop_limit().is_some());
        assert_eq!(vehicles[&follower].role, SignalRole::Following);
        assert!(vehicles[&follower].stop_limit().is_none());
    }

    #[test]
    fn vehicle_past_the_line_is_clearing_and_next_one_leads() {
        let g = geometry();
        let lane = LaneId::VerticalRight;
        let mut vehicles = HashMap::new();
        // Stop line at y=375, i.e. progress -375
        let committed = insert_at(&mut vehicles, 0, lane, -360.0, 130.0);
        let waiting = insert_at(&mut vehicles, 1, lane, -500.0, 130.0);
        let exited = insert_at(&mut vehicles, 2, lane, -200.0, 130.0);
        let order = lane_order(&vehicles, lane);

        steer_lane(&mut vehicles, lane, &order, LaneSignal::Yellow, &g, &SignalGating::default());

        assert_eq!(vehicles[&committed].role, SignalRole::Clearing);
        assert!(vehicles[&committed].is_clearing());
        assert_eq!(vehicles[&waiting].role, SignalRole::Lead);
        assert_eq!(vehicles[&exited].role, SignalRole::Cleared);
    }

    #[test]
    fn no_light_leaves_lead_vehicle_free() {
        let g = geometry();
        let lane = LaneId::HorizontalTop;
        let mut vehicles = HashMap::new();
        let lead = insert_at(&mut vehicles, 0, lane, -380.0, 150.0);
        let order = lane_order(&vehicles, lane);

        steer_lane(&mut vehicles, lane, &order, LaneSignal::NoLight, &g, &SignalGating::default());

        assert_eq!(vehicles[&lead].role, SignalRole::Lead);
        assert_eq!(vehicles[&lead].target_speed, 150.0);
        assert!(vehicles[&lead].stop_limit().is_none());
    }

    #[test]
    fn follower_slows_behind_leader() {
        let g = geometry();
        let lane = LaneId::HorizontalBottom;
        let mut vehicles = HashMap::new();
        let leader = insert_at(&mut vehicles, 0, lane, 100.0, 60.0);
        let follower = insert_at(&mut vehicles, 1, lane, 0.0, 150.0);
        let order = lane_order(&vehicles, lane);

        steer_lane(&mut vehicles, lane, &order, LaneSignal::Green, &g, &SignalGating::default());

        // Gap of 50 is inside the follower's safe distance
        assert!(vehicles[&follower].target_speed <= 60.0);
        assert_eq!(vehicles[&leader].target_speed, 60.0);
    }

    #[test]
    fn overlapping_follower_is_pushed_back() {
        let lane = LaneId::HorizontalBottom;
        let mut vehicles = HashMap::new();
        let leader = insert_at(&mut vehicles, 0, lane, 200.0, 0.0);
        let follower = insert_at(&mut vehicles, 1, lane, 170.0, 80.0);
        let order = lane_order(&vehicles, lane);

        let corrected = correct_overlaps(&mut vehicles, &order, 4.0);
        assert_eq!(corrected, 1);
        let limit = vehicles[&leader].rear_progress() - 4.0;
        assert!((vehicles[&follower].front_progress() - limit).abs() < 1e-3);
        assert_eq!(vehicles[&follower].current_speed, 0.0);
    }
}
