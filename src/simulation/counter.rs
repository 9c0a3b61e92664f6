//! Congestion counter feeding the traffic light
//!
//! Counts the vehicles still waiting to use the intersection, per lane, and
//! classifies each lane as congested or not. Only the snapshot taken right
//! before a green-duration decision matters; the last one is kept around for
//! introspection.

use log::warn;

use super::config::CongestionThresholds;
use super::intersection::IntersectionGeometry;
use super::types::{Axis, LaneId, VehicleId};
use super::vehicle::SimVehicle;

/// Waiting vehicles in one lane
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LaneStats {
    pub count: usize,
    pub total_length: f32,
}

/// Waiting vehicles summed over the two lanes of an axis
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AxisTotals {
    pub count: usize,
    pub length: f32,
}

impl AxisTotals {
    /// Weighted load used to rank the two axes
    pub fn score(&self) -> f32 {
        self.count as f32 * 2.0 + self.length / 50.0
    }
}

/// Per-lane counts captured at one instant, with the thresholds in force
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CongestionSnapshot {
    lanes: [LaneStats; 4],
    thresholds: CongestionThresholds,
}

impl CongestionSnapshot {
    pub fn new(thresholds: CongestionThresholds) -> Self {
        Self {
            lanes: [LaneStats::default(); 4],
            thresholds,
        }
    }

    /// Build a snapshot from explicit lane figures
    pub fn from_lanes(
        lanes: impl IntoIterator<Item = (LaneId, LaneStats)>,
        thresholds: CongestionThresholds,
    ) -> Self {
        let mut snapshot = Self::new(thresholds);
        for (lane, stats) in lanes {
            snapshot.lanes[lane.index()] = stats;
        }
        snapshot
    }

    pub fn lane(&self, lane: LaneId) -> LaneStats {
        self.lanes[lane.index()]
    }

    pub fn thresholds(&self) -> &CongestionThresholds {
        &self.thresholds
    }

    pub fn is_congested(&self, lane: LaneId) -> bool {
        let stats = self.lane(lane);
        stats.count >= self.thresholds.count || stats.total_length >= self.thresholds.length
    }

    pub fn is_axis_congested(&self, axis: Axis) -> bool {
        LaneId::ALL
            .iter()
            .filter(|lane| lane.axis() == axis)
            .any(|lane| self.is_congested(*lane))
    }

    pub fn axis_totals(&self, axis: Axis) -> AxisTotals {
        LaneId::ALL
            .iter()
            .filter(|lane| lane.axis() == axis)
            .fold(AxisTotals::default(), |totals, lane| {
                let stats = self.lane(*lane);
                AxisTotals {
                    count: totals.count + stats.count,
                    length: totals.length + stats.total_length,
                }
            })
    }

    /// Whether both axes carry a comparable load, by count or by length.
    /// Two empty axes are similar; one empty axis against a busy one is not.
    pub fn totals_similar(&self) -> bool {
        let horizontal = self.axis_totals(Axis::Horizontal);
        let vertical = self.axis_totals(Axis::Vertical);
        let floor = 1.0 - self.thresholds.similarity_tolerance;

        if horizontal.count == 0 && vertical.count == 0 {
            return true;
        }
        if horizontal.count == 0 || vertical.count == 0 {
            return false;
        }

        let count_ratio = horizontal.count.min(vertical.count) as f32
            / horizontal.count.max(vertical.count) as f32;
        let count_similar = count_ratio >= floor;

        let length_similar = if horizontal.length <= 0.0 && vertical.length <= 0.0 {
            true
        } else if horizontal.length <= 0.0 || vertical.length <= 0.0 {
            false
        } else {
            horizontal.length.min(vertical.length) / horizontal.length.max(vertical.length) >= floor
        };

        count_similar || length_similar
    }

    /// The axis with the larger weighted load; ties go to the vertical axis
    pub fn heavier_axis(&self) -> Axis {
        let horizontal = self.axis_totals(Axis::Horizontal).score();
        let vertical = self.axis_totals(Axis::Vertical).score();
        if horizontal > vertical {
            Axis::Horizontal
        } else {
            Axis::Vertical
        }
    }
}

/// One lane's line in a [`CongestionSummary`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LaneSummary {
    pub lane: LaneId,
    pub count: usize,
    pub length: f32,
    pub congested: bool,
}

/// Human-oriented view of the last sample
#[derive(Debug, Clone, PartialEq)]
pub struct CongestionSummary {
    pub lanes: Vec<LaneSummary>,
    pub horizontal: AxisTotals,
    pub vertical: AxisTotals,
}

/// Samples vehicles that have yet to use the intersection
#[derive(Debug, Clone)]
pub struct CongestionCounter {
    thresholds: CongestionThresholds,
    last: CongestionSnapshot,
    /// Vehicles counted in the last sample, per lane
    counted: [Vec<VehicleId>; 4],
}

impl CongestionCounter {
    pub fn new(thresholds: CongestionThresholds) -> Self {
        Self {
            thresholds,
            last: CongestionSnapshot::new(thresholds),
            counted: Default::default(),
        }
    }

    /// Count active vehicles that are neither inside the box nor past it
    pub fn sample<'a>(
        &mut self,
        vehicles: impl IntoIterator<Item = &'a SimVehicle>,
        geometry: &IntersectionGeometry,
    ) -> CongestionSnapshot {
        let mut snapshot = CongestionSnapshot::new(self.thresholds);
        for list in &mut self.counted {
            list.clear();
        }

        for vehicle in vehicles {
            if !vehicle.is_active() {
                continue;
            }
            if geometry.has_crossed(vehicle.lane, vehicle.front_progress()) {
                continue;
            }
            if geometry.is_inside(vehicle.center()) {
                continue;
            }

            let lane = vehicle.lane;
            let stats = &mut snapshot.lanes[lane.index()];
            stats.count += 1;
            stats.total_length += vehicle.length();
            self.counted[lane.index()].push(vehicle.id);
        }

        for list in &mut self.counted {
            list.sort();
        }
        self.last = snapshot;
        snapshot
    }

    pub fn last_snapshot(&self) -> &CongestionSnapshot {
        &self.last
    }

    pub fn is_congested(&self, lane: LaneId) -> bool {
        self.last.is_congested(lane)
    }

    /// Vehicles counted for a lane in the last sample
    pub fn counted_vehicles(&self, lane: LaneId) -> &[VehicleId] {
        &self.counted[lane.index()]
    }

    pub fn summary(&self) -> CongestionSummary {
        CongestionSummary {
            lanes: LaneId::ALL
                .iter()
                .map(|lane| {
                    let stats = self.last.lane(*lane);
                    LaneSummary {
                        lane: *lane,
                        count: stats.count,
                        length: stats.total_length,
                        congested: self.last.is_congested(*lane),
                    }
                })
                .collect(),
            horizontal: self.last.axis_totals(Axis::Horizontal),
            vertical: self.last.axis_totals(Axis::Vertical),
        }
    }

    pub fn thresholds(&self) -> &CongestionThresholds {
        &self.thresholds
    }

    pub fn set_congestion_thresholds(&mut self, count: usize, length: f32) {
        self.thresholds.count = count;
        self.thresholds.length = length.max(0.0);
    }

    /// Tolerance is clamped into [0, 1]
    pub fn set_similarity_tolerance(&mut self, tolerance: f32) {
        let clamped = if tolerance.is_nan() {
            self.thresholds.similarity_tolerance
        } else {
            tolerance.clamp(0.0, 1.0)
        };
        if clamped != tolerance {
            warn!("Similarity tolerance {} clamped to {}", tolerance, clamped);
        }
        self.thresholds.similarity_tolerance = clamped;
    }
}
