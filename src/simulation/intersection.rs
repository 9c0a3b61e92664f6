//! Intersection geometry for the simulation
//!
//! Derived once from the simulation area: a square crossing box centred in
//! the area, the lateral position of every lane and the per-lane stop lines.
//!
//! Positions along a lane are expressed as *progress* (see
//! [`LaneId::progress`]) so that "ahead" is always "greater" regardless of
//! the direction of travel.

use super::types::{Axis, LaneId, Rect, Vec2};

/// Fixed geometry of the single intersection
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntersectionGeometry {
    /// Visible simulation area
    pub area: Rect,
    /// The crossing box
    pub bounds: Rect,
    pub road_width: f32,
    /// Distance from the box edge to each stop line
    pub stop_margin: f32,
}

impl IntersectionGeometry {
    pub fn new(area: Rect, road_width: f32, stop_margin_ratio: f32) -> Self {
        let center = area.center();
        let half = road_width / 2.0;
        Self {
            area,
            bounds: Rect::new(center.x - half, center.y - half, road_width, road_width),
            road_width,
            stop_margin: road_width * stop_margin_ratio,
        }
    }

    /// Coordinate across the lane axis on which vehicles are centred
    pub fn lane_lateral(&self, lane: LaneId) -> f32 {
        let center = self.bounds.center();
        let quarter = self.road_width / 4.0;
        match lane {
            LaneId::HorizontalBottom => center.y + quarter,
            LaneId::HorizontalTop => center.y - quarter,
            LaneId::VerticalLeft => center.x - quarter,
            LaneId::VerticalRight => center.x + quarter,
        }
    }

    /// Edge of the box a vehicle in this lane enters through
    pub fn near_boundary(&self, lane: LaneId) -> f32 {
        let (low, high) = self.box_span(lane.axis());
        if lane.sign() > 0.0 {
            low
        } else {
            high
        }
    }

    /// Edge of the box a vehicle in this lane leaves through
    pub fn far_boundary(&self, lane: LaneId) -> f32 {
        let (low, high) = self.box_span(lane.axis());
        if lane.sign() > 0.0 {
            high
        } else {
            low
        }
    }

    /// Stop line coordinate on the lane axis
    pub fn stop_line(&self, lane: LaneId) -> f32 {
        self.near_boundary(lane) - lane.sign() * self.stop_margin
    }

    pub fn stop_line_progress(&self, lane: LaneId) -> f32 {
        lane.progress(self.stop_line(lane))
    }

    /// Signed distance from a leading edge to the stop line; negative once
    /// the leading edge has passed it
    pub fn distance_to_stop_line(&self, lane: LaneId, front_progress: f32) -> f32 {
        self.stop_line_progress(lane) - front_progress
    }

    /// Whether a vehicle's centre lies within the box
    pub fn is_inside(&self, center: Vec2) -> bool {
        self.bounds.contains(center)
    }

    /// Whether a leading edge has passed the far boundary of the box
    pub fn has_crossed(&self, lane: LaneId, front_progress: f32) -> bool {
        front_progress > lane.progress(self.far_boundary(lane))
    }

    /// Leading edge progress of a freshly spawned vehicle, just outside the
    /// area edge the lane enters through
    pub fn spawn_front_progress(&self, lane: LaneId, spawn_offset: f32) -> f32 {
        lane.progress(self.entry_edge(lane)) - spawn_offset
    }

    /// Whether a trailing edge is past the far edge of the area by `margin`
    pub fn is_out_of_bounds(&self, lane: LaneId, rear_progress: f32, margin: f32) -> bool {
        rear_progress > lane.progress(self.exit_edge(lane)) + margin
    }

    /// Top-left corner of a footprint centred on the lane with its leading
    /// edge at `front_progress`
    pub fn top_left_for_front(&self, lane: LaneId, size: Vec2, front_progress: f32) -> Vec2 {
        let front = lane.sign() * front_progress;
        let lateral = self.lane_lateral(lane);
        match lane.axis() {
            Axis::Horizontal => {
                let x = if lane.sign() > 0.0 { front - size.x } else { front };
                Vec2::new(x, lateral - size.y / 2.0)
            }
            Axis::Vertical => {
                let y = if lane.sign() > 0.0 { front - size.y } else { front };
                Vec2::new(lateral - size.x / 2.0, y)
            }
        }
    }

    fn box_span(&self, axis: Axis) -> (f32, f32) {
        match axis {
            Axis::Horizontal => (self.bounds.left(), self.bounds.right()),
            Axis::Vertical => (self.bounds.top(), self.bounds.bottom()),
        }
    }

    fn entry_edge(&self, lane: LaneId) -> f32 {
        match lane {
            LaneId::HorizontalBottom => self.area.left(),
            LaneId::HorizontalTop => self.area.right(),
            LaneId::VerticalLeft => self.area.top(),
            LaneId::VerticalRight => self.area.bottom(),
        }
    }

    fn exit_edge(&self, lane: LaneId) -> f32 {
        match lane {
            LaneId::HorizontalBottom => self.area.right(),
            LaneId::HorizontalTop => self.area.left(),
            LaneId::VerticalLeft => self.area.bottom(),
            LaneId::VerticalRight => self.area.top(),
        }
    }
}
