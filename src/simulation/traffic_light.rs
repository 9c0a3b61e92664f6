//! Traffic light controller for the intersection
//!
//! A three-state cycle: horizontal green, all-stop caution, vertical green,
//! caution, and back. Caution always lasts the configured time; each green
//! phase gets a duration chosen from a congestion snapshot taken the moment
//! the preceding caution ends.

use std::fmt;

use log::{debug, info, warn};

use super::config::SignalTiming;
use super::counter::CongestionSnapshot;
use super::types::{Axis, LaneId};

/// Shortest phase the controller will run, so zero durations cannot stall a tick
const MIN_PHASE_SECONDS: f32 = 1e-3;

/// Upper bound on phase changes handled by one call to `tick`
const MAX_TRANSITIONS_PER_TICK: usize = 16;

/// State of the traffic light
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalPhase {
    /// Simulation not running; nothing is gated
    Off,
    /// Phase A: horizontal lanes may proceed
    HorizontalGo,
    /// All lanes stop between the two go phases
    Caution,
    /// Phase B: vertical lanes may proceed
    VerticalGo,
}

impl SignalPhase {
    /// Axis allowed to proceed, if any
    pub fn served_axis(self) -> Option<Axis> {
        match self {
            SignalPhase::HorizontalGo => Some(Axis::Horizontal),
            SignalPhase::VerticalGo => Some(Axis::Vertical),
            SignalPhase::Caution | SignalPhase::Off => None,
        }
    }

    pub fn is_go(self) -> bool {
        self.served_axis().is_some()
    }

    fn opposite_go(self) -> SignalPhase {
        match self {
            SignalPhase::HorizontalGo => SignalPhase::VerticalGo,
            _ => SignalPhase::HorizontalGo,
        }
    }
}

impl fmt::Display for SignalPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SignalPhase::Off => "off",
            SignalPhase::HorizontalGo => "horizontal_go",
            SignalPhase::Caution => "caution",
            SignalPhase::VerticalGo => "vertical_go",
        };
        f.write_str(name)
    }
}

/// What the light shows to one lane
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LaneSignal {
    /// The light is off
    NoLight,
    Green,
    /// Caution right after this lane's green
    Yellow,
    Red,
}

impl LaneSignal {
    pub fn requires_stop(self) -> bool {
        matches!(self, LaneSignal::Yellow | LaneSignal::Red)
    }
}

/// Remaining time in the current phase
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Countdown {
    Seconds(f32),
    NotAvailable,
}

impl fmt::Display for Countdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Countdown::Seconds(seconds) => write!(f, "{}", seconds.max(0.0) as u32),
            Countdown::NotAvailable => f.write_str("N/A"),
        }
    }
}

/// Which rule picked a green duration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurationCase {
    /// Comparable load, nobody congested
    SimilarLoad,
    /// Comparable load, at least one lane congested
    SimilarCongested,
    /// Uneven load, the next phase serves the busier axis
    ServesHeavierAxis,
    /// Uneven load, the next phase serves the quieter axis
    ServesLighterAxis,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DurationDecision {
    pub duration: f32,
    pub case: DurationCase,
}

/// Choose the green duration for a phase serving `serving`
pub fn decide_green_duration(
    snapshot: &CongestionSnapshot,
    serving: Axis,
    timing: &SignalTiming,
) -> DurationDecision {
    let similar = snapshot.totals_similar();
    let congested = snapshot.is_axis_congested(Axis::Horizontal)
        || snapshot.is_axis_congested(Axis::Vertical);

    let (duration, case) = if similar && !congested {
        (timing.min_green, DurationCase::SimilarLoad)
    } else if similar {
        (timing.max_green, DurationCase::SimilarCongested)
    } else if snapshot.heavier_axis() == serving {
        (timing.max_green, DurationCase::ServesHeavierAxis)
    } else {
        (timing.min_green, DurationCase::ServesLighterAxis)
    };

    let horizontal = snapshot.axis_totals(Axis::Horizontal);
    let vertical = snapshot.axis_totals(Axis::Vertical);
    debug!(
        "Green duration for {:?}: {:.1}s ({:?}); horizontal {} vehicles / {:.1}, vertical {} vehicles / {:.1}",
        serving, duration, case, horizontal.count, horizontal.length, vertical.count, vertical.length
    );

    DurationDecision { duration, case }
}

/// A phase transition, reported to whoever drives the controller
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhaseChange {
    pub from: SignalPhase,
    pub to: SignalPhase,
    /// Set when entering a green phase
    pub decision: Option<DurationDecision>,
}

/// The intersection's traffic light
#[derive(Debug, Clone)]
pub struct TrafficLightController {
    timing: SignalTiming,
    phase: SignalPhase,
    /// Most recent go phase; decides what caution turns into
    last_go: SignalPhase,
    green_duration: f32,
    phase_timer: f32,
    caution_timer: f32,
    completed_cautions: usize,
}

impl TrafficLightController {
    /// A running light, starting with horizontal green
    pub fn new(timing: SignalTiming) -> Self {
        let mut controller = Self::new_off(timing);
        controller.switch_on();
        controller
    }

    /// A light that has not been switched on yet
    pub fn new_off(timing: SignalTiming) -> Self {
        Self {
            timing,
            phase: SignalPhase::Off,
            last_go: SignalPhase::HorizontalGo,
            green_duration: timing.initial_green,
            phase_timer: 0.0,
            caution_timer: 0.0,
            completed_cautions: 0,
        }
    }

    pub fn timing(&self) -> &SignalTiming {
        &self.timing
    }

    pub fn phase(&self) -> SignalPhase {
        self.phase
    }

    pub fn is_on(&self) -> bool {
        self.phase != SignalPhase::Off
    }

    /// Green time granted to the current or upcoming go phase
    pub fn green_duration(&self) -> Option<f32> {
        self.is_on().then_some(self.green_duration)
    }

    /// Number of caution phases completed since switching on
    pub fn completed_cautions(&self) -> usize {
        self.completed_cautions
    }

    /// Change the range future green durations are chosen from.
    ///
    /// `min` is raised to a small positive floor and `max` to at least `min`.
    /// The phase in progress keeps its duration.
    pub fn set_green_range(&mut self, min: f32, max: f32) {
        let min_green = if min.is_finite() {
            min.max(MIN_PHASE_SECONDS)
        } else {
            self.timing.min_green
        };
        let max_green = if max.is_finite() {
            max.max(min_green)
        } else {
            self.timing.max_green.max(min_green)
        };
        if min_green != min || max_green != max {
            warn!(
                "Green range [{}, {}] adjusted to [{}, {}]",
                min, max, min_green, max_green
            );
        }
        self.timing.min_green = min_green;
        self.timing.max_green = max_green;
    }

    /// Restart the cycle from horizontal green; no-op when already running
    pub fn switch_on(&mut self) {
        if self.is_on() {
            return;
        }
        self.phase = SignalPhase::HorizontalGo;
        self.last_go = SignalPhase::HorizontalGo;
        self.green_duration = self.timing.initial_green.max(MIN_PHASE_SECONDS);
        self.phase_timer = 0.0;
        self.caution_timer = 0.0;
        self.completed_cautions = 0;
        info!("Traffic light on: {}", self.phase);
    }

    pub fn switch_off(&mut self) {
        if !self.is_on() {
            return;
        }
        self.phase = SignalPhase::Off;
        self.last_go = SignalPhase::HorizontalGo;
        self.phase_timer = 0.0;
        self.caution_timer = 0.0;
        info!("Traffic light off");
    }

    /// What an axis sees right now
    pub fn axis_signal(&self, axis: Axis) -> LaneSignal {
        match self.phase {
            SignalPhase::Off => LaneSignal::NoLight,
            SignalPhase::Caution => {
                if self.last_go.served_axis() == Some(axis) {
                    LaneSignal::Yellow
                } else {
                    LaneSignal::Red
                }
            }
            go => {
                if go.served_axis() == Some(axis) {
                    LaneSignal::Green
                } else {
                    LaneSignal::Red
                }
            }
        }
    }

    pub fn lane_signal(&self, lane: LaneId) -> LaneSignal {
        self.axis_signal(lane.axis())
    }

    /// Time left in the current phase, floored at zero
    pub fn remaining(&self) -> Countdown {
        match self.phase {
            SignalPhase::Off => Countdown::NotAvailable,
            SignalPhase::Caution => {
                Countdown::Seconds((self.caution_duration() - self.caution_timer).max(0.0))
            }
            _ => Countdown::Seconds((self.green_duration - self.phase_timer).max(0.0)),
        }
    }

    /// Text for a countdown widget: whole seconds while green, one to three
    /// dots during caution, "N/A" when off
    pub fn countdown_label(&self) -> String {
        match self.phase {
            SignalPhase::Caution => {
                let dots = (self.caution_timer as usize + 1).min(3);
                vec!["."; dots].join(" ")
            }
            _ => self.remaining().to_string(),
        }
    }

    /// End the current green now
    pub fn begin_caution(&mut self) -> Option<PhaseChange> {
        self.phase.is_go().then(|| self.enter_caution())
    }

    /// Advance the light by `dt` seconds.
    ///
    /// `sample` is called at every caution-to-green transition and must
    /// return the congestion at that moment. Leftover time carries into the
    /// next phase, so one long step may cross several transitions.
    pub fn tick(
        &mut self,
        dt: f32,
        mut sample: impl FnMut() -> CongestionSnapshot,
    ) -> Vec<PhaseChange> {
        let mut changes = Vec::new();
        if !self.is_on() || !(dt > 0.0) || !dt.is_finite() {
            return changes;
        }

        // Time beyond one full cycle is dropped
        let mut remaining = dt.min(self.cycle_limit());
        while changes.len() < MAX_TRANSITIONS_PER_TICK {
            match self.phase {
                SignalPhase::HorizontalGo | SignalPhase::VerticalGo => {
                    let left = (self.green_duration - self.phase_timer).max(0.0);
                    if remaining < left {
                        self.phase_timer += remaining;
                        break;
                    }
                    remaining -= left;
                    changes.push(self.enter_caution());
                }
                SignalPhase::Caution => {
                    let left = (self.caution_duration() - self.caution_timer).max(0.0);
                    if remaining < left {
                        self.caution_timer += remaining;
                        break;
                    }
                    remaining -= left;
                    let snapshot = sample();
                    changes.push(self.complete_caution(&snapshot));
                }
                SignalPhase::Off => break,
            }
        }
        changes
    }

    /// Longest possible pass through both greens and both cautions
    fn cycle_limit(&self) -> f32 {
        let longest_green = self
            .timing
            .max_green
            .max(self.timing.initial_green)
            .max(self.green_duration);
        2.0 * (longest_green + self.caution_duration())
    }

    fn caution_duration(&self) -> f32 {
        self.timing.caution.max(MIN_PHASE_SECONDS)
    }

    fn enter_caution(&mut self) -> PhaseChange {
        let from = self.phase;
        self.last_go = from;
        self.phase = SignalPhase::Caution;
        self.caution_timer = 0.0;
        info!("Traffic light: {} -> {}", from, self.phase);
        PhaseChange {
            from,
            to: SignalPhase::Caution,
            decision: None,
        }
    }

    fn complete_caution(&mut self, snapshot: &CongestionSnapshot) -> PhaseChange {
        let next = self.last_go.opposite_go();
        let serving = next.served_axis().unwrap_or(Axis::Horizontal);
        let decision = decide_green_duration(snapshot, serving, &self.timing);

        self.phase = next;
        self.last_go = next;
        self.green_duration = decision.duration.max(MIN_PHASE_SECONDS);
        self.phase_timer = 0.0;
        self.caution_timer = 0.0;
        self.completed_cautions += 1;
        info!(
            "Traffic light: caution -> {} for {:.1}s",
            next, self.green_duration
        );

        PhaseChange {
            from: SignalPhase::Caution,
            to: next,
            decision: Some(decision),
        }
    }
}
