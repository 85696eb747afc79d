//! Vehicle kinematics, lane geometry, and the intersection state machine (C3).
//!
//! Grounded in the corpus's `simulation_engine::vehicles::Vehicle` for field
//! shape and `original_source/models/vehicle.py` for the desired-speed
//! pipeline and turn-snap semantics (SPEC_FULL.md §4.3 is authoritative for
//! all numeric thresholds).

use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::error::{EngineError, EngineResult};
use crate::geometry::{in_intersection_box, inbound_lane_offset, intersection_center, outbound_lane_offset, Direction, Vec2};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Intent {
    Straight,
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Priority {
    Normal,
    Emergency,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VehicleState {
    Moving,
    Braking,
    Waiting,
    Crossing,
    Crashed,
    Done,
}

impl VehicleState {
    pub fn is_live(self) -> bool {
        !matches!(self, VehicleState::Done)
    }
}

/// Input spec for a vehicle, shared by scenario definitions and the custom
/// scenario builder (SPEC_FULL.md §6 validation rules).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehicleSpec {
    pub id: String,
    pub direction: Direction,
    #[serde(default = "default_intent")]
    pub intent: Intent,
    #[serde(default = "default_priority")]
    pub priority: Priority,
    #[serde(default = "default_speed_multiplier")]
    pub speed_multiplier: f64,
    #[serde(default = "default_true")]
    pub v2x_enabled: bool,
    #[serde(default)]
    pub no_stop: bool,
    /// Queue index within its approach; determines spawn offset and delay.
    #[serde(default)]
    pub queue_index: u32,
    /// Additional scenario-calibration spawn distance, px (SPEC_FULL.md §3
    /// "spawn offsets"). Not part of the custom-builder validation contract;
    /// always 0.0 for builder-authored vehicles, used only by the built-in
    /// catalog to synchronize arrival times in demonstration scenarios.
    #[serde(default)]
    pub spawn_offset_px: f64,
}

fn default_intent() -> Intent {
    Intent::Straight
}
fn default_priority() -> Priority {
    Priority::Normal
}
fn default_speed_multiplier() -> f64 {
    1.0
}
fn default_true() -> bool {
    true
}

impl VehicleSpec {
    pub fn validate(&self) -> EngineResult<()> {
        if self.id.trim().is_empty() {
            return Err(EngineError::InvalidSpec("id must not be empty".into()));
        }
        if !(SPEED_MULTIPLIER_MIN..=SPEED_MULTIPLIER_MAX).contains(&self.speed_multiplier) {
            return Err(EngineError::InvalidSpec(format!(
                "speed_multiplier {} out of range [{SPEED_MULTIPLIER_MIN}, {SPEED_MULTIPLIER_MAX}]",
                self.speed_multiplier
            )));
        }
        Ok(())
    }
}

/// Public record published to the state bus and exposed in the snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehiclePublicRecord {
    pub id: String,
    pub direction: Direction,
    pub intent: Intent,
    pub priority: Priority,
    pub v2x: bool,
    pub no_stop: bool,
    pub state: VehicleState,
    pub clearance: bool,
    pub position: Vec2,
    pub velocity: Vec2,
    pub speed_kmh: f64,
    pub heading: f64,
    pub distance_to_center: f64,
    pub timestamp: f64,
}

#[derive(Clone)]
pub struct Vehicle {
    pub id: String,
    pub direction: Direction,
    pub intent: Intent,
    pub priority: Priority,
    pub speed_multiplier: f64,
    pub v2x_capable: bool,
    pub no_stop: bool,
    pub spawn_tick: u64,

    pub exit_direction: Direction,
    pub stop_line: Vec2,
    pub base_speed: f64,

    pub position: Vec2,
    pub velocity: Vec2,
    pub current_travel_unit: Vec2,
    pub state: VehicleState,
    pub clearance: bool,
    pub agent_yield: bool,
    pub turned: bool,
}

fn exit_direction_for(direction: Direction, intent: Intent) -> Direction {
    match intent {
        Intent::Straight => direction.opposite(),
        Intent::Right => direction.right_hand_neighbor(),
        Intent::Left => direction.left_hand_neighbor(),
    }
}

impl Vehicle {
    /// Builds a vehicle from a validated spec, computing all derived-at-spawn
    /// fields (SPEC_FULL.md §3): spawn position (from approach + queue
    /// index), base velocity, exit direction, stop-line coordinate.
    pub fn from_spec(spec: &VehicleSpec) -> Vehicle {
        let direction = spec.direction;
        let exit_direction = exit_direction_for(direction, spec.intent);
        let travel_unit = direction.travel_unit();
        let center = intersection_center();
        let lane_offset = inbound_lane_offset(direction);

        let queue_offset = SPAWN_QUEUE_OFFSET_PX * spec.queue_index as f64;
        let spawn_distance = SPAWN_DISTANCE + queue_offset + spec.spawn_offset_px;
        let spawn_pos = center
            .sub(travel_unit.scale(spawn_distance))
            .add(lane_offset);

        let stop_line = center
            .sub(travel_unit.scale(INTERSECTION_HALF + STOP_MARGIN))
            .add(lane_offset);

        let base_speed_px_per_tick = spec.speed_multiplier * base_tick_speed();

        Vehicle {
            id: spec.id.clone(),
            direction,
            intent: spec.intent,
            priority: spec.priority,
            speed_multiplier: spec.speed_multiplier,
            v2x_capable: spec.v2x_enabled,
            no_stop: spec.no_stop,
            spawn_tick: spec.queue_index as u64 * SPAWN_QUEUE_DELAY_TICKS,
            exit_direction,
            stop_line,
            base_speed: base_speed_px_per_tick,
            position: spawn_pos,
            velocity: Vec2::ZERO,
            current_travel_unit: travel_unit,
            state: VehicleState::Moving,
            clearance: false,
            agent_yield: false,
            turned: false,
        }
    }

    pub fn is_active(&self, tick: u64) -> bool {
        tick >= self.spawn_tick
    }

    pub fn is_live(&self) -> bool {
        self.state.is_live()
    }

    /// Signed distance remaining to the stop line along the vehicle's
    /// current travel direction: positive while before the line, zero/negative
    /// at or past it.
    pub fn distance_to_stop_line(&self) -> f64 {
        self.stop_line.sub(self.position).dot(self.current_travel_unit)
    }

    pub fn distance_to_center(&self) -> f64 {
        self.position.distance_to(intersection_center())
    }

    pub fn in_intersection_box(&self) -> bool {
        in_intersection_box(self.position)
    }

    /// Component of `position - center` along the entry-approach travel
    /// direction: negative before the center, ~0 at the center, positive once
    /// past it. Used to trigger the once-only turn snap.
    fn center_axis_progress(&self) -> f64 {
        self.position
            .sub(intersection_center())
            .dot(self.direction.travel_unit())
    }

    pub fn speed_kmh(&self) -> f64 {
        self.velocity.length() * TICK_RATE_HZ * (BASELINE_SPEED_KMH / 90.0)
    }

    pub fn to_public_record(&self, timestamp: f64) -> VehiclePublicRecord {
        VehiclePublicRecord {
            id: self.id.clone(),
            direction: self.direction,
            intent: self.intent,
            priority: self.priority,
            v2x: self.v2x_capable,
            no_stop: self.no_stop,
            state: self.state,
            clearance: self.clearance,
            position: self.position,
            velocity: self.velocity,
            speed_kmh: self.speed_kmh(),
            heading: self.velocity.heading(),
            distance_to_center: self.distance_to_center(),
            timestamp,
        }
    }

    /// Applies the once-only heading snap at the intersection center
    /// (SPEC_FULL.md §4.3 "Turning"). No-op if already turned, going
    /// straight, or not yet past the center.
    fn maybe_turn(&mut self) {
        if self.turned || self.intent == Intent::Straight {
            return;
        }
        if self.center_axis_progress() < 0.0 {
            return;
        }
        let speed = self.velocity.length();
        let new_travel = self.exit_direction.travel_unit();
        let offset = outbound_lane_offset(self.exit_direction);
        let center = intersection_center();
        self.position = Vec2::new(center.x + offset.x, center.y + offset.y);
        self.current_travel_unit = new_travel;
        self.velocity = new_travel.scale(speed);
        self.turned = true;
    }

    /// Integrates motion and runs the state machine for one tick, given the
    /// desired-speed factor already computed by [`crate::kinematics`].
    pub fn integrate(&mut self, factor: f64) {
        if matches!(self.state, VehicleState::Crashed | VehicleState::Done) {
            return;
        }
        if matches!(self.state, VehicleState::Waiting) && !self.clearance {
            self.velocity = Vec2::ZERO;
        } else {
            self.velocity = self.current_travel_unit.scale(self.base_speed * factor);
            self.position = self.position.add(self.velocity);
            self.maybe_turn();
        }

        self.transition(factor);
    }

    fn transition(&mut self, factor: f64) {
        match self.state {
            VehicleState::Moving | VehicleState::Braking => {
                let d = self.distance_to_stop_line();
                if d <= 1.0 && !self.clearance && !self.no_stop {
                    self.state = VehicleState::Waiting;
                    self.velocity = Vec2::ZERO;
                } else if self.exited_canvas() {
                    self.state = VehicleState::Done;
                } else if factor < 1.0 && factor > 0.0 {
                    self.state = VehicleState::Braking;
                } else {
                    self.state = VehicleState::Moving;
                }
            }
            VehicleState::Waiting => {
                if self.clearance {
                    self.state = VehicleState::Crossing;
                }
            }
            VehicleState::Crossing => {
                if self.exited_canvas() {
                    self.state = VehicleState::Done;
                }
            }
            VehicleState::Crashed | VehicleState::Done => {}
        }
    }

    fn exited_canvas(&self) -> bool {
        let outward = self.position.sub(intersection_center());
        let moving_away = outward.dot(self.current_travel_unit) > 0.0;
        moving_away && self.position.distance_to(intersection_center()) >= SPAWN_DISTANCE + CANVAS_EXIT_MARGIN
    }

    /// Self-granted clearance for non-V2X vehicles reading the signal
    /// directly (SPEC_FULL.md §4.3 "Non-V2X vehicles").
    pub fn self_grant_from_signal(&mut self, approach_is_green: bool) {
        if self.v2x_capable {
            return;
        }
        if self.distance_to_stop_line() < 0.0 {
            // already past the stop line: stop consulting the light.
            return;
        }
        self.clearance = approach_is_green;
    }
}

/// Converts a nominal multiplier-1.0 vehicle into a per-tick pixel speed. The
/// 30 px/tick baseline matches the corpus's 30 Hz tick rate combined with the
/// `speed-kmh = |v|*30*(50/90)` derived-field relation in SPEC_FULL.md §4.3,
/// inverted to solve for px/tick at the 50 km/h baseline.
fn base_tick_speed() -> f64 {
    // v_px_per_tick such that v * TICK_RATE_HZ * (50/90) == 50  =>  v = 90 / TICK_RATE_HZ
    90.0 / TICK_RATE_HZ
}

#[cfg(test)]
mod tests {
    use super::*;

    fn straight_spec(id: &str, direction: Direction) -> VehicleSpec {
        VehicleSpec {
            id: id.to_string(),
            direction,
            intent: Intent::Straight,
            priority: Priority::Normal,
            speed_multiplier: 1.0,
            v2x_enabled: true,
            no_stop: false,
            queue_index: 0,
            spawn_offset_px: 0.0,
        }
    }

    // P2: waiting implies zero velocity.
    #[test]
    fn waiting_state_has_zero_velocity() {
        let spec = straight_spec("A", Direction::N);
        let mut v = Vehicle::from_spec(&spec);
        v.state = VehicleState::Waiting;
        v.clearance = false;
        v.integrate(1.0);
        assert_eq!(v.state, VehicleState::Waiting);
        assert_eq!(v.velocity, Vec2::ZERO);
    }

    // B2: a vehicle exactly at the stop line with no clearance reports waiting.
    #[test]
    fn vehicle_at_stop_line_without_clearance_waits() {
        let spec = straight_spec("A", Direction::N);
        let mut v = Vehicle::from_spec(&spec);
        v.position = v.stop_line;
        v.clearance = false;
        v.transition(1.0);
        assert_eq!(v.state, VehicleState::Waiting);
        assert_eq!(v.velocity, Vec2::ZERO);
    }

    // P7: the turn snap applies at most once, even across many ticks past center.
    #[test]
    fn turn_applies_exactly_once() {
        let mut spec = straight_spec("A", Direction::N);
        spec.intent = Intent::Right;
        let mut v = Vehicle::from_spec(&spec);
        v.clearance = true;
        v.no_stop = true;
        for _ in 0..200 {
            v.integrate(1.0);
        }
        assert!(v.turned);
        let travel_after_turn = v.current_travel_unit;
        for _ in 0..50 {
            v.integrate(1.0);
        }
        assert_eq!(v.current_travel_unit, travel_after_turn);
    }

    #[test]
    fn non_v2x_vehicle_self_grants_only_when_green_and_before_stop_line() {
        let spec = {
            let mut s = straight_spec("A", Direction::N);
            s.v2x_enabled = false;
            s
        };
        let mut v = Vehicle::from_spec(&spec);
        v.self_grant_from_signal(false);
        assert!(!v.clearance);
        v.self_grant_from_signal(true);
        assert!(v.clearance);
    }
}
