//! Per-vehicle decision agent (C6): perception → decision → action.
//!
//! Grounded in `original_source/services/central_system.py` and
//! `services/collision.py` for the TTC-threshold evaluator shape; the
//! short-circuit pipeline and thresholds are normative per SPEC_FULL.md
//! §4.6.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::advisor::AdvisorClient;
use crate::arbiter::{conflict, tta};
use crate::constants::{AGENT_MEMORY_MIN, AGENT_RELEVANT_RANGE, TTC_BRAKE_SECS};
use crate::event_log::{ActionTag, EventLog};
use crate::vehicle::{Priority, Vehicle, VehicleState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    Go,
    Yield,
    Brake,
}

impl Action {
    pub fn is_yield(self) -> bool {
        matches!(self, Action::Yield | Action::Brake)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub tick: u64,
    pub action: Action,
    pub reason: String,
}

/// Where an agent's decision comes from: injected once at construction, not
/// swapped at runtime (SPEC_FULL.md §9 "Polymorphic decision").
pub enum DecisionSource {
    Deterministic,
    Advisor(std::sync::Arc<AdvisorClient>),
}

pub struct VehicleAgent {
    pub vehicle_id: String,
    pub source: DecisionSource,
    memory: VecDeque<MemoryEntry>,
    last_action: Option<Action>,
}

impl VehicleAgent {
    pub fn new(vehicle_id: String, source: DecisionSource) -> Self {
        VehicleAgent {
            vehicle_id,
            source,
            memory: VecDeque::with_capacity(AGENT_MEMORY_MIN),
            last_action: None,
        }
    }

    pub fn memory(&self) -> impl Iterator<Item = &MemoryEntry> {
        self.memory.iter()
    }

    fn remember(&mut self, tick: u64, action: Action, reason: &str, log: &mut EventLog) {
        let changed = self.last_action != Some(action);
        self.memory.push_back(MemoryEntry {
            tick,
            action,
            reason: reason.to_string(),
        });
        while self.memory.len() > AGENT_MEMORY_MIN {
            self.memory.pop_front();
        }
        if changed {
            let tag = match action {
                Action::Go => ActionTag::Go,
                Action::Yield => ActionTag::Yield,
                Action::Brake => ActionTag::Brake,
            };
            log.log_decision(&self.vehicle_id, tag, None, reason);
        }
        self.last_action = Some(action);
    }

    /// Runs the decision pipeline for one tick and returns the resulting
    /// `agent_yield` flag; also updates bounded memory and the event log.
    pub fn decide(
        &mut self,
        tick: u64,
        cooperation_on: bool,
        vehicles: &[Vehicle],
        self_index: usize,
        log: &mut EventLog,
    ) -> bool {
        let (action, reason) = self.pipeline(cooperation_on, vehicles, self_index);
        self.remember(tick, action, &reason, log);
        action.is_yield()
    }

    fn pipeline(
        &self,
        cooperation_on: bool,
        vehicles: &[Vehicle],
        self_index: usize,
    ) -> (Action, String) {
        let me = &vehicles[self_index];

        // 1. Non-V2X vehicles never negotiate through the agent.
        if !me.v2x_capable {
            return (Action::Go, "non-v2x vehicle does not negotiate".into());
        }
        // 2. Cooperation off.
        if !cooperation_on {
            return (Action::Go, "cooperation disabled".into());
        }
        // 3. Terminal states are no-ops.
        if matches!(me.state, VehicleState::Done | VehicleState::Crashed) {
            return (Action::Go, "terminal state".into());
        }
        // 4. Already crossing: clearance already granted, motion owned by vehicle.
        if me.state == VehicleState::Crossing {
            return (Action::Go, "already crossing under clearance".into());
        }
        // 5. Waiting reflects clearance directly.
        if me.state == VehicleState::Waiting {
            return if me.clearance {
                (Action::Go, "clearance granted".into())
            } else {
                (Action::Yield, "waiting for clearance".into())
            };
        }
        // 6. no-stop vehicles never yield.
        if me.no_stop {
            return (Action::Go, "no-stop vehicle proceeds at speed".into());
        }
        // 7. Far from the intersection: nothing to negotiate yet.
        if me.distance_to_center() >= AGENT_RELEVANT_RANGE {
            return (Action::Go, "outside relevant range".into());
        }
        // 8/9. Build the relevant-neighbor set.
        let neighbors = relevant_neighbors(me, vehicles);
        if neighbors.is_empty() {
            return (Action::Go, "no conflicting neighbors in range".into());
        }

        // 10. Request a decision from the advisor if available, else the
        // deterministic evaluator. The deterministic result is always
        // computed first: it is both the direct answer and the fallback the
        // advisor resolution may need.
        let (fallback_action, fallback_reason) = deterministic_decision(me, &neighbors);
        match &self.source {
            DecisionSource::Deterministic => (fallback_action, fallback_reason),
            DecisionSource::Advisor(client) => {
                let recent_memory: Vec<MemoryEntry> = self.memory.iter().rev().take(3).rev().cloned().collect();
                client.resolve(
                    &self.vehicle_id,
                    me,
                    &neighbors,
                    &recent_memory,
                    fallback_action,
                    fallback_reason,
                )
            }
        }
    }
}

/// v2x-capable, same intersection, not done/crossing, within range, not on
/// the same approach, and path-conflicting with self.
fn relevant_neighbors<'a>(me: &Vehicle, vehicles: &'a [Vehicle]) -> Vec<&'a Vehicle> {
    vehicles
        .iter()
        .filter(|o| o.id != me.id)
        .filter(|o| o.v2x_capable)
        .filter(|o| !matches!(o.state, VehicleState::Done | VehicleState::Crossing))
        .filter(|o| o.distance_to_center() < AGENT_RELEVANT_RANGE)
        .filter(|o| o.direction != me.direction)
        .filter(|o| conflict(me, o))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_log::EventLog;
    use crate::geometry::Direction;
    use crate::vehicle::{Intent, VehicleSpec};

    fn spec(id: &str, direction: Direction, priority: Priority) -> VehicleSpec {
        VehicleSpec {
            id: id.to_string(),
            direction,
            intent: Intent::Straight,
            priority,
            speed_multiplier: 1.0,
            v2x_enabled: true,
            no_stop: false,
            queue_index: 0,
            spawn_offset_px: 0.0,
        }
    }

    #[test]
    fn non_v2x_vehicle_never_yields_through_the_agent() {
        let mut s = spec("A", Direction::N, Priority::Normal);
        s.v2x_enabled = false;
        let me = Vehicle::from_spec(&s);
        let mut agent = VehicleAgent::new(me.id.clone(), DecisionSource::Deterministic);
        let mut log = EventLog::new();
        assert!(!agent.decide(1, true, &[me], 0, &mut log));
    }

    #[test]
    fn cooperation_off_always_goes() {
        let me = Vehicle::from_spec(&spec("A", Direction::N, Priority::Normal));
        let mut agent = VehicleAgent::new(me.id.clone(), DecisionSource::Deterministic);
        let mut log = EventLog::new();
        assert!(!agent.decide(1, false, &[me], 0, &mut log));
    }

    #[test]
    fn waiting_without_clearance_yields() {
        let mut me = Vehicle::from_spec(&spec("A", Direction::N, Priority::Normal));
        me.state = VehicleState::Waiting;
        me.clearance = false;
        let mut agent = VehicleAgent::new(me.id.clone(), DecisionSource::Deterministic);
        let mut log = EventLog::new();
        assert!(agent.decide(1, true, &[me], 0, &mut log));
    }

    #[test]
    fn bounded_memory_never_exceeds_its_cap() {
        let me = Vehicle::from_spec(&spec("A", Direction::N, Priority::Normal));
        let mut agent = VehicleAgent::new(me.id.clone(), DecisionSource::Deterministic);
        let mut log = EventLog::new();
        for tick in 0..(AGENT_MEMORY_MIN as u64 + 25) {
            agent.decide(tick, true, &[me.clone()], 0, &mut log);
        }
        assert_eq!(agent.memory().count(), AGENT_MEMORY_MIN);
    }

    #[test]
    fn yields_to_emergency_vehicle_in_conflict() {
        let me = Vehicle::from_spec(&spec("A", Direction::N, Priority::Normal));
        let amb = Vehicle::from_spec(&spec("AMB", Direction::V, Priority::Emergency));
        let (action, _) = deterministic_decision(&me, &[&amb]);
        assert_eq!(action, Action::Yield);
    }

    #[test]
    fn yields_to_vehicle_on_the_right_when_ttc_comparable() {
        let me = Vehicle::from_spec(&spec("A", Direction::N, Priority::Normal));
        let right = Vehicle::from_spec(&spec("B", Direction::V, Priority::Normal));
        let (action, _) = deterministic_decision(&me, &[&right]);
        assert_eq!(action, Action::Yield);
    }

    #[test]
    fn goes_when_no_conflicting_neighbor_is_in_range() {
        let me = Vehicle::from_spec(&spec("A", Direction::N, Priority::Normal));
        let (action, _) = deterministic_decision(&me, &[]);
        assert_eq!(action, Action::Go);
    }
}

/// For each conflicting neighbor within `2*TTC_BRAKE`, apply the ordered
/// evaluator rules; the first neighbor that forces a YIELD wins (a single
/// GO-or-YIELD outcome, not per-neighbor actions).
pub fn deterministic_decision(me: &Vehicle, neighbors: &[&Vehicle]) -> (Action, String) {
    let my_ttc = tta(me);
    for &o in neighbors {
        let o_ttc = tta(o);
        if o_ttc >= 2.0 * TTC_BRAKE_SECS {
            continue;
        }
        if o.priority == Priority::Emergency && me.priority != Priority::Emergency {
            return (Action::Yield, format!("yielding to emergency vehicle {}", o.id));
        }
        if me.priority == Priority::Emergency {
            return (Action::Go, "emergency vehicle has absolute priority".into());
        }
        if o.no_stop && o_ttc < my_ttc {
            return (
                Action::Yield,
                format!("yielding to no-stop vehicle {} on speed override", o.id),
            );
        }
        if o.direction == me.direction.right_hand_neighbor() {
            return (Action::Yield, format!("yielding to {} on the right", o.id));
        }
        if o_ttc < my_ttc - 0.5 {
            return (
                Action::Yield,
                format!("yielding to {} arriving {:.1}s sooner", o.id, my_ttc - o_ttc),
            );
        }
    }
    (Action::Go, "no conflicting neighbor takes priority".into())
}
