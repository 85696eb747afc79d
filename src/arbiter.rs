//! Central right-of-way arbiter (C5).
//!
//! Grounded in `original_source/services/central_system.py` (`RIGHT_OF`
//! rotation, `_pick_winner`, `grant_manual_clearance`) with the
//! time-to-arrival override and path-conflict rules normative per
//! SPEC_FULL.md §4.5.

use crate::constants::TTA_DELTA_SECS;
use crate::error::{EngineError, EngineResult};
use crate::event_log::{ActionTag, EventLog};
use crate::geometry::intersection_center;
use crate::signal::{InfraRecord, LightColor};
use crate::vehicle::{Intent, Priority, Vehicle, VehicleState};

/// Two vehicles' paths conflict unless they share an approach (queued), or
/// they are opposite-direction straight travelers on the same road.
pub fn conflict(a: &Vehicle, b: &Vehicle) -> bool {
    if a.direction == b.direction {
        return false;
    }
    if a.direction == b.direction.opposite() && a.intent == Intent::Straight && b.intent == Intent::Straight {
        return false;
    }
    true
}

/// Time-to-arrival at the intersection center, using *base* (undisturbed)
/// velocity. Infinite if the vehicle is moving away from the center. Shared
/// with the agent's deterministic evaluator (SPEC_FULL.md glossary: TTA/TTC
/// are the same underlying quantity, named differently by caller).
pub fn tta(v: &Vehicle) -> f64 {
    let center = intersection_center();
    let to_center = center.sub(v.position);
    let base_velocity = v.direction.travel_unit().scale(v.base_speed);
    if to_center.dot(base_velocity) <= 0.0 {
        return f64::INFINITY;
    }
    if v.base_speed <= 0.0 {
        return f64::INFINITY;
    }
    v.distance_to_center() / (v.base_speed * crate::constants::TICK_RATE_HZ)
}

pub struct Arbiter;

impl Arbiter {
    pub fn new() -> Self {
        Arbiter
    }

    pub fn reset(&mut self) {}

    /// Runs one arbiter pass; mutates `clearance` on the passed vehicles.
    pub fn tick(
        &mut self,
        vehicles: &mut [Vehicle],
        infra: &InfraRecord,
        has_signal: bool,
        log: &mut EventLog,
    ) {
        if self.handle_emergency(vehicles, log) {
            return;
        }
        if has_signal {
            self.tick_with_signal(vehicles, infra, log);
        } else {
            self.tick_without_signal(vehicles, log);
        }
    }

    fn handle_emergency(&self, vehicles: &mut [Vehicle], log: &mut EventLog) -> bool {
        let has_emergency = vehicles
            .iter()
            .any(|v| v.priority == Priority::Emergency && v.is_live());
        if !has_emergency {
            return false;
        }
        for v in vehicles.iter_mut().filter(|v| v.v2x_capable && v.is_live()) {
            if v.priority == Priority::Emergency {
                if !v.clearance {
                    log.log_decision(&v.id, ActionTag::Clearance, None, "emergency priority");
                }
                v.clearance = true;
            } else {
                v.clearance = false;
            }
        }
        true
    }

    fn tick_without_signal(&self, vehicles: &mut [Vehicle], log: &mut EventLog) {
        let ttas: Vec<f64> = vehicles.iter().map(tta).collect();

        let mut yielder = vec![false; vehicles.len()];
        let mut override_events: Vec<(usize, usize)> = Vec::new();

        // A vehicle still approaching (not yet past the stop line) is a
        // candidate subordinate even before it reaches `Waiting` — a
        // `no_stop` vehicle never waits at all, but it still owes the
        // right-of-way check to whichever conflicting vehicle is on its
        // right, and its speed can still earn it a TTA override over that
        // vehicle. Only `Waiting` vehicles have their `clearance` mutated by
        // this pass (see below); the broadened set here only widens which
        // vehicles can be logged as the overriding or overridden party.
        let is_subordinate_candidate =
            |v: &Vehicle| v.v2x_capable && matches!(v.state, VehicleState::Waiting | VehicleState::Moving | VehicleState::Braking);

        for i in 0..vehicles.len() {
            let v = &vehicles[i];
            if !is_subordinate_candidate(v) {
                continue;
            }
            for j in 0..vehicles.len() {
                if i == j {
                    continue;
                }
                let o = &vehicles[j];
                if !o.is_live() || !conflict(v, o) {
                    continue;
                }
                if o.direction != v.direction.right_hand_neighbor() {
                    continue;
                }
                let diff = ttas[i] - ttas[j];
                if diff >= -TTA_DELTA_SECS {
                    yielder[i] = true;
                } else {
                    // `i` overrides `j` on speed: `j` legally held the right
                    // of way (it was on `i`'s right) but now yields to it, so
                    // `j` is excluded from the ordinary grant pass below just
                    // as if it had lost the right-hand-rule check outright.
                    override_events.push((i, j));
                    yielder[j] = true;
                }
            }
        }

        for (i, j) in &override_events {
            let v_id = vehicles[*i].id.clone();
            let o_id = vehicles[*j].id.clone();
            log.log_decision(
                &v_id,
                ActionTag::ClearanceSpeed,
                Some(ttas[*i]),
                &format!("legal right-of-way of {o_id} overridden by speed"),
            );
            log.log_decision(
                &o_id,
                ActionTag::YieldSpeedOverride,
                Some(ttas[*j]),
                &format!("yielded to {v_id} on speed override"),
            );
            // The arbiter grants clearance to the overriding vehicle
            // regardless of its current state; for a `no_stop` vehicle this
            // is a no-op on its motion (it never consults `clearance`) but
            // keeps the published record honest about who was granted
            // right-of-way this tick.
            if vehicles[*i].v2x_capable {
                vehicles[*i].clearance = true;
            }
        }

        let mut order: Vec<usize> = (0..vehicles.len())
            .filter(|&i| vehicles[i].v2x_capable && vehicles[i].state == VehicleState::Waiting && !yielder[i])
            .collect();
        order.sort_by(|&a, &b| ttas[a].partial_cmp(&ttas[b]).unwrap_or(std::cmp::Ordering::Equal));

        for i in 0..vehicles.len() {
            if vehicles[i].v2x_capable && vehicles[i].state == VehicleState::Waiting && yielder[i] {
                vehicles[i].clearance = false;
            }
        }

        let mut granted: Vec<usize> = Vec::new();
        for &i in &order {
            let conflicts_granted = granted.iter().any(|&g| conflict(&vehicles[i], &vehicles[g]));
            let conflicts_crossing = vehicles.iter().any(|o| {
                o.id != vehicles[i].id
                    && o.state == VehicleState::Crossing
                    && o.in_intersection_box()
                    && conflict(&vehicles[i], o)
            });
            if !conflicts_granted && !conflicts_crossing {
                vehicles[i].clearance = true;
                granted.push(i);
            }
        }
    }

    fn tick_with_signal(&self, vehicles: &mut [Vehicle], infra: &InfraRecord, log: &mut EventLog) {
        for v in vehicles.iter_mut() {
            if !(v.v2x_capable && v.state == VehicleState::Waiting) || !v.clearance {
                continue;
            }
            match infra.lights.get(&v.direction).copied().unwrap_or(LightColor::Red) {
                LightColor::Red => {
                    v.clearance = false;
                    log.log_decision(&v.id, ActionTag::Stop, None, "red light");
                }
                LightColor::Yellow => {
                    v.clearance = false;
                    log.log_decision(&v.id, ActionTag::Hold, None, "yellow light");
                }
                LightColor::Green => {}
            }
        }

        let mut eligible: Vec<usize> = (0..vehicles.len())
            .filter(|&i| {
                vehicles[i].v2x_capable
                    && vehicles[i].state == VehicleState::Waiting
                    && infra
                        .lights
                        .get(&vehicles[i].direction)
                        .copied()
                        .unwrap_or(LightColor::Red)
                        == LightColor::Green
            })
            .collect();
        eligible.sort_by(|&a, &b| vehicles[a].id.cmp(&vehicles[b].id));

        let Some(winner) = pick_winner(vehicles, &eligible) else {
            return;
        };

        vehicles[winner].clearance = true;
        let mut granted = vec![winner];
        for &i in &eligible {
            if i == winner {
                continue;
            }
            let conflicts_granted = granted.iter().any(|&g| conflict(&vehicles[i], &vehicles[g]));
            let conflicts_crossing = vehicles.iter().any(|o| {
                o.id != vehicles[i].id
                    && o.state == VehicleState::Crossing
                    && o.in_intersection_box()
                    && conflict(&vehicles[i], o)
            });
            if !conflicts_granted && !conflicts_crossing {
                vehicles[i].clearance = true;
                granted.push(i);
            }
        }
    }

    /// External manual-grant control operation (SPEC_FULL.md §4.5, §6).
    pub fn grant_manual(
        &self,
        vehicles: &mut [Vehicle],
        vehicle_id: &str,
        log: &mut EventLog,
    ) -> EngineResult<()> {
        let v = vehicles
            .iter_mut()
            .find(|v| v.id == vehicle_id)
            .ok_or_else(|| EngineError::UnknownVehicle(vehicle_id.to_string()))?;
        if v.state != VehicleState::Waiting {
            return Err(EngineError::InvalidSpec(format!(
                "vehicle {vehicle_id} is not waiting"
            )));
        }
        v.clearance = true;
        log.log_decision(vehicle_id, ActionTag::Clearance, None, "manual");
        Ok(())
    }
}

impl Default for Arbiter {
    fn default() -> Self {
        Arbiter::new()
    }
}


/// A vehicle with no right-hand conflicting eligible neighbor wins; a
/// left-turning vehicle yields to any conflicting non-left eligible vehicle.
fn pick_winner(vehicles: &[Vehicle], eligible: &[usize]) -> Option<usize> {
    for &i in eligible {
        let v = &vehicles[i];
        let mut blocked = false;
        for &j in eligible.iter().filter(|&&j| j != i && conflict(v, &vehicles[j])) {
            let o = &vehicles[j];
            if v.intent == Intent::Left && o.intent != Intent::Left {
                blocked = true;
                break;
            }
            if o.direction == v.direction.right_hand_neighbor() {
                blocked = true;
                break;
            }
        }
        if !blocked {
            return Some(i);
        }
    }
    eligible.first().copied()
}
