//! Four-phase signal controller with emergency preemption (C4).
//!
//! Grounded in the corpus's `control_system::traffic_light_controller`
//! (phase-cycle-with-override structure) and
//! `original_source/services/infrastructure.py` (emergency/approaching
//! detection ranges), adapted from per-lane phases to the fixed A/B-axis
//! cycle normative in SPEC_FULL.md §4.4.

use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::geometry::{intersection_center, Axis, Direction};
use crate::vehicle::{Priority, Vehicle};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LightColor {
    Green,
    Yellow,
    Red,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    AGreen,
    AYellow,
    BGreen,
    BYellow,
}

impl Phase {
    fn duration(self) -> u64 {
        match self {
            Phase::AGreen => PHASE_A_GREEN_TICKS,
            Phase::AYellow => PHASE_A_YELLOW_TICKS,
            Phase::BGreen => PHASE_B_GREEN_TICKS,
            Phase::BYellow => PHASE_B_YELLOW_TICKS,
        }
    }

    fn next(self) -> Phase {
        match self {
            Phase::AGreen => Phase::AYellow,
            Phase::AYellow => Phase::BGreen,
            Phase::BGreen => Phase::BYellow,
            Phase::BYellow => Phase::AGreen,
        }
    }

    fn color_for(self, axis: Axis) -> LightColor {
        match (self, axis) {
            (Phase::AGreen, Axis::A) => LightColor::Green,
            (Phase::AYellow, Axis::A) => LightColor::Yellow,
            (Phase::BGreen, Axis::B) => LightColor::Green,
            (Phase::BYellow, Axis::B) => LightColor::Yellow,
            _ => LightColor::Red,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApproachingEntry {
    pub id: String,
    pub distance: f64,
}

/// `INFRA` bus record: the signal controller's sole published output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InfraRecord {
    pub lights: std::collections::HashMap<Direction, LightColor>,
    pub aggregate_light: LightColor,
    pub emergency: bool,
    pub emergency_vehicle: Option<String>,
    pub approaching: Vec<ApproachingEntry>,
    pub risk_alert: bool,
}

pub struct SignalController {
    phase: Phase,
    elapsed_in_phase: u64,
    emergency_override: Option<Direction>,
}

impl SignalController {
    pub fn new() -> Self {
        SignalController {
            phase: Phase::AGreen,
            elapsed_in_phase: 0,
            emergency_override: None,
        }
    }

    pub fn reset(&mut self) {
        self.phase = Phase::AGreen;
        self.elapsed_in_phase = 0;
        self.emergency_override = None;
    }

    /// Advances the phase cycle (unless under emergency override) and
    /// composes the `INFRA` record for this tick.
    pub fn tick(&mut self, vehicles: &[Vehicle]) -> InfraRecord {
        let emergency_vehicle = vehicles.iter().find(|v| {
            v.priority == Priority::Emergency
                && v.is_live()
                && v.distance_to_center() <= EMERGENCY_RANGE
        });

        if let Some(amb) = emergency_vehicle {
            self.emergency_override = Some(amb.direction);
        } else if self.emergency_override.is_some() {
            self.emergency_override = None;
        }

        if self.emergency_override.is_none() {
            self.elapsed_in_phase += 1;
            if self.elapsed_in_phase >= self.phase.duration() {
                self.elapsed_in_phase = 0;
                self.phase = self.phase.next();
            }
        }

        let mut lights = std::collections::HashMap::new();
        for dir in Direction::ALL {
            let color = match self.emergency_override {
                Some(green_dir) => {
                    if dir == green_dir {
                        LightColor::Green
                    } else {
                        LightColor::Red
                    }
                }
                None => self.phase.color_for(dir.axis()),
            };
            lights.insert(dir, color);
        }

        let aggregate_light = if lights.values().any(|c| *c == LightColor::Green) {
            LightColor::Green
        } else if lights.values().any(|c| *c == LightColor::Yellow) {
            LightColor::Yellow
        } else {
            LightColor::Red
        };

        let center = intersection_center();
        let approaching: Vec<ApproachingEntry> = vehicles
            .iter()
            .filter(|v| v.is_live())
            .filter_map(|v| {
                let d = v.distance_to_center();
                if d > APPROACHING_RANGE {
                    return None;
                }
                let moving_toward = v.position.sub(center).dot(v.velocity) < 0.0;
                moving_toward.then_some(ApproachingEntry {
                    id: v.id.clone(),
                    distance: d,
                })
            })
            .collect();
        let risk_alert = approaching.len() >= RISK_ALERT_APPROACHING_COUNT;

        InfraRecord {
            lights,
            aggregate_light,
            emergency: emergency_vehicle.is_some(),
            emergency_vehicle: emergency_vehicle.map(|v| v.id.clone()),
            approaching,
            risk_alert,
        }
    }

    pub fn is_green(&self, direction: Direction) -> bool {
        match self.emergency_override {
            Some(green_dir) => direction == green_dir,
            None => self.phase.color_for(direction.axis()) == LightColor::Green,
        }
    }
}

impl Default for SignalController {
    fn default() -> Self {
        SignalController::new()
    }
}
