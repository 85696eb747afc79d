//! Scheduler / engine (C8): the fixed-tick loop and the external-facing
//! facade (SPEC_FULL.md §4.8, §6).
//!
//! Grounded in `original_source/simulation/engine.py`'s `SimulationEngine`
//! (scenario lifecycle, `_tick` step ordering, cached `_last_state`) and
//! `original_source/api/server.py` (the facade method names the outer
//! request/stream layer expects). The tick body itself composes C1–C7,
//! which each own their slice of the ordering contract.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::advisor::AdvisorClient;
use crate::agent::{DecisionSource, MemoryEntry, VehicleAgent};
use crate::arbiter::Arbiter;
use crate::bus::{BusRecord, StateBus, INFRA_KEY};
use crate::config::Config;
use crate::constants::*;
use crate::error::{EngineError, EngineResult};
use crate::event_log::{EventLog, EventRecord};
use crate::geometry::Direction;
use crate::kinematics::desired_speed_factor;
use crate::scenarios::{self, CUSTOM_SCENARIO, DEFAULT_SCENARIO};
use crate::signal::{ApproachingEntry, InfraRecord, LightColor, SignalController};
use crate::vehicle::{Priority, Vehicle, VehicleSpec, VehicleState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Serialize)]
pub struct RiskZone {
    pub x: f64,
    pub y: f64,
    pub radius: f64,
    pub level: RiskLevel,
    pub vehicles: [String; 2],
    pub ttc: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RiskView {
    pub risk: bool,
    pub ttc: f64,
    pub action: &'static str,
    pub pair: Option<[String; 2]>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SemaphoreView {
    pub light: LightColor,
    pub lights: HashMap<Direction, LightColor>,
    pub emergency: bool,
    pub emergency_vehicle: Option<String>,
    pub approaching: Vec<ApproachingEntry>,
    pub has_semaphore: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CollisionRecord {
    pub vehicles: [String; 2],
    pub tick: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub tick: u64,
    pub timestamp: f64,
    pub cooperation: bool,
    pub scenario: String,
    pub paused: bool,
    pub has_signal: bool,
    pub vehicles: Vec<crate::vehicle::VehiclePublicRecord>,
    pub semaphore: SemaphoreView,
    pub risk: RiskView,
    pub risk_zones: Vec<RiskZone>,
    pub collisions: Vec<CollisionRecord>,
    pub event_log: Vec<EventRecord>,
    pub agents_memory: HashMap<String, Vec<MemoryEntry>>,
    pub custom_scenario: Vec<VehicleSpec>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GrantResult {
    pub ok: bool,
    pub vehicle_id: Option<String>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResetOutcome {
    pub scenario: String,
}

fn now_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

pub struct Engine {
    config: Config,
    scenario_name: String,
    vehicles: Vec<Vehicle>,
    agents: Vec<VehicleAgent>,
    signal: SignalController,
    arbiter: Arbiter,
    bus: StateBus,
    event_log: EventLog,
    tick: u64,
    cooperation: bool,
    paused: bool,
    has_signal: bool,
    custom_builder: Vec<VehicleSpec>,
    custom_has_signal: bool,
    crash_timers: HashMap<String, u64>,
    collision_records: Vec<CollisionRecord>,
    active_collisions: Vec<(String, String)>,
    last_snapshot: Snapshot,
    advisor: Option<Arc<AdvisorClient>>,
    _advisor_runtime: Option<tokio::runtime::Runtime>,
}

impl Engine {
    pub fn new(config: Config) -> Self {
        let advisor = if config.advisor_enabled {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .worker_threads(config.advisor_worker_pool_size)
                .enable_all()
                .build()
                .expect("failed to start advisor runtime");
            let client = AdvisorClient::new(&config, runtime.handle().clone());
            (Some(client), Some(runtime))
        } else {
            (None, None)
        };

        let event_log = match config.durable_log_path.clone() {
            Some(path) => EventLog::new().with_durable_mirror(path),
            None => EventLog::new(),
        };

        let mut engine = Engine {
            scenario_name: DEFAULT_SCENARIO.to_string(),
            vehicles: Vec::new(),
            agents: Vec::new(),
            signal: SignalController::new(),
            arbiter: Arbiter::new(),
            bus: StateBus::new(),
            event_log,
            tick: 0,
            cooperation: true,
            paused: false,
            has_signal: true,
            custom_builder: Vec::new(),
            custom_has_signal: true,
            crash_timers: HashMap::new(),
            collision_records: Vec::new(),
            active_collisions: Vec::new(),
            last_snapshot: empty_snapshot(DEFAULT_SCENARIO, true),
            advisor: advisor.0,
            _advisor_runtime: advisor.1,
            config,
        };
        engine.load_scenario(DEFAULT_SCENARIO).expect("default scenario must exist");
        engine
    }

    // ---- scenario lifecycle ------------------------------------------

    fn decision_source(&self) -> DecisionSource {
        match &self.advisor {
            Some(client) => DecisionSource::Advisor(Arc::clone(client)),
            None => DecisionSource::Deterministic,
        }
    }

    fn load_scenario(&mut self, name: &str) -> EngineResult<()> {
        let (specs, has_signal) = if name == CUSTOM_SCENARIO {
            (self.custom_builder.clone(), self.custom_has_signal)
        } else {
            let catalog = scenarios::catalog();
            let def = catalog
                .get(name)
                .ok_or_else(|| EngineError::UnknownScenario(name.to_string()))?;
            (def.vehicles.clone(), def.has_signal)
        };

        for spec in &specs {
            spec.validate()?;
        }

        self.bus.clear();
        self.event_log.clear();
        self.arbiter.reset();
        self.signal.reset();
        self.crash_timers.clear();
        self.collision_records.clear();
        self.active_collisions.clear();
        self.tick = 0;
        self.has_signal = has_signal;
        self.scenario_name = name.to_string();

        self.vehicles = specs.iter().map(Vehicle::from_spec).collect();
        self.agents = self
            .vehicles
            .iter()
            .map(|v| VehicleAgent::new(v.id.clone(), self.decision_source()))
            .collect();

        for v in &self.vehicles {
            self.bus
                .publish(v.id.clone(), BusRecord::Vehicle(v.to_public_record(now_secs())));
        }
        self.event_log
            .log_info(&format!("scenario loaded: {name} (cooperation={})", self.cooperation));

        self.last_snapshot = self.compose_snapshot();
        Ok(())
    }

    pub fn reset(&mut self, scenario_name: Option<&str>) -> EngineResult<ResetOutcome> {
        let target = scenario_name.unwrap_or(&self.scenario_name).to_string();
        self.load_scenario(&target)?;
        Ok(ResetOutcome { scenario: target })
    }

    pub fn scenarios(&self) -> (Vec<String>, String) {
        let mut names: Vec<String> = scenarios::BUILTIN_NAMES.iter().map(|s| s.to_string()).collect();
        names.push(CUSTOM_SCENARIO.to_string());
        (names, self.scenario_name.clone())
    }

    pub fn toggle_cooperation(&mut self) -> bool {
        self.cooperation = !self.cooperation;
        if !self.cooperation {
            for v in &mut self.vehicles {
                v.clearance = false;
            }
        }
        self.event_log.log_info(&format!(
            "cooperation {}",
            if self.cooperation { "enabled" } else { "disabled" }
        ));
        self.cooperation
    }

    pub fn start(&mut self) {
        self.paused = false;
    }

    pub fn stop(&mut self) {
        self.paused = true;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn grant_clearance(&mut self, vehicle_id: &str) -> GrantResult {
        match self.arbiter.grant_manual(&mut self.vehicles, vehicle_id, &mut self.event_log) {
            Ok(()) => GrantResult {
                ok: true,
                vehicle_id: Some(vehicle_id.to_string()),
                reason: None,
            },
            Err(e) => GrantResult {
                ok: false,
                vehicle_id: None,
                reason: Some(e.reason()),
            },
        }
    }

    // ---- custom scenario builder ---------------------------------------

    pub fn get_custom(&self) -> Vec<VehicleSpec> {
        self.custom_builder.clone()
    }

    pub fn add_vehicle(&mut self, spec: VehicleSpec) -> EngineResult<()> {
        spec.validate()?;
        if self.custom_builder.iter().any(|v| v.id == spec.id) {
            return Err(EngineError::DuplicateVehicleId(spec.id));
        }
        self.custom_builder.push(spec);
        if self.scenario_name == CUSTOM_SCENARIO {
            self.load_scenario(CUSTOM_SCENARIO)?;
        }
        Ok(())
    }

    pub fn remove_vehicle(&mut self, id: &str) -> EngineResult<()> {
        let before = self.custom_builder.len();
        self.custom_builder.retain(|v| v.id != id);
        if self.custom_builder.len() == before {
            return Err(EngineError::UnknownVehicle(id.to_string()));
        }
        if self.scenario_name == CUSTOM_SCENARIO {
            self.load_scenario(CUSTOM_SCENARIO)?;
        }
        Ok(())
    }

    pub fn update_vehicle(&mut self, id: &str, patch: VehiclePatch) -> EngineResult<()> {
        let spec = self
            .custom_builder
            .iter_mut()
            .find(|v| v.id == id)
            .ok_or_else(|| EngineError::UnknownVehicle(id.to_string()))?;
        patch.apply(spec);
        spec.validate()?;
        if self.scenario_name == CUSTOM_SCENARIO {
            self.load_scenario(CUSTOM_SCENARIO)?;
        }
        Ok(())
    }

    pub fn clear_custom(&mut self) -> EngineResult<()> {
        self.custom_builder.clear();
        if self.scenario_name == CUSTOM_SCENARIO {
            self.load_scenario(CUSTOM_SCENARIO)?;
        }
        Ok(())
    }

    pub fn set_custom_signal(&mut self, has_signal: bool) -> EngineResult<()> {
        self.custom_has_signal = has_signal;
        if self.scenario_name == CUSTOM_SCENARIO {
            self.load_scenario(CUSTOM_SCENARIO)?;
        }
        Ok(())
    }

    // ---- tick loop -------------------------------------------------------

    /// Runs one tick. Never panics outward: a programmer error inside the
    /// tick body is caught, logged, and the engine keeps its last good
    /// snapshot (SPEC_FULL.md §7.1).
    pub fn tick(&mut self) {
        if self.paused {
            return;
        }
        let result = panic::catch_unwind(AssertUnwindSafe(|| self.tick_body()));
        if result.is_err() {
            log::error!("tick {} aborted on programmer error, skipping", self.tick + 1);
        }
    }

    fn tick_body(&mut self) {
        self.tick += 1;
        let tick = self.tick;
        let cooperation = self.cooperation;

        if self.vehicles.iter().all(|v| v.state == VehicleState::Done) && !self.vehicles.is_empty() {
            let name = self.scenario_name.clone();
            if let Err(e) = self.load_scenario(&name) {
                log::error!("failed to respawn scenario {name}: {e}");
            }
            return;
        }

        // 4. Signal controller.
        let infra = self.signal.tick(&self.vehicles);
        self.bus.publish(INFRA_KEY, BusRecord::Infra(infra.clone()));

        // 5. Publish fresh vehicle records before decisions.
        for v in &self.vehicles {
            self.bus
                .publish(v.id.clone(), BusRecord::Vehicle(v.to_public_record(now_secs())));
        }

        // 6. Arbiter.
        if cooperation {
            self.arbiter
                .tick(&mut self.vehicles, &infra, self.has_signal, &mut self.event_log);
        }

        // Non-V2X self-grant from the signal, independent of the arbiter.
        for v in &mut self.vehicles {
            if v.is_active(tick) {
                let green = infra
                    .lights
                    .get(&v.direction)
                    .copied()
                    .unwrap_or(LightColor::Red)
                    == LightColor::Green;
                v.self_grant_from_signal(green);
            }
        }

        // 7. Agents decide; terminal/negotiated states force yield=false.
        let mut yield_flags = vec![false; self.vehicles.len()];
        {
            let agents = &mut self.agents;
            let vehicles = &self.vehicles;
            let event_log = &mut self.event_log;
            for (i, flag) in yield_flags.iter_mut().enumerate() {
                if !vehicles[i].is_active(tick) {
                    continue;
                }
                let forced_false = matches!(
                    vehicles[i].state,
                    VehicleState::Waiting | VehicleState::Crossing | VehicleState::Crashed | VehicleState::Done
                );
                *flag = if forced_false {
                    false
                } else {
                    agents[i].decide(tick, cooperation, vehicles, i, event_log)
                };
            }
        }
        for (v, flag) in self.vehicles.iter_mut().zip(yield_flags) {
            v.agent_yield = flag;
        }

        // 8. Integrate motion and run the state machine, against a
        // pre-integration snapshot so every vehicle sees the same
        // neighbor positions this tick.
        let snapshot_vehicles = self.vehicles.clone();
        for v in &mut self.vehicles {
            if !v.is_active(tick) {
                continue;
            }
            let factor = desired_speed_factor(v, &snapshot_vehicles, Some(&infra));
            v.integrate(factor);
        }

        // 9. Publish updated records.
        for v in &self.vehicles {
            self.bus
                .publish(v.id.clone(), BusRecord::Vehicle(v.to_public_record(now_secs())));
        }

        // 10. Collision detection.
        self.detect_collisions();

        // 11. Advance crash timers.
        for v in &mut self.vehicles {
            if v.state == VehicleState::Crashed {
                if let Some(&crash_tick) = self.crash_timers.get(&v.id) {
                    if self.tick.saturating_sub(crash_tick) >= CRASH_TIMEOUT_TICKS {
                        v.state = VehicleState::Done;
                    }
                }
            }
        }

        // 12. GC active-collision list entries whose vehicles are both done.
        let vehicles = &self.vehicles;
        self.active_collisions.retain(|(a, b)| {
            let a_done = vehicles.iter().find(|v| &v.id == a).map(|v| v.state == VehicleState::Done).unwrap_or(true);
            let b_done = vehicles.iter().find(|v| &v.id == b).map(|v| v.state == VehicleState::Done).unwrap_or(true);
            !(a_done && b_done)
        });

        // 13. Compose snapshot.
        self.last_snapshot = self.compose_snapshot();
    }

    fn detect_collisions(&mut self) {
        let n = self.vehicles.len();
        for i in 0..n {
            if !self.vehicles[i].is_live() || !self.vehicles[i].is_active(self.tick) {
                continue;
            }
            for j in (i + 1)..n {
                if !self.vehicles[j].is_live() || !self.vehicles[j].is_active(self.tick) {
                    continue;
                }
                let dist = self.vehicles[i].position.distance_to(self.vehicles[j].position);
                if dist >= COLLISION_DIST {
                    continue;
                }
                let (id_a, id_b) = (self.vehicles[i].id.clone(), self.vehicles[j].id.clone());
                let already_active = self
                    .active_collisions
                    .iter()
                    .any(|(a, b)| (a == &id_a && b == &id_b) || (a == &id_b && b == &id_a));

                self.vehicles[i].state = VehicleState::Crashed;
                self.vehicles[i].velocity = crate::geometry::Vec2::ZERO;
                self.vehicles[j].state = VehicleState::Crashed;
                self.vehicles[j].velocity = crate::geometry::Vec2::ZERO;
                self.crash_timers.entry(id_a.clone()).or_insert(self.tick);
                self.crash_timers.entry(id_b.clone()).or_insert(self.tick);

                if !already_active {
                    self.active_collisions.push((id_a.clone(), id_b.clone()));
                    self.collision_records.push(CollisionRecord {
                        vehicles: [id_a.clone(), id_b.clone()],
                        tick: self.tick,
                    });
                    self.event_log.log_collision(&id_a, &id_b);
                }
            }
        }
    }

    // ---- snapshot composition --------------------------------------------

    fn compose_snapshot(&self) -> Snapshot {
        let infra = self.bus.infra().cloned().unwrap_or_else(default_infra);

        let light = infra.aggregate_light;
        let semaphore = SemaphoreView {
            light,
            lights: infra.lights.clone(),
            emergency: infra.emergency,
            emergency_vehicle: infra.emergency_vehicle.clone(),
            approaching: infra.approaching.clone(),
            has_semaphore: self.has_signal,
        };

        let (risk, risk_zones) = self.assess_risk();

        let vehicles: Vec<_> = self
            .vehicles
            .iter()
            .filter(|v| v.state != VehicleState::Done)
            .map(|v| v.to_public_record(now_secs()))
            .collect();

        let agents_memory = self
            .agents
            .iter()
            .map(|a| (a.vehicle_id.clone(), a.memory().cloned().collect()))
            .collect();

        Snapshot {
            tick: self.tick,
            timestamp: now_secs(),
            cooperation: self.cooperation,
            scenario: self.scenario_name.clone(),
            paused: self.paused,
            has_signal: self.has_signal,
            vehicles,
            semaphore,
            risk,
            risk_zones,
            collisions: self.collision_records.clone(),
            event_log: self.event_log.get_recent(SNAPSHOT_EVENT_LOG_MIN),
            agents_memory,
            custom_scenario: self.custom_builder.clone(),
        }
    }

    /// Per-pair TTC risk assessment (grounded in
    /// `original_source/services/collision.py::assess_risk`): any pair both
    /// under the brake threshold is "at risk"; the worst (minimum-TTC) pair
    /// is surfaced, and every assessed pair yields a risk zone at their
    /// midpoint for the snapshot's `risk_zones` view (SPEC_FULL.md §9 open
    /// question, resolved).
    fn assess_risk(&self) -> (RiskView, Vec<RiskZone>) {
        let live: Vec<&Vehicle> = self.vehicles.iter().filter(|v| v.is_live()).collect();
        let mut worst: Option<(f64, &Vehicle, &Vehicle, &'static str)> = None;
        let mut zones = Vec::new();

        for i in 0..live.len() {
            for j in (i + 1)..live.len() {
                let (a, b) = (live[i], live[j]);
                let ta = instantaneous_ttc(a);
                let tb = instantaneous_ttc(b);
                if ta >= TTC_BRAKE_SECS || tb >= TTC_BRAKE_SECS {
                    continue;
                }
                let min_ttc = ta.min(tb);
                let action = if a.priority == Priority::Emergency || b.priority == Priority::Emergency {
                    "yield"
                } else if min_ttc < TTC_YIELD_SECS {
                    "yield"
                } else {
                    "brake"
                };
                let level = if min_ttc < TTC_YIELD_SECS {
                    RiskLevel::High
                } else if min_ttc < TTC_BRAKE_SECS * 0.66 {
                    RiskLevel::Medium
                } else {
                    RiskLevel::Low
                };
                let mid = a.position.add(b.position).scale(0.5);
                zones.push(RiskZone {
                    x: mid.x,
                    y: mid.y,
                    radius: 40.0,
                    level,
                    vehicles: [a.id.clone(), b.id.clone()],
                    ttc: min_ttc,
                });
                if worst.map(|(best, ..)| min_ttc < best).unwrap_or(true) {
                    worst = Some((min_ttc, a, b, action));
                }
            }
        }

        let risk = match worst {
            Some((ttc, a, b, action)) => RiskView {
                risk: true,
                ttc,
                action,
                pair: Some([a.id.clone(), b.id.clone()]),
            },
            None => RiskView {
                risk: false,
                ttc: 999.0,
                action: "go",
                pair: None,
            },
        };
        (risk, zones)
    }

    pub fn snapshot(&self) -> Snapshot {
        self.last_snapshot.clone()
    }
}

/// Instantaneous time-to-center using *actual* velocity (unlike
/// [`crate::arbiter::tta`], which uses base velocity for stability under
/// braking). Mirrors `collision.py::time_to_intersection`.
fn instantaneous_ttc(v: &Vehicle) -> f64 {
    let speed = v.velocity.length();
    if speed <= 0.0 {
        return 999.0;
    }
    v.distance_to_center() / (speed * TICK_RATE_HZ)
}

fn default_infra() -> InfraRecord {
    InfraRecord {
        lights: Direction::ALL.iter().map(|d| (*d, LightColor::Red)).collect(),
        aggregate_light: LightColor::Red,
        emergency: false,
        emergency_vehicle: None,
        approaching: Vec::new(),
        risk_alert: false,
    }
}

fn empty_snapshot(scenario: &str, has_signal: bool) -> Snapshot {
    Snapshot {
        tick: 0,
        timestamp: now_secs(),
        cooperation: true,
        scenario: scenario.to_string(),
        paused: false,
        has_signal,
        vehicles: Vec::new(),
        semaphore: SemaphoreView {
            light: LightColor::Red,
            lights: HashMap::new(),
            emergency: false,
            emergency_vehicle: None,
            approaching: Vec::new(),
            has_semaphore: has_signal,
        },
        risk: RiskView {
            risk: false,
            ttc: 999.0,
            action: "go",
            pair: None,
        },
        risk_zones: Vec::new(),
        collisions: Vec::new(),
        event_log: Vec::new(),
        agents_memory: HashMap::new(),
        custom_scenario: Vec::new(),
    }
}

/// Partial update for [`Engine::update_vehicle`]: every field optional,
/// `None` leaves the existing value untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VehiclePatch {
    pub intent: Option<crate::vehicle::Intent>,
    pub priority: Option<Priority>,
    pub speed_multiplier: Option<f64>,
    pub v2x_enabled: Option<bool>,
    pub no_stop: Option<bool>,
}

impl VehiclePatch {
    fn apply(&self, spec: &mut VehicleSpec) {
        if let Some(intent) = self.intent {
            spec.intent = intent;
        }
        if let Some(priority) = self.priority {
            spec.priority = priority;
        }
        if let Some(mult) = self.speed_multiplier {
            spec.speed_multiplier = mult;
        }
        if let Some(v2x) = self.v2x_enabled {
            spec.v2x_enabled = v2x;
        }
        if let Some(no_stop) = self.no_stop {
            spec.no_stop = no_stop;
        }
    }
}

// Re-exported so external callers inspecting `agents_memory` entries don't
// need to reach into `crate::agent` directly.
pub use crate::agent::Action as AgentAction;
