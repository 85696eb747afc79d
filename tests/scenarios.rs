//! Integration tests driving the full `Engine`/`tick()` loop through the
//! six named end-to-end scenarios in SPEC_FULL.md §8, asserting on the
//! documented observable `Snapshot` outcomes rather than on internal
//! component behavior (covered by the unit tests alongside each module).

use rts_v2x::config::Config;
use rts_v2x::engine::{Engine, Snapshot};
use rts_v2x::event_log::ActionTag;
use rts_v2x::geometry::Direction;
use rts_v2x::signal::LightColor;
use rts_v2x::vehicle::{VehiclePublicRecord, VehicleState};

fn vehicle<'a>(snapshot: &'a Snapshot, id: &str) -> Option<&'a VehiclePublicRecord> {
    snapshot.vehicles.iter().find(|v| v.id == id)
}

// Scenario 1: perpendicular, no signal, speed dominance. A (N, fast,
// no-stop) never enters `waiting`; B (V) does and yields on the TTA
// override; no physical collision occurs.
#[test]
fn speed_dominance_a_crosses_without_waiting_b_yields_on_speed() {
    let mut engine = Engine::new(Config::default());
    engine.reset(Some("speed_dominance")).unwrap();

    let mut a_waited = false;
    let mut b_waited = false;
    let mut saw_override_event = false;

    for _ in 0..300 {
        engine.tick();
        let snap = engine.snapshot();

        if vehicle(&snap, "A").map(|v| v.state == VehicleState::Waiting).unwrap_or(false) {
            a_waited = true;
        }
        if vehicle(&snap, "B").map(|v| v.state == VehicleState::Waiting).unwrap_or(false) {
            b_waited = true;
        }
        if snap.event_log.iter().any(|e| {
            (e.action == ActionTag::YieldSpeedOverride && e.actor == "B")
                || (e.action == ActionTag::ClearanceSpeed && e.actor == "A")
        }) {
            saw_override_event = true;
        }
        assert!(snap.collisions.is_empty(), "speed_dominance must not produce a collision");
    }

    assert!(!a_waited, "A (fast, no-stop) should never enter waiting");
    assert!(b_waited, "B should enter waiting while A holds right-of-way by speed");
    assert!(saw_override_event, "expected a CLEARANCE_SPEED or YIELD_SPEED_OVERRIDE event");
}

// Scenario 2: no-V2X collision. A (V2X, no-stop) and B (no V2X, no-stop)
// cannot negotiate and arrive together, producing a physical collision.
#[test]
fn no_v2x_collision_produces_a_collision_record_for_the_pair() {
    let mut engine = Engine::new(Config::default());
    engine.reset(Some("no_v2x_collision")).unwrap();

    let mut pair_recorded = false;
    let mut saw_crashed_state = false;

    for _ in 0..200 {
        engine.tick();
        let snap = engine.snapshot();
        if snap
            .collisions
            .iter()
            .any(|c| c.vehicles.contains(&"A".to_string()) && c.vehicles.contains(&"B".to_string()))
        {
            pair_recorded = true;
        }
        if vehicle(&snap, "A").map(|v| v.state == VehicleState::Crashed).unwrap_or(false)
            || vehicle(&snap, "B").map(|v| v.state == VehicleState::Crashed).unwrap_or(false)
        {
            saw_crashed_state = true;
        }
    }

    assert!(pair_recorded, "expected a collision record for pair (A, B)");
    assert!(saw_crashed_state, "expected A or B to pass through the crashed state");
}

// Scenario 3: emergency preemption. An ambulance from N forces a green
// light for its own approach only, and holds clearance while in range.
#[test]
fn emergency_preemption_forces_green_for_the_ambulance_approach() {
    let mut engine = Engine::new(Config::default());
    engine.reset(Some("emergency_preemption")).unwrap();

    let mut saw_emergency = false;

    for _ in 0..150 {
        engine.tick();
        let snap = engine.snapshot();
        if let Some(b) = vehicle(&snap, "B") {
            assert!(!b.clearance, "B must not hold clearance during emergency preemption");
        }
        if let Some(c) = vehicle(&snap, "C") {
            assert!(!c.clearance, "C must not hold clearance during emergency preemption");
        }
        if snap.semaphore.emergency {
            saw_emergency = true;
            assert_eq!(snap.semaphore.lights[&Direction::N], LightColor::Green);
            assert_eq!(snap.semaphore.lights[&Direction::V], LightColor::Red);
            assert_eq!(snap.semaphore.lights[&Direction::E], LightColor::Red);
            if let Some(amb) = vehicle(&snap, "AMB") {
                assert!(amb.clearance, "ambulance should hold clearance under preemption");
            }
            break;
        }
    }

    assert!(saw_emergency, "expected emergency preemption to engage within 150 ticks");
}

// Scenario 4: four-way straight with signal. During the A-green phase, A
// (N) and C (S) — parallel, non-conflicting — are granted clearance
// together while B (V) and D (E) wait.
#[test]
fn four_way_signal_admits_parallel_straight_travelers_together() {
    let mut engine = Engine::new(Config::default());
    engine.reset(Some("four_way_signal")).unwrap();

    let mut saw_a_and_c_together = false;

    for _ in 0..150 {
        engine.tick();
        let snap = engine.snapshot();
        let a_clear = vehicle(&snap, "A").map(|v| v.clearance).unwrap_or(false);
        let c_clear = vehicle(&snap, "C").map(|v| v.clearance).unwrap_or(false);
        if a_clear && c_clear {
            let b_clear = vehicle(&snap, "B").map(|v| v.clearance).unwrap_or(false);
            let d_clear = vehicle(&snap, "D").map(|v| v.clearance).unwrap_or(false);
            assert!(!b_clear, "B should not cross during the A-green phase");
            assert!(!d_clear, "D should not cross during the A-green phase");
            saw_a_and_c_together = true;
            break;
        }
    }

    assert!(saw_a_and_c_together, "expected A and C to be granted clearance simultaneously");
}

// Scenario 5: left-turn yield. A (N, left) and B (S, straight) reach the
// stop line near-simultaneously; A yields to B.
#[test]
fn left_turn_yields_to_straight_on_the_same_axis() {
    let mut engine = Engine::new(Config::default());
    engine.reset(Some("left_turn_yield")).unwrap();

    let mut saw_b_go_while_a_yields = false;

    for _ in 0..150 {
        engine.tick();
        let snap = engine.snapshot();
        let b_going = vehicle(&snap, "B")
            .map(|v| v.clearance || v.state == VehicleState::Crossing)
            .unwrap_or(false);
        let a_waiting_without_clearance = vehicle(&snap, "A")
            .map(|v| v.state == VehicleState::Waiting && !v.clearance)
            .unwrap_or(false);
        if b_going && a_waiting_without_clearance {
            saw_b_go_while_a_yields = true;
            break;
        }
    }

    assert!(
        saw_b_go_while_a_yields,
        "expected left-turning A to yield while straight-going B crosses"
    );
}

// Scenario 6: pause/resume determinism. Ticking 50, pausing for 10 (no
// advance), then resuming for 50 more yields the same snapshot as ticking
// straight through 100 times.
#[test]
fn pause_then_resume_matches_ticking_straight_through() {
    let mut paused_run = Engine::new(Config::default());
    paused_run.reset(Some("multi")).unwrap();
    for _ in 0..50 {
        paused_run.tick();
    }
    paused_run.stop();
    for _ in 0..10 {
        paused_run.tick();
    }
    paused_run.start();
    for _ in 0..50 {
        paused_run.tick();
    }
    let paused_snapshot = paused_run.snapshot();

    let mut straight_run = Engine::new(Config::default());
    straight_run.reset(Some("multi")).unwrap();
    for _ in 0..100 {
        straight_run.tick();
    }
    let straight_snapshot = straight_run.snapshot();

    assert_eq!(paused_snapshot.tick, straight_snapshot.tick);
    assert_eq!(paused_snapshot.vehicles.len(), straight_snapshot.vehicles.len());
    for (a, b) in paused_snapshot.vehicles.iter().zip(straight_snapshot.vehicles.iter()) {
        assert_eq!(a.id, b.id);
        assert_eq!(a.state, b.state);
        assert_eq!(a.position, b.position);
        assert_eq!(a.velocity, b.velocity);
        assert_eq!(a.clearance, b.clearance);
    }
}
