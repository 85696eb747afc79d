//! The desired-speed policy (SPEC_FULL.md §4.3): four ordered rules, minimum
//! factor wins. Kept separate from [`crate::vehicle::Vehicle`] so the policy
//! can see the full active-vehicle set without the vehicle type needing a
//! back-reference to its neighbors.

use crate::constants::*;
use crate::signal::InfraRecord;
use crate::vehicle::{Intent, Vehicle, VehicleState};

/// Nearest vehicle ahead of `v` on the same approach, not yet turned, whose
/// target is still live (not done/crashed). Returns `(gap_px, leader_speed_factor)`.
fn nearest_ahead_same_approach<'a>(v: &Vehicle, all: &'a [Vehicle]) -> Option<(&'a Vehicle, f64)> {
    if v.turned {
        return None;
    }
    let mut best: Option<(&Vehicle, f64)> = None;
    for other in all {
        if other.id == v.id || other.direction != v.direction || other.turned {
            continue;
        }
        if matches!(other.state, VehicleState::Done | VehicleState::Crashed) {
            continue;
        }
        let gap = other.position.sub(v.position).dot(v.current_travel_unit);
        if gap <= 0.0 {
            continue;
        }
        if best.map(|(_, g)| gap < g).unwrap_or(true) {
            best = Some((other, gap));
        }
    }
    best
}

fn car_following_factor(v: &Vehicle, all: &[Vehicle]) -> f64 {
    let Some((leader, gap)) = nearest_ahead_same_approach(v, all) else {
        return 1.0;
    };
    if gap <= CAR_FOLLOW_STOP_GAP {
        return 0.0;
    }
    if gap <= CAR_FOLLOW_RAMP_GAP {
        let t = (gap - CAR_FOLLOW_STOP_GAP) / (CAR_FOLLOW_RAMP_GAP - CAR_FOLLOW_STOP_GAP);
        let ramp = CREEP_FLOOR + (1.0 - CREEP_FLOOR) * t;
        let leader_speed = leader.velocity.length();
        let leader_ratio = if v.base_speed > 0.0 {
            (leader_speed / v.base_speed).max(CREEP_FLOOR)
        } else {
            1.0
        };
        return ramp.min(leader_ratio).max(CREEP_FLOOR);
    }
    1.0
}

fn occupancy_sensor_factor(v: &Vehicle, all: &[Vehicle]) -> f64 {
    if !v.v2x_capable {
        return 1.0;
    }
    let d = v.distance_to_stop_line();
    if d <= 0.0 || d > OCCUPANCY_SENSOR_RANGE {
        return 1.0;
    }
    let occupied = all
        .iter()
        .any(|o| o.id != v.id && o.is_live() && o.in_intersection_box());
    if !occupied {
        return 1.0;
    }
    let t = (d / OCCUPANCY_SENSOR_RANGE).clamp(0.0, 1.0);
    CREEP_FLOOR + (1.0 - CREEP_FLOOR) * t
}

fn stop_line_braking_factor(v: &Vehicle) -> f64 {
    if v.no_stop || v.clearance {
        return 1.0;
    }
    let d = v.distance_to_stop_line();
    if d < 0.0 {
        return 1.0;
    }
    if d <= 1.0 {
        return 0.0;
    }
    if d <= STOP_BRAKE_ZONE {
        return CREEP_FLOOR + (1.0 - CREEP_FLOOR) * (d / STOP_BRAKE_ZONE);
    }
    1.0
}

fn agent_yield_factor(v: &Vehicle) -> f64 {
    if v.agent_yield && !v.in_intersection_box() {
        0.0
    } else {
        1.0
    }
}

/// Computes the desired-speed factor for one tick: the minimum of the four
/// rules in SPEC_FULL.md §4.3, in order. `_infra` is accepted for symmetry
/// with the signal controller's per-tick outputs even though the braking
/// policy itself keys off `clearance` rather than light color directly.
pub fn desired_speed_factor(v: &Vehicle, all: &[Vehicle], _infra: Option<&InfraRecord>) -> f64 {
    let mut factor = agent_yield_factor(v);
    factor = factor.min(car_following_factor(v, all));
    factor = factor.min(occupancy_sensor_factor(v, all));
    factor = factor.min(stop_line_braking_factor(v));
    factor.clamp(0.0, 1.0)
}

/// Whether `v`'s intent requires the once-only turn snap (used by callers
/// deciding whether to re-run car-following after a heading change).
pub fn turns(v: &Vehicle) -> bool {
    v.intent != Intent::Straight
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Direction;
    use crate::vehicle::{Priority, VehicleSpec};

    fn straight_spec(id: &str, direction: Direction, queue_index: u32) -> VehicleSpec {
        VehicleSpec {
            id: id.to_string(),
            direction,
            intent: Intent::Straight,
            priority: Priority::Normal,
            speed_multiplier: 1.0,
            v2x_enabled: true,
            no_stop: false,
            queue_index,
            spawn_offset_px: 0.0,
        }
    }

    #[test]
    fn no_leader_gives_full_speed_factor() {
        let v = Vehicle::from_spec(&straight_spec("A", Direction::N, 0));
        assert_eq!(car_following_factor(&v, &[]), 1.0);
    }

    #[test]
    fn tight_gap_to_leader_forces_stop() {
        let leader = Vehicle::from_spec(&straight_spec("A", Direction::N, 0));
        let mut follower = Vehicle::from_spec(&straight_spec("B", Direction::N, 0));
        // Place the follower 30 px behind the leader along the shared approach,
        // inside CAR_FOLLOW_STOP_GAP.
        follower.position = leader.position.sub(leader.current_travel_unit.scale(30.0));
        let all = vec![leader, follower.clone()];
        assert_eq!(car_following_factor(&follower, &all), 0.0);
    }

    #[test]
    fn stop_line_braking_relaxes_once_clearance_is_granted() {
        let mut v = Vehicle::from_spec(&straight_spec("A", Direction::N, 0));
        v.position = v.stop_line;
        assert_eq!(stop_line_braking_factor(&v), 0.0);
        v.clearance = true;
        assert_eq!(stop_line_braking_factor(&v), 1.0);
    }

    #[test]
    fn no_stop_vehicle_ignores_stop_line_braking() {
        let mut v = Vehicle::from_spec(&straight_spec("A", Direction::N, 0));
        v.no_stop = true;
        v.position = v.stop_line;
        assert_eq!(stop_line_braking_factor(&v), 1.0);
    }

    #[test]
    fn agent_yield_factor_releases_inside_the_box() {
        let mut v = Vehicle::from_spec(&straight_spec("A", Direction::N, 0));
        v.agent_yield = true;
        assert_eq!(agent_yield_factor(&v), 0.0);
        v.position = crate::geometry::intersection_center();
        assert_eq!(agent_yield_factor(&v), 1.0);
    }
}
