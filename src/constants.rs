//! Normative numeric constants from the intersection geometry and timing model.
//!
//! These are contract values, not deployment knobs — see [`crate::config::Config`]
//! for the handful of values that are genuinely environment-tunable.

/// Intersection center, in the 2-D integer pixel plane.
pub const CENTER_X: f64 = 400.0;
pub const CENTER_Y: f64 = 400.0;

pub const ROAD_WIDTH: f64 = 100.0;
pub const LANE_OFFSET: f64 = 25.0;
pub const STOP_MARGIN: f64 = 28.0;

/// Half-width of the square intersection box (100x100 px total).
pub const INTERSECTION_HALF: f64 = 50.0;

/// Distance from the canvas edge to the intersection center along an approach,
/// used to place spawn points.
pub const SPAWN_DISTANCE: f64 = 380.0;
pub const CANVAS_EXIT_MARGIN: f64 = 40.0;

/// Car-following thresholds, px.
pub const CAR_FOLLOW_STOP_GAP: f64 = 55.0;
pub const CAR_FOLLOW_RAMP_GAP: f64 = 180.0;

/// Minimum nonzero speed factor while braking to a stop or creeping.
pub const CREEP_FLOOR: f64 = 0.3;

/// Intersection occupancy sensor range (v2x-capable only), px.
pub const OCCUPANCY_SENSOR_RANGE: f64 = 150.0;

/// Stop-line braking zone, px.
pub const STOP_BRAKE_ZONE: f64 = 90.0;

/// Emergency preemption range, px.
pub const EMERGENCY_RANGE: f64 = 250.0;

/// "Approaching" reporting range for the signal controller, px.
pub const APPROACHING_RANGE: f64 = 300.0;
pub const RISK_ALERT_APPROACHING_COUNT: usize = 2;

/// Physical-collision distance, px.
pub const COLLISION_DIST: f64 = 20.0;

/// Ticks a crashed vehicle remains before becoming done.
pub const CRASH_TIMEOUT_TICKS: u64 = 60;

/// Tick rate, Hz, and the derived interval.
pub const TICK_RATE_HZ: f64 = 30.0;
pub const TICK_INTERVAL_SECS: f64 = 1.0 / TICK_RATE_HZ;

/// Signal phase durations, in ticks.
pub const PHASE_A_GREEN_TICKS: u64 = 150;
pub const PHASE_A_YELLOW_TICKS: u64 = 30;
pub const PHASE_B_GREEN_TICKS: u64 = 150;
pub const PHASE_B_YELLOW_TICKS: u64 = 30;
pub const SIGNAL_CYCLE_TICKS: u64 =
    PHASE_A_GREEN_TICKS + PHASE_A_YELLOW_TICKS + PHASE_B_GREEN_TICKS + PHASE_B_YELLOW_TICKS;

/// Arbiter time-to-arrival override margin, seconds.
pub const TTA_DELTA_SECS: f64 = 2.0;

/// Agent deterministic-evaluator thresholds, seconds.
pub const TTC_BRAKE_SECS: f64 = 3.0;
pub const TTC_YIELD_SECS: f64 = 1.5;

/// Relevant-neighbor search radius for the agent decision pipeline, px.
pub const AGENT_RELEVANT_RANGE: f64 = 150.0;

/// Remote advisor cache/availability contract.
pub const ADVISOR_CACHE_TTL_SECS: f64 = 1.8;
pub const ADVISOR_PROBE_INTERVAL_CALLS: u64 = 30;
pub const ADVISOR_PROBE_TIMEOUT_SECS: u64 = 2;
pub const ADVISOR_DECISION_TIMEOUT_SECS: u64 = 8;
pub const ADVISOR_WORKER_POOL_MIN: usize = 2;
pub const ADVISOR_WORKER_POOL_MAX: usize = 4;

/// Speed-multiplier domain for a vehicle spec.
pub const SPEED_MULTIPLIER_MIN: f64 = 0.2;
pub const SPEED_MULTIPLIER_MAX: f64 = 3.0;

/// Nominal baseline speed at multiplier 1.0, km/h.
pub const BASELINE_SPEED_KMH: f64 = 50.0;

/// Event log ring buffer / durable retention.
pub const EVENT_LOG_RING_MIN: usize = 100;
pub const EVENT_LOG_DURABLE_MAX: usize = 500;
pub const SNAPSHOT_EVENT_LOG_MIN: usize = 20;

/// Per-agent bounded decision memory.
pub const AGENT_MEMORY_MIN: usize = 10;

/// Spawn queue spacing: offset in px and delay in ticks per queue index.
pub const SPAWN_QUEUE_OFFSET_PX: f64 = 60.0;
pub const SPAWN_QUEUE_DELAY_TICKS: u64 = 30;
