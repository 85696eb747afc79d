//! Deployment-tunable configuration (SPEC_FULL.md §10.3).
//!
//! Everything the specification treats as normative (geometry, timing,
//! thresholds) stays a compile-time constant in [`crate::constants`]. This
//! struct only holds values that are genuinely environment details: where
//! the advisor lives, how many workers service it, and where the durable
//! event log mirror is written. Read once at `Engine` construction, mirroring
//! the corpus's flat `global_variables.rs` constants module but generalized
//! to env-overridable defaults.

use std::env;
use std::path::PathBuf;

use crate::constants::{ADVISOR_WORKER_POOL_MAX, ADVISOR_WORKER_POOL_MIN};

#[derive(Debug, Clone)]
pub struct Config {
    pub advisor_enabled: bool,
    pub advisor_base_url: String,
    pub advisor_model: String,
    pub advisor_worker_pool_size: usize,
    pub durable_log_path: Option<PathBuf>,
    pub tick_interval_override_secs: Option<f64>,
}

impl Config {
    pub fn from_env() -> Self {
        let pool_size = env::var("RTS_V2X_ADVISOR_WORKERS")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .map(|n| n.clamp(ADVISOR_WORKER_POOL_MIN, ADVISOR_WORKER_POOL_MAX))
            .unwrap_or(ADVISOR_WORKER_POOL_MIN);

        Config {
            advisor_enabled: env::var("RTS_V2X_ADVISOR_ENABLED")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            advisor_base_url: env::var("RTS_V2X_ADVISOR_URL")
                .unwrap_or_else(|_| "http://localhost:11434".to_string()),
            advisor_model: env::var("RTS_V2X_ADVISOR_MODEL").unwrap_or_else(|_| "llama3".to_string()),
            advisor_worker_pool_size: pool_size,
            durable_log_path: env::var("RTS_V2X_EVENT_LOG_PATH").ok().map(PathBuf::from),
            tick_interval_override_secs: env::var("RTS_V2X_TICK_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse::<f64>().ok()),
        }
    }

    pub fn tick_interval_secs(&self) -> f64 {
        self.tick_interval_override_secs
            .unwrap_or(crate::constants::TICK_INTERVAL_SECS)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            advisor_enabled: false,
            advisor_base_url: "http://localhost:11434".to_string(),
            advisor_model: "llama3".to_string(),
            advisor_worker_pool_size: ADVISOR_WORKER_POOL_MIN,
            durable_log_path: None,
            tick_interval_override_secs: None,
        }
    }
}
