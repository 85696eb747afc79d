//! Append-only event log sink (C2): a bounded in-memory ring plus an
//! optional durable CSV mirror.
//!
//! Grounded in the corpus's `log_to_csv` helper (teacher's
//! `src/monitoring/traffic_monitoring_system.rs`): open-append-or-create,
//! write headers only for a fresh file. Mirror failures never propagate —
//! they degrade to a `log::warn!` line, matching SPEC_FULL.md §4.2.

use std::collections::VecDeque;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::constants::EVENT_LOG_RING_MIN;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionTag {
    Go,
    Yield,
    Brake,
    Stop,
    Hold,
    Clearance,
    ClearanceSpeed,
    YieldSpeedOverride,
    Collision,
    Info,
}

impl ActionTag {
    pub fn as_str(self) -> &'static str {
        match self {
            ActionTag::Go => "GO",
            ActionTag::Yield => "YIELD",
            ActionTag::Brake => "BRAKE",
            ActionTag::Stop => "STOP",
            ActionTag::Hold => "HOLD",
            ActionTag::Clearance => "CLEARANCE",
            ActionTag::ClearanceSpeed => "CLEARANCE_SPEED",
            ActionTag::YieldSpeedOverride => "YIELD_SPEED_OVERRIDE",
            ActionTag::Collision => "COLLISION",
            ActionTag::Info => "INFO",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    pub wall_clock: f64,
    pub actor: String,
    pub action: ActionTag,
    pub ttc: Option<f64>,
    pub reason: String,
}

fn now_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

pub struct EventLog {
    ring: VecDeque<EventRecord>,
    capacity: usize,
    durable_path: Option<PathBuf>,
    durable_written: usize,
    durable_cap: usize,
}

impl EventLog {
    pub fn new() -> Self {
        EventLog {
            ring: VecDeque::with_capacity(EVENT_LOG_RING_MIN),
            capacity: EVENT_LOG_RING_MIN,
            durable_path: None,
            durable_written: 0,
            durable_cap: crate::constants::EVENT_LOG_DURABLE_MAX,
        }
    }

    /// Enable the durable CSV mirror, writing to `path` (created if absent).
    pub fn with_durable_mirror(mut self, path: PathBuf) -> Self {
        self.durable_path = Some(path);
        self
    }

    fn push(&mut self, record: EventRecord) {
        self.mirror(&record);
        if self.ring.len() >= self.capacity {
            self.ring.pop_front();
        }
        self.ring.push_back(record);
    }

    fn mirror(&mut self, record: &EventRecord) {
        let Some(path) = self.durable_path.as_ref() else {
            return;
        };
        if self.durable_written >= self.durable_cap {
            return;
        }
        let file_exists = path.exists();
        let result = OpenOptions::new()
            .append(true)
            .create(true)
            .open(path)
            .map_err(|e| e.to_string())
            .and_then(|file| {
                let mut wtr = csv::WriterBuilder::new()
                    .has_headers(!file_exists)
                    .from_writer(file);
                wtr.serialize(record).map_err(|e| e.to_string())?;
                wtr.flush().map_err(|e| e.to_string())
            });
        match result {
            Ok(()) => self.durable_written += 1,
            Err(e) => log::warn!("event log durable mirror write failed: {e}"),
        }
    }

    pub fn log_decision(&mut self, actor: &str, action: ActionTag, ttc: Option<f64>, reason: &str) {
        self.push(EventRecord {
            wall_clock: now_secs(),
            actor: actor.to_string(),
            action,
            ttc,
            reason: reason.to_string(),
        });
    }

    pub fn log_info(&mut self, msg: &str) {
        self.push(EventRecord {
            wall_clock: now_secs(),
            actor: "engine".to_string(),
            action: ActionTag::Info,
            ttc: None,
            reason: msg.to_string(),
        });
    }

    pub fn log_collision(&mut self, a: &str, b: &str) {
        self.push(EventRecord {
            wall_clock: now_secs(),
            actor: format!("{a},{b}"),
            action: ActionTag::Collision,
            ttc: None,
            reason: "physical collision".to_string(),
        });
    }

    pub fn get_recent(&self, n: usize) -> Vec<EventRecord> {
        self.ring.iter().rev().take(n).rev().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.ring.clear();
    }
}

impl Default for EventLog {
    fn default() -> Self {
        EventLog::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_buffer_stays_bounded_at_capacity() {
        let mut log = EventLog::new();
        for i in 0..(EVENT_LOG_RING_MIN + 20) {
            log.log_info(&format!("event {i}"));
        }
        assert_eq!(log.get_recent(EVENT_LOG_RING_MIN + 20).len(), EVENT_LOG_RING_MIN);
        // the first 20 pushed entries were evicted; the oldest survivor is "event 20".
        let recent = log.get_recent(EVENT_LOG_RING_MIN);
        assert_eq!(recent[0].reason, "event 20");
    }

    #[test]
    fn get_recent_returns_in_chronological_order() {
        let mut log = EventLog::new();
        log.log_info("first");
        log.log_info("second");
        log.log_info("third");
        let recent = log.get_recent(2);
        assert_eq!(recent[0].reason, "second");
        assert_eq!(recent[1].reason, "third");
    }

    #[test]
    fn clear_empties_the_ring() {
        let mut log = EventLog::new();
        log.log_info("first");
        log.clear();
        assert!(log.get_recent(10).is_empty());
    }
}
