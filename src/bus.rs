//! The shared publish/subscribe state bus (C1).
//!
//! A keyed most-recent-value store, nothing more: no history, no broker, no
//! subscription semantics. Participants poll it once per tick. The engine's
//! tick ordering (SPEC_FULL.md §4.8) guarantees readers never observe a torn
//! write within a tick, so the bus itself needs no internal locking.

use std::collections::HashMap;

use crate::signal::InfraRecord;
use crate::vehicle::VehiclePublicRecord;

/// The well-known bus key under which the signal controller publishes.
pub const INFRA_KEY: &str = "INFRA";

#[derive(Debug, Clone)]
pub enum BusRecord {
    Vehicle(VehiclePublicRecord),
    Infra(InfraRecord),
}

impl BusRecord {
    pub fn as_vehicle(&self) -> Option<&VehiclePublicRecord> {
        match self {
            BusRecord::Vehicle(v) => Some(v),
            BusRecord::Infra(_) => None,
        }
    }

    pub fn as_infra(&self) -> Option<&InfraRecord> {
        match self {
            BusRecord::Infra(i) => Some(i),
            BusRecord::Vehicle(_) => None,
        }
    }
}

#[derive(Debug, Default)]
pub struct StateBus {
    records: HashMap<String, BusRecord>,
}

impl StateBus {
    pub fn new() -> Self {
        StateBus {
            records: HashMap::new(),
        }
    }

    pub fn publish(&mut self, key: impl Into<String>, record: BusRecord) {
        self.records.insert(key.into(), record);
    }

    pub fn get(&self, key: &str) -> Option<&BusRecord> {
        self.records.get(key)
    }

    pub fn get_all(&self) -> HashMap<String, BusRecord> {
        self.records.clone()
    }

    /// All records except the one under `key` (used by agents/arbiter to
    /// enumerate "other" vehicles without re-reading themselves).
    pub fn get_others(&self, key: &str) -> Vec<&BusRecord> {
        self.records
            .iter()
            .filter(|(k, _)| k.as_str() != key)
            .map(|(_, v)| v)
            .collect()
    }

    pub fn infra(&self) -> Option<&InfraRecord> {
        self.get(INFRA_KEY).and_then(BusRecord::as_infra)
    }

    pub fn vehicle_records(&self) -> impl Iterator<Item = &VehiclePublicRecord> {
        self.records.values().filter_map(BusRecord::as_vehicle)
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Direction, Vec2};
    use crate::vehicle::{Intent, Priority, VehicleState};

    fn vehicle_record(id: &str) -> VehiclePublicRecord {
        VehiclePublicRecord {
            id: id.to_string(),
            direction: Direction::N,
            intent: Intent::Straight,
            priority: Priority::Normal,
            v2x: true,
            no_stop: false,
            state: VehicleState::Moving,
            clearance: false,
            position: Vec2::ZERO,
            velocity: Vec2::ZERO,
            speed_kmh: 0.0,
            heading: 0.0,
            distance_to_center: 0.0,
            timestamp: 0.0,
        }
    }

    // P8: the bus is a most-recent-value map; publishing under a key replaces
    // whatever was there, and INFRA is only ever read back as an infra record.
    #[test]
    fn publish_replaces_prior_value_under_the_same_key() {
        let mut bus = StateBus::new();
        bus.publish("A", BusRecord::Vehicle(vehicle_record("A")));
        assert!(bus.get("A").unwrap().as_vehicle().is_some());

        let mut updated = vehicle_record("A");
        updated.state = VehicleState::Waiting;
        bus.publish("A", BusRecord::Vehicle(updated));
        assert_eq!(bus.get("A").unwrap().as_vehicle().unwrap().state, VehicleState::Waiting);
    }

    #[test]
    fn infra_key_is_distinct_from_vehicle_keys() {
        let mut bus = StateBus::new();
        bus.publish("A", BusRecord::Vehicle(vehicle_record("A")));
        assert!(bus.infra().is_none());
        assert_eq!(bus.get_others(INFRA_KEY).len(), 1);
    }

    #[test]
    fn clear_empties_every_record() {
        let mut bus = StateBus::new();
        bus.publish("A", BusRecord::Vehicle(vehicle_record("A")));
        bus.clear();
        assert!(bus.get("A").is_none());
    }
}

