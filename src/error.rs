//! Validation error type surfaced by the facade as `{ok: false, reason}`.
//!
//! Per SPEC_FULL.md §7.1 this stays a plain enum implementing `Error` by hand,
//! matching the corpus's existing preference for `Box<dyn Error>`-compatible
//! enums over a derive-macro error crate.

use std::error::Error;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum EngineError {
    UnknownScenario(String),
    UnknownVehicle(String),
    InvalidSpec(String),
    DuplicateVehicleId(String),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::UnknownScenario(name) => write!(f, "unknown scenario: {name}"),
            EngineError::UnknownVehicle(id) => write!(f, "unknown vehicle id: {id}"),
            EngineError::InvalidSpec(reason) => write!(f, "invalid vehicle spec: {reason}"),
            EngineError::DuplicateVehicleId(id) => write!(f, "duplicate vehicle id: {id}"),
        }
    }
}

impl Error for EngineError {}

impl EngineError {
    pub fn reason(&self) -> String {
        self.to_string()
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
