//! A deterministic, fixed-tick simulation of a single four-way intersection
//! shared by V2X-capable and non-V2X vehicles.
//!
//! The crate is organized the way the original RabbitMQ-based traffic
//! assignment was, one module per cooperating component, but the components
//! themselves now implement the V2X coordination model (SPEC_FULL.md): a
//! shared state bus, a bounded event log, vehicle kinematics and state
//! machine, a four-phase signal controller, a right-of-way arbiter, a
//! per-vehicle decision agent, an optional remote advisor, and the scheduler
//! that ties them together each tick. [`engine::Engine`] is the crate's sole
//! external entry point; nothing downstream needs to reach into the
//! individual components directly.

pub mod advisor;
pub mod agent;
pub mod arbiter;
pub mod bus;
pub mod config;
pub mod constants;
pub mod engine;
pub mod error;
pub mod event_log;
pub mod geometry;
pub mod kinematics;
pub mod scenarios;
pub mod signal;
pub mod vehicle;
