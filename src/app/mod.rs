//! Application core, pure domain logic with zero I/O.
//!
//! This module holds the watering rules: the tick-driven
//! [`ActuationEngine`](service::ActuationEngine) and the
//! [`CommandGateway`](gateway::CommandGateway) in front of it.  All
//! interaction with hardware happens through **port traits** defined in
//! [`ports`], keeping this layer fully testable without real peripherals.

pub mod commands;
pub mod events;
pub mod gateway;
pub mod ports;
pub mod service;
