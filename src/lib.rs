//! Garden watering controller library.
//!
//! Exposes the pure-logic modules for integration testing and the
//! firmware binary.  All ESP-IDF-specific code is guarded by
//! `#[cfg(feature = "espidf")]` within each module; on the host the
//! adapters fall back to simulation backends.

#![deny(unused_must_use)]

pub mod app;
pub mod config;
pub mod error;
pub mod inbox;
pub mod pins;
pub mod relays;
pub mod schedule;

pub mod adapters;
pub mod drivers;
