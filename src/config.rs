//! System configuration parameters
//!
//! Everything the controller needs at boot: relay wiring, loop timing,
//! override policy, and the watering table.  Persisted in NVS via
//! [`ConfigPort`](crate::app::ports::ConfigPort); defaults reproduce the
//! factory table.

use serde::{Deserialize, Serialize};

use crate::pins;
use crate::relays::MAX_RELAYS;
use crate::schedule::{MAX_EVENTS, WateringEvent};

/// Core system configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemConfig {
    // --- Relays ---
    /// GPIO number per relay channel (index = relay number)
    pub relay_pins: heapless::Vec<u8, MAX_RELAYS>,
    /// Relay board energises on a LOW input
    pub relay_active_low: bool,
    /// Refuse to energise a second relay while one is running
    pub exclusive_relays: bool,

    // --- Schedule ---
    /// Watering events, `(relay, hhmm, minutes)`
    pub events: heapless::Vec<WateringEvent, MAX_EVENTS>,
    /// Whether the schedule is consulted at boot
    pub auto_enabled: bool,
    /// Return to AUTO once every manually started relay has finished.
    /// When false, a manual run pauses the schedule until `SetAuto(true)`.
    pub auto_resume: bool,
    /// Missed minutes (clock jump, stalled loop) replayed on the next tick
    pub max_catch_up_minutes: u16,

    // --- Timing ---
    /// Control loop interval (milliseconds)
    pub tick_interval_ms: u32,
    /// Status publish interval (milliseconds)
    pub publish_interval_ms: u32,
}

impl SystemConfig {
    /// Number of relay channels configured.
    pub fn relay_count(&self) -> usize {
        self.relay_pins.len()
    }

    /// Same wiring, timing and policy with an empty table and AUTO off.
    /// Used when a stored schedule is refused at boot.
    pub fn without_schedule(&self) -> Self {
        Self {
            events: heapless::Vec::new(),
            auto_enabled: false,
            ..self.clone()
        }
    }
}

/// Factory watering table.
const DEFAULT_EVENTS: [WateringEvent; 4] = [
    WateringEvent::new(0, 1800, 10),
    WateringEvent::new(1, 1811, 20),
    WateringEvent::new(0, 2000, 20),
    WateringEvent::new(0, 2030, 20),
];

const _: () = assert!(pins::RELAY_COUNT <= MAX_RELAYS);
const _: () = assert!(DEFAULT_EVENTS.len() <= MAX_EVENTS);

impl Default for SystemConfig {
    fn default() -> Self {
        // Both fit, asserted above.
        let relay_pins = heapless::Vec::from_slice(&pins::RELAY_GPIOS).unwrap_or_default();
        let events = heapless::Vec::from_slice(&DEFAULT_EVENTS).unwrap_or_default();

        Self {
            // Relays
            relay_pins,
            relay_active_low: pins::RELAY_ACTIVE_LOW,
            exclusive_relays: true,

            // Schedule
            events,
            auto_enabled: true,
            auto_resume: true,
            max_catch_up_minutes: 5,

            // Timing
            tick_interval_ms: 1000,     // 1 Hz
            publish_interval_ms: 60_000, // 1/min
        }
    }
}
