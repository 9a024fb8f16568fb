//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the logger (UART / USB-CDC in production).  Status reports are logged
//! as the same JSON document the messenger publishes, so a serial capture
//! can be replayed against the status consumer.

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Default)]
pub struct LogEventSink {
    emitted: u32,
}

impl LogEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events logged since boot.
    pub fn emitted(&self) -> u32 {
        self.emitted
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        self.emitted = self.emitted.wrapping_add(1);
        match event {
            AppEvent::Status(report) => match serde_json::to_string(report) {
                Ok(json) => info!("STATUS | {}", json),
                Err(e) => warn!("STATUS | encode failed: {}", e),
            },
            AppEvent::RelaySwitched { relay, level } => {
                info!("RELAY | {} -> {:?}", relay, level);
            }
            AppEvent::ArmRejected {
                source,
                relay,
                error,
            } => {
                warn!("ARM | {:?} request for relay {} dropped: {}", source, relay, error);
            }
            AppEvent::ModeChanged { from, to } => {
                info!("MODE | {:?} -> {:?}", from, to);
            }
            AppEvent::AutoChanged(enabled) => {
                info!("AUTO | {}", if *enabled { "on" } else { "off" });
            }
            AppEvent::ScheduleReplaced { events } => {
                info!("SCHEDULE | replaced, {} events", events);
            }
            AppEvent::CommandRejected(e) => {
                warn!("COMMAND | rejected: {}", e);
            }
            AppEvent::OutputFault(e) => {
                warn!("FAULT | {}", e);
            }
            AppEvent::Started { auto, events } => {
                info!("START | auto={} events={}", auto, events);
            }
        }
    }
}
