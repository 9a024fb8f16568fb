//! Command gateway: decodes inbound commands and dispatches them to the
//! [`ActuationEngine`] and paces the outbound status report.
//!
//! ```text
//!   Messenger ──payload──▶ CommandGateway ──▶ ActuationEngine
//!       ▲                       │
//!       └──── Response ─────────┘        (and StatusReport every publish interval)
//! ```
//!
//! A command either succeeds or is rejected with a [`CommandError`]; a
//! rejected command leaves every piece of engine state as it was.

use log::{info, warn};
use serde::Serialize;

use crate::config::SystemConfig;
use crate::error::{CommandError, HealthFlag};

use super::commands::Command;
use super::events::{AppEvent, StatusReport};
use super::ports::{ConfigPort, EventSink};
use super::service::ActuationEngine;

/// Outcome of a command, returned to the sender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum Response {
    Ack,
    Status(StatusReport),
    Rejected(CommandError),
}

pub struct CommandGateway {
    /// Last persisted configuration, kept in step with live changes.
    config: SystemConfig,
    publish_interval_ms: u32,
    since_publish_ms: u32,
    rejected_count: u32,
}

impl CommandGateway {
    pub fn new(config: SystemConfig) -> Self {
        Self {
            publish_interval_ms: config.publish_interval_ms,
            since_publish_ms: 0,
            rejected_count: 0,
            config,
        }
    }

    /// Decode a raw payload and handle it.  Malformed input is answered
    /// with [`CommandError::UnknownCommand`]; nothing else changes.
    pub fn handle_payload(
        &mut self,
        payload: &[u8],
        engine: &mut ActuationEngine,
        store: &impl ConfigPort,
        sink: &mut impl EventSink,
    ) -> Response {
        match Command::decode(payload) {
            Ok(cmd) => self.handle(cmd, engine, store, sink),
            Err(e) => self.reject(e, engine, sink),
        }
    }

    pub fn handle(
        &mut self,
        cmd: Command,
        engine: &mut ActuationEngine,
        store: &impl ConfigPort,
        sink: &mut impl EventSink,
    ) -> Response {
        let result = match cmd {
            Command::SetAuto { enabled } => engine.set_auto(enabled, sink).map(|()| {
                self.config.auto_enabled = enabled;
                self.persist(store);
            }),
            Command::ManualRun { relay, minutes } => engine.manual_run(relay, minutes, sink),
            Command::StatusRequest => return Response::Status(engine.status()),
            Command::StopAll => {
                engine.stop_all();
                Ok(())
            }
            Command::Reconfigure { events } => engine.reconfigure(&events, sink).map(|()| {
                self.config.events = events;
                self.persist(store);
            }),
        };

        match result {
            Ok(()) => Response::Ack,
            Err(e) => self.reject(e, engine, sink),
        }
    }

    /// Advance the publish timer.  Returns a report once per publish
    /// interval and clears the one-off health flags it carries.
    pub fn poll_status(&mut self, elapsed_ms: u32, engine: &mut ActuationEngine) -> Option<StatusReport> {
        self.since_publish_ms = self.since_publish_ms.saturating_add(elapsed_ms);
        if self.since_publish_ms < self.publish_interval_ms {
            return None;
        }
        self.since_publish_ms -= self.publish_interval_ms;
        if self.since_publish_ms >= self.publish_interval_ms {
            // Stalled for more than a whole interval; don't burst.
            self.since_publish_ms = 0;
        }
        let report = engine.status();
        engine.clear_transient_health();
        Some(report)
    }

    /// Commands rejected since boot.
    pub fn rejected_count(&self) -> u32 {
        self.rejected_count
    }

    /// Configuration as it would be loaded on the next boot.
    pub fn config(&self) -> &SystemConfig {
        &self.config
    }

    // ── Internal ──────────────────────────────────────────────

    fn reject(
        &mut self,
        e: CommandError,
        engine: &mut ActuationEngine,
        sink: &mut impl EventSink,
    ) -> Response {
        warn!("Gateway: command rejected: {}", e);
        self.rejected_count = self.rejected_count.saturating_add(1);
        engine.raise(HealthFlag::CommandRejected);
        sink.emit(&AppEvent::CommandRejected(e));
        Response::Rejected(e)
    }

    /// Persist the live config.  A storage failure is logged; the change
    /// stays in force until reboot.
    fn persist(&self, store: &impl ConfigPort) {
        match store.save(&self.config) {
            Ok(()) => info!("Gateway: config saved"),
            Err(e) => warn!("Gateway: config save failed: {}", e),
        }
    }
}
