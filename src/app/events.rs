//! Outbound application events.
//!
//! The [`ActuationEngine`](super::service::ActuationEngine) emits these
//! through the [`EventSink`](super::ports::EventSink) port.  Adapters on the
//! other side decide what to do with them: log to serial, publish the
//! status payload on the MQTT data topic, etc.

use serde::Serialize;

use crate::error::{ArmError, CommandError, RelayError};
use crate::relays::{Level, MAX_RELAYS, RelaySnapshot};
use crate::schedule::{TimeOfDay, WateringEvent};

use super::service::Mode;

/// Who asked for a relay to be armed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArmSource {
    Schedule,
    Manual,
}

/// Structured events emitted by the application core.
#[derive(Debug, Clone)]
pub enum AppEvent {
    /// The engine has started (auto flag, number of scheduled events).
    Started { auto: bool, events: usize },

    /// Status snapshot for the messenger.
    Status(StatusReport),

    /// A relay output was driven.
    RelaySwitched { relay: u8, level: Level },

    /// An arm request was dropped.
    ArmRejected {
        source: ArmSource,
        relay: u8,
        error: ArmError,
    },

    /// Global mode changed.
    ModeChanged { from: Mode, to: Mode },

    /// The schedule was enabled or disabled.
    AutoChanged(bool),

    /// A new watering table is in force.
    ScheduleReplaced { events: usize },

    /// An inbound command was refused.
    CommandRejected(CommandError),

    /// A relay write failed and will be retried.
    OutputFault(RelayError),
}

/// A point-in-time status snapshot, published every `publish_interval_ms`
/// and returned for `StatusRequest`.
///
/// Always built between ticks, so it reflects the last committed tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub auto: bool,
    pub mode: Mode,
    pub time: Option<TimeOfDay>,
    pub relays: heapless::Vec<RelaySnapshot, MAX_RELAYS>,
    pub next_event: Option<WateringEvent>,
    /// [`HealthFlag`](crate::error::HealthFlag) bitmask.
    pub health: u8,
    pub tick_count: u64,
}
