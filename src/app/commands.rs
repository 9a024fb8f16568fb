//! Inbound commands to the application core.
//!
//! These represent actions requested by the outside world (MQTT command
//! topic, serial console) that the
//! [`CommandGateway`](super::gateway::CommandGateway) interprets.
//!
//! Wire shape (JSON, one object per message):
//!
//! ```text
//! {"cmd":"set_auto","enabled":false}
//! {"cmd":"manual_run","relay":2,"minutes":5}
//! {"cmd":"status"}
//! {"cmd":"stop_all"}
//! {"cmd":"reconfigure","events":[{"relay":0,"start":1800,"minutes":10}]}
//! ```

use serde::Deserialize;

use crate::error::CommandError;
use crate::schedule::{MAX_EVENTS, WateringEvent};

/// Commands that external adapters can send into the application core.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum Command {
    /// Enable or disable the watering schedule.
    SetAuto { enabled: bool },

    /// Run a relay for an explicit duration, bypassing the schedule.
    /// Zero minutes cancels a running relay.
    ManualRun { relay: u8, minutes: u16 },

    /// Report every relay plus the auto flag.
    #[serde(rename = "status")]
    StatusRequest,

    /// Switch every relay off.  Mode and auto flag are untouched.
    StopAll,

    /// Replace the watering table after validation.
    Reconfigure {
        events: heapless::Vec<WateringEvent, MAX_EVENTS>,
    },
}

impl Command {
    /// Decode a wire payload.  Anything malformed or unsupported is an
    /// [`CommandError::UnknownCommand`].
    pub fn decode(payload: &[u8]) -> Result<Self, CommandError> {
        serde_json::from_slice(payload).map_err(|_| CommandError::UnknownCommand)
    }
}
