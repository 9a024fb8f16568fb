//! Unified error types for the garden watering firmware.
//!
//! Every variant is `Copy` so errors can be logged, latched into the health
//! mask, and returned to a remote caller without allocation.
//!
//! | Error           | Raised by                  | Severity                       |
//! |-----------------|----------------------------|--------------------------------|
//! | [`ConfigError`] | `ScheduleTable::load`      | fatal at boot, AUTO refused    |
//! | [`ArmError`]    | `RelayBank::arm`           | logged, request dropped        |
//! | [`CommandError`]| `CommandGateway::handle`   | reported in the response       |
//! | [`RelayError`]  | `RelayPort::write`         | write re-queued, health flag   |

use core::fmt;

use serde::Serialize;

// ---------------------------------------------------------------------------
// Schedule / configuration errors
// ---------------------------------------------------------------------------

/// A watering schedule or relay map failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConfigError {
    /// An event targets a relay that does not exist.
    OutOfRange { relay: u8, relay_count: u8 },
    /// `start_time` does not encode a valid `hh*100 + mm` time of day.
    InvalidTime { start_time: u16 },
    /// Duration is zero or longer than a day.
    InvalidDuration { duration_minutes: u16 },
    /// Two watering windows intersect (indices into the submitted list).
    Overlap { first: usize, second: usize },
    /// More events than the table can hold.
    TooManyEvents { count: usize, max: usize },
    /// More relays than the bank can hold.
    TooManyRelays { count: usize, max: usize },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfRange { relay, relay_count } => {
                write!(f, "relay {relay} out of range (have {relay_count})")
            }
            Self::InvalidTime { start_time } => write!(f, "invalid start time {start_time:04}"),
            Self::InvalidDuration { duration_minutes } => {
                write!(f, "invalid duration {duration_minutes} min")
            }
            Self::Overlap { first, second } => {
                write!(f, "events #{first} and #{second} overlap")
            }
            Self::TooManyEvents { count, max } => write!(f, "{count} events (max {max})"),
            Self::TooManyRelays { count, max } => write!(f, "{count} relays (max {max})"),
        }
    }
}

// ---------------------------------------------------------------------------
// Relay arming errors
// ---------------------------------------------------------------------------

/// Why a relay could not be armed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ArmError {
    /// The relay is already energised and the caller did not override.
    AlreadyActive { relay: u8 },
    /// Exclusive mode: another relay is currently energised.
    Busy { relay: u8, active: u8 },
    /// No such relay.
    OutOfRange { relay: u8 },
}

impl fmt::Display for ArmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyActive { relay } => write!(f, "relay {relay} already active"),
            Self::Busy { relay, active } => {
                write!(f, "relay {relay} refused, relay {active} is running")
            }
            Self::OutOfRange { relay } => write!(f, "relay {relay} does not exist"),
        }
    }
}

// ---------------------------------------------------------------------------
// Command errors
// ---------------------------------------------------------------------------

/// A command was refused.  The engine state is unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "error", rename_all = "snake_case")]
pub enum CommandError {
    /// Malformed or unsupported payload.
    UnknownCommand,
    /// The relay could not be armed.
    Arm(ArmError),
    /// A replacement schedule failed validation.
    Config(ConfigError),
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownCommand => write!(f, "unknown command"),
            Self::Arm(e) => write!(f, "arm: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
        }
    }
}

impl From<ArmError> for CommandError {
    fn from(e: ArmError) -> Self {
        Self::Arm(e)
    }
}

impl From<ConfigError> for CommandError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Relay output errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayError {
    /// GPIO set failed.
    GpioWriteFailed { relay: u8 },
    /// The relay index has no output attached.
    NoSuchOutput { relay: u8 },
}

impl fmt::Display for RelayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GpioWriteFailed { relay } => write!(f, "GPIO write failed on relay {relay}"),
            Self::NoSuchOutput { relay } => write!(f, "no output for relay {relay}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Health flags
// ---------------------------------------------------------------------------

/// Conditions surfaced in every status report so a stuck relay or a
/// rejected command is visible remotely.  Accumulated in a bitmask by the
/// engine; transient flags are cleared after each periodic publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum HealthFlag {
    /// A scheduled or manual arm request was dropped.
    ArmConflict = 0b0000_0001,
    /// An inbound command was rejected.
    CommandRejected = 0b0000_0010,
    /// A relay output write failed and is being retried.
    OutputWriteFailed = 0b0000_0100,
    /// No wall-clock time yet; the schedule is not being evaluated.
    ClockUnsynced = 0b0000_1000,
    /// The stored schedule failed validation at boot.
    ScheduleInvalid = 0b0001_0000,
}

impl HealthFlag {
    /// Return the bitmask for this flag.
    pub const fn mask(self) -> u8 {
        self as u8
    }

    /// Flags that describe a lasting condition rather than a one-off event.
    pub const STICKY: u8 = Self::ClockUnsynced.mask() | Self::ScheduleInvalid.mask();
}

impl fmt::Display for HealthFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ArmConflict => write!(f, "arm conflict"),
            Self::CommandRejected => write!(f, "command rejected"),
            Self::OutputWriteFailed => write!(f, "output write failed"),
            Self::ClockUnsynced => write!(f, "clock unsynced"),
            Self::ScheduleInvalid => write!(f, "schedule invalid"),
        }
    }
}
