//! Port traits, the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ ActuationEngine / CommandGateway (domain)
//! ```
//!
//! Driven adapters (relay outputs, clock, event sinks, config store) implement
//! these traits.  The engine consumes them via generics, so the domain core
//! never touches hardware directly.

use crate::config::SystemConfig;
use crate::error::RelayError;
use crate::relays::Level;
use crate::schedule::TimeOfDay;

// ───────────────────────────────────────────────────────────────
// Relay port (driven adapter: domain → hardware)
// ───────────────────────────────────────────────────────────────

/// Write-side port: the engine hands every pending relay write to this.
pub trait RelayPort {
    /// Drive `relay` to the logical `level`.
    fn write(&mut self, relay: u8, level: Level) -> Result<(), RelayError>;
}

// ───────────────────────────────────────────────────────────────
// Clock port (driven adapter: RTC / NTP → domain)
// ───────────────────────────────────────────────────────────────

/// Time source.  Timezone and NTP correctness are the adapter's problem.
pub trait ClockPort {
    /// Local wall-clock time, or `None` before the first NTP sync.
    fn time_of_day(&self) -> Option<TimeOfDay>;

    /// Monotonic milliseconds since boot.
    fn uptime_ms(&self) -> u64;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / messenger)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Adapters decide where they go (serial log, MQTT
/// status topic, etc.).
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists system configuration.
///
/// Implementations MUST validate before persisting: a schedule that
/// would be refused at boot must never reach flash.
pub trait ConfigPort {
    /// Load configuration from persistent storage.
    /// Returns [`ConfigStoreError::NotFound`] on first boot.
    fn load(&self) -> Result<SystemConfig, ConfigStoreError>;

    /// Validate and persist configuration.
    fn save(&self, config: &SystemConfig) -> Result<(), ConfigStoreError>;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigStoreError {
    /// No config found in storage (first boot).
    NotFound,
    /// Stored config failed integrity / deserialization check.
    Corrupted,
    /// The relay map or schedule failed validation.
    ValidationFailed(crate::error::ConfigError),
    /// A timing or policy field is out of range.
    InvalidSetting(&'static str),
    /// Underlying storage is full.
    StorageFull,
    /// Generic I/O error from the storage backend.
    IoError,
}

/// Errors from the raw key-value backend under a [`ConfigPort`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Requested key does not exist.
    NotFound,
    /// Storage partition is full.
    Full,
    /// Generic I/O error.
    IoError,
}

impl core::fmt::Display for ConfigStoreError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "config not found"),
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(e) => write!(f, "validation failed: {}", e),
            Self::InvalidSetting(what) => write!(f, "invalid setting: {}", what),
            Self::StorageFull => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl core::fmt::Display for StorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "key not found"),
            Self::Full => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl From<StorageError> for ConfigStoreError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound => Self::NotFound,
            StorageError::Full => Self::StorageFull,
            StorageError::IoError => Self::IoError,
        }
    }
}

impl From<crate::error::ConfigError> for ConfigStoreError {
    fn from(e: crate::error::ConfigError) -> Self {
        Self::ValidationFailed(e)
    }
}
