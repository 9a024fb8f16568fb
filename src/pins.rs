//! GPIO assignments for the watering controller board.
//!
//! Single source of truth for the factory relay map, read by
//! [`SystemConfig::default`](crate::config::SystemConfig).  A stored config may override it.

// ---------------------------------------------------------------------------
// Relay outputs (5-channel relay board, one valve or pump per channel)
// ---------------------------------------------------------------------------

/// Number of relay channels fitted on the board.
pub const RELAY_COUNT: usize = 5;

/// Relay channel → GPIO.  Index is the relay number used by the schedule.
pub const RELAY_GPIOS: [u8; RELAY_COUNT] = [16, 14, 12, 13, 0];

/// Most relay boards energise the coil when the input is pulled LOW.
/// Ours is driven through NPN transistors, so HIGH = energised.
pub const RELAY_ACTIVE_LOW: bool = false;
