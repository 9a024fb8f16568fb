//! Watering schedule: time-of-day arithmetic and the validated event table.
//!
//! Events are declared as `(relay, hh*100 + mm, minutes)` triples.  Each
//! event occupies a window on the 24-hour circle:
//!
//! ```text
//!   00:00                         18:00  18:10 18:11        18:31      23:59
//!     │─────────────────────────────[ r0 )────[  r1  )──────────────────│
//! ```
//!
//! At most one relay may run at a time, so the table rejects any two
//! windows that intersect, whether they target the same relay or not.
//! A window that crosses midnight wraps around to the start of the day.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::relays::MAX_RELAYS;

/// Maximum number of watering events (stack-allocated).
pub const MAX_EVENTS: usize = 16;

/// Minutes in a day.
pub const MINUTES_PER_DAY: u16 = 24 * 60;

// ═══════════════════════════════════════════════════════════════
//  TimeOfDay
// ═══════════════════════════════════════════════════════════════

/// Wall-clock time at minute resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct TimeOfDay {
    hour: u8,
    minute: u8,
}

impl TimeOfDay {
    pub const MIDNIGHT: Self = Self { hour: 0, minute: 0 };

    pub const fn new(hour: u8, minute: u8) -> Option<Self> {
        if hour > 23 || minute > 59 {
            return None;
        }
        Some(Self { hour, minute })
    }

    /// Decode the `hh*100 + mm` form used in the event table.
    pub const fn from_hhmm(hhmm: u16) -> Option<Self> {
        let hour = hhmm / 100;
        let minute = hhmm % 100;
        if hour > 23 || minute > 59 {
            return None;
        }
        Some(Self {
            hour: hour as u8,
            minute: minute as u8,
        })
    }

    pub const fn to_hhmm(self) -> u16 {
        self.hour as u16 * 100 + self.minute as u16
    }

    pub const fn hour(self) -> u8 {
        self.hour
    }

    pub const fn minute(self) -> u8 {
        self.minute
    }

    /// Minutes since midnight (0–1439).
    pub const fn minute_of_day(self) -> u16 {
        self.hour as u16 * 60 + self.minute as u16
    }

    /// Inverse of [`minute_of_day`](Self::minute_of_day); wraps past midnight.
    pub const fn from_minute_of_day(minutes: u16) -> Self {
        let m = minutes % MINUTES_PER_DAY;
        Self {
            hour: (m / 60) as u8,
            minute: (m % 60) as u8,
        }
    }

    pub const fn add_minutes(self, minutes: u16) -> Self {
        Self::from_minute_of_day(self.minute_of_day() + minutes % MINUTES_PER_DAY)
    }

    /// Minutes from `earlier` forward to `self` around the clock (0–1439).
    pub const fn minutes_since(self, earlier: Self) -> u16 {
        (self.minute_of_day() + MINUTES_PER_DAY - earlier.minute_of_day()) % MINUTES_PER_DAY
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

// ═══════════════════════════════════════════════════════════════
//  WateringEvent
// ═══════════════════════════════════════════════════════════════

/// One scheduled watering: relay, start time, duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WateringEvent {
    /// Target relay (0-based).
    #[serde(rename = "relay")]
    pub relay_index: u8,
    /// Start time as `hh*100 + mm`.
    #[serde(rename = "start")]
    pub start_time: u16,
    /// Watering length in minutes.
    #[serde(rename = "minutes")]
    pub duration_minutes: u16,
}

impl WateringEvent {
    pub const fn new(relay_index: u8, start_time: u16, duration_minutes: u16) -> Self {
        Self {
            relay_index,
            start_time,
            duration_minutes,
        }
    }

    /// Decoded start time, `None` if `start_time` is malformed.
    pub const fn start(&self) -> Option<TimeOfDay> {
        TimeOfDay::from_hhmm(self.start_time)
    }

    /// Whether the two watering windows share at least one minute.
    ///
    /// Both events must have valid start times; invalid ones never overlap.
    pub fn overlaps(&self, other: &Self) -> bool {
        let (Some(a), Some(b)) = (self.start(), other.start()) else {
            return false;
        };
        b.minutes_since(a) < self.duration_minutes || a.minutes_since(b) < other.duration_minutes
    }

    fn validate(&self, relay_count: usize) -> Result<(), ConfigError> {
        if usize::from(self.relay_index) >= relay_count {
            return Err(ConfigError::OutOfRange {
                relay: self.relay_index,
                relay_count: relay_count as u8,
            });
        }
        if self.start().is_none() {
            return Err(ConfigError::InvalidTime {
                start_time: self.start_time,
            });
        }
        if self.duration_minutes == 0 || self.duration_minutes > MINUTES_PER_DAY {
            return Err(ConfigError::InvalidDuration {
                duration_minutes: self.duration_minutes,
            });
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════
//  ScheduleTable
// ═══════════════════════════════════════════════════════════════

/// A validated set of watering events, kept in time order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScheduleTable {
    /// Sorted by start minute, then relay index.
    events: heapless::Vec<WateringEvent, MAX_EVENTS>,
}

impl ScheduleTable {
    /// An empty table.  Nothing is ever due.
    pub const fn empty() -> Self {
        Self {
            events: heapless::Vec::new(),
        }
    }

    /// Validate `events` against `relay_count` and build the table.
    ///
    /// Declaration order does not matter.  Errors report the first
    /// offending event (or pair) in declaration order.
    pub fn load(events: &[WateringEvent], relay_count: usize) -> Result<Self, ConfigError> {
        if relay_count > MAX_RELAYS {
            return Err(ConfigError::TooManyRelays {
                count: relay_count,
                max: MAX_RELAYS,
            });
        }
        let mut sorted: heapless::Vec<WateringEvent, MAX_EVENTS> =
            heapless::Vec::from_slice(events).map_err(|()| ConfigError::TooManyEvents {
                count: events.len(),
                max: MAX_EVENTS,
            })?;

        for event in events {
            event.validate(relay_count)?;
        }

        for (i, a) in events.iter().enumerate() {
            for (j, b) in events.iter().enumerate().skip(i + 1) {
                if a.overlaps(b) {
                    return Err(ConfigError::Overlap {
                        first: i,
                        second: j,
                    });
                }
            }
        }

        sorted.sort_unstable_by_key(|e| (e.start().map_or(0, TimeOfDay::minute_of_day), e.relay_index));

        Ok(Self { events: sorted })
    }

    /// Events starting exactly at `now` (minute resolution), in ascending
    /// relay order.  Recomputed on every call.
    pub fn events_due_at(&self, now: TimeOfDay) -> impl Iterator<Item = WateringEvent> + '_ {
        self.events
            .iter()
            .filter(move |e| e.start() == Some(now))
            .copied()
    }

    /// The next event to start strictly after `now`, wrapping past midnight.
    pub fn next_after(&self, now: TimeOfDay) -> Option<&WateringEvent> {
        self.events.iter().min_by_key(|e| {
            let delta = e.start().map_or(MINUTES_PER_DAY, |s| s.minutes_since(now));
            if delta == 0 { MINUTES_PER_DAY } else { delta }
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &WateringEvent> {
        self.events.iter()
    }

    pub fn as_slice(&self) -> &[WateringEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

// ═══════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════
