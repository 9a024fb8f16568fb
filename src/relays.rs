//! Relay bank: per-channel timing state and the pending-write queue.
//!
//! The bank decides; it never touches hardware.  Every transition sets an
//! edge flag, and [`RelayBank::apply_pending_writes`] turns the flags into
//! a list of output writes exactly once:
//!
//! ```text
//!            arm()                 apply()             tick() expires
//!   Idle ───────────▶ PendingStart ───────▶ Active ────────────────▶ PendingStop
//!    ▲                                                                    │
//!    └──────────────────────────── apply() ───────────────────────────────┘
//! ```
//!
//! The engine hands the writes to a [`RelayPort`](crate::app::ports::RelayPort);
//! a failed write is pushed back with [`RelayBank::requeue`] and retried on
//! the next tick without recomputing any state.

use log::{info, warn};
use serde::Serialize;

use crate::error::{ArmError, ConfigError};

/// Maximum number of relay channels (stack-allocated).
pub const MAX_RELAYS: usize = 8;

pub const MS_PER_MINUTE: u32 = 60_000;

/// Logical relay level.  The output adapter maps it onto the electrical
/// level (active-high or active-low boards).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    Off,
    On,
}

/// One output write produced by [`RelayBank::apply_pending_writes`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingWrite {
    pub relay: u8,
    pub level: Level,
}

/// How [`RelayBank::arm`] treats a relay that is already running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArmMode {
    /// Refuse with [`ArmError::AlreadyActive`].
    Normal,
    /// Replace the remaining time; zero minutes stops the relay.
    Override,
}

/// Lifecycle position of a relay, derived from its flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RelayPhase {
    Idle,
    PendingStart,
    Active,
    PendingStop,
}

// ═══════════════════════════════════════════════════════════════
//  RelayState
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayState {
    pin: u8,
    active: bool,
    remaining_ms: u32,
    start_pending: bool,
    stop_pending: bool,
}

impl RelayState {
    /// Fresh relay.  The OFF write is pending so boot forces every output low.
    const fn new(pin: u8) -> Self {
        Self {
            pin,
            active: false,
            remaining_ms: 0,
            start_pending: false,
            stop_pending: true,
        }
    }

    pub fn pin(&self) -> u8 {
        self.pin
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn remaining_ms(&self) -> u32 {
        self.remaining_ms
    }

    pub fn start_pending(&self) -> bool {
        self.start_pending
    }

    pub fn stop_pending(&self) -> bool {
        self.stop_pending
    }

    pub fn phase(&self) -> RelayPhase {
        match (self.active, self.start_pending, self.stop_pending) {
            (true, true, _) => RelayPhase::PendingStart,
            (true, false, _) => RelayPhase::Active,
            (false, _, true) => RelayPhase::PendingStop,
            (false, _, false) => RelayPhase::Idle,
        }
    }

    fn stop(&mut self) {
        self.active = false;
        self.remaining_ms = 0;
        self.start_pending = false;
        self.stop_pending = true;
    }
}

/// Point-in-time view of one relay, for status reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RelaySnapshot {
    pub relay: u8,
    pub pin: u8,
    pub active: bool,
    pub remaining_ms: u32,
    pub phase: RelayPhase,
}

// ═══════════════════════════════════════════════════════════════
//  RelayBank
// ═══════════════════════════════════════════════════════════════

/// Fixed-size relay storage indexed by relay number.
#[derive(Debug, Clone)]
pub struct RelayBank {
    relays: heapless::Vec<RelayState, MAX_RELAYS>,
    /// At most one relay energised at a time.
    exclusive: bool,
}

impl RelayBank {
    /// Build the bank from the pin map.  Bounds are checked once, here.
    pub fn new(pins: &[u8], exclusive: bool) -> Result<Self, ConfigError> {
        let mut relays = heapless::Vec::new();
        for &pin in pins {
            relays
                .push(RelayState::new(pin))
                .map_err(|_| ConfigError::TooManyRelays {
                    count: pins.len(),
                    max: MAX_RELAYS,
                })?;
        }
        Ok(Self { relays, exclusive })
    }

    pub fn len(&self) -> usize {
        self.relays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.relays.is_empty()
    }

    pub fn get(&self, relay: u8) -> Option<&RelayState> {
        self.relays.get(usize::from(relay))
    }

    /// Lowest-numbered energised relay, if any.
    pub fn active_relay(&self) -> Option<u8> {
        self.relays.iter().position(|r| r.active).map(|i| i as u8)
    }

    pub fn any_active(&self) -> bool {
        self.relays.iter().any(|r| r.active)
    }

    /// Energise `relay` for `duration_minutes`.
    ///
    /// With [`ArmMode::Override`] an active relay is re-timed, and zero
    /// minutes moves it straight to pending-stop.  Zero minutes on an idle
    /// relay is a no-op.
    pub fn arm(&mut self, relay: u8, duration_minutes: u16, mode: ArmMode) -> Result<(), ArmError> {
        let idx = usize::from(relay);
        let exclusive = self.exclusive;
        let other_active = self
            .relays
            .iter()
            .enumerate()
            .find(|(i, r)| *i != idx && r.active)
            .map(|(i, _)| i as u8);

        let state = self
            .relays
            .get_mut(idx)
            .ok_or(ArmError::OutOfRange { relay })?;

        if state.active && mode == ArmMode::Normal {
            return Err(ArmError::AlreadyActive { relay });
        }

        if duration_minutes == 0 {
            if state.active {
                state.stop();
                info!("Relay {}: cancelled", relay);
            }
            return Ok(());
        }

        if exclusive {
            if let Some(active) = other_active {
                return Err(ArmError::Busy { relay, active });
            }
        }

        let was_active = state.active;
        state.active = true;
        state.remaining_ms = u32::from(duration_minutes) * MS_PER_MINUTE;
        // A re-timed relay that is already switched on needs no new write.
        state.start_pending = !was_active || state.start_pending;
        state.stop_pending = false;

        info!(
            "Relay {}: armed for {} min (GPIO {})",
            relay, duration_minutes, state.pin
        );
        Ok(())
    }

    /// Count down every active relay by `elapsed_ms`; expired relays move
    /// to pending-stop.
    pub fn tick(&mut self, elapsed_ms: u32) {
        self.tick_except(elapsed_ms, 0);
    }

    /// [`tick`](Self::tick), skipping relays whose bit is set in `fresh`.
    /// Their duration was armed from the present moment, so none of
    /// `elapsed_ms` belongs to them.
    pub fn tick_except(&mut self, elapsed_ms: u32, fresh: u8) {
        for (i, state) in self.relays.iter_mut().enumerate() {
            if !state.active || fresh & (1 << i) != 0 {
                continue;
            }
            state.remaining_ms = state.remaining_ms.saturating_sub(elapsed_ms);
            if state.remaining_ms == 0 {
                state.stop();
                info!("Relay {}: duration elapsed", i);
            }
        }
    }

    /// Stop every relay and queue an OFF write for each.
    pub fn all_off(&mut self) {
        for state in &mut self.relays {
            state.stop();
        }
    }

    /// Emit one write per flagged relay and clear the flags.
    ///
    /// Calling this twice without an intervening `arm` or `tick` returns
    /// nothing the second time.
    pub fn apply_pending_writes(&mut self) -> heapless::Vec<PendingWrite, MAX_RELAYS> {
        let mut writes = heapless::Vec::new();
        for (i, state) in self.relays.iter_mut().enumerate() {
            let level = if state.start_pending {
                Level::On
            } else if state.stop_pending {
                Level::Off
            } else {
                continue;
            };
            state.start_pending = false;
            state.stop_pending = false;
            // At most one write per relay; capacity equals relay count.
            let _ = writes.push(PendingWrite {
                relay: i as u8,
                level,
            });
        }
        writes
    }

    /// Re-flag a write that the hardware step failed to apply.
    ///
    /// Ignored if the relay has since moved on (a later transition already
    /// queued the level it needs).
    pub fn requeue(&mut self, write: PendingWrite) {
        let Some(state) = self.relays.get_mut(usize::from(write.relay)) else {
            return;
        };
        match write.level {
            Level::On if state.active => state.start_pending = true,
            Level::Off if !state.active => state.stop_pending = true,
            _ => warn!("Relay {}: stale {:?} retry dropped", write.relay, write.level),
        }
    }

    pub fn snapshot(&self) -> heapless::Vec<RelaySnapshot, MAX_RELAYS> {
        self.relays
            .iter()
            .enumerate()
            .map(|(i, r)| RelaySnapshot {
                relay: i as u8,
                pin: r.pin,
                active: r.active,
                remaining_ms: r.remaining_ms,
                phase: r.phase(),
            })
            .collect()
    }
}

// ═══════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════
