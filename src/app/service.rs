//! Actuation engine, the hexagonal core.
//!
//! [`ActuationEngine`] owns the schedule, the relay bank, and the mode
//! flags.  All I/O flows through port traits passed in at call sites, so
//! the engine is testable with mock adapters.
//!
//! ```text
//!   ClockPort ──▶ ┌──────────────────────────┐ ──▶ EventSink
//!                 │     ActuationEngine      │
//!   RelayPort ◀── │  ScheduleTable · Relays  │ ◀── CommandGateway
//!                 └──────────────────────────┘
//! ```
//!
//! ## Tick
//!
//! 1. If the schedule is live, every minute between the last evaluated
//!    minute and `now` is checked once for due events (bounded catch-up),
//!    and each due event arms its relay.  Conflicts are logged and dropped.
//! 2. The relay bank counts down by the measured `elapsed_ms`.  Relays
//!    the schedule armed in step 1 are skipped: a late event is already
//!    shortened by its lateness, so the stall must not count twice.
//! 3. Pending writes are applied through the [`RelayPort`]; failures are
//!    re-queued for the next tick.
//!
//! ## Mode
//!
//! `ManualOverride` is entered by a manual run.  With `auto_resume` the
//! schedule keeps running alongside (first writer wins on a shared relay)
//! and the engine drops back to `Auto` when every manual relay is idle.
//! Without it, the schedule pauses until `SetAuto(true)`.

use log::{error, info, warn};
use serde::Serialize;

use crate::config::SystemConfig;
use crate::error::{ArmError, CommandError, ConfigError, HealthFlag};
use crate::relays::{ArmMode, RelayBank, RelayPhase};
use crate::schedule::{MAX_EVENTS, MINUTES_PER_DAY, ScheduleTable, TimeOfDay, WateringEvent};

use super::events::{AppEvent, ArmSource, StatusReport};
use super::ports::{EventSink, RelayPort};

/// Global operating mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Auto,
    ManualOverride,
}

// ───────────────────────────────────────────────────────────────
// ActuationEngine
// ───────────────────────────────────────────────────────────────

pub struct ActuationEngine {
    schedule: ScheduleTable,
    relays: RelayBank,
    /// AutoModeFlag: whether the schedule is consulted at all.
    auto: bool,
    mode: Mode,
    /// Bit per relay started by a manual run and not yet idle.
    manual_mask: u8,
    auto_resume: bool,
    max_catch_up_minutes: u16,
    /// Last minute the schedule was evaluated for.
    cursor: Option<TimeOfDay>,
    /// Wall-clock time seen on the last tick.
    now: Option<TimeOfDay>,
    /// Schedule rejected at boot; AUTO stays refused until a valid
    /// `Reconfigure` arrives.
    boot_error: Option<ConfigError>,
    health: u8,
    tick_count: u64,
}

impl ActuationEngine {
    /// Build the engine from configuration.
    ///
    /// An invalid schedule is fatal: the caller must not start it.  See
    /// [`fail_safe`](Self::fail_safe) for the degraded boot path.
    pub fn new(config: &SystemConfig) -> Result<Self, ConfigError> {
        let relays = RelayBank::new(&config.relay_pins, config.exclusive_relays)?;
        let schedule = ScheduleTable::load(&config.events, relays.len())?;
        Ok(Self::assemble(config, schedule, relays, None))
    }

    /// Boot with an empty schedule and AUTO refused, after `error` was
    /// raised by [`new`](Self::new).  Manual runs and `Reconfigure` still work.
    pub fn fail_safe(config: &SystemConfig, error: ConfigError) -> Result<Self, ConfigError> {
        let relays = RelayBank::new(&config.relay_pins, config.exclusive_relays)?;
        let mut engine = Self::assemble(config, ScheduleTable::empty(), relays, Some(error));
        engine.auto = false;
        engine.raise(HealthFlag::ScheduleInvalid);
        Ok(engine)
    }

    fn assemble(
        config: &SystemConfig,
        schedule: ScheduleTable,
        relays: RelayBank,
        boot_error: Option<ConfigError>,
    ) -> Self {
        Self {
            schedule,
            relays,
            auto: config.auto_enabled,
            mode: Mode::Auto,
            manual_mask: 0,
            auto_resume: config.auto_resume,
            max_catch_up_minutes: config.max_catch_up_minutes,
            cursor: None,
            now: None,
            boot_error,
            health: 0,
            tick_count: 0,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    pub fn start(&mut self, sink: &mut impl EventSink) {
        sink.emit(&AppEvent::Started {
            auto: self.auto,
            events: self.schedule.len(),
        });
        match self.boot_error {
            Some(e) => error!("Engine: started WITHOUT schedule ({}), AUTO refused", e),
            None => info!(
                "Engine: started with {} events, {} relays, auto={}",
                self.schedule.len(),
                self.relays.len(),
                self.auto
            ),
        }
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Run one control cycle: schedule → countdown → output writes.
    ///
    /// `elapsed_ms` is the measured time since the previous tick; the
    /// engine never assumes a fixed tick period.
    pub fn tick(
        &mut self,
        now: Option<TimeOfDay>,
        elapsed_ms: u32,
        outputs: &mut impl RelayPort,
        sink: &mut impl EventSink,
    ) {
        self.tick_count += 1;
        self.now = now;
        let mut fresh = 0;

        // 1. Schedule
        match now {
            Some(now) => {
                if self.health & HealthFlag::ClockUnsynced.mask() != 0 {
                    info!("Engine: wall clock available ({})", now);
                    self.health &= !HealthFlag::ClockUnsynced.mask();
                }
                if self.schedule_live() {
                    fresh = self.run_schedule(now, sink);
                } else {
                    self.cursor = Some(now);
                }
            }
            None => {
                if self.health & HealthFlag::ClockUnsynced.mask() == 0 {
                    warn!("Engine: no wall clock, schedule suspended");
                    self.raise(HealthFlag::ClockUnsynced);
                }
            }
        }

        // 2. Countdown
        self.relays.tick_except(elapsed_ms, fresh);

        // 3. Hardware
        self.apply(outputs, sink);

        // 4. Manual relays that finished hand control back
        self.retire_manual(sink);
    }

    fn schedule_live(&self) -> bool {
        self.auto && (self.mode == Mode::Auto || self.auto_resume)
    }

    /// Evaluate every minute in `(cursor, now]`, oldest first.  Returns
    /// the bitmask of relays armed.
    fn run_schedule(&mut self, now: TimeOfDay, sink: &mut impl EventSink) -> u8 {
        let gap = match self.cursor.replace(now) {
            // First evaluation after boot or resync: current minute only.
            None => 1,
            Some(prev) => now.minutes_since(prev),
        };
        if gap == 0 {
            return 0;
        }
        if gap > MINUTES_PER_DAY / 2 {
            warn!("Schedule: clock stepped back to {}, cursor reset", now);
            return 0;
        }

        let window = gap.min(self.max_catch_up_minutes + 1);
        if window < gap {
            warn!(
                "Schedule: {} minutes skipped, replaying the last {}",
                gap - 1,
                window - 1
            );
        }

        let mut armed = 0;
        for lateness in (0..window).rev() {
            let minute = now.add_minutes(MINUTES_PER_DAY - lateness);
            let due: heapless::Vec<WateringEvent, MAX_EVENTS> =
                self.schedule.events_due_at(minute).collect();
            for event in due {
                if self.arm_scheduled(event, lateness, sink) {
                    armed |= 1 << event.relay_index;
                }
            }
        }
        armed
    }

    fn arm_scheduled(&mut self, event: WateringEvent, lateness: u16, sink: &mut impl EventSink) -> bool {
        if lateness >= event.duration_minutes {
            warn!(
                "Schedule: relay {} at {:04} missed entirely",
                event.relay_index, event.start_time
            );
            return false;
        }
        let minutes = event.duration_minutes - lateness;
        if lateness > 0 {
            warn!(
                "Schedule: relay {} at {:04} started {} min late",
                event.relay_index, event.start_time, lateness
            );
        }

        match self.relays.arm(event.relay_index, minutes, ArmMode::Normal) {
            Ok(()) => {
                info!(
                    "Schedule: relay {} on at {:04} for {} min",
                    event.relay_index, event.start_time, minutes
                );
                true
            }
            Err(e) => {
                self.reject_arm(ArmSource::Schedule, event.relay_index, e, sink);
                false
            }
        }
    }

    fn reject_arm(&mut self, source: ArmSource, relay: u8, e: ArmError, sink: &mut impl EventSink) {
        warn!("Engine: {:?} arm of relay {} dropped: {}", source, relay, e);
        self.raise(HealthFlag::ArmConflict);
        sink.emit(&AppEvent::ArmRejected {
            source,
            relay,
            error: e,
        });
    }

    /// Hand every pending write to the output port.
    fn apply(&mut self, outputs: &mut impl RelayPort, sink: &mut impl EventSink) {
        for write in self.relays.apply_pending_writes() {
            match outputs.write(write.relay, write.level) {
                Ok(()) => sink.emit(&AppEvent::RelaySwitched {
                    relay: write.relay,
                    level: write.level,
                }),
                Err(e) => {
                    error!("Engine: {}, will retry", e);
                    self.raise(HealthFlag::OutputWriteFailed);
                    self.relays.requeue(write);
                    sink.emit(&AppEvent::OutputFault(e));
                }
            }
        }
    }

    fn retire_manual(&mut self, sink: &mut impl EventSink) {
        for relay in 0..self.relays.len() as u8 {
            let bit = 1u8 << relay;
            if self.manual_mask & bit != 0
                && self.relays.get(relay).map(|r| r.phase()) == Some(RelayPhase::Idle)
            {
                self.manual_mask &= !bit;
                info!("Engine: manual run on relay {} finished", relay);
            }
        }
        if self.mode == Mode::ManualOverride && self.manual_mask == 0 && self.auto_resume {
            self.set_mode(Mode::Auto, sink);
        }
    }

    fn set_mode(&mut self, to: Mode, sink: &mut impl EventSink) {
        if self.mode == to {
            return;
        }
        let from = self.mode;
        self.mode = to;
        info!("Engine: mode {:?} -> {:?}", from, to);
        sink.emit(&AppEvent::ModeChanged { from, to });
    }

    // ── Commands ──────────────────────────────────────────────

    /// Toggle the AutoModeFlag.  Enabling also ends a manual override.
    pub fn set_auto(&mut self, enabled: bool, sink: &mut impl EventSink) -> Result<(), CommandError> {
        if enabled {
            if let Some(e) = self.boot_error {
                return Err(CommandError::Config(e));
            }
        }
        if self.auto != enabled {
            self.auto = enabled;
            info!("Engine: auto {}", if enabled { "enabled" } else { "disabled" });
            sink.emit(&AppEvent::AutoChanged(enabled));
        }
        if enabled {
            self.manual_mask = 0;
            self.set_mode(Mode::Auto, sink);
        }
        Ok(())
    }

    /// Force `relay` on for `minutes`, bypassing the schedule.  Zero
    /// minutes cancels the relay whoever started it.
    pub fn manual_run(
        &mut self,
        relay: u8,
        minutes: u16,
        sink: &mut impl EventSink,
    ) -> Result<(), CommandError> {
        let mode = if minutes == 0 {
            ArmMode::Override
        } else {
            ArmMode::Normal
        };
        if let Err(e) = self.relays.arm(relay, minutes, mode) {
            self.reject_arm(ArmSource::Manual, relay, e, sink);
            return Err(e.into());
        }
        if minutes > 0 {
            self.manual_mask |= 1 << relay;
            self.set_mode(Mode::ManualOverride, sink);
        }
        Ok(())
    }

    /// Stop every relay.  Writes go out on the next tick.
    pub fn stop_all(&mut self) {
        warn!("Engine: stop all relays");
        self.relays.all_off();
    }

    /// Validate and swap in a new watering table.  The current table stays
    /// in force if validation fails.
    pub fn reconfigure(
        &mut self,
        events: &[WateringEvent],
        sink: &mut impl EventSink,
    ) -> Result<(), CommandError> {
        let table = ScheduleTable::load(events, self.relays.len())?;
        self.schedule = table;
        if self.boot_error.take().is_some() {
            self.health &= !HealthFlag::ScheduleInvalid.mask();
            info!("Engine: valid schedule installed, AUTO may be enabled");
        }
        info!("Engine: schedule replaced ({} events)", self.schedule.len());
        sink.emit(&AppEvent::ScheduleReplaced {
            events: self.schedule.len(),
        });
        Ok(())
    }

    // ── Health ────────────────────────────────────────────────

    pub fn raise(&mut self, flag: HealthFlag) {
        self.health |= flag.mask();
    }

    /// Drop one-off flags after they have been reported.
    pub fn clear_transient_health(&mut self) {
        self.health &= HealthFlag::STICKY;
    }

    // ── Queries ───────────────────────────────────────────────

    /// Snapshot of the last committed tick.
    pub fn status(&self) -> StatusReport {
        StatusReport {
            auto: self.auto,
            mode: self.mode,
            time: self.now,
            relays: self.relays.snapshot(),
            next_event: self
                .now
                .and_then(|now| self.schedule.next_after(now))
                .copied(),
            health: self.health,
            tick_count: self.tick_count,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn auto_enabled(&self) -> bool {
        self.auto
    }

    pub fn relays(&self) -> &RelayBank {
        &self.relays
    }

    pub fn schedule(&self) -> &ScheduleTable {
        &self.schedule
    }

    pub fn health(&self) -> u8 {
        self.health
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }
}
