//! Mock adapters for integration tests.
//!
//! Records every relay write so tests can assert on the full output
//! history without touching real GPIO registers, and wires the engine,
//! gateway, and mocks into a [`Rig`] driven by a fake clock.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

use gardenwater::app::events::{AppEvent, StatusReport};
use gardenwater::app::gateway::{CommandGateway, Response};
use gardenwater::app::ports::{ClockPort, ConfigPort, ConfigStoreError, EventSink, RelayPort};
use gardenwater::app::service::ActuationEngine;
use gardenwater::config::SystemConfig;
use gardenwater::error::RelayError;
use gardenwater::relays::Level;
use gardenwater::schedule::TimeOfDay;

// ── MockRelays ────────────────────────────────────────────────

#[derive(Default)]
pub struct MockRelays {
    /// Successful writes, in order.
    pub writes: Vec<(u8, Level)>,
    /// Relays whose next N writes fail.
    failures: VecDeque<u8>,
    pub failed_attempts: u32,
}

#[allow(dead_code)]
impl MockRelays {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next write to `relay` fail, once per call.
    pub fn fail_next(&mut self, relay: u8) {
        self.failures.push_back(relay);
    }

    pub fn writes_for(&self, relay: u8) -> Vec<Level> {
        self.writes
            .iter()
            .filter(|(r, _)| *r == relay)
            .map(|(_, level)| *level)
            .collect()
    }

    /// Last level driven on `relay` (Off if never written).
    pub fn level(&self, relay: u8) -> Level {
        self.writes_for(relay).last().copied().unwrap_or(Level::Off)
    }
}

impl RelayPort for MockRelays {
    fn write(&mut self, relay: u8, level: Level) -> Result<(), RelayError> {
        if let Some(pos) = self.failures.iter().position(|r| *r == relay) {
            self.failures.remove(pos);
            self.failed_attempts += 1;
            return Err(RelayError::GpioWriteFailed { relay });
        }
        self.writes.push((relay, level));
        Ok(())
    }
}

// ── MockNvs ───────────────────────────────────────────────────

#[derive(Default)]
pub struct MockNvs {
    stored: RefCell<Option<SystemConfig>>,
    pub saves: Cell<u32>,
    pub fail_writes: Cell<bool>,
}

#[allow(dead_code)]
impl MockNvs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stored(&self) -> Option<SystemConfig> {
        self.stored.borrow().clone()
    }
}

impl ConfigPort for MockNvs {
    fn load(&self) -> Result<SystemConfig, ConfigStoreError> {
        self.stored.borrow().clone().ok_or(ConfigStoreError::NotFound)
    }

    fn save(&self, config: &SystemConfig) -> Result<(), ConfigStoreError> {
        if self.fail_writes.get() {
            return Err(ConfigStoreError::IoError);
        }
        self.saves.set(self.saves.get() + 1);
        *self.stored.borrow_mut() = Some(config.clone());
        Ok(())
    }
}

// ── RecordingSink ─────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

// ── FakeClock ─────────────────────────────────────────────────

/// Wall clock that starts at `base` and advances with uptime.
pub struct FakeClock {
    base: TimeOfDay,
    uptime_ms: u64,
    pub synced: bool,
}

#[allow(dead_code)]
impl FakeClock {
    pub fn at(hhmm: u16) -> Self {
        Self {
            base: TimeOfDay::from_hhmm(hhmm).expect("valid hhmm"),
            uptime_ms: 0,
            synced: true,
        }
    }

    pub fn advance(&mut self, ms: u32) {
        self.uptime_ms += u64::from(ms);
    }

    /// Step the wall clock without moving uptime (NTP correction).
    pub fn jump_to(&mut self, hhmm: u16) {
        let minute = (self.uptime_ms / 60_000) % 1440;
        let target = TimeOfDay::from_hhmm(hhmm).expect("valid hhmm");
        self.base = target.add_minutes(1440 - minute as u16);
    }
}

impl ClockPort for FakeClock {
    fn time_of_day(&self) -> Option<TimeOfDay> {
        if !self.synced {
            return None;
        }
        let minutes = (self.uptime_ms / 60_000) % 1440;
        Some(self.base.add_minutes(minutes as u16))
    }

    fn uptime_ms(&self) -> u64 {
        self.uptime_ms
    }
}

// ── Rig ───────────────────────────────────────────────────────

/// Everything the control loop owns, minus the hardware.
pub struct Rig {
    pub engine: ActuationEngine,
    pub gateway: CommandGateway,
    pub relays: MockRelays,
    pub nvs: MockNvs,
    pub sink: RecordingSink,
    pub clock: FakeClock,
    pub published: Vec<StatusReport>,
}

#[allow(dead_code)]
impl Rig {
    pub fn new(config: SystemConfig, hhmm: u16) -> Self {
        let mut sink = RecordingSink::new();
        let mut engine = ActuationEngine::new(&config).expect("valid config");
        engine.start(&mut sink);
        Self {
            engine,
            gateway: CommandGateway::new(config),
            relays: MockRelays::new(),
            nvs: MockNvs::new(),
            sink,
            clock: FakeClock::at(hhmm),
            published: Vec::new(),
        }
    }

    /// One control-loop iteration after `ms` of wall time.
    pub fn step(&mut self, ms: u32) {
        self.clock.advance(ms);
        self.engine.tick(
            self.clock.time_of_day(),
            ms,
            &mut self.relays,
            &mut self.sink,
        );
        if let Some(report) = self.gateway.poll_status(ms, &mut self.engine) {
            self.sink.emit(&AppEvent::Status(report.clone()));
            self.published.push(report);
        }
    }

    /// `n` one-second ticks.
    pub fn run_secs(&mut self, n: u32) {
        for _ in 0..n {
            self.step(1000);
        }
    }

    pub fn send(&mut self, payload: &str) -> Response {
        self.gateway.handle_payload(
            payload.as_bytes(),
            &mut self.engine,
            &self.nvs,
            &mut self.sink,
        )
    }
}
