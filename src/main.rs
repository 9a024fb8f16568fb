//! Garden watering firmware, main entry point.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  RelayOutputs    LogEventSink   NvsAdapter     SystemClock     │
//! │  (RelayPort)     (EventSink)    (ConfigPort)   (ClockPort)     │
//! │  console thread ──▶ INBOX                                      │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │  CommandGateway ──▶ ActuationEngine (pure logic)       │    │
//! │  │                     ScheduleTable · RelayBank          │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use std::io::BufRead;
use std::time::Duration;

use anyhow::{Result, anyhow};
use esp_idf_hal::gpio::{AnyOutputPin, PinDriver};
use log::{info, warn};

use gardenwater::adapters::hardware::RelayOutputs;
use gardenwater::adapters::log_sink::LogEventSink;
use gardenwater::adapters::nvs::NvsAdapter;
use gardenwater::adapters::time::{DEFAULT_TZ, SystemClock};
use gardenwater::app::events::AppEvent;
use gardenwater::app::gateway::CommandGateway;
use gardenwater::app::ports::{ClockPort, EventSink};
use gardenwater::app::service::ActuationEngine;
use gardenwater::drivers::watchdog::Watchdog;
use gardenwater::inbox::INBOX;

const WATCHDOG_TIMEOUT_MS: u32 = 10_000;

// ── Console messenger ─────────────────────────────────────────
//
// One JSON command per line on the serial console.  A network messenger
// would push into the same inbox.

fn console_messenger() {
    let stdin = std::io::stdin();
    let mut line = String::new();
    loop {
        line.clear();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => std::thread::sleep(Duration::from_millis(100)),
            Ok(_) => {
                let payload = line.trim();
                if !payload.is_empty() {
                    // A full inbox is logged by the inbox itself.
                    let _ = INBOX.push(payload.as_bytes());
                }
            }
            // VFS stdin is non-blocking; WouldBlock lands here.
            Err(_) => std::thread::sleep(Duration::from_millis(100)),
        }
    }
}

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_sys::link_patches();
    esp_idf_logger::init()?;

    info!("Garden watering v{}", env!("CARGO_PKG_VERSION"));

    let watchdog = Watchdog::new(WATCHDOG_TIMEOUT_MS);

    // ── 2. Load config from NVS (or defaults) ─────────────────
    let nvs = NvsAdapter::new().map_err(|e| anyhow!("NVS init failed: {}", e))?;
    // A refused schedule keeps the stored relay wiring and boots fail-safe.
    let (config, schedule_error) = nvs.load_for_boot();

    // ── 3. Relay outputs ──────────────────────────────────────
    let mut pins = Vec::with_capacity(config.relay_count());
    for &gpio in &config.relay_pins {
        // SAFETY: relay GPIOs come from the validated config and are
        // claimed by no other driver.
        let pin = unsafe { AnyOutputPin::new(i32::from(gpio)) };
        pins.push((gpio, PinDriver::output(pin)?));
    }
    let mut outputs = RelayOutputs::new(pins, config.relay_active_low);
    // A fresh output driver sits LOW, which energises an active-low board.
    outputs.all_off();

    // ── 4. Domain core ────────────────────────────────────────
    let mut sink = LogEventSink::new();
    let clock = SystemClock::new(DEFAULT_TZ);

    let boot = match schedule_error {
        Some(e) => Err(e),
        None => ActuationEngine::new(&config),
    };
    let mut engine = match boot {
        Ok(engine) => engine,
        Err(e) => ActuationEngine::fail_safe(&config, e)
            .map_err(|e| anyhow!("relay map invalid: {}", e))?,
    };
    engine.start(&mut sink);
    let mut gateway = CommandGateway::new(config.clone());

    std::thread::Builder::new()
        .name("console".into())
        .stack_size(6 * 1024)
        .spawn(console_messenger)?;

    info!("System ready. Entering control loop.");

    // ── 5. Control loop ───────────────────────────────────────
    let period = Duration::from_millis(u64::from(config.tick_interval_ms));
    let mut last_ms = clock.uptime_ms();

    loop {
        std::thread::sleep(period);

        let now_ms = clock.uptime_ms();
        let elapsed_ms = u32::try_from(now_ms.saturating_sub(last_ms)).unwrap_or(u32::MAX);
        last_ms = now_ms;

        // Commands run to completion between ticks.
        INBOX.drain(|payload| {
            let response = gateway.handle_payload(payload, &mut engine, &nvs, &mut sink);
            match serde_json::to_string(&response) {
                Ok(json) => info!("REPLY | {}", json),
                Err(e) => warn!("REPLY | encode failed: {}", e),
            }
        });

        engine.tick(clock.time_of_day(), elapsed_ms, &mut outputs, &mut sink);

        if let Some(report) = gateway.poll_status(elapsed_ms, &mut engine) {
            sink.emit(&AppEvent::Status(report));
        }

        watchdog.feed();
    }
}
