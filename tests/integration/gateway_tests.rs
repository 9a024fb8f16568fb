//! Integration tests for the Messenger → CommandGateway → ActuationEngine
//! path: wire decoding, rejection, persistence, and status reporting.

use gardenwater::app::events::AppEvent;
use gardenwater::app::gateway::Response;
use gardenwater::app::ports::ConfigPort;
use gardenwater::app::service::Mode;
use gardenwater::config::SystemConfig;
use gardenwater::error::{CommandError, ConfigError, HealthFlag};
use gardenwater::inbox::Inbox;
use gardenwater::relays::{Level, RelayPhase};
use gardenwater::schedule::WateringEvent;

use crate::mock_hw::Rig;

// ── Rejection ─────────────────────────────────────────────────

#[test]
fn malformed_payloads_change_nothing() {
    let mut rig = Rig::new(SystemConfig::default(), 1800);
    rig.step(1000);
    let before = rig.engine.status();

    for payload in ["", "{", r#"{"cmd":"flood"}"#, r#"{"cmd":"manual_run","relay":"two"}"#] {
        assert_eq!(
            rig.send(payload),
            Response::Rejected(CommandError::UnknownCommand)
        );
    }

    let after = rig.engine.status();
    assert_eq!(after.relays, before.relays);
    assert_eq!(after.mode, before.mode);
    assert_eq!(after.auto, before.auto);
    assert_ne!(after.health & HealthFlag::CommandRejected.mask(), 0);
    assert_eq!(rig.gateway.rejected_count(), 4);
    assert_eq!(
        rig.sink.count(|e| matches!(e, AppEvent::CommandRejected(_))),
        4
    );
}

#[test]
fn unknown_relay_is_rejected() {
    let mut rig = Rig::new(SystemConfig::default(), 1200);
    let response = rig.send(r#"{"cmd":"manual_run","relay":7,"minutes":5}"#);
    assert!(matches!(response, Response::Rejected(CommandError::Arm(_))));
    assert_eq!(rig.engine.mode(), Mode::Auto);
}

// ── Auto flag ─────────────────────────────────────────────────

#[test]
fn set_auto_false_skips_schedule_and_persists() {
    let mut rig = Rig::new(SystemConfig::default(), 1759);
    assert_eq!(rig.send(r#"{"cmd":"set_auto","enabled":false}"#), Response::Ack);
    rig.run_secs(120);

    assert_eq!(rig.relays.writes_for(0), [Level::Off]);
    assert_eq!(rig.nvs.stored().map(|c| c.auto_enabled), Some(false));
}

// ── Reconfigure ───────────────────────────────────────────────

#[test]
fn reconfigure_swaps_table_and_persists() {
    let mut rig = Rig::new(SystemConfig::default(), 629);
    let response = rig.send(
        r#"{"cmd":"reconfigure","events":[{"relay":3,"start":630,"minutes":2}]}"#,
    );
    assert_eq!(response, Response::Ack);
    assert_eq!(rig.engine.schedule().as_slice(), &[WateringEvent::new(3, 630, 2)]);

    let stored = rig.nvs.load().unwrap();
    assert_eq!(stored.events.as_slice(), &[WateringEvent::new(3, 630, 2)]);
    assert_eq!(rig.nvs.saves.get(), 1);

    rig.run_secs(61);
    assert_eq!(rig.relays.level(3), Level::On);
}

#[test]
fn overlapping_reconfigure_keeps_old_table() {
    let mut rig = Rig::new(SystemConfig::default(), 1200);
    let response = rig.send(
        r#"{"cmd":"reconfigure","events":[
            {"relay":0,"start":1800,"minutes":10},
            {"relay":0,"start":1805,"minutes":5}]}"#,
    );
    assert_eq!(
        response,
        Response::Rejected(CommandError::Config(ConfigError::Overlap { first: 0, second: 1 }))
    );
    assert_eq!(rig.engine.schedule().len(), 4);
    assert_eq!(rig.nvs.saves.get(), 0);
}

#[test]
fn save_failure_keeps_new_table_live() {
    let mut rig = Rig::new(SystemConfig::default(), 1200);
    rig.nvs.fail_writes.set(true);
    let response = rig.send(
        r#"{"cmd":"reconfigure","events":[{"relay":1,"start":1201,"minutes":1}]}"#,
    );
    assert_eq!(response, Response::Ack);
    assert_eq!(rig.engine.schedule().len(), 1);
    assert!(rig.nvs.stored().is_none());
}

// ── Stop all ──────────────────────────────────────────────────

#[test]
fn stop_all_releases_running_relay_on_next_tick() {
    let mut rig = Rig::new(SystemConfig::default(), 1800);
    rig.step(1000);
    assert_eq!(rig.send(r#"{"cmd":"stop_all"}"#), Response::Ack);
    assert_eq!(
        rig.engine.relays().get(0).unwrap().phase(),
        RelayPhase::PendingStop
    );

    rig.step(1000);
    assert_eq!(rig.relays.writes_for(0), [Level::On, Level::Off]);
    assert!(rig.engine.auto_enabled());
}

// ── Status ────────────────────────────────────────────────────

#[test]
fn status_request_matches_last_committed_tick() {
    let mut rig = Rig::new(SystemConfig::default(), 1800);
    rig.run_secs(30);

    let Response::Status(report) = rig.send(r#"{"cmd":"status"}"#) else {
        panic!("status request not answered with a report");
    };
    assert_eq!(report, rig.engine.status());
    assert_eq!(report.tick_count, 30);
    assert_eq!(report.time.map(|t| t.to_hhmm()), Some(1800));
    assert_eq!(report.next_event, Some(WateringEvent::new(1, 1811, 20)));

    let relay0 = &report.relays[0];
    assert!(relay0.active);
    // Armed on the first tick, counted down by the 29 after it.
    assert_eq!(relay0.remaining_ms, 10 * 60_000 - 29_000);
    assert_eq!(relay0.phase, RelayPhase::Active);
    for relay in &report.relays {
        assert_eq!(relay.active, relay.remaining_ms > 0, "relay {}", relay.relay);
    }
}

#[test]
fn status_reports_pending_manual_start_between_ticks() {
    let mut rig = Rig::new(SystemConfig::default(), 1200);
    rig.step(1000);
    rig.send(r#"{"cmd":"manual_run","relay":2,"minutes":5}"#);

    let Response::Status(report) = rig.send(r#"{"cmd":"status"}"#) else {
        panic!("status request not answered with a report");
    };
    assert_eq!(report.mode, Mode::ManualOverride);
    assert_eq!(report.relays[2].phase, RelayPhase::PendingStart);
    assert_eq!(report.relays[2].remaining_ms, 5 * 60_000);
}

#[test]
fn status_published_every_minute_as_json() {
    let mut rig = Rig::new(SystemConfig::default(), 1200);
    rig.run_secs(180);
    assert_eq!(rig.published.len(), 3);

    let json = serde_json::to_value(&rig.published[0]).unwrap();
    assert_eq!(json["auto"], true);
    assert_eq!(json["mode"], "auto");
    assert_eq!(json["time"]["hour"], 12);
    assert_eq!(json["relays"].as_array().map(Vec::len), Some(5));
}

// ── Inbox ─────────────────────────────────────────────────────

#[test]
fn inbox_payloads_reach_the_engine_in_order() {
    let inbox = Inbox::new();
    inbox.push(br#"{"cmd":"set_auto","enabled":false}"#).unwrap();
    inbox.push(b"garbage").unwrap();
    inbox.push(br#"{"cmd":"manual_run","relay":1,"minutes":2}"#).unwrap();

    let mut rig = Rig::new(SystemConfig::default(), 1200);
    let mut responses = Vec::new();
    inbox.drain(|payload| {
        responses.push(rig.gateway.handle_payload(
            payload,
            &mut rig.engine,
            &rig.nvs,
            &mut rig.sink,
        ));
    });

    assert_eq!(
        responses,
        [
            Response::Ack,
            Response::Rejected(CommandError::UnknownCommand),
            Response::Ack
        ]
    );
    assert!(!rig.engine.auto_enabled());
    assert_eq!(rig.engine.mode(), Mode::ManualOverride);
}
