//! Integration tests for the clock → ActuationEngine → relay outputs
//! pipeline, driven tick by tick with a fake clock.

use gardenwater::app::events::{AppEvent, ArmSource};
use gardenwater::app::service::Mode;
use gardenwater::config::SystemConfig;
use gardenwater::error::{ArmError, HealthFlag};
use gardenwater::relays::{Level, RelayPhase};
use gardenwater::schedule::WateringEvent;

use crate::mock_hw::Rig;

fn config_with(events: &[WateringEvent]) -> SystemConfig {
    let mut config = SystemConfig::default();
    config.events.clear();
    for e in events {
        config.events.push(*e).unwrap();
    }
    config
}

// ── Boot ──────────────────────────────────────────────────────

#[test]
fn first_tick_forces_every_relay_off() {
    let mut rig = Rig::new(SystemConfig::default(), 1200);
    rig.step(1000);
    assert_eq!(rig.relays.writes.len(), 5);
    assert!(rig.relays.writes.iter().all(|(_, level)| *level == Level::Off));

    rig.step(1000);
    assert_eq!(rig.relays.writes.len(), 5, "boot writes are one-shot");
}

// ── Scheduled runs ────────────────────────────────────────────

#[test]
fn scheduled_run_switches_on_then_off_exactly_once() {
    let mut rig = Rig::new(SystemConfig::default(), 1800);

    rig.step(1000);
    assert_eq!(rig.relays.level(0), Level::On);
    assert!(rig.engine.relays().get(0).unwrap().is_active());

    // The arming tick is not counted: ten more minutes of one-second ticks.
    rig.run_secs(599);
    assert!(rig.engine.relays().get(0).unwrap().is_active());
    rig.run_secs(1);
    let relay0 = rig.engine.relays().get(0).unwrap();
    assert!(!relay0.is_active());
    assert_eq!(relay0.phase(), RelayPhase::Idle);
    assert_eq!(rig.relays.writes_for(0), [Level::On, Level::Off]);
}

#[test]
fn back_to_back_events_hand_over_between_relays() {
    let mut rig = Rig::new(SystemConfig::default(), 1800);
    // 18:00 relay 0 for 10 min, 18:11 relay 1 for 20 min.
    rig.run_secs(11 * 60 + 1);
    assert_eq!(rig.relays.writes_for(0).last(), Some(&Level::Off));
    assert_eq!(rig.relays.level(1), Level::On);
    assert_eq!(rig.engine.relays().active_relay(), Some(1));
    assert_eq!(rig.engine.health() & HealthFlag::ArmConflict.mask(), 0);
}

#[test]
fn irregular_ticks_still_fire_once() {
    let mut rig = Rig::new(SystemConfig::default(), 1759);
    // 17:59:00 to 18:01:10 with ragged intervals, then a long gap.
    for ms in [700, 1300, 45_000, 20_000, 900, 2_500] {
        rig.step(ms);
    }
    assert_eq!(rig.relays.writes_for(0).iter().filter(|l| **l == Level::On).count(), 1);
}

#[test]
fn clock_jump_forward_catches_up_late_event() {
    let mut rig = Rig::new(SystemConfig::default(), 1758);
    rig.step(1000);
    // NTP correction moves the wall clock from 17:58 to 18:02.
    rig.clock.jump_to(1802);
    rig.step(1000);

    let relay0 = rig.engine.relays().get(0).unwrap();
    assert!(relay0.is_active());
    // Scheduled end (18:10) is kept.
    assert_eq!(relay0.remaining_ms(), 8 * 60_000);
}

#[test]
fn stalled_loop_keeps_scheduled_end_of_late_run() {
    let mut rig = Rig::new(SystemConfig::default(), 1758);
    rig.step(1000);
    // Wall clock and uptime both move 17:58 -> 18:03 in one tick.
    rig.step(5 * 60_000);

    let relay0 = rig.engine.relays().get(0).unwrap();
    assert!(relay0.is_active());
    assert_eq!(relay0.remaining_ms(), 7 * 60_000);
    assert_eq!(rig.relays.writes_for(0), [Level::Off, Level::On]);

    // Still running just before 18:10, off right after.
    rig.run_secs(7 * 60 - 1);
    assert!(rig.engine.relays().get(0).unwrap().is_active());
    rig.run_secs(1);
    assert_eq!(rig.relays.writes_for(0), [Level::Off, Level::On, Level::Off]);
}

#[test]
fn clock_jump_past_catch_up_window_skips_event() {
    let mut rig = Rig::new(SystemConfig::default(), 1755);
    rig.step(1000);
    rig.clock.jump_to(1807);
    rig.step(1000);
    assert!(!rig.engine.relays().any_active());
    assert_eq!(rig.relays.writes_for(0), [Level::Off]);
}

#[test]
fn ntp_step_back_resets_cursor_without_burst() {
    let mut rig = Rig::new(SystemConfig::default(), 1800);
    rig.run_secs(601);
    assert_eq!(rig.relays.writes_for(0), [Level::On, Level::Off]);

    // 18:10 -> 17:59: nothing is replayed on the step itself.
    rig.clock.jump_to(1759);
    rig.run_secs(2);
    assert_eq!(rig.relays.writes_for(0), [Level::On, Level::Off]);

    // Without a date the repeated 18:00 is indistinguishable from
    // tomorrow's, so it fires again.
    rig.run_secs(60);
    assert_eq!(rig.relays.writes_for(0), [Level::On, Level::Off, Level::On]);
}

#[test]
fn unsynced_clock_runs_nothing_but_counts_down() {
    let mut rig = Rig::new(SystemConfig::default(), 1800);
    rig.clock.synced = false;
    rig.send(r#"{"cmd":"manual_run","relay":3,"minutes":1}"#);
    rig.run_secs(60);

    assert_eq!(rig.relays.writes_for(0), [Level::Off]);
    assert_eq!(rig.relays.writes_for(3), [Level::On, Level::Off]);
    assert_ne!(rig.engine.health() & HealthFlag::ClockUnsynced.mask(), 0);

    rig.clock.synced = true;
    rig.step(1000);
    assert_eq!(rig.engine.health() & HealthFlag::ClockUnsynced.mask(), 0);
}

// ── Manual override ───────────────────────────────────────────

#[test]
fn manual_run_that_arrived_first_wins() {
    let mut rig = Rig::new(config_with(&[WateringEvent::new(2, 1800, 10)]), 1759);
    rig.step(1000);

    rig.send(r#"{"cmd":"manual_run","relay":2,"minutes":5}"#);
    assert_eq!(rig.engine.mode(), Mode::ManualOverride);

    // 18:00 arrives with relay 2 still running manually.
    rig.run_secs(60);
    assert_eq!(
        rig.sink.count(|e| matches!(
            e,
            AppEvent::ArmRejected {
                source: ArmSource::Schedule,
                relay: 2,
                error: ArmError::AlreadyActive { relay: 2 },
            }
        )),
        1
    );
    assert_ne!(rig.engine.health() & HealthFlag::ArmConflict.mask(), 0);

    // Manual timing is untouched: the run ends five minutes after it began.
    rig.run_secs(4 * 60 - 1);
    assert!(rig.engine.relays().get(2).unwrap().is_active());
    rig.run_secs(1);
    assert!(!rig.engine.relays().get(2).unwrap().is_active());
    // Off from the boot tick, then the manual run.
    assert_eq!(rig.relays.writes_for(2), [Level::Off, Level::On, Level::Off]);
    assert_eq!(rig.engine.mode(), Mode::Auto);
}

#[test]
fn exclusive_bank_refuses_second_relay() {
    let mut rig = Rig::new(SystemConfig::default(), 1800);
    rig.step(1000);

    let response = rig.send(r#"{"cmd":"manual_run","relay":4,"minutes":3}"#);
    assert!(matches!(
        response,
        gardenwater::app::gateway::Response::Rejected(gardenwater::error::CommandError::Arm(
            ArmError::Busy { relay: 4, active: 0 }
        ))
    ));
    assert_eq!(rig.engine.mode(), Mode::Auto);
}

#[test]
fn zero_minutes_cancels_a_scheduled_run() {
    let mut rig = Rig::new(SystemConfig::default(), 1800);
    rig.step(1000);
    rig.send(r#"{"cmd":"manual_run","relay":0,"minutes":0}"#);
    rig.step(1000);

    assert_eq!(rig.relays.writes_for(0), [Level::On, Level::Off]);
    assert_eq!(rig.engine.mode(), Mode::Auto);
}

#[test]
fn without_auto_resume_schedule_waits_for_set_auto() {
    let mut config = SystemConfig::default();
    config.auto_resume = false;
    let mut rig = Rig::new(config, 1755);
    rig.step(1000);

    rig.send(r#"{"cmd":"manual_run","relay":4,"minutes":1}"#);
    rig.run_secs(6 * 60);
    // 18:00 passed while in override: relay 0 never ran.
    assert_eq!(rig.relays.writes_for(0), [Level::Off]);
    assert_eq!(rig.engine.mode(), Mode::ManualOverride);

    rig.send(r#"{"cmd":"set_auto","enabled":true}"#);
    assert_eq!(rig.engine.mode(), Mode::Auto);
    // Next event at 18:11 on relay 1 now runs.
    rig.run_secs(5 * 60);
    assert_eq!(rig.relays.level(1), Level::On);
}

// ── Output faults ─────────────────────────────────────────────

#[test]
fn failed_write_is_retried_next_tick() {
    let mut rig = Rig::new(SystemConfig::default(), 1800);
    rig.relays.fail_next(0);
    rig.relays.fail_next(0);

    rig.step(1000);
    assert!(rig.relays.writes_for(0).is_empty());
    assert_ne!(rig.engine.health() & HealthFlag::OutputWriteFailed.mask(), 0);
    assert_eq!(rig.engine.relays().get(0).unwrap().phase(), RelayPhase::PendingStart);

    rig.step(1000);
    rig.step(1000);
    assert_eq!(rig.relays.failed_attempts, 2);
    assert_eq!(rig.relays.writes_for(0), [Level::On]);
    assert_eq!(
        rig.sink.count(|e| matches!(e, AppEvent::OutputFault(_))),
        2
    );
}

#[test]
fn health_flag_clears_after_publish() {
    let mut rig = Rig::new(SystemConfig::default(), 1800);
    rig.relays.fail_next(1);
    rig.step(1000);
    assert_ne!(rig.engine.health() & HealthFlag::OutputWriteFailed.mask(), 0);

    rig.run_secs(59);
    assert_eq!(rig.published.len(), 1);
    assert_ne!(rig.published[0].health & HealthFlag::OutputWriteFailed.mask(), 0);
    assert_eq!(rig.engine.health() & HealthFlag::OutputWriteFailed.mask(), 0);
}
