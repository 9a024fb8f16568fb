//! Wall-clock adapter.
//!
//! Implements [`ClockPort`] for the controller.
//!
//! - **`feature = "espidf"`**: `gettimeofday()` + `localtime_r()` under the
//!   POSIX `TZ` rule given at construction.  NTP sync itself happens
//!   elsewhere; until the clock has been set the adapter reports `None`.
//!   Uptime comes from `esp_timer_get_time()`.
//! - **host**: `std::time::SystemTime` in UTC, for simulation.

use log::info;

use crate::app::ports::ClockPort;
use crate::schedule::TimeOfDay;

/// Central European time with EU daylight-saving rules.
pub const DEFAULT_TZ: &str = "CET-1CEST-2,M3.5.0/02:00:00,M10.5.0/03:00:00";

/// Any wall clock before 2020-01-01 has not been synced yet.
const EPOCH_2020: i64 = 1_577_836_800;

pub struct SystemClock {
    #[cfg(not(feature = "espidf"))]
    start: std::time::Instant,
}

impl SystemClock {
    /// `tz` is a POSIX TZ rule, e.g. [`DEFAULT_TZ`].
    pub fn new(tz: &str) -> Self {
        #[cfg(feature = "espidf")]
        {
            let mut rule = [0u8; 64];
            let len = tz.len().min(rule.len() - 1);
            rule[..len].copy_from_slice(&tz.as_bytes()[..len]);
            // SAFETY: both strings are NUL-terminated and outlive the call;
            // runs on the main task before the clock is read.
            unsafe {
                esp_idf_svc::sys::setenv(c"TZ".as_ptr(), rule.as_ptr().cast(), 1);
                esp_idf_svc::sys::tzset();
            }
            info!("Clock: TZ={}", tz);
            Self {}
        }

        #[cfg(not(feature = "espidf"))]
        {
            info!("Clock(sim): UTC, TZ rule '{}' ignored", tz);
            Self {
                start: std::time::Instant::now(),
            }
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new(DEFAULT_TZ)
    }
}

impl ClockPort for SystemClock {
    #[cfg(feature = "espidf")]
    fn time_of_day(&self) -> Option<TimeOfDay> {
        use esp_idf_svc::sys::{gettimeofday, localtime_r, time_t, timeval, tm};

        let mut tv = timeval {
            tv_sec: 0,
            tv_usec: 0,
        };
        if unsafe { gettimeofday(&mut tv, core::ptr::null_mut()) } != 0 {
            return None;
        }
        if i64::from(tv.tv_sec) < EPOCH_2020 {
            return None;
        }
        let secs = tv.tv_sec as time_t;
        let mut local: tm = unsafe { core::mem::zeroed() };
        if unsafe { localtime_r(&secs, &mut local) }.is_null() {
            return None;
        }
        TimeOfDay::new(
            u8::try_from(local.tm_hour).ok()?,
            u8::try_from(local.tm_min).ok()?,
        )
    }

    #[cfg(not(feature = "espidf"))]
    fn time_of_day(&self) -> Option<TimeOfDay> {
        let secs = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .ok()?
            .as_secs();
        if (secs as i64) < EPOCH_2020 {
            return None;
        }
        let minute_of_day = (secs / 60) % u64::from(crate::schedule::MINUTES_PER_DAY);
        Some(TimeOfDay::from_minute_of_day(minute_of_day as u16))
    }

    #[cfg(feature = "espidf")]
    fn uptime_ms(&self) -> u64 {
        (unsafe { esp_idf_svc::sys::esp_timer_get_time() }) as u64 / 1000
    }

    #[cfg(not(feature = "espidf"))]
    fn uptime_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}
