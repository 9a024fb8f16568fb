//! Fuzz target: `ScheduleTable::load`
//!
//! Every 5 input bytes become one `(relay, hhmm, minutes)` event.  A table
//! that loads must be time-ordered and free of overlapping windows.
//!
//! cargo fuzz run fuzz_schedule_load

#![no_main]

use gardenwater::schedule::{ScheduleTable, WateringEvent};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Some((&relay_count, rest)) = data.split_first() else {
        return;
    };
    let events: Vec<WateringEvent> = rest
        .chunks_exact(5)
        .map(|c| {
            WateringEvent::new(
                c[0],
                u16::from_le_bytes([c[1], c[2]]),
                u16::from_le_bytes([c[3], c[4]]),
            )
        })
        .collect();

    let Ok(table) = ScheduleTable::load(&events, usize::from(relay_count % 10)) else {
        return;
    };

    let slice = table.as_slice();
    for (i, a) in slice.iter().enumerate() {
        assert!(a.start().is_some());
        assert!(a.duration_minutes > 0);
        for b in &slice[i + 1..] {
            assert!(!a.overlaps(b), "loaded table has overlapping events");
            assert!(a.start() <= b.start(), "table not time-ordered");
        }
    }
});
