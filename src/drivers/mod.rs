//! Output drivers and the task watchdog.

pub mod relay;
pub mod watchdog;
