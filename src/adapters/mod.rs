//! Adapters, concrete implementations of the hexagonal port traits.
//!
//! | Adapter    | Implements   | Connects to                  |
//! |------------|--------------|------------------------------|
//! | `hardware` | RelayPort    | Relay GPIOs (`embedded-hal`) |
//! | `log_sink` | EventSink    | Serial log output            |
//! | `nvs`      | ConfigPort   | NVS / in-memory store        |
//! | `time`     | ClockPort    | System clock + TZ rule       |

pub mod hardware;
pub mod log_sink;
pub mod nvs;
pub mod time;
