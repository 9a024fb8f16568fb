//! Hardware adapter, bridging relay GPIOs to the [`RelayPort`] trait.
//!
//! Owns one [`RelayDriver`] per relay channel.  This is the only module
//! that drives relay outputs; the engine decides *when*, this decides
//! *which pin and which level*.

use embedded_hal::digital::OutputPin;
use log::{info, warn};

use crate::app::ports::RelayPort;
use crate::drivers::relay::RelayDriver;
use crate::error::RelayError;
use crate::relays::{Level, MAX_RELAYS};

/// Relay outputs indexed by relay number.
pub struct RelayOutputs<P> {
    channels: heapless::Vec<RelayDriver<P>, MAX_RELAYS>,
}

impl<P: OutputPin> RelayOutputs<P> {
    /// Wrap already-configured output pins, `(gpio, pin)` per relay in
    /// relay order.  Pins beyond [`MAX_RELAYS`] are ignored.
    pub fn new(pins: impl IntoIterator<Item = (u8, P)>, active_low: bool) -> Self {
        let mut channels = heapless::Vec::new();
        for (gpio, pin) in pins {
            if channels.push(RelayDriver::new(pin, gpio, active_low)).is_err() {
                warn!("RelayOutputs: more than {} pins, GPIO {} ignored", MAX_RELAYS, gpio);
            }
        }
        info!(
            "RelayOutputs: {} channels, active_{}",
            channels.len(),
            if active_low { "low" } else { "high" }
        );
        Self { channels }
    }

    /// Release every coil.  Used on the shutdown path outside the engine.
    pub fn all_off(&mut self) {
        for relay in 0..self.channels.len() as u8 {
            let _ = self.write(relay, Level::Off);
        }
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn is_on(&self, relay: u8) -> bool {
        self.channels
            .get(usize::from(relay))
            .is_some_and(RelayDriver::is_on)
    }
}

impl<P: OutputPin> RelayPort for RelayOutputs<P> {
    fn write(&mut self, relay: u8, level: Level) -> Result<(), RelayError> {
        let channel = self
            .channels
            .get_mut(usize::from(relay))
            .ok_or(RelayError::NoSuchOutput { relay })?;
        channel.set(level == Level::On).map_err(|e| {
            warn!("Relay: GPIO {} write failed: {:?}", channel.gpio(), e);
            RelayError::GpioWriteFailed { relay }
        })
    }
}
