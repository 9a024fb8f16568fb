//! Relay channel driver.
//!
//! One GPIO per relay module input.  Many cheap relay boards energise the
//! coil on a LOW input; `active_low` hides that from everything above.
//!
//! The driver is generic over [`embedded_hal::digital::OutputPin`], so the
//! same code drives an ESP-IDF `PinDriver` on the device and a recording
//! pin in tests.

use embedded_hal::digital::OutputPin;

pub struct RelayDriver<P> {
    pin: P,
    gpio: u8,
    active_low: bool,
    on: bool,
}

impl<P: OutputPin> RelayDriver<P> {
    pub fn new(pin: P, gpio: u8, active_low: bool) -> Self {
        Self {
            pin,
            gpio,
            active_low,
            on: false,
        }
    }

    /// Energise (`true`) or release (`false`) the relay coil.
    pub fn set(&mut self, on: bool) -> Result<(), P::Error> {
        if on != self.active_low {
            self.pin.set_high()?;
        } else {
            self.pin.set_low()?;
        }
        self.on = on;
        Ok(())
    }

    pub fn is_on(&self) -> bool {
        self.on
    }

    pub fn gpio(&self) -> u8 {
        self.gpio
    }
}
