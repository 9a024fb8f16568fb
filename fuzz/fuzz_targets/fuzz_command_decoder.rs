//! Fuzz target: `CommandGateway::handle_payload`
//!
//! Drives arbitrary bytes through the wire decoder and the gateway and
//! asserts that it never panics and that a rejected payload leaves every
//! relay exactly as it was.
//!
//! cargo fuzz run fuzz_command_decoder

#![no_main]

use gardenwater::app::events::AppEvent;
use gardenwater::app::gateway::{CommandGateway, Response};
use gardenwater::app::ports::{ConfigPort, ConfigStoreError, EventSink};
use gardenwater::app::service::ActuationEngine;
use gardenwater::config::SystemConfig;
use libfuzzer_sys::fuzz_target;

struct Discard;

impl EventSink for Discard {
    fn emit(&mut self, _event: &AppEvent) {}
}

struct NoStore;

impl ConfigPort for NoStore {
    fn load(&self) -> Result<SystemConfig, ConfigStoreError> {
        Err(ConfigStoreError::NotFound)
    }
    fn save(&self, _config: &SystemConfig) -> Result<(), ConfigStoreError> {
        Ok(())
    }
}

fuzz_target!(|data: &[u8]| {
    let config = SystemConfig::default();
    let mut engine = ActuationEngine::new(&config).expect("default config is valid");
    let mut gateway = CommandGateway::new(config);

    let before = engine.status();
    let response = gateway.handle_payload(data, &mut engine, &NoStore, &mut Discard);

    if let Response::Rejected(_) = response {
        let after = engine.status();
        assert_eq!(after.relays, before.relays, "rejected command touched a relay");
        assert_eq!(after.mode, before.mode);
        assert_eq!(after.auto, before.auto);
    }
});
