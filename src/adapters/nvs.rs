//! NVS (Non-Volatile Storage) adapter.
//!
//! Implements [`ConfigPort`].  The configuration is a single `postcard`
//! blob; it is validated before it is written and again after it is read,
//! so a schedule that would be refused at boot never reaches flash.
//!
//! - **`feature = "espidf"`**: raw `nvs_*` calls on the default partition.
//!   Commits are atomic per `nvs_commit()`.
//! - **host**: an in-memory map, for tests and simulation.

use log::{error, info, warn};

use crate::app::ports::{ConfigPort, ConfigStoreError, StorageError};
use crate::config::SystemConfig;
use crate::error::ConfigError;
use crate::relays::RelayBank;
use crate::schedule::ScheduleTable;

#[cfg(not(feature = "espidf"))]
use std::collections::HashMap;

#[cfg(feature = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(feature = "espidf")]
const OK: esp_err_t = ESP_OK as esp_err_t;
#[cfg(feature = "espidf")]
const NOT_FOUND: esp_err_t = ESP_ERR_NVS_NOT_FOUND as esp_err_t;

const CONFIG_NAMESPACE: &str = "gardenwater";
const CONFIG_KEY: &str = "syscfg";

/// Upper bound for the config blob: 8 pins plus 16 events is far below it.
const MAX_BLOB_SIZE: usize = 512;

pub struct NvsAdapter {
    #[cfg(not(feature = "espidf"))]
    store: std::cell::RefCell<HashMap<String, Vec<u8>>>,
}

impl NvsAdapter {
    /// Initialise NVS flash.
    ///
    /// On a full partition or after an IDF version change the partition is
    /// erased and re-initialised, which drops any stored configuration.
    pub fn new() -> Result<Self, StorageError> {
        #[cfg(feature = "espidf")]
        {
            // SAFETY: called once from the main task before any other NVS access.
            let ret = unsafe { nvs_flash_init() };
            if ret == ESP_ERR_NVS_NO_FREE_PAGES as esp_err_t || ret == ESP_ERR_NVS_NEW_VERSION_FOUND as esp_err_t {
                warn!("NVS: erasing and re-initialising flash partition");
                if unsafe { nvs_flash_erase() } != OK || unsafe { nvs_flash_init() } != OK {
                    return Err(StorageError::IoError);
                }
            } else if ret != OK {
                return Err(StorageError::IoError);
            }
            info!("NvsAdapter: ESP-IDF NVS initialised");
        }

        #[cfg(not(feature = "espidf"))]
        info!("NvsAdapter: simulation backend");

        Ok(Self {
            #[cfg(not(feature = "espidf"))]
            store: std::cell::RefCell::new(HashMap::new()),
        })
    }

    /// Configuration to boot with, and the schedule error that forces a
    /// fail-safe start.
    ///
    /// A stored config refused only for its schedule keeps its relay
    /// wiring and policy; the events are dropped and AUTO is switched off.
    /// Anything unreadable falls back to factory defaults.
    pub fn load_for_boot(&self) -> (SystemConfig, Option<ConfigError>) {
        match self.load() {
            Ok(cfg) => (cfg, None),
            Err(ConfigStoreError::NotFound) => {
                info!("NvsAdapter: no stored config, using defaults");
                (SystemConfig::default(), None)
            }
            Err(ConfigStoreError::ValidationFailed(e)) => {
                error!("NvsAdapter: stored schedule invalid ({})", e);
                let bare = self.load_unvalidated().map(|cfg| cfg.without_schedule());
                match bare {
                    Ok(cfg) if validate_config(&cfg).is_ok() => (cfg, Some(e)),
                    _ => {
                        warn!("NvsAdapter: stored wiring unusable, using factory map");
                        (SystemConfig::default().without_schedule(), Some(e))
                    }
                }
            }
            Err(e) => {
                warn!("NvsAdapter: config load failed ({}), using defaults", e);
                (SystemConfig::default(), None)
            }
        }
    }

    /// Decode the stored blob without validating it.
    fn load_unvalidated(&self) -> Result<SystemConfig, ConfigStoreError> {
        let mut buf = [0u8; MAX_BLOB_SIZE];
        let len = self.get_blob(CONFIG_NAMESPACE, CONFIG_KEY, &mut buf)?;
        postcard::from_bytes(&buf[..len]).map_err(|_| ConfigStoreError::Corrupted)
    }

    // ── Blob primitives ───────────────────────────────────────

    #[cfg(not(feature = "espidf"))]
    fn composite_key(namespace: &str, key: &str) -> String {
        format!("{}::{}", namespace, key)
    }

    #[cfg(not(feature = "espidf"))]
    fn get_blob(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        let store = self.store.borrow();
        let data = store
            .get(&Self::composite_key(namespace, key))
            .ok_or(StorageError::NotFound)?;
        let len = data.len().min(buf.len());
        buf[..len].copy_from_slice(&data[..len]);
        Ok(len)
    }

    #[cfg(not(feature = "espidf"))]
    fn set_blob(&self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        self.store
            .borrow_mut()
            .insert(Self::composite_key(namespace, key), data.to_vec());
        Ok(())
    }

    /// NUL-terminate an NVS name (max 15 chars).
    #[cfg(feature = "espidf")]
    fn c_name(name: &str) -> [u8; 16] {
        let mut buf = [0u8; 16];
        let len = name.len().min(15);
        buf[..len].copy_from_slice(&name.as_bytes()[..len]);
        buf
    }

    /// Open an NVS namespace, run `f` with the handle, then close it.
    #[cfg(feature = "espidf")]
    fn with_nvs_handle<F, T>(namespace: &str, write: bool, f: F) -> Result<T, esp_err_t>
    where
        F: FnOnce(nvs_handle_t) -> Result<T, esp_err_t>,
    {
        let ns = Self::c_name(namespace);
        let mode = if write {
            nvs_open_mode_t_NVS_READWRITE
        } else {
            nvs_open_mode_t_NVS_READONLY
        };
        let mut handle: nvs_handle_t = 0;
        let ret = unsafe { nvs_open(ns.as_ptr().cast(), mode, &mut handle) };
        if ret != OK {
            return Err(ret);
        }
        let result = f(handle);
        unsafe { nvs_close(handle) };
        result
    }

    #[cfg(feature = "espidf")]
    fn get_blob(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        let key = Self::c_name(key);
        let result = Self::with_nvs_handle(namespace, false, |handle| {
            let mut size = buf.len();
            let ret = unsafe {
                nvs_get_blob(handle, key.as_ptr().cast(), buf.as_mut_ptr().cast(), &mut size)
            };
            if ret == OK { Ok(size) } else { Err(ret) }
        });
        result.map_err(|e| {
            if e == NOT_FOUND {
                StorageError::NotFound
            } else {
                StorageError::IoError
            }
        })
    }

    #[cfg(feature = "espidf")]
    fn set_blob(&self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        let key = Self::c_name(key);
        let result = Self::with_nvs_handle(namespace, true, |handle| {
            let ret = unsafe {
                nvs_set_blob(handle, key.as_ptr().cast(), data.as_ptr().cast(), data.len())
            };
            if ret != OK {
                return Err(ret);
            }
            let ret = unsafe { nvs_commit(handle) };
            if ret == OK { Ok(()) } else { Err(ret) }
        });
        result.map_err(|e| {
            if e == ESP_ERR_NVS_NOT_ENOUGH_SPACE as esp_err_t {
                StorageError::Full
            } else {
                StorageError::IoError
            }
        })
    }
}

/// Everything [`ActuationEngine::new`](crate::app::service::ActuationEngine::new)
/// would refuse, plus timing bounds.
pub fn validate_config(cfg: &SystemConfig) -> Result<(), ConfigStoreError> {
    let relays = RelayBank::new(&cfg.relay_pins, cfg.exclusive_relays)?;
    ScheduleTable::load(&cfg.events, relays.len())?;

    if relays.is_empty() {
        return Err(ConfigStoreError::InvalidSetting("relay_pins must not be empty"));
    }
    if !(100..=5000).contains(&cfg.tick_interval_ms) {
        return Err(ConfigStoreError::InvalidSetting(
            "tick_interval_ms must be 100-5000",
        ));
    }
    if cfg.publish_interval_ms < cfg.tick_interval_ms {
        return Err(ConfigStoreError::InvalidSetting(
            "publish_interval_ms must be >= tick_interval_ms",
        ));
    }
    if cfg.max_catch_up_minutes > 60 {
        return Err(ConfigStoreError::InvalidSetting(
            "max_catch_up_minutes must be 0-60",
        ));
    }
    Ok(())
}

impl ConfigPort for NvsAdapter {
    fn load(&self) -> Result<SystemConfig, ConfigStoreError> {
        let cfg = self.load_unvalidated()?;
        validate_config(&cfg)?;
        info!("NvsAdapter: loaded config ({} events)", cfg.events.len());
        Ok(cfg)
    }

    fn save(&self, config: &SystemConfig) -> Result<(), ConfigStoreError> {
        validate_config(config)?;
        let mut buf = [0u8; MAX_BLOB_SIZE];
        let bytes = postcard::to_slice(config, &mut buf).map_err(|_| ConfigStoreError::StorageFull)?;
        self.set_blob(CONFIG_NAMESPACE, CONFIG_KEY, bytes)
            .inspect_err(|e| warn!("NvsAdapter: config write failed: {}", e))?;
        info!("NvsAdapter: config saved ({} bytes)", bytes.len());
        Ok(())
    }
}
