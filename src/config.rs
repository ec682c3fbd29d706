//! Settings consumed by the input subsystem.
//!
//! [`InputSettings`] is persisted as TOML; [`SettingsStore`] is the shared,
//! lock-protected view handed to the driver. The store also carries the
//! per-port device-name buffer the registry fills in at hot-plug time.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use color_eyre::eyre::{eyre, Result, WrapErr};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::input::device::{Binds, RetroButton};
use crate::input::event::KeyCode;
use crate::input::MAX_PORTS;

const CONFIG_DIR: &str = "frontend-input";
const CONFIG_FILE: &str = "input.toml";

/// One `[[keyboard_binds]]` entry.
#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeyBinding {
    pub button: RetroButton,
    pub key: KeyCode,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct InputSettings {
    /// Classify hot-plugged pads, load their default binds and publish names.
    pub autodetect_enable: bool,
    /// Fraction of full scale below which analog reads report zero.
    pub analog_dead_zone: f32,
    /// Let port 0 also answer to the keyboard binds.
    pub keyboard_fallback: bool,
    /// Block the poller while the application is paused.
    pub block_when_paused: bool,
    /// Rate used when a sensor is enabled with 0 Hz.
    pub default_sensor_rate_hz: u32,
    /// Seconds between poll statistics log lines; 0 disables them.
    pub stats_interval_secs: u64,
    /// Show every routed key and motion event on screen.
    pub debug_enable: bool,
    pub keyboard_binds: Vec<KeyBinding>,
}

impl Default for InputSettings {
    fn default() -> Self {
        Self {
            autodetect_enable: true,
            analog_dead_zone: 0.0,
            keyboard_fallback: true,
            block_when_paused: true,
            default_sensor_rate_hz: 60,
            stats_interval_secs: 30,
            debug_enable: false,
            keyboard_binds: Binds::keyboard()
                .pairs()
                .map(|(button, key)| KeyBinding { button, key })
                .collect(),
        }
    }
}

impl InputSettings {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..1.0).contains(&self.analog_dead_zone) {
            return Err(eyre!(
                "analog_dead_zone must be in [0.0, 1.0), got {}",
                self.analog_dead_zone
            ));
        }
        if self.default_sensor_rate_hz == 0 {
            return Err(eyre!("default_sensor_rate_hz must be positive"));
        }
        for binding in &self.keyboard_binds {
            if binding.key.index() >= crate::input::LAST_KEYCODE {
                return Err(eyre!(
                    "keyboard bind for {:?} uses key code {} outside the tracked range",
                    binding.button,
                    binding.key.0
                ));
            }
        }
        Ok(())
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let settings: InputSettings = toml::from_str(text).wrap_err("Failed to parse input settings")?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).wrap_err("Failed to serialize input settings")
    }

    pub fn keyboard_binds(&self) -> Binds {
        let mut binds = Binds::unbound();
        for binding in &self.keyboard_binds {
            binds.set(binding.button, binding.key);
        }
        binds
    }

    /// `<config dir>/frontend-input/input.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE))
    }

    /// Loads the settings file, writing the defaults first if it is missing.
    pub async fn load_or_create(path: &Path) -> Result<Self> {
        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            info!("No input settings at {}, writing defaults", path.display());
            let settings = InputSettings::default();
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .wrap_err_with(|| format!("Failed to create {}", parent.display()))?;
            }
            tokio::fs::write(path, settings.to_toml()?)
                .await
                .wrap_err_with(|| format!("Failed to write {}", path.display()))?;
            return Ok(settings);
        }

        let text = tokio::fs::read_to_string(path)
            .await
            .wrap_err_with(|| format!("Failed to read {}", path.display()))?;
        let settings = Self::from_toml(&text)?;
        debug!("Loaded input settings from {}: {:?}", path.display(), settings);
        Ok(settings)
    }
}

/// Shared settings plus the device-name display buffer.
#[derive(Debug, Clone, Default)]
pub struct SettingsStore {
    pub input: Arc<RwLock<InputSettings>>,
    pub device_names: Arc<RwLock<[String; MAX_PORTS]>>,
}

impl SettingsStore {
    pub fn new(settings: InputSettings) -> Self {
        Self {
            input: Arc::new(RwLock::new(settings)),
            device_names: Arc::new(RwLock::new(Default::default())),
        }
    }

    /// Current settings; defaults if the lock is contended.
    pub fn snapshot(&self) -> InputSettings {
        match self.input.try_read() {
            Ok(guard) => guard.clone(),
            Err(e) => {
                warn!("Unable to read input settings: {}", e);
                InputSettings::default()
            }
        }
    }

    pub fn set_device_name(&self, port: usize, name: &str) {
        if port >= MAX_PORTS {
            return;
        }
        match self.device_names.try_write() {
            Ok(mut names) => names[port] = name.to_string(),
            Err(e) => warn!("Writing device name for port {} is blocked: {}", port, e),
        }
    }

    pub fn device_name(&self, port: usize) -> Option<String> {
        if port >= MAX_PORTS {
            return None;
        }
        let names = self.device_names.try_read().ok()?;
        let name = &names[port];
        if name.is_empty() {
            None
        } else {
            Some(name.clone())
        }
    }
}
