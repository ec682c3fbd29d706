//! Hot-plug detection: platform device ids to logical ports.
//!
//! Owned by the poller; nothing else mutates it. After every change the
//! registry republishes class, binds and connection flag of every port into
//! [`InputState`] so readers never need to touch the registry itself.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::device::{classify, is_split_identity_name, Binds, DeviceClass};
use super::event::{DeviceId, InputSource};
use super::state::InputState;
use super::MAX_PORTS;
use crate::config::SettingsStore;
use crate::error::InputError;
use crate::platform::{MessageSink, Platform};

#[derive(Clone, Debug, PartialEq)]
pub struct DeviceEntry {
    pub id: DeviceId,
    pub class: DeviceClass,
    /// Shown in the name buffer and messages.
    pub name: Option<String>,
}

pub struct DeviceRegistry {
    platform: Arc<dyn Platform>,
    state: Arc<InputState>,
    settings: SettingsStore,
    sink: Arc<dyn MessageSink>,
    capacity: usize,

    // Index is the port.
    entries: Vec<DeviceEntry>,

    // Secondary id -> primary id.
    aliases: HashMap<DeviceId, DeviceId>,

    // First and second id seen for a split-identity handheld.
    split_primary: Option<DeviceId>,
    split_secondary: Option<DeviceId>,
}

impl DeviceRegistry {
    pub fn new(
        platform: Arc<dyn Platform>,
        state: Arc<InputState>,
        settings: SettingsStore,
        sink: Arc<dyn MessageSink>,
    ) -> Self {
        Self::with_capacity(platform, state, settings, sink, MAX_PORTS)
    }

    /// Registry accepting at most `capacity` devices (clamped to `MAX_PORTS`).
    pub fn with_capacity(
        platform: Arc<dyn Platform>,
        state: Arc<InputState>,
        settings: SettingsStore,
        sink: Arc<dyn MessageSink>,
        capacity: usize,
    ) -> Self {
        Self {
            platform,
            state,
            settings,
            sink,
            capacity: capacity.min(MAX_PORTS),
            entries: Vec::with_capacity(MAX_PORTS),
            aliases: HashMap::new(),
            split_primary: None,
            split_secondary: None,
        }
    }

    pub fn sink(&self) -> &Arc<dyn MessageSink> {
        &self.sink
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn device_count(&self) -> usize {
        self.entries.len()
    }

    pub fn device_at(&self, port: usize) -> Option<&DeviceEntry> {
        self.entries.get(port)
    }

    pub fn class_of(&self, port: usize) -> Option<DeviceClass> {
        self.entries.get(port).map(|e| e.class)
    }

    /// Folds a secondary id onto its primary.
    pub fn add_alias(&mut self, secondary: DeviceId, primary: DeviceId) {
        if secondary == primary {
            return;
        }
        debug!("Aliasing device {} onto {}", secondary, primary);
        self.aliases.insert(secondary, primary);
    }

    pub fn fold_alias(&self, device_id: DeviceId) -> DeviceId {
        self.aliases.get(&device_id).copied().unwrap_or(device_id)
    }

    /// First and, once seen, second id of the connected split-identity handheld.
    pub fn split_identity(&self) -> Option<(DeviceId, Option<DeviceId>)> {
        self.split_primary.map(|primary| (primary, self.split_secondary))
    }

    pub fn port_of(&self, device_id: DeviceId) -> Option<usize> {
        let id = self.fold_alias(device_id);
        self.entries.iter().position(|e| e.id == id)
    }

    /// Port of a device, registering it on first sight.
    ///
    /// The second id of a connected split-identity handheld joins the first
    /// one's port even when every port is taken. With autodetect off the
    /// device is appended unclassified.
    pub fn resolve_port(&mut self, device_id: DeviceId, source: InputSource) -> Result<usize, InputError> {
        let id = self.fold_alias(device_id);
        if let Some(port) = self.entries.iter().position(|e| e.id == id) {
            return Ok(port);
        }

        if !self.autodetect() {
            self.check_capacity(id)?;
            self.entries.push(DeviceEntry {
                id,
                class: DeviceClass::Generic,
                name: None,
            });
            let port = self.entries.len() - 1;
            self.state.reset_port(port);
            info!("Device {} connected on port {} (autodetect disabled)", id, port);
            self.publish();
            return Ok(port);
        }

        let name = self.platform.device_name(id);
        let split = name.as_deref().is_some_and(is_split_identity_name);
        if split {
            if let Some(port) = self.fold_split_identity(id) {
                return Ok(port);
            }
        }

        self.check_capacity(id)?;

        let input_method = self.platform.input_method_id();
        let classification = classify(name.as_deref(), source, input_method.as_deref());
        if !classification.recognized {
            let err = InputError::UnknownDevice {
                device_id: id,
                name: name.clone(),
            };
            info!("{}, treating as generic", err);
        }

        let entry = DeviceEntry {
            id,
            class: classification.class,
            name: classification.name.map(str::to_string).or(name),
        };
        let port = if classification.primary {
            info!("Found primary input device {}", id);
            self.insert_primary(entry)
        } else {
            self.entries.push(entry);
            let port = self.entries.len() - 1;
            self.state.reset_port(port);
            port
        };

        if split && self.split_primary.is_none() {
            debug!("Device {} is the first identity of a split handheld", id);
            self.split_primary = Some(id);
        }

        info!(
            "Device {} ({:?}) connected on port {}",
            id, classification.class, port
        );
        self.publish();
        self.announce(port);
        Ok(port)
    }

    fn check_capacity(&self, id: DeviceId) -> Result<(), InputError> {
        if self.entries.len() < self.capacity {
            return Ok(());
        }
        let err = InputError::CapacityExceeded {
            device_id: id,
            capacity: self.capacity,
        };
        warn!("{}, connection refused", err);
        Err(err)
    }

    /// Folds a later id of the split-identity handheld onto the port of the
    /// first one.
    fn fold_split_identity(&mut self, id: DeviceId) -> Option<usize> {
        let primary = self.split_primary.filter(|primary| *primary != id)?;
        let port = self.entries.iter().position(|e| e.id == primary)?;
        self.split_secondary = Some(id);
        self.add_alias(id, primary);
        info!("Device {} is the second identity of device {} (port {})", id, primary, port);
        Some(port)
    }

    /// Puts a primary device on port 0 and shifts everybody else right.
    fn insert_primary(&mut self, entry: DeviceEntry) -> usize {
        self.entries.insert(0, entry);
        while self.entries.len() > self.capacity {
            if let Some(dropped) = self.entries.pop() {
                warn!(
                    "Device {} ({:?}) pushed past the last port and dropped",
                    dropped.id, dropped.class
                );
                self.forget(dropped.id);
            }
        }
        for port in 0..self.entries.len() {
            self.state.reset_port(port);
        }
        0
    }

    /// Removes a device; following ports move down by one.
    pub fn disconnect(&mut self, device_id: DeviceId) -> Option<usize> {
        let id = self.fold_alias(device_id);
        let port = self.entries.iter().position(|e| e.id == id)?;
        let old_len = self.entries.len();
        let entry = self.entries.remove(port);
        self.forget(entry.id);

        for p in port..old_len {
            self.state.reset_port(p);
        }
        info!("Device {} ({:?}) disconnected from port {}", entry.id, entry.class, port);
        self.publish();
        if self.autodetect() {
            self.sink
                .push(&format!("Port #{}: {} disconnected", port + 1, display_name(&entry)));
        }
        Some(port)
    }

    fn forget(&mut self, id: DeviceId) {
        self.aliases.retain(|secondary, primary| *primary != id && *secondary != id);
        if self.split_primary == Some(id) {
            self.split_primary = None;
            self.split_secondary = None;
        }
    }

    fn autodetect(&self) -> bool {
        self.settings.snapshot().autodetect_enable
    }

    /// Mirrors the port table into the shared state and the name buffer.
    fn publish(&self) {
        let autodetect = self.autodetect();
        for port in 0..MAX_PORTS {
            match self.entries.get(port) {
                Some(entry) => {
                    let binds = if autodetect {
                        Binds::for_class(entry.class)
                    } else {
                        Binds::default()
                    };
                    self.state.publish_port(port, Some(entry.class), &binds);
                    if autodetect {
                        self.settings.set_device_name(port, &display_name(entry));
                    }
                }
                None => {
                    self.state.publish_port(port, None, &Binds::unbound());
                    self.settings.set_device_name(port, "");
                }
            }
        }
    }

    fn announce(&self, port: usize) {
        if !self.autodetect() {
            return;
        }
        if let Some(entry) = self.entries.get(port) {
            self.sink
                .push(&format!("Port #{}: {} configured", port + 1, display_name(entry)));
        }
    }
}

/// Remapper or rule name, else the platform name, else the class name.
fn display_name(entry: &DeviceEntry) -> String {
    match &entry.name {
        Some(name) if !name.is_empty() => name.clone(),
        _ => entry.class.display_name().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InputSettings;
    use crate::input::device::RetroButton;
    use crate::input::event::KeyCode;
    use crate::platform::headless::{HeadlessPlatform, MemorySink};

    struct Fixture {
        platform: Arc<HeadlessPlatform>,
        state: Arc<InputState>,
        settings: SettingsStore,
        sink: Arc<MemorySink>,
        registry: DeviceRegistry,
    }

    fn fixture_with(capacity: usize, settings: InputSettings) -> Fixture {
        let platform = Arc::new(HeadlessPlatform::default());
        let state = Arc::new(InputState::new());
        let settings = SettingsStore::new(settings);
        let sink = Arc::new(MemorySink::default());
        let registry = DeviceRegistry::with_capacity(
            platform.clone(),
            state.clone(),
            settings.clone(),
            sink.clone(),
            capacity,
        );
        Fixture {
            platform,
            state,
            settings,
            sink,
            registry,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(MAX_PORTS, InputSettings::default())
    }

    #[test]
    fn test_hotplug_sequencing() {
        let mut f = fixture();
        assert_eq!(f.registry.resolve_port(10, InputSource::Gamepad).unwrap(), 0);
        assert_eq!(f.registry.resolve_port(11, InputSource::Gamepad).unwrap(), 1);
        assert_eq!(f.registry.resolve_port(12, InputSource::Gamepad).unwrap(), 2);
        assert_eq!(f.registry.resolve_port(11, InputSource::Gamepad).unwrap(), 1);
        assert_eq!(f.registry.device_count(), 3);
    }

    #[test]
    fn test_primary_device_shifts_others() {
        let mut f = fixture();
        for id in [10, 11, 12] {
            f.registry.resolve_port(id, InputSource::Gamepad).unwrap();
        }
        f.platform
            .set_device_name(20, "NVIDIA Corporation NVIDIA Controller v01.01");
        assert_eq!(f.registry.resolve_port(20, InputSource::Gamepad).unwrap(), 0);
        assert_eq!(f.registry.port_of(10), Some(1));
        assert_eq!(f.registry.port_of(11), Some(2));
        assert_eq!(f.registry.port_of(12), Some(3));
        assert_eq!(f.state.device_class(0), Some(DeviceClass::NvidiaShield));
        assert_eq!(f.settings.device_name(0).as_deref(), Some("NVIDIA Shield"));
        assert_eq!(f.state.device_count(), 4);
    }

    #[test]
    fn test_primary_shift_clears_port_state() {
        let mut f = fixture();
        f.registry.resolve_port(10, InputSource::Gamepad).unwrap();
        f.state.buttons.set(0, KeyCode::BUTTON_A.index());
        f.state.set_axis(0, 0, 500);
        f.platform.set_device_name(20, "NVIDIA Corporation NVIDIA Controller v01.03");
        f.registry.resolve_port(20, InputSource::Gamepad).unwrap();
        assert!(!f.state.buttons.get(0, KeyCode::BUTTON_A.index()));
        assert_eq!(f.state.axis(0, 0), 0);
    }

    #[test]
    fn test_primary_fills_last_port_then_refuses() {
        let mut f = fixture_with(3, InputSettings::default());
        for id in [1, 2] {
            f.registry.resolve_port(id, InputSource::Gamepad).unwrap();
        }
        f.platform.set_device_name(9, "NVIDIA Controller");
        assert_eq!(f.registry.resolve_port(9, InputSource::Gamepad).unwrap(), 0);
        assert_eq!(f.registry.device_count(), 3);
        f.registry.resolve_port(3, InputSource::Gamepad).unwrap_err();
        assert_eq!(f.registry.port_of(2), Some(2));
    }

    #[test]
    fn test_split_identity_aliases_to_same_port() {
        let mut f = fixture();
        f.registry.resolve_port(5, InputSource::Gamepad).unwrap();
        f.platform.set_device_name(30, "keypad-zeus");
        f.platform.set_device_name(31, "keypad-game-zeus");

        let first = f.registry.resolve_port(30, InputSource::Keyboard).unwrap();
        let second = f.registry.resolve_port(31, InputSource::Keyboard).unwrap();
        assert_eq!(first, 1);
        assert_eq!(second, first);
        assert_eq!(f.registry.fold_alias(31), 30);
        assert_eq!(f.registry.split_identity(), Some((30, Some(31))));
        assert_eq!(f.registry.device_count(), 2);
        assert_eq!(f.registry.port_of(5), Some(0));
        assert_eq!(f.registry.class_of(1), Some(DeviceClass::XperiaPlay));
    }

    #[test]
    fn test_split_identity_joins_when_registry_full() {
        let mut f = fixture();
        f.platform.set_device_name(30, "keypad-zeus");
        f.platform.set_device_name(31, "keypad-game-zeus");
        assert_eq!(f.registry.resolve_port(30, InputSource::Keyboard).unwrap(), 0);
        for id in 1..MAX_PORTS as DeviceId {
            f.registry.resolve_port(id, InputSource::Gamepad).unwrap();
        }
        assert_eq!(f.registry.device_count(), MAX_PORTS);

        assert_eq!(f.registry.resolve_port(31, InputSource::Keyboard).unwrap(), 0);
        assert_eq!(f.registry.device_count(), MAX_PORTS);
        f.registry.resolve_port(99, InputSource::Gamepad).unwrap_err();
    }

    #[test]
    fn test_explicit_alias() {
        let mut f = fixture();
        f.registry.resolve_port(40, InputSource::Gamepad).unwrap();
        f.registry.add_alias(41, 40);
        assert_eq!(f.registry.resolve_port(41, InputSource::Gamepad).unwrap(), 0);
        assert_eq!(f.registry.device_count(), 1);
    }

    #[test]
    fn test_overflow_keeps_existing_mappings() {
        let mut f = fixture();
        for id in 0..MAX_PORTS as DeviceId {
            assert_eq!(
                f.registry.resolve_port(100 + id, InputSource::Gamepad).unwrap(),
                id as usize
            );
        }
        let err = f.registry.resolve_port(999, InputSource::Gamepad).unwrap_err();
        assert!(matches!(err, InputError::CapacityExceeded { device_id: 999, .. }));
        for id in 0..MAX_PORTS as DeviceId {
            assert_eq!(f.registry.port_of(100 + id), Some(id as usize));
        }
        assert_eq!(f.registry.device_count(), MAX_PORTS);
    }

    #[test]
    fn test_unknown_name_still_gets_port() {
        let mut f = fixture();
        let port = f.registry.resolve_port(77, InputSource::Gamepad).unwrap();
        assert_eq!(f.registry.class_of(port), Some(DeviceClass::Generic));
        assert_eq!(f.settings.device_name(port).as_deref(), Some("Generic Gamepad"));
    }

    #[test]
    fn test_generic_keeps_raw_name() {
        let mut f = fixture();
        f.platform.set_device_name(8, "Weird Pad 3000");
        let port = f.registry.resolve_port(8, InputSource::Gamepad).unwrap();
        assert_eq!(f.settings.device_name(port).as_deref(), Some("Weird Pad 3000"));
    }

    #[test]
    fn test_autodetect_publishes_binds_and_messages() {
        let mut f = fixture();
        f.platform.set_device_name(3, "keypad-zeus");
        let port = f.registry.resolve_port(3, InputSource::Keyboard).unwrap();
        assert_eq!(f.state.bind(port, RetroButton::B), Some(KeyCode::DPAD_CENTER));
        assert_eq!(f.settings.device_name(port).as_deref(), Some("keypad-zeus"));
        assert_eq!(f.sink.messages(), vec!["Port #1: keypad-zeus configured".to_string()]);
    }

    #[test]
    fn test_autodetect_disabled_uses_standard_binds_silently() {
        let settings = InputSettings {
            autodetect_enable: false,
            ..InputSettings::default()
        };
        let mut f = fixture_with(MAX_PORTS, settings);
        f.platform.set_device_name(3, "keypad-zeus");
        let port = f.registry.resolve_port(3, InputSource::Keyboard).unwrap();
        assert_eq!(f.state.bind(port, RetroButton::B), Some(KeyCode::BUTTON_A));
        assert_eq!(f.registry.class_of(port), Some(DeviceClass::Generic));
        assert_eq!(f.settings.device_name(port), None);
        assert!(f.sink.messages().is_empty());
    }

    #[test]
    fn test_autodetect_disabled_appends_primary_devices() {
        let settings = InputSettings {
            autodetect_enable: false,
            ..InputSettings::default()
        };
        let mut f = fixture_with(MAX_PORTS, settings);
        f.platform.set_device_name(2, "NVIDIA Corporation NVIDIA Controller v01.01");
        assert_eq!(f.registry.resolve_port(1, InputSource::Gamepad).unwrap(), 0);
        assert_eq!(f.registry.resolve_port(2, InputSource::Gamepad).unwrap(), 1);
        assert_eq!(f.registry.port_of(1), Some(0));
        assert_eq!(f.registry.class_of(1), Some(DeviceClass::Generic));
    }

    #[test]
    fn test_autodetect_disabled_skips_split_identity() {
        let settings = InputSettings {
            autodetect_enable: false,
            ..InputSettings::default()
        };
        let mut f = fixture_with(MAX_PORTS, settings);
        f.platform.set_device_name(30, "keypad-zeus");
        f.platform.set_device_name(31, "keypad-game-zeus");
        assert_eq!(f.registry.resolve_port(30, InputSource::Keyboard).unwrap(), 0);
        assert_eq!(f.registry.resolve_port(31, InputSource::Keyboard).unwrap(), 1);
        assert_eq!(f.registry.split_identity(), None);
    }

    #[test]
    fn test_disconnect_compacts_ports() {
        let mut f = fixture();
        for id in [1, 2, 3] {
            f.registry.resolve_port(id, InputSource::Gamepad).unwrap();
        }
        f.state.buttons.set(2, KeyCode::BUTTON_B.index());
        assert_eq!(f.registry.disconnect(2), Some(1));
        assert_eq!(f.registry.port_of(3), Some(1));
        assert!(!f.state.buttons.get(2, KeyCode::BUTTON_B.index()));
        assert_eq!(f.state.device_count(), 2);
        assert_eq!(f.registry.disconnect(2), None);
    }

    #[test]
    fn test_disconnect_split_identity_resets_trackers() {
        let mut f = fixture();
        f.platform.set_device_name(30, "keypad-zeus");
        f.platform.set_device_name(31, "keypad-game-zeus");
        f.registry.resolve_port(30, InputSource::Keyboard).unwrap();
        f.registry.resolve_port(31, InputSource::Keyboard).unwrap();

        assert_eq!(f.registry.disconnect(31), Some(0));
        assert_eq!(
            f.sink.messages().last().map(String::as_str),
            Some("Port #1: keypad-zeus disconnected")
        );
        assert_eq!(f.registry.device_count(), 0);
        assert_eq!(f.registry.fold_alias(31), 31);

        assert_eq!(f.registry.resolve_port(31, InputSource::Keyboard).unwrap(), 0);
        assert_eq!(f.registry.resolve_port(30, InputSource::Keyboard).unwrap(), 0);
        assert_eq!(f.registry.fold_alias(30), 31);
    }

    #[test]
    fn test_remapper_class_from_input_method() {
        let mut f = fixture();
        f.platform
            .set_input_method(Some("com.hexad.bluezime/.BluezIME".to_string()));
        f.platform.set_device_name(4, "Broadcom Bluetooth HID");
        let port = f.registry.resolve_port(4, InputSource::Gamepad).unwrap();
        assert_eq!(f.registry.class_of(port), Some(DeviceClass::IControlPadBluezIme));
        assert_eq!(
            f.settings.device_name(port).as_deref(),
            Some("iControlpad SPP mode (using Bluez IME)")
        );
    }

    #[test]
    fn test_keyboard_source_gets_keyboard_binds() {
        let mut f = fixture();
        f.platform.set_device_name(6, "Logitech Dual Action");
        let port = f.registry.resolve_port(6, InputSource::Keyboard).unwrap();
        assert_eq!(f.registry.class_of(port), Some(DeviceClass::KeyboardRetropad));
        assert_eq!(f.state.bind(port, RetroButton::Start), Some(KeyCode::ENTER));
        assert_eq!(f.settings.device_name(port).as_deref(), Some("Logitech Dual Action"));
    }
}
