//! In-process platform without a real OS behind it.
//!
//! Device names, capabilities and geometry are set by the caller. Used for
//! replaying recorded event streams and by the test suites.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, RwLock};

use tracing::warn;

use super::{MessageSink, Platform};
use crate::input::decoder::{AxisQuery, EventAxisQuery};
use crate::input::event::{DeviceId, RawEvent};
use crate::input::state::Viewport;

#[derive(Debug)]
pub struct HeadlessPlatform {
    names: RwLock<HashMap<DeviceId, String>>,
    input_method: RwLock<Option<String>>,
    pre_dispatched: RwLock<HashSet<DeviceId>>,
    extended_axes: bool,
    accelerometer: bool,
    viewport: Viewport,
    finished: Mutex<Vec<(DeviceId, bool)>>,
    sensor_requests: Mutex<Vec<(bool, u32)>>,
}

impl Default for HeadlessPlatform {
    fn default() -> Self {
        Self::new(Viewport::full(1280, 720))
    }
}

impl HeadlessPlatform {
    pub fn new(viewport: Viewport) -> Self {
        Self {
            names: RwLock::new(HashMap::new()),
            input_method: RwLock::new(None),
            pre_dispatched: RwLock::new(HashSet::new()),
            extended_axes: true,
            accelerometer: false,
            viewport,
            finished: Mutex::new(Vec::new()),
            sensor_requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_extended_axes(mut self, available: bool) -> Self {
        self.extended_axes = available;
        self
    }

    pub fn with_accelerometer(mut self, available: bool) -> Self {
        self.accelerometer = available;
        self
    }

    pub fn set_device_name(&self, device_id: DeviceId, name: impl Into<String>) {
        match self.names.write() {
            Ok(mut names) => {
                names.insert(device_id, name.into());
            }
            Err(e) => warn!("Device name table poisoned: {}", e),
        }
    }

    pub fn set_input_method(&self, id: Option<String>) {
        if let Ok(mut ime) = self.input_method.write() {
            *ime = id;
        }
    }

    /// Events from this device are reported as consumed by the outer UI.
    pub fn capture_device(&self, device_id: DeviceId) {
        if let Ok(mut set) = self.pre_dispatched.write() {
            set.insert(device_id);
        }
    }

    /// `(device, handled)` for every event finished so far.
    pub fn finished_events(&self) -> Vec<(DeviceId, bool)> {
        self.finished
            .lock()
            .map(|f| f.clone())
            .unwrap_or_default()
    }

    /// `(enabled, rate_hz)` of every accelerometer request that was granted.
    pub fn sensor_requests(&self) -> Vec<(bool, u32)> {
        self.sensor_requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

impl Platform for HeadlessPlatform {
    fn device_name(&self, device_id: DeviceId) -> Option<String> {
        self.names.read().ok()?.get(&device_id).cloned()
    }

    fn input_method_id(&self) -> Option<String> {
        self.input_method.read().ok()?.clone()
    }

    fn axis_query(&self) -> Option<Arc<dyn AxisQuery>> {
        if self.extended_axes {
            Some(Arc::new(EventAxisQuery))
        } else {
            None
        }
    }

    fn has_accelerometer(&self) -> bool {
        self.accelerometer
    }

    fn set_accelerometer(&self, enabled: bool, rate_hz: u32) -> bool {
        if !self.accelerometer {
            return false;
        }
        if let Ok(mut requests) = self.sensor_requests.lock() {
            requests.push((enabled, rate_hz));
        }
        true
    }

    fn viewport(&self) -> Viewport {
        self.viewport
    }

    fn pre_dispatch(&self, event: &RawEvent) -> bool {
        self.pre_dispatched
            .read()
            .map(|set| set.contains(&event.device_id()))
            .unwrap_or(false)
    }

    fn finish_event(&self, event: &RawEvent, handled: bool) {
        if let Ok(mut finished) = self.finished.lock() {
            finished.push((event.device_id(), handled));
        }
    }
}

/// Keeps every pushed message, newest last.
#[derive(Debug, Default)]
pub struct MemorySink {
    messages: Mutex<Vec<String>>,
}

impl MemorySink {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().map(|m| m.clone()).unwrap_or_default()
    }
}

impl MessageSink for MemorySink {
    fn push(&self, message: &str) {
        if let Ok(mut messages) = self.messages.lock() {
            messages.push(message.to_string());
        }
    }

    fn clear(&self) {
        if let Ok(mut messages) = self.messages.lock() {
            messages.clear();
        }
    }
}
