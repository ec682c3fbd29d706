//! Desktop event source backed by gilrs.
//!
//! The collector runs on a blocking thread, turns gilrs events into
//! [`RawEvent`]s and pushes them into the poller's input channel. Device names
//! learnt on connect are shared with [`GilrsPlatform`], which answers the
//! registry's name lookups.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::Local;
use gilrs::{Axis, Button, Event, EventType, GamepadId, Gilrs};
use statum::{machine, state};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::Platform;
use crate::error::InputError;
use crate::input::decoder::{AxisQuery, EventAxisQuery};
use crate::input::event::{
    DeviceId, InputSource, KeyAction, KeyCode, KeyEvent, MotionAction, MotionAxis, MotionEvent, RawEvent,
};
use crate::input::state::Viewport;

type NameTable = Arc<RwLock<HashMap<DeviceId, String>>>;

/// Platform view of a desktop with gamepads attached through gilrs.
#[derive(Debug, Clone)]
pub struct GilrsPlatform {
    names: NameTable,
    viewport: Viewport,
}

impl GilrsPlatform {
    pub fn new(viewport: Viewport) -> Self {
        Self {
            names: Arc::new(RwLock::new(HashMap::new())),
            viewport,
        }
    }
}

impl Platform for GilrsPlatform {
    fn device_name(&self, device_id: DeviceId) -> Option<String> {
        self.names.read().ok()?.get(&device_id).cloned()
    }

    fn axis_query(&self) -> Option<Arc<dyn AxisQuery>> {
        Some(Arc::new(EventAxisQuery))
    }

    fn viewport(&self) -> Viewport {
        self.viewport
    }
}

// Axis slot order of `AXES`.
const AXIS_SLOTS: usize = 8;

const AXES: [MotionAxis; AXIS_SLOTS] = [
    MotionAxis::X,
    MotionAxis::Y,
    MotionAxis::Z,
    MotionAxis::Rz,
    MotionAxis::HatX,
    MotionAxis::HatY,
    MotionAxis::LTrigger,
    MotionAxis::RTrigger,
];

#[state]
#[derive(Debug, Clone)]
pub enum CollectionState {
    Initializing,
    Collecting,
}

#[machine]
pub struct GilrsCollector<S: CollectionState> {
    gilrs: Gilrs,
    names: NameTable,
    event_sender: mpsc::Sender<RawEvent>,

    // Last value of every axis slot, per pad.
    axes: HashMap<DeviceId, [f32; AXIS_SLOTS]>,
}

impl GilrsCollector<Initializing> {
    pub fn create(platform: &GilrsPlatform, event_sender: mpsc::Sender<RawEvent>) -> Result<Self, InputError> {
        info!("Initializing gilrs controller interface");
        let gilrs = match Gilrs::new() {
            Ok(g) => g,
            Err(e) => {
                error!("Failed to initialize gilrs: {}", e);
                return Err(InputError::InitializationError(e.to_string()));
            }
        };

        Ok(Self::new(gilrs, platform.names.clone(), event_sender, HashMap::new()))
    }

    /// Registers pads that were connected before startup.
    pub fn initialize(self) -> GilrsCollector<Collecting> {
        let pads: Vec<(DeviceId, String)> = self
            .gilrs
            .gamepads()
            .map(|(id, pad)| (device_id(id), pad.name().to_string()))
            .collect();

        if pads.is_empty() {
            warn!("No gamepad connected, waiting for hot-plug");
        }
        for (id, name) in pads {
            info!("Found gamepad {}: {}", id, name);
            self.remember_name(id, name);
        }
        self.transition()
    }

    fn remember_name(&self, id: DeviceId, name: String) {
        match self.names.write() {
            Ok(mut names) => {
                names.insert(id, name);
            }
            Err(e) => warn!("Device name table poisoned: {}", e),
        }
    }
}

impl GilrsCollector<Collecting> {
    /// Forwards every pending gilrs event. Returns false once the poller hung up.
    pub fn collect_pending(&mut self) -> bool {
        while let Some(Event { id, event, .. }) = self.gilrs.next_event() {
            let device = device_id(id);
            let Some(raw) = self.convert(id, device, event) else {
                continue;
            };
            match self.event_sender.try_send(raw) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!("Input queue full, dropping event from device {}", device);
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    info!("Input queue closed, stopping gilrs collector");
                    return false;
                }
            }
        }
        true
    }

    /// Blocking loop; run it on a blocking thread.
    pub fn run_collection_loop(&mut self, shutdown: CancellationToken) {
        info!("Starting gilrs collection loop");
        let mut forwarded_at = Local::now();
        while !shutdown.is_cancelled() {
            if !self.collect_pending() {
                break;
            }
            let now = Local::now();
            if now - forwarded_at > chrono::Duration::seconds(60) {
                debug!("gilrs collector alive, {} pads tracked", self.axes.len());
                forwarded_at = now;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        info!("gilrs collection loop finished");
    }

    fn convert(&mut self, id: GamepadId, device: DeviceId, event: EventType) -> Option<RawEvent> {
        match event {
            EventType::ButtonPressed(button, _) => map_button(button)
                .map(|key| RawEvent::Key(KeyEvent::new(device, InputSource::Gamepad, KeyAction::Down, key))),
            EventType::ButtonReleased(button, _) => map_button(button)
                .map(|key| RawEvent::Key(KeyEvent::new(device, InputSource::Gamepad, KeyAction::Up, key))),
            EventType::ButtonChanged(Button::LeftTrigger2, value, _) => self.motion(device, 6, value),
            EventType::ButtonChanged(Button::RightTrigger2, value, _) => self.motion(device, 7, value),
            EventType::AxisChanged(axis, value, _) => {
                let (slot, invert) = map_axis(axis)?;
                self.motion(device, slot, if invert { -value } else { value })
            }
            EventType::Connected => {
                let name = self.gilrs.gamepad(id).name().to_string();
                info!("Gamepad {} connected: {}", device, name);
                match self.names.write() {
                    Ok(mut names) => {
                        names.insert(device, name);
                    }
                    Err(e) => warn!("Device name table poisoned: {}", e),
                }
                None
            }
            EventType::Disconnected => {
                info!("Gamepad {} disconnected", device);
                self.axes.remove(&device);
                Some(RawEvent::DeviceRemoved(device))
            }
            _ => {
                debug!("Unhandled gilrs event: {:?}", event);
                None
            }
        }
    }

    /// Motion event carrying the pad's full axis snapshot.
    fn motion(&mut self, device: DeviceId, slot: usize, value: f32) -> Option<RawEvent> {
        let axes = self.axes.entry(device).or_insert([0.0; AXIS_SLOTS]);
        axes[slot] = value;

        let mut ev = MotionEvent::new(device, InputSource::Joystick, MotionAction::Move).with_pointer(axes[0], axes[1]);
        for (axis, value) in AXES.iter().zip(axes.iter()) {
            ev = ev.with_axis(*axis, *value);
        }
        Some(RawEvent::Motion(ev))
    }
}

/// Spawns the collector on a blocking thread.
pub fn spawn_collector(
    platform: &GilrsPlatform,
    event_sender: mpsc::Sender<RawEvent>,
    shutdown: CancellationToken,
) -> Result<JoinHandle<()>, InputError> {
    let collector = GilrsCollector::create(platform, event_sender)?;
    Ok(tokio::task::spawn_blocking(move || {
        let mut collecting = collector.initialize();
        collecting.run_collection_loop(shutdown);
    }))
}

fn device_id(id: GamepadId) -> DeviceId {
    usize::from(id) as DeviceId
}

fn map_button(button: Button) -> Option<KeyCode> {
    match button {
        Button::South => Some(KeyCode::BUTTON_A),
        Button::East => Some(KeyCode::BUTTON_B),
        Button::West => Some(KeyCode::BUTTON_X),
        Button::North => Some(KeyCode::BUTTON_Y),
        Button::C => Some(KeyCode::BUTTON_C),
        Button::Z => Some(KeyCode::BUTTON_Z),
        Button::LeftTrigger => Some(KeyCode::BUTTON_L1),
        Button::RightTrigger => Some(KeyCode::BUTTON_R1),
        Button::LeftTrigger2 => Some(KeyCode::BUTTON_L2),
        Button::RightTrigger2 => Some(KeyCode::BUTTON_R2),
        Button::Select => Some(KeyCode::BUTTON_SELECT),
        Button::Start => Some(KeyCode::BUTTON_START),
        Button::Mode => Some(KeyCode::BUTTON_MODE),
        Button::LeftThumb => Some(KeyCode::BUTTON_THUMBL),
        Button::RightThumb => Some(KeyCode::BUTTON_THUMBR),
        Button::DPadUp => Some(KeyCode::DPAD_UP),
        Button::DPadDown => Some(KeyCode::DPAD_DOWN),
        Button::DPadLeft => Some(KeyCode::DPAD_LEFT),
        Button::DPadRight => Some(KeyCode::DPAD_RIGHT),
        _ => None,
    }
}

/// Axis slot and whether the sign flips (gilrs reports up as positive).
fn map_axis(axis: Axis) -> Option<(usize, bool)> {
    match axis {
        Axis::LeftStickX => Some((0, false)),
        Axis::LeftStickY => Some((1, true)),
        Axis::RightStickX => Some((2, false)),
        Axis::RightStickY => Some((3, true)),
        Axis::DPadX => Some((4, false)),
        Axis::DPadY => Some((5, true)),
        Axis::LeftZ => Some((6, false)),
        Axis::RightZ => Some((7, false)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_face_buttons_follow_position() {
        assert_eq!(map_button(Button::South), Some(KeyCode::BUTTON_A));
        assert_eq!(map_button(Button::East), Some(KeyCode::BUTTON_B));
        assert_eq!(map_button(Button::Unknown), None);
    }

    #[test]
    fn test_vertical_axes_inverted() {
        assert_eq!(map_axis(Axis::LeftStickY), Some((1, true)));
        assert_eq!(map_axis(Axis::RightStickX), Some((2, false)));
        assert_eq!(AXES[map_axis(Axis::RightZ).unwrap().0], MotionAxis::RTrigger);
    }

    #[test]
    fn test_platform_names_from_table() {
        let platform = GilrsPlatform::new(Viewport::full(640, 480));
        platform.names.write().unwrap().insert(4, "Wireless Controller".to_string());
        assert_eq!(platform.device_name(4).as_deref(), Some("Wireless Controller"));
        assert_eq!(platform.device_name(5), None);
        assert!(platform.axis_query().is_some());
    }
}
