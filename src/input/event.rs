//! Raw platform events as they arrive from the input, sensor and command queues.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Opaque platform-assigned device identifier.
pub type DeviceId = i32;

/// Platform key code. Values follow the platform's key numbering, so a code
/// doubles as the bit index inside a port's button bitset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyCode(pub u16);

impl KeyCode {
    pub const UNKNOWN: KeyCode = KeyCode(0);
    pub const BACK: KeyCode = KeyCode(4);
    pub const DPAD_UP: KeyCode = KeyCode(19);
    pub const DPAD_DOWN: KeyCode = KeyCode(20);
    pub const DPAD_LEFT: KeyCode = KeyCode(21);
    pub const DPAD_RIGHT: KeyCode = KeyCode(22);
    pub const DPAD_CENTER: KeyCode = KeyCode(23);
    pub const VOLUME_UP: KeyCode = KeyCode(24);
    pub const VOLUME_DOWN: KeyCode = KeyCode(25);
    pub const A: KeyCode = KeyCode(29);
    pub const Q: KeyCode = KeyCode(45);
    pub const S: KeyCode = KeyCode(47);
    pub const W: KeyCode = KeyCode(51);
    pub const X: KeyCode = KeyCode(52);
    pub const Z: KeyCode = KeyCode(54);
    pub const SHIFT_RIGHT: KeyCode = KeyCode(60);
    pub const SPACE: KeyCode = KeyCode(62);
    pub const ENTER: KeyCode = KeyCode(66);
    pub const MENU: KeyCode = KeyCode(82);
    pub const BUTTON_A: KeyCode = KeyCode(96);
    pub const BUTTON_B: KeyCode = KeyCode(97);
    pub const BUTTON_C: KeyCode = KeyCode(98);
    pub const BUTTON_X: KeyCode = KeyCode(99);
    pub const BUTTON_Y: KeyCode = KeyCode(100);
    pub const BUTTON_Z: KeyCode = KeyCode(101);
    pub const BUTTON_L1: KeyCode = KeyCode(102);
    pub const BUTTON_R1: KeyCode = KeyCode(103);
    pub const BUTTON_L2: KeyCode = KeyCode(104);
    pub const BUTTON_R2: KeyCode = KeyCode(105);
    pub const BUTTON_THUMBL: KeyCode = KeyCode(106);
    pub const BUTTON_THUMBR: KeyCode = KeyCode(107);
    pub const BUTTON_START: KeyCode = KeyCode(108);
    pub const BUTTON_SELECT: KeyCode = KeyCode(109);
    pub const BUTTON_MODE: KeyCode = KeyCode(110);
    pub const VOLUME_MUTE: KeyCode = KeyCode(164);
    pub const BUTTON_1: KeyCode = KeyCode(188);

    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Keys the surrounding platform keeps handling itself.
    pub fn is_system_reserved(self) -> bool {
        matches!(
            self,
            KeyCode::VOLUME_UP | KeyCode::VOLUME_DOWN | KeyCode::VOLUME_MUTE
        )
    }
}

/// Source class reported with every input event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InputSource {
    Keyboard,
    Dpad,
    Gamepad,
    Touchscreen,
    Mouse,
    Stylus,
    Trackball,
    Touchpad,
    Joystick,
    Unknown,
}

impl InputSource {
    /// Pointer-class and touchpad sources; the touch overlay is always player 1.
    pub fn is_port_zero(self) -> bool {
        matches!(
            self,
            InputSource::Touchscreen | InputSource::Mouse | InputSource::Stylus | InputSource::Touchpad
        )
    }

    /// Sources whose motion drives the pointer list. Stylus and touchpad
    /// motion goes through the axis decoder instead.
    pub fn updates_pointers(self) -> bool {
        matches!(self, InputSource::Touchscreen | InputSource::Mouse)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyAction {
    Down,
    Up,
    Multiple,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MotionAction {
    Down,
    Up,
    Move,
    Cancel,
    Outside,
    PointerDown,
    PointerUp,
    HoverMove,
    Scroll,
}

/// Per-axis channels a motion event may carry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MotionAxis {
    X,
    Y,
    Z,
    Rz,
    HatX,
    HatY,
    LTrigger,
    RTrigger,
    Brake,
    Gas,
    Rx,
    Ry,
}

/// Raw contact position in window pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PointerSample {
    pub x: f32,
    pub y: f32,
}

#[derive(Clone, Debug)]
pub struct KeyEvent {
    pub device_id: DeviceId,
    pub source: InputSource,
    pub action: KeyAction,
    pub keycode: KeyCode,
    pub timestamp: DateTime<Local>,
}

impl KeyEvent {
    pub fn new(device_id: DeviceId, source: InputSource, action: KeyAction, keycode: KeyCode) -> Self {
        Self {
            device_id,
            source,
            action,
            keycode,
            timestamp: Local::now(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct MotionEvent {
    pub device_id: DeviceId,
    pub source: InputSource,
    pub action: MotionAction,
    /// Index of the contact the action refers to (pointer down/up).
    pub action_index: usize,
    pub pointers: Vec<PointerSample>,
    /// Extended per-axis samples. Only reachable through an `AxisQuery`.
    pub axes: Vec<(MotionAxis, f32)>,
    pub timestamp: DateTime<Local>,
}

impl MotionEvent {
    pub fn new(device_id: DeviceId, source: InputSource, action: MotionAction) -> Self {
        Self {
            device_id,
            source,
            action,
            action_index: 0,
            pointers: Vec::new(),
            axes: Vec::new(),
            timestamp: Local::now(),
        }
    }

    pub fn with_pointer(mut self, x: f32, y: f32) -> Self {
        self.pointers.push(PointerSample { x, y });
        self
    }

    pub fn with_action_index(mut self, index: usize) -> Self {
        self.action_index = index;
        self
    }

    pub fn with_axis(mut self, axis: MotionAxis, value: f32) -> Self {
        match self.axes.iter_mut().find(|(a, _)| *a == axis) {
            Some(slot) => slot.1 = value,
            None => self.axes.push((axis, value)),
        }
        self
    }

    pub fn pointer_count(&self) -> usize {
        self.pointers.len()
    }

    /// Primary x accessor; 0.0 when the contact is absent.
    pub fn x(&self, index: usize) -> f32 {
        self.pointers.get(index).map_or(0.0, |p| p.x)
    }

    pub fn y(&self, index: usize) -> f32 {
        self.pointers.get(index).map_or(0.0, |p| p.y)
    }

    /// A release removes the contact named by `action_index`. On mouse sources
    /// every action other than `Down` counts as a release.
    pub fn is_release(&self) -> bool {
        match self.action {
            MotionAction::Up | MotionAction::Cancel | MotionAction::PointerUp => true,
            MotionAction::Down => false,
            _ => self.source == InputSource::Mouse,
        }
    }
}

/// One item of the raw input queue.
#[derive(Clone, Debug)]
pub enum RawEvent {
    Key(KeyEvent),
    Motion(MotionEvent),
    /// The platform reported the device as gone.
    DeviceRemoved(DeviceId),
}

impl RawEvent {
    pub fn device_id(&self) -> DeviceId {
        match self {
            RawEvent::Key(k) => k.device_id,
            RawEvent::Motion(m) => m.device_id,
            RawEvent::DeviceRemoved(id) => *id,
        }
    }

    pub fn source(&self) -> InputSource {
        match self {
            RawEvent::Key(k) => k.source,
            RawEvent::Motion(m) => m.source,
            RawEvent::DeviceRemoved(_) => InputSource::Unknown,
        }
    }
}

/// Accelerometer sample from the sensor queue.
#[derive(Clone, Copy, Debug)]
pub struct SensorEvent {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub timestamp: DateTime<Local>,
}

impl SensorEvent {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self {
            x,
            y,
            z,
            timestamp: Local::now(),
        }
    }
}

/// Application lifecycle commands. Forwarded untouched to the command handler.
#[derive(Clone, Debug, PartialEq)]
pub enum LifecycleCommand {
    Paused,
    Resumed,
    FocusGained,
    FocusLost,
    SurfaceChanged { width: u32, height: u32 },
    LowMemory,
    Destroy,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_release_actions() {
        let up = MotionEvent::new(1, InputSource::Touchscreen, MotionAction::Up);
        let cancel = MotionEvent::new(1, InputSource::Touchscreen, MotionAction::Cancel);
        let ptr_up = MotionEvent::new(1, InputSource::Touchscreen, MotionAction::PointerUp);
        let moved = MotionEvent::new(1, InputSource::Touchscreen, MotionAction::Move);
        assert!(up.is_release());
        assert!(cancel.is_release());
        assert!(ptr_up.is_release());
        assert!(!moved.is_release());
    }

    #[test]
    fn test_mouse_non_down_is_release() {
        let mouse_move = MotionEvent::new(1, InputSource::Mouse, MotionAction::Move);
        let mouse_down = MotionEvent::new(1, InputSource::Mouse, MotionAction::Down);
        assert!(mouse_move.is_release());
        assert!(!mouse_down.is_release());
    }

    #[test]
    fn test_with_axis_overwrites() {
        let ev = MotionEvent::new(3, InputSource::Joystick, MotionAction::Move)
            .with_axis(MotionAxis::Z, 0.2)
            .with_axis(MotionAxis::Z, -0.4);
        assert_eq!(ev.axes, vec![(MotionAxis::Z, -0.4)]);
    }

    #[test]
    fn test_touchpad_is_port_zero_without_pointers() {
        assert!(InputSource::Touchpad.is_port_zero());
        assert!(!InputSource::Touchpad.updates_pointers());
        assert!(InputSource::Touchscreen.is_port_zero() && InputSource::Touchscreen.updates_pointers());
        assert!(InputSource::Mouse.is_port_zero() && InputSource::Mouse.updates_pointers());
        assert!(InputSource::Stylus.is_port_zero() && !InputSource::Stylus.updates_pointers());
        assert!(!InputSource::Gamepad.is_port_zero());
        assert!(!InputSource::Joystick.is_port_zero());
    }

    #[test]
    fn test_volume_keys_reserved() {
        assert!(KeyCode::VOLUME_UP.is_system_reserved());
        assert!(KeyCode::VOLUME_MUTE.is_system_reserved());
        assert!(!KeyCode::BUTTON_A.is_system_reserved());
    }
}
