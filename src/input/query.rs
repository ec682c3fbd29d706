//! Read side of the input state.
//!
//! Everything here is a plain atomic read; nothing blocks and nothing fails.
//! Invalid ports or indices read as zero / released.

use std::sync::Arc;

use super::device::{Binds, DeviceClass, RetroButton};
use super::event::KeyCode;
use super::state::InputState;
use super::{AXIS_MAX, LAST_KEYCODE, MAX_AXES, MAX_PORTS, POINTER_NONE};
use crate::config::InputSettings;

pub const DEVICE_JOYPAD: u32 = 1;
pub const DEVICE_ANALOG: u32 = 5;
pub const DEVICE_POINTER: u32 = 6;

/// Device types this subsystem can answer queries for.
pub const CAPABILITIES: u64 = (1 << DEVICE_JOYPAD) | (1 << DEVICE_ANALOG) | (1 << DEVICE_POINTER);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AxisPolarity {
    Positive,
    Negative,
}

/// Half of a logical axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AxisBind {
    pub axis: usize,
    pub polarity: AxisPolarity,
}

impl AxisBind {
    pub const fn positive(axis: usize) -> Self {
        Self {
            axis,
            polarity: AxisPolarity::Positive,
        }
    }

    pub const fn negative(axis: usize) -> Self {
        Self {
            axis,
            polarity: AxisPolarity::Negative,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AnalogStick {
    Left,
    Right,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AnalogAxis {
    X,
    Y,
}

impl AnalogStick {
    /// Axis slot backing one direction of the stick.
    pub fn axis_index(self, axis: AnalogAxis) -> usize {
        match (self, axis) {
            (AnalogStick::Left, AnalogAxis::X) => 0,
            (AnalogStick::Left, AnalogAxis::Y) => 1,
            (AnalogStick::Right, AnalogAxis::X) => 2,
            (AnalogStick::Right, AnalogAxis::Y) => 3,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointerId {
    X,
    Y,
    Pressed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SensorAxis {
    AccelX,
    AccelY,
    AccelZ,
}

/// One state query as issued by the emulation core.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeviceQuery {
    Joypad(RetroButton),
    Analog { stick: AnalogStick, axis: AnalogAxis },
    /// Viewport-relative pointer.
    Pointer { index: usize, id: PointerId },
    /// Full-screen pointer.
    ScreenPointer { index: usize, id: PointerId },
}

#[derive(Clone, Debug)]
pub struct InputQuery {
    state: Arc<InputState>,
    dead_zone: f32,
    keyboard_fallback: bool,
    keyboard_binds: Binds,
}

impl InputQuery {
    pub fn new(state: Arc<InputState>, settings: &InputSettings) -> Self {
        Self {
            state,
            dead_zone: settings.analog_dead_zone,
            keyboard_fallback: settings.keyboard_fallback,
            keyboard_binds: settings.keyboard_binds(),
        }
    }

    pub fn update_settings(&mut self, settings: &InputSettings) {
        self.dead_zone = settings.analog_dead_zone;
        self.keyboard_fallback = settings.keyboard_fallback;
        self.keyboard_binds = settings.keyboard_binds();
    }

    pub fn state(&self) -> &Arc<InputState> {
        &self.state
    }

    /// Raw key bit of a port.
    pub fn key_down(&self, port: usize, key: KeyCode) -> bool {
        port < MAX_PORTS && key.index() < LAST_KEYCODE && self.state.buttons.get(port, key.index())
    }

    /// Bound key, virtual press mask, or (port 0 only) the keyboard binds.
    pub fn button_pressed(&self, port: usize, button: RetroButton, virtual_mask: u16) -> bool {
        if port >= MAX_PORTS {
            return false;
        }
        if virtual_mask & button.mask() != 0 {
            return true;
        }
        if let Some(key) = self.state.bind(port, button) {
            if self.key_down(port, key) {
                return true;
            }
        }
        if port == 0 && self.keyboard_fallback {
            if let Some(key) = self.keyboard_binds.get(button) {
                return self.key_down(0, key);
            }
        }
        false
    }

    /// Stored axis value, zeroed when it lies on the other side of `bind`.
    pub fn axis(&self, port: usize, bind: AxisBind) -> i16 {
        if port >= MAX_PORTS || bind.axis >= MAX_AXES {
            return 0;
        }
        let value = self.state.axis(port, bind.axis);
        match bind.polarity {
            AxisPolarity::Positive if value > 0 => value,
            AxisPolarity::Negative if value < 0 => value,
            _ => 0,
        }
    }

    pub fn analog(&self, port: usize, stick: AnalogStick, axis: AnalogAxis) -> i16 {
        let index = stick.axis_index(axis);
        let plus = i32::from(self.axis(port, AxisBind::positive(index))).abs();
        let minus = i32::from(self.axis(port, AxisBind::negative(index))).abs();
        let value = plus - minus;

        if (value.abs() as f32) < self.dead_zone * AXIS_MAX as f32 {
            return 0;
        }
        value.clamp(-i32::from(AXIS_MAX), i32::from(AXIS_MAX)) as i16
    }

    /// Pointer coordinate or pressed flag. `screen` selects full-screen
    /// coordinates instead of viewport ones.
    pub fn pointer(&self, index: usize, id: PointerId, screen: bool) -> i16 {
        let Some(pointer) = self.state.pointer(index) else {
            return 0;
        };
        let (x, y) = if screen {
            (pointer.full_x, pointer.full_y)
        } else {
            (pointer.x, pointer.y)
        };
        match id {
            PointerId::X => x,
            PointerId::Y => y,
            PointerId::Pressed => i16::from(x != POINTER_NONE && y != POINTER_NONE),
        }
    }

    pub fn sensor(&self, axis: SensorAxis) -> f32 {
        let [x, y, z] = self.state.accelerometer();
        match axis {
            SensorAxis::AccelX => x,
            SensorAxis::AccelY => y,
            SensorAxis::AccelZ => z,
        }
    }

    /// Single entry point used by the driver contract.
    pub fn input_state(&self, port: usize, query: DeviceQuery, virtual_mask: u16) -> i16 {
        match query {
            DeviceQuery::Joypad(button) => i16::from(self.button_pressed(port, button, virtual_mask)),
            DeviceQuery::Analog { stick, axis } => self.analog(port, stick, axis),
            DeviceQuery::Pointer { index, id } => self.pointer(index, id, false),
            DeviceQuery::ScreenPointer { index, id } => self.pointer(index, id, true),
        }
    }

    pub fn capabilities(&self) -> u64 {
        CAPABILITIES
    }

    pub fn device_count(&self) -> usize {
        self.state.device_count()
    }

    pub fn device_class(&self, port: usize) -> Option<DeviceClass> {
        self.state.device_class(port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::state::Pointer;

    fn query() -> InputQuery {
        InputQuery::new(Arc::new(InputState::new()), &InputSettings::default())
    }

    #[test]
    fn test_axis_polarity_zeroing() {
        let q = query();
        q.state().set_axis(0, 0, -12000);
        assert_eq!(q.axis(0, AxisBind::negative(0)), -12000);
        assert_eq!(q.axis(0, AxisBind::positive(0)), 0);

        q.state().set_axis(0, 0, 12000);
        assert_eq!(q.axis(0, AxisBind::positive(0)), 12000);
        assert_eq!(q.axis(0, AxisBind::negative(0)), 0);
    }

    #[test]
    fn test_invalid_queries_read_zero() {
        let q = query();
        assert_eq!(q.axis(MAX_PORTS, AxisBind::positive(0)), 0);
        assert_eq!(q.axis(0, AxisBind::positive(MAX_AXES)), 0);
        assert!(!q.button_pressed(MAX_PORTS, RetroButton::A, 0));
        assert!(!q.key_down(0, KeyCode(LAST_KEYCODE as u16)));
        assert_eq!(q.pointer(3, PointerId::Pressed, false), 0);
        assert_eq!(q.device_class(0), None);
    }

    #[test]
    fn test_analog_sums_halves() {
        let q = query();
        q.state().set_axis(1, 2, -20000);
        q.state().set_axis(1, 3, 5000);
        assert_eq!(q.analog(1, AnalogStick::Right, AnalogAxis::X), -20000);
        assert_eq!(q.analog(1, AnalogStick::Right, AnalogAxis::Y), 5000);
        assert_eq!(q.analog(1, AnalogStick::Left, AnalogAxis::X), 0);
    }

    #[test]
    fn test_analog_dead_zone() {
        let settings = InputSettings {
            analog_dead_zone: 0.25,
            ..InputSettings::default()
        };
        let q = InputQuery::new(Arc::new(InputState::new()), &settings);
        q.state().set_axis(0, 0, 8000);
        q.state().set_axis(0, 1, -9000);
        assert_eq!(q.analog(0, AnalogStick::Left, AnalogAxis::X), 0);
        assert_eq!(q.analog(0, AnalogStick::Left, AnalogAxis::Y), -9000);
    }

    #[test]
    fn test_button_uses_published_bind() {
        let q = query();
        q.state().publish_port(1, Some(DeviceClass::Generic), &Binds::default());
        q.state().buttons.set(1, KeyCode::BUTTON_A.index());
        assert!(q.button_pressed(1, RetroButton::B, 0));
        assert!(!q.button_pressed(1, RetroButton::A, 0));
    }

    #[test]
    fn test_virtual_mask() {
        let q = query();
        assert!(q.button_pressed(2, RetroButton::Start, RetroButton::Start.mask()));
        assert!(!q.button_pressed(2, RetroButton::Select, RetroButton::Start.mask()));
    }

    #[test]
    fn test_keyboard_fallback_port_zero_only() {
        let q = query();
        q.state().buttons.set(0, KeyCode::ENTER.index());
        q.state().buttons.set(1, KeyCode::ENTER.index());
        assert!(q.button_pressed(0, RetroButton::Start, 0));
        assert!(!q.button_pressed(1, RetroButton::Start, 0));

        let settings = InputSettings {
            keyboard_fallback: false,
            ..InputSettings::default()
        };
        let q = InputQuery::new(q.state().clone(), &settings);
        assert!(!q.button_pressed(0, RetroButton::Start, 0));
    }

    #[test]
    fn test_pointer_pressed_and_coordinates() {
        let q = query();
        q.state().set_pointer(
            0,
            Pointer {
                x: 100,
                y: -200,
                full_x: 300,
                full_y: -400,
            },
        );
        q.state().set_pointer(
            1,
            Pointer {
                x: POINTER_NONE,
                y: 10,
                full_x: 5,
                full_y: 10,
            },
        );
        assert_eq!(q.pointer(0, PointerId::X, false), 100);
        assert_eq!(q.pointer(0, PointerId::Y, true), -400);
        assert_eq!(q.pointer(0, PointerId::Pressed, false), 1);
        assert_eq!(q.pointer(1, PointerId::Pressed, false), 0);
        assert_eq!(q.pointer(1, PointerId::Pressed, true), 1);
        assert_eq!(
            q.input_state(0, DeviceQuery::ScreenPointer { index: 0, id: PointerId::X }, 0),
            300
        );
    }

    #[test]
    fn test_sensor_and_capabilities() {
        let q = query();
        q.state().set_accelerometer(0.5, -9.8, 1.0);
        assert_eq!(q.sensor(SensorAxis::AccelY), -9.8);
        assert_eq!(q.capabilities(), 0b110_0010);
    }
}
