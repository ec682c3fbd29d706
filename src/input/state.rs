//! Shared controller state.
//!
//! Written only by the polling task, read by anyone holding an
//! `Arc<InputState>`. Every field is an atomic with relaxed ordering; a reader
//! may see a mix of the previous and the current poll cycle, never a torn value.

use std::sync::atomic::{AtomicBool, AtomicI16, AtomicU16, AtomicU32, AtomicU8, AtomicUsize, Ordering};

use super::bitset::ButtonBitset;
use super::device::{Binds, DeviceClass, RetroButton};
use super::event::KeyCode;
use super::{AXIS_MAX, MAX_AXES, MAX_POINTERS, MAX_PORTS, POINTER_NONE};

/// Sensor bit for the accelerometer in [`InputState::sensor_mask`].
pub const SENSOR_ACCELEROMETER: u8 = 1 << 0;

/// One live contact, translated into viewport and full-screen space.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pointer {
    pub x: i16,
    pub y: i16,
    pub full_x: i16,
    pub full_y: i16,
}

impl Pointer {
    pub const NONE: Pointer = Pointer {
        x: POINTER_NONE,
        y: POINTER_NONE,
        full_x: POINTER_NONE,
        full_y: POINTER_NONE,
    };
}

/// Window geometry used to translate raw pixel positions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Viewport {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    pub full_width: u32,
    pub full_height: u32,
}

impl Viewport {
    /// Viewport covering the whole screen.
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            width,
            height,
            full_width: width,
            full_height: height,
        }
    }

    /// Maps a pixel position to `[-0x7fff, 0x7fff]` relative to the viewport
    /// and to the full screen. Coordinates outside either area become
    /// [`POINTER_NONE`]. `None` for a degenerate viewport.
    pub fn translate(&self, x: f32, y: f32) -> Option<Pointer> {
        if self.width == 0 || self.height == 0 || self.full_width == 0 || self.full_height == 0 {
            return None;
        }

        let full_x = scale(x as f64, self.full_width);
        let full_y = scale(y as f64, self.full_height);
        let vp_x = scale(x as f64 - self.x as f64, self.width);
        let vp_y = scale(y as f64 - self.y as f64, self.height);

        Some(Pointer {
            x: vp_x,
            y: vp_y,
            full_x,
            full_y,
        })
    }
}

fn scale(pos: f64, extent: u32) -> i16 {
    let max = AXIS_MAX as f64;
    let scaled = ((2.0 * pos * max) / extent as f64 - max).trunc();
    if scaled < -max || scaled > max {
        POINTER_NONE
    } else {
        scaled as i16
    }
}

#[derive(Debug)]
struct PointerSlot {
    x: AtomicI16,
    y: AtomicI16,
    full_x: AtomicI16,
    full_y: AtomicI16,
}

impl PointerSlot {
    fn new() -> Self {
        Self {
            x: AtomicI16::new(POINTER_NONE),
            y: AtomicI16::new(POINTER_NONE),
            full_x: AtomicI16::new(POINTER_NONE),
            full_y: AtomicI16::new(POINTER_NONE),
        }
    }

    fn store(&self, p: Pointer) {
        self.x.store(p.x, Ordering::Relaxed);
        self.y.store(p.y, Ordering::Relaxed);
        self.full_x.store(p.full_x, Ordering::Relaxed);
        self.full_y.store(p.full_y, Ordering::Relaxed);
    }

    fn load(&self) -> Pointer {
        Pointer {
            x: self.x.load(Ordering::Relaxed),
            y: self.y.load(Ordering::Relaxed),
            full_x: self.full_x.load(Ordering::Relaxed),
            full_y: self.full_y.load(Ordering::Relaxed),
        }
    }
}

/// Every store the poller writes and the query side reads.
#[derive(Debug)]
pub struct InputState {
    pub buttons: ButtonBitset,
    axes: [[AtomicI16; MAX_AXES]; MAX_PORTS],
    pointers: [PointerSlot; MAX_POINTERS],
    pointer_count: AtomicUsize,
    accelerometer: [AtomicU32; 3],
    sensor_mask: AtomicU8,
    connected: [AtomicBool; MAX_PORTS],
    classes: [AtomicU8; MAX_PORTS],
    binds: [[AtomicU16; RetroButton::COUNT]; MAX_PORTS],
}

impl Default for InputState {
    fn default() -> Self {
        Self::new()
    }
}

impl InputState {
    pub fn new() -> Self {
        Self {
            buttons: ButtonBitset::new(),
            axes: std::array::from_fn(|_| std::array::from_fn(|_| AtomicI16::new(0))),
            pointers: std::array::from_fn(|_| PointerSlot::new()),
            pointer_count: AtomicUsize::new(0),
            accelerometer: std::array::from_fn(|_| AtomicU32::new(0f32.to_bits())),
            sensor_mask: AtomicU8::new(0),
            connected: std::array::from_fn(|_| AtomicBool::new(false)),
            classes: std::array::from_fn(|_| AtomicU8::new(DeviceClass::Generic.index())),
            binds: std::array::from_fn(|_| std::array::from_fn(|_| AtomicU16::new(0))),
        }
    }

    // Axes

    pub fn set_axis(&self, port: usize, axis: usize, value: i16) {
        check_port(port);
        assert!(axis < MAX_AXES, "axis {axis} out of range (max {MAX_AXES})");
        self.axes[port][axis].store(value, Ordering::Relaxed);
    }

    pub fn axis(&self, port: usize, axis: usize) -> i16 {
        check_port(port);
        assert!(axis < MAX_AXES, "axis {axis} out of range (max {MAX_AXES})");
        self.axes[port][axis].load(Ordering::Relaxed)
    }

    pub fn axes(&self, port: usize) -> [i16; MAX_AXES] {
        check_port(port);
        std::array::from_fn(|i| self.axes[port][i].load(Ordering::Relaxed))
    }

    pub fn store_axes(&self, port: usize, values: &[i16; MAX_AXES]) {
        check_port(port);
        for (slot, value) in self.axes[port].iter().zip(values) {
            slot.store(*value, Ordering::Relaxed);
        }
    }

    /// Zeroes buttons and axes of a port that changes hands.
    pub fn reset_port(&self, port: usize) {
        self.buttons.clear_port(port);
        for slot in &self.axes[port] {
            slot.store(0, Ordering::Relaxed);
        }
    }

    // Pointers

    pub fn pointer_count(&self) -> usize {
        self.pointer_count.load(Ordering::Relaxed)
    }

    /// Live pointer at `index`, `None` past the live count.
    pub fn pointer(&self, index: usize) -> Option<Pointer> {
        if index < self.pointer_count().min(MAX_POINTERS) {
            Some(self.pointers[index].load())
        } else {
            None
        }
    }

    /// Writes a contact and grows the live count to cover it.
    pub fn set_pointer(&self, index: usize, pointer: Pointer) {
        assert!(index < MAX_POINTERS, "pointer {index} out of range (max {MAX_POINTERS})");
        self.pointers[index].store(pointer);
        self.pointer_count.fetch_max(index + 1, Ordering::Relaxed);
    }

    /// Removes a contact and shifts the following ones down by one.
    /// Returns false when the index was not live.
    pub fn remove_pointer(&self, index: usize) -> bool {
        let count = self.pointer_count();
        if index >= count {
            return false;
        }
        for i in index..count - 1 {
            self.pointers[i].store(self.pointers[i + 1].load());
        }
        self.pointers[count - 1].store(Pointer::NONE);
        self.pointer_count.store(count - 1, Ordering::Relaxed);
        true
    }

    pub fn clear_pointers(&self) {
        for slot in &self.pointers {
            slot.store(Pointer::NONE);
        }
        self.pointer_count.store(0, Ordering::Relaxed);
    }

    // Sensors

    pub fn set_accelerometer(&self, x: f32, y: f32, z: f32) {
        for (slot, value) in self.accelerometer.iter().zip([x, y, z]) {
            slot.store(value.to_bits(), Ordering::Relaxed);
        }
    }

    pub fn accelerometer(&self) -> [f32; 3] {
        std::array::from_fn(|i| f32::from_bits(self.accelerometer[i].load(Ordering::Relaxed)))
    }

    pub fn sensor_mask(&self) -> u8 {
        self.sensor_mask.load(Ordering::Relaxed)
    }

    pub fn enable_sensor(&self, bit: u8) {
        self.sensor_mask.fetch_or(bit, Ordering::Relaxed);
    }

    pub fn disable_sensor(&self, bit: u8) {
        self.sensor_mask.fetch_and(!bit, Ordering::Relaxed);
    }

    pub fn sensor_enabled(&self, bit: u8) -> bool {
        self.sensor_mask() & bit != 0
    }

    // Published device info

    /// Publishes what the registry knows about a port.
    pub fn publish_port(&self, port: usize, class: Option<DeviceClass>, binds: &Binds) {
        check_port(port);
        self.connected[port].store(class.is_some(), Ordering::Relaxed);
        self.classes[port].store(class.unwrap_or_default().index(), Ordering::Relaxed);
        for (slot, key) in self.binds[port].iter().zip(binds.keys.iter()) {
            slot.store(key.map_or(0, |k| k.0), Ordering::Relaxed);
        }
    }

    pub fn is_connected(&self, port: usize) -> bool {
        port < MAX_PORTS && self.connected[port].load(Ordering::Relaxed)
    }

    pub fn device_count(&self) -> usize {
        self.connected
            .iter()
            .filter(|c| c.load(Ordering::Relaxed))
            .count()
    }

    pub fn device_class(&self, port: usize) -> Option<DeviceClass> {
        if !self.is_connected(port) {
            return None;
        }
        Some(DeviceClass::from_index(self.classes[port].load(Ordering::Relaxed)))
    }

    pub fn bind(&self, port: usize, button: RetroButton) -> Option<KeyCode> {
        if port >= MAX_PORTS {
            return None;
        }
        match self.binds[port][button.index()].load(Ordering::Relaxed) {
            0 => None,
            code => Some(KeyCode(code)),
        }
    }
}

fn check_port(port: usize) {
    assert!(port < MAX_PORTS, "port {port} out of range (max {MAX_PORTS})");
}
