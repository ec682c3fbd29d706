//! Input subsystem: raw platform events in, per-port controller state out.
//!
//! Processing pipeline:
//!
//! 1. [`event`] - raw key, motion, sensor and lifecycle events
//! 2. [`poller`] - drains the event sources and routes every event
//! 3. [`registry`] / [`device`] - hot-plug detection and device classification
//! 4. [`decoder`] - motion event to analog axes, chosen once at startup
//! 5. [`state`] / [`bitset`] - lock-free stores written by the poller
//! 6. [`query`] / [`driver`] - read side used by the emulation loop
//!
//! # Architecture
//!
//! ```text
//! platform ──► Poller ──► Registry ──► Decoder / bit ops ──► InputState
//!                                                              │
//!                                      emulation loop ◄── InputQuery
//! ```
//!
//! The poller is the only writer. Readers go through [`query::InputQuery`] and
//! may observe state that is one poll cycle old.

pub mod bitset;
pub mod decoder;
pub mod device;
pub mod driver;
pub mod event;
pub mod poller;
pub mod query;
pub mod registry;
pub mod state;

/// Logical controller slots.
pub const MAX_PORTS: usize = 8;
/// Decoded analog axes per port.
pub const MAX_AXES: usize = 10;
/// Simultaneous touch or mouse contacts.
pub const MAX_POINTERS: usize = 16;
/// Exclusive upper bound of key codes tracked per port. Covers every key code
/// the platform defines, up to and including 288.
pub const LAST_KEYCODE: usize = 289;
/// Pointer coordinate outside the viewport.
pub const POINTER_NONE: i16 = -0x8000;
/// Full-scale magnitude of an analog axis.
pub const AXIS_MAX: i16 = 0x7fff;

pub use decoder::{AxisDecoder, DecoderStrategy};
pub use device::{Binds, DeviceClass, RetroButton};
pub use driver::{InputDriver, JoypadDriver, PlatformInput, PlatformJoypad};
pub use event::{DeviceId, InputSource, KeyCode, LifecycleCommand, RawEvent, SensorEvent};
pub use poller::{EventPoller, EventSenders, EventSources, PollStats, PollerSettings};
pub use query::{AnalogAxis, AnalogStick, AxisBind, AxisPolarity, DeviceQuery, InputQuery, PointerId, SensorAxis};
pub use registry::DeviceRegistry;
pub use state::{InputState, Pointer, Viewport};
