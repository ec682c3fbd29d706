//! Input subsystem of an emulation frontend.
//!
//! Raw platform events (keys, motion, touch, sensors, lifecycle commands) are
//! polled into lock-free per-port controller state that the emulation loop
//! reads on demand. See [`input`] for the pipeline and [`platform`] for the
//! host boundary.

pub mod config;
pub mod error;
pub mod input;
pub mod platform;

pub use error::InputError;
