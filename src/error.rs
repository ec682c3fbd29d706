//! Error types of the input subsystem.
//!
//! Everything here is recoverable: the poller logs and absorbs these per event.
//! Out-of-range port or key code access is not an error value but a panic in
//! the state stores, since it can only come from a logic defect.

use crate::input::DeviceId;

#[derive(Debug, thiserror::Error)]
pub enum InputError {
    /// Every port is taken. The event is accepted but gets no port.
    #[error("No free port for device {device_id} (capacity {capacity})")]
    CapacityExceeded { device_id: DeviceId, capacity: usize },

    /// Name lookup failed or matched no known model; the device is generic.
    #[error("Unknown device {device_id}: {name:?}")]
    UnknownDevice {
        device_id: DeviceId,
        name: Option<String>,
    },

    /// Optional platform capability is missing.
    #[error("Capability unavailable: {0}")]
    CapabilityUnavailable(String),

    /// Sensor enable requested on hardware without that sensor.
    #[error("Sensor unavailable on port {port}")]
    SensorUnavailable { port: usize },

    /// Every event source hung up.
    #[error("All event sources closed")]
    SourcesClosed,

    #[error("Initialization error: {0}")]
    InitializationError(String),
}
