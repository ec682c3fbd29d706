//! Boundary to the host platform.
//!
//! The input subsystem never talks to the OS directly. Everything it needs
//! from outside (device names, the active input method, optional axis and
//! sensor capabilities, window geometry) comes through [`Platform`]; lifecycle
//! commands leave through [`CommandHandler`] and user-facing notices through
//! [`MessageSink`].

pub mod headless;

#[cfg(feature = "desktop")]
pub mod gilrs_source;

use std::sync::Arc;

use tracing::info;

use crate::input::decoder::AxisQuery;
use crate::input::event::{DeviceId, LifecycleCommand, RawEvent};
use crate::input::state::Viewport;

pub use headless::HeadlessPlatform;

pub trait Platform: Send + Sync {
    /// Human readable device name. `None` when the lookup fails.
    fn device_name(&self, device_id: DeviceId) -> Option<String>;

    /// Identifier of the active input method (on-screen keyboard or remapper).
    fn input_method_id(&self) -> Option<String> {
        None
    }

    /// Per-axis motion query. Probed once at startup.
    fn axis_query(&self) -> Option<Arc<dyn AxisQuery>> {
        None
    }

    fn has_accelerometer(&self) -> bool {
        false
    }

    /// Starts or stops accelerometer delivery. Returns false if refused.
    fn set_accelerometer(&self, _enabled: bool, _rate_hz: u32) -> bool {
        false
    }

    fn viewport(&self) -> Viewport;

    /// True when an outer UI layer consumed the event already.
    fn pre_dispatch(&self, _event: &RawEvent) -> bool {
        false
    }

    /// Reports whether the event was consumed; unhandled events keep the
    /// platform's default behaviour.
    fn finish_event(&self, _event: &RawEvent, _handled: bool) {}
}

/// Receiver of lifecycle commands. The input subsystem does not interpret them.
pub trait CommandHandler: Send {
    fn handle(&mut self, command: LifecycleCommand);
}

impl<F> CommandHandler for F
where
    F: FnMut(LifecycleCommand) + Send,
{
    fn handle(&mut self, command: LifecycleCommand) {
        self(command)
    }
}

/// Best-effort on-screen message queue.
pub trait MessageSink: Send + Sync {
    fn push(&self, message: &str);

    /// Drops queued messages that were not shown yet.
    fn clear(&self) {}
}

/// Sink that only logs.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl MessageSink for LogSink {
    fn push(&self, message: &str) {
        info!("{}", message);
    }
}
