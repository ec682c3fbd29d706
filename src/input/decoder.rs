//! Motion event to analog axis decoding.
//!
//! Which decoder runs is negotiated once, when the driver starts: if the
//! platform exposes a per-axis query the extended decoder fills all ten axes,
//! otherwise the basic decoder reads the two stick axes from the coordinates
//! of the pointer the action refers to.

use std::fmt;
use std::sync::Arc;

use tracing::{info, warn};

use super::event::{MotionAxis, MotionEvent};
use super::{AXIS_MAX, MAX_AXES};
use crate::error::InputError;
use crate::platform::Platform;

/// Axis order of the extended decoder, one entry per logical axis slot.
pub const EXTENDED_AXES: [MotionAxis; MAX_AXES] = [
    MotionAxis::X,
    MotionAxis::Y,
    MotionAxis::Z,
    MotionAxis::Rz,
    MotionAxis::HatX,
    MotionAxis::HatY,
    MotionAxis::LTrigger,
    MotionAxis::RTrigger,
    MotionAxis::Brake,
    MotionAxis::Gas,
];

/// Scales a normalized sample to the signed 16-bit axis range.
pub fn scale_axis(sample: f32) -> i16 {
    let max = AXIS_MAX as f32;
    (sample * max).round().clamp(-max, max) as i16
}

/// Per-axis query primitive offered by some platforms.
pub trait AxisQuery: Send + Sync {
    fn axis_value(&self, event: &MotionEvent, axis: MotionAxis, pointer: usize) -> f32;
}

/// Reads the axis samples carried inside the event itself. They belong to
/// the pointer named by the event's action index.
#[derive(Debug, Default, Clone, Copy)]
pub struct EventAxisQuery;

impl AxisQuery for EventAxisQuery {
    fn axis_value(&self, event: &MotionEvent, axis: MotionAxis, pointer: usize) -> f32 {
        if pointer != event.action_index {
            return 0.0;
        }
        event
            .axes
            .iter()
            .find(|(a, _)| *a == axis)
            .map_or(0.0, |(_, v)| *v)
    }
}

pub trait AxisDecoder: Send + Sync {
    /// Writes decoded axes into `axes`; axes the decoder does not know about
    /// keep their previous value.
    fn decode(&self, event: &MotionEvent, axes: &mut [i16; MAX_AXES]);

    /// Debug line shown for a decoded event.
    fn describe(&self, event: &MotionEvent, port: usize) -> String;

    fn name(&self) -> &'static str;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct BasicDecoder;

impl AxisDecoder for BasicDecoder {
    fn decode(&self, event: &MotionEvent, axes: &mut [i16; MAX_AXES]) {
        axes[0] = scale_axis(event.x(event.action_index));
        axes[1] = scale_axis(event.y(event.action_index));
    }

    fn describe(&self, event: &MotionEvent, port: usize) -> String {
        format!(
            "Pad {} : x = {:.2}, y = {:.2}, src {:?}.",
            port,
            event.x(event.action_index),
            event.y(event.action_index),
            event.source
        )
    }

    fn name(&self) -> &'static str {
        "basic"
    }
}

pub struct ExtendedDecoder {
    query: Arc<dyn AxisQuery>,
}

impl ExtendedDecoder {
    pub fn new(query: Arc<dyn AxisQuery>) -> Self {
        Self { query }
    }
}

impl AxisDecoder for ExtendedDecoder {
    fn decode(&self, event: &MotionEvent, axes: &mut [i16; MAX_AXES]) {
        for (slot, axis) in axes.iter_mut().zip(EXTENDED_AXES) {
            *slot = scale_axis(self.query.axis_value(event, axis, event.action_index));
        }
    }

    fn describe(&self, event: &MotionEvent, port: usize) -> String {
        let value = |axis| self.query.axis_value(event, axis, event.action_index);
        format!(
            "Pad {} : x {:.2}, y {:.2}, z {:.2}, rz {:.2}, src {:?}.",
            port,
            value(MotionAxis::X),
            value(MotionAxis::Y),
            value(MotionAxis::Z),
            value(MotionAxis::Rz),
            event.source
        )
    }

    fn name(&self) -> &'static str {
        "extended"
    }
}

/// Outcome of the startup capability negotiation.
#[derive(Clone)]
pub enum DecoderStrategy {
    Basic,
    Extended(Arc<dyn AxisQuery>),
}

impl fmt::Debug for DecoderStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecoderStrategy::Basic => write!(f, "Basic"),
            DecoderStrategy::Extended(_) => write!(f, "Extended"),
        }
    }
}

impl DecoderStrategy {
    /// Probes the platform once for the per-axis query primitive.
    pub fn negotiate(platform: &dyn Platform) -> Self {
        match platform.axis_query() {
            Some(query) => {
                info!("Extended axis query available, decoding {} axes", MAX_AXES);
                DecoderStrategy::Extended(query)
            }
            None => {
                let err = InputError::CapabilityUnavailable("per-axis motion query".to_string());
                warn!("{}, falling back to basic stick decoding", err);
                DecoderStrategy::Basic
            }
        }
    }

    pub fn is_extended(&self) -> bool {
        matches!(self, DecoderStrategy::Extended(_))
    }

    pub fn into_decoder(self) -> Box<dyn AxisDecoder> {
        match self {
            DecoderStrategy::Basic => Box::new(BasicDecoder),
            DecoderStrategy::Extended(query) => Box::new(ExtendedDecoder::new(query)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::event::{InputSource, MotionAction};

    fn ten_axis_event() -> MotionEvent {
        let mut ev = MotionEvent::new(7, InputSource::Joystick, MotionAction::Move).with_pointer(0.5, -0.5);
        for (i, axis) in EXTENDED_AXES.iter().enumerate() {
            ev = ev.with_axis(*axis, (i as f32 + 1.0) / 10.0);
        }
        ev
    }

    #[test]
    fn test_scale_axis() {
        assert_eq!(scale_axis(0.0), 0);
        assert_eq!(scale_axis(1.0), 32767);
        assert_eq!(scale_axis(-1.0), -32767);
        assert_eq!(scale_axis(0.5), 16384);
        assert_eq!(scale_axis(3.0), 32767);
        assert_eq!(scale_axis(-3.0), -32767);
    }

    #[test]
    fn test_basic_only_updates_sticks() {
        let mut axes = [99i16; MAX_AXES];
        BasicDecoder.decode(&ten_axis_event(), &mut axes);
        assert_eq!(axes[0], 16384);
        assert_eq!(axes[1], -16384);
        assert!(axes[2..].iter().all(|v| *v == 99));
    }

    #[test]
    fn test_extended_fills_every_axis() {
        let mut axes = [0i16; MAX_AXES];
        ExtendedDecoder::new(Arc::new(EventAxisQuery)).decode(&ten_axis_event(), &mut axes);
        assert_eq!(axes[0], scale_axis(0.1));
        assert_eq!(axes[6], scale_axis(0.7));
        assert_eq!(axes[9], scale_axis(1.0));
    }

    #[test]
    fn test_event_query_ignores_other_pointers() {
        let ev = ten_axis_event();
        assert_eq!(EventAxisQuery.axis_value(&ev, MotionAxis::X, 1), 0.0);
        assert_eq!(EventAxisQuery.axis_value(&ev, MotionAxis::Rx, 0), 0.0);

        let ev = ev.with_action_index(1);
        assert_eq!(EventAxisQuery.axis_value(&ev, MotionAxis::X, 0), 0.0);
        assert_eq!(EventAxisQuery.axis_value(&ev, MotionAxis::X, 1), 0.1);
    }

    #[test]
    fn test_basic_reads_action_pointer() {
        let ev = MotionEvent::new(7, InputSource::Joystick, MotionAction::Move)
            .with_pointer(0.5, -0.5)
            .with_pointer(-1.0, 1.0)
            .with_action_index(1);
        let mut axes = [0i16; MAX_AXES];
        BasicDecoder.decode(&ev, &mut axes);
        assert_eq!(axes[0], -32767);
        assert_eq!(axes[1], 32767);
    }

    #[test]
    fn test_extended_reads_action_pointer() {
        let ev = ten_axis_event().with_action_index(2);
        let mut axes = [5i16; MAX_AXES];
        ExtendedDecoder::new(Arc::new(EventAxisQuery)).decode(&ev, &mut axes);
        assert_eq!(axes[0], scale_axis(0.1));
        assert_eq!(axes[9], scale_axis(1.0));
    }

    #[test]
    fn test_debug_lines() {
        let ev = ten_axis_event();
        assert_eq!(
            BasicDecoder.describe(&ev, 2),
            "Pad 2 : x = 0.50, y = -0.50, src Joystick."
        );
        assert_eq!(
            ExtendedDecoder::new(Arc::new(EventAxisQuery)).describe(&ev, 0),
            "Pad 0 : x 0.10, y 0.20, z 0.30, rz 0.40, src Joystick."
        );
    }
}
