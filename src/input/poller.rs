//! Event poller with a statum state machine.
//!
//! # State Machine
//!
//! ```text
//! Idle ──wait()──► Draining(EventBatch) ──drain()──► Idle
//!   │
//!   └──(shutdown / all sources closed)──► Terminal
//! ```
//!
//! `wait()` multiplexes the raw input queue, the sensor queue and the
//! lifecycle command queue. While the application is paused it blocks until
//! one of them (or the pause flag, or shutdown) wakes it; otherwise it only
//! picks up what is already queued. A started drain always runs the whole
//! batch; shutdown is only looked at in `Idle`.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local};
use statum::{machine, state};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::decoder::AxisDecoder;
use super::event::{DeviceId, InputSource, KeyAction, KeyEvent, LifecycleCommand, MotionEvent, RawEvent, SensorEvent};
use super::registry::DeviceRegistry;
use super::state::{InputState, Pointer, SENSOR_ACCELEROMETER};
use super::{LAST_KEYCODE, MAX_POINTERS};
use crate::config::InputSettings;
use crate::error::InputError;
use crate::platform::{CommandHandler, Platform};

const IDLE_BACKOFF: Duration = Duration::from_millis(2);

/// Receiving ends of the three event sources.
#[derive(Debug)]
pub struct EventSources {
    pub input: mpsc::Receiver<RawEvent>,
    pub sensor: mpsc::Receiver<SensorEvent>,
    pub commands: mpsc::Receiver<LifecycleCommand>,
}

/// Sending ends handed to the platform glue.
#[derive(Debug, Clone)]
pub struct EventSenders {
    pub input: mpsc::Sender<RawEvent>,
    pub sensor: mpsc::Sender<SensorEvent>,
    pub commands: mpsc::Sender<LifecycleCommand>,
}

impl EventSources {
    pub fn channel(capacity: usize) -> (EventSenders, EventSources) {
        let (input_tx, input_rx) = mpsc::channel(capacity);
        let (sensor_tx, sensor_rx) = mpsc::channel(capacity);
        let (command_tx, command_rx) = mpsc::channel(capacity);
        (
            EventSenders {
                input: input_tx,
                sensor: sensor_tx,
                commands: command_tx,
            },
            EventSources {
                input: input_rx,
                sensor: sensor_rx,
                commands: command_rx,
            },
        )
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct ClosedSources {
    input: bool,
    sensor: bool,
    commands: bool,
}

impl ClosedSources {
    fn all(&self) -> bool {
        self.input && self.sensor && self.commands
    }
}

/// Everything queued when the poller woke up.
#[derive(Debug, Clone, Default)]
pub struct EventBatch {
    pub inputs: Vec<RawEvent>,
    pub sensors: Vec<SensorEvent>,
    pub commands: Vec<LifecycleCommand>,
}

impl EventBatch {
    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty() && self.sensors.is_empty() && self.commands.is_empty()
    }
}

/// Counters for one drain, or accumulated over many.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollStats {
    pub cycles: u64,
    pub inputs: u64,
    pub skipped: u64,
    pub unhandled: u64,
    pub unassigned: u64,
    pub sensor_samples: u64,
    pub commands: u64,
}

impl PollStats {
    /// Nothing was routed in this cycle.
    pub fn is_idle(&self) -> bool {
        self.inputs == 0 && self.sensor_samples == 0 && self.commands == 0
    }

    fn add(&mut self, other: &PollStats) {
        self.cycles += other.cycles;
        self.inputs += other.inputs;
        self.skipped += other.skipped;
        self.unhandled += other.unhandled;
        self.unassigned += other.unassigned;
        self.sensor_samples += other.sensor_samples;
        self.commands += other.commands;
    }
}

/// Poller configuration taken from the settings at startup.
#[derive(Debug, Clone, Copy)]
pub struct PollerSettings {
    pub block_when_paused: bool,
    pub stats_interval_secs: u64,
    /// Push a line per routed key or motion event to the message sink.
    pub debug_enable: bool,
}

impl Default for PollerSettings {
    fn default() -> Self {
        Self {
            block_when_paused: true,
            stats_interval_secs: 30,
            debug_enable: false,
        }
    }
}

impl From<&InputSettings> for PollerSettings {
    fn from(settings: &InputSettings) -> Self {
        Self {
            block_when_paused: settings.block_when_paused,
            stats_interval_secs: settings.stats_interval_secs,
            debug_enable: settings.debug_enable,
        }
    }
}

#[state]
#[derive(Debug, Clone)]
pub enum PollerState {
    Idle,
    Draining(EventBatch),
    Terminal,
}

#[machine]
pub struct EventPoller<S: PollerState> {
    sources: EventSources,
    closed: ClosedSources,
    registry: DeviceRegistry,
    decoder: Box<dyn AxisDecoder>,
    platform: Arc<dyn Platform>,
    input_state: Arc<InputState>,
    commands: Box<dyn CommandHandler>,
    paused: watch::Receiver<bool>,
    shutdown: CancellationToken,
    settings: PollerSettings,
    totals: PollStats,
    window: PollStats,
    window_start: DateTime<Local>,
}

/// Result of waiting in `Idle`.
pub enum Wake {
    Drain(EventPoller<Draining>),
    Shutdown(EventPoller<Terminal>),
}

enum Woke {
    Shutdown,
    Input(Option<RawEvent>),
    Sensor(Option<SensorEvent>),
    Command(Option<LifecycleCommand>),
    PauseChanged,
}

impl<S: PollerState> EventPoller<S> {
    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    pub fn totals(&self) -> PollStats {
        self.totals
    }

    pub fn decoder_name(&self) -> &'static str {
        self.decoder.name()
    }

    pub fn is_paused(&self) -> bool {
        *self.paused.borrow()
    }

    pub fn update_settings(&mut self, settings: PollerSettings) {
        self.settings = settings;
    }
}

impl EventPoller<Idle> {
    #[allow(clippy::too_many_arguments)]
    pub fn create(
        sources: EventSources,
        registry: DeviceRegistry,
        decoder: Box<dyn AxisDecoder>,
        platform: Arc<dyn Platform>,
        state: Arc<InputState>,
        commands: Box<dyn CommandHandler>,
        paused: watch::Receiver<bool>,
        shutdown: CancellationToken,
        settings: PollerSettings,
    ) -> Self {
        info!(
            "Creating event poller with {} decoder, settings: {:?}",
            decoder.name(),
            settings
        );
        Self::new(
            sources,
            ClosedSources::default(),
            registry,
            decoder,
            platform,
            state,
            commands,
            paused,
            shutdown,
            settings,
            PollStats::default(),
            PollStats::default(),
            Local::now(),
        )
    }

    /// Waits for work and collects everything currently queued.
    pub async fn wait(mut self) -> Wake {
        if self.shutdown.is_cancelled() {
            info!("Shutdown requested, poller stopping");
            return Wake::Shutdown(self.transition());
        }

        let mut batch = EventBatch::default();

        if self.settings.block_when_paused && *self.paused.borrow_and_update() && !self.closed.all() {
            debug!("Paused, blocking on event sources");
            let closed = self.closed;
            let woke = tokio::select! {
                _ = self.shutdown.cancelled() => Woke::Shutdown,
                ev = self.sources.input.recv(), if !closed.input => Woke::Input(ev),
                ev = self.sources.sensor.recv(), if !closed.sensor => Woke::Sensor(ev),
                cmd = self.sources.commands.recv(), if !closed.commands => Woke::Command(cmd),
                Ok(()) = self.paused.changed() => Woke::PauseChanged,
            };

            match woke {
                Woke::Shutdown => {
                    info!("Shutdown requested while paused, poller stopping");
                    return Wake::Shutdown(self.transition());
                }
                Woke::Input(Some(ev)) => batch.inputs.push(ev),
                Woke::Input(None) => self.closed.input = true,
                Woke::Sensor(Some(ev)) => batch.sensors.push(ev),
                Woke::Sensor(None) => self.closed.sensor = true,
                Woke::Command(Some(cmd)) => batch.commands.push(cmd),
                Woke::Command(None) => self.closed.commands = true,
                Woke::PauseChanged => debug!("Pause flag changed to {}", *self.paused.borrow()),
            }
        }

        self.collect_pending(&mut batch);

        if batch.is_empty() && self.closed.all() {
            error!("{}", InputError::SourcesClosed);
            return Wake::Shutdown(self.transition());
        }

        if !batch.is_empty() {
            debug!(
                "Collected {} input, {} sensor and {} command events",
                batch.inputs.len(),
                batch.sensors.len(),
                batch.commands.len()
            );
        }
        Wake::Drain(self.transition_with(batch))
    }

    fn collect_pending(&mut self, batch: &mut EventBatch) {
        loop {
            match self.sources.input.try_recv() {
                Ok(ev) => batch.inputs.push(ev),
                Err(mpsc::error::TryRecvError::Empty) => break,
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    if !self.closed.input {
                        warn!("Input event source disconnected");
                    }
                    self.closed.input = true;
                    break;
                }
            }
        }
        loop {
            match self.sources.sensor.try_recv() {
                Ok(ev) => batch.sensors.push(ev),
                Err(mpsc::error::TryRecvError::Empty) => break,
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    if !self.closed.sensor {
                        debug!("Sensor event source disconnected");
                    }
                    self.closed.sensor = true;
                    break;
                }
            }
        }
        loop {
            match self.sources.commands.try_recv() {
                Ok(cmd) => batch.commands.push(cmd),
                Err(mpsc::error::TryRecvError::Empty) => break,
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    if !self.closed.commands {
                        debug!("Command source disconnected");
                    }
                    self.closed.commands = true;
                    break;
                }
            }
        }
    }
}

impl EventPoller<Draining> {
    /// Routes the whole batch, then returns to `Idle`.
    pub fn drain(mut self) -> (EventPoller<Idle>, PollStats) {
        let batch = self.get_state_data().cloned().unwrap_or_default();
        let mut cycle = PollStats {
            cycles: 1,
            ..PollStats::default()
        };

        for event in &batch.inputs {
            self.route(event, &mut cycle);
        }

        self.apply_sensors(&batch.sensors, &mut cycle);

        for command in batch.commands {
            debug!("Forwarding lifecycle command {:?}", command);
            self.commands.handle(command);
            cycle.commands += 1;
        }

        self.totals.add(&cycle);
        self.window.add(&cycle);
        self.log_stats();

        (self.transition(), cycle)
    }

    fn route(&mut self, event: &RawEvent, cycle: &mut PollStats) {
        cycle.inputs += 1;
        if self.platform.pre_dispatch(event) {
            debug!("Event from device {} consumed by outer UI", event.device_id());
            cycle.skipped += 1;
            return;
        }

        let handled = match event {
            RawEvent::Motion(motion) => self.handle_motion(motion, cycle),
            RawEvent::Key(key) => self.handle_key(key, cycle),
            RawEvent::DeviceRemoved(id) => {
                if self.registry.disconnect(*id).is_none() {
                    debug!("Removal of unknown device {}", id);
                }
                true
            }
        };

        if !handled {
            cycle.unhandled += 1;
        }
        self.platform.finish_event(event, handled);
    }

    /// Touch overlay sources belong to port 0; everything else goes
    /// through the registry.
    fn resolve(&mut self, device_id: DeviceId, source: InputSource, cycle: &mut PollStats) -> Option<usize> {
        if source.is_port_zero() {
            return Some(0);
        }
        match self.registry.resolve_port(device_id, source) {
            Ok(port) => Some(port),
            Err(e) => {
                debug!("Dropping device effects: {}", e);
                cycle.unassigned += 1;
                None
            }
        }
    }

    fn handle_motion(&mut self, motion: &MotionEvent, cycle: &mut PollStats) -> bool {
        let Some(port) = self.resolve(motion.device_id, motion.source, cycle) else {
            return true;
        };

        if motion.source.updates_pointers() {
            let (x, y) = self.update_pointers(motion);
            self.show_debug(|| format!("Pad {} : x = {:.2}, y = {:.2}, src {:?}.", port, x, y, motion.source));
            return true;
        }

        let mut axes = self.input_state.axes(port);
        self.decoder.decode(motion, &mut axes);
        self.input_state.store_axes(port, &axes);
        self.show_debug(|| self.decoder.describe(motion, port));
        true
    }

    /// Applies a touch or mouse event to the pointer list. Returns the raw
    /// coordinates of the last contact written, zero on release.
    fn update_pointers(&self, motion: &MotionEvent) -> (f32, f32) {
        if motion.is_release() {
            if !self.input_state.remove_pointer(motion.action_index) {
                debug!("Release of pointer {} which is not live", motion.action_index);
            }
            return (0.0, 0.0);
        }

        let viewport = self.platform.viewport();
        let mut last = (0.0, 0.0);
        for (index, sample) in motion.pointers.iter().enumerate().take(MAX_POINTERS) {
            let pointer = viewport.translate(sample.x, sample.y).unwrap_or(Pointer::NONE);
            self.input_state.set_pointer(index, pointer);
            last = (sample.x, sample.y);
        }
        last
    }

    /// Replaces whatever the sink still shows with `line`.
    fn show_debug(&self, line: impl FnOnce() -> String) {
        if !self.settings.debug_enable {
            return;
        }
        let line = line();
        debug!("Input debug: {}", line);
        let sink = self.registry.sink();
        sink.clear();
        sink.push(&line);
    }

    fn handle_key(&mut self, key: &KeyEvent, cycle: &mut PollStats) -> bool {
        let handled = !key.keycode.is_system_reserved();
        let code = key.keycode.index();
        if code >= LAST_KEYCODE {
            debug!("Ignoring key code {} outside the tracked range", code);
            return false;
        }

        let Some(port) = self.resolve(key.device_id, key.source, cycle) else {
            return handled;
        };

        match key.action {
            KeyAction::Down => self.input_state.buttons.set(port, code),
            KeyAction::Up => self.input_state.buttons.clear(port, code),
            KeyAction::Multiple => {}
        }
        self.show_debug(|| format!("Pad {} : {}, src = {:?}.", port, code, key.source));
        handled
    }

    fn apply_sensors(&mut self, sensors: &[SensorEvent], cycle: &mut PollStats) {
        if sensors.is_empty() {
            return;
        }
        if !self.input_state.sensor_enabled(SENSOR_ACCELEROMETER) {
            debug!("Dropping {} sensor samples, accelerometer disabled", sensors.len());
            return;
        }
        if let Some(last) = sensors.last() {
            self.input_state.set_accelerometer(last.x, last.y, last.z);
        }
        cycle.sensor_samples += sensors.len() as u64;
    }

    fn log_stats(&mut self) {
        if self.settings.stats_interval_secs == 0 {
            return;
        }
        let now = Local::now();
        let elapsed = now - self.window_start;
        if elapsed < chrono::Duration::seconds(self.settings.stats_interval_secs as i64) {
            return;
        }
        let seconds = elapsed.num_seconds().max(1) as f64;
        info!(
            "Poller stats: {} cycles, {} events ({} skipped, {} unhandled, {} unassigned), {} sensor samples in {} seconds ({:.2} events/sec)",
            self.window.cycles,
            self.window.inputs,
            self.window.skipped,
            self.window.unhandled,
            self.window.unassigned,
            self.window.sensor_samples,
            elapsed.num_seconds(),
            self.window.inputs as f64 / seconds
        );
        self.window = PollStats::default();
        self.window_start = now;
    }
}

impl EventPoller<Terminal> {
    /// Final counters of a stopped poller.
    pub fn finish(self) -> PollStats {
        info!("Event poller stopped: {:?}", self.totals);
        self.totals
    }
}

/// Polls until shutdown. For hosts that dedicate a task to input.
pub async fn run_poll_loop(mut poller: EventPoller<Idle>) -> PollStats {
    info!("Entering event poll loop");
    loop {
        match poller.wait().await {
            Wake::Drain(draining) => {
                let (idle, cycle) = draining.drain();
                poller = idle;
                if cycle.is_idle() {
                    tokio::time::sleep(IDLE_BACKOFF).await;
                }
            }
            Wake::Shutdown(terminal) => return terminal.finish(),
        }
    }
}
