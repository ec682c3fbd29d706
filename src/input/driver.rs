//! Driver contracts offered to the rest of the frontend.
//!
//! [`PlatformInput`] is the context object that owns the poller and hands
//! out the read side. There is no global state; a host creates one per
//! process and keeps it next to its emulation loop.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::decoder::DecoderStrategy;
use super::device::RetroButton;
use super::event::KeyCode;
use super::poller::{EventPoller, EventSources, Idle, PollStats, PollerSettings, Wake};
use super::query::{AxisBind, DeviceQuery, InputQuery, SensorAxis};
use super::registry::DeviceRegistry;
use super::state::{InputState, SENSOR_ACCELEROMETER};
use super::MAX_PORTS;
use crate::config::SettingsStore;
use crate::error::InputError;
use crate::platform::{CommandHandler, MessageSink, Platform};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SensorAction {
    Enable,
    Disable,
}

/// Everything a driver needs from its host.
pub struct InputContext {
    pub platform: Arc<dyn Platform>,
    pub settings: SettingsStore,
    pub sink: Arc<dyn MessageSink>,
    pub sources: EventSources,
    pub commands: Box<dyn CommandHandler>,
    pub paused: watch::Receiver<bool>,
    pub shutdown: CancellationToken,
}

pub trait InputDriver: Sized {
    type Joypad: JoypadDriver;

    fn init(ctx: InputContext) -> Result<Self, InputError>;

    /// Runs one wake cycle of the poller.
    fn poll(&mut self) -> impl Future<Output = PollStats> + Send;

    fn input_state(&self, port: usize, query: DeviceQuery) -> i16;

    /// Port 0 hotkey test.
    fn key_pressed(&self, button: RetroButton) -> bool;

    fn free(&mut self);

    /// A rate of 0 Hz selects the configured default.
    fn set_sensor_state(&mut self, port: usize, action: SensorAction, rate_hz: u32) -> Result<(), InputError>;

    fn sensor_input(&self, port: usize, axis: SensorAxis) -> f32;

    fn capabilities(&self) -> u64;

    fn device_count(&self) -> usize;

    fn joypad(&self) -> &Self::Joypad;
}

/// Joypad abstraction used by binding and remapping code.
pub trait JoypadDriver {
    fn init(&mut self) -> bool;

    fn query_pad(&self, port: usize) -> bool;

    fn destroy(&mut self);

    fn button(&self, port: usize, key: KeyCode) -> bool;

    fn axis(&self, port: usize, bind: AxisBind) -> i16;

    /// State is pushed by the input poller; nothing to do here.
    fn poll(&mut self) {}

    fn name(&self, port: usize) -> Option<String>;
}

pub struct PlatformInput {
    poller: Option<EventPoller<Idle>>,
    platform: Arc<dyn Platform>,
    settings: SettingsStore,
    state: Arc<InputState>,
    query: InputQuery,
    joypad: PlatformJoypad,
    shutdown: CancellationToken,
    virtual_buttons: [u16; MAX_PORTS],
    extended: bool,
    totals: PollStats,
}

impl PlatformInput {
    pub fn query(&self) -> InputQuery {
        self.query.clone()
    }

    pub fn registry(&self) -> Option<&DeviceRegistry> {
        self.poller.as_ref().map(|p| p.registry())
    }

    pub fn is_running(&self) -> bool {
        self.poller.is_some()
    }

    pub fn is_extended(&self) -> bool {
        self.extended
    }

    pub fn totals(&self) -> PollStats {
        self.poller.as_ref().map_or(self.totals, |p| p.totals())
    }

    /// Buttons pressed by an on-screen overlay or similar, per port.
    pub fn set_virtual_buttons(&mut self, port: usize, mask: u16) {
        if port < MAX_PORTS {
            self.virtual_buttons[port] = mask;
        }
    }

    /// Picks up changed settings between polls.
    pub fn reload_settings(&mut self) {
        let settings = self.settings.snapshot();
        self.query.update_settings(&settings);
        self.joypad.query.update_settings(&settings);
        if let Some(poller) = self.poller.as_mut() {
            poller.update_settings(PollerSettings::from(&settings));
        }
        debug!("Input settings reloaded: {:?}", settings);
    }
}

impl InputDriver for PlatformInput {
    type Joypad = PlatformJoypad;

    fn init(ctx: InputContext) -> Result<Self, InputError> {
        let settings = ctx.settings.snapshot();
        settings
            .validate()
            .map_err(|e| InputError::InitializationError(e.to_string()))?;

        let state = Arc::new(InputState::new());
        let strategy = DecoderStrategy::negotiate(ctx.platform.as_ref());
        let extended = strategy.is_extended();

        let registry = DeviceRegistry::new(ctx.platform.clone(), state.clone(), ctx.settings.clone(), ctx.sink);
        let poller = EventPoller::create(
            ctx.sources,
            registry,
            strategy.into_decoder(),
            ctx.platform.clone(),
            state.clone(),
            ctx.commands,
            ctx.paused,
            ctx.shutdown.clone(),
            PollerSettings::from(&settings),
        );

        let query = InputQuery::new(state.clone(), &settings);
        let mut joypad = PlatformJoypad::new(query.clone(), ctx.settings.clone());
        joypad.init();

        info!("Platform input initialized (extended axes: {})", extended);
        Ok(Self {
            poller: Some(poller),
            platform: ctx.platform,
            settings: ctx.settings,
            state,
            query,
            joypad,
            shutdown: ctx.shutdown,
            virtual_buttons: [0; MAX_PORTS],
            extended,
            totals: PollStats::default(),
        })
    }

    fn poll(&mut self) -> impl Future<Output = PollStats> + Send {
        async move {
            let Some(poller) = self.poller.take() else {
                return PollStats::default();
            };
            match poller.wait().await {
                Wake::Drain(draining) => {
                    let (idle, stats) = draining.drain();
                    self.poller = Some(idle);
                    stats
                }
                Wake::Shutdown(terminal) => {
                    self.totals = terminal.finish();
                    PollStats::default()
                }
            }
        }
    }

    fn input_state(&self, port: usize, query: DeviceQuery) -> i16 {
        let mask = self.virtual_buttons.get(port).copied().unwrap_or(0);
        self.query.input_state(port, query, mask)
    }

    fn key_pressed(&self, button: RetroButton) -> bool {
        self.query.button_pressed(0, button, self.virtual_buttons[0])
    }

    fn free(&mut self) {
        self.shutdown.cancel();
        if let Some(poller) = self.poller.take() {
            self.totals = poller.totals();
        }
        if self.state.sensor_enabled(SENSOR_ACCELEROMETER) {
            self.platform.set_accelerometer(false, 0);
            self.state.disable_sensor(SENSOR_ACCELEROMETER);
        }
        self.state.clear_pointers();
        self.joypad.destroy();
        info!("Platform input freed after {} poll cycles", self.totals.cycles);
    }

    fn set_sensor_state(&mut self, port: usize, action: SensorAction, rate_hz: u32) -> Result<(), InputError> {
        if port >= MAX_PORTS || !self.platform.has_accelerometer() {
            return Err(InputError::SensorUnavailable { port });
        }

        match action {
            SensorAction::Enable => {
                let rate = if rate_hz == 0 {
                    self.settings.snapshot().default_sensor_rate_hz
                } else {
                    rate_hz
                };
                if !self.platform.set_accelerometer(true, rate) {
                    warn!("Platform refused to enable the accelerometer at {} Hz", rate);
                    return Err(InputError::SensorUnavailable { port });
                }
                self.state.enable_sensor(SENSOR_ACCELEROMETER);
                info!("Accelerometer enabled at {} Hz", rate);
            }
            SensorAction::Disable => {
                self.platform.set_accelerometer(false, 0);
                self.state.disable_sensor(SENSOR_ACCELEROMETER);
                info!("Accelerometer disabled");
            }
        }
        Ok(())
    }

    fn sensor_input(&self, port: usize, axis: SensorAxis) -> f32 {
        if port >= MAX_PORTS {
            return 0.0;
        }
        self.query.sensor(axis)
    }

    fn capabilities(&self) -> u64 {
        self.query.capabilities()
    }

    fn device_count(&self) -> usize {
        self.query.device_count()
    }

    fn joypad(&self) -> &PlatformJoypad {
        &self.joypad
    }
}

pub struct PlatformJoypad {
    query: InputQuery,
    settings: SettingsStore,
    active: bool,
}

impl PlatformJoypad {
    pub fn new(query: InputQuery, settings: SettingsStore) -> Self {
        Self {
            query,
            settings,
            active: false,
        }
    }
}

impl JoypadDriver for PlatformJoypad {
    /// Every port starts out named "Custom" until hot-plug detection names it.
    fn init(&mut self) -> bool {
        for port in 0..MAX_PORTS {
            self.settings.set_device_name(port, "Custom");
        }
        self.active = true;
        true
    }

    fn query_pad(&self, port: usize) -> bool {
        self.active && self.query.state().is_connected(port)
    }

    fn destroy(&mut self) {
        self.active = false;
    }

    fn button(&self, port: usize, key: KeyCode) -> bool {
        self.active && self.query.key_down(port, key)
    }

    fn axis(&self, port: usize, bind: AxisBind) -> i16 {
        if !self.active {
            return 0;
        }
        self.query.axis(port, bind)
    }

    fn name(&self, port: usize) -> Option<String> {
        if !self.query_pad(port) {
            return None;
        }
        self.settings
            .device_name(port)
            .or_else(|| self.query.device_class(port).map(|c| c.display_name().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InputSettings;
    use crate::input::event::{InputSource, KeyAction, KeyEvent, LifecycleCommand, RawEvent, SensorEvent};
    use crate::input::poller::EventSenders;
    use crate::input::query::{AnalogAxis, AnalogStick, PointerId};
    use crate::input::DeviceClass;
    use crate::platform::headless::{HeadlessPlatform, MemorySink};

    struct Setup {
        driver: PlatformInput,
        senders: EventSenders,
        shutdown: CancellationToken,
        _paused: watch::Sender<bool>,
    }

    fn setup_with(platform: Arc<HeadlessPlatform>, settings: InputSettings) -> Result<Setup, InputError> {
        let (senders, sources) = EventSources::channel(32);
        let (paused_tx, paused_rx) = watch::channel(false);
        let shutdown = CancellationToken::new();
        let ctx = InputContext {
            platform,
            settings: SettingsStore::new(settings),
            sink: Arc::new(MemorySink::default()),
            sources,
            commands: Box::new(|_cmd: LifecycleCommand| {}),
            paused: paused_rx,
            shutdown: shutdown.clone(),
        };
        let driver = PlatformInput::init(ctx)?;
        Ok(Setup {
            driver,
            senders,
            shutdown,
            _paused: paused_tx,
        })
    }

    fn setup(platform: Arc<HeadlessPlatform>) -> Setup {
        setup_with(platform, InputSettings::default()).unwrap()
    }

    fn pad_key(device: i32, action: KeyAction, key: KeyCode) -> RawEvent {
        RawEvent::Key(KeyEvent::new(device, InputSource::Gamepad, action, key))
    }

    #[test]
    fn test_decoder_negotiated_at_init() {
        let basic = setup(Arc::new(HeadlessPlatform::default().with_extended_axes(false)));
        assert!(!basic.driver.is_extended());
        let extended = setup(Arc::new(HeadlessPlatform::default()));
        assert!(extended.driver.is_extended());
    }

    #[test]
    fn test_invalid_settings_fail_init() {
        let settings = InputSettings {
            analog_dead_zone: 2.0,
            ..InputSettings::default()
        };
        let result = setup_with(Arc::new(HeadlessPlatform::default()), settings);
        assert!(matches!(result, Err(InputError::InitializationError(_))));
    }

    #[tokio::test]
    async fn test_poll_routes_key_to_port_zero() {
        let platform = Arc::new(HeadlessPlatform::default());
        platform.set_device_name(3, "Acme Pad");
        let mut s = setup(platform);

        s.senders
            .input
            .send(pad_key(3, KeyAction::Down, KeyCode::BUTTON_START))
            .await
            .unwrap();
        let stats = s.driver.poll().await;
        assert_eq!(stats.inputs, 1);

        assert!(s.driver.key_pressed(RetroButton::Start));
        assert_eq!(s.driver.input_state(0, DeviceQuery::Joypad(RetroButton::Start)), 1);
        assert_eq!(s.driver.device_count(), 1);

        let joypad = s.driver.joypad();
        assert!(joypad.query_pad(0));
        assert!(!joypad.query_pad(1));
        assert!(joypad.button(0, KeyCode::BUTTON_START));
        assert_eq!(joypad.name(0).as_deref(), Some("Acme Pad"));
        assert_eq!(s.driver.query().device_class(0), Some(DeviceClass::Generic));
    }

    #[tokio::test]
    async fn test_joypad_init_names_ports_custom() {
        let settings = InputSettings {
            autodetect_enable: false,
            ..InputSettings::default()
        };
        let mut s = setup_with(Arc::new(HeadlessPlatform::default()), settings).unwrap();
        for port in 0..MAX_PORTS {
            assert_eq!(s.driver.settings.device_name(port).as_deref(), Some("Custom"));
        }

        s.senders
            .input
            .send(pad_key(3, KeyAction::Down, KeyCode::BUTTON_A))
            .await
            .unwrap();
        s.driver.poll().await;
        assert_eq!(s.driver.joypad().name(0).as_deref(), Some("Custom"));
        assert_eq!(s.driver.settings.device_name(1), None);
    }

    #[test]
    fn test_virtual_buttons() {
        let mut s = setup(Arc::new(HeadlessPlatform::default()));
        s.driver.set_virtual_buttons(1, RetroButton::A.mask());
        assert_eq!(s.driver.input_state(1, DeviceQuery::Joypad(RetroButton::A)), 1);
        assert_eq!(s.driver.input_state(0, DeviceQuery::Joypad(RetroButton::A)), 0);
        assert_eq!(
            s.driver.input_state(0, DeviceQuery::Analog { stick: AnalogStick::Left, axis: AnalogAxis::X }),
            0
        );
        assert_eq!(s.driver.input_state(0, DeviceQuery::Pointer { index: 0, id: PointerId::Pressed }), 0);
    }

    #[test]
    fn test_sensor_unavailable_without_accelerometer() {
        let mut s = setup(Arc::new(HeadlessPlatform::default()));
        let result = s.driver.set_sensor_state(0, SensorAction::Enable, 0);
        assert!(matches!(result, Err(InputError::SensorUnavailable { port: 0 })));
        assert_eq!(s.driver.query().state().sensor_mask(), 0);
    }

    #[tokio::test]
    async fn test_sensor_enable_default_rate_and_read() {
        let platform = Arc::new(HeadlessPlatform::default().with_accelerometer(true));
        let mut s = setup(platform.clone());

        s.driver.set_sensor_state(0, SensorAction::Enable, 0).unwrap();
        assert_eq!(platform.sensor_requests(), vec![(true, 60)]);

        s.senders.sensor.send(SensorEvent::new(0.1, 0.2, 9.8)).await.unwrap();
        s.driver.poll().await;
        assert_eq!(s.driver.sensor_input(0, SensorAxis::AccelZ), 9.8);

        s.driver.set_sensor_state(0, SensorAction::Disable, 0).unwrap();
        assert!(!s.driver.query().state().sensor_enabled(SENSOR_ACCELEROMETER));
    }

    #[tokio::test]
    async fn test_poll_after_shutdown_is_inert() {
        let mut s = setup(Arc::new(HeadlessPlatform::default()));
        s.shutdown.cancel();
        assert_eq!(s.driver.poll().await, PollStats::default());
        assert!(!s.driver.is_running());
        assert_eq!(s.driver.poll().await, PollStats::default());
    }

    #[tokio::test]
    async fn test_free_stops_everything() {
        let platform = Arc::new(HeadlessPlatform::default().with_accelerometer(true));
        let mut s = setup(platform.clone());
        s.driver.set_sensor_state(0, SensorAction::Enable, 30).unwrap();
        s.senders
            .input
            .send(pad_key(3, KeyAction::Down, KeyCode::BUTTON_A))
            .await
            .unwrap();
        s.driver.poll().await;

        s.driver.free();
        assert!(!s.driver.is_running());
        assert!(s.shutdown.is_cancelled());
        assert_eq!(s.driver.totals().cycles, 1);
        assert_eq!(platform.sensor_requests(), vec![(true, 30), (false, 0)]);
        assert!(!s.driver.joypad().query_pad(0));
        assert_eq!(s.driver.capabilities(), crate::input::query::CAPABILITIES);
    }
}
