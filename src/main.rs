use std::sync::Arc;
use std::time::Duration;

use color_eyre::{eyre::eyre, Result};
use frontend_input::config::{InputSettings, SettingsStore};
use frontend_input::input::driver::{InputContext, InputDriver, PlatformInput};
use frontend_input::input::query::{AnalogAxis, AnalogStick};
use frontend_input::input::{EventSources, LifecycleCommand, RetroButton, Viewport};
use frontend_input::platform::gilrs_source::{spawn_collector, GilrsPlatform};
use frontend_input::platform::LogSink;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

const FRAME: Duration = Duration::from_millis(16);
const REPORT_EVERY_FRAMES: u32 = 120;

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    let path = InputSettings::default_path().ok_or_else(|| eyre!("No config directory on this system"))?;
    let settings = InputSettings::load_or_create(&path).await?;
    info!("Using input settings from {}", path.display());
    let store = SettingsStore::new(settings);

    let platform = Arc::new(GilrsPlatform::new(Viewport::full(1280, 720)));
    let (senders, sources) = EventSources::channel(1000);
    let (_paused_tx, paused_rx) = watch::channel(false);
    let shutdown = CancellationToken::new();

    let collector = spawn_collector(&platform, senders.input.clone(), shutdown.clone())
        .map_err(|e| eyre!("Failed to start gilrs collector: {}", e))?;

    let ctx = InputContext {
        platform,
        settings: store,
        sink: Arc::new(LogSink),
        sources,
        commands: Box::new(|command: LifecycleCommand| info!("Lifecycle command: {:?}", command)),
        paused: paused_rx,
        shutdown: shutdown.clone(),
    };
    let mut driver = PlatformInput::init(ctx).map_err(|e| eyre!("Failed to initialize input: {}", e))?;

    let ctrl_c = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Unable to listen for Ctrl+C: {}", e);
        }
        info!("Ctrl+C received, shutting down");
        ctrl_c.cancel();
    });

    let query = driver.query();
    let mut frame: u32 = 0;
    while driver.is_running() {
        driver.poll().await;

        frame = frame.wrapping_add(1);
        if frame % REPORT_EVERY_FRAMES == 0 {
            for port in 0..driver.device_count() {
                let pressed: Vec<RetroButton> = RetroButton::ALL
                    .iter()
                    .copied()
                    .filter(|b| query.button_pressed(port, *b, 0))
                    .collect();
                info!(
                    "Port #{} {:?}: buttons {:?}, left ({}, {}), right ({}, {})",
                    port + 1,
                    query.device_class(port),
                    pressed,
                    query.analog(port, AnalogStick::Left, AnalogAxis::X),
                    query.analog(port, AnalogStick::Left, AnalogAxis::Y),
                    query.analog(port, AnalogStick::Right, AnalogAxis::X),
                    query.analog(port, AnalogStick::Right, AnalogAxis::Y),
                );
            }
        }

        tokio::select! {
            _ = shutdown.cancelled() => {}
            _ = tokio::time::sleep(FRAME) => {}
        }
    }

    driver.free();
    if let Err(e) = collector.await {
        error!("gilrs collector task failed: {}", e);
    }
    info!("Input demo finished: {:?}", driver.totals());
    Ok(())
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    setup_logging_env();
    Ok(())
}

fn setup_logging_env() {
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}
