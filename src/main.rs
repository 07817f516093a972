//! # HOH Control
//!
//! Runs the orthosis control loop against simulated actuators, optionally
//! talking to the companion application over a serial link.

use anyhow::{Context, Result};
use chrono::Utc;
use tokio::sync::mpsc;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use hoh_control::clock::MonotonicClock;
use hoh_control::config::{Config, LoggingConfig};
use hoh_control::device::Device;
use hoh_control::motor::{MotorController, SimulatedDriver};
use hoh_control::presence::StaticPresence;
use hoh_control::sensor::GravityTiltSensor;
use hoh_control::serial::{read_frames, send_frames, DiscardSink, FrameSink, SerialLink};
use hoh_control::storage::FileStore;
use hoh_control::system::SystemState;
use hoh_control::telemetry::{StatusRecord, StatusRecorder};

/// Configuration file used when none is given on the command line
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Capacity of the inbound frame channel
const FRAME_QUEUE_DEPTH: usize = 32;

/// Set up console logging plus an optional daily rolling file
///
/// The returned guard must stay alive for the file writer to flush.
fn init_logging(config: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let (file_layer, guard) = match &config.dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "hoh-control.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().with_writer(writer).with_ansi(false)), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .init();

    guard
}

/// Main entry point
///
/// # Control Flow
///
/// 1. **Initialization**
///    - Load configuration (first argument, defaults when the file is absent)
///    - Set up logging
///    - Build the device context and open the serial link if enabled
///    - Command a reset to extension so the hand starts open
///
/// 2. **Main Loop**
///    - Fast tick: advance the motor state machine, stream status/data frames
///    - Housekeeping tick: refresh presence bits, flush one-shot replies
///    - Inbound frames: decode and apply immediately
///    - Ctrl+C: stop all motors and exit
#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = Config::load_or_default(&config_path)
        .with_context(|| format!("loading configuration from {}", config_path))?;

    let _log_guard = init_logging(&config.logging);
    info!("{} v{} starting...", config.device.name, env!("CARGO_PKG_VERSION"));
    info!("Configuration: {}", config_path);

    let clock = MonotonicClock::new();
    let tick_period = Duration::from_millis(config.control.tick_period_ms);

    // Device context
    let driver = SimulatedDriver::new(config.simulation.full_rom_us, config.motor.end_stop_signal);
    let store = FileStore::new(&config.storage.path);
    let motor = MotorController::new(driver, Box::new(store), config.motor.params(), clock.now());

    let mut system = SystemState::new(config.device.version.clone(), config.device.development.clone());
    system.send_status = config.telemetry.status_on_start;
    system.send_data = config.telemetry.data_on_start;

    let mut sensor = GravityTiltSensor::new(tick_period.as_micros() as u32);
    sensor.set_acceleration(config.simulation.acceleration);
    let presence = StaticPresence::new(config.presence.cable_connected, config.presence.brace_side);

    let mut device = Device::new(motor, system, Box::new(sensor), Box::new(presence));

    // Link
    let (frame_tx, mut frame_rx) = mpsc::channel::<Vec<u8>>(FRAME_QUEUE_DEPTH);
    let mut sink: Box<dyn FrameSink> = if config.serial.enabled {
        let link = SerialLink::open_with_paths(&[config.serial.port.as_str()], config.serial.baud_rate)?;
        let (reader, writer) = link.into_split();
        tokio::spawn(async move {
            if let Err(e) = read_frames(reader, frame_tx).await {
                warn!("Serial reader stopped: {}", e);
            }
        });
        Box::new(writer)
    } else {
        info!("Serial link disabled, outbound frames are discarded");
        drop(frame_tx);
        Box::new(DiscardSink::new())
    };

    let mut recorder = if config.telemetry.log_enabled {
        Some(StatusRecorder::new(&config.telemetry.log_dir)?)
    } else {
        None
    };

    device.start(clock.now());

    let mut tick = interval(tick_period);
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut housekeeping = interval(Duration::from_millis(config.control.housekeeping_period_ms));
    housekeeping.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!("Control loop running every {} ms", config.control.tick_period_ms);
    info!("Press Ctrl+C to exit");

    loop {
        tokio::select! {
            _ = tick.tick() => {
                let frames = device.tick(clock.now());

                if let Some(recorder) = recorder.as_mut() {
                    if device.system().send_status {
                        let now = Utc::now();
                        let record = StatusRecord::new(
                            now,
                            device.system().count(),
                            &device.motor().status(),
                            device.system().status(),
                        );
                        if let Err(e) = recorder.record(now.date_naive(), &record) {
                            warn!("Failed to record status: {}", e);
                        }
                    }
                }

                send_frames(sink.as_mut(), frames).await;
            }

            _ = housekeeping.tick() => {
                let frames = device.housekeeping();
                send_frames(sink.as_mut(), frames).await;
            }

            Some(frame) = frame_rx.recv() => {
                device.handle_frame(&frame, clock.now());
            }

            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                device.motor_mut().stop(clock.now());
                info!("Ran {} ticks", device.system().count());
                break;
            }
        }
    }

    Ok(())
}
