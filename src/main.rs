//! # FDC1 Monitor
//!
//! Reads FDC1 telemetry from one or two Cubigel compressor controllers and
//! reports averaged speed, current draw, errors and on/off transitions.
//!
//! # Control Flow
//!
//! 1. **Initialization**
//!    - Load configuration (path from the first argument, default
//!      `config/default.toml`)
//!    - Set up logging with tracing subscriber (plus a daily log file when
//!      `logging.log_dir` is set)
//!    - Open the configured ports, or start a simulated compressor in demo mode
//!    - Spawn the dispatcher on a tokio interval
//!
//! 2. **Main Loop**
//!    - Every `read_interval_ms`: read and reset each channel's statistics,
//!      report on/off transitions and new settings
//!    - Every `settings_interval_s`: request a settings frame
//!    - Handle Ctrl+C for graceful shutdown
//!
//! # Examples
//!
//! ```bash
//! cargo run --release -- config/default.toml
//! ```
//!
//! Expected output:
//! ```text
//! INFO fdc1_monitor: FDC1 Monitor v0.1.0 starting...
//! INFO fdc1_driver::driver::api: FDC1 driver created with channels: software
//! INFO fdc1_monitor: channel=0 rpm=2450 milliamps=3675 readings=10 comms_errors=0 error_status=0x00
//! ```

use anyhow::{Context, Result};
use tokio::time::{interval, Duration};
use tracing::{info, warn};
use tracing_subscriber::prelude::*;

use fdc1_driver::config::{Config, PortKind};
use fdc1_driver::driver::timer::spawn_ticker;
use fdc1_driver::driver::Fdc1;
use fdc1_driver::fdc1::protocol::SettingsSnapshot;
use fdc1_driver::serial::emulated::spawn_port_bridge;
use fdc1_driver::serial::{ByteSource, EmulatedLine, HardwareSerial};
use fdc1_driver::simulator::{spawn_simulator, CompressorSimulator, SimulatorConfig};
use fdc1_driver::telemetry::{ReadingLogger, Record, RecordKind};

/// Configuration file used when none is given
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Prefix of the rolling log files
const LOG_FILE_PREFIX: &str = "fdc1-monitor.log";

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path))?;

    // Initialize logging
    let file_writer = config.logging.log_dir.as_ref().map(|dir| {
        tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX))
    });
    let (file_layer, _log_guard) = match file_writer {
        Some((writer, guard)) => (
            Some(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(writer)),
            Some(guard),
        ),
        None => (None, None),
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();

    info!("FDC1 Monitor v{} starting...", env!("CARGO_PKG_VERSION"));

    // Open byte sources in channel order
    let mut sources: Vec<Box<dyn ByteSource>> = Vec::new();
    let mut background = Vec::new();

    if config.monitor.demo {
        info!("Demo mode: simulating a compressor on the software-emulated UART");
        let line = EmulatedLine::new();
        let simulator = CompressorSimulator::new(SimulatorConfig::default());
        background.push(spawn_simulator(simulator, line.clone()));
        sources.push(Box::new(line.source()));
    } else {
        for port in &config.serial.ports {
            match port.kind {
                PortKind::Hardware => sources.push(Box::new(HardwareSerial::open(&port.path)?)),
                PortKind::Software => {
                    let line = EmulatedLine::new();
                    background.push(spawn_port_bridge(&port.path, line.clone())?);
                    sources.push(Box::new(line.source()));
                }
            }
        }
    }

    let (fdc1, dispatcher) = Fdc1::new(sources, &config.driver)?;
    let ticker = spawn_ticker(dispatcher);

    let mut logger = match &config.logging.jsonl_path {
        Some(path) => Some(ReadingLogger::open(path)?),
        None => None,
    };

    let mut read_interval = interval(Duration::from_millis(config.monitor.read_interval_ms));
    // The first tick completes immediately; skip it so the first read has data
    read_interval.tick().await;

    let settings_period = Duration::from_secs(config.monitor.settings_interval_s.max(1));
    let mut settings_interval = interval(settings_period);
    let request_settings = config.monitor.settings_interval_s > 0;

    let mut last_settings = vec![SettingsSnapshot::default(); fdc1.channel_count()];

    info!("Monitoring {} channel(s), press Ctrl+C to exit", fdc1.channel_count());

    loop {
        tokio::select! {
            _ = read_interval.tick() => {
                for channel in 0..fdc1.channel_count() {
                    let mut records = report_channel(&fdc1, channel, &mut last_settings[channel]);

                    if let Some(logger) = logger.as_mut() {
                        for record in records.drain(..) {
                            if let Err(e) = logger.log(&record) {
                                warn!("Failed to write telemetry record: {}", e);
                            }
                        }
                    }
                }
            }

            _ = settings_interval.tick(), if request_settings => {
                for channel in 0..fdc1.channel_count() {
                    fdc1.request_settings(channel);
                }
            }

            // Handle Ctrl+C for graceful shutdown
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                break;
            }
        }
    }

    ticker.abort();
    for task in background {
        task.abort();
    }
    if let Some(logger) = &logger {
        info!("Wrote {} telemetry records", logger.records());
    }

    Ok(())
}

/// Read one channel, log what changed, and return the records to persist
fn report_channel(fdc1: &Fdc1, channel: usize, last_settings: &mut SettingsSnapshot) -> Vec<Record> {
    let mut records = Vec::new();

    let readings = fdc1.read_values(channel, true);
    info!(
        "channel={} rpm={} milliamps={} readings={} comms_errors={} error_status=0x{:02X}",
        channel,
        readings.rpm,
        readings.milliamps,
        readings.readings,
        readings.comms_errors,
        readings.error_status
    );
    if readings.readings == 0 {
        warn!("channel={} produced no valid frames since the last read", channel);
    }
    records.push(Record::now(channel, RecordKind::Readings(readings)));

    let (changed, timing) = fdc1.read_timing(channel);
    if changed {
        let running = fdc1.is_running(channel);
        info!(
            "channel={} compressor {} (on at {} ms, off at {} ms)",
            channel,
            if running { "running" } else { "stopped" },
            timing.on_time,
            timing.off_time
        );
        records.push(Record::now(channel, RecordKind::timing(running, timing)));
    }

    let settings = fdc1.read_settings(channel);
    if settings != *last_settings {
        info!("channel={} settings: {:?}", channel, settings);
        *last_settings = settings;
        records.push(Record::now(channel, RecordKind::Settings(settings)));
    }

    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use fdc1_driver::config::DriverConfig;
    use fdc1_driver::fdc1::encoder::{encode_settings_frame, encode_telemetry_frame};
    use fdc1_driver::fdc1::protocol::TelemetryReading;

    #[test]
    fn test_default_config_path() {
        assert_eq!(DEFAULT_CONFIG_PATH, "config/default.toml");
    }

    #[test]
    fn test_bundled_config_loads() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config/default.toml");
        assert!(Config::load(path).is_ok());
    }

    #[test]
    fn test_report_channel_records() {
        let line = EmulatedLine::new();
        let sources: Vec<Box<dyn ByteSource>> = vec![Box::new(line.source())];
        let (fdc1, mut dispatcher) = Fdc1::new(sources, &DriverConfig::default()).unwrap();
        let mut last_settings = SettingsSnapshot::default();

        line.inject(&encode_telemetry_frame(&TelemetryReading {
            rpm: 2000,
            milliamps: 3000,
            error_flags: 0,
            running: true,
        }));
        dispatcher.tick();

        // Readings plus the switch-on transition
        let records = report_channel(&fdc1, 0, &mut last_settings);
        assert_eq!(records.len(), 2);

        let settings = SettingsSnapshot {
            min_speed: 2000,
            max_speed: 3500,
            ..Default::default()
        };
        line.inject(&encode_settings_frame(&settings, true));
        dispatcher.tick();

        let records = report_channel(&fdc1, 0, &mut last_settings);
        assert_eq!(records.len(), 2);
        assert_eq!(last_settings, settings);

        // Nothing new: only the readings record
        assert_eq!(report_channel(&fdc1, 0, &mut last_settings).len(), 1);
    }
}
