//! # Tick Timer
//!
//! Installs the periodic tick on a tokio runtime. The dispatcher moves into
//! the spawned task, which is the only place it is ticked from.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::debug;

use super::Dispatcher;

/// Spawn a task ticking `dispatcher` every `tick_interval_ms`
///
/// Late ticks are skipped rather than bunched up, since a single tick
/// already drains whatever has accumulated (up to the per-tick cap).
/// Abort the returned handle to stop ticking.
///
/// # Examples
///
/// ```no_run
/// use fdc1_driver::config::DriverConfig;
/// use fdc1_driver::driver::{timer::spawn_ticker, Fdc1};
/// use fdc1_driver::serial::{ByteSource, EmulatedLine};
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let line = EmulatedLine::new();
///     let sources: Vec<Box<dyn ByteSource>> = vec![Box::new(line.source())];
///     let (fdc1, dispatcher) = Fdc1::new(sources, &DriverConfig::default())?;
///
///     let ticker = spawn_ticker(dispatcher);
///     println!("{:?}", fdc1.read_values(0, true));
///     ticker.abort();
///     Ok(())
/// }
/// ```
pub fn spawn_ticker(mut dispatcher: Dispatcher) -> JoinHandle<()> {
    let period = Duration::from_millis(dispatcher.tick_interval_ms() as u64);

    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        debug!("Dispatcher ticking every {:?}", period);

        loop {
            ticker.tick().await;
            dispatcher.tick();
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DriverConfig;
    use crate::driver::{lock_software_uart, Fdc1};
    use crate::fdc1::encoder::encode_telemetry_frame;
    use crate::fdc1::protocol::TelemetryReading;
    use crate::serial::{ByteSource, EmulatedLine};

    #[tokio::test]
    async fn test_ticker_drains_line() {
        let _uart = lock_software_uart();
        let line = EmulatedLine::new();
        let sources: Vec<Box<dyn ByteSource>> = vec![Box::new(line.source())];
        let (fdc1, dispatcher) = Fdc1::new(sources, &DriverConfig::default()).unwrap();

        let ticker = spawn_ticker(dispatcher);
        for rpm in [2000u16, 3000] {
            line.inject(&encode_telemetry_frame(&TelemetryReading {
                rpm,
                milliamps: 1500,
                error_flags: 0,
                running: true,
            }));
        }

        for _ in 0..200 {
            if line.pending() == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        // Let the tick that consumed the last byte finish applying it
        tokio::time::sleep(Duration::from_millis(20)).await;
        ticker.abort();
        let _ = ticker.await;

        let readings = fdc1.read_values(0, true);
        assert_eq!(readings.readings, 2);
        assert_eq!(readings.rpm, 2500);
    }
}
