//! # Read/Request API
//!
//! Foreground access to the statistics gathered by the [`Dispatcher`].
//!
//! Every call copies what it needs out of the channel's state inside one
//! short critical section. Out-of-range channel indices never panic: reads
//! return zeroed values and requests are ignored.

use std::cell::RefCell;
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::{validate_topology, ChannelDriver, Dispatcher, SharedDevice};
use crate::config::DriverConfig;
use crate::device::{DeviceState, Readings, Timing};
use crate::error::{Fdc1Error, Result};
use crate::fdc1::protocol::{Mode, SettingsSnapshot};
use crate::serial::{ByteSource, SoftwareUartClaim, SourceKind};

/// Foreground handle to an FDC1 driver
///
/// Cheap to clone; every clone observes the same channels.
#[derive(Clone)]
pub struct Fdc1 {
    devices: Arc<[SharedDevice]>,
}

impl std::fmt::Debug for Fdc1 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fdc1")
            .field("channels", &self.devices.len())
            .finish()
    }
}

impl Fdc1 {
    /// Build a driver over one or two byte sources
    ///
    /// Channel indices follow the order of `sources`. Returns the foreground
    /// handle together with the [`Dispatcher`] the timer must tick.
    ///
    /// # Errors
    ///
    /// Returns `Topology` if there are no sources, more than two, or more
    /// than one software-emulated source. The software UART is a single
    /// resource per process: it stays claimed until the returned
    /// [`Dispatcher`] is dropped, and a second driver asking for it fails.
    ///
    /// # Examples
    ///
    /// ```
    /// use fdc1_driver::config::DriverConfig;
    /// use fdc1_driver::driver::Fdc1;
    /// use fdc1_driver::fdc1::encoder::encode_telemetry_frame;
    /// use fdc1_driver::fdc1::protocol::TelemetryReading;
    /// use fdc1_driver::serial::{ByteSource, EmulatedLine};
    ///
    /// let line = EmulatedLine::new();
    /// let sources: Vec<Box<dyn ByteSource>> = vec![Box::new(line.source())];
    /// let (fdc1, mut dispatcher) = Fdc1::new(sources, &DriverConfig::default())?;
    ///
    /// line.inject(&encode_telemetry_frame(&TelemetryReading {
    ///     rpm: 2500,
    ///     milliamps: 3200,
    ///     error_flags: 0,
    ///     running: true,
    /// }));
    /// dispatcher.tick();
    ///
    /// let readings = fdc1.read_values(0, true);
    /// assert_eq!(readings.rpm, 2500);
    /// assert_eq!(readings.readings, 1);
    /// # Ok::<(), fdc1_driver::error::Fdc1Error>(())
    /// ```
    pub fn new(sources: Vec<Box<dyn ByteSource>>, config: &DriverConfig) -> Result<(Self, Dispatcher)> {
        validate_topology(&sources)?;
        config.validate()?;
        let software_claim = if sources.iter().any(|s| s.kind() == SourceKind::Software) {
            Some(SoftwareUartClaim::acquire()?)
        } else {
            None
        };

        let kinds: Vec<String> = sources.iter().map(|s| s.kind().to_string()).collect();

        let channels: Vec<ChannelDriver> = sources
            .into_iter()
            .enumerate()
            .map(|(index, source)| ChannelDriver::new(index, source, config))
            .collect();

        let devices: Arc<[SharedDevice]> = channels
            .iter()
            .map(|_| critical_section::Mutex::new(RefCell::new(DeviceState::new())))
            .collect();

        info!("FDC1 driver created with channels: {}", kinds.join(", "));

        let dispatcher = Dispatcher::new(
            channels,
            devices.clone(),
            config.tick_interval_ms,
            software_claim,
        );
        Ok((Self { devices }, dispatcher))
    }

    /// Number of configured channels
    pub fn channel_count(&self) -> usize {
        self.devices.len()
    }

    fn device(&self, index: usize) -> Result<&SharedDevice> {
        self.devices.get(index).ok_or(Fdc1Error::InvalidChannel {
            index,
            count: self.devices.len(),
        })
    }

    /// Run `f` on a channel's state inside a critical section
    fn with_device<T>(&self, index: usize, f: impl FnOnce(&mut DeviceState) -> T) -> Result<T> {
        let device = self.device(index)?;
        Ok(critical_section::with(|cs| f(&mut device.borrow_ref_mut(cs))))
    }

    /// Averaged speed and current since the last resetting read
    ///
    /// Averages are 0 when no frame has arrived. With `reset`, the sums,
    /// reading count, error status and comms error count are zeroed in the
    /// same critical section that read them, so no frame is lost or counted
    /// twice.
    ///
    /// # Arguments
    ///
    /// * `index` - Channel index
    /// * `reset` - Zero the statistics after reading
    ///
    /// # Returns
    ///
    /// * `Readings` - Zeroed for an invalid channel
    pub fn read_values(&self, index: usize, reset: bool) -> Readings {
        self.try_read_values(index, reset).unwrap_or_else(|e| {
            warn!("read_values: {}", e);
            Readings::default()
        })
    }

    /// Fallible form of [`Fdc1::read_values`]
    pub fn try_read_values(&self, index: usize, reset: bool) -> Result<Readings> {
        self.with_device(index, |state| state.take_readings(reset))
    }

    /// Last settings snapshot received on a channel
    ///
    /// Never triggers a request; see [`Fdc1::request_settings`].
    pub fn read_settings(&self, index: usize) -> SettingsSnapshot {
        self.with_device(index, |state| state.settings())
            .unwrap_or_else(|e| {
                warn!("read_settings: {}", e);
                SettingsSnapshot::default()
            })
    }

    /// Ask the controller for a settings frame
    ///
    /// The command goes out on the next tick. Calling again while a request
    /// is still pending has no further effect.
    pub fn request_settings(&self, index: usize) {
        self.request_mode(index, Mode::Settings);
    }

    /// Ask the controller to switch output mode
    pub fn request_mode(&self, index: usize, mode: Mode) {
        match self.with_device(index, |state| state.request_mode(mode)) {
            Ok(true) => debug!(channel = index, "Queued {:?} mode request", mode),
            Ok(false) => debug!(channel = index, "Mode request already pending"),
            Err(e) => warn!("request_mode: {}", e),
        }
    }

    /// Last on/off transition times
    ///
    /// # Returns
    ///
    /// * `(bool, Timing)` - `true` if a transition happened since the previous
    ///   call (the flag is cleared), plus the latest on and off times.
    ///   `(false, Timing::default())` for an invalid channel.
    pub fn read_timing(&self, index: usize) -> (bool, Timing) {
        self.with_device(index, |state| state.take_timing())
            .unwrap_or_else(|e| {
                warn!("read_timing: {}", e);
                (false, Timing::default())
            })
    }

    /// Whether the compressor on a channel is currently considered running
    pub fn is_running(&self, index: usize) -> bool {
        self.with_device(index, |state| state.running()).unwrap_or(false)
    }
}
