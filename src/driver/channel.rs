//! # Channel Driver
//!
//! One tick's worth of work for a single controller connection.

use tracing::{debug, info, warn};

use super::SharedDevice;
use crate::config::DriverConfig;
use crate::device::PowerTransition;
use crate::fdc1::assembler::{FeedResult, FrameAssembler};
use crate::fdc1::encoder::encode_mode_command;
use crate::fdc1::protocol::{Frame, Mode};
use crate::serial::ByteSource;

/// Per-channel tick handler
///
/// Owns the byte source and the frame assembler; neither is ever touched by
/// the foreground, so only device state updates need a critical section.
pub struct ChannelDriver {
    index: usize,
    source: Box<dyn ByteSource>,
    assembler: FrameAssembler,
    max_bytes_per_tick: usize,
    silence_timeout_ms: u32,
}

impl std::fmt::Debug for ChannelDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelDriver")
            .field("index", &self.index)
            .field("kind", &self.source.kind())
            .field("buffered", &self.assembler.buffered())
            .finish_non_exhaustive()
    }
}

impl ChannelDriver {
    pub fn new(index: usize, source: Box<dyn ByteSource>, config: &DriverConfig) -> Self {
        Self {
            index,
            source,
            assembler: FrameAssembler::new(),
            max_bytes_per_tick: config.max_bytes_per_tick,
            silence_timeout_ms: config.silence_timeout_ms,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Run one tick for this channel
    ///
    /// Drains at most `max_bytes_per_tick` buffered bytes through the
    /// assembler, applies completed frames, checks for silence, then sends
    /// any pending mode command.
    ///
    /// # Arguments
    ///
    /// * `device` - Shared state for this channel
    /// * `now` - Tick-derived clock in milliseconds
    pub fn step(&mut self, device: &SharedDevice, now: u32) {
        let mut consumed = 0;

        while consumed < self.max_bytes_per_tick && self.source.available() {
            let byte = match self.source.read() {
                Ok(byte) => byte,
                Err(e) => {
                    warn!(channel = self.index, "Failed to read byte: {}", e);
                    break;
                }
            };
            consumed += 1;

            match self.assembler.feed(byte) {
                FeedResult::Incomplete => {}
                FeedResult::Frame(frame) => self.apply_frame(device, frame, now),
                FeedResult::Invalid(e) => {
                    debug!(channel = self.index, "Discarded frame: {}", e);
                    critical_section::with(|cs| device.borrow_ref_mut(cs).record_comms_error());
                }
            }
        }

        let transition = critical_section::with(|cs| {
            device
                .borrow_ref_mut(cs)
                .check_silence(now, self.silence_timeout_ms)
        });
        if let Some(transition) = transition {
            self.log_transition(transition, now);
        }

        let pending = critical_section::with(|cs| device.borrow_ref_mut(cs).take_pending_mode());
        if let Some(mode) = pending {
            self.transmit_mode(mode);
        }
    }

    fn apply_frame(&mut self, device: &SharedDevice, frame: Frame, now: u32) {
        let transition = critical_section::with(|cs| {
            let mut state = device.borrow_ref_mut(cs);
            match frame {
                Frame::Telemetry(reading) => state.record_reading(&reading),
                Frame::Settings { settings, .. } => {
                    state.record_settings(settings);
                    // The controller keeps sending settings until told otherwise
                    state.request_mode(Mode::Default);
                }
            }
            state.observe_running(frame.running(), now)
        });

        match frame {
            Frame::Telemetry(reading) => debug!(
                channel = self.index,
                rpm = reading.rpm,
                milliamps = reading.milliamps,
                error_flags = reading.error_flags,
                "Telemetry frame"
            ),
            Frame::Settings { settings, .. } => debug!(
                channel = self.index,
                min_speed = settings.min_speed,
                max_speed = settings.max_speed,
                "Settings frame"
            ),
        }

        if let Some(transition) = transition {
            self.log_transition(transition, now);
        }
    }

    /// Write the mode command once; a failed write is not retried
    fn transmit_mode(&mut self, mode: Mode) {
        for byte in encode_mode_command(mode) {
            if let Err(e) = self.source.write(byte) {
                warn!(channel = self.index, "Failed to send {:?} mode command: {}", mode, e);
                return;
            }
        }
        debug!(channel = self.index, "Sent {:?} mode command", mode);
    }

    fn log_transition(&self, transition: PowerTransition, now: u32) {
        match transition {
            PowerTransition::On => info!(channel = self.index, at_ms = now, "Compressor switched on"),
            PowerTransition::Off => info!(channel = self.index, at_ms = now, "Compressor switched off"),
        }
    }
}
