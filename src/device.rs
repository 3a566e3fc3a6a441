//! # Device State
//!
//! Per-channel state built up from decoded frames: running statistics,
//! the last settings snapshot, on/off timing and the outbound request slot.
//!
//! Nothing here synchronizes. The driver keeps each `DeviceState` inside a
//! critical-section mutex and calls these methods from within it.

use serde::Serialize;

use crate::fdc1::protocol::{Mode, SettingsSnapshot, TelemetryReading};

/// Running sums since the last resetting read
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Accumulator {
    pub total_rpm: u64,
    pub total_milliamps: u64,
    pub readings: u32,
    /// OR of every error flag byte seen
    pub error_status: u8,
}

/// Averaged statistics returned to the host
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Readings {
    /// Average speed in RPM, 0 when no readings were taken
    pub rpm: u16,
    /// Average current draw in milliamps, 0 when no readings were taken
    pub milliamps: u16,
    /// Number of frames averaged
    pub readings: u32,
    /// Frames received but rejected
    pub comms_errors: u32,
    /// OR of all error flags
    pub error_status: u8,
}

/// Last on/off transition times in tick-derived milliseconds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Timing {
    pub on_time: u32,
    pub off_time: u32,
}

/// Compressor power state change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerTransition {
    On,
    Off,
}

#[derive(Debug, Clone, Copy, Default)]
struct TimingState {
    timing: Timing,
    changed: bool,
    running: bool,
    last_frame_at: Option<u32>,
}

/// Everything the driver knows about one channel
#[derive(Debug, Clone, Default)]
pub struct DeviceState {
    accumulator: Accumulator,
    comms_errors: u32,
    settings: SettingsSnapshot,
    timing: TimingState,
    pending_mode: Option<Mode>,
}

impl DeviceState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a default-mode reading into the accumulator
    pub fn record_reading(&mut self, reading: &TelemetryReading) {
        let acc = &mut self.accumulator;
        acc.total_rpm = acc.total_rpm.saturating_add(reading.rpm as u64);
        acc.total_milliamps = acc.total_milliamps.saturating_add(reading.milliamps as u64);
        acc.readings = acc.readings.saturating_add(1);
        acc.error_status |= reading.error_flags;
    }

    /// Replace the settings snapshot
    pub fn record_settings(&mut self, settings: SettingsSnapshot) {
        self.settings = settings;
    }

    pub fn record_comms_error(&mut self) {
        self.comms_errors = self.comms_errors.saturating_add(1);
    }

    /// Note a valid frame's running bit at `now`
    ///
    /// Returns the transition if the power state flipped.
    pub fn observe_running(&mut self, running: bool, now: u32) -> Option<PowerTransition> {
        self.timing.last_frame_at = Some(now);
        self.set_running(running, now)
    }

    /// Switch off a running channel that has been silent longer than `timeout_ms`
    pub fn check_silence(&mut self, now: u32, timeout_ms: u32) -> Option<PowerTransition> {
        if !self.timing.running {
            return None;
        }

        let silent_for = match self.timing.last_frame_at {
            Some(at) => now.wrapping_sub(at),
            None => return None,
        };

        if silent_for > timeout_ms {
            self.set_running(false, now)
        } else {
            None
        }
    }

    fn set_running(&mut self, running: bool, now: u32) -> Option<PowerTransition> {
        if running == self.timing.running {
            return None;
        }

        self.timing.running = running;
        self.timing.changed = true;
        if running {
            self.timing.timing.on_time = now;
            Some(PowerTransition::On)
        } else {
            self.timing.timing.off_time = now;
            Some(PowerTransition::Off)
        }
    }

    /// Whether the compressor is currently considered running
    pub fn running(&self) -> bool {
        self.timing.running
    }

    /// Averaged readings, optionally zeroing the statistics afterwards
    pub fn take_readings(&mut self, reset: bool) -> Readings {
        let acc = self.accumulator;
        let (rpm, milliamps) = if acc.readings == 0 {
            (0, 0)
        } else {
            (
                average(acc.total_rpm, acc.readings),
                average(acc.total_milliamps, acc.readings),
            )
        };

        let readings = Readings {
            rpm,
            milliamps,
            readings: acc.readings,
            comms_errors: self.comms_errors,
            error_status: acc.error_status,
        };

        if reset {
            self.accumulator = Accumulator::default();
            self.comms_errors = 0;
        }

        readings
    }

    pub fn settings(&self) -> SettingsSnapshot {
        self.settings
    }

    /// Timing plus whether it changed since the last call; clears the flag
    pub fn take_timing(&mut self) -> (bool, Timing) {
        let changed = std::mem::take(&mut self.timing.changed);
        (changed, self.timing.timing)
    }

    /// Queue an outbound mode change; returns false if nothing changed
    ///
    /// A settings request takes the place of a pending return to default
    /// mode, so a host request is never swallowed by the automatic one.
    pub fn request_mode(&mut self, mode: Mode) -> bool {
        match (self.pending_mode, mode) {
            (None, _) | (Some(Mode::Default), Mode::Settings) => {
                self.pending_mode = Some(mode);
                true
            }
            _ => false,
        }
    }

    pub fn pending_mode(&self) -> Option<Mode> {
        self.pending_mode
    }

    pub fn take_pending_mode(&mut self) -> Option<Mode> {
        self.pending_mode.take()
    }
}

fn average(total: u64, count: u32) -> u16 {
    (total / count as u64).min(u16::MAX as u64) as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(rpm: u16, milliamps: u16, error_flags: u8) -> TelemetryReading {
        TelemetryReading {
            rpm,
            milliamps,
            error_flags,
            running: true,
        }
    }

    #[test]
    fn test_empty_state_reads_zero() {
        let mut state = DeviceState::new();
        assert_eq!(state.take_readings(true), Readings::default());
    }

    #[test]
    fn test_average_of_ramp() {
        let mut state = DeviceState::new();
        for i in 0..10u16 {
            state.record_reading(&reading(1000 + i * 100, 500, 0));
        }

        let readings = state.take_readings(true);
        assert_eq!(readings.rpm, 1450);
        assert_eq!(readings.milliamps, 500);
        assert_eq!(readings.readings, 10);
        assert_eq!(readings.comms_errors, 0);

        assert_eq!(state.take_readings(true), Readings::default());
    }

    #[test]
    fn test_read_without_reset_keeps_totals() {
        let mut state = DeviceState::new();
        state.record_reading(&reading(2000, 1000, 0));
        state.record_comms_error();

        let first = state.take_readings(false);
        let second = state.take_readings(false);
        assert_eq!(first, second);
        assert_eq!(second.readings, 1);
        assert_eq!(second.comms_errors, 1);
    }

    #[test]
    fn test_error_flags_are_or_combined() {
        let mut state = DeviceState::new();
        state.record_reading(&reading(2000, 1000, 0x01));
        state.record_reading(&reading(2000, 1000, 0x04));
        state.record_reading(&reading(2000, 1000, 0x00));

        assert_eq!(state.take_readings(true).error_status, 0x05);
        assert_eq!(state.take_readings(true).error_status, 0x00);
    }

    #[test]
    fn test_comms_errors_do_not_touch_accumulator() {
        let mut state = DeviceState::new();
        state.record_comms_error();
        state.record_comms_error();

        let readings = state.take_readings(true);
        assert_eq!(readings.readings, 0);
        assert_eq!(readings.rpm, 0);
        assert_eq!(readings.comms_errors, 2);
    }

    #[test]
    fn test_settings_do_not_touch_accumulator() {
        let mut state = DeviceState::new();
        state.record_reading(&reading(3000, 2000, 0));
        let settings = SettingsSnapshot {
            min_speed: 2000,
            max_speed: 3500,
            ..Default::default()
        };
        state.record_settings(settings);

        assert_eq!(state.settings(), settings);
        let readings = state.take_readings(true);
        assert_eq!(readings.readings, 1);
        assert_eq!(readings.rpm, 3000);
        // Reset leaves the snapshot alone
        assert_eq!(state.settings(), settings);
    }

    #[test]
    fn test_power_transitions_and_changed_flag() {
        let mut state = DeviceState::new();

        assert_eq!(state.observe_running(false, 100), None);
        assert_eq!(state.take_timing(), (false, Timing::default()));

        assert_eq!(state.observe_running(true, 600), Some(PowerTransition::On));
        assert_eq!(state.observe_running(true, 1100), None);
        assert_eq!(state.take_timing(), (true, Timing { on_time: 600, off_time: 0 }));
        assert_eq!(state.take_timing(), (false, Timing { on_time: 600, off_time: 0 }));

        assert_eq!(state.observe_running(false, 1600), Some(PowerTransition::Off));
        assert_eq!(state.take_timing(), (true, Timing { on_time: 600, off_time: 1600 }));
    }

    #[test]
    fn test_silence_switches_running_channel_off() {
        let mut state = DeviceState::new();
        state.observe_running(true, 1000);
        state.take_timing();

        assert_eq!(state.check_silence(2500, 2000), None);
        assert_eq!(state.check_silence(3001, 2000), Some(PowerTransition::Off));
        assert!(!state.running());
        assert_eq!(state.take_timing(), (true, Timing { on_time: 1000, off_time: 3001 }));

        // Already off: silence is not a further transition
        assert_eq!(state.check_silence(9000, 2000), None);
    }

    #[test]
    fn test_silence_across_clock_wrap() {
        let mut state = DeviceState::new();
        state.observe_running(true, u32::MAX - 100);
        assert_eq!(state.check_silence(50, 2000), None);
        assert_eq!(state.check_silence(2000, 2000), Some(PowerTransition::Off));
    }

    #[test]
    fn test_request_mode_is_idempotent() {
        let mut state = DeviceState::new();
        assert!(state.request_mode(Mode::Settings));
        assert!(!state.request_mode(Mode::Settings));
        assert_eq!(state.pending_mode(), Some(Mode::Settings));

        assert_eq!(state.take_pending_mode(), Some(Mode::Settings));
        assert_eq!(state.take_pending_mode(), None);
    }

    #[test]
    fn test_settings_request_replaces_pending_default() {
        let mut state = DeviceState::new();
        assert!(state.request_mode(Mode::Default));
        assert!(state.request_mode(Mode::Settings));
        assert_eq!(state.pending_mode(), Some(Mode::Settings));

        // The automatic return to default never displaces a settings request
        assert!(!state.request_mode(Mode::Default));
        assert_eq!(state.take_pending_mode(), Some(Mode::Settings));
    }
}
