//! # Compressor Simulator
//!
//! Generates a plausible FDC1 frame stream for demo mode and tests.
//!
//! The simulated compressor cycles on and off, ramps its speed between the
//! configured bounds while running, draws current proportional to speed and
//! answers mode commands by switching to settings frames.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::debug;

use crate::fdc1::checksum::checksum;
use crate::fdc1::encoder::{encode_settings_frame, encode_telemetry_frame};
use crate::fdc1::protocol::*;
use crate::serial::EmulatedLine;

/// Speed change per frame while ramping
const RAMP_STEP_RPM: u16 = 100;

/// Simulated behaviour
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// Settings reported in settings mode; speed bounds drive the ramp
    pub settings: SettingsSnapshot,
    /// Frames per running period
    pub on_frames: u32,
    /// Frames per stopped period (0 never stops)
    pub off_frames: u32,
    /// Corrupt one frame in every N
    pub corrupt_every: Option<u32>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            settings: SettingsSnapshot {
                min_speed: 2000,
                max_speed: 3500,
                cut_out_12v: 1040,
                cut_in_12v: 1170,
                cut_out_24v: 2260,
                cut_in_24v: 2420,
                cut_out_42v: 3100,
                cut_in_42v: 3300,
                mode: 0,
            },
            on_frames: 120,
            off_frames: 60,
            corrupt_every: None,
        }
    }
}

/// Simulated compressor controller
#[derive(Debug, Clone)]
pub struct CompressorSimulator {
    config: SimulatorConfig,
    mode: Mode,
    frames_sent: u64,
    rpm: u16,
    command: Vec<u8>,
}

impl CompressorSimulator {
    pub fn new(config: SimulatorConfig) -> Self {
        Self {
            config,
            mode: Mode::Default,
            frames_sent: 0,
            rpm: 0,
            command: Vec::with_capacity(FDC1_COMMAND_SIZE),
        }
    }

    /// Current output mode
    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn frames_sent(&self) -> u64 {
        self.frames_sent
    }

    /// Process bytes written by the driver, switching mode on valid commands
    pub fn receive(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            if byte == FDC1_COMMAND_MARKER {
                self.command.clear();
            } else if self.command.is_empty() {
                continue;
            }

            self.command.push(byte);
            if self.command.len() < FDC1_COMMAND_SIZE {
                continue;
            }

            let valid = checksum(&self.command[..2]) == self.command[2];
            match Mode::from_byte(self.command[1]) {
                Some(mode) if valid => {
                    debug!("Simulator switching to {:?} mode", mode);
                    self.mode = mode;
                }
                _ => debug!("Simulator ignoring command {:02X?}", self.command),
            }
            self.command.clear();
        }
    }

    fn is_running(&self) -> bool {
        let cycle = (self.config.on_frames + self.config.off_frames) as u64;
        if self.config.off_frames == 0 || cycle == 0 {
            return true;
        }
        self.frames_sent % cycle < self.config.on_frames as u64
    }

    fn advance_speed(&mut self, running: bool) {
        let settings = &self.config.settings;
        if !running {
            self.rpm = 0;
        } else if self.rpm < settings.min_speed {
            self.rpm = settings.min_speed;
        } else {
            self.rpm = self.rpm.saturating_add(RAMP_STEP_RPM).min(settings.max_speed);
        }
    }

    /// Produce the next 0.5 s frame
    pub fn next_frame(&mut self) -> RawFrame {
        let running = self.is_running();
        self.advance_speed(running);

        let mut frame = match self.mode {
            Mode::Default => encode_telemetry_frame(&TelemetryReading {
                rpm: self.rpm,
                // Roughly 1.5 mA per RPM on a 12 V supply
                milliamps: (self.rpm as u32 * 3 / 2).min(FDC1_FIELD_MAX as u32) as u16,
                error_flags: 0,
                running,
            }),
            Mode::Settings => encode_settings_frame(&self.config.settings, running),
        };

        self.frames_sent += 1;
        if let Some(every) = self.config.corrupt_every {
            if every > 0 && self.frames_sent % every as u64 == 0 {
                frame[OFFSET_SPEED + 1] ^= 0x01;
            }
        }

        frame
    }
}

/// Drive `simulator` over `line` at the controller's frame rate
///
/// Every 500 ms the task hands the driver's transmitted bytes to the
/// simulator and injects the next frame.
pub fn spawn_simulator(mut simulator: CompressorSimulator, line: EmulatedLine) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(Duration::from_millis(FDC1_FRAME_INTERVAL_MS as u64));
        loop {
            ticker.tick().await;
            simulator.receive(&line.take_transmitted());
            line.inject(&simulator.next_frame());
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fdc1::assembler::decode_frame;
    use crate::fdc1::encoder::encode_mode_command;

    fn config(on_frames: u32, off_frames: u32) -> SimulatorConfig {
        SimulatorConfig {
            on_frames,
            off_frames,
            ..SimulatorConfig::default()
        }
    }

    #[test]
    fn test_speed_ramps_to_max() {
        let mut sim = CompressorSimulator::new(config(100, 0));

        let first = decode_frame(&sim.next_frame()).unwrap();
        assert_eq!(first, Frame::Telemetry(TelemetryReading {
            rpm: 2000,
            milliamps: 3000,
            error_flags: 0,
            running: true,
        }));

        let mut last = first;
        for _ in 0..30 {
            last = decode_frame(&sim.next_frame()).unwrap();
        }
        match last {
            Frame::Telemetry(reading) => assert_eq!(reading.rpm, 3500),
            other => panic!("unexpected frame {:?}", other),
        }
    }

    #[test]
    fn test_on_off_cycle() {
        let mut sim = CompressorSimulator::new(config(2, 1));
        let running: Vec<bool> = (0..6)
            .map(|_| decode_frame(&sim.next_frame()).unwrap().running())
            .collect();
        assert_eq!(running, vec![true, true, false, true, true, false]);
    }

    #[test]
    fn test_mode_command_switches_output() {
        let mut sim = CompressorSimulator::new(SimulatorConfig::default());
        sim.receive(&encode_mode_command(Mode::Settings));
        assert_eq!(sim.mode(), Mode::Settings);

        let frame = decode_frame(&sim.next_frame()).unwrap();
        match frame {
            Frame::Settings { settings, .. } => assert_eq!(settings, SimulatorConfig::default().settings),
            other => panic!("expected settings frame, got {:?}", other),
        }

        sim.receive(&encode_mode_command(Mode::Default));
        assert_eq!(sim.mode(), Mode::Default);
    }

    #[test]
    fn test_command_split_across_receives() {
        let mut sim = CompressorSimulator::new(SimulatorConfig::default());
        let command = encode_mode_command(Mode::Settings);
        sim.receive(&command[..1]);
        sim.receive(&command[1..]);
        assert_eq!(sim.mode(), Mode::Settings);
    }

    #[test]
    fn test_bad_command_checksum_ignored() {
        let mut sim = CompressorSimulator::new(SimulatorConfig::default());
        sim.receive(&[FDC1_COMMAND_MARKER, FDC1_MODE_SETTINGS, 0x00]);
        assert_eq!(sim.mode(), Mode::Default);
    }

    #[test]
    fn test_corrupt_every_n_frames() {
        let mut sim = CompressorSimulator::new(SimulatorConfig {
            corrupt_every: Some(3),
            ..SimulatorConfig::default()
        });

        let valid: Vec<bool> = (0..6).map(|_| decode_frame(&sim.next_frame()).is_ok()).collect();
        assert_eq!(valid, vec![true, true, false, true, true, false]);
        assert_eq!(sim.frames_sent(), 6);
    }
}
