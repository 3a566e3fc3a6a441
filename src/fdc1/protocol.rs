//! # FDC1 Protocol Constants and Types
//!
//! Core frame layout for FDC1 communication.
//!
//! Every frame is 22 bytes. Apart from the start marker, every byte on the
//! wire has bit 7 clear, so 16-bit quantities travel as two 7-bit halves
//! (high half first) and can hold values up to 16383.

use serde::Serialize;

/// FDC1 frame start marker
pub const FDC1_START_MARKER: u8 = 0xAA;

/// Marker opening an outbound mode command
pub const FDC1_COMMAND_MARKER: u8 = 0xAB;

/// Total frame length including marker and checksum
pub const FDC1_FRAME_SIZE: usize = 22;

/// Outbound mode command length: marker + mode + checksum
pub const FDC1_COMMAND_SIZE: usize = 3;

/// Fixed controller baud rate
pub const FDC1_BAUD_RATE: u32 = 1200;

/// Interval between frames emitted by the controller
pub const FDC1_FRAME_INTERVAL_MS: u32 = 500;

/// Mask of the payload bits in every non-marker byte
pub const FDC1_DATA_MASK: u8 = 0x7F;

/// Largest value a two-byte field can carry
pub const FDC1_FIELD_MAX: u16 = 0x3FFF;

/// Mode byte values
pub const FDC1_MODE_DEFAULT: u8 = 0x00;
pub const FDC1_MODE_SETTINGS: u8 = 0x01;

/// Byte offsets shared by both frame variants
pub const OFFSET_MODE: usize = 1;
pub const OFFSET_CHECKSUM: usize = FDC1_FRAME_SIZE - 1;

/// Default mode offsets
pub const OFFSET_SPEED: usize = 2;
pub const OFFSET_CURRENT: usize = 4;
pub const OFFSET_ERROR_FLAGS: usize = 6;
pub const OFFSET_DEFAULT_STATUS: usize = 7;

/// Settings mode offsets
pub const OFFSET_MIN_SPEED: usize = 2;
pub const OFFSET_MAX_SPEED: usize = 4;
pub const OFFSET_CUT_OUT_12V: usize = 6;
pub const OFFSET_CUT_IN_12V: usize = 8;
pub const OFFSET_CUT_OUT_24V: usize = 10;
pub const OFFSET_CUT_IN_24V: usize = 12;
pub const OFFSET_CUT_OUT_42V: usize = 14;
pub const OFFSET_CUT_IN_42V: usize = 16;
pub const OFFSET_MODE_SWITCHES: usize = 18;
pub const OFFSET_SETTINGS_STATUS: usize = 19;

/// Status byte bit set while the compressor motor is running
pub const STATUS_RUNNING: u8 = 0x01;

/// Error flag bits reported in default mode
pub const ERROR_BATTERY_PROTECTION: u8 = 0x01;
pub const ERROR_FAN_OVER_CURRENT: u8 = 0x02;
pub const ERROR_MOTOR_START: u8 = 0x04;
pub const ERROR_MIN_MOTOR_SPEED: u8 = 0x08;
pub const ERROR_THERMAL_CUT_OUT: u8 = 0x10;

/// Raw frame buffer
pub type RawFrame = [u8; FDC1_FRAME_SIZE];

/// Output mode of the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Periodic speed/current/error telemetry
    #[default]
    Default,

    /// Configured thresholds and bounds
    Settings,
}

impl Mode {
    /// Wire value of the mode
    pub fn as_byte(self) -> u8 {
        match self {
            Mode::Default => FDC1_MODE_DEFAULT,
            Mode::Settings => FDC1_MODE_SETTINGS,
        }
    }

    /// Parse a wire mode byte
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            FDC1_MODE_DEFAULT => Some(Mode::Default),
            FDC1_MODE_SETTINGS => Some(Mode::Settings),
            _ => None,
        }
    }
}

/// One default-mode telemetry sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TelemetryReading {
    /// Compressor speed in RPM
    pub rpm: u16,

    /// Current draw in milliamps
    pub milliamps: u16,

    /// Error flag bits (`ERROR_*`)
    pub error_flags: u8,

    /// Motor running status bit
    pub running: bool,
}

/// Last-known controller configuration
///
/// Voltages are in centivolts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SettingsSnapshot {
    /// Minimum compressor speed in RPM
    pub min_speed: u16,

    /// Maximum compressor speed in RPM
    pub max_speed: u16,

    /// Battery cut-out voltage on a 12 V supply, in centivolts
    pub cut_out_12v: u16,

    /// Battery cut-in voltage on a 12 V supply, in centivolts
    pub cut_in_12v: u16,

    /// Battery cut-out voltage on a 24 V supply, in centivolts
    pub cut_out_24v: u16,

    /// Battery cut-in voltage on a 24 V supply, in centivolts
    pub cut_in_24v: u16,

    /// Battery cut-out voltage on a 42 V supply, in centivolts
    pub cut_out_42v: u16,

    /// Battery cut-in voltage on a 42 V supply, in centivolts
    pub cut_in_42v: u16,

    /// Mode setting switches
    pub mode: u8,
}

/// A decoded, checksum-valid frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frame {
    /// Default-mode telemetry
    Telemetry(TelemetryReading),

    /// Settings-mode snapshot, with the running bit carried alongside
    Settings {
        settings: SettingsSnapshot,
        running: bool,
    },
}

impl Frame {
    /// Running status carried by either frame variant
    pub fn running(&self) -> bool {
        match self {
            Frame::Telemetry(reading) => reading.running,
            Frame::Settings { running, .. } => *running,
        }
    }

    /// Output mode this frame was sent in
    pub fn mode(&self) -> Mode {
        match self {
            Frame::Telemetry(_) => Mode::Default,
            Frame::Settings { .. } => Mode::Settings,
        }
    }
}

/// Read a 14-bit field stored as two 7-bit halves at `offset`
pub fn read_field(frame: &[u8], offset: usize) -> u16 {
    let high = (frame[offset] & FDC1_DATA_MASK) as u16;
    let low = (frame[offset + 1] & FDC1_DATA_MASK) as u16;
    (high << 7) | low
}

/// Split a value into two 7-bit halves, clamping to `FDC1_FIELD_MAX`
pub fn split_field(value: u16) -> [u8; 2] {
    let value = value.min(FDC1_FIELD_MAX);
    [(value >> 7) as u8 & FDC1_DATA_MASK, value as u8 & FDC1_DATA_MASK]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_constants() {
        assert_eq!(FDC1_FRAME_SIZE, 22);
        assert_eq!(OFFSET_CHECKSUM, 21);
        assert_eq!(FDC1_BAUD_RATE, 1200);
        // Markers must not be representable as data bytes
        assert_ne!(FDC1_START_MARKER & !FDC1_DATA_MASK, 0);
        assert_ne!(FDC1_COMMAND_MARKER & !FDC1_DATA_MASK, 0);
    }

    #[test]
    fn test_settings_offsets_fit_before_checksum() {
        assert!(OFFSET_SETTINGS_STATUS < OFFSET_CHECKSUM);
        assert!(OFFSET_CUT_IN_42V + 1 < OFFSET_MODE_SWITCHES);
    }

    #[test]
    fn test_mode_bytes() {
        assert_eq!(Mode::from_byte(0x00), Some(Mode::Default));
        assert_eq!(Mode::from_byte(0x01), Some(Mode::Settings));
        assert_eq!(Mode::from_byte(0x02), None);
        assert_eq!(Mode::Settings.as_byte(), FDC1_MODE_SETTINGS);
    }

    #[test]
    fn test_field_split_and_read() {
        let halves = split_field(3500);
        assert!(halves.iter().all(|b| b & 0x80 == 0));
        assert_eq!(read_field(&halves, 0), 3500);
    }

    #[test]
    fn test_field_clamps_to_14_bits() {
        let halves = split_field(u16::MAX);
        assert_eq!(read_field(&halves, 0), FDC1_FIELD_MAX);
    }

    #[test]
    fn test_frame_running_and_mode() {
        let frame = Frame::Telemetry(TelemetryReading {
            rpm: 2000,
            milliamps: 3000,
            error_flags: 0,
            running: true,
        });
        assert!(frame.running());
        assert_eq!(frame.mode(), Mode::Default);

        let frame = Frame::Settings {
            settings: SettingsSnapshot::default(),
            running: false,
        };
        assert!(!frame.running());
        assert_eq!(frame.mode(), Mode::Settings);
    }
}
