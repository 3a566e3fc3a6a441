//! # FDC1 Frame Encoder
//!
//! Builds FDC1 frames and outbound mode commands.
//!
//! The driver only transmits mode commands; full frame encoding is what the
//! simulator and the tests put on an emulated line.

use super::checksum::checksum;
use super::protocol::*;

/// Encode a default-mode telemetry frame
///
/// # Arguments
///
/// * `reading` - Speed, current, error flags and running status
///
/// # Returns
///
/// * `RawFrame` - Complete 22-byte frame including marker and checksum
///
/// # Examples
///
/// ```
/// use fdc1_driver::fdc1::encoder::encode_telemetry_frame;
/// use fdc1_driver::fdc1::protocol::TelemetryReading;
///
/// let frame = encode_telemetry_frame(&TelemetryReading {
///     rpm: 2500,
///     milliamps: 4200,
///     error_flags: 0,
///     running: true,
/// });
/// assert_eq!(frame.len(), 22);
/// assert_eq!(frame[0], 0xAA);
/// ```
pub fn encode_telemetry_frame(reading: &TelemetryReading) -> RawFrame {
    let mut frame = [0u8; FDC1_FRAME_SIZE];
    frame[0] = FDC1_START_MARKER;
    frame[OFFSET_MODE] = FDC1_MODE_DEFAULT;
    put_field(&mut frame, OFFSET_SPEED, reading.rpm);
    put_field(&mut frame, OFFSET_CURRENT, reading.milliamps);
    frame[OFFSET_ERROR_FLAGS] = reading.error_flags & FDC1_DATA_MASK;
    frame[OFFSET_DEFAULT_STATUS] = status_byte(reading.running);

    seal(frame)
}

/// Encode a settings-mode frame
///
/// # Arguments
///
/// * `settings` - Speed bounds, voltage thresholds and mode switches
/// * `running` - Motor running status bit
///
/// # Returns
///
/// * `RawFrame` - Complete 22-byte frame including marker and checksum
pub fn encode_settings_frame(settings: &SettingsSnapshot, running: bool) -> RawFrame {
    let mut frame = [0u8; FDC1_FRAME_SIZE];
    frame[0] = FDC1_START_MARKER;
    frame[OFFSET_MODE] = FDC1_MODE_SETTINGS;
    put_field(&mut frame, OFFSET_MIN_SPEED, settings.min_speed);
    put_field(&mut frame, OFFSET_MAX_SPEED, settings.max_speed);
    put_field(&mut frame, OFFSET_CUT_OUT_12V, settings.cut_out_12v);
    put_field(&mut frame, OFFSET_CUT_IN_12V, settings.cut_in_12v);
    put_field(&mut frame, OFFSET_CUT_OUT_24V, settings.cut_out_24v);
    put_field(&mut frame, OFFSET_CUT_IN_24V, settings.cut_in_24v);
    put_field(&mut frame, OFFSET_CUT_OUT_42V, settings.cut_out_42v);
    put_field(&mut frame, OFFSET_CUT_IN_42V, settings.cut_in_42v);
    frame[OFFSET_MODE_SWITCHES] = settings.mode & FDC1_DATA_MASK;
    frame[OFFSET_SETTINGS_STATUS] = status_byte(running);

    seal(frame)
}

/// Encode the command that switches the controller's output mode
///
/// # Returns
///
/// * `[u8; 3]` - Command marker, mode byte, checksum
pub fn encode_mode_command(mode: Mode) -> [u8; FDC1_COMMAND_SIZE] {
    let body = [FDC1_COMMAND_MARKER, mode.as_byte()];
    [body[0], body[1], checksum(&body)]
}

fn put_field(frame: &mut RawFrame, offset: usize, value: u16) {
    frame[offset..offset + 2].copy_from_slice(&split_field(value));
}

fn status_byte(running: bool) -> u8 {
    if running {
        STATUS_RUNNING
    } else {
        0
    }
}

fn seal(mut frame: RawFrame) -> RawFrame {
    frame[OFFSET_CHECKSUM] = checksum(&frame[..OFFSET_CHECKSUM]);
    frame
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_telemetry_frame_structure() {
        let frame = encode_telemetry_frame(&TelemetryReading {
            rpm: 2000,
            milliamps: 500,
            error_flags: ERROR_FAN_OVER_CURRENT,
            running: true,
        });

        assert_eq!(frame[0], FDC1_START_MARKER);
        assert_eq!(frame[OFFSET_MODE], FDC1_MODE_DEFAULT);
        assert_eq!(read_field(&frame, OFFSET_SPEED), 2000);
        assert_eq!(read_field(&frame, OFFSET_CURRENT), 500);
        assert_eq!(frame[OFFSET_ERROR_FLAGS], ERROR_FAN_OVER_CURRENT);
        assert_eq!(frame[OFFSET_DEFAULT_STATUS], STATUS_RUNNING);
        assert_eq!(frame[OFFSET_CHECKSUM], checksum(&frame[..21]));
    }

    #[test]
    fn test_only_marker_has_high_bit() {
        let frame = encode_telemetry_frame(&TelemetryReading {
            rpm: FDC1_FIELD_MAX,
            milliamps: FDC1_FIELD_MAX,
            error_flags: 0xFF,
            running: true,
        });

        for (i, &byte) in frame.iter().enumerate().skip(1) {
            assert_eq!(byte & 0x80, 0, "byte {} has high bit set", i);
        }
    }

    #[test]
    fn test_settings_frame_structure() {
        let settings = SettingsSnapshot {
            min_speed: 2000,
            max_speed: 3500,
            cut_out_12v: 1040,
            cut_in_12v: 1170,
            cut_out_24v: 2260,
            cut_in_24v: 2420,
            cut_out_42v: 3800,
            cut_in_42v: 4000,
            mode: 0x05,
        };
        let frame = encode_settings_frame(&settings, false);

        assert_eq!(frame[OFFSET_MODE], FDC1_MODE_SETTINGS);
        assert_eq!(read_field(&frame, OFFSET_MAX_SPEED), 3500);
        assert_eq!(read_field(&frame, OFFSET_CUT_IN_42V), 4000);
        assert_eq!(frame[OFFSET_MODE_SWITCHES], 0x05);
        assert_eq!(frame[OFFSET_SETTINGS_STATUS], 0);
    }

    #[test]
    fn test_mode_command() {
        let command = encode_mode_command(Mode::Settings);
        assert_eq!(command[0], FDC1_COMMAND_MARKER);
        assert_eq!(command[1], FDC1_MODE_SETTINGS);
        assert_eq!(command[2], (0xAB + 0x01) & 0x7F);

        let command = encode_mode_command(Mode::Default);
        assert_eq!(command, [0xAB, 0x00, 0x2B]);
    }
}
