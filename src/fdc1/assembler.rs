//! # FDC1 Frame Assembler
//!
//! Reassembles FDC1 frames from a byte stream, one byte per call, and
//! decodes them once complete.

use super::checksum::checksum;
use super::protocol::*;
use crate::error::FrameError;

/// Outcome of feeding one byte to the assembler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedResult {
    /// More bytes are needed (or the assembler is hunting for a marker)
    Incomplete,

    /// A complete, checksum-valid frame
    Frame(Frame),

    /// The buffered bytes were discarded
    Invalid(FrameError),
}

/// Byte-at-a-time frame assembler for a single channel
///
/// Bytes are ignored until a start marker arrives. A marker seen before the
/// frame is complete discards the partial frame and starts a new one at that
/// marker, so a lost byte costs at most the frame it belonged to.
///
/// Once in sync, a stray byte where a marker was due (a corrupted marker)
/// is reported once; the rest of that run is skipped until the next marker.
#[derive(Debug, Clone)]
pub struct FrameAssembler {
    buffer: RawFrame,
    len: usize,
    /// Skipping bytes silently until the next marker
    hunting: bool,
}

impl Default for FrameAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameAssembler {
    /// Create an assembler waiting for a start marker
    pub fn new() -> Self {
        Self {
            buffer: [0u8; FDC1_FRAME_SIZE],
            len: 0,
            hunting: true,
        }
    }

    /// Number of bytes of the frame currently being collected
    pub fn buffered(&self) -> usize {
        self.len
    }

    /// Drop any partial frame and wait for the next marker
    pub fn reset(&mut self) {
        self.len = 0;
        self.hunting = true;
    }

    /// Feed one received byte
    ///
    /// # Arguments
    ///
    /// * `byte` - Next byte from the line
    ///
    /// # Returns
    ///
    /// * `FeedResult` - Whether a frame completed, failed, or needs more bytes
    ///
    /// # Examples
    ///
    /// ```
    /// use fdc1_driver::fdc1::assembler::{FeedResult, FrameAssembler};
    /// use fdc1_driver::fdc1::encoder::encode_telemetry_frame;
    /// use fdc1_driver::fdc1::protocol::TelemetryReading;
    ///
    /// let reading = TelemetryReading { rpm: 2000, milliamps: 3100, error_flags: 0, running: true };
    /// let mut assembler = FrameAssembler::new();
    /// let mut last = FeedResult::Incomplete;
    /// for byte in encode_telemetry_frame(&reading) {
    ///     last = assembler.feed(byte);
    /// }
    /// assert!(matches!(last, FeedResult::Frame(_)));
    /// ```
    pub fn feed(&mut self, byte: u8) -> FeedResult {
        if byte == FDC1_START_MARKER {
            let discarded = self.len;
            self.buffer[0] = byte;
            self.len = 1;
            self.hunting = false;

            // A lone marker followed by another marker lost nothing
            if discarded > 1 {
                return FeedResult::Invalid(FrameError::Framing { received: discarded });
            }
            return FeedResult::Incomplete;
        }

        if self.len == 0 {
            if self.hunting {
                return FeedResult::Incomplete;
            }
            self.hunting = true;
            return FeedResult::Invalid(FrameError::Framing { received: 1 });
        }

        if byte & !FDC1_DATA_MASK != 0 {
            let received = self.len;
            self.len = 0;
            self.hunting = true;
            return FeedResult::Invalid(FrameError::Framing { received });
        }

        self.buffer[self.len] = byte;
        self.len += 1;

        if self.len < FDC1_FRAME_SIZE {
            return FeedResult::Incomplete;
        }

        self.len = 0;
        match decode_frame(&self.buffer) {
            Ok(frame) => FeedResult::Frame(frame),
            Err(e) => FeedResult::Invalid(e),
        }
    }
}

/// Validate and decode a complete FDC1 frame
///
/// # Arguments
///
/// * `frame` - All 22 frame bytes, marker first
///
/// # Returns
///
/// * `Result<Frame, FrameError>` - Decoded frame, or the reason it was rejected
///
/// # Errors
///
/// Returns error if:
/// - The first byte is not the start marker
/// - The checksum byte does not match
/// - The mode byte is neither default nor settings
pub fn decode_frame(frame: &RawFrame) -> Result<Frame, FrameError> {
    if frame[0] != FDC1_START_MARKER {
        return Err(FrameError::Framing { received: FDC1_FRAME_SIZE });
    }

    let expected = checksum(&frame[..OFFSET_CHECKSUM]);
    let actual = frame[OFFSET_CHECKSUM];
    if expected != actual {
        return Err(FrameError::ChecksumMismatch { expected, actual });
    }

    match Mode::from_byte(frame[OFFSET_MODE]) {
        Some(Mode::Default) => Ok(Frame::Telemetry(TelemetryReading {
            rpm: read_field(frame, OFFSET_SPEED),
            milliamps: read_field(frame, OFFSET_CURRENT),
            error_flags: frame[OFFSET_ERROR_FLAGS],
            running: frame[OFFSET_DEFAULT_STATUS] & STATUS_RUNNING != 0,
        })),
        Some(Mode::Settings) => Ok(Frame::Settings {
            settings: SettingsSnapshot {
                min_speed: read_field(frame, OFFSET_MIN_SPEED),
                max_speed: read_field(frame, OFFSET_MAX_SPEED),
                cut_out_12v: read_field(frame, OFFSET_CUT_OUT_12V),
                cut_in_12v: read_field(frame, OFFSET_CUT_IN_12V),
                cut_out_24v: read_field(frame, OFFSET_CUT_OUT_24V),
                cut_in_24v: read_field(frame, OFFSET_CUT_IN_24V),
                cut_out_42v: read_field(frame, OFFSET_CUT_OUT_42V),
                cut_in_42v: read_field(frame, OFFSET_CUT_IN_42V),
                mode: frame[OFFSET_MODE_SWITCHES],
            },
            running: frame[OFFSET_SETTINGS_STATUS] & STATUS_RUNNING != 0,
        }),
        None => Err(FrameError::UnknownMode(frame[OFFSET_MODE])),
    }
}
