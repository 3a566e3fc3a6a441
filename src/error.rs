//! # Error Types
//!
//! Custom error types for the FDC1 driver using `thiserror`.

use thiserror::Error;

/// Main error type for the FDC1 driver
#[derive(Debug, Error)]
pub enum Fdc1Error {
    /// Channel index outside the configured topology
    #[error("Invalid channel index {index} (driver has {count} channels)")]
    InvalidChannel { index: usize, count: usize },

    /// Unsupported combination of byte sources at construction
    #[error("Invalid channel topology: {0}")]
    Topology(String),

    /// Serial port errors
    #[error("Serial error: {0}")]
    Serial(String),

    /// None of the candidate serial devices could be opened
    #[error("No serial device found (tried: {0})")]
    SerialPortNotFound(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Reasons a received frame is rejected
///
/// These never propagate out of the driver; each one is counted as a
/// communications error on its channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FrameError {
    /// Trailing checksum byte does not match the frame contents
    #[error("Checksum mismatch: expected 0x{expected:02X}, got 0x{actual:02X}")]
    ChecksumMismatch { expected: u8, actual: u8 },

    /// Frame cut short by a new start marker or an out-of-range byte
    #[error("Framing error after {received} bytes")]
    Framing { received: usize },

    /// Checksum-valid frame carrying an unknown mode byte
    #[error("Unknown frame mode 0x{0:02X}")]
    UnknownMode(u8),
}

/// Result type alias for the FDC1 driver
pub type Result<T> = std::result::Result<T, Fdc1Error>;
