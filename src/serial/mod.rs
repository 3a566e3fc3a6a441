//! # Serial Communication Module
//!
//! Byte sources feeding the FDC1 driver.
//!
//! This module handles:
//! - The `ByteSource` capability the driver polls every tick
//! - Hardware UARTs opened at the controller's fixed 1200 baud
//! - A software-emulated UART backed by an in-memory line

use std::io;

pub mod emulated;
pub mod hardware;

pub use emulated::{EmulatedLine, EmulatedSerial, SoftwareUartClaim};
pub use hardware::HardwareSerial;

/// Kind of UART behind a byte source
///
/// Only one software-emulated UART exists per process, so at most one
/// channel may be built on a `Software` source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Hardware,
    Software,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKind::Hardware => write!(f, "hardware"),
            SourceKind::Software => write!(f, "software"),
        }
    }
}

/// Non-blocking byte-level access to one controller connection
///
/// Called from the tick handler, so no method may wait for the line.
#[cfg_attr(test, mockall::automock)]
pub trait ByteSource: Send {
    /// Whether at least one received byte is buffered
    fn available(&mut self) -> bool;

    /// Take the next received byte; only called after `available` returned true
    fn read(&mut self) -> io::Result<u8>;

    /// Transmit a single byte
    fn write(&mut self, byte: u8) -> io::Result<()>;

    /// Kind of UART backing this source
    fn kind(&self) -> SourceKind;
}
