//! # FDC1 Driver Library
//!
//! Non-blocking driver for the FDC1 telemetry protocol of Cubigel
//! refrigeration compressor controllers.
//!
//! A periodic tick drains one or two serial lines, reassembles and validates
//! 22-byte frames, and accumulates speed, current and error statistics that
//! the host reads (and resets) whenever it likes.

pub mod config;
pub mod error;
pub mod fdc1;
pub mod device;
pub mod driver;
pub mod serial;
pub mod simulator;
pub mod telemetry;
