//! # FDC1 Protocol Module
//!
//! Implementation of the FDC1 telemetry protocol spoken by Cubigel compressor
//! controllers.
//!
//! This module handles:
//! - Frame layout constants and decoded frame types
//! - 7-bit additive checksum calculation
//! - Byte-at-a-time frame assembly with resynchronization
//! - Frame and mode command encoding

pub mod protocol;
pub mod checksum;
pub mod assembler;
pub mod encoder;
