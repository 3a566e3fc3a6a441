//! # Driver Module
//!
//! Ties byte sources, frame assembly and device state together.
//!
//! This module handles:
//! - Draining each channel's byte source on every tick
//! - Applying decoded frames to the shared device state
//! - Transmitting pending mode commands
//! - The foreground read/request API
//!
//! The tick side ([`Dispatcher`]) and the foreground side ([`Fdc1`]) share
//! one [`DeviceState`] per channel. Every access goes through
//! `critical_section::with`, which masks the tick interrupt on a
//! microcontroller and takes a process-wide lock on a hosted target.

use std::cell::RefCell;

use critical_section::Mutex;

use crate::device::DeviceState;
use crate::error::{Fdc1Error, Result};
use crate::serial::{ByteSource, SourceKind};

pub mod api;
pub mod channel;
pub mod dispatcher;
pub mod timer;

pub use api::Fdc1;
pub use channel::ChannelDriver;
pub use dispatcher::Dispatcher;

/// Most channels one driver can serve
pub const MAX_CHANNELS: usize = 2;

/// Device state guarded for access from both execution contexts
pub type SharedDevice = Mutex<RefCell<DeviceState>>;

/// Check a channel list against the supported topologies
///
/// One or two sources, at most one of them software-emulated.
pub fn validate_topology(sources: &[Box<dyn ByteSource>]) -> Result<()> {
    if sources.is_empty() || sources.len() > MAX_CHANNELS {
        return Err(Fdc1Error::Topology(format!(
            "expected 1 to {} byte sources, got {}",
            MAX_CHANNELS,
            sources.len()
        )));
    }

    let software = sources
        .iter()
        .filter(|s| s.kind() == SourceKind::Software)
        .count();
    if software > 1 {
        return Err(Fdc1Error::Topology(
            "only one channel may use the software-emulated UART".to_string(),
        ));
    }

    Ok(())
}

/// Serializes unit tests that build drivers over the software UART
#[cfg(test)]
pub(crate) fn lock_software_uart() -> std::sync::MutexGuard<'static, ()> {
    static SOFTWARE_UART: std::sync::Mutex<()> = std::sync::Mutex::new(());
    SOFTWARE_UART.lock().unwrap_or_else(|e| e.into_inner())
}
