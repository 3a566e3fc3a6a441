//! # Dispatcher
//!
//! The periodic tick entry point. Whatever installs the timer calls
//! [`Dispatcher::tick`] once per period; each call does a bounded amount of
//! work per channel and never waits on I/O.

use std::sync::Arc;

use super::{ChannelDriver, SharedDevice};
use crate::serial::SoftwareUartClaim;

/// Tick-side owner of every channel driver
pub struct Dispatcher {
    channels: Vec<ChannelDriver>,
    devices: Arc<[SharedDevice]>,
    tick_interval_ms: u32,
    clock_ms: u32,
    /// Held for as long as a channel reads the software UART
    software_claim: Option<SoftwareUartClaim>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("channels", &self.channels)
            .field("tick_interval_ms", &self.tick_interval_ms)
            .field("clock_ms", &self.clock_ms)
            .field("software_uart", &self.software_claim.is_some())
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    pub(crate) fn new(
        channels: Vec<ChannelDriver>,
        devices: Arc<[SharedDevice]>,
        tick_interval_ms: u32,
        software_claim: Option<SoftwareUartClaim>,
    ) -> Self {
        Self {
            channels,
            devices,
            tick_interval_ms,
            clock_ms: 0,
            software_claim,
        }
    }

    /// Advance the clock by one period and service every channel in order
    pub fn tick(&mut self) {
        self.clock_ms = self.clock_ms.wrapping_add(self.tick_interval_ms);
        let now = self.clock_ms;

        for (channel, device) in self.channels.iter_mut().zip(self.devices.iter()) {
            channel.step(device, now);
        }
    }

    /// Tick-derived clock in milliseconds, wrapping at `u32::MAX`
    pub fn now_ms(&self) -> u32 {
        self.clock_ms
    }

    pub fn tick_interval_ms(&self) -> u32 {
        self.tick_interval_ms
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Whether one of the channels owns the software-emulated UART
    pub fn uses_software_uart(&self) -> bool {
        self.software_claim.is_some()
    }
}
