//! # Software-Emulated UART
//!
//! An in-memory line standing in for a software serial port. The host side
//! holds an [`EmulatedLine`] to inject received bytes and inspect what the
//! driver transmitted; the driver side polls an [`EmulatedSerial`].
//!
//! [`spawn_port_bridge`] backs a line with a real device read asynchronously
//! by a tokio task, which is how a `software` port from the config is served.

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::task::JoinHandle;
use tokio_serial::SerialPortBuilderExt;
use tracing::{info, warn};

use super::{ByteSource, SourceKind};
use crate::error::{Fdc1Error, Result};
use crate::fdc1::protocol::FDC1_BAUD_RATE;

/// How often transmitted bytes are flushed out to the bridged device
const BRIDGE_FLUSH_INTERVAL_MS: u64 = 10;

/// Set while a driver owns the software-emulated UART
static SOFTWARE_UART_CLAIMED: AtomicBool = AtomicBool::new(false);

/// Exclusive process-wide ownership of the software-emulated UART
///
/// Released when dropped.
#[derive(Debug)]
pub struct SoftwareUartClaim {
    _private: (),
}

impl SoftwareUartClaim {
    /// Take the software UART for one channel
    ///
    /// # Errors
    ///
    /// Returns `Topology` if another driver in this process already holds it
    pub fn acquire() -> Result<Self> {
        SOFTWARE_UART_CLAIMED
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| {
                Fdc1Error::Topology("the software-emulated UART is already in use".to_string())
            })?;
        Ok(Self { _private: () })
    }

    /// Whether some driver currently holds the software UART
    pub fn is_claimed() -> bool {
        SOFTWARE_UART_CLAIMED.load(Ordering::Acquire)
    }
}

impl Drop for SoftwareUartClaim {
    fn drop(&mut self) {
        SOFTWARE_UART_CLAIMED.store(false, Ordering::Release);
    }
}

#[derive(Debug, Default)]
struct LineBuffers {
    /// Bytes waiting to be read by the driver
    rx: VecDeque<u8>,
    /// Bytes written by the driver
    tx: Vec<u8>,
}

/// Host-side handle to an emulated serial line
#[derive(Debug, Clone, Default)]
pub struct EmulatedLine {
    buffers: Arc<Mutex<LineBuffers>>,
}

impl EmulatedLine {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, LineBuffers> {
        // A panic while holding the lock leaves plain byte buffers behind
        self.buffers.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Queue bytes as if they had arrived on the wire
    pub fn inject(&self, bytes: &[u8]) {
        self.lock().rx.extend(bytes.iter().copied());
    }

    /// Number of received bytes not yet consumed by the driver
    pub fn pending(&self) -> usize {
        self.lock().rx.len()
    }

    /// Drain everything the driver has transmitted so far
    pub fn take_transmitted(&self) -> Vec<u8> {
        std::mem::take(&mut self.lock().tx)
    }

    /// Driver-side source reading from this line
    pub fn source(&self) -> EmulatedSerial {
        EmulatedSerial { line: self.clone() }
    }
}

/// Driver-side view of an emulated line
#[derive(Debug)]
pub struct EmulatedSerial {
    line: EmulatedLine,
}

impl ByteSource for EmulatedSerial {
    fn available(&mut self) -> bool {
        !self.line.lock().rx.is_empty()
    }

    fn read(&mut self) -> io::Result<u8> {
        self.line
            .lock()
            .rx
            .pop_front()
            .ok_or_else(|| io::Error::new(io::ErrorKind::WouldBlock, "emulated line empty"))
    }

    fn write(&mut self, byte: u8) -> io::Result<()> {
        self.line.lock().tx.push(byte);
        Ok(())
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Software
    }
}

/// Bridge a device at `path` onto `line` from a tokio task
///
/// Received bytes are injected into the line as they arrive; bytes the
/// driver wrote are sent out every few milliseconds. The task ends when the
/// device reports an error or end of stream.
///
/// # Errors
///
/// Returns error if the device cannot be opened
pub fn spawn_port_bridge(path: &str, line: EmulatedLine) -> Result<JoinHandle<()>> {
    let mut port = tokio_serial::new(path, FDC1_BAUD_RATE)
        .data_bits(tokio_serial::DataBits::Eight)
        .parity(tokio_serial::Parity::None)
        .stop_bits(tokio_serial::StopBits::One)
        .flow_control(tokio_serial::FlowControl::None)
        .open_native_async()
        .map_err(|e| Fdc1Error::Serial(format!("Failed to open {}: {}", path, e)))?;

    info!("Bridging {} onto the software-emulated UART", path);
    let path = path.to_string();

    Ok(tokio::spawn(async move {
        let mut buf = [0u8; 64];
        let mut flush = tokio::time::interval(Duration::from_millis(BRIDGE_FLUSH_INTERVAL_MS));

        loop {
            tokio::select! {
                result = port.read(&mut buf) => match result {
                    Ok(0) => {
                        warn!("{} closed", path);
                        break;
                    }
                    Ok(n) => line.inject(&buf[..n]),
                    Err(e) => {
                        warn!("Failed to read from {}: {}", path, e);
                        break;
                    }
                },
                _ = flush.tick() => {
                    let outgoing = line.take_transmitted();
                    if outgoing.is_empty() {
                        continue;
                    }
                    if let Err(e) = port.write_all(&outgoing).await {
                        warn!("Failed to write to {}: {}", path, e);
                        break;
                    }
                }
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_injected_bytes_are_read_in_order() {
        let line = EmulatedLine::new();
        let mut source = line.source();

        assert!(!source.available());
        line.inject(&[0x01, 0x02, 0x03]);
        assert_eq!(line.pending(), 3);

        let mut received = Vec::new();
        while source.available() {
            received.push(source.read().unwrap());
        }
        assert_eq!(received, vec![0x01, 0x02, 0x03]);
        assert_eq!(line.pending(), 0);
    }

    #[test]
    fn test_read_on_empty_line_would_block() {
        let line = EmulatedLine::new();
        let mut source = line.source();

        let err = source.read().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::WouldBlock);
    }

    #[test]
    fn test_transmitted_bytes_are_captured_once() {
        let line = EmulatedLine::new();
        let mut source = line.source();

        source.write(0xAB).unwrap();
        source.write(0x01).unwrap();

        assert_eq!(line.take_transmitted(), vec![0xAB, 0x01]);
        assert!(line.take_transmitted().is_empty());
    }

    #[tokio::test]
    async fn test_bridge_to_missing_device_fails() {
        let result = spawn_port_bridge("/dev/nonexistent_fdc1_port", EmulatedLine::new());
        assert!(matches!(result, Err(Fdc1Error::Serial(_))));
    }

    #[test]
    fn test_software_uart_claim_is_exclusive() {
        let _uart = crate::driver::lock_software_uart();

        let claim = SoftwareUartClaim::acquire().unwrap();
        assert!(SoftwareUartClaim::is_claimed());
        assert!(matches!(SoftwareUartClaim::acquire(), Err(Fdc1Error::Topology(_))));

        drop(claim);
        assert!(!SoftwareUartClaim::is_claimed());
        assert!(SoftwareUartClaim::acquire().is_ok());
    }

    #[test]
    fn test_emulated_source_is_software() {
        let line = EmulatedLine::new();
        assert_eq!(line.source().kind(), SourceKind::Software);
    }
}
