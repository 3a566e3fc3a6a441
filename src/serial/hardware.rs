//! # Hardware UART Source
//!
//! Byte source backed by a real serial port opened through `tokio_serial`.

use std::io::{self, Read, Write};
use std::time::Duration;

use tokio_serial::SerialPort;
use tracing::{debug, info, warn};

use super::{ByteSource, SourceKind};
use crate::error::{Fdc1Error, Result};
use crate::fdc1::protocol::FDC1_BAUD_RATE;

/// Read timeout; reads only happen after `bytes_to_read` reported data
const READ_TIMEOUT_MS: u64 = 10;

/// Hardware UART connected to one compressor controller
pub struct HardwareSerial {
    /// Serial port handle
    port: Box<dyn SerialPort>,
    /// Device path (e.g., /dev/ttyUSB0)
    device_path: String,
}

impl std::fmt::Debug for HardwareSerial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HardwareSerial")
            .field("device_path", &self.device_path)
            .finish_non_exhaustive()
    }
}

impl HardwareSerial {
    /// Open the controller on a specific device path
    ///
    /// # Errors
    ///
    /// Returns error if the port cannot be opened at 1200 baud 8N1
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use fdc1_driver::serial::HardwareSerial;
    ///
    /// let serial = HardwareSerial::open("/dev/ttyUSB0")?;
    /// println!("Connected to: {}", serial.device_path());
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn open(path: &str) -> Result<Self> {
        let port = Self::open_port(path)?;
        info!("Opened FDC1 controller port at {}", path);
        Ok(Self {
            port,
            device_path: path.to_string(),
        })
    }

    /// Open the first device path that succeeds
    ///
    /// # Arguments
    ///
    /// * `paths` - Device paths to try in order
    ///
    /// # Errors
    ///
    /// Returns `SerialPortNotFound` listing every path when none can be opened
    pub fn open_with_paths(paths: &[&str]) -> Result<Self> {
        for path in paths {
            debug!("Trying to open serial port: {}", path);

            match Self::open(path) {
                Ok(serial) => return Ok(serial),
                Err(e) => {
                    warn!("Failed to open {}: {}", path, e);
                    continue;
                }
            }
        }

        Err(Fdc1Error::SerialPortNotFound(paths.join(", ")))
    }

    fn open_port(path: &str) -> Result<Box<dyn SerialPort>> {
        tokio_serial::new(path, FDC1_BAUD_RATE)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .timeout(Duration::from_millis(READ_TIMEOUT_MS))
            .open()
            .map_err(|e| Fdc1Error::Serial(format!("Failed to open {}: {}", path, e)))
    }

    /// Device path of the opened port
    pub fn device_path(&self) -> &str {
        &self.device_path
    }
}

impl ByteSource for HardwareSerial {
    fn available(&mut self) -> bool {
        match self.port.bytes_to_read() {
            Ok(count) => count > 0,
            Err(e) => {
                debug!("Failed to query {}: {}", self.device_path, e);
                false
            }
        }
    }

    fn read(&mut self) -> io::Result<u8> {
        let mut byte = [0u8; 1];
        self.port.read_exact(&mut byte)?;
        Ok(byte[0])
    }

    fn write(&mut self, byte: u8) -> io::Result<()> {
        self.port.write_all(&[byte])?;
        self.port.flush()
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Hardware
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_with_invalid_paths_returns_error() {
        let invalid_paths = &["/dev/nonexistent0", "/dev/nonexistent1"];
        let result = HardwareSerial::open_with_paths(invalid_paths);

        match result {
            Err(Fdc1Error::SerialPortNotFound(msg)) => {
                assert!(msg.contains("/dev/nonexistent0"));
                assert!(msg.contains("/dev/nonexistent1"));
            }
            other => panic!("Expected SerialPortNotFound error, got: {:?}", other),
        }
    }

    #[test]
    fn test_open_with_empty_paths_returns_error() {
        let empty_paths: &[&str] = &[];
        let result = HardwareSerial::open_with_paths(empty_paths);
        assert!(matches!(result, Err(Fdc1Error::SerialPortNotFound(_))));
    }

    #[test]
    fn test_open_invalid_path_returns_serial_error() {
        let result = HardwareSerial::open("/dev/nonexistent_serial_device_12345");

        match result {
            Err(Fdc1Error::Serial(msg)) => {
                assert!(msg.contains("/dev/nonexistent_serial_device_12345"));
                assert!(msg.contains("Failed to open"));
            }
            other => panic!("Expected Serial error, got: {:?}", other),
        }
    }

    // Only runs with a controller attached
    #[test]
    #[ignore] // Run with: cargo test -- --ignored
    fn test_open_with_real_hardware() {
        match HardwareSerial::open_with_paths(&["/dev/ttyUSB0", "/dev/ttyACM0"]) {
            Ok(mut serial) => {
                assert_eq!(serial.kind(), SourceKind::Hardware);
                let waiting = serial.available();
                println!(
                    "Opened {} ({} bytes waiting: {})",
                    serial.device_path(),
                    serial.kind(),
                    waiting
                );
            }
            Err(_) => println!("No FDC1 hardware detected (this is OK for CI/CD)"),
        }
    }
}
