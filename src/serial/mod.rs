//! # Serial Communication Module
//!
//! Handles the USB serial link to the bioimpedance sensor board.
//!
//! This module handles:
//! - Opening the serial port with the configured baud rate (8N1)
//! - Waiting for the board to settle after the port opens
//! - Exposing the port as an async byte stream for line reading

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, ReadBuf};
use tracing::{debug, info};

use crate::config::SerialConfig;
use crate::error::{BridgeError, Result};

/// Sensor Serial Port Handler
///
/// Manages the connection to the sensor board's USB serial port. Dropping
/// the handle closes the port.
pub struct SensorSerial {
    /// Serial port handle
    port: tokio_serial::SerialStream,
    /// Device path (e.g., /dev/cu.usbmodem101)
    device_path: String,
    baud_rate: u32,
}

impl std::fmt::Debug for SensorSerial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SensorSerial")
            .field("device_path", &self.device_path)
            .field("baud_rate", &self.baud_rate)
            .finish_non_exhaustive()
    }
}

impl SensorSerial {
    /// Open the sensor port described by `config`
    ///
    /// # Errors
    ///
    /// Returns `BridgeError::Serial` if the device cannot be opened.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use bioimpedance_bridge::config::SerialConfig;
    /// use bioimpedance_bridge::serial::SensorSerial;
    ///
    /// fn main() -> anyhow::Result<()> {
    ///     let serial = SensorSerial::open(&SerialConfig::default())?;
    ///     println!("Connected to: {}", serial.device_path());
    ///     Ok(())
    /// }
    /// ```
    pub fn open(config: &SerialConfig) -> Result<Self> {
        debug!("Trying to open serial port: {}", config.port);

        let port = Self::open_port(config)?;
        info!("Connected to {} at {} baud.", config.port, config.baud_rate);

        Ok(Self {
            port,
            device_path: config.port.clone(),
            baud_rate: config.baud_rate,
        })
    }

    /// Open a specific serial port with 8N1 settings
    fn open_port(config: &SerialConfig) -> Result<tokio_serial::SerialStream> {
        use tokio_serial::SerialPortBuilderExt;

        let path = config.port.as_str();
        let port = tokio_serial::new(path, config.baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .timeout(config.read_timeout())
            .open_native_async()
            .map_err(|e| BridgeError::Serial(format!("Failed to open {}: {}", path, e)))?;

        Ok(port)
    }

    /// Wait for the board to finish its reset after the port opens
    ///
    /// Opening the port toggles DTR, which reboots most Arduino-style boards;
    /// lines sent before the sketch is running are boot noise.
    pub async fn settle(&self, config: &SerialConfig) {
        let delay = config.settle_delay();
        if !delay.is_zero() {
            debug!("Waiting {:?} for {} to settle", delay, self.device_path);
            tokio::time::sleep(delay).await;
        }
        info!("Connected to sensor board");
    }

    /// Get the device path of the opened serial port
    pub fn device_path(&self) -> &str {
        &self.device_path
    }

    /// Get the configured baud rate
    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }
}

impl AsyncRead for SensorSerial {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.port).poll_read(cx, buf)
    }
}
