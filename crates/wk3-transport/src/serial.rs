//! Serial port transport for keyer communication.
//!
//! This module provides [`SerialTransport`], which implements the [`Transport`]
//! trait for the USB virtual COM port a WK3 keyer presents.
//!
//! The WK3 host interface runs at 1200 baud by default and can be switched
//! to 9600 baud; both use 8 data bits, no parity, and no flow control.
//!
//! # Example
//!
//! ```no_run
//! use wk3_transport::SerialTransport;
//! use wk3_core::transport::Transport;
//! use std::time::Duration;
//!
//! # async fn example() -> wk3_core::Result<()> {
//! let mut transport = SerialTransport::open("/dev/ttyUSB0", 1200).await?;
//!
//! // Admin:Open (enter host mode)
//! transport.send(&[0x00, 0x02]).await?;
//!
//! // Revision code comes back as a single echo byte
//! let mut buf = [0u8; 16];
//! let n = transport.receive(&mut buf, Duration::from_secs(1)).await?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_serial::{SerialPort, SerialPortBuilderExt, SerialStream};
use wk3_core::error::{Error, Result};
use wk3_core::transport::Transport;

/// Baud rates the WK3 host interface supports.
pub const SUPPORTED_BAUD_RATES: [u32; 2] = [1200, 9600];

/// Serial port configuration.
///
/// Defaults match the WK3 host interface: 1200 baud, 8 data bits, 2 stop
/// bits, no parity, no flow control, DTR asserted.
#[derive(Debug, Clone)]
pub struct SerialConfig {
    /// Baud rate (1200 or 9600)
    pub baud_rate: u32,
    /// Number of data bits (8)
    pub data_bits: DataBits,
    /// Number of stop bits
    pub stop_bits: StopBits,
    /// Parity checking (None)
    pub parity: Parity,
    /// Flow control (None)
    pub flow_control: FlowControl,
    /// Drive DTR high after opening. Some keyer interfaces draw power or
    /// detect the host from DTR.
    pub assert_dtr: bool,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            baud_rate: 1200,
            data_bits: DataBits::Eight,
            stop_bits: StopBits::Two,
            parity: Parity::None,
            flow_control: FlowControl::None,
            assert_dtr: true,
        }
    }
}

impl SerialConfig {
    /// Reject baud rates the keyer cannot run at.
    pub fn validate(&self) -> Result<()> {
        if SUPPORTED_BAUD_RATES.contains(&self.baud_rate) {
            Ok(())
        } else {
            Err(Error::InvalidParameter(format!(
                "unsupported baud rate {} (expected 1200 or 9600)",
                self.baud_rate
            )))
        }
    }
}

/// Number of data bits per character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataBits {
    Seven,
    Eight,
}

impl From<DataBits> for tokio_serial::DataBits {
    fn from(bits: DataBits) -> Self {
        match bits {
            DataBits::Seven => tokio_serial::DataBits::Seven,
            DataBits::Eight => tokio_serial::DataBits::Eight,
        }
    }
}

/// Number of stop bits per character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopBits {
    One,
    Two,
}

impl From<StopBits> for tokio_serial::StopBits {
    fn from(bits: StopBits) -> Self {
        match bits {
            StopBits::One => tokio_serial::StopBits::One,
            StopBits::Two => tokio_serial::StopBits::Two,
        }
    }
}

/// Parity checking mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parity {
    None,
    Odd,
    Even,
}

impl From<Parity> for tokio_serial::Parity {
    fn from(parity: Parity) -> Self {
        match parity {
            Parity::None => tokio_serial::Parity::None,
            Parity::Odd => tokio_serial::Parity::Odd,
            Parity::Even => tokio_serial::Parity::Even,
        }
    }
}

/// Flow control mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowControl {
    None,
    Software,
    Hardware,
}

impl From<FlowControl> for tokio_serial::FlowControl {
    fn from(flow: FlowControl) -> Self {
        match flow {
            FlowControl::None => tokio_serial::FlowControl::None,
            FlowControl::Software => tokio_serial::FlowControl::Software,
            FlowControl::Hardware => tokio_serial::FlowControl::Hardware,
        }
    }
}

/// Serial port transport for a WK3 keyer.
pub struct SerialTransport {
    port: Option<SerialStream>,
    port_name: String,
}

impl SerialTransport {
    /// Open a serial port with the given baud rate and WK3 defaults.
    ///
    /// # Arguments
    ///
    /// * `port` - Serial port path (e.g., "/dev/ttyUSB0" on Linux, "COM3" on Windows)
    /// * `baud_rate` - 1200 or 9600
    pub async fn open(port: &str, baud_rate: u32) -> Result<Self> {
        let config = SerialConfig {
            baud_rate,
            ..Default::default()
        };
        Self::open_with_config(port, config).await
    }

    /// Open a serial port with full configuration control.
    pub async fn open_with_config(port: &str, config: SerialConfig) -> Result<Self> {
        if port.is_empty() {
            return Err(Error::InvalidParameter("no serial port selected".into()));
        }
        config.validate()?;

        tracing::debug!(
            port = %port,
            baud_rate = config.baud_rate,
            data_bits = ?config.data_bits,
            stop_bits = ?config.stop_bits,
            parity = ?config.parity,
            flow_control = ?config.flow_control,
            "Opening serial port"
        );

        let mut serial_stream = tokio_serial::new(port, config.baud_rate)
            .data_bits(config.data_bits.into())
            .stop_bits(config.stop_bits.into())
            .parity(config.parity.into())
            .flow_control(config.flow_control.into())
            .open_native_async()
            .map_err(|e| {
                tracing::error!(port = %port, error = %e, "Failed to open serial port");
                Error::Transport(format!("Failed to open serial port {}: {}", port, e))
            })?;

        if let Err(e) = serial_stream.write_data_terminal_ready(config.assert_dtr) {
            tracing::warn!(port = %port, error = %e, "Failed to set DTR");
        }

        tracing::info!(
            port = %port,
            baud_rate = config.baud_rate,
            "Serial port opened successfully"
        );

        Ok(Self {
            port: Some(serial_stream),
            port_name: port.to_string(),
        })
    }

    /// Get the name of the serial port.
    pub fn port_name(&self) -> &str {
        &self.port_name
    }
}

fn map_io_error(e: std::io::Error) -> Error {
    if e.kind() == std::io::ErrorKind::BrokenPipe || e.kind() == std::io::ErrorKind::NotConnected {
        Error::ConnectionLost
    } else {
        Error::Io(e)
    }
}

#[async_trait]
impl Transport for SerialTransport {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        let port = self.port.as_mut().ok_or(Error::NotConnected)?;

        tracing::trace!(
            port = %self.port_name,
            bytes = data.len(),
            data = ?data,
            "Sending data"
        );

        port.write_all(data).await.map_err(|e| {
            tracing::error!(port = %self.port_name, error = %e, "Failed to send data");
            map_io_error(e)
        })?;

        port.flush().await.map_err(|e| {
            tracing::error!(port = %self.port_name, error = %e, "Failed to flush serial port");
            map_io_error(e)
        })?;

        Ok(())
    }

    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        let port = self.port.as_mut().ok_or(Error::NotConnected)?;

        match tokio::time::timeout(timeout, port.read(buf)).await {
            Ok(Ok(0)) => {
                tracing::warn!(port = %self.port_name, "Serial port returned end of stream");
                Err(Error::ConnectionLost)
            }
            Ok(Ok(n)) => {
                tracing::trace!(
                    port = %self.port_name,
                    bytes = n,
                    data = ?&buf[..n],
                    "Received data"
                );
                Ok(n)
            }
            Ok(Err(e)) => {
                tracing::error!(port = %self.port_name, error = %e, "Failed to receive data");
                Err(map_io_error(e))
            }
            Err(_) => Err(Error::Timeout),
        }
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(mut port) = self.port.take() {
            tracing::debug!(port = %self.port_name, "Closing serial port");

            if let Err(e) = port.flush().await {
                tracing::warn!(
                    port = %self.port_name,
                    error = %e,
                    "Failed to flush before closing (continuing anyway)"
                );
            }

            tracing::info!(port = %self.port_name, "Serial port closed");
        }

        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.port.is_some()
    }
}

impl Drop for SerialTransport {
    fn drop(&mut self) {
        if self.port.is_some() {
            tracing::debug!(port = %self.port_name, "SerialTransport dropped, closing port");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serial_config_default() {
        let config = SerialConfig::default();
        assert_eq!(config.baud_rate, 1200);
        assert_eq!(config.data_bits, DataBits::Eight);
        assert_eq!(config.stop_bits, StopBits::Two);
        assert_eq!(config.parity, Parity::None);
        assert_eq!(config.flow_control, FlowControl::None);
        assert!(config.assert_dtr);
    }

    #[test]
    fn test_supported_baud_rates_validate() {
        for baud in SUPPORTED_BAUD_RATES {
            let config = SerialConfig {
                baud_rate: baud,
                ..Default::default()
            };
            assert!(config.validate().is_ok());
        }
    }

    #[test]
    fn test_unsupported_baud_rate_rejected() {
        let config = SerialConfig {
            baud_rate: 115_200,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::InvalidParameter(_))));
    }

    #[tokio::test]
    async fn test_empty_port_rejected_before_open() {
        let result = SerialTransport::open("", 1200).await;
        assert!(matches!(result, Err(Error::InvalidParameter(_))));
    }

    #[tokio::test]
    async fn test_bad_baud_rejected_before_open() {
        let result = SerialTransport::open("/dev/does-not-exist", 4800).await;
        assert!(matches!(result, Err(Error::InvalidParameter(_))));
    }

    #[test]
    fn test_line_setting_conversions() {
        let _: tokio_serial::DataBits = DataBits::Eight.into();
        let _: tokio_serial::StopBits = StopBits::Two.into();
        let _: tokio_serial::Parity = Parity::None.into();
        let _: tokio_serial::FlowControl = FlowControl::None.into();
    }
}
