//! Transport implementations for wk3lib.
//!
//! This crate provides [`SerialTransport`], the concrete implementation of
//! the [`Transport`](wk3_core::Transport) trait for the USB virtual COM port
//! a WK3 keyer presents.
//!
//! # Example
//!
//! ```no_run
//! use wk3_transport::SerialTransport;
//! use wk3_core::transport::Transport;
//!
//! # async fn example() -> wk3_core::Result<()> {
//! let mut transport = SerialTransport::open("/dev/ttyUSB0", 1200).await?;
//! transport.send(&[0x00, 0x02]).await?;
//! # Ok(())
//! # }
//! ```

pub mod serial;

pub use serial::{
    DataBits, FlowControl, Parity, SUPPORTED_BAUD_RATES, SerialConfig, SerialTransport, StopBits,
};
