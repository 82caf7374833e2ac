//! Transport trait for keyer communication.
//!
//! The [`Transport`] trait abstracts over the physical link to a WK3 keyer.
//! The protocol engine in `wk3-protocol` operates on a `Transport` rather
//! than directly on a serial port, so the same code drives real hardware
//! (`SerialTransport` from `wk3-transport`) and deterministic tests
//! (`MockTransport` from `wk3-test-harness`).

use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;

/// Asynchronous byte-level transport to a keyer.
///
/// The WK3 protocol has no framing: commands are one or two positional
/// bytes, so a single `send()` call must carry a whole command (address byte
/// followed by value byte) to keep the pair contiguous on the wire.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send raw bytes to the keyer.
    ///
    /// Implementations should block until all bytes have been written to
    /// the underlying transport.
    async fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Receive bytes from the keyer into the provided buffer.
    ///
    /// Returns the number of bytes actually read. Will wait up to `timeout`
    /// for data to arrive; returns [`Error::Timeout`](crate::error::Error::Timeout)
    /// if nothing arrives within the deadline.
    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize>;

    /// Close the transport connection.
    ///
    /// After calling `close()`, subsequent `send()` and `receive()` calls
    /// should return [`Error::NotConnected`](crate::error::Error::NotConnected).
    async fn close(&mut self) -> Result<()>;

    /// Check whether the transport is currently connected.
    fn is_connected(&self) -> bool;
}
