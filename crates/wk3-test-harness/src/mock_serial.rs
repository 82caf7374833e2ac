//! Mock transport for deterministic testing of the keyer protocol engine.
//!
//! [`MockTransport`] implements the [`Transport`] trait over an in-memory
//! byte queue. Because the IO task takes ownership of its transport, every
//! mock hands out a cloneable [`MockHandle`] that keeps working after the
//! transport has been moved: tests use it to inject bytes "from the keyer"
//! and to inspect what was written.
//!
//! # Example
//!
//! ```
//! use wk3_test_harness::MockTransport;
//!
//! let mut mock = MockTransport::new();
//! let handle = mock.handle();
//!
//! // When Admin:Open is written, the keyer answers with revision 0x37.
//! mock.expect(&[0x00, 0x02], &[0x37]);
//!
//! // Unsolicited status byte from the keyer.
//! handle.push_inbound(&[0xC0]);
//! ```

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use wk3_core::error::{Error, Result};
use wk3_core::transport::Transport;

/// A pre-loaded request/response pair for the mock transport.
#[derive(Debug, Clone)]
struct Expectation {
    /// The exact bytes we expect to be sent.
    request: Vec<u8>,
    /// Bytes queued for reading once the matching request is sent.
    response: Vec<u8>,
}

#[derive(Debug)]
struct Inner {
    expectations: VecDeque<Expectation>,
    /// Reject sends that have no matching expectation.
    strict: bool,
    /// Bytes waiting to be returned by `receive()`.
    inbound: VecDeque<u8>,
    connected: bool,
    /// Fail every `send()` with [`Error::ConnectionLost`].
    fail_sends: bool,
    /// Log of all bytes sent, one entry per `send()` call.
    sent_log: Vec<Vec<u8>>,
}

fn lock(inner: &Mutex<Inner>) -> MutexGuard<'_, Inner> {
    inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// A mock [`Transport`] for testing the protocol engine without hardware.
///
/// By default every send is accepted and recorded. Expectations, when
/// present, are consumed in order: the sent bytes must match the next
/// expectation and its response is queued for reading. A strict mock
/// ([`MockTransport::strict`]) additionally rejects sends once the
/// expectation queue is empty.
#[derive(Debug)]
pub struct MockTransport {
    inner: Arc<Mutex<Inner>>,
}

/// Shared view of a [`MockTransport`] that outlives moving the transport
/// into an IO task.
#[derive(Debug, Clone)]
pub struct MockHandle {
    inner: Arc<Mutex<Inner>>,
}

impl MockTransport {
    /// Create a new, lenient mock transport in the connected state.
    pub fn new() -> Self {
        MockTransport {
            inner: Arc::new(Mutex::new(Inner {
                expectations: VecDeque::new(),
                strict: false,
                inbound: VecDeque::new(),
                connected: true,
                fail_sends: false,
                sent_log: Vec::new(),
            })),
        }
    }

    /// Create a mock that rejects any send without a matching expectation.
    pub fn strict() -> Self {
        let mock = Self::new();
        lock(&mock.inner).strict = true;
        mock
    }

    /// Get a handle for injecting inbound bytes and inspecting sends.
    pub fn handle(&self) -> MockHandle {
        MockHandle {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Add an expected request/response pair.
    ///
    /// When `send()` is called with data matching `request`, `response` is
    /// queued for the following `receive()` calls.
    pub fn expect(&mut self, request: &[u8], response: &[u8]) {
        lock(&self.inner).expectations.push_back(Expectation {
            request: request.to_vec(),
            response: response.to_vec(),
        });
    }

    /// Return a copy of all data that has been sent through this transport.
    pub fn sent_data(&self) -> Vec<Vec<u8>> {
        self.handle().sent_data()
    }

    /// Return the number of expectations that have not yet been consumed.
    pub fn remaining_expectations(&self) -> usize {
        self.handle().remaining_expectations()
    }

    /// Set the connected state of the mock transport.
    ///
    /// When set to `false`, subsequent `send()` and `receive()` calls will
    /// return [`Error::NotConnected`].
    pub fn set_connected(&mut self, connected: bool) {
        self.handle().set_connected(connected);
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockHandle {
    /// Queue bytes as if the keyer had sent them.
    pub fn push_inbound(&self, data: &[u8]) {
        lock(&self.inner).inbound.extend(data.iter().copied());
    }

    /// Copy of every `send()` payload so far, in order.
    pub fn sent_data(&self) -> Vec<Vec<u8>> {
        lock(&self.inner).sent_log.clone()
    }

    /// Forget everything sent so far.
    pub fn clear_sent(&self) {
        lock(&self.inner).sent_log.clear();
    }

    /// Number of expectations not yet consumed.
    pub fn remaining_expectations(&self) -> usize {
        lock(&self.inner).expectations.len()
    }

    /// Number of inbound bytes not yet read.
    pub fn pending_inbound(&self) -> usize {
        lock(&self.inner).inbound.len()
    }

    /// Make subsequent sends fail as if the cable had been pulled.
    pub fn fail_sends(&self, fail: bool) {
        lock(&self.inner).fail_sends = fail;
    }

    /// Set the connected state.
    pub fn set_connected(&self, connected: bool) {
        lock(&self.inner).connected = connected;
    }

    /// Whether the transport is still open.
    pub fn is_connected(&self) -> bool {
        lock(&self.inner).connected
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        let mut inner = lock(&self.inner);
        if !inner.connected {
            return Err(Error::NotConnected);
        }
        if inner.fail_sends {
            return Err(Error::ConnectionLost);
        }

        inner.sent_log.push(data.to_vec());

        if let Some(expectation) = inner.expectations.pop_front() {
            if data != expectation.request.as_slice() {
                return Err(Error::Protocol(format!(
                    "unexpected send data: expected {:02X?}, got {:02X?}",
                    expectation.request, data
                )));
            }
            inner.inbound.extend(expectation.response);
            Ok(())
        } else if inner.strict {
            Err(Error::Protocol(
                "no more expectations in mock transport".into(),
            ))
        } else {
            Ok(())
        }
    }

    async fn receive(&mut self, buf: &mut [u8], _timeout: Duration) -> Result<usize> {
        let mut inner = lock(&self.inner);
        if !inner.connected {
            return Err(Error::NotConnected);
        }
        if inner.inbound.is_empty() {
            return Err(Error::Timeout);
        }

        let n = inner.inbound.len().min(buf.len());
        for (slot, byte) in buf.iter_mut().zip(inner.inbound.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    async fn close(&mut self) -> Result<()> {
        let mut inner = lock(&self.inner);
        inner.connected = false;
        inner.inbound.clear();
        Ok(())
    }

    fn is_connected(&self) -> bool {
        lock(&self.inner).connected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_transport_expectation_queues_response() {
        let mut mock = MockTransport::new();
        mock.expect(&[0x00, 0x02], &[0x37]);

        mock.send(&[0x00, 0x02]).await.unwrap();

        let mut buf = [0u8; 16];
        let n = mock
            .receive(&mut buf, Duration::from_millis(100))
            .await
            .unwrap();
        assert_eq!(&buf[..n], &[0x37]);
    }

    #[tokio::test]
    async fn mock_transport_lenient_accepts_unexpected_sends() {
        let mut mock = MockTransport::new();
        mock.send(&[0x0E, 0x50]).await.unwrap();
        mock.send(&[0x09, 0x06]).await.unwrap();
        assert_eq!(mock.sent_data(), vec![vec![0x0E, 0x50], vec![0x09, 0x06]]);
    }

    #[tokio::test]
    async fn mock_transport_strict_rejects_unexpected_sends() {
        let mut mock = MockTransport::strict();
        let result = mock.send(&[0x01]).await;
        assert!(matches!(result.unwrap_err(), Error::Protocol(_)));
    }

    #[tokio::test]
    async fn mock_transport_wrong_data_errors() {
        let mut mock = MockTransport::new();
        mock.expect(&[0x01], &[0xFF]);

        let result = mock.send(&[0x99]).await;
        assert!(matches!(result.unwrap_err(), Error::Protocol(_)));
    }

    #[tokio::test]
    async fn mock_transport_receive_without_data_times_out() {
        let mut mock = MockTransport::new();
        let mut buf = [0u8; 8];

        let result = mock.receive(&mut buf, Duration::from_millis(10)).await;
        assert!(matches!(result.unwrap_err(), Error::Timeout));
    }

    #[tokio::test]
    async fn mock_handle_pushes_inbound_after_move() {
        let mock = MockTransport::new();
        let handle = mock.handle();
        let mut boxed: Box<dyn Transport> = Box::new(mock);

        handle.push_inbound(&[0xC0, 0x85, 0x41]);
        assert_eq!(handle.pending_inbound(), 3);

        let mut buf = [0u8; 2];
        let n = boxed.receive(&mut buf, Duration::from_millis(10)).await.unwrap();
        assert_eq!(&buf[..n], &[0xC0, 0x85]);
        let n = boxed.receive(&mut buf, Duration::from_millis(10)).await.unwrap();
        assert_eq!(&buf[..n], &[0x41]);
        assert_eq!(handle.pending_inbound(), 0);
    }

    #[tokio::test]
    async fn mock_handle_sees_sends_after_move() {
        let mock = MockTransport::new();
        let handle = mock.handle();
        let mut boxed: Box<dyn Transport> = Box::new(mock);

        boxed.send(&[0x02, 0x14]).await.unwrap();
        assert_eq!(handle.sent_data(), vec![vec![0x02, 0x14]]);

        handle.clear_sent();
        assert!(handle.sent_data().is_empty());
    }

    #[tokio::test]
    async fn mock_transport_failed_sends() {
        let mut mock = MockTransport::new();
        mock.handle().fail_sends(true);

        let result = mock.send(&[0x00, 0x03]).await;
        assert!(matches!(result.unwrap_err(), Error::ConnectionLost));
        assert!(mock.sent_data().is_empty());
    }

    #[tokio::test]
    async fn mock_transport_disconnect() {
        let mut mock = MockTransport::new();
        assert!(mock.is_connected());

        mock.close().await.unwrap();
        assert!(!mock.is_connected());

        let result = mock.send(&[0x01]).await;
        assert!(matches!(result.unwrap_err(), Error::NotConnected));
    }

    #[tokio::test]
    async fn mock_transport_set_connected() {
        let mut mock = MockTransport::new();
        mock.set_connected(false);
        assert!(!mock.is_connected());

        let mut buf = [0u8; 8];
        let result = mock.receive(&mut buf, Duration::from_millis(10)).await;
        assert!(matches!(result.unwrap_err(), Error::NotConnected));
    }

    #[tokio::test]
    async fn mock_transport_remaining_expectations() {
        let mut mock = MockTransport::new();
        mock.expect(&[0x00, 0x21], &[0x64]);
        mock.expect(&[0x00, 0x24], &[0x01]);
        assert_eq!(mock.remaining_expectations(), 2);

        mock.send(&[0x00, 0x21]).await.unwrap();
        assert_eq!(mock.remaining_expectations(), 1);
    }
}
