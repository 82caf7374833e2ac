//! wk3-test-harness: Test utilities and mock transports for wk3lib.
//!
//! This crate provides [`MockTransport`] for deterministic unit testing of
//! the protocol engine without a real keyer, and [`MockHandle`] for driving
//! it after it has been handed to an IO task.

pub mod mock_serial;

pub use mock_serial::{MockHandle, MockTransport};
