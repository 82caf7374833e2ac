//! KeyerBuilder -- fluent builder for connecting to a WK3 keyer.
//!
//! Separates configuration from construction so that callers can set up
//! serial parameters, the defaults written when host mode opens, and the
//! speed limit before the transport is opened.
//!
//! # Example
//!
//! ```no_run
//! use wk3_protocol::builder::KeyerBuilder;
//!
//! # async fn example() -> wk3_core::Result<()> {
//! let keyer = KeyerBuilder::new()
//!     .serial_port("/dev/ttyUSB0")
//!     .baud_rate(1200)
//!     .build()
//!     .await?;
//! keyer.enter_host_mode().await?;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use tokio::sync::broadcast;

use wk3_core::error::{Error, Result};
use wk3_core::transport::Transport;
use wk3_transport::{SerialConfig, SerialTransport};

use crate::commands::{MAX_KEY_COMP_MS, MAX_WPM, MIN_WPM};
use crate::engine::{KeystrokeSink, NullKeystrokeSink, ProtocolEngine};
use crate::io::{IoConfig, spawn_io_task};
use crate::keyer::Keyer;
use crate::session::KeyerDefaults;

/// Fluent builder for [`Keyer`].
pub struct KeyerBuilder {
    serial_port: Option<String>,
    serial_config: SerialConfig,
    poll_interval: Duration,
    request_timeout: Duration,
    max_wpm: u8,
    defaults: KeyerDefaults,
    event_capacity: usize,
    keystroke_sink: Option<Box<dyn KeystrokeSink>>,
}

impl KeyerBuilder {
    pub fn new() -> Self {
        KeyerBuilder {
            serial_port: None,
            serial_config: SerialConfig::default(),
            poll_interval: Duration::from_millis(50),
            request_timeout: Duration::from_secs(1),
            max_wpm: MAX_WPM,
            defaults: KeyerDefaults::default(),
            event_capacity: 256,
            keystroke_sink: None,
        }
    }

    /// Set the serial port path (e.g. `/dev/ttyUSB0` or `COM3`).
    pub fn serial_port(mut self, port: &str) -> Self {
        self.serial_port = Some(port.to_string());
        self
    }

    /// Set the baud rate: 1200 (default) or 9600.
    pub fn baud_rate(mut self, baud: u32) -> Self {
        self.serial_config.baud_rate = baud;
        self
    }

    /// Replace the full serial line configuration.
    pub fn serial_config(mut self, config: SerialConfig) -> Self {
        self.serial_config = config;
        self
    }

    /// How long a single read may block before pending requests are
    /// serviced (default: 50ms).
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// How long a [`Keyer`] call waits for the IO task (default: 1s).
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Highest speed accepted by [`Command::SetWpm`](crate::engine::Command::SetWpm)
    /// (default: 99). Some front ends limit this to 50.
    pub fn max_wpm(mut self, wpm: u8) -> Self {
        self.max_wpm = wpm;
        self
    }

    /// Values written to the keyer when host mode opens.
    pub fn defaults(mut self, defaults: KeyerDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    /// Key compensation written when host mode opens (default: 25ms).
    pub fn default_key_comp(mut self, ms: u8) -> Self {
        self.defaults.key_comp_ms = ms;
        self
    }

    /// Capacity of the event broadcast channel (default: 256).
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Receive paddle-echo characters while keyboard emulation is on.
    pub fn keystroke_sink(mut self, sink: impl KeystrokeSink) -> Self {
        self.keystroke_sink = Some(Box::new(sink));
        self
    }

    fn validate(&self) -> Result<()> {
        if !(MIN_WPM..=MAX_WPM).contains(&self.max_wpm) {
            return Err(Error::InvalidParameter(format!(
                "max_wpm {} out of range {MIN_WPM}-{MAX_WPM}",
                self.max_wpm
            )));
        }
        if !(MIN_WPM..=self.max_wpm).contains(&self.defaults.wpm) {
            return Err(Error::InvalidParameter(format!(
                "default speed {} WPM out of range {MIN_WPM}-{}",
                self.defaults.wpm, self.max_wpm
            )));
        }
        if self.defaults.key_comp_ms > MAX_KEY_COMP_MS {
            return Err(Error::InvalidParameter(format!(
                "default key compensation {} ms exceeds {MAX_KEY_COMP_MS}",
                self.defaults.key_comp_ms
            )));
        }
        if self.event_capacity == 0 {
            return Err(Error::InvalidParameter(
                "event_capacity must be at least 1".into(),
            ));
        }
        Ok(())
    }

    fn spawn(self, transport: Box<dyn Transport>, description: String) -> Keyer {
        let (event_tx, _) = broadcast::channel(self.event_capacity);
        let sink = self
            .keystroke_sink
            .unwrap_or_else(|| Box::new(NullKeystrokeSink));
        let engine = ProtocolEngine::new(event_tx.clone(), self.defaults, self.max_wpm, sink);
        let config = IoConfig {
            poll_interval: self.poll_interval,
            description,
        };
        let io = spawn_io_task(transport, engine, event_tx.clone(), config);
        Keyer::new(io, event_tx, self.request_timeout)
    }

    /// Build a [`Keyer`] over a caller-provided transport.
    ///
    /// This is the primary entry point for testing (pass a
    /// `MockTransport` from `wk3-test-harness`).
    pub async fn build_with_transport(self, transport: Box<dyn Transport>) -> Result<Keyer> {
        self.validate()?;
        let description = match &self.serial_port {
            Some(port) => format!("{port} at {} baud", self.serial_config.baud_rate),
            None => "keyer".to_string(),
        };
        Ok(self.spawn(transport, description))
    }

    /// Open the serial port and build a [`Keyer`].
    ///
    /// Requires that [`serial_port()`](Self::serial_port) has been called.
    pub async fn build(self) -> Result<Keyer> {
        self.validate()?;
        self.serial_config.validate()?;
        let port = self
            .serial_port
            .clone()
            .ok_or_else(|| Error::InvalidParameter("serial_port is required for build()".into()))?;

        let transport = SerialTransport::open_with_config(&port, self.serial_config.clone()).await?;
        let description = format!("{port} at {} baud", self.serial_config.baud_rate);
        Ok(self.spawn(Box::new(transport), description))
    }
}

impl Default for KeyerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use wk3_core::{EngineState, KeyerEvent};
    use wk3_test_harness::MockTransport;

    #[tokio::test]
    async fn builder_defaults() {
        let keyer = KeyerBuilder::new()
            .build_with_transport(Box::new(MockTransport::new()))
            .await
            .unwrap();
        let snap = keyer.snapshot().await.unwrap();
        assert_eq!(snap.wpm, 20);
        assert_eq!(snap.key_comp_ms, 25);
        assert_eq!(snap.mode_register.to_byte(), 0x50);
        assert_eq!(snap.pin_config.to_byte(), 0x06);
        assert_eq!(keyer.state().await.unwrap(), EngineState::Connected);
    }

    #[tokio::test]
    async fn builder_serial_port_required_for_build() {
        let result = KeyerBuilder::new().build().await;
        assert!(matches!(result, Err(Error::InvalidParameter(_))));
    }

    #[tokio::test]
    async fn builder_rejects_unsupported_baud() {
        let result = KeyerBuilder::new()
            .serial_port("/dev/ttyUSB0")
            .baud_rate(19_200)
            .build()
            .await;
        assert!(matches!(result, Err(Error::InvalidParameter(_))));
    }

    #[tokio::test]
    async fn builder_rejects_default_speed_above_max() {
        let result = KeyerBuilder::new()
            .max_wpm(50)
            .defaults(KeyerDefaults {
                wpm: 60,
                ..Default::default()
            })
            .build_with_transport(Box::new(MockTransport::new()))
            .await;
        assert!(matches!(result, Err(Error::InvalidParameter(_))));
    }

    #[tokio::test]
    async fn builder_rejects_key_comp_above_limit() {
        let result = KeyerBuilder::new()
            .default_key_comp(51)
            .build_with_transport(Box::new(MockTransport::new()))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn builder_fluent_chain() {
        let mock = MockTransport::new();
        let handle = mock.handle();
        let keyer = KeyerBuilder::new()
            .serial_port("/dev/ttyUSB0")
            .baud_rate(9600)
            .poll_interval(Duration::from_millis(20))
            .request_timeout(Duration::from_millis(500))
            .max_wpm(50)
            .default_key_comp(50)
            .event_capacity(64)
            .build_with_transport(Box::new(mock))
            .await
            .unwrap();
        let mut rx = keyer.subscribe();

        keyer.enter_host_mode().await.unwrap();
        handle.push_inbound(&[0x37]);
        loop {
            if rx.recv().await.unwrap() == (KeyerEvent::HostModeChanged { active: true }) {
                break;
            }
        }
        keyer.snapshot().await.unwrap();

        assert_eq!(handle.sent_data().last(), Some(&vec![0x11, 0x32]));
        let result = keyer
            .apply(crate::engine::Command::SetWpm(51))
            .await;
        assert!(matches!(result, Err(Error::InvalidParameter(_))));
    }

    #[tokio::test]
    async fn builder_keystroke_sink_receives_echo() {
        struct Collect(Arc<Mutex<String>>);
        impl KeystrokeSink for Collect {
            fn key(&self, c: char) {
                self.0.lock().unwrap().push(c);
            }
        }

        let typed = Arc::new(Mutex::new(String::new()));
        let mock = MockTransport::new();
        let handle = mock.handle();
        let keyer = KeyerBuilder::new()
            .keystroke_sink(Collect(Arc::clone(&typed)))
            .build_with_transport(Box::new(mock))
            .await
            .unwrap();
        let mut rx = keyer.subscribe();

        keyer.set_emulation(true).await.unwrap();
        handle.push_inbound(b"73");
        let mut seen = 0;
        while seen < 2 {
            if let KeyerEvent::DisplayChar(_) = rx.recv().await.unwrap() {
                seen += 1;
            }
        }

        assert_eq!(typed.lock().unwrap().as_str(), "73");
    }
}
