//! Asynchronous keyer event types.
//!
//! Events are emitted by the protocol engine through a
//! `tokio::sync::broadcast` channel as bytes arrive from the keyer and as
//! commands go out. Front ends subscribe to these for log panes, the ASCII
//! monitor, and enabling controls when host mode changes.

use std::fmt;

use crate::registers::{ModeRegister, PinConfig};
use crate::types::{IcType, StatusByte};

/// Category of a human-readable log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogCategory {
    /// Outbound traffic and command summaries.
    Sent,
    /// Inbound traffic and its interpretation.
    Received,
    /// Local validation, precondition, and transport failures.
    Error,
    /// Connection established or host mode became active.
    Connected,
    /// Connection closed or host mode became inactive.
    Disconnected,
    /// Everything else.
    Info,
}

impl fmt::Display for LogCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogCategory::Sent => "sent",
            LogCategory::Received => "received",
            LogCategory::Error => "error",
            LogCategory::Connected => "connected",
            LogCategory::Disconnected => "disconnected",
            LogCategory::Info => "info",
        };
        f.write_str(s)
    }
}

/// An event emitted by the keyer engine.
///
/// Delivered on a best-effort basis through a bounded broadcast channel;
/// slow consumers may miss events under heavy paddle traffic.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyerEvent {
    /// A human-readable log line.
    Log {
        category: LogCategory,
        message: String,
    },

    /// A character decoded from an echo byte, for the ASCII monitor.
    /// CR and LF are both delivered as `'\n'`.
    DisplayChar(char),

    /// Host mode became active or inactive.
    HostModeChanged {
        active: bool,
    },

    /// The locally known register contents changed.
    RegistersChanged {
        mode: ModeRegister,
        pin_config: PinConfig,
    },

    /// A status byte arrived.
    StatusReceived {
        status: StatusByte,
        /// `true` when the byte answers an explicit status request.
        solicited: bool,
    },

    /// The speed potentiometer moved. Value is 0-63.
    SpeedPotChanged {
        value: u8,
    },

    /// The keyer answered Admin:Open with its firmware revision.
    RevisionCode {
        code: u8,
    },

    /// Answer to the read-back Vcc admin command. `volts` is `None` when
    /// the raw reading is zero and cannot be converted.
    VccReading {
        raw: u8,
        volts: Option<f64>,
    },

    /// Answer to the load X2MODE admin command.
    X2ModeReading {
        value: u8,
    },

    /// Answer to the get IC type admin command.
    IcTypeReported {
        ic_type: IcType,
    },

    /// The transport was opened and the IO task started.
    Connected,

    /// The IO task ended and the session was discarded.
    Disconnected,
}

impl KeyerEvent {
    /// Shorthand for a [`KeyerEvent::Log`].
    pub fn log(category: LogCategory, message: impl Into<String>) -> Self {
        KeyerEvent::Log {
            category,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_shorthand() {
        let e = KeyerEvent::log(LogCategory::Sent, "Sent: 00 02");
        assert_eq!(
            e,
            KeyerEvent::Log {
                category: LogCategory::Sent,
                message: "Sent: 00 02".into(),
            }
        );
    }

    #[tokio::test]
    async fn events_fan_out_to_every_subscriber() {
        let (tx, mut first) = tokio::sync::broadcast::channel(16);
        let mut second = tx.subscribe();

        let changed = KeyerEvent::RegistersChanged {
            mode: ModeRegister::default(),
            pin_config: PinConfig::default(),
        };
        tx.send(changed.clone()).unwrap();
        tx.send(KeyerEvent::Disconnected).unwrap();

        for rx in [&mut first, &mut second] {
            assert_eq!(rx.recv().await.unwrap(), changed);
            assert_eq!(rx.recv().await.unwrap(), KeyerEvent::Disconnected);
        }
    }

    #[test]
    fn log_category_display() {
        assert_eq!(LogCategory::Received.to_string(), "received");
        assert_eq!(LogCategory::Error.to_string(), "error");
    }
}
