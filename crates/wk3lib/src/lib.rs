//! # wk3lib -- Host-mode control for WK3 Morse keyers
//!
//! `wk3lib` is an asynchronous Rust library for driving a WK3 keyer chip
//! over its serial host interface: entering and leaving host mode, editing
//! the mode and pin-configuration registers, sending text and raw commands,
//! and decoding everything the keyer sends back (status, speed pot, paddle
//! echo, and admin replies).
//!
//! ## Quick Start
//!
//! ```no_run
//! use wk3lib::{Command, KeyerBuilder, KeyerEvent, KeyerMode};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let keyer = KeyerBuilder::new()
//!         .serial_port("/dev/ttyUSB0")
//!         .baud_rate(1200)
//!         .build()
//!         .await?;
//!
//!     let mut events = keyer.subscribe();
//!     keyer.enter_host_mode().await?;
//!     while let Ok(event) = events.recv().await {
//!         if let KeyerEvent::RevisionCode { code } = event {
//!             println!("WK3 revision {code}");
//!             break;
//!         }
//!     }
//!
//!     keyer.apply(Command::SetKeyerMode(KeyerMode::IambicB)).await?;
//!     keyer.send_text("cq test").await?;
//!     keyer.disconnect().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! | Crate              | Purpose                                               |
//! |--------------------|-------------------------------------------------------|
//! | `wk3-core`         | [`Transport`] trait, [`KeyerEvent`], register codec, errors |
//! | `wk3-transport`    | Serial transport                                      |
//! | `wk3-protocol`     | Classifier, command tracker, engine, IO task, [`Keyer`] |
//! | **`wk3lib`**       | This facade crate -- re-exports everything            |
//!
//! ## Host Mode
//!
//! Register commands are only accepted while host mode is active. Host mode
//! opens when the keyer answers Admin:Open with its revision code; the
//! library then writes the default registers (mode `0x50`, pin config
//! `0x06`, 20 WPM, 25 ms key compensation) so its cached view matches the
//! device. Calling [`Keyer::apply`] before that fails with
//! [`Error::HostModeRequired`].
//!
//! ## Events
//!
//! Everything the engine does is reported as a [`KeyerEvent`] on a
//! broadcast channel: log lines with a [`LogCategory`], decoded echo
//! characters for an ASCII monitor, host-mode and register changes, and
//! typed admin replies such as [`KeyerEvent::VccReading`].

pub use wk3_core::*;

pub use wk3_protocol::{
    AdminCommand, AdminState, Command, CommandTracker, DeviceSession, InboundByte, Keyer,
    KeyerBuilder, KeyerDefaults, KeystrokeSink, NullKeystrokeSink, ProtocolEngine, Sequence,
    SessionSnapshot, Step, TrackedResponse, classify, parse_hex_command,
};

/// Frame builders and wire constants.
pub mod commands {
    pub use wk3_protocol::commands::*;
}

/// Serial transport.
pub mod transport {
    pub use wk3_core::transport::*;
    pub use wk3_transport::*;
}
