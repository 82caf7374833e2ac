//! wk3-protocol: WK3 keyer wire-protocol engine.
//!
//! The keyer speaks a byte-oriented protocol over a serial link. Inbound
//! bytes are classified by their top two bits into status, speed-pot, and
//! echo bytes; outbound commands are short frames (`0E 50`, `00 02`, ...).
//! Configuration lives in two packed registers, the mode register and the
//! pin configuration, which this crate keeps decoded in a per-connection
//! session.
//!
//! # Layers
//!
//! - [`classify`] -- byte to [`InboundByte`]
//! - [`commands`] -- frame builders and hex/text validation
//! - [`tracker`] -- correlates echo bytes with the admin command that asked
//! - [`engine`] -- the synchronous state machine ([`ProtocolEngine`])
//! - [`io`] -- the tokio task that owns the transport and the session
//! - [`keyer`] / [`builder`] -- the async handle applications use
//!
//! # Example
//!
//! ```no_run
//! use wk3_protocol::{Command, KeyerBuilder, KeyerEvent, KeyerMode};
//!
//! # async fn example() -> wk3_core::Result<()> {
//! let keyer = KeyerBuilder::new().serial_port("/dev/ttyUSB0").build().await?;
//! let mut events = keyer.subscribe();
//!
//! keyer.enter_host_mode().await?;
//! while let Ok(event) = events.recv().await {
//!     if event == (KeyerEvent::HostModeChanged { active: true }) {
//!         break;
//!     }
//! }
//! keyer.apply(Command::SetKeyerMode(KeyerMode::IambicB)).await?;
//! keyer.apply(Command::SetWpm(25)).await?;
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod classify;
pub mod commands;
pub mod engine;
pub mod io;
pub mod keyer;
pub mod sequence;
pub mod session;
pub mod tracker;

pub use wk3_core::registers;

pub use builder::KeyerBuilder;
pub use classify::{InboundByte, classify};
pub use commands::{AdminCommand, parse_hex_command};
pub use engine::{Command, KeystrokeSink, NullKeystrokeSink, ProtocolEngine};
pub use keyer::Keyer;
pub use sequence::{Sequence, Step};
pub use session::{AdminState, DeviceSession, KeyerDefaults, SessionSnapshot};
pub use tracker::{CommandTracker, TrackedResponse};
pub use wk3_core::{
    EngineState, Error, Hangtime, KeyerEvent, KeyerMode, LogCategory, ModeRegister, PinConfig,
    Result, StatusByte, UltimaticPriority,
};
