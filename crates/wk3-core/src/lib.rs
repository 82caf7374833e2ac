//! wk3-core: Core traits, types, and error definitions for wk3lib.
//!
//! This crate defines the pieces every other crate in the workspace shares:
//! the byte-level [`Transport`] abstraction, the [`KeyerEvent`] stream type,
//! the WK3 register codec, and the error type.
//!
//! # Key types
//!
//! - [`Transport`] -- byte-level communication channel
//! - [`ModeRegister`] / [`PinConfig`] -- decoded configuration registers
//! - [`KeyerEvent`] -- asynchronous notifications from the engine
//! - [`Error`] / [`Result`] -- error handling

pub mod error;
pub mod events;
pub mod registers;
pub mod transport;
pub mod types;

// Re-export key types at crate root for ergonomic `use wk3_core::*`.
pub use error::{Error, Result};
pub use events::{KeyerEvent, LogCategory};
pub use registers::{
    DEFAULT_MODE_REGISTER, DEFAULT_PIN_CONFIG, Hangtime, KeyerMode, ModeRegister, PinConfig,
    UltimaticPriority, decode_mode, decode_pin_config, encode_mode, encode_pin_config,
};
pub use transport::Transport;
pub use types::{EngineState, IcType, READY_MARKER, StatusByte};
