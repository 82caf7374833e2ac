//! Inbound byte classification.
//!
//! Everything the keyer sends is a single byte, and its two top bits say what
//! kind of byte it is:
//!
//! ```text
//! 11xx xxxx  status byte (busy / break-in / xoff flags)
//! 10vv vvvv  speed potentiometer position, v = 0-63
//! 0xxx xxxx  echo: paddle echo, serial echo, or a command response
//! ```

use wk3_core::StatusByte;

/// Mask selecting the two category bits.
const CATEGORY_MASK: u8 = 0xC0;
/// Category bits of a status byte.
const STATUS_BITS: u8 = 0xC0;
/// Category bits of a speed-pot byte.
const SPEED_POT_BITS: u8 = 0x80;
/// Mask selecting the speed-pot value.
const SPEED_POT_VALUE_MASK: u8 = 0x3F;

/// One classified inbound byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundByte {
    /// `0xC0..=0xFF`.
    Status(StatusByte),
    /// `0x80..=0xBF`, carrying the pot value in the low six bits.
    SpeedPot(u8),
    /// `0x00..=0x7F`.
    Echo(u8),
}

/// Classify a single byte received from the keyer.
pub fn classify(byte: u8) -> InboundByte {
    match byte & CATEGORY_MASK {
        STATUS_BITS => InboundByte::Status(StatusByte(byte)),
        SPEED_POT_BITS => InboundByte::SpeedPot(byte & SPEED_POT_VALUE_MASK),
        _ => InboundByte::Echo(byte),
    }
}
