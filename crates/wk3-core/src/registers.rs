//! WK3 configuration register codec.
//!
//! The keyer exposes two packed configuration bytes that the host rewrites
//! in full whenever a single setting changes:
//!
//! ```text
//! Mode register (WKMode, address 0x0E)
//!   bit 7     paddle watchdog disabled
//!   bit 6     paddle echo enabled
//!   bits 5-4  keyer mode (00 iambic B, 01 iambic A, 10 ultimatic, 11 bug)
//!   bit 3     paddle swap
//!   bit 2     serial echo enabled
//!   bit 1     autospace enabled
//!   bit 0     contest spacing enabled
//!
//! Pin configuration (PinCFG, address 0x09)
//!   bits 7-6  ultimatic priority (00 normal, 01 dah, 10 dit)
//!   bits 5-4  PTT hang time (1 wordspace + 1/2/4/8 dits)
//!   bit 3     key out 1 enabled
//!   bit 2     key out 2 enabled
//!   bit 1     sidetone enabled
//!   bit 0     PTT enabled
//! ```
//!
//! Both codecs are total: every byte decodes, and `encode(decode(b)) == b`
//! for all 256 values.

use std::fmt;

/// Default mode register: paddle echo on, iambic A.
pub const DEFAULT_MODE_REGISTER: u8 = 0x50;

/// Default pin configuration: key out 2 and sidetone on.
pub const DEFAULT_PIN_CONFIG: u8 = 0x06;

const MODE_WATCHDOG_DISABLED: u8 = 0x80;
const MODE_PADDLE_ECHO: u8 = 0x40;
const MODE_KEYER_SHIFT: u8 = 4;
const MODE_PADDLE_SWAP: u8 = 0x08;
const MODE_SERIAL_ECHO: u8 = 0x04;
const MODE_AUTOSPACE: u8 = 0x02;
const MODE_CONTEST_SPACING: u8 = 0x01;

const PIN_PRIORITY_SHIFT: u8 = 6;
const PIN_HANGTIME_SHIFT: u8 = 4;
const PIN_KEYOUT1: u8 = 0x08;
const PIN_KEYOUT2: u8 = 0x04;
const PIN_SIDETONE: u8 = 0x02;
const PIN_PTT: u8 = 0x01;

// ---------------------------------------------------------------
// Field enums
// ---------------------------------------------------------------

/// Paddle keying mode, mode register bits 5-4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum KeyerMode {
    IambicB,
    #[default]
    IambicA,
    Ultimatic,
    Bug,
}

impl KeyerMode {
    /// All modes in wire order.
    pub const ALL: [KeyerMode; 4] = [
        KeyerMode::IambicB,
        KeyerMode::IambicA,
        KeyerMode::Ultimatic,
        KeyerMode::Bug,
    ];

    /// Two-bit field value.
    pub fn bits(self) -> u8 {
        match self {
            KeyerMode::IambicB => 0,
            KeyerMode::IambicA => 1,
            KeyerMode::Ultimatic => 2,
            KeyerMode::Bug => 3,
        }
    }

    /// Decode from the low two bits of `bits`.
    pub fn from_bits(bits: u8) -> Self {
        Self::ALL[(bits & 0x03) as usize]
    }
}

impl fmt::Display for KeyerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            KeyerMode::IambicB => "Iambic B",
            KeyerMode::IambicA => "Iambic A",
            KeyerMode::Ultimatic => "Ultimatic",
            KeyerMode::Bug => "Bug",
        };
        f.write_str(s)
    }
}

/// Which paddle wins when both are squeezed in ultimatic mode, pin config
/// bits 7-6.
///
/// The keyer documents three values. `Reserved` carries the fourth bit
/// pattern (`11`) so that a byte read back from the device survives a
/// decode/encode round trip unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum UltimaticPriority {
    #[default]
    Normal,
    DahPriority,
    DitPriority,
    Reserved,
}

impl UltimaticPriority {
    pub fn bits(self) -> u8 {
        match self {
            UltimaticPriority::Normal => 0,
            UltimaticPriority::DahPriority => 1,
            UltimaticPriority::DitPriority => 2,
            UltimaticPriority::Reserved => 3,
        }
    }

    pub fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0 => UltimaticPriority::Normal,
            1 => UltimaticPriority::DahPriority,
            2 => UltimaticPriority::DitPriority,
            _ => UltimaticPriority::Reserved,
        }
    }
}

impl fmt::Display for UltimaticPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UltimaticPriority::Normal => "Normal",
            UltimaticPriority::DahPriority => "Dah Priority",
            UltimaticPriority::DitPriority => "Dit Priority",
            UltimaticPriority::Reserved => "Reserved",
        };
        f.write_str(s)
    }
}

/// PTT hang time after the last element, pin config bits 5-4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Hangtime {
    /// 1 wordspace + 1 dit.
    #[default]
    W1D1,
    /// 1 wordspace + 2 dits.
    W1D2,
    /// 1 wordspace + 4 dits.
    W1D4,
    /// 1 wordspace + 8 dits.
    W1D8,
}

impl Hangtime {
    pub const ALL: [Hangtime; 4] = [Hangtime::W1D1, Hangtime::W1D2, Hangtime::W1D4, Hangtime::W1D8];

    pub fn bits(self) -> u8 {
        match self {
            Hangtime::W1D1 => 0,
            Hangtime::W1D2 => 1,
            Hangtime::W1D4 => 2,
            Hangtime::W1D8 => 3,
        }
    }

    pub fn from_bits(bits: u8) -> Self {
        Self::ALL[(bits & 0x03) as usize]
    }

    /// Number of dits added to the wordspace.
    pub fn dits(self) -> u8 {
        1 << self.bits()
    }
}

impl fmt::Display for Hangtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dits = self.dits();
        if dits == 1 {
            write!(f, "1 wordspace + 1 dit")
        } else {
            write!(f, "1 wordspace + {dits} dits")
        }
    }
}

// ---------------------------------------------------------------
// Mode register
// ---------------------------------------------------------------

/// Decoded mode register (WKMode).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModeRegister {
    pub paddle_watchdog_disabled: bool,
    pub paddle_echo_enabled: bool,
    pub keyer_mode: KeyerMode,
    pub paddle_swapped: bool,
    pub serial_echo_enabled: bool,
    pub autospace_enabled: bool,
    pub contest_spacing_enabled: bool,
}

impl ModeRegister {
    /// Unpack a raw register byte.
    pub fn from_byte(byte: u8) -> Self {
        ModeRegister {
            paddle_watchdog_disabled: byte & MODE_WATCHDOG_DISABLED != 0,
            paddle_echo_enabled: byte & MODE_PADDLE_ECHO != 0,
            keyer_mode: KeyerMode::from_bits(byte >> MODE_KEYER_SHIFT),
            paddle_swapped: byte & MODE_PADDLE_SWAP != 0,
            serial_echo_enabled: byte & MODE_SERIAL_ECHO != 0,
            autospace_enabled: byte & MODE_AUTOSPACE != 0,
            contest_spacing_enabled: byte & MODE_CONTEST_SPACING != 0,
        }
    }

    /// Pack into the raw register byte.
    pub fn to_byte(&self) -> u8 {
        let mut byte = self.keyer_mode.bits() << MODE_KEYER_SHIFT;
        if self.paddle_watchdog_disabled {
            byte |= MODE_WATCHDOG_DISABLED;
        }
        if self.paddle_echo_enabled {
            byte |= MODE_PADDLE_ECHO;
        }
        if self.paddle_swapped {
            byte |= MODE_PADDLE_SWAP;
        }
        if self.serial_echo_enabled {
            byte |= MODE_SERIAL_ECHO;
        }
        if self.autospace_enabled {
            byte |= MODE_AUTOSPACE;
        }
        if self.contest_spacing_enabled {
            byte |= MODE_CONTEST_SPACING;
        }
        byte
    }
}

impl Default for ModeRegister {
    fn default() -> Self {
        Self::from_byte(DEFAULT_MODE_REGISTER)
    }
}

impl fmt::Display for ModeRegister {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let byte = self.to_byte();
        write!(f, "0x{byte:02X} ({byte:08b})")
    }
}

// ---------------------------------------------------------------
// Pin configuration
// ---------------------------------------------------------------

/// Decoded pin configuration register (PinCFG).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PinConfig {
    pub ultimatic_priority: UltimaticPriority,
    pub hangtime: Hangtime,
    pub keyout1_enabled: bool,
    pub keyout2_enabled: bool,
    pub sidetone_enabled: bool,
    pub ptt_enabled: bool,
}

impl PinConfig {
    /// Unpack a raw register byte.
    pub fn from_byte(byte: u8) -> Self {
        PinConfig {
            ultimatic_priority: UltimaticPriority::from_bits(byte >> PIN_PRIORITY_SHIFT),
            hangtime: Hangtime::from_bits(byte >> PIN_HANGTIME_SHIFT),
            keyout1_enabled: byte & PIN_KEYOUT1 != 0,
            keyout2_enabled: byte & PIN_KEYOUT2 != 0,
            sidetone_enabled: byte & PIN_SIDETONE != 0,
            ptt_enabled: byte & PIN_PTT != 0,
        }
    }

    /// Pack into the raw register byte.
    pub fn to_byte(&self) -> u8 {
        let mut byte = (self.ultimatic_priority.bits() << PIN_PRIORITY_SHIFT)
            | (self.hangtime.bits() << PIN_HANGTIME_SHIFT);
        if self.keyout1_enabled {
            byte |= PIN_KEYOUT1;
        }
        if self.keyout2_enabled {
            byte |= PIN_KEYOUT2;
        }
        if self.sidetone_enabled {
            byte |= PIN_SIDETONE;
        }
        if self.ptt_enabled {
            byte |= PIN_PTT;
        }
        byte
    }
}

impl Default for PinConfig {
    fn default() -> Self {
        Self::from_byte(DEFAULT_PIN_CONFIG)
    }
}

impl fmt::Display for PinConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let byte = self.to_byte();
        write!(f, "0x{byte:02X} ({byte:08b})")
    }
}

// ---------------------------------------------------------------
// Free-function codec
// ---------------------------------------------------------------

/// Pack a [`ModeRegister`] into its wire byte.
pub fn encode_mode(fields: &ModeRegister) -> u8 {
    fields.to_byte()
}

/// Unpack a mode register byte. Every byte value is valid.
pub fn decode_mode(byte: u8) -> ModeRegister {
    ModeRegister::from_byte(byte)
}

/// Pack a [`PinConfig`] into its wire byte.
pub fn encode_pin_config(fields: &PinConfig) -> u8 {
    fields.to_byte()
}

/// Unpack a pin configuration byte. Every byte value is valid.
pub fn decode_pin_config(byte: u8) -> PinConfig {
    PinConfig::from_byte(byte)
}
