//! WK3 host-mode command builders and input parsers.
//!
//! This module provides functions to construct the byte frames the keyer
//! understands and to validate user-supplied hex and text before it reaches
//! the wire.
//!
//! All functions are pure -- they produce byte vectors without performing any
//! I/O. The caller is responsible for sending the frames over a transport.
//!
//! # WK3 command reference
//!
//! Host-mode commands are a command byte followed by zero or one value byte.
//! Admin commands share command byte `0x00` and carry a sub-command:
//!
//! ```text
//! 00 02   Admin:Open (enter host mode, keyer answers with revision code)
//! 00 03   Admin:Close (exit host mode)
//! 02 nn   set speed, nn = WPM
//! 09 nn   set pin configuration register
//! 0E nn   set mode register
//! 11 nn   set key compensation, nn = milliseconds
//! ```
//!
//! Bytes `0x20..=0x7F` outside a command are queued as Morse text.

use std::fmt;

use bytes::{BufMut, BytesMut};
use wk3_core::{Error, ModeRegister, PinConfig, Result};

/// Command byte shared by all admin sub-commands.
pub const CMD_ADMIN: u8 = 0x00;
/// Set speed in WPM.
pub const CMD_SET_SPEED: u8 = 0x02;
/// Set pin configuration register.
pub const CMD_SET_PIN_CONFIG: u8 = 0x09;
/// Set mode register.
pub const CMD_SET_MODE: u8 = 0x0E;
/// Set key compensation in milliseconds.
pub const CMD_SET_KEY_COMP: u8 = 0x11;

/// Lowest speed the keyer accepts.
pub const MIN_WPM: u8 = 5;
/// Highest speed the keyer accepts.
pub const MAX_WPM: u8 = 99;
/// Highest key compensation the engine will send.
pub const MAX_KEY_COMP_MS: u8 = 50;

/// Admin sub-commands (second byte after [`CMD_ADMIN`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdminCommand {
    /// Reset the keyer to power-up defaults.
    Reset,
    /// Enter host mode. Answered with the firmware revision code.
    Open,
    /// Exit host mode.
    Close,
    /// Echo the next byte sent back to the host.
    EchoTest,
    /// Request a status byte.
    RequestStatus,
    /// Read back supply voltage. Answered with one raw byte.
    ReadVcc,
    /// Read back the X2MODE register.
    LoadX2Mode,
    /// Report SMT or DIP package.
    GetIcType,
}

impl AdminCommand {
    /// All admin sub-commands, in wire-value order.
    pub const ALL: [AdminCommand; 8] = [
        AdminCommand::Reset,
        AdminCommand::Open,
        AdminCommand::Close,
        AdminCommand::EchoTest,
        AdminCommand::RequestStatus,
        AdminCommand::ReadVcc,
        AdminCommand::LoadX2Mode,
        AdminCommand::GetIcType,
    ];

    /// Sub-command byte on the wire.
    pub fn code(self) -> u8 {
        match self {
            AdminCommand::Reset => 0x01,
            AdminCommand::Open => 0x02,
            AdminCommand::Close => 0x03,
            AdminCommand::EchoTest => 0x04,
            AdminCommand::RequestStatus => 0x15,
            AdminCommand::ReadVcc => 0x21,
            AdminCommand::LoadX2Mode => 0x22,
            AdminCommand::GetIcType => 0x24,
        }
    }

    /// Look up a sub-command by its wire byte.
    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.code() == code)
    }
}

impl fmt::Display for AdminCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AdminCommand::Reset => "Admin:Reset",
            AdminCommand::Open => "Admin:Open",
            AdminCommand::Close => "Admin:Close",
            AdminCommand::EchoTest => "Echo Test",
            AdminCommand::RequestStatus => "Request Status",
            AdminCommand::ReadVcc => "Read Back Vcc",
            AdminCommand::LoadX2Mode => "Load X2MODE",
            AdminCommand::GetIcType => "Get IC Type",
        };
        f.write_str(s)
    }
}

fn two_byte_frame(cmd: u8, value: u8) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(2);
    buf.put_u8(cmd);
    buf.put_u8(value);
    buf.to_vec()
}

/// Build an admin frame (`00 nn`).
pub fn cmd_admin(command: AdminCommand) -> Vec<u8> {
    two_byte_frame(CMD_ADMIN, command.code())
}

/// Build a "set mode register" frame (`0E nn`).
pub fn cmd_set_mode_register(mode: &ModeRegister) -> Vec<u8> {
    two_byte_frame(CMD_SET_MODE, mode.to_byte())
}

/// Build a "set pin configuration" frame (`09 nn`).
pub fn cmd_set_pin_config(pin_config: &PinConfig) -> Vec<u8> {
    two_byte_frame(CMD_SET_PIN_CONFIG, pin_config.to_byte())
}

/// Build a "set speed" frame (`02 nn`).
///
/// The value is not range-checked here; the engine validates WPM against
/// its configured maximum before building the frame.
pub fn cmd_set_speed(wpm: u8) -> Vec<u8> {
    two_byte_frame(CMD_SET_SPEED, wpm)
}

/// Build a "set key compensation" frame (`11 nn`).
pub fn cmd_set_key_comp(ms: u8) -> Vec<u8> {
    two_byte_frame(CMD_SET_KEY_COMP, ms)
}

/// Parse a user-entered hex command such as `"0E 50"` or `"48656C6C6F"`.
///
/// Spaces are ignored. Empty input, characters outside `0-9A-Fa-f`, and an
/// odd number of digits are rejected with [`Error::InvalidParameter`].
pub fn parse_hex_command(input: &str) -> Result<Vec<u8>> {
    let digits: String = input.chars().filter(|c| *c != ' ').collect();

    if digits.is_empty() {
        return Err(Error::InvalidParameter("empty hex command".into()));
    }
    if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(Error::InvalidParameter(
            "Invalid hex string. Use only 0-9 and A-F.".into(),
        ));
    }
    if digits.len() % 2 != 0 {
        return Err(Error::InvalidParameter(
            "Hex string must have even length.".into(),
        ));
    }

    digits
        .as_bytes()
        .chunks(2)
        .map(|pair| {
            let s = std::str::from_utf8(pair)
                .map_err(|e| Error::InvalidParameter(format!("invalid hex digits: {e}")))?;
            u8::from_str_radix(s, 16)
                .map_err(|e| Error::InvalidParameter(format!("invalid hex byte {s:?}: {e}")))
        })
        .collect()
}

/// Encode text for the keyer to send as Morse.
///
/// Text is uppercased. Non-ASCII and control characters are rejected, as is
/// an empty string.
pub fn encode_text(text: &str) -> Result<Vec<u8>> {
    if text.is_empty() {
        return Err(Error::InvalidParameter("empty text".into()));
    }
    if let Some(c) = text.chars().find(|c| !(c.is_ascii() && !c.is_ascii_control())) {
        return Err(Error::InvalidParameter(format!(
            "character {c:?} cannot be sent by the keyer"
        )));
    }

    let mut buf = BytesMut::with_capacity(text.len());
    buf.put_slice(text.to_ascii_uppercase().as_bytes());
    Ok(buf.to_vec())
}

/// Format bytes as space-separated uppercase hex (`"0E 50"`).
pub fn format_hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Return the frame as text when every byte is printable ASCII.
pub fn printable_text(bytes: &[u8]) -> Option<&str> {
    if !bytes.is_empty() && bytes.iter().all(|b| (0x20..=0x7E).contains(b)) {
        std::str::from_utf8(bytes).ok()
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_frames() {
        assert_eq!(cmd_admin(AdminCommand::Open), vec![0x00, 0x02]);
        assert_eq!(cmd_admin(AdminCommand::Close), vec![0x00, 0x03]);
        assert_eq!(cmd_admin(AdminCommand::ReadVcc), vec![0x00, 0x21]);
        assert_eq!(cmd_admin(AdminCommand::GetIcType), vec![0x00, 0x24]);
    }

    #[test]
    fn admin_code_lookup() {
        for cmd in AdminCommand::ALL {
            assert_eq!(AdminCommand::from_code(cmd.code()), Some(cmd));
        }
        assert_eq!(AdminCommand::from_code(0x7F), None);
    }

    #[test]
    fn register_frames() {
        assert_eq!(cmd_set_mode_register(&ModeRegister::default()), vec![0x0E, 0x50]);
        assert_eq!(cmd_set_pin_config(&PinConfig::default()), vec![0x09, 0x06]);
        assert_eq!(cmd_set_speed(20), vec![0x02, 0x14]);
        assert_eq!(cmd_set_key_comp(25), vec![0x11, 0x19]);
    }

    #[test]
    fn parse_hex_accepts_spaces_and_case() {
        assert_eq!(parse_hex_command("0e 50").unwrap(), vec![0x0E, 0x50]);
        assert_eq!(
            parse_hex_command("48656C6C6F").unwrap(),
            b"Hello".to_vec()
        );
    }

    #[test]
    fn parse_hex_rejects_non_hex() {
        assert!(matches!(
            parse_hex_command("4g"),
            Err(Error::InvalidParameter(_))
        ));
    }

    #[test]
    fn parse_hex_rejects_odd_length() {
        assert!(matches!(
            parse_hex_command("0E5"),
            Err(Error::InvalidParameter(_))
        ));
    }

    #[test]
    fn parse_hex_rejects_empty() {
        assert!(matches!(parse_hex_command("   "), Err(Error::InvalidParameter(_))));
    }

    #[test]
    fn text_is_uppercased() {
        assert_eq!(encode_text("cq test").unwrap(), b"CQ TEST".to_vec());
    }

    #[test]
    fn text_rejects_non_ascii_and_empty() {
        assert!(encode_text("").is_err());
        assert!(encode_text("73 de Ø").is_err());
        assert!(encode_text("a\tb").is_err());
    }

    #[test]
    fn hex_formatting() {
        assert_eq!(format_hex(&[0x0E, 0x50]), "0E 50");
        assert_eq!(format_hex(&[]), "");
    }

    #[test]
    fn printable_detection() {
        assert_eq!(printable_text(b"CQ"), Some("CQ"));
        assert_eq!(printable_text(&[0x00, 0x02]), None);
        assert_eq!(printable_text(&[]), None);
    }
}
