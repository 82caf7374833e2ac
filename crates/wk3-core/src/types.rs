//! Core value types shared by the WK3 protocol engine and its consumers.

use std::fmt;

/// Status byte value some WK3 firmware sends when it is ready after
/// power-up or reset. Reported as-is rather than decoded as flags.
pub const READY_MARKER: u8 = 0xC8;

/// An unsolicited or requested status byte (0xC0-0xFF).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatusByte(pub u8);

impl StatusByte {
    /// Raw byte as received.
    pub fn raw(self) -> u8 {
        self.0
    }

    /// Keyer is busy sending Morse.
    pub fn busy(self) -> bool {
        self.0 & 0x04 != 0
    }

    /// Paddle break-in is active.
    pub fn break_in(self) -> bool {
        self.0 & 0x02 != 0
    }

    /// Input buffer is more than two-thirds full.
    pub fn buffer_xoff(self) -> bool {
        self.0 & 0x01 != 0
    }

    /// The device-ready marker (`0xC8`).
    pub fn is_ready_marker(self) -> bool {
        self.0 == READY_MARKER
    }
}

impl fmt::Display for StatusByte {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let yes_no = |b: bool| if b { "YES" } else { "NO" };
        write!(
            f,
            "BUSY: {}, BREAKIN: {}, Buffer XOFF: {}",
            yes_no(self.busy()),
            yes_no(self.break_in()),
            yes_no(self.buffer_xoff())
        )
    }
}

/// Package type reported by the "get IC type" admin command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IcType {
    Smt,
    Dip,
}

impl IcType {
    /// The keyer answers `0x01` for the surface-mount part; anything else is
    /// the DIP part.
    pub fn from_response(byte: u8) -> Self {
        if byte == 0x01 { IcType::Smt } else { IcType::Dip }
    }
}

impl fmt::Display for IcType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IcType::Smt => f.write_str("SMT"),
            IcType::Dip => f.write_str("DIP"),
        }
    }
}

/// Coarse connection state of a keyer session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineState {
    /// No IO task is running.
    Disconnected,
    /// Transport open, host mode not active.
    Connected,
    /// Host mode active; register commands are accepted.
    HostMode,
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EngineState::Disconnected => "Disconnected",
            EngineState::Connected => "Connected",
            EngineState::HostMode => "Connected (Host Mode)",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_flags() {
        let s = StatusByte(0xC7);
        assert!(s.busy());
        assert!(s.break_in());
        assert!(s.buffer_xoff());

        let s = StatusByte(0xC0);
        assert!(!s.busy());
        assert!(!s.break_in());
        assert!(!s.buffer_xoff());
    }

    #[test]
    fn ready_marker() {
        assert!(StatusByte(0xC8).is_ready_marker());
        assert!(!StatusByte(0xC4).is_ready_marker());
    }

    #[test]
    fn status_display() {
        assert_eq!(
            StatusByte(0xC4).to_string(),
            "BUSY: YES, BREAKIN: NO, Buffer XOFF: NO"
        );
    }

    #[test]
    fn ic_type_from_response() {
        assert_eq!(IcType::from_response(0x01), IcType::Smt);
        assert_eq!(IcType::from_response(0x00), IcType::Dip);
        assert_eq!(IcType::from_response(0x7F), IcType::Dip);
        assert_eq!(IcType::Smt.to_string(), "SMT");
    }

    #[test]
    fn engine_state_display() {
        assert_eq!(EngineState::HostMode.to_string(), "Connected (Host Mode)");
        assert_eq!(EngineState::Disconnected.to_string(), "Disconnected");
    }
}
