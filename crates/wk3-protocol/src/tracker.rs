//! Correlation of echo bytes with the admin command that asked for them.
//!
//! The keyer answers a handful of admin commands with a single echo byte
//! that carries no tag of its own. The tracker remembers the most recently
//! sent command byte so the next echo can be read as the right kind of
//! answer.

use wk3_core::IcType;

use crate::commands::{AdminCommand, CMD_ADMIN};

/// Numerator of the Vcc conversion: volts = (26214 / raw) / 100.
const VCC_SCALE: f64 = 26214.0;

/// A typed answer to a tracked admin command.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TrackedResponse {
    /// Answer to [`AdminCommand::ReadVcc`]. `volts` is `None` for a zero
    /// reading, which cannot be converted.
    Vcc { raw: u8, volts: Option<f64> },
    /// Answer to [`AdminCommand::LoadX2Mode`].
    X2Mode(u8),
    /// Answer to [`AdminCommand::GetIcType`].
    IcType(IcType),
}

/// Convert a raw Vcc reading to volts.
pub fn vcc_volts(raw: u8) -> Option<f64> {
    if raw == 0 {
        None
    } else {
        Some((VCC_SCALE / f64::from(raw)) / 100.0)
    }
}

/// Remembers the last trackable command byte.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandTracker {
    last_command: Option<u8>,
}

impl CommandTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// The byte currently being tracked, if any.
    pub fn last_command(&self) -> Option<u8> {
        self.last_command
    }

    /// Note a frame that was just written.
    ///
    /// Admin frames record their sub-command; anything else records its last
    /// byte. Empty frames are ignored.
    pub fn record_sent(&mut self, frame: &[u8]) {
        match frame {
            [CMD_ADMIN, sub, ..] => self.last_command = Some(*sub),
            [.., last] => self.last_command = Some(*last),
            [] => {}
        }
    }

    /// Forget the tracked command.
    pub fn clear(&mut self) {
        self.last_command = None;
    }

    /// Interpret an echo byte against the tracked command.
    ///
    /// Returns `None`, leaving the tracker untouched, when the tracked
    /// command has no single-byte answer.
    pub fn interpret(&mut self, echo: u8) -> Option<TrackedResponse> {
        let command = AdminCommand::from_code(self.last_command?)?;
        let response = match command {
            AdminCommand::ReadVcc => TrackedResponse::Vcc {
                raw: echo,
                volts: vcc_volts(echo),
            },
            AdminCommand::LoadX2Mode => TrackedResponse::X2Mode(echo),
            AdminCommand::GetIcType => TrackedResponse::IcType(IcType::from_response(echo)),
            _ => return None,
        };
        self.clear();
        Some(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_frame_records_sub_command() {
        let mut t = CommandTracker::new();
        t.record_sent(&[0x00, 0x21]);
        assert_eq!(t.last_command(), Some(0x21));
    }

    #[test]
    fn other_frame_records_last_byte() {
        let mut t = CommandTracker::new();
        t.record_sent(&[0x0E, 0x50]);
        assert_eq!(t.last_command(), Some(0x50));
        t.record_sent(&[0x41]);
        assert_eq!(t.last_command(), Some(0x41));
    }

    #[test]
    fn empty_frame_is_ignored() {
        let mut t = CommandTracker::new();
        t.record_sent(&[0x00, 0x22]);
        t.record_sent(&[]);
        assert_eq!(t.last_command(), Some(0x22));
    }

    #[test]
    fn single_zero_byte_is_not_admin() {
        let mut t = CommandTracker::new();
        t.record_sent(&[0x00]);
        assert_eq!(t.last_command(), Some(0x00));
    }

    #[test]
    fn vcc_reading() {
        let mut t = CommandTracker::new();
        t.record_sent(&[0x00, 0x21]);
        let Some(TrackedResponse::Vcc { raw, volts }) = t.interpret(100) else {
            panic!("expected Vcc response");
        };
        assert_eq!(raw, 100);
        assert_eq!(format!("{:.2}", volts.unwrap()), "2.62");
        assert_eq!(t.last_command(), None);
    }

    #[test]
    fn vcc_volts_half_cent_readings() {
        assert_eq!(format!("{:.2}", vcc_volts(4).unwrap()), "65.53");
        assert_eq!(format!("{:.2}", vcc_volts(68).unwrap()), "3.85");
        assert_eq!(vcc_volts(0), None);
    }

    #[test]
    fn vcc_zero_is_not_convertible() {
        let mut t = CommandTracker::new();
        t.record_sent(&[0x00, 0x21]);
        assert_eq!(
            t.interpret(0),
            Some(TrackedResponse::Vcc { raw: 0, volts: None })
        );
    }

    #[test]
    fn x2mode_and_ic_type() {
        let mut t = CommandTracker::new();
        t.record_sent(&[0x00, 0x22]);
        assert_eq!(t.interpret(0x5A), Some(TrackedResponse::X2Mode(0x5A)));

        t.record_sent(&[0x00, 0x24]);
        assert_eq!(
            t.interpret(0x01),
            Some(TrackedResponse::IcType(IcType::Smt))
        );
        t.record_sent(&[0x00, 0x24]);
        assert_eq!(
            t.interpret(0x00),
            Some(TrackedResponse::IcType(IcType::Dip))
        );
    }

    #[test]
    fn untracked_command_leaves_state() {
        let mut t = CommandTracker::new();
        t.record_sent(&[0x00, 0x02]);
        assert_eq!(t.interpret(0x37), None);
        assert_eq!(t.last_command(), Some(0x02));
    }

    #[test]
    fn nothing_tracked() {
        let mut t = CommandTracker::new();
        assert_eq!(t.interpret(0x41), None);
    }
}
