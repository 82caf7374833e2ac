//! Per-connection keyer state.

use wk3_core::{DEFAULT_MODE_REGISTER, DEFAULT_PIN_CONFIG, ModeRegister, PinConfig};

use crate::tracker::CommandTracker;

/// Speed written to the keyer when host mode opens.
pub const DEFAULT_WPM: u8 = 20;
/// Key compensation written to the keyer when host mode opens.
pub const DEFAULT_KEY_COMP_MS: u8 = 25;

/// Progress of the Admin:Open handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AdminState {
    #[default]
    Idle,
    /// Admin:Open was sent; the next untracked echo byte is the revision code.
    AwaitingAdminOpenReply,
}

/// Values written to the keyer when host mode opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyerDefaults {
    pub mode_register: u8,
    pub pin_config: u8,
    pub wpm: u8,
    pub key_comp_ms: u8,
}

impl Default for KeyerDefaults {
    fn default() -> Self {
        Self {
            mode_register: DEFAULT_MODE_REGISTER,
            pin_config: DEFAULT_PIN_CONFIG,
            wpm: DEFAULT_WPM,
            key_comp_ms: DEFAULT_KEY_COMP_MS,
        }
    }
}

/// Mutable state of one keyer connection.
///
/// Created when the IO task starts and dropped when it ends. Only the
/// [`ProtocolEngine`](crate::engine::ProtocolEngine) mutates it.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceSession {
    pub host_mode_active: bool,
    pub current_wpm: u8,
    pub current_key_comp: u8,
    pub mode_register: ModeRegister,
    pub pin_config: PinConfig,
    pub admin: AdminState,
    pub expecting_status_byte: bool,
    pub tracker: CommandTracker,
    pub emulation_enabled: bool,
}

impl DeviceSession {
    /// A fresh session outside host mode, with registers at `defaults`.
    pub fn new(defaults: &KeyerDefaults) -> Self {
        Self {
            host_mode_active: false,
            current_wpm: defaults.wpm,
            current_key_comp: defaults.key_comp_ms,
            mode_register: ModeRegister::from_byte(defaults.mode_register),
            pin_config: PinConfig::from_byte(defaults.pin_config),
            admin: AdminState::Idle,
            expecting_status_byte: false,
            tracker: CommandTracker::new(),
            emulation_enabled: false,
        }
    }

    /// Restore register caches, speed and key compensation to `defaults`.
    ///
    /// Host-mode, admin and emulation flags are left alone.
    pub fn reset_to_defaults(&mut self, defaults: &KeyerDefaults) {
        self.current_wpm = defaults.wpm;
        self.current_key_comp = defaults.key_comp_ms;
        self.mode_register = ModeRegister::from_byte(defaults.mode_register);
        self.pin_config = PinConfig::from_byte(defaults.pin_config);
    }

    /// A copy of the observable state.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            host_mode_active: self.host_mode_active,
            awaiting_revision: self.admin == AdminState::AwaitingAdminOpenReply,
            wpm: self.current_wpm,
            key_comp_ms: self.current_key_comp,
            mode_register: self.mode_register,
            pin_config: self.pin_config,
            emulation_enabled: self.emulation_enabled,
        }
    }
}

impl Default for DeviceSession {
    fn default() -> Self {
        Self::new(&KeyerDefaults::default())
    }
}

/// Read-only view of a [`DeviceSession`], returned by
/// [`Keyer::snapshot`](crate::keyer::Keyer::snapshot).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionSnapshot {
    pub host_mode_active: bool,
    pub awaiting_revision: bool,
    pub wpm: u8,
    pub key_comp_ms: u8,
    pub mode_register: ModeRegister,
    pub pin_config: PinConfig,
    pub emulation_enabled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use wk3_core::{Hangtime, KeyerMode};

    #[test]
    fn new_session_is_outside_host_mode() {
        let s = DeviceSession::default();
        assert!(!s.host_mode_active);
        assert_eq!(s.admin, AdminState::Idle);
        assert_eq!(s.mode_register.to_byte(), 0x50);
        assert_eq!(s.pin_config.to_byte(), 0x06);
        assert_eq!(s.current_wpm, 20);
        assert_eq!(s.current_key_comp, 25);
    }

    #[test]
    fn reset_restores_registers_only() {
        let mut s = DeviceSession::default();
        s.host_mode_active = true;
        s.emulation_enabled = true;
        s.current_wpm = 35;
        s.mode_register.keyer_mode = KeyerMode::Bug;
        s.pin_config.hangtime = Hangtime::W1D8;

        s.reset_to_defaults(&KeyerDefaults::default());

        assert!(s.host_mode_active);
        assert!(s.emulation_enabled);
        assert_eq!(s.current_wpm, 20);
        assert_eq!(s.mode_register, ModeRegister::default());
        assert_eq!(s.pin_config, PinConfig::default());
    }

    #[test]
    fn custom_defaults() {
        let defaults = KeyerDefaults {
            key_comp_ms: 50,
            ..Default::default()
        };
        let s = DeviceSession::new(&defaults);
        assert_eq!(s.current_key_comp, 50);
    }

    #[test]
    fn snapshot_reflects_admin_state() {
        let mut s = DeviceSession::default();
        s.admin = AdminState::AwaitingAdminOpenReply;
        let snap = s.snapshot();
        assert!(snap.awaiting_revision);
        assert!(!snap.host_mode_active);
        assert_eq!(snap.wpm, 20);
    }
}
