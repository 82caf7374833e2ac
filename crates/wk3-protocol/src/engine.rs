//! The WK3 protocol state machine.
//!
//! [`ProtocolEngine`] is synchronous: each operation takes the
//! [`DeviceSession`] by `&mut`, updates it, emits [`KeyerEvent`]s, and
//! returns the frames that must be written to the keyer, in order. The IO
//! task owns both the engine and the session and performs the writes, so
//! every test here runs without a transport.
//!
//! # Host mode
//!
//! ```text
//! Connected --enter_host_mode--> Connected + AwaitingAdminOpenReply
//!     --echo byte (revision code)--> HostMode  (defaults resent)
//! HostMode --exit_host_mode or echo 0x03--> Connected
//! ```
//!
//! Register-changing commands are only accepted in host mode.

use tokio::sync::broadcast;
use tracing::{debug, trace, warn};

use wk3_core::{
    EngineState, Error, Hangtime, KeyerEvent, KeyerMode, LogCategory, ModeRegister, PinConfig,
    Result, StatusByte, UltimaticPriority,
};

use crate::classify::{InboundByte, classify};
use crate::commands::{
    self, AdminCommand, CMD_ADMIN, MAX_KEY_COMP_MS, MIN_WPM, format_hex, printable_text,
};
use crate::session::{AdminState, DeviceSession, KeyerDefaults};
use crate::tracker::TrackedResponse;

/// Frames queued for the transport, in write order.
pub type Outbound = Vec<Vec<u8>>;

/// Echo byte acknowledging a mode register write.
const ACK_MODE_SET: u8 = 0x0E;
/// Echo byte acknowledging a pin config write.
const ACK_PIN_CONFIG_SET: u8 = 0x09;
/// Echo byte acknowledging a status request.
const ACK_STATUS_REQUEST: u8 = 0x15;
/// Echo byte reporting that host mode was closed.
const ACK_HOST_CLOSED: u8 = 0x03;

/// A register-changing command. Only accepted in host mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    SetKeyerMode(KeyerMode),
    SetUltimaticPriority(UltimaticPriority),
    SetHangtime(Hangtime),
    TogglePaddleSwap,
    ToggleSidetone,
    ToggleKeyOut1,
    ToggleKeyOut2,
    TogglePtt,
    TogglePaddleWatchdog,
    TogglePaddleEcho,
    ToggleSerialEcho,
    ToggleAutospace,
    ToggleContestSpacing,
    /// Speed in WPM.
    SetWpm(u8),
    /// Key compensation in milliseconds.
    SetKeyComp(u8),
}

/// Receives characters decoded from paddle echo while keyboard emulation
/// is enabled.
///
/// Implementations must not block; they run on the IO task.
pub trait KeystrokeSink: Send + Sync + 'static {
    fn key(&self, c: char);
}

/// Keystroke sink that discards everything.
pub struct NullKeystrokeSink;

impl KeystrokeSink for NullKeystrokeSink {
    fn key(&self, _c: char) {}
}

/// Character to show in the ASCII monitor for an echo byte.
fn display_char(byte: u8) -> Option<char> {
    match byte {
        0x20..=0x7E => Some(char::from(byte)),
        b'\r' | b'\n' => Some('\n'),
        _ => None,
    }
}

fn on_off(b: bool) -> &'static str {
    if b { "ON" } else { "OFF" }
}

/// Synchronous WK3 protocol state machine.
pub struct ProtocolEngine {
    event_tx: broadcast::Sender<KeyerEvent>,
    defaults: KeyerDefaults,
    max_wpm: u8,
    keystroke_sink: Box<dyn KeystrokeSink>,
}

impl ProtocolEngine {
    pub fn new(
        event_tx: broadcast::Sender<KeyerEvent>,
        defaults: KeyerDefaults,
        max_wpm: u8,
        keystroke_sink: Box<dyn KeystrokeSink>,
    ) -> Self {
        Self {
            event_tx,
            defaults,
            max_wpm,
            keystroke_sink,
        }
    }

    pub fn defaults(&self) -> &KeyerDefaults {
        &self.defaults
    }

    pub fn max_wpm(&self) -> u8 {
        self.max_wpm
    }

    /// Coarse state of a live session.
    pub fn state(&self, session: &DeviceSession) -> EngineState {
        if session.host_mode_active {
            EngineState::HostMode
        } else {
            EngineState::Connected
        }
    }

    // -----------------------------------------------------------------
    // Event helpers
    // -----------------------------------------------------------------

    fn emit(&self, event: KeyerEvent) {
        let _ = self.event_tx.send(event);
    }

    fn log(&self, category: LogCategory, message: impl Into<String>) {
        self.emit(KeyerEvent::log(category, message));
    }

    /// Surface an error on the event stream and hand it back.
    pub fn report(&self, err: Error) -> Error {
        warn!(error = %err, "keyer operation rejected");
        self.log(LogCategory::Error, err.to_string());
        err
    }

    /// Record and log a frame about to be written.
    fn queue(&self, session: &mut DeviceSession, out: &mut Outbound, frame: Vec<u8>) {
        session.tracker.record_sent(&frame);
        if let [CMD_ADMIN, code, ..] = frame[..] {
            if code == AdminCommand::RequestStatus.code() {
                session.expecting_status_byte = true;
            }
        }

        trace!(data = ?frame, "queueing frame");
        self.log(LogCategory::Sent, format!("Sent: {}", format_hex(&frame)));
        if let Some(text) = printable_text(&frame) {
            self.log(LogCategory::Sent, format!("Text: \"{text}\""));
        }
        out.push(frame);
    }

    // -----------------------------------------------------------------
    // Host mode
    // -----------------------------------------------------------------

    /// Send Admin:Open and wait for the revision code.
    pub fn enter_host_mode(&self, session: &mut DeviceSession) -> Outbound {
        let mut out = Vec::new();
        self.queue(session, &mut out, commands::cmd_admin(AdminCommand::Open));
        session.admin = AdminState::AwaitingAdminOpenReply;
        debug!("admin open sent, awaiting revision code");
        self.log(LogCategory::Sent, "Sent host mode entry command (Admin:Open)");
        out
    }

    /// Send Admin:Close. Host mode is considered closed immediately.
    pub fn exit_host_mode(&self, session: &mut DeviceSession) -> Outbound {
        let mut out = Vec::new();
        self.queue(session, &mut out, commands::cmd_admin(AdminCommand::Close));
        session.admin = AdminState::Idle;
        self.log(LogCategory::Disconnected, "Exited host mode");
        self.set_host_mode(session, false);
        out
    }

    fn set_host_mode(&self, session: &mut DeviceSession, active: bool) {
        if session.host_mode_active != active {
            session.host_mode_active = active;
            debug!(active, "host mode changed");
            self.emit(KeyerEvent::HostModeChanged { active });
        }
    }

    /// Send an admin sub-command. Open and Close go through the host-mode
    /// transitions.
    pub fn admin(&self, session: &mut DeviceSession, command: AdminCommand) -> Outbound {
        match command {
            AdminCommand::Open => self.enter_host_mode(session),
            AdminCommand::Close => self.exit_host_mode(session),
            other => {
                let mut out = Vec::new();
                self.queue(session, &mut out, commands::cmd_admin(other));
                self.log(LogCategory::Sent, format!("{other} command sent"));
                out
            }
        }
    }

    // -----------------------------------------------------------------
    // Free-form sends
    // -----------------------------------------------------------------

    /// Send bytes exactly as given.
    ///
    /// Raw frames are tracked like any other, but do not drive the host-mode
    /// handshake even when they happen to be Admin:Open.
    pub fn send_raw(&self, session: &mut DeviceSession, frame: Vec<u8>) -> Result<Outbound> {
        if frame.is_empty() {
            return Err(self.report(Error::InvalidParameter("nothing to send".into())));
        }
        let mut out = Vec::new();
        self.queue(session, &mut out, frame);
        Ok(out)
    }

    /// Parse and send a user-entered hex string.
    pub fn send_hex(&self, session: &mut DeviceSession, input: &str) -> Result<Outbound> {
        let frame = commands::parse_hex_command(input).map_err(|e| self.report(e))?;
        self.send_raw(session, frame)
    }

    /// Queue text for the keyer to send as Morse.
    pub fn send_text(&self, session: &mut DeviceSession, text: &str) -> Result<Outbound> {
        let frame = commands::encode_text(text).map_err(|e| self.report(e))?;
        self.send_raw(session, frame)
    }

    /// Route decoded characters to the keystroke sink.
    pub fn set_emulation(&self, session: &mut DeviceSession, enabled: bool) {
        session.emulation_enabled = enabled;
        let message = if enabled {
            "Keyboard emulation enabled"
        } else {
            "Keyboard emulation disabled"
        };
        self.log(LogCategory::Info, message);
    }

    // -----------------------------------------------------------------
    // Register commands
    // -----------------------------------------------------------------

    /// Apply a register-changing command.
    ///
    /// Outside host mode this fails with [`Error::HostModeRequired`], and
    /// out-of-range speed or key compensation fails with
    /// [`Error::InvalidParameter`]; in both cases the session is unchanged
    /// and nothing is queued.
    pub fn apply_command(&self, session: &mut DeviceSession, command: Command) -> Result<Outbound> {
        if !session.host_mode_active {
            return Err(self.report(Error::HostModeRequired));
        }

        let mut out = Vec::new();
        match command {
            Command::SetKeyerMode(mode) => {
                self.change_mode(session, &mut out, |m| m.keyer_mode = mode);
                self.log(LogCategory::Sent, format!("Set keyer mode to {mode}"));
            }
            Command::TogglePaddleSwap => {
                self.change_mode(session, &mut out, |m| m.paddle_swapped = !m.paddle_swapped);
                let on = session.mode_register.paddle_swapped;
                self.log(LogCategory::Sent, format!("Paddle swap: {}", on_off(on)));
            }
            Command::TogglePaddleWatchdog => {
                self.change_mode(session, &mut out, |m| {
                    m.paddle_watchdog_disabled = !m.paddle_watchdog_disabled
                });
                let on = !session.mode_register.paddle_watchdog_disabled;
                self.log(LogCategory::Sent, format!("Paddle watchdog: {}", on_off(on)));
            }
            Command::TogglePaddleEcho => {
                self.change_mode(session, &mut out, |m| {
                    m.paddle_echo_enabled = !m.paddle_echo_enabled
                });
                let on = session.mode_register.paddle_echo_enabled;
                self.log(LogCategory::Sent, format!("Paddle echo: {}", on_off(on)));
            }
            Command::ToggleSerialEcho => {
                self.change_mode(session, &mut out, |m| {
                    m.serial_echo_enabled = !m.serial_echo_enabled
                });
                let on = session.mode_register.serial_echo_enabled;
                self.log(LogCategory::Sent, format!("Serial echo: {}", on_off(on)));
            }
            Command::ToggleAutospace => {
                self.change_mode(session, &mut out, |m| m.autospace_enabled = !m.autospace_enabled);
                let on = session.mode_register.autospace_enabled;
                self.log(LogCategory::Sent, format!("Autospace: {}", on_off(on)));
            }
            Command::ToggleContestSpacing => {
                self.change_mode(session, &mut out, |m| {
                    m.contest_spacing_enabled = !m.contest_spacing_enabled
                });
                let on = session.mode_register.contest_spacing_enabled;
                self.log(LogCategory::Sent, format!("Contest spacing: {}", on_off(on)));
            }
            Command::SetUltimaticPriority(priority) => {
                self.change_pin_config(session, &mut out, |p| p.ultimatic_priority = priority);
                self.log(LogCategory::Sent, format!("Set ultimatic priority to {priority}"));
            }
            Command::SetHangtime(hangtime) => {
                self.change_pin_config(session, &mut out, |p| p.hangtime = hangtime);
                self.log(LogCategory::Sent, format!("Set hangtime to {hangtime}"));
            }
            Command::ToggleSidetone => {
                self.change_pin_config(session, &mut out, |p| {
                    p.sidetone_enabled = !p.sidetone_enabled
                });
                let on = session.pin_config.sidetone_enabled;
                self.log(LogCategory::Sent, format!("Sidetone: {}", on_off(on)));
            }
            Command::ToggleKeyOut1 => {
                self.change_pin_config(session, &mut out, |p| {
                    p.keyout1_enabled = !p.keyout1_enabled
                });
                let on = session.pin_config.keyout1_enabled;
                self.log(LogCategory::Sent, format!("KeyOut1: {}", on_off(on)));
            }
            Command::ToggleKeyOut2 => {
                self.change_pin_config(session, &mut out, |p| {
                    p.keyout2_enabled = !p.keyout2_enabled
                });
                let on = session.pin_config.keyout2_enabled;
                self.log(LogCategory::Sent, format!("KeyOut2: {}", on_off(on)));
            }
            Command::TogglePtt => {
                self.change_pin_config(session, &mut out, |p| p.ptt_enabled = !p.ptt_enabled);
                let on = session.pin_config.ptt_enabled;
                self.log(LogCategory::Sent, format!("PTT: {}", on_off(on)));
            }
            Command::SetWpm(wpm) => {
                if !(MIN_WPM..=self.max_wpm).contains(&wpm) {
                    return Err(self.report(Error::InvalidParameter(format!(
                        "speed {wpm} WPM out of range {MIN_WPM}-{}",
                        self.max_wpm
                    ))));
                }
                session.current_wpm = wpm;
                self.queue(session, &mut out, commands::cmd_set_speed(wpm));
                self.log(
                    LogCategory::Sent,
                    format!("Set speed to {wpm} WPM (0x{wpm:02X})"),
                );
            }
            Command::SetKeyComp(ms) => {
                if ms > MAX_KEY_COMP_MS {
                    return Err(self.report(Error::InvalidParameter(format!(
                        "key compensation {ms} ms out of range 0-{MAX_KEY_COMP_MS}"
                    ))));
                }
                session.current_key_comp = ms;
                self.queue(session, &mut out, commands::cmd_set_key_comp(ms));
                self.log(
                    LogCategory::Sent,
                    format!("Set key compensation to {ms} ms (0x{ms:02X})"),
                );
            }
        }
        Ok(out)
    }

    fn change_mode(
        &self,
        session: &mut DeviceSession,
        out: &mut Outbound,
        update: impl FnOnce(&mut ModeRegister),
    ) {
        update(&mut session.mode_register);
        let frame = commands::cmd_set_mode_register(&session.mode_register);
        self.queue(session, out, frame);
        self.registers_changed(session);
    }

    fn change_pin_config(
        &self,
        session: &mut DeviceSession,
        out: &mut Outbound,
        update: impl FnOnce(&mut PinConfig),
    ) {
        update(&mut session.pin_config);
        let frame = commands::cmd_set_pin_config(&session.pin_config);
        self.queue(session, out, frame);
        self.registers_changed(session);
    }

    fn registers_changed(&self, session: &DeviceSession) {
        self.emit(KeyerEvent::RegistersChanged {
            mode: session.mode_register,
            pin_config: session.pin_config,
        });
    }

    // -----------------------------------------------------------------
    // Inbound
    // -----------------------------------------------------------------

    /// Process bytes received from the keyer, in arrival order.
    ///
    /// Returns frames that the received bytes require to be written (the
    /// default register resync after Admin:Open is answered).
    pub fn process_received_data(&self, session: &mut DeviceSession, data: &[u8]) -> Outbound {
        let mut out = Vec::new();
        for &byte in data {
            match classify(byte) {
                InboundByte::Status(status) => self.handle_status(session, status),
                InboundByte::SpeedPot(value) => {
                    trace!(value, "speed pot moved");
                    self.emit(KeyerEvent::SpeedPotChanged { value });
                }
                InboundByte::Echo(echo) => self.handle_echo(session, echo, &mut out),
            }
        }
        out
    }

    fn handle_status(&self, session: &mut DeviceSession, status: StatusByte) {
        let raw = status.raw();
        self.log(
            LogCategory::Received,
            format!("Status Byte: 0x{raw:02X} (0b{raw:08b})"),
        );

        if status.is_ready_marker() {
            self.log(LogCategory::Received, "Status 0xC8 received - WK3 is ready");
        } else {
            self.log(LogCategory::Received, status.to_string());
            if status.break_in() {
                self.log(LogCategory::Received, "Paddle input detected");
            }
        }

        let solicited = std::mem::take(&mut session.expecting_status_byte);
        if solicited {
            self.log(
                LogCategory::Received,
                "Received status byte in response to status request",
            );
        }
        self.emit(KeyerEvent::StatusReceived { status, solicited });
    }

    fn handle_echo(&self, session: &mut DeviceSession, echo: u8, out: &mut Outbound) {
        self.log(LogCategory::Received, format!("Echo Back: 0x{echo:02X}"));

        if let Some(c) = display_char(echo) {
            if echo != b'\r' && echo != b'\n' {
                self.log(LogCategory::Received, format!("ASCII: '{c}'"));
            }
            self.emit(KeyerEvent::DisplayChar(c));
            if session.emulation_enabled && !c.is_whitespace() {
                self.keystroke_sink.key(c);
            }
        }

        if let Some(response) = session.tracker.interpret(echo) {
            self.report_tracked(response);
            return;
        }

        if session.admin == AdminState::AwaitingAdminOpenReply {
            self.complete_admin_open(session, echo, out);
            return;
        }

        match echo {
            ACK_MODE_SET => self.log(LogCategory::Received, "Mode register set acknowledged"),
            ACK_PIN_CONFIG_SET => self.log(LogCategory::Received, "Pin config set acknowledged"),
            ACK_STATUS_REQUEST => {
                self.log(LogCategory::Received, "Status request acknowledged");
                session.expecting_status_byte = true;
            }
            ACK_HOST_CLOSED => {
                self.log(LogCategory::Disconnected, "Host mode exited successfully");
                self.set_host_mode(session, false);
            }
            _ => {}
        }
    }

    fn report_tracked(&self, response: TrackedResponse) {
        match response {
            TrackedResponse::Vcc { raw, volts } => {
                match volts {
                    Some(v) => self.log(
                        LogCategory::Received,
                        format!("VCC Voltage: {v:.2}V (response to Read Back Vcc)"),
                    ),
                    None => {
                        warn!(raw, "Vcc reading cannot be converted");
                        self.log(
                            LogCategory::Received,
                            format!("VCC reading 0x{raw:02X} cannot be converted to volts"),
                        );
                    }
                }
                self.emit(KeyerEvent::VccReading { raw, volts });
            }
            TrackedResponse::X2Mode(value) => {
                self.log(
                    LogCategory::Received,
                    format!("X2MODE register value: 0x{value:02X} (response to Load X2MODE)"),
                );
                self.emit(KeyerEvent::X2ModeReading { value });
            }
            TrackedResponse::IcType(ic_type) => {
                self.log(
                    LogCategory::Received,
                    format!("IC Type: {ic_type} (response to Get IC Type)"),
                );
                self.emit(KeyerEvent::IcTypeReported { ic_type });
            }
        }
    }

    /// The revision code arrived: enter host mode and push the defaults so
    /// the register caches match the device.
    fn complete_admin_open(&self, session: &mut DeviceSession, code: u8, out: &mut Outbound) {
        session.admin = AdminState::Idle;
        self.log(
            LogCategory::Received,
            format!("Received revision code: 0x{code:02X} ({code})"),
        );
        self.emit(KeyerEvent::RevisionCode { code });
        self.set_host_mode(session, true);

        session.reset_to_defaults(&self.defaults);

        let mode = commands::cmd_set_mode_register(&session.mode_register);
        self.queue(session, out, mode);
        self.log(
            LogCategory::Sent,
            format!(
                "Sent default mode register: 0x{:02X} ({})",
                session.mode_register.to_byte(),
                session.mode_register.keyer_mode
            ),
        );

        let pin = commands::cmd_set_pin_config(&session.pin_config);
        self.queue(session, out, pin);
        self.log(
            LogCategory::Sent,
            format!("Sent default pin config: 0x{:02X}", session.pin_config.to_byte()),
        );

        let wpm = session.current_wpm;
        self.queue(session, out, commands::cmd_set_speed(wpm));
        self.log(
            LogCategory::Sent,
            format!("Sent default speed: {wpm} WPM (0x{wpm:02X})"),
        );

        let ms = session.current_key_comp;
        self.queue(session, out, commands::cmd_set_key_comp(ms));
        self.log(
            LogCategory::Sent,
            format!("Sent default key compensation: {ms} ms (0x{ms:02X})"),
        );

        self.registers_changed(session);
        self.log(
            LogCategory::Connected,
            "Host mode activated with default settings",
        );
    }
}
