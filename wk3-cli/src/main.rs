// wk3-cli -- command-line tool for exercising a WK3 keyer over its serial
// host interface, or against a mock transport.
//
// Usage:
//   wk3-cli --port /dev/ttyUSB0 host open
//   wk3-cli --port /dev/ttyUSB0 set wpm 25
//   wk3-cli --port /dev/ttyUSB0 toggle sidetone
//   wk3-cli --port /dev/ttyUSB0 admin vcc
//   wk3-cli --port /dev/ttyUSB0 text "cq test"
//   wk3-cli --port /dev/ttyUSB0 monitor --duration 30
//   wk3-cli --mock test
//   wk3-cli decode mode 0x50

use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

use wk3_test_harness::{MockHandle, MockTransport};
use wk3lib::{
    AdminCommand, Command as KeyerCommand, Hangtime, Keyer, KeyerBuilder, KeyerEvent, KeyerMode,
    ModeRegister, PinConfig, Sequence, UltimaticPriority,
};

/// Revision code the mock transport answers Admin:Open with.
const MOCK_REVISION: u8 = 0x37;

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// wk3-cli -- drives a WK3 keyer from the command line.
#[derive(Parser)]
#[command(name = "wk3-cli", version, about)]
struct Cli {
    /// Serial port path (e.g. /dev/ttyUSB0, COM3).
    /// Required unless --mock is used.
    #[arg(long)]
    port: Option<String>,

    /// Baud rate: 1200 or 9600.
    #[arg(long, default_value_t = 1200)]
    baud: u32,

    /// Highest speed accepted by `set wpm`.
    #[arg(long, default_value_t = 99)]
    max_wpm: u8,

    /// Key compensation written when host mode opens, in ms.
    #[arg(long, default_value_t = 25)]
    key_comp: u8,

    /// How long to keep printing keyer traffic after a command, in ms.
    #[arg(long, default_value_t = 500)]
    settle_ms: u64,

    /// Use a mock transport instead of a real serial port.
    /// The mock answers host-mode and admin requests with canned replies.
    #[arg(long)]
    mock: bool,

    #[command(subcommand)]
    command: Command,
}

/// Parse a hex string like "0x50" or "50" into a u8.
fn parse_hex_u8(s: &str) -> std::result::Result<u8, String> {
    let s = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    u8::from_str_radix(s, 16).map_err(|e| format!("invalid hex byte: {e}"))
}

#[derive(Subcommand)]
enum Command {
    /// Print keyer events in real time.
    Monitor {
        /// Duration in seconds (0 = run until Ctrl-C).
        #[arg(long, default_value_t = 0)]
        duration: u64,

        /// Open host mode first so status and echo bytes flow.
        #[arg(long)]
        host: bool,
    },

    /// Enter or leave host mode.
    Host {
        #[command(subcommand)]
        action: HostAction,
    },

    /// Set a register field, speed, or key compensation (opens host mode).
    Set {
        #[command(subcommand)]
        setting: SetAction,
    },

    /// Flip a register flag (opens host mode).
    Toggle {
        #[arg(value_enum)]
        setting: ToggleSetting,
    },

    /// Send an admin command.
    Admin {
        #[arg(value_enum)]
        command: AdminArg,
    },

    /// Send a raw hex command, e.g. "0E 50".
    Hex { input: String },

    /// Send text to be keyed as Morse.
    Text { text: String },

    /// Run the basic WK3 test sequence (reset, open, echo test, 'A').
    Test,

    /// Decode a register byte without touching the keyer.
    Decode {
        #[arg(value_enum)]
        register: RegisterArg,

        /// Register value in hex (e.g. 0x50).
        #[arg(value_parser = parse_hex_u8)]
        value: u8,
    },
}

#[derive(Subcommand)]
enum HostAction {
    /// Send Admin:Open and wait for the revision code.
    Open,
    /// Send Admin:Close.
    Close,
}

#[derive(Subcommand)]
enum SetAction {
    /// Paddle keying mode.
    KeyerMode {
        #[arg(value_enum)]
        mode: KeyerModeArg,
    },
    /// Speed in WPM.
    Wpm { wpm: u8 },
    /// Key compensation in milliseconds (0-50).
    KeyComp { ms: u8 },
    /// PTT hang time.
    Hangtime {
        #[arg(value_enum)]
        value: HangtimeArg,
    },
    /// Ultimatic paddle priority.
    UltimaticPriority {
        #[arg(value_enum)]
        value: PriorityArg,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum KeyerModeArg {
    IambicB,
    IambicA,
    Ultimatic,
    Bug,
}

impl From<KeyerModeArg> for KeyerMode {
    fn from(arg: KeyerModeArg) -> Self {
        match arg {
            KeyerModeArg::IambicB => KeyerMode::IambicB,
            KeyerModeArg::IambicA => KeyerMode::IambicA,
            KeyerModeArg::Ultimatic => KeyerMode::Ultimatic,
            KeyerModeArg::Bug => KeyerMode::Bug,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum HangtimeArg {
    W1d1,
    W1d2,
    W1d4,
    W1d8,
}

impl From<HangtimeArg> for Hangtime {
    fn from(arg: HangtimeArg) -> Self {
        match arg {
            HangtimeArg::W1d1 => Hangtime::W1D1,
            HangtimeArg::W1d2 => Hangtime::W1D2,
            HangtimeArg::W1d4 => Hangtime::W1D4,
            HangtimeArg::W1d8 => Hangtime::W1D8,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum PriorityArg {
    Normal,
    Dah,
    Dit,
}

impl From<PriorityArg> for UltimaticPriority {
    fn from(arg: PriorityArg) -> Self {
        match arg {
            PriorityArg::Normal => UltimaticPriority::Normal,
            PriorityArg::Dah => UltimaticPriority::DahPriority,
            PriorityArg::Dit => UltimaticPriority::DitPriority,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ToggleSetting {
    PaddleSwap,
    Sidetone,
    Keyout1,
    Keyout2,
    Ptt,
    PaddleWatchdog,
    PaddleEcho,
    SerialEcho,
    Autospace,
    ContestSpacing,
}

impl From<ToggleSetting> for KeyerCommand {
    fn from(setting: ToggleSetting) -> Self {
        match setting {
            ToggleSetting::PaddleSwap => KeyerCommand::TogglePaddleSwap,
            ToggleSetting::Sidetone => KeyerCommand::ToggleSidetone,
            ToggleSetting::Keyout1 => KeyerCommand::ToggleKeyOut1,
            ToggleSetting::Keyout2 => KeyerCommand::ToggleKeyOut2,
            ToggleSetting::Ptt => KeyerCommand::TogglePtt,
            ToggleSetting::PaddleWatchdog => KeyerCommand::TogglePaddleWatchdog,
            ToggleSetting::PaddleEcho => KeyerCommand::TogglePaddleEcho,
            ToggleSetting::SerialEcho => KeyerCommand::ToggleSerialEcho,
            ToggleSetting::Autospace => KeyerCommand::ToggleAutospace,
            ToggleSetting::ContestSpacing => KeyerCommand::ToggleContestSpacing,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum AdminArg {
    Reset,
    EchoTest,
    Status,
    Vcc,
    X2mode,
    IcType,
}

impl From<AdminArg> for AdminCommand {
    fn from(arg: AdminArg) -> Self {
        match arg {
            AdminArg::Reset => AdminCommand::Reset,
            AdminArg::EchoTest => AdminCommand::EchoTest,
            AdminArg::Status => AdminCommand::RequestStatus,
            AdminArg::Vcc => AdminCommand::ReadVcc,
            AdminArg::X2mode => AdminCommand::LoadX2Mode,
            AdminArg::IcType => AdminCommand::GetIcType,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum RegisterArg {
    Mode,
    PinConfig,
}

// ---------------------------------------------------------------------------
// Connection
// ---------------------------------------------------------------------------

/// A connected keyer plus, in mock mode, the handle used to play the
/// keyer's side of the conversation.
struct Session {
    keyer: Keyer,
    events: broadcast::Receiver<KeyerEvent>,
    mock: Option<MockHandle>,
}

async fn connect(cli: &Cli) -> Result<Session> {
    let builder = KeyerBuilder::new()
        .baud_rate(cli.baud)
        .max_wpm(cli.max_wpm)
        .default_key_comp(cli.key_comp);
    tracing::debug!(mock = cli.mock, baud = cli.baud, "connecting");

    let (keyer, mock) = if cli.mock {
        let transport = MockTransport::new();
        let handle = transport.handle();
        let keyer = builder
            .build_with_transport(Box::new(transport))
            .await
            .context("failed to build keyer with mock transport")?;
        println!("Connected (mock transport)");
        (keyer, Some(handle))
    } else {
        let port = cli
            .port
            .as_deref()
            .context("--port is required when not using --mock")?;
        let keyer = builder
            .serial_port(port)
            .build()
            .await
            .with_context(|| format!("failed to open keyer on {port}"))?;
        println!("Connected to {port} at {} baud", cli.baud);
        (keyer, None)
    };

    let events = keyer.subscribe();
    Ok(Session {
        keyer,
        events,
        mock,
    })
}

/// Open host mode and wait until the keyer has answered.
async fn open_host_mode(session: &mut Session) -> Result<()> {
    session.keyer.enter_host_mode().await?;
    if let Some(mock) = &session.mock {
        mock.push_inbound(&[MOCK_REVISION]);
    }

    let deadline = Duration::from_secs(3);
    let opened = tokio::time::timeout(deadline, async {
        loop {
            match session.events.recv().await {
                Ok(KeyerEvent::HostModeChanged { active: true }) => return true,
                Ok(event) => print_event(&event),
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => return false,
            }
        }
    })
    .await
    .unwrap_or(false);

    if !opened {
        bail!("keyer did not answer Admin:Open within {}s", deadline.as_secs());
    }
    // Requests queue behind the default-register writes.
    session.keyer.snapshot().await?;
    Ok(())
}

/// Canned replies the mock keyer gives to admin commands.
fn mock_reply(command: AdminCommand) -> Option<&'static [u8]> {
    match command {
        AdminCommand::ReadVcc => Some(&[0x64][..]),
        AdminCommand::LoadX2Mode => Some(&[0x00][..]),
        AdminCommand::GetIcType => Some(&[0x01][..]),
        AdminCommand::RequestStatus => Some(&[0xC0][..]),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

fn print_event(event: &KeyerEvent) {
    match event {
        KeyerEvent::Log { category, message } => println!("[{category}] {message}"),
        KeyerEvent::DisplayChar(_) => {}
        other => println!("[event] {other:?}"),
    }
}

/// Print keyer traffic until `window` passes with nothing new.
async fn drain_events(events: &mut broadcast::Receiver<KeyerEvent>, window: Duration) {
    loop {
        match tokio::time::timeout(window, events.recv()).await {
            Ok(Ok(event)) => print_event(&event),
            Ok(Err(RecvError::Lagged(n))) => {
                println!("[warning] missed {n} events (consumer too slow)");
            }
            Ok(Err(RecvError::Closed)) | Err(_) => break,
        }
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

async fn cmd_monitor(session: &mut Session, duration_secs: u64, host: bool) -> Result<()> {
    if host {
        open_host_mode(session).await?;
    }

    println!("Monitoring keyer events (Ctrl-C to stop)...");

    let deadline = (duration_secs > 0).then(|| Instant::now() + Duration::from_secs(duration_secs));
    let mut line = String::new();

    loop {
        let timeout = match deadline {
            Some(dl) => {
                let remaining = dl.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    println!("Monitor duration elapsed.");
                    break;
                }
                remaining
            }
            None => Duration::from_secs(3600),
        };

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                println!("Interrupted.");
                break;
            }
            received = tokio::time::timeout(timeout, session.events.recv()) => match received {
                Ok(Ok(KeyerEvent::DisplayChar('\n'))) => {
                    println!("[monitor] {line}");
                    line.clear();
                }
                Ok(Ok(KeyerEvent::DisplayChar(c))) => line.push(c),
                Ok(Ok(KeyerEvent::Disconnected)) => {
                    println!("Keyer disconnected.");
                    break;
                }
                Ok(Ok(event)) => print_event(&event),
                Ok(Err(RecvError::Lagged(n))) => {
                    println!("[warning] missed {n} events (consumer too slow)");
                }
                Ok(Err(RecvError::Closed)) => {
                    println!("Event channel closed.");
                    break;
                }
                Err(_) => {
                    if deadline.is_some() {
                        println!("Monitor duration elapsed.");
                    }
                    break;
                }
            }
        }
    }

    if !line.is_empty() {
        println!("[monitor] {line}");
    }
    Ok(())
}

async fn cmd_host(session: &mut Session, action: &HostAction) -> Result<()> {
    match action {
        HostAction::Open => {
            open_host_mode(session).await?;
            let snapshot = session.keyer.snapshot().await?;
            println!(
                "Host mode open: mode {} pin config {} {} WPM",
                snapshot.mode_register, snapshot.pin_config, snapshot.wpm
            );
        }
        HostAction::Close => {
            session.keyer.exit_host_mode().await?;
            println!("Host mode closed");
        }
    }
    Ok(())
}

async fn cmd_apply(session: &mut Session, command: KeyerCommand) -> Result<()> {
    open_host_mode(session).await?;
    session
        .keyer
        .apply(command)
        .await
        .with_context(|| format!("{command:?} failed"))?;

    let snapshot = session.keyer.snapshot().await?;
    println!(
        "Mode register: {}  Pin config: {}  Speed: {} WPM  Key comp: {} ms",
        snapshot.mode_register, snapshot.pin_config, snapshot.wpm, snapshot.key_comp_ms
    );
    Ok(())
}

fn set_command(action: &SetAction) -> KeyerCommand {
    match action {
        SetAction::KeyerMode { mode } => KeyerCommand::SetKeyerMode((*mode).into()),
        SetAction::Wpm { wpm } => KeyerCommand::SetWpm(*wpm),
        SetAction::KeyComp { ms } => KeyerCommand::SetKeyComp(*ms),
        SetAction::Hangtime { value } => KeyerCommand::SetHangtime((*value).into()),
        SetAction::UltimaticPriority { value } => {
            KeyerCommand::SetUltimaticPriority((*value).into())
        }
    }
}

async fn cmd_admin(session: &mut Session, command: AdminCommand) -> Result<()> {
    session.keyer.admin(command).await?;
    if let (Some(mock), Some(reply)) = (&session.mock, mock_reply(command)) {
        mock.push_inbound(reply);
    }
    Ok(())
}

async fn cmd_test(session: &mut Session) -> Result<()> {
    let sequence = Sequence::basic_test();
    println!(
        "Running {} ({} steps, {} ms)",
        sequence.name(),
        sequence.steps().len(),
        sequence.duration().as_millis()
    );
    let events = &mut session.events;
    let keyer = &session.keyer;

    // Print traffic while the sequence runs.
    let run = keyer.run_sequence(&sequence);
    tokio::pin!(run);
    loop {
        tokio::select! {
            result = &mut run => {
                result?;
                break;
            }
            Ok(event) = events.recv() => print_event(&event),
        }
    }
    if let Some(mock) = &session.mock {
        // Echo test: the keyer returns the byte sent after 00 04.
        mock.push_inbound(b"A");
    }
    Ok(())
}

fn cmd_decode(register: RegisterArg, value: u8) {
    match register {
        RegisterArg::Mode => {
            let mode = ModeRegister::from_byte(value);
            println!("Mode register {mode}");
            println!("  Paddle watchdog:  {}", on_off(!mode.paddle_watchdog_disabled));
            println!("  Paddle echo:      {}", on_off(mode.paddle_echo_enabled));
            println!("  Keyer mode:       {}", mode.keyer_mode);
            println!("  Paddle swap:      {}", on_off(mode.paddle_swapped));
            println!("  Serial echo:      {}", on_off(mode.serial_echo_enabled));
            println!("  Autospace:        {}", on_off(mode.autospace_enabled));
            println!("  Contest spacing:  {}", on_off(mode.contest_spacing_enabled));
        }
        RegisterArg::PinConfig => {
            let pin = PinConfig::from_byte(value);
            println!("Pin config {pin}");
            println!("  Ultimatic priority: {}", pin.ultimatic_priority);
            println!("  Hangtime:           {}", pin.hangtime);
            println!("  KeyOut1:            {}", on_off(pin.keyout1_enabled));
            println!("  KeyOut2:            {}", on_off(pin.keyout2_enabled));
            println!("  Sidetone:           {}", on_off(pin.sidetone_enabled));
            println!("  PTT:                {}", on_off(pin.ptt_enabled));
        }
    }
}

fn on_off(b: bool) -> &'static str {
    if b { "on" } else { "off" }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    // Decoding needs no keyer.
    if let Command::Decode { register, value } = &cli.command {
        cmd_decode(*register, *value);
        return Ok(());
    }
    run(&cli).await
}

async fn run(cli: &Cli) -> Result<()> {
    let mut session = connect(cli).await?;
    let settle = Duration::from_millis(cli.settle_ms);

    let result = match &cli.command {
        Command::Monitor { duration, host } => cmd_monitor(&mut session, *duration, *host).await,
        Command::Host { action } => cmd_host(&mut session, action).await,
        Command::Set { setting } => cmd_apply(&mut session, set_command(setting)).await,
        Command::Toggle { setting } => cmd_apply(&mut session, (*setting).into()).await,
        Command::Admin { command } => cmd_admin(&mut session, (*command).into()).await,
        Command::Hex { input } => session.keyer.send_hex(input).await.map_err(Into::into),
        Command::Text { text } => session.keyer.send_text(text).await.map_err(Into::into),
        Command::Test => cmd_test(&mut session).await,
        Command::Decode { register, value } => {
            cmd_decode(*register, *value);
            Ok(())
        }
    };

    drain_events(&mut session.events, settle).await;
    session.keyer.disconnect().await.ok();
    result
}
