//! Async handle to a connected WK3 keyer.

use std::time::Duration;

use tokio::sync::{broadcast, oneshot};
use tracing::debug;

use wk3_core::error::{Error, Result};
use wk3_core::events::{KeyerEvent, LogCategory};
use wk3_core::types::EngineState;

use crate::commands::AdminCommand;
use crate::engine::Command;
use crate::io::{KeyerIo, Request};
use crate::sequence::Sequence;
use crate::session::SessionSnapshot;

/// A connected keyer.
///
/// Every operation is forwarded to the IO task and completes once the
/// resulting frames have been written. Dropping the handle closes the
/// connection; [`disconnect`](Self::disconnect) does the same and waits for
/// it.
pub struct Keyer {
    io: KeyerIo,
    event_tx: broadcast::Sender<KeyerEvent>,
    request_timeout: Duration,
}

impl Keyer {
    pub(crate) fn new(
        io: KeyerIo,
        event_tx: broadcast::Sender<KeyerEvent>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            io,
            event_tx,
            request_timeout,
        }
    }

    /// Subscribe to keyer events.
    pub fn subscribe(&self) -> broadcast::Receiver<KeyerEvent> {
        self.event_tx.subscribe()
    }

    async fn call<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Request) -> Result<T> {
        self.io.call(make, self.request_timeout).await
    }

    /// Send Admin:Open. Host mode becomes active when the keyer answers
    /// with its revision code ([`KeyerEvent::HostModeChanged`]).
    pub async fn enter_host_mode(&self) -> Result<()> {
        self.call(|reply| Request::EnterHostMode { reply }).await?
    }

    /// Send Admin:Close. Host mode is treated as closed immediately.
    pub async fn exit_host_mode(&self) -> Result<()> {
        self.call(|reply| Request::ExitHostMode { reply }).await?
    }

    /// Apply a register-changing command. Requires host mode.
    pub async fn apply(&self, command: Command) -> Result<()> {
        self.call(|reply| Request::Command { command, reply }).await?
    }

    /// Send an admin sub-command.
    pub async fn admin(&self, command: AdminCommand) -> Result<()> {
        self.call(|reply| Request::Admin { command, reply }).await?
    }

    /// Send a user-entered hex command such as `"0E 50"`.
    pub async fn send_hex(&self, input: &str) -> Result<()> {
        let input = input.to_string();
        self.call(|reply| Request::SendHex { input, reply }).await?
    }

    /// Send text to be keyed as Morse.
    pub async fn send_text(&self, text: &str) -> Result<()> {
        let text = text.to_string();
        self.call(|reply| Request::SendText { text, reply }).await?
    }

    /// Send bytes exactly as given.
    pub async fn send_raw(&self, frame: Vec<u8>) -> Result<()> {
        self.call(|reply| Request::SendRaw { frame, reply }).await?
    }

    /// Forward paddle-echo characters to the keystroke sink.
    pub async fn set_emulation(&self, enabled: bool) -> Result<()> {
        self.call(|reply| Request::SetEmulation { enabled, reply }).await
    }

    /// Current session state.
    pub async fn snapshot(&self) -> Result<SessionSnapshot> {
        self.call(|reply| Request::Snapshot { reply }).await
    }

    /// Connection state. A finished IO task reads as
    /// [`EngineState::Disconnected`]; a live task that does not answer in
    /// time is an [`Error::Timeout`].
    pub async fn state(&self) -> Result<EngineState> {
        match self.call(|reply| Request::State { reply }).await {
            Err(Error::NotConnected) => Ok(EngineState::Disconnected),
            other => other,
        }
    }

    /// Run a timed sequence, writing each step as a raw send.
    ///
    /// Stops at the first failed step.
    pub async fn run_sequence(&self, sequence: &Sequence) -> Result<()> {
        debug!(name = sequence.name(), steps = sequence.steps().len(), "running sequence");
        let _ = self.event_tx.send(KeyerEvent::log(
            LogCategory::Sent,
            format!("Starting {}", sequence.name()),
        ));

        let start = tokio::time::Instant::now();
        for step in sequence.steps() {
            tokio::time::sleep_until(start + step.at).await;
            self.send_raw(step.frame.clone()).await?;
            let _ = self
                .event_tx
                .send(KeyerEvent::log(LogCategory::Sent, step.label.clone()));
        }
        Ok(())
    }

    /// Close the transport and wait for the IO task to finish.
    pub async fn disconnect(self) -> Result<()> {
        debug!("disconnecting keyer");
        match self.io.shutdown().await {
            Ok(()) | Err(Error::NotConnected) => Ok(()),
            Err(e) => Err(e),
        }
    }
}
