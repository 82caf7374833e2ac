//! IO task for a WK3 keyer connection.
//!
//! One tokio task owns the transport, the [`DeviceSession`], and the
//! [`ProtocolEngine`]. Requests from the [`Keyer`](crate::keyer::Keyer)
//! handle and bytes arriving from the keyer are processed strictly one at a
//! time, and every frame a step produces is written before the next step
//! starts. Register updates therefore never interleave on the wire.
//!
//! A transport failure while reading or writing ends the task: the
//! transport is closed, the session dropped, and
//! [`KeyerEvent::Disconnected`] emitted. Nothing is retried.

use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace};

use wk3_core::error::{Error, Result};
use wk3_core::events::{KeyerEvent, LogCategory};
use wk3_core::transport::Transport;
use wk3_core::types::EngineState;

use crate::commands::AdminCommand;
use crate::engine::{Command, Outbound, ProtocolEngine};
use crate::session::{DeviceSession, SessionSnapshot};

/// Pause after a read that returned nothing, so an idle port does not spin.
const IDLE_BACKOFF: Duration = Duration::from_millis(10);

/// Depth of the request channel.
const REQUEST_QUEUE: usize = 32;

/// Size of the read buffer. The keyer sends single bytes; a burst of paddle
/// echo rarely exceeds a few dozen.
const READ_BUF: usize = 256;

/// Configuration for the IO task.
#[derive(Debug, Clone)]
pub struct IoConfig {
    /// Upper bound on a single transport read before the loop checks for
    /// requests again.
    pub poll_interval: Duration,
    /// Human-readable connection description for log lines, e.g.
    /// `"/dev/ttyUSB0 at 1200 baud"`.
    pub description: String,
}

impl Default for IoConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(50),
            description: "keyer".into(),
        }
    }
}

/// A request sent from the [`Keyer`](crate::keyer::Keyer) handle to the IO
/// task.
pub enum Request {
    EnterHostMode {
        reply: oneshot::Sender<Result<()>>,
    },
    ExitHostMode {
        reply: oneshot::Sender<Result<()>>,
    },
    /// A register-changing command.
    Command {
        command: Command,
        reply: oneshot::Sender<Result<()>>,
    },
    Admin {
        command: AdminCommand,
        reply: oneshot::Sender<Result<()>>,
    },
    /// Bytes written exactly as given.
    SendRaw {
        frame: Vec<u8>,
        reply: oneshot::Sender<Result<()>>,
    },
    /// User-entered hex, validated inside the task.
    SendHex {
        input: String,
        reply: oneshot::Sender<Result<()>>,
    },
    /// Text to be sent as Morse.
    SendText {
        text: String,
        reply: oneshot::Sender<Result<()>>,
    },
    SetEmulation {
        enabled: bool,
        reply: oneshot::Sender<()>,
    },
    Snapshot {
        reply: oneshot::Sender<SessionSnapshot>,
    },
    State {
        reply: oneshot::Sender<EngineState>,
    },
    /// Close the transport and end the task.
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Handle to the IO task.
pub struct KeyerIo {
    pub tx: mpsc::Sender<Request>,
    pub cancel: CancellationToken,
    pub task: JoinHandle<()>,
}

impl KeyerIo {
    /// Send a request and wait for its reply.
    ///
    /// `make` builds the request around the reply sender. A closed channel
    /// (task gone) maps to [`Error::NotConnected`]; no reply within
    /// `timeout` maps to [`Error::Timeout`].
    pub async fn call<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Request,
        timeout: Duration,
    ) -> Result<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(make(reply_tx))
            .await
            .map_err(|_| Error::NotConnected)?;

        match tokio::time::timeout(timeout, reply_rx).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(_)) => Err(Error::NotConnected),
            Err(_) => Err(Error::Timeout),
        }
    }

    /// Close the transport and wait for the task to finish.
    pub async fn shutdown(self) -> Result<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let _ = self.tx.send(Request::Shutdown { reply: reply_tx }).await;
        let result = reply_rx.await.map_err(|_| Error::NotConnected);
        let _ = self.task.await;
        result
    }
}

// ---------------------------------------------------------------------------
// Spawn
// ---------------------------------------------------------------------------

/// Spawn the IO task for a freshly opened transport.
pub fn spawn_io_task(
    transport: Box<dyn Transport>,
    engine: ProtocolEngine,
    event_tx: broadcast::Sender<KeyerEvent>,
    config: IoConfig,
) -> KeyerIo {
    let (tx, rx) = mpsc::channel::<Request>(REQUEST_QUEUE);
    let cancel = CancellationToken::new();
    let session = DeviceSession::new(engine.defaults());

    let task = tokio::spawn(io_loop(
        transport,
        engine,
        session,
        event_tx,
        config,
        rx,
        cancel.clone(),
    ));

    KeyerIo { tx, cancel, task }
}

// ---------------------------------------------------------------------------
// IO loop
// ---------------------------------------------------------------------------

/// The main IO loop.
///
/// Uses `tokio::select! { biased; }` to prioritize:
/// 1. Cancellation
/// 2. Requests from the handle
/// 3. Reading inbound bytes
async fn io_loop(
    mut transport: Box<dyn Transport>,
    engine: ProtocolEngine,
    mut session: DeviceSession,
    event_tx: broadcast::Sender<KeyerEvent>,
    config: IoConfig,
    mut rx: mpsc::Receiver<Request>,
    cancel: CancellationToken,
) {
    let _ = event_tx.send(KeyerEvent::log(
        LogCategory::Connected,
        format!("Connected to {}", config.description),
    ));
    let _ = event_tx.send(KeyerEvent::Connected);

    let mut buf = [0u8; READ_BUF];
    let mut shutdown_reply = None;

    loop {
        let step = tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                debug!("keyer IO task cancelled");
                break;
            }

            req = rx.recv() => {
                match req {
                    Some(Request::Shutdown { reply }) => {
                        debug!("keyer IO task shutdown requested");
                        shutdown_reply = Some(reply);
                        break;
                    }
                    Some(req) => handle_request(req, &mut *transport, &engine, &mut session).await,
                    None => {
                        debug!("request channel closed, exiting keyer IO task");
                        break;
                    }
                }
            }

            res = transport.receive(&mut buf, config.poll_interval) => {
                match res {
                    Ok(0) => Ok(()),
                    Ok(n) => {
                        trace!(bytes = n, data = ?&buf[..n], "inbound");
                        let out = engine.process_received_data(&mut session, &buf[..n]);
                        write_frames(&mut *transport, &out).await
                    }
                    Err(Error::Timeout) => {
                        tokio::time::sleep(IDLE_BACKOFF).await;
                        Ok(())
                    }
                    Err(e) => Err(e),
                }
            }
        };

        if let Err(e) = step {
            if e.is_transport_failure() {
                error!(error = %e, "keyer transport failed, disconnecting");
                engine.report(e);
                break;
            }
            engine.report(e);
        }
    }

    if let Err(e) = transport.close().await {
        debug!(error = %e, "error closing keyer transport");
    }
    drop(session);

    let _ = event_tx.send(KeyerEvent::log(
        LogCategory::Disconnected,
        "Disconnected from device",
    ));
    let _ = event_tx.send(KeyerEvent::Disconnected);

    if let Some(reply) = shutdown_reply {
        let _ = reply.send(());
    }
}

/// Write each frame with a single `send` call, in order.
async fn write_frames(transport: &mut dyn Transport, frames: &Outbound) -> Result<()> {
    for frame in frames {
        trace!(data = ?frame, "outbound");
        transport.send(frame).await?;
    }
    Ok(())
}

/// The error handed to the caller when its write failed. The original error
/// goes to the loop, which tears the connection down.
fn caller_error(e: &Error) -> Error {
    match e {
        Error::NotConnected => Error::NotConnected,
        Error::Timeout => Error::Timeout,
        Error::ConnectionLost | Error::Io(_) => Error::ConnectionLost,
        other => Error::Transport(other.to_string()),
    }
}

/// Write the frames an operation produced and answer the caller.
///
/// Returns `Err` when a write fails; the loop decides whether the link is
/// gone.
async fn write_and_reply(
    transport: &mut dyn Transport,
    frames: Result<Outbound>,
    reply: oneshot::Sender<Result<()>>,
) -> Result<()> {
    let frames = match frames {
        Ok(frames) => frames,
        Err(e) => {
            let _ = reply.send(Err(e));
            return Ok(());
        }
    };

    match write_frames(transport, &frames).await {
        Ok(()) => {
            let _ = reply.send(Ok(()));
            Ok(())
        }
        Err(e) => {
            let _ = reply.send(Err(caller_error(&e)));
            Err(e)
        }
    }
}

async fn handle_request(
    req: Request,
    transport: &mut dyn Transport,
    engine: &ProtocolEngine,
    session: &mut DeviceSession,
) -> Result<()> {
    match req {
        Request::EnterHostMode { reply } => {
            let frames = engine.enter_host_mode(session);
            write_and_reply(transport, Ok(frames), reply).await
        }
        Request::ExitHostMode { reply } => {
            let frames = engine.exit_host_mode(session);
            write_and_reply(transport, Ok(frames), reply).await
        }
        Request::Command { command, reply } => {
            let frames = engine.apply_command(session, command);
            write_and_reply(transport, frames, reply).await
        }
        Request::Admin { command, reply } => {
            let frames = engine.admin(session, command);
            write_and_reply(transport, Ok(frames), reply).await
        }
        Request::SendRaw { frame, reply } => {
            let frames = engine.send_raw(session, frame);
            write_and_reply(transport, frames, reply).await
        }
        Request::SendHex { input, reply } => {
            let frames = engine.send_hex(session, &input);
            write_and_reply(transport, frames, reply).await
        }
        Request::SendText { text, reply } => {
            let frames = engine.send_text(session, &text);
            write_and_reply(transport, frames, reply).await
        }
        Request::SetEmulation { enabled, reply } => {
            engine.set_emulation(session, enabled);
            let _ = reply.send(());
            Ok(())
        }
        Request::Snapshot { reply } => {
            let _ = reply.send(session.snapshot());
            Ok(())
        }
        Request::State { reply } => {
            let _ = reply.send(engine.state(session));
            Ok(())
        }
        Request::Shutdown { .. } => unreachable!("Shutdown handled in io_loop"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::NullKeystrokeSink;
    use crate::session::KeyerDefaults;
    use wk3_test_harness::{MockHandle, MockTransport};

    const TIMEOUT: Duration = Duration::from_secs(1);

    fn spawn_mock() -> (KeyerIo, MockHandle, broadcast::Receiver<KeyerEvent>) {
        let mock = MockTransport::new();
        let handle = mock.handle();
        let (event_tx, event_rx) = broadcast::channel(256);
        let engine = ProtocolEngine::new(
            event_tx.clone(),
            KeyerDefaults::default(),
            99,
            Box::new(NullKeystrokeSink),
        );
        let io = spawn_io_task(Box::new(mock), engine, event_tx, IoConfig::default());
        (io, handle, event_rx)
    }

    async fn wait_for(
        rx: &mut broadcast::Receiver<KeyerEvent>,
        pred: impl Fn(&KeyerEvent) -> bool,
    ) -> KeyerEvent {
        tokio::time::timeout(TIMEOUT, async {
            loop {
                match rx.recv().await {
                    Ok(e) if pred(&e) => return e,
                    Ok(_) => continue,
                    Err(e) => panic!("event channel error: {e}"),
                }
            }
        })
        .await
        .expect("timed out waiting for event")
    }

    #[tokio::test]
    async fn keyer_io_call_not_connected() {
        let (tx, rx) = mpsc::channel(4);
        drop(rx);
        let io = KeyerIo {
            tx,
            cancel: CancellationToken::new(),
            task: tokio::spawn(async {}),
        };

        let result = io
            .call(|reply| Request::State { reply }, Duration::from_millis(100))
            .await;
        assert!(matches!(result, Err(Error::NotConnected)));
    }

    #[tokio::test]
    async fn io_task_emits_connected() {
        let (io, _handle, mut rx) = spawn_mock();
        wait_for(&mut rx, |e| *e == KeyerEvent::Connected).await;
        io.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn io_task_host_mode_handshake() {
        let (io, handle, mut rx) = spawn_mock();

        io.call(|reply| Request::EnterHostMode { reply }, TIMEOUT)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(handle.sent_data(), vec![vec![0x00, 0x02]]);

        handle.push_inbound(&[0x37]);
        wait_for(&mut rx, |e| *e == KeyerEvent::HostModeChanged { active: true }).await;

        let snapshot = io
            .call(|reply| Request::Snapshot { reply }, TIMEOUT)
            .await
            .unwrap();
        assert!(snapshot.host_mode_active);
        assert_eq!(
            handle.sent_data(),
            vec![
                vec![0x00, 0x02],
                vec![0x0E, 0x50],
                vec![0x09, 0x06],
                vec![0x02, 0x14],
                vec![0x11, 0x19],
            ]
        );

        io.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn io_task_command_requires_host_mode() {
        let (io, handle, _rx) = spawn_mock();

        let result = io
            .call(
                |reply| Request::Command {
                    command: Command::ToggleKeyOut1,
                    reply,
                },
                TIMEOUT,
            )
            .await
            .unwrap();

        assert!(matches!(result, Err(Error::HostModeRequired)));
        assert!(handle.sent_data().is_empty());

        let state = io.call(|reply| Request::State { reply }, TIMEOUT).await.unwrap();
        assert_eq!(state, EngineState::Connected);

        io.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn io_task_rejects_bad_hex_without_writing() {
        let (io, handle, _rx) = spawn_mock();

        let result = io
            .call(
                |reply| Request::SendHex {
                    input: "4g".into(),
                    reply,
                },
                TIMEOUT,
            )
            .await
            .unwrap();

        assert!(matches!(result, Err(Error::InvalidParameter(_))));
        assert!(handle.sent_data().is_empty());
        io.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn io_task_send_failure_disconnects() {
        let (io, handle, mut rx) = spawn_mock();
        handle.fail_sends(true);

        let result = io
            .call(
                |reply| Request::SendText {
                    text: "test".into(),
                    reply,
                },
                TIMEOUT,
            )
            .await
            .unwrap();
        assert!(matches!(result, Err(Error::ConnectionLost)));

        wait_for(&mut rx, |e| *e == KeyerEvent::Disconnected).await;
        assert!(!handle.is_connected());

        let after = io.call(|reply| Request::State { reply }, TIMEOUT).await;
        assert!(matches!(after, Err(Error::NotConnected)));
    }

    #[tokio::test]
    async fn io_task_rejected_write_keeps_session() {
        let mock = MockTransport::strict();
        let handle = mock.handle();
        let (event_tx, mut rx) = broadcast::channel(256);
        let engine = ProtocolEngine::new(
            event_tx.clone(),
            KeyerDefaults::default(),
            99,
            Box::new(NullKeystrokeSink),
        );
        let io = spawn_io_task(Box::new(mock), engine, event_tx, IoConfig::default());

        let result = io
            .call(|reply| Request::SendRaw { frame: vec![0x41], reply }, TIMEOUT)
            .await
            .unwrap();
        assert!(matches!(result, Err(Error::Transport(_))));
        wait_for(&mut rx, |e| {
            matches!(e, KeyerEvent::Log { category: LogCategory::Error, .. })
        })
        .await;

        let state = io.call(|reply| Request::State { reply }, TIMEOUT).await.unwrap();
        assert_eq!(state, EngineState::Connected);
        assert!(handle.is_connected());
        io.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn io_task_read_failure_disconnects() {
        let (io, handle, mut rx) = spawn_mock();
        wait_for(&mut rx, |e| *e == KeyerEvent::Connected).await;

        handle.set_connected(false);

        wait_for(&mut rx, |e| *e == KeyerEvent::Disconnected).await;
        let _ = io.task.await;
    }

    #[tokio::test]
    async fn io_task_shutdown_closes_transport() {
        let (io, handle, mut rx) = spawn_mock();

        io.shutdown().await.unwrap();

        assert!(!handle.is_connected());
        wait_for(&mut rx, |e| *e == KeyerEvent::Disconnected).await;
    }

    #[tokio::test]
    async fn io_task_cancel_ends_loop() {
        let (io, handle, mut rx) = spawn_mock();

        io.cancel.cancel();
        let _ = io.task.await;

        assert!(!handle.is_connected());
        wait_for(&mut rx, |e| *e == KeyerEvent::Disconnected).await;
    }

    #[tokio::test]
    async fn io_task_unsolicited_bytes_become_events() {
        let (io, handle, mut rx) = spawn_mock();

        handle.push_inbound(&[0x8A, 0xC4]);

        let pot = wait_for(&mut rx, |e| matches!(e, KeyerEvent::SpeedPotChanged { .. })).await;
        assert_eq!(pot, KeyerEvent::SpeedPotChanged { value: 10 });
        let status = wait_for(&mut rx, |e| matches!(e, KeyerEvent::StatusReceived { .. })).await;
        assert!(matches!(
            status,
            KeyerEvent::StatusReceived { solicited: false, .. }
        ));

        io.shutdown().await.unwrap();
    }
}
