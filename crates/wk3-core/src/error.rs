//! Error types for wk3lib.
//!
//! All fallible operations across the workspace return [`Result<T>`], which
//! uses [`Error`] as the error type. Transport failures, local input
//! validation, and host-mode precondition failures are all captured here.

/// The error type for all WK3 keyer operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A transport-level error (serial port open or write failure).
    #[error("transport error: {0}")]
    Transport(String),

    /// A protocol-level error (unexpected bytes from the keyer or a mock).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Timed out waiting for the IO task or the keyer.
    #[error("timeout waiting for response")]
    Timeout,

    /// Input rejected before anything was sent: malformed hex, empty
    /// command, out-of-range speed, unsupported baud rate.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// A register or speed command was issued while the keyer is not in
    /// host mode. Nothing was sent.
    #[error("keyer must be in host mode to change settings")]
    HostModeRequired,

    /// No connection to the keyer has been established, or it was closed.
    #[error("not connected")]
    NotConnected,

    /// The connection to the keyer was lost unexpectedly.
    #[error("connection lost")]
    ConnectionLost,

    /// An underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Returns `true` for failures of the underlying link, which tear the
    /// session down rather than leaving it in an ambiguous state.
    pub fn is_transport_failure(&self) -> bool {
        matches!(
            self,
            Error::Transport(_) | Error::ConnectionLost | Error::NotConnected | Error::Io(_)
        )
    }
}

/// A convenience `Result` alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_transport() {
        let e = Error::Transport("port busy".into());
        assert_eq!(e.to_string(), "transport error: port busy");
    }

    #[test]
    fn error_display_invalid_parameter() {
        let e = Error::InvalidParameter("hex string must have even length".into());
        assert_eq!(
            e.to_string(),
            "invalid parameter: hex string must have even length"
        );
    }

    #[test]
    fn error_display_host_mode_required() {
        assert_eq!(
            Error::HostModeRequired.to_string(),
            "keyer must be in host mode to change settings"
        );
    }

    #[test]
    fn error_display_not_connected() {
        assert_eq!(Error::NotConnected.to_string(), "not connected");
    }

    #[test]
    fn error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe broken");
        let e: Error = io_err.into();
        assert!(matches!(e, Error::Io(_)));
        assert!(e.to_string().contains("pipe broken"));
    }

    #[test]
    fn transport_failures_are_classified() {
        assert!(Error::ConnectionLost.is_transport_failure());
        assert!(Error::Transport("x".into()).is_transport_failure());
        assert!(!Error::HostModeRequired.is_transport_failure());
        assert!(!Error::InvalidParameter("x".into()).is_transport_failure());
        assert!(!Error::Timeout.is_transport_failure());
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}
        assert_send::<Error>();
        assert_sync::<Error>();
    }
}
