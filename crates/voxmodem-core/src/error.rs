//! Error types for voxmodem.
//!
//! All fallible operations across the library return [`Result<T>`], which
//! uses [`Error`] as the error type. A modem answering with the wrong line
//! is *not* an error: the command channel reports that as `Ok(false)`.
//! The variants here cover transport failures, initialization failures,
//! caller mistakes, and failures of the external audio collaborators.

/// The error type for all voxmodem operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A transport-level error (serial port could not be opened, write failed).
    #[error("transport error: {0}")]
    Transport(String),

    /// A protocol-level error (line buffer overflow, unexpected framing).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Timed out waiting for data from the modem.
    ///
    /// The command channel absorbs this into a failed match; it only
    /// surfaces from raw [`Transport::receive`](crate::Transport::receive).
    #[error("timeout waiting for response")]
    Timeout,

    /// The modem could not be brought into a known state at construction.
    ///
    /// No handle is returned when this occurs.
    #[error("could not initialize modem: {0}")]
    Initialization(String),

    /// An invalid parameter was passed (bad dial string, unknown DTMF symbol).
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// A text command was issued while the modem is streaming voice data.
    #[error("command {command:?} not allowed in {mode} mode")]
    InvalidMode {
        /// The rejected command.
        command: String,
        /// The mode the modem was in.
        mode: crate::types::ModemMode,
    },

    /// The operation does not apply to the current call state.
    #[error("cannot {operation} while {state}")]
    InvalidState {
        /// What was attempted.
        operation: &'static str,
        /// The call state at the time.
        state: crate::types::CallState,
    },

    /// An external audio collaborator (WAV codec, transcoder, synthesizer) failed.
    #[error("codec error: {0}")]
    Codec(String),

    /// No connection to the modem has been established.
    #[error("not connected")]
    NotConnected,

    /// The connection to the modem was lost unexpectedly.
    #[error("connection lost")]
    ConnectionLost,

    /// An underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A convenience `Result` alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ModemMode;

    #[test]
    fn error_display_initialization() {
        let e = Error::Initialization("could not enable caller ID".into());
        assert_eq!(
            e.to_string(),
            "could not initialize modem: could not enable caller ID"
        );
    }

    #[test]
    fn error_display_invalid_mode() {
        let e = Error::InvalidMode {
            command: "AT+VTS=1".into(),
            mode: ModemMode::VoiceTransmit,
        };
        assert_eq!(
            e.to_string(),
            "command \"AT+VTS=1\" not allowed in voice-transmit mode"
        );
    }

    #[test]
    fn error_display_invalid_state() {
        let e = Error::InvalidState {
            operation: "dial",
            state: crate::types::CallState::InCall,
        };
        assert_eq!(e.to_string(), "cannot dial while in-call");
    }

    #[test]
    fn error_display_timeout() {
        assert_eq!(Error::Timeout.to_string(), "timeout waiting for response");
    }

    #[test]
    fn error_display_codec() {
        let e = Error::Codec("ffmpeg exited with status 1".into());
        assert_eq!(e.to_string(), "codec error: ffmpeg exited with status 1");
    }

    #[test]
    fn error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe broken");
        let e: Error = io_err.into();
        assert!(matches!(e, Error::Io(_)));
        assert!(e.to_string().contains("pipe broken"));
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}
        assert_send::<Error>();
        assert_sync::<Error>();
    }
}
