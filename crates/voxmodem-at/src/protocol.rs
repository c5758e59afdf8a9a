//! Hayes AT command framing.
//!
//! Commands go out as ASCII terminated by a single CR. With echo enabled
//! (`ATE1`) and verbose results (`ATV1`) the modem answers with two lines:
//!
//! ```text
//! <command> CR CR LF      echo
//! <result>  CR LF         e.g. OK, CONNECT, ERROR
//! ```
//!
//! Bare `OK` lines and empty lines left over from earlier exchanges may
//! precede the echo; they are stray acknowledgements and are skipped.
//!
//! # Mode-setting commands
//!
//! `AT+FCLASS`, `AT+VLS`, `AT+VTX` and `AT+VRX` are the only commands that
//! move the link between command mode and a voice streaming mode.
//! [`mode_transition`] classifies them.

use bytes::{BufMut, BytesMut};
use voxmodem_core::error::{Error, Result};
use voxmodem_core::types::ModemMode;

/// Carriage return, terminating every outbound command.
pub const CR: u8 = b'\r';

/// Line feed, terminating every inbound line.
pub const LF: u8 = b'\n';

/// Default result expected from a command.
pub const OK: &str = "OK";

/// Result reported by `AT+VRX`/`AT+VTX` on modems that confirm the switch.
pub const CONNECT: &str = "CONNECT";

/// Encode a command into raw bytes ready for transmission (`<cmd> CR`).
///
/// # Example
///
/// ```
/// use voxmodem_at::protocol::encode_command;
///
/// assert_eq!(encode_command("ATA"), b"ATA\r");
/// ```
pub fn encode_command(command: &str) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(command.len() + 1);
    buf.put_slice(command.as_bytes());
    buf.put_u8(CR);
    buf.to_vec()
}

/// The exact echo line the modem sends back for `command` (`<cmd> CR CR LF`).
pub fn echo_line(command: &str) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(command.len() + 3);
    buf.put_slice(command.as_bytes());
    buf.put_slice(b"\r\r\n");
    buf.to_vec()
}

/// The exact result line for `expected` (`<expected> CR LF`).
pub fn result_line(expected: &str) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(expected.len() + 2);
    buf.put_slice(expected.as_bytes());
    buf.put_slice(b"\r\n");
    buf.to_vec()
}

/// Whether `line` is a stray acknowledgement that may precede an echo:
/// exactly `CR LF` or exactly `OK CR LF`.
pub fn is_stray_line(line: &[u8]) -> bool {
    line == b"\r\n" || line == b"OK\r\n"
}

/// Line contents with trailing CR/LF bytes removed, lossily decoded.
pub fn line_text(line: &[u8]) -> String {
    let end = line
        .iter()
        .rposition(|&b| b != CR && b != LF)
        .map_or(0, |p| p + 1);
    String::from_utf8_lossy(&line[..end]).into_owned()
}

/// Reject commands that would corrupt the line framing.
///
/// A command must be non-empty printable ASCII; an embedded CR or LF
/// would be taken by the modem as the end of the command.
pub fn validate_command(command: &str) -> Result<()> {
    if command.is_empty() {
        return Err(Error::InvalidParameter("empty AT command".into()));
    }
    if let Some(c) = command.chars().find(|c| !c.is_ascii() || c.is_ascii_control()) {
        return Err(Error::InvalidParameter(format!(
            "AT command {command:?} contains invalid character {c:?}"
        )));
    }
    Ok(())
}

/// How a command moves the link between command and voice modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeTransition {
    /// Ordinary command; only valid in command mode.
    None,
    /// `AT+FCLASS` / `AT+VLS`: back to command mode once written.
    ToCommand,
    /// `AT+VTX` / `AT+VRX`: into the given voice mode once confirmed.
    ToVoice(ModemMode),
}

/// Classify `command` by its effect on the link mode.
///
/// # Example
///
/// ```
/// use voxmodem_at::protocol::{mode_transition, ModeTransition};
/// use voxmodem_core::ModemMode;
///
/// assert_eq!(mode_transition("AT+VRX"), ModeTransition::ToVoice(ModemMode::VoiceReceive));
/// assert_eq!(mode_transition("AT+FCLASS=8"), ModeTransition::ToCommand);
/// assert_eq!(mode_transition("ATA"), ModeTransition::None);
/// ```
pub fn mode_transition(command: &str) -> ModeTransition {
    if command == "AT+VTX" {
        ModeTransition::ToVoice(ModemMode::VoiceTransmit)
    } else if command == "AT+VRX" {
        ModeTransition::ToVoice(ModemMode::VoiceReceive)
    } else if command.starts_with("AT+FCLASS") || command.starts_with("AT+VLS") {
        ModeTransition::ToCommand
    } else {
        ModeTransition::None
    }
}
