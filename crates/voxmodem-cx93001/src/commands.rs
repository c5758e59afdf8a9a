//! CX93001 AT command builders.
//!
//! This module provides the command strings and ordered step lists the
//! [`Modem`](crate::modem::Modem) issues for each operation. All functions
//! are pure; nothing here touches the transport.
//!
//! # Command reference
//!
//! | Command             | Effect                                        |
//! |---------------------|-----------------------------------------------|
//! | `ATE1`              | echo commands back                            |
//! | `AT&F0`             | restore factory defaults                      |
//! | `ATV1`              | verbose (text) result codes                   |
//! | `AT+VCID=1`         | formatted caller ID (`NMBR = ...`)            |
//! | `AT+FCLASS=8`       | voice class                                   |
//! | `AT+VSM=1,8000,0,0` | 8-bit unsigned PCM, 8000 Hz                   |
//! | `AT+VLS=1`          | route voice to the telephone line             |
//! | `AT+VSD=128,50`     | silence detection: sensitivity 128, 5 seconds |
//! | `AT+VTX` / `AT+VRX` | start voice transmit / receive                |
//! | `AT+VTS=1,2,3`      | play DTMF tones                               |

use voxmodem_at::CommandStep;
use voxmodem_core::{DtmfSequence, Error, Result};

/// Enable command echo.
pub const CMD_ECHO_ON: &str = "ATE1";
/// Attention; checks the modem answers at all.
pub const CMD_ATTENTION: &str = "AT";
/// Reset to factory defaults.
pub const CMD_FACTORY_RESET: &str = "AT&F0";
/// Verbose result codes.
pub const CMD_VERBOSE: &str = "ATV1";
/// Enable formatted caller ID reporting.
pub const CMD_CALLER_ID: &str = "AT+VCID=1";
/// Product information.
pub const CMD_INFO_1: &str = "ATI1";
/// ROM checksum.
pub const CMD_INFO_2: &str = "ATI2";
/// Select voice class.
pub const CMD_VOICE_CLASS: &str = "AT+FCLASS=8";
/// Voice sampling: 8-bit PCM mono at 8000 Hz.
pub const CMD_SAMPLING: &str = "AT+VSM=1,8000,0,0";
/// Select the telephone line as voice I/O device.
pub const CMD_LINE_SELECT: &str = "AT+VLS=1";
/// Silence detection: sensitivity 128, 50 tenths of a second.
pub const CMD_SILENCE_DETECTION: &str = "AT+VSD=128,50";
/// Answer.
pub const CMD_ANSWER: &str = "ATA";
/// Hang up.
pub const CMD_HANG_UP: &str = "ATH";
/// Enter voice transmit mode.
pub const CMD_VOICE_TX: &str = "AT+VTX";
/// Enter voice receive mode.
pub const CMD_VOICE_RX: &str = "AT+VRX";

/// Result line `AT+VRX` answers with once streaming starts.
pub const RESULT_CONNECT: &str = voxmodem_at::protocol::CONNECT;

/// Startup commands, each paired with the message reported if it fails.
pub const INIT_SEQUENCE: [(&str, &str); 6] = [
    (CMD_ECHO_ON, "could not enable command echoing"),
    (CMD_ATTENTION, "could not execute AT commands"),
    (CMD_FACTORY_RESET, "could not reset to default state"),
    (CMD_VERBOSE, "could not enable verbose reporting"),
    (CMD_ECHO_ON, "could not enable command echoing"),
    (CMD_CALLER_ID, "could not enable caller ID"),
];

/// Commands checked by a self test, in order.
pub const SELF_TEST_SEQUENCE: [&str; 7] = [
    CMD_ATTENTION,
    CMD_FACTORY_RESET,
    CMD_VERBOSE,
    CMD_ECHO_ON,
    CMD_CALLER_ID,
    CMD_INFO_1,
    CMD_INFO_2,
];

/// Symbols a dial string may contain besides digits.
const DIAL_MODIFIERS: &[char] = &['*', '#', '+', ',', 'A', 'B', 'C', 'D', 'P', 'T', 'W'];

/// Voice class, sampling mode and line select.
pub fn voice_setup_steps() -> Vec<CommandStep> {
    vec![
        CommandStep::ok(CMD_VOICE_CLASS),
        CommandStep::ok(CMD_SAMPLING),
        CommandStep::ok(CMD_LINE_SELECT),
    ]
}

/// Steps for answering an incoming call.
pub fn accept_steps() -> Vec<CommandStep> {
    let mut steps = voice_setup_steps();
    steps.push(CommandStep::ok(CMD_ANSWER));
    steps
}

/// Steps for placing a call to `number`.
pub fn dial_steps(number: &str) -> Result<Vec<CommandStep>> {
    let dial = cmd_dial(number)?;
    let mut steps = voice_setup_steps();
    steps.push(CommandStep::ok(CMD_SILENCE_DETECTION));
    steps.push(CommandStep::ok(dial));
    Ok(steps)
}

/// Steps that put an established call into voice receive.
pub fn record_setup_steps() -> Vec<CommandStep> {
    let mut steps = voice_setup_steps();
    steps.push(CommandStep::ok(CMD_SILENCE_DETECTION));
    steps.push(CommandStep::expecting(CMD_VOICE_RX, RESULT_CONNECT));
    steps
}

/// Steps for hanging up. `AT+FCLASS=8` also ends any voice streaming.
pub fn hang_up_steps() -> Vec<CommandStep> {
    vec![CommandStep::ok(CMD_VOICE_CLASS), CommandStep::ok(CMD_HANG_UP)]
}

/// Build the dial command (`ATD<number>`).
///
/// The number may contain digits, `* # +`, the tone letters `A`-`D` and the
/// dial modifiers `, P T W`. Anything else would be sent to the modem as
/// part of the command and is rejected.
pub fn cmd_dial(number: &str) -> Result<String> {
    if number.is_empty() {
        return Err(Error::InvalidParameter("dial number is empty".into()));
    }
    if let Some(c) = number
        .chars()
        .find(|c| !c.is_ascii_digit() && !DIAL_MODIFIERS.contains(&c.to_ascii_uppercase()))
    {
        return Err(Error::InvalidParameter(format!(
            "dial number {number:?} contains invalid character {c:?}"
        )));
    }
    Ok(format!("ATD{number}"))
}

/// Build the DTMF command (`AT+VTS=1,2,#`).
pub fn cmd_tones(sequence: &DtmfSequence) -> String {
    format!("AT+VTS={}", sequence.comma_joined())
}
