//! The AT command channel.
//!
//! [`CommandChannel`] issues one command at a time and validates the
//! modem's echo and result line against an expected response. It also
//! tracks the link mode: while the modem streams voice data only
//! mode-setting commands may be written, since anything else would be
//! played to the line or lost in the sample stream.
//!
//! A mismatch is not an error. [`CommandChannel::send`] returns
//! `Ok(false)` for a wrong echo, a wrong result line, or a read timeout;
//! `Err` is reserved for transport failures and mode violations.
//!
//! Multi-step flows run through [`CommandChannel::run_sequence`], which
//! always attempts every step and reports which ones failed.

use tracing::{debug, warn};

use voxmodem_core::error::{Error, Result};
use voxmodem_core::types::ModemMode;

use crate::io::ModemIo;
use crate::protocol::{self, ModeTransition};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Outcome of a single AT command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    /// The command as issued, without its CR.
    pub command: String,
    /// Whether the echo and the expected result line both matched.
    pub success: bool,
    /// Every line consumed for this command, in order, terminators included.
    pub lines: Vec<Vec<u8>>,
}

/// One step of a multi-command sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandStep {
    /// Command text, without CR.
    pub command: String,
    /// Result line that counts as success.
    pub expected: String,
}

impl CommandStep {
    /// A step expecting `OK`.
    pub fn ok(command: impl Into<String>) -> Self {
        Self::expecting(command, protocol::OK)
    }

    /// A step expecting `expected`.
    pub fn expecting(command: impl Into<String>, expected: impl Into<String>) -> Self {
        CommandStep {
            command: command.into(),
            expected: expected.into(),
        }
    }
}

/// Why a sequence step did not succeed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepFailure {
    /// The echo or the result line did not match (or timed out).
    Mismatch,
    /// The step was not written because the link was in a voice mode.
    RejectedInMode(ModemMode),
}

/// A failed step of a sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedStep {
    /// Position of the step in the sequence.
    pub index: usize,
    /// The command text.
    pub command: String,
    /// Why it failed.
    pub reason: StepFailure,
}

/// Aggregate outcome of a best-effort command sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SequenceReport {
    /// Number of steps attempted.
    pub attempted: usize,
    /// Steps that did not succeed, in order.
    pub failed: Vec<FailedStep>,
}

impl SequenceReport {
    /// Whether every step succeeded.
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    /// Whether the step at `index` succeeded.
    pub fn step_succeeded(&self, index: usize) -> bool {
        index < self.attempted && !self.failed.iter().any(|f| f.index == index)
    }

    /// Whether the final step succeeded.
    pub fn last_succeeded(&self) -> bool {
        self.attempted > 0 && self.step_succeeded(self.attempted - 1)
    }

    /// Commands that failed, in order.
    pub fn failed_commands(&self) -> Vec<&str> {
        self.failed.iter().map(|f| f.command.as_str()).collect()
    }

    /// Append `other`, renumbering its steps after this report's.
    pub fn extend(&mut self, other: SequenceReport) {
        let offset = self.attempted;
        self.attempted += other.attempted;
        self.failed
            .extend(other.failed.into_iter().map(|f| FailedStep {
                index: f.index + offset,
                ..f
            }));
    }
}

// ---------------------------------------------------------------------------
// CommandChannel
// ---------------------------------------------------------------------------

/// Strict request/response AT command channel over a [`ModemIo`].
pub struct CommandChannel {
    io: ModemIo,
    mode: ModemMode,
}

impl CommandChannel {
    /// Create a channel over `io`. The link starts in command mode.
    pub fn new(io: ModemIo) -> Self {
        CommandChannel {
            io,
            mode: ModemMode::Command,
        }
    }

    /// Current link mode.
    pub fn mode(&self) -> ModemMode {
        self.mode
    }

    /// Raw access to the link for the audio bridge.
    pub fn io_mut(&mut self) -> &mut ModemIo {
        &mut self.io
    }

    /// Shared access to the link.
    pub fn io(&self) -> &ModemIo {
        &self.io
    }

    /// Issue `command` and report whether the modem echoed it and answered
    /// `expected`.
    pub async fn send(&mut self, command: &str, expected: &str) -> Result<bool> {
        Ok(self.execute(command, expected).await?.success)
    }

    /// Issue `command` and return the full [`CommandResult`].
    ///
    /// Protocol:
    /// 1. write `command CR`;
    /// 2. skip any number of `CR LF` / `OK CR LF` lines;
    /// 3. the next line must be exactly `command CR CR LF`, otherwise fail
    ///    without reading further;
    /// 4. the line after that must be exactly `expected CR LF`.
    pub async fn execute(&mut self, command: &str, expected: &str) -> Result<CommandResult> {
        protocol::validate_command(command)?;

        let transition = protocol::mode_transition(command);
        if self.mode.is_voice() && transition != ModeTransition::ToCommand {
            return Err(Error::InvalidMode {
                command: command.to_string(),
                mode: self.mode,
            });
        }

        self.io.write(&protocol::encode_command(command)).await?;

        // Once written, a command leaving voice mode has taken effect as far
        // as the modem is concerned, whatever it answers.
        if transition == ModeTransition::ToCommand {
            self.mode = ModemMode::Command;
        }

        let mut lines = Vec::new();
        let mut line = self.io.read_line().await?;
        while protocol::is_stray_line(&line) {
            lines.push(line);
            line = self.io.read_line().await?;
        }

        let echo_ok = line == protocol::echo_line(command);
        if !echo_ok {
            debug!(command, got = %protocol::line_text(&line), "AT echo mismatch");
        }
        lines.push(line);
        if !echo_ok {
            return Ok(CommandResult {
                command: command.to_string(),
                success: false,
                lines,
            });
        }

        let result = self.io.read_line().await?;
        let success = result == protocol::result_line(expected);
        if success {
            if let ModeTransition::ToVoice(mode) = transition {
                self.mode = mode;
            }
        }
        debug!(
            command,
            expected,
            got = %protocol::line_text(&result),
            success,
            "AT command"
        );
        lines.push(result);

        Ok(CommandResult {
            command: command.to_string(),
            success,
            lines,
        })
    }

    /// Run every step in order, regardless of earlier failures.
    ///
    /// Steps rejected because of the link mode are recorded as failures;
    /// transport errors abort the sequence.
    pub async fn run_sequence(&mut self, steps: &[CommandStep]) -> Result<SequenceReport> {
        let mut report = SequenceReport::default();
        for (index, step) in steps.iter().enumerate() {
            report.attempted += 1;
            let reason = match self.send(&step.command, &step.expected).await {
                Ok(true) => continue,
                Ok(false) => StepFailure::Mismatch,
                Err(Error::InvalidMode { mode, .. }) => StepFailure::RejectedInMode(mode),
                Err(e) => return Err(e),
            };
            warn!(index, command = %step.command, reason = ?reason, "sequence step failed");
            report.failed.push(FailedStep {
                index,
                command: step.command.clone(),
                reason,
            });
        }
        Ok(report)
    }

    /// Close the link. The channel is unusable afterwards.
    pub async fn close(&mut self) -> Result<()> {
        self.mode = ModemMode::Command;
        self.io.close().await
    }
}
