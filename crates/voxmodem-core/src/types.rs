//! Core types used throughout voxmodem.
//!
//! These describe the state of the modem link and of the call currently
//! carried on it: which mode the modem is in, where the call lifecycle
//! stands, and how a call ended.

use std::fmt;

use chrono::{DateTime, Local};

/// Operating mode of the modem link.
///
/// Exactly one mode holds at any instant. The modem leaves command mode
/// only through `AT+VTX` / `AT+VRX` and returns through a mode-setting
/// command such as `AT+FCLASS=8`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ModemMode {
    /// Line-oriented AT command mode.
    #[default]
    Command,
    /// Voice transmit: raw samples written to the link are played to the line.
    VoiceTransmit,
    /// Voice receive: the link carries raw samples from the line.
    VoiceReceive,
}

impl ModemMode {
    /// Whether the link is currently carrying raw voice samples.
    pub fn is_voice(&self) -> bool {
        !matches!(self, ModemMode::Command)
    }
}

impl fmt::Display for ModemMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ModemMode::Command => "command",
            ModemMode::VoiceTransmit => "voice-transmit",
            ModemMode::VoiceReceive => "voice-receive",
        };
        write!(f, "{s}")
    }
}

/// Position of the modem in the call lifecycle.
///
/// ```text
/// Idle -> (Ringing) -> Answering | Dialing -> InCall -> HangingUp -> Idle
/// ```
///
/// A failed setup returns straight to `Idle` without entering `InCall`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CallState {
    /// No call in progress.
    #[default]
    Idle,
    /// At least one ring or caller ID line has been seen.
    Ringing,
    /// Answer sequence in progress.
    Answering,
    /// Dial sequence in progress.
    Dialing,
    /// A call is up.
    InCall,
    /// Hang-up sequence in progress.
    HangingUp,
}

impl fmt::Display for CallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CallState::Idle => "idle",
            CallState::Ringing => "ringing",
            CallState::Answering => "answering",
            CallState::Dialing => "dialing",
            CallState::InCall => "in-call",
            CallState::HangingUp => "hanging-up",
        };
        write!(f, "{s}")
    }
}

/// Direction of a call relative to this modem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallDirection {
    /// The remote party called us.
    Inbound,
    /// We dialed out.
    Outbound,
}

/// Why a call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TerminationCause {
    /// End of transmission (`<DLE><ETX>`) received from the line.
    HangupByPeer,
    /// Busy tone (`<DLE>b`) detected.
    Busy,
    /// Silence (`<DLE>s`) detected for the configured period.
    SilenceTimeout,
    /// We hung up: explicit hang-up or recording deadline reached.
    LocalHangup,
}

impl fmt::Display for TerminationCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TerminationCause::HangupByPeer => "hangup by peer",
            TerminationCause::Busy => "busy",
            TerminationCause::SilenceTimeout => "silence timeout",
            TerminationCause::LocalHangup => "local hangup",
        };
        write!(f, "{s}")
    }
}

/// Caller ID data captured while the line was ringing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdRecord {
    /// When the record was produced.
    pub timestamp: DateTime<Local>,
    /// Caller number. Empty when caller ID was not delivered.
    pub number: String,
}

impl CallerIdRecord {
    /// Create a record stamped with the current local time.
    pub fn now(number: impl Into<String>) -> Self {
        CallerIdRecord {
            timestamp: Local::now(),
            number: number.into(),
        }
    }

    /// Whether caller ID actually delivered a number.
    pub fn has_number(&self) -> bool {
        !self.number.is_empty()
    }
}

/// One active or pending call.
///
/// Created when a call is answered or dialed and dropped once the
/// hang-up sequence completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSession {
    /// Inbound or outbound.
    pub direction: CallDirection,
    /// Remote number; `None` for inbound calls without caller ID.
    pub number: Option<String>,
    /// When the answer/dial sequence started.
    pub started_at: DateTime<Local>,
    /// Set once the call has ended.
    pub termination: Option<TerminationCause>,
}

impl CallSession {
    /// A call we are answering.
    pub fn inbound(number: Option<String>) -> Self {
        CallSession {
            direction: CallDirection::Inbound,
            number: number.filter(|n| !n.is_empty()),
            started_at: Local::now(),
            termination: None,
        }
    }

    /// A call we are placing to `number`.
    pub fn outbound(number: &str) -> Self {
        CallSession {
            direction: CallDirection::Outbound,
            number: Some(number.to_string()),
            started_at: Local::now(),
            termination: None,
        }
    }

    /// Record why the call ended. The first cause recorded wins.
    pub fn terminate(&mut self, cause: TerminationCause) {
        if self.termination.is_none() {
            self.termination = Some(cause);
        }
    }

    /// Whether a termination cause has been recorded.
    pub fn is_terminated(&self) -> bool {
        self.termination.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modem_mode_defaults_to_command() {
        assert_eq!(ModemMode::default(), ModemMode::Command);
        assert!(!ModemMode::Command.is_voice());
        assert!(ModemMode::VoiceTransmit.is_voice());
        assert!(ModemMode::VoiceReceive.is_voice());
    }

    #[test]
    fn modem_mode_display() {
        assert_eq!(ModemMode::Command.to_string(), "command");
        assert_eq!(ModemMode::VoiceReceive.to_string(), "voice-receive");
    }

    #[test]
    fn call_state_default_is_idle() {
        assert_eq!(CallState::default(), CallState::Idle);
        assert_eq!(CallState::InCall.to_string(), "in-call");
    }

    #[test]
    fn caller_id_empty_number() {
        let record = CallerIdRecord::now("");
        assert!(!record.has_number());
        let record = CallerIdRecord::now("5551234");
        assert!(record.has_number());
        assert_eq!(record.number, "5551234");
    }

    #[test]
    fn inbound_session_drops_empty_number() {
        let session = CallSession::inbound(Some(String::new()));
        assert_eq!(session.direction, CallDirection::Inbound);
        assert!(session.number.is_none());
    }

    #[test]
    fn outbound_session_keeps_number() {
        let session = CallSession::outbound("5551234");
        assert_eq!(session.direction, CallDirection::Outbound);
        assert_eq!(session.number.as_deref(), Some("5551234"));
        assert!(!session.is_terminated());
    }

    #[test]
    fn first_termination_cause_wins() {
        let mut session = CallSession::outbound("100");
        session.terminate(TerminationCause::Busy);
        session.terminate(TerminationCause::LocalHangup);
        assert_eq!(session.termination, Some(TerminationCause::Busy));
    }

    #[test]
    fn termination_cause_display() {
        assert_eq!(TerminationCause::HangupByPeer.to_string(), "hangup by peer");
        assert_eq!(TerminationCause::SilenceTimeout.to_string(), "silence timeout");
    }
}
