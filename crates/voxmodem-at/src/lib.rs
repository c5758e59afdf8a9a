//! Hayes AT command engine for voxmodem.
//!
//! This crate turns a raw [`Transport`](voxmodem_core::Transport) into a
//! strict request/response AT command channel that tracks whether the
//! modem is in command mode or streaming voice samples.
//!
//! # Architecture
//!
//! - [`protocol`]: command encoding, echo/result line shapes, mode rules
//! - [`io`]: buffered line and chunk reads with serial timeout semantics
//! - [`channel`]: [`CommandChannel`], single commands and best-effort sequences

pub mod channel;
pub mod io;
pub mod protocol;

pub use channel::{
    CommandChannel, CommandResult, CommandStep, FailedStep, SequenceReport, StepFailure,
};
pub use io::{ModemIo, DEFAULT_READ_TIMEOUT};
