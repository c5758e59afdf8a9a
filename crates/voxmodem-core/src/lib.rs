//! voxmodem-core: Core traits, types, and error definitions for voxmodem.
//!
//! This crate defines the modem-agnostic abstractions shared by the AT
//! command engine, the modem driver, and the transports. Applications can
//! depend on these types without pulling in a serial stack.
//!
//! # Key types
//!
//! - [`Transport`] -- byte-level communication channel
//! - [`ModemMode`] / [`CallState`] -- link mode and call lifecycle
//! - [`CallerIdRecord`] / [`CallSession`] -- call bookkeeping
//! - [`DtmfSequence`] -- validated tone sequences
//! - [`AudioSource`] -- pull-based PCM source for playback
//! - [`Error`] / [`Result`] -- error handling

pub mod audio;
pub mod dtmf;
pub mod error;
pub mod transport;
pub mod types;

pub use audio::{AudioSource, MemorySource, PcmFormat};
pub use dtmf::{DtmfSequence, ParseDtmfError};
pub use error::{Error, Result};
pub use transport::Transport;
pub use types::*;
