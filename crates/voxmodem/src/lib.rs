//! # voxmodem -- Voice Modem Control over Hayes AT Commands
//!
//! `voxmodem` is an asynchronous Rust library for driving voice-capable
//! USB modems. It waits for incoming calls and reads their caller ID,
//! answers, rejects or places calls, plays audio and DTMF tones to the line,
//! and records calls until the remote party hangs up.
//!
//! ## Quick Start
//!
//! ```no_run
//! use voxmodem::cx93001::{ModemBuilder, RecordOptions};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut modem = ModemBuilder::new()
//!         .serial_port("/dev/ttyACM0")
//!         .recordings_dir("/var/spool/voxmodem")
//!         .build()
//!         .await?;
//!
//!     let caller = modem.wait_call(4).await?;
//!     modem.accept_call().await?;
//!     let recording = modem
//!         .record_call(RecordOptions::default().number(caller.number))
//!         .await?;
//!     println!("saved {}", recording.path.display());
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! The library is organized as a workspace of focused crates:
//!
//! | Crate                   | Purpose                                             |
//! |-------------------------|-----------------------------------------------------|
//! | `voxmodem-core`         | [`Transport`] trait, call types, DTMF, audio, errors |
//! | `voxmodem-transport`    | Serial transport                                    |
//! | `voxmodem-at`           | AT framing, line IO, command channel                |
//! | `voxmodem-cx93001`      | CX93001 driver: call lifecycle and audio bridge     |
//! | **`voxmodem`**          | This facade crate -- re-exports everything          |
//!
//! ## Call lifecycle
//!
//! ```text
//! Idle -> (Ringing) -> Answering | Dialing -> InCall -> HangingUp -> Idle
//! ```
//!
//! A modem command that is answered with the wrong line is not an error.
//! Single commands report `Ok(false)`; multi-step operations such as
//! [`accept_call`](cx93001::Modem::accept_call) run every step and return a
//! [`SequenceReport`](at::SequenceReport) naming the steps that failed.

pub use voxmodem_core::*;

/// Hayes AT command engine.
///
/// Provides [`CommandChannel`](at::CommandChannel), which issues one command
/// at a time, checks the echo and result line, and tracks whether the modem
/// is in command mode or streaming voice.
pub mod at {
    pub use voxmodem_at::*;
}

/// Conexant CX93001 voice modem driver.
///
/// Provides [`Modem`](cx93001::Modem) and
/// [`ModemBuilder`](cx93001::ModemBuilder).
pub mod cx93001 {
    pub use voxmodem_cx93001::*;
}

/// Serial transport.
pub mod transport {
    pub use voxmodem_transport::*;
}
