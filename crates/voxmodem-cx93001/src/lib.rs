//! Conexant CX93001 voice modem driver for voxmodem.
//!
//! This crate drives CX93001-based USB voice modems through the Hayes AT
//! command set. It provides:
//!
//! - **Command builders** ([`commands`]) -- the AT commands and ordered step
//!   lists for startup, self test, answering, dialing, recording and hang-up.
//! - **End-of-call detection** ([`detector`]) -- scans the voice stream for
//!   the `<DLE>s`, `<DLE>b` and `<DLE><ETX>` markers.
//! - **Audio bridge** ([`bridge`]) -- paced transmit and marker-bounded
//!   receive of raw 8-bit samples.
//! - **Codec collaborators** ([`codec`]) -- WAV read/write plus pluggable MP3
//!   transcoding and speech synthesis.
//! - **Modem driver** ([`modem`]) -- the call lifecycle state machine.
//! - **Builder** ([`builder`]) -- fluent configuration and initialization.
//!
//! # Example
//!
//! ```no_run
//! use voxmodem_cx93001::{ModemBuilder, RecordOptions};
//!
//! # async fn example() -> voxmodem_core::Result<()> {
//! let mut modem = ModemBuilder::new().serial_port("/dev/ttyACM0").build().await?;
//! let caller = modem.wait_call(4).await?;
//! modem.accept_call().await?;
//! modem.play_audio_file("greeting.wav", None).await?;
//! let recording = modem
//!     .record_call(RecordOptions::default().number(caller.number))
//!     .await?;
//! println!("saved {}", recording.path.display());
//! # Ok(())
//! # }
//! ```

pub mod bridge;
pub mod builder;
pub mod codec;
pub mod commands;
pub mod detector;
pub mod modem;

pub use bridge::{Capture, Playback};
pub use builder::ModemBuilder;
pub use codec::{EspeakSynthesizer, FfmpegTranscoder, Synthesizer, Transcoder, WavSource};
pub use detector::{detects_end, EndMarker, MarkerScanner};
pub use modem::{Modem, RecordOptions, Recording, DEFAULT_MAX_RINGS};
