//! ModemBuilder -- fluent builder for constructing [`Modem`] instances.
//!
//! Separates configuration from construction so that callers can set up
//! serial port parameters, timeouts, the recordings directory and the
//! external codec collaborators before the modem is opened and initialized.
//!
//! # Example
//!
//! ```no_run
//! use voxmodem_cx93001::builder::ModemBuilder;
//! use std::time::Duration;
//!
//! # async fn example() -> voxmodem_core::Result<()> {
//! let modem = ModemBuilder::new()
//!     .serial_port("/dev/ttyACM0")
//!     .baud_rate(115_200)
//!     .read_timeout(Duration::from_secs(3))
//!     .recordings_dir("/var/spool/voxmodem")
//!     .build()
//!     .await?;
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use std::time::Duration;

use voxmodem_at::{CommandChannel, ModemIo, DEFAULT_READ_TIMEOUT};
use voxmodem_core::error::{Error, Result};
use voxmodem_core::transport::Transport;
use voxmodem_transport::{SerialTransport, DEFAULT_BAUD_RATE};

use crate::codec::{EspeakSynthesizer, FfmpegTranscoder, Synthesizer, Transcoder};
use crate::modem::{Modem, ModemConfig};

/// Serial port opened when none is configured.
pub const DEFAULT_SERIAL_PORT: &str = "/dev/ttyACM0";

/// Fluent builder for [`Modem`].
///
/// Every setting has a default, so the simplest usage is:
///
/// ```ignore
/// let modem = ModemBuilder::new().build().await?;
/// ```
pub struct ModemBuilder {
    serial_port: String,
    baud_rate: u32,
    read_timeout: Duration,
    recordings_dir: PathBuf,
    marker_lookback: bool,
    transcoder: Box<dyn Transcoder>,
    synthesizer: Box<dyn Synthesizer>,
}

impl ModemBuilder {
    /// Create a builder with default settings.
    pub fn new() -> Self {
        ModemBuilder {
            serial_port: DEFAULT_SERIAL_PORT.to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout: DEFAULT_READ_TIMEOUT,
            recordings_dir: PathBuf::from("."),
            marker_lookback: false,
            transcoder: Box::new(FfmpegTranscoder::new()),
            synthesizer: Box::new(EspeakSynthesizer::new()),
        }
    }

    /// Set the serial port path (default `/dev/ttyACM0`).
    pub fn serial_port(mut self, port: &str) -> Self {
        self.serial_port = port.to_string();
        self
    }

    /// Set the baud rate (default 115200).
    pub fn baud_rate(mut self, baud: u32) -> Self {
        self.baud_rate = baud;
        self
    }

    /// Set how long a single line or chunk read may wait (default 3s).
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Set the directory recordings are written to (default: the
    /// current directory).
    pub fn recordings_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.recordings_dir = dir.into();
        self
    }

    /// Also detect end markers whose DLE ends one chunk and whose code
    /// starts the next (default: off).
    pub fn marker_lookback(mut self, enabled: bool) -> Self {
        self.marker_lookback = enabled;
        self
    }

    /// Replace the MP3 transcoder (default: `ffmpeg`).
    pub fn transcoder(mut self, transcoder: impl Transcoder + 'static) -> Self {
        self.transcoder = Box::new(transcoder);
        self
    }

    /// Replace the speech synthesizer (default: `espeak` + `ffmpeg`).
    pub fn synthesizer(mut self, synthesizer: impl Synthesizer + 'static) -> Self {
        self.synthesizer = Box::new(synthesizer);
        self
    }

    /// Build and initialize a [`Modem`] over a caller-provided transport.
    ///
    /// This is the primary entry point for testing (pass a
    /// `MockTransport` from `voxmodem-test-harness`). Serial port and baud
    /// rate settings are ignored.
    pub async fn build_with_transport(self, transport: Box<dyn Transport>) -> Result<Modem> {
        if self.read_timeout.is_zero() {
            return Err(Error::InvalidParameter("read_timeout must be non-zero".into()));
        }
        let channel = CommandChannel::new(ModemIo::new(transport, self.read_timeout));
        let config = ModemConfig {
            recordings_dir: self.recordings_dir,
            marker_lookback: self.marker_lookback,
            transcoder: self.transcoder,
            synthesizer: self.synthesizer,
        };
        Modem::connect(channel, config).await
    }

    /// Open the serial port, then build and initialize a [`Modem`].
    ///
    /// A port that cannot be opened is reported as
    /// [`Error::Initialization`], like a failed startup command.
    pub async fn build(self) -> Result<Modem> {
        let transport = SerialTransport::open(&self.serial_port, self.baud_rate)
            .await
            .map_err(|e| {
                Error::Initialization(format!("could not open a serial connection: {e}"))
            })?;
        self.build_with_transport(Box::new(transport)).await
    }
}

impl Default for ModemBuilder {
    fn default() -> Self {
        Self::new()
    }
}
