//! Line and chunk reads over a [`Transport`].
//!
//! The modem link carries CR/LF-terminated text in command mode and raw
//! samples in voice mode, with no framing to tell them apart. [`ModemIo`]
//! owns the transport and one receive buffer shared by both read styles,
//! so bytes that arrive after a line are kept for the next read instead of
//! being lost between the command channel and the audio bridge.
//!
//! Both reads follow serial-port semantics: they wait up to the read
//! timeout as a whole and then return whatever arrived, possibly nothing.
//! A timeout is never an error here; transport failures are.

use std::time::Duration;

use bytes::BytesMut;
use tokio::time::Instant;
use tracing::{trace, warn};

use voxmodem_core::error::{Error, Result};
use voxmodem_core::transport::Transport;

use crate::protocol::LF;

/// Default per-read timeout.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(3);

/// Longest line accepted before the buffer is flushed as a partial line.
/// Result lines are a few bytes; anything this long is voice data.
const MAX_LINE: usize = 8192;

/// Size of a single transport receive.
const RECV_SIZE: usize = 1024;

/// Buffered reader/writer over the modem transport.
pub struct ModemIo {
    transport: Box<dyn Transport>,
    buf: BytesMut,
    read_timeout: Duration,
}

impl ModemIo {
    /// Wrap `transport`, waiting at most `read_timeout` per read.
    pub fn new(transport: Box<dyn Transport>, read_timeout: Duration) -> Self {
        ModemIo {
            transport,
            buf: BytesMut::with_capacity(RECV_SIZE * 2),
            read_timeout,
        }
    }

    /// The per-read timeout.
    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    /// Number of received bytes not yet handed out.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Write raw bytes to the modem.
    pub async fn write(&mut self, data: &[u8]) -> Result<()> {
        self.transport.send(data).await
    }

    /// Read one line, including its terminating LF.
    ///
    /// Returns early with the bytes received so far if the read timeout
    /// elapses first; an empty vector means nothing arrived at all.
    pub async fn read_line(&mut self) -> Result<Vec<u8>> {
        let deadline = Instant::now() + self.read_timeout;
        loop {
            if let Some(pos) = self.buf.iter().position(|&b| b == LF) {
                return Ok(self.buf.split_to(pos + 1).to_vec());
            }
            if self.buf.len() > MAX_LINE {
                warn!(len = self.buf.len(), "no line terminator, flushing partial line");
                return Ok(self.buf.split_to(MAX_LINE).to_vec());
            }
            if !self.fill(deadline, RECV_SIZE).await? {
                trace!(partial = self.buf.len(), "line read timed out");
                return Ok(self.buf.split().to_vec());
            }
        }
    }

    /// Read up to `n` bytes, waiting until `n` are available or the read
    /// timeout elapses.
    ///
    /// Never takes more than `n` bytes off the link, so whatever follows the
    /// chunk stays with the transport.
    pub async fn read_chunk(&mut self, n: usize) -> Result<Vec<u8>> {
        let deadline = Instant::now() + self.read_timeout;
        while self.buf.len() < n {
            let wanted = n - self.buf.len();
            if !self.fill(deadline, wanted).await? {
                break;
            }
        }
        let take = n.min(self.buf.len());
        Ok(self.buf.split_to(take).to_vec())
    }

    /// Drop any buffered bytes.
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Close the underlying transport.
    pub async fn close(&mut self) -> Result<()> {
        self.clear();
        self.transport.close().await
    }

    /// Whether the underlying transport is connected.
    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    /// Take the transport back, discarding buffered bytes.
    pub fn into_transport(self) -> Box<dyn Transport> {
        self.transport
    }

    /// Receive at most `max` bytes once into the buffer. Returns `false`
    /// once `deadline` passes.
    async fn fill(&mut self, deadline: Instant, max: usize) -> Result<bool> {
        let now = Instant::now();
        if now >= deadline {
            return Ok(false);
        }
        let mut recv_buf = [0u8; RECV_SIZE];
        let len = max.clamp(1, RECV_SIZE);
        match self.transport.receive(&mut recv_buf[..len], deadline - now).await {
            Ok(n) => {
                self.buf.extend_from_slice(&recv_buf[..n]);
                Ok(true)
            }
            Err(Error::Timeout) => Ok(false),
            Err(e) => Err(e),
        }
    }
}
