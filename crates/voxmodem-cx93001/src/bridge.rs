//! Raw audio streaming over the modem link.
//!
//! Once the modem is in voice transmit or receive mode every byte on the
//! link is an 8-bit sample. These functions move samples between the link
//! and memory; switching modes and hanging up is the caller's job.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, trace};

use voxmodem_at::ModemIo;
use voxmodem_core::{AudioSource, Result};

use crate::detector::{EndMarker, MarkerScanner};

/// Frames written or read per chunk.
pub const CHUNK_SIZE: usize = 1024;

/// Pause after each transmitted chunk.
pub const CHUNK_PACING: Duration = Duration::from_millis(60);

/// Time allowed per DTMF tone.
pub const TONE_DURATION: Duration = Duration::from_secs(1);

/// Outcome of a transmit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Playback {
    /// Chunks written to the modem.
    pub chunks: usize,
    /// Sample bytes written.
    pub bytes: usize,
    /// Whether the source was drained (as opposed to hitting the time limit).
    pub completed: bool,
    /// Time spent streaming.
    pub elapsed: Duration,
}

/// Outcome of a receive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capture {
    /// Every byte received, including the chunk carrying the end marker.
    pub audio: Vec<u8>,
    /// Chunks read, including empty reads that timed out.
    pub chunks: usize,
    /// The marker that ended the capture, if one did.
    pub marker: Option<EndMarker>,
    /// Time spent receiving.
    pub elapsed: Duration,
}

/// Stream `source` to the modem in [`CHUNK_SIZE`]-frame chunks.
///
/// Each chunk is followed by a [`CHUNK_PACING`] pause. The modem plays
/// samples slower than they are written, so a drained source is followed by
/// a wait until its declared duration has passed. `limit` cuts playback
/// short; no limit (or a zero one) means the declared duration.
pub async fn transmit(
    io: &mut ModemIo,
    source: &mut dyn AudioSource,
    limit: Option<Duration>,
) -> Result<Playback> {
    let declared = source.duration();
    let limit = match limit {
        Some(l) if !l.is_zero() => l.min(declared),
        _ => declared,
    };
    let start = Instant::now();
    let mut playback = Playback {
        chunks: 0,
        bytes: 0,
        completed: false,
        elapsed: Duration::ZERO,
    };

    let mut data = source.read_frames(CHUNK_SIZE)?;
    loop {
        if data.is_empty() {
            playback.completed = true;
            tokio::time::sleep_until(start + limit).await;
            break;
        }
        io.write(&data).await?;
        playback.chunks += 1;
        playback.bytes += data.len();
        trace!(chunk = playback.chunks, len = data.len(), "voice chunk sent");

        data = source.read_frames(CHUNK_SIZE)?;
        tokio::time::sleep(CHUNK_PACING).await;
        if start.elapsed() >= limit {
            playback.completed = data.is_empty();
            break;
        }
    }

    playback.elapsed = start.elapsed();
    debug!(
        chunks = playback.chunks,
        bytes = playback.bytes,
        completed = playback.completed,
        elapsed_ms = playback.elapsed.as_millis() as u64,
        "voice transmit finished"
    );
    Ok(playback)
}

/// Read [`CHUNK_SIZE`]-byte chunks from the modem until `scanner` reports an
/// end marker or `limit` has elapsed.
///
/// The chunk containing the marker is kept; nothing after it is read.
pub async fn receive(
    io: &mut ModemIo,
    scanner: &mut MarkerScanner,
    limit: Duration,
) -> Result<Capture> {
    let start = Instant::now();
    let mut capture = Capture {
        audio: Vec::new(),
        chunks: 0,
        marker: None,
        elapsed: Duration::ZERO,
    };

    loop {
        let chunk = io.read_chunk(CHUNK_SIZE).await?;
        capture.chunks += 1;
        capture.audio.extend_from_slice(&chunk);
        trace!(chunk = capture.chunks, len = chunk.len(), "voice chunk received");

        if let Some(marker) = scanner.scan(&chunk) {
            capture.marker = Some(marker);
            break;
        }
        if start.elapsed() >= limit {
            break;
        }
    }

    capture.elapsed = start.elapsed();
    debug!(
        chunks = capture.chunks,
        bytes = capture.audio.len(),
        marker = ?capture.marker,
        elapsed_ms = capture.elapsed.as_millis() as u64,
        "voice receive finished"
    );
    Ok(capture)
}
