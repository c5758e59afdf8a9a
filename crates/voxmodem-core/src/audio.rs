//! Audio formats and the [`AudioSource`] trait.
//!
//! The modem speaks raw PCM: in voice mode every byte on the link is a
//! sample. This module describes that format and the pull-based source
//! the audio bridge drains while transmitting. Container handling (WAV,
//! MP3) lives with the driver that owns the external codec collaborators.

use std::time::Duration;

use crate::error::Result;

// ---------------------------------------------------------------------------
// PcmFormat
// ---------------------------------------------------------------------------

/// Layout of raw PCM samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PcmFormat {
    /// Frames per second.
    pub sample_rate: u32,
    /// Number of interleaved channels (1 = mono).
    pub channels: u16,
    /// Bits per sample (8 for the modem's voice format).
    pub bits_per_sample: u16,
}

impl PcmFormat {
    /// 8-bit unsigned PCM, mono, 8000 Hz: the `AT+VSM=1,8000` voice format.
    pub const VOICE: PcmFormat = PcmFormat {
        sample_rate: 8000,
        channels: 1,
        bits_per_sample: 8,
    };

    /// Bytes occupied by one frame (one sample per channel).
    pub fn frame_size(&self) -> usize {
        let bytes_per_sample = (self.bits_per_sample as usize).div_ceil(8);
        bytes_per_sample * self.channels as usize
    }

    /// Playback time of `frames` frames at this format's sample rate.
    ///
    /// Returns zero for a misconfigured format with a zero sample rate.
    pub fn duration_of(&self, frames: u64) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(frames as f64 / self.sample_rate as f64)
    }
}

impl Default for PcmFormat {
    fn default() -> Self {
        PcmFormat::VOICE
    }
}

// ---------------------------------------------------------------------------
// AudioSource
// ---------------------------------------------------------------------------

/// A decoded audio stream that can be drained frame by frame.
///
/// The bridge writes whatever bytes the source yields straight to the
/// modem. A source whose format differs from [`PcmFormat::VOICE`] is not
/// rejected; it simply plays back wrong.
pub trait AudioSource: Send {
    /// Format of the bytes returned by [`read_frames`](Self::read_frames).
    fn format(&self) -> PcmFormat;

    /// Total number of frames the source declares.
    fn frame_count(&self) -> u64;

    /// Read up to `frames` frames of raw sample bytes.
    ///
    /// Returns an empty vector once the source is exhausted.
    fn read_frames(&mut self, frames: usize) -> Result<Vec<u8>>;

    /// Frames per second, as declared by the source.
    fn frame_rate(&self) -> u32 {
        self.format().sample_rate
    }

    /// Declared playback length, `frame_count / frame_rate`.
    fn duration(&self) -> Duration {
        self.format().duration_of(self.frame_count())
    }
}

/// An [`AudioSource`] over an in-memory PCM buffer.
#[derive(Debug, Clone)]
pub struct MemorySource {
    data: Vec<u8>,
    cursor: usize,
    format: PcmFormat,
}

impl MemorySource {
    /// Wrap raw bytes already in `format`.
    pub fn new(data: Vec<u8>, format: PcmFormat) -> Self {
        MemorySource {
            data,
            cursor: 0,
            format,
        }
    }

    /// Wrap raw bytes in the modem's native voice format.
    pub fn voice(data: Vec<u8>) -> Self {
        Self::new(data, PcmFormat::VOICE)
    }

    /// Bytes not yet read.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.cursor
    }
}

impl AudioSource for MemorySource {
    fn format(&self) -> PcmFormat {
        self.format
    }

    fn frame_count(&self) -> u64 {
        let frame_size = self.format.frame_size().max(1);
        (self.data.len() / frame_size) as u64
    }

    fn read_frames(&mut self, frames: usize) -> Result<Vec<u8>> {
        let want = frames * self.format.frame_size().max(1);
        let end = (self.cursor + want).min(self.data.len());
        let chunk = self.data[self.cursor..end].to_vec();
        self.cursor = end;
        Ok(chunk)
    }
}
