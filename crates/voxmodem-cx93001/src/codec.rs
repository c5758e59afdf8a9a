//! Audio container handling and external codec collaborators.
//!
//! WAV files are read and written in-process with `hound`. MP3 transcoding
//! and speech synthesis are delegated to external programs behind the
//! [`Transcoder`] and [`Synthesizer`] traits so tests and applications can
//! substitute their own.

use std::ffi::OsStr;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use chrono::{DateTime, Local};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use tokio::process::Command;
use tracing::debug;

use voxmodem_core::{AudioSource, Error, PcmFormat, Result};

fn codec_error(context: &str, e: hound::Error) -> Error {
    match e {
        hound::Error::IoError(io) => Error::Io(io),
        other => Error::Codec(format!("{context}: {other}")),
    }
}

// ---------------------------------------------------------------------------
// WAV
// ---------------------------------------------------------------------------

/// An [`AudioSource`] reading PCM samples from a WAV file.
///
/// Samples are returned in the file's own layout: 8-bit samples as
/// unsigned bytes, wider samples little-endian. Only integer PCM is
/// supported.
pub struct WavSource {
    reader: WavReader<BufReader<File>>,
    format: PcmFormat,
    frames: u64,
}

impl WavSource {
    /// Open the WAV file at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let reader = WavReader::open(path)
            .map_err(|e| codec_error(&format!("cannot open {}", path.display()), e))?;
        let spec = reader.spec();
        if spec.sample_format != SampleFormat::Int || spec.bits_per_sample > 32 {
            return Err(Error::Codec(format!(
                "{}: unsupported sample format {:?}/{} bits",
                path.display(),
                spec.sample_format,
                spec.bits_per_sample
            )));
        }
        let format = PcmFormat {
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            bits_per_sample: spec.bits_per_sample,
        };
        let frames = u64::from(reader.duration());
        debug!(path = %path.display(), ?format, frames, "opened WAV source");
        Ok(WavSource {
            reader,
            format,
            frames,
        })
    }
}

impl AudioSource for WavSource {
    fn format(&self) -> PcmFormat {
        self.format
    }

    fn frame_count(&self) -> u64 {
        self.frames
    }

    fn read_frames(&mut self, frames: usize) -> Result<Vec<u8>> {
        let bits = self.format.bits_per_sample;
        let samples = frames * usize::from(self.format.channels.max(1));
        let mut out = Vec::with_capacity(samples * self.format.frame_size().max(1));
        for sample in self.reader.samples::<i32>().take(samples) {
            let sample = sample.map_err(|e| codec_error("WAV read", e))?;
            match bits {
                // hound centres 8-bit samples on zero; the wire format is unsigned.
                1..=8 => out.push((sample + 128) as u8),
                9..=16 => out.extend_from_slice(&(sample as i16).to_le_bytes()),
                17..=24 => out.extend_from_slice(&sample.to_le_bytes()[..3]),
                _ => out.extend_from_slice(&sample.to_le_bytes()),
            }
        }
        Ok(out)
    }
}

/// Write raw 8-bit unsigned mono 8000 Hz samples as a WAV file.
pub fn write_wav(path: &Path, samples: &[u8]) -> Result<()> {
    let spec = WavSpec {
        channels: PcmFormat::VOICE.channels,
        sample_rate: PcmFormat::VOICE.sample_rate,
        bits_per_sample: PcmFormat::VOICE.bits_per_sample,
        sample_format: SampleFormat::Int,
    };
    let context = format!("cannot write {}", path.display());
    let mut writer = WavWriter::create(path, spec).map_err(|e| codec_error(&context, e))?;
    for &byte in samples {
        writer
            .write_sample((byte ^ 0x80) as i8)
            .map_err(|e| codec_error(&context, e))?;
    }
    writer.finalize().map_err(|e| codec_error(&context, e))
}

/// File name stem for a recording: `DD-MM-YYYY_HH:MM:SS_<number>`.
///
/// Path separators in `number` are replaced so the file always lands in
/// the recordings directory.
pub fn recording_file_stem(date: &DateTime<Local>, number: &str) -> String {
    let number: String = number
        .chars()
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .collect();
    format!("{}_{}", date.format("%d-%m-%Y_%H:%M:%S"), number)
}

// ---------------------------------------------------------------------------
// External collaborators
// ---------------------------------------------------------------------------

/// Converts a finished WAV recording into a compressed format.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// File extension of the output, without the dot.
    fn extension(&self) -> &str;

    /// Transcode the WAV at `input` into `output`.
    async fn transcode(&self, input: &Path, output: &Path) -> Result<()>;
}

/// Renders text to speech.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Render `phrase` in language `lang` into an 8-bit unsigned mono
    /// 8000 Hz WAV file at `output`.
    async fn synthesize(&self, phrase: &str, lang: &str, output: &Path) -> Result<()>;
}

/// Run `program` with `args`, failing with [`Error::Codec`] on a non-zero exit.
async fn run_tool(program: &Path, args: &[&OsStr]) -> Result<()> {
    debug!(program = %program.display(), ?args, "running external tool");
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| Error::Codec(format!("failed to run {}: {e}", program.display())))?;
    if output.status.success() {
        Ok(())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(Error::Codec(format!(
            "{} exited with {}: {}",
            program.display(),
            output.status,
            stderr.trim()
        )))
    }
}

/// MP3 transcoding with the `ffmpeg` command-line tool.
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    program: PathBuf,
}

impl FfmpegTranscoder {
    /// Use `ffmpeg` from `PATH`.
    pub fn new() -> Self {
        Self::with_program("ffmpeg")
    }

    /// Use a specific ffmpeg binary.
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        FfmpegTranscoder {
            program: program.into(),
        }
    }
}

impl Default for FfmpegTranscoder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    fn extension(&self) -> &str {
        "mp3"
    }

    async fn transcode(&self, input: &Path, output: &Path) -> Result<()> {
        run_tool(
            &self.program,
            &[
                OsStr::new("-y"),
                OsStr::new("-loglevel"),
                OsStr::new("error"),
                OsStr::new("-i"),
                input.as_os_str(),
                output.as_os_str(),
            ],
        )
        .await
    }
}

/// Speech synthesis with `espeak`, resampled to the voice format by `ffmpeg`.
#[derive(Debug, Clone)]
pub struct EspeakSynthesizer {
    espeak: PathBuf,
    ffmpeg: PathBuf,
}

impl EspeakSynthesizer {
    /// Use `espeak` and `ffmpeg` from `PATH`.
    pub fn new() -> Self {
        Self::with_programs("espeak", "ffmpeg")
    }

    /// Use specific binaries.
    pub fn with_programs(espeak: impl Into<PathBuf>, ffmpeg: impl Into<PathBuf>) -> Self {
        EspeakSynthesizer {
            espeak: espeak.into(),
            ffmpeg: ffmpeg.into(),
        }
    }
}

impl Default for EspeakSynthesizer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Synthesizer for EspeakSynthesizer {
    async fn synthesize(&self, phrase: &str, lang: &str, output: &Path) -> Result<()> {
        let raw = output.with_extension("espeak.wav");
        run_tool(
            &self.espeak,
            &[
                OsStr::new("-w"),
                raw.as_os_str(),
                OsStr::new("-v"),
                OsStr::new(lang),
                OsStr::new(phrase),
            ],
        )
        .await?;

        let converted = run_tool(
            &self.ffmpeg,
            &[
                OsStr::new("-y"),
                OsStr::new("-loglevel"),
                OsStr::new("error"),
                OsStr::new("-i"),
                raw.as_os_str(),
                OsStr::new("-ar"),
                OsStr::new("8000"),
                OsStr::new("-acodec"),
                OsStr::new("pcm_u8"),
                OsStr::new("-ac"),
                OsStr::new("1"),
                output.as_os_str(),
            ],
        )
        .await;
        tokio::fs::remove_file(&raw).await?;
        converted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn voice_wav_reads_back_unsigned_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("call.wav");
        let samples: Vec<u8> = vec![0x00, 0x7f, 0x80, 0x81, 0xff];
        write_wav(&path, &samples).unwrap();

        let spec = hound::WavReader::open(&path).unwrap().spec();
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_rate, 8000);
        assert_eq!(spec.bits_per_sample, 8);

        let mut source = WavSource::open(&path).unwrap();
        assert_eq!(source.format(), PcmFormat::VOICE);
        assert_eq!(source.frame_count(), 5);
        assert_eq!(source.read_frames(3).unwrap(), vec![0x00, 0x7f, 0x80]);
        assert_eq!(source.read_frames(1024).unwrap(), vec![0x81, 0xff]);
        assert!(source.read_frames(1024).unwrap().is_empty());
    }

    #[test]
    fn sixteen_bit_source_yields_little_endian() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        let spec = WavSpec {
            channels: 2,
            sample_rate: 16_000,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(&path, spec).unwrap();
        for s in [1i16, -2, 0x0102, 0] {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();

        let mut source = WavSource::open(&path).unwrap();
        assert_eq!(source.frame_count(), 2);
        assert_eq!(source.frame_rate(), 16_000);
        assert_eq!(
            source.read_frames(1).unwrap(),
            vec![0x01, 0x00, 0xfe, 0xff]
        );
    }

    #[test]
    fn float_wav_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("float.wav");
        let spec = WavSpec {
            channels: 1,
            sample_rate: 8000,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let mut writer = WavWriter::create(&path, spec).unwrap();
        writer.write_sample(0.5f32).unwrap();
        writer.finalize().unwrap();

        assert!(matches!(WavSource::open(&path), Err(Error::Codec(_))));
    }

    #[test]
    fn missing_wav_is_io_error() {
        let result = WavSource::open("/nonexistent/voxmodem/greeting.wav");
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[test]
    fn file_stem_format() {
        let date = Local.with_ymd_and_hms(2024, 3, 7, 9, 5, 2).unwrap();
        assert_eq!(
            recording_file_stem(&date, "5551234"),
            "07-03-2024_09:05:02_5551234"
        );
        assert_eq!(
            recording_file_stem(&date, "../x"),
            "07-03-2024_09:05:02_.._x"
        );
    }

    #[tokio::test]
    async fn missing_transcoder_binary_is_codec_error() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.wav");
        write_wav(&input, &[0x80; 8]).unwrap();

        let transcoder = FfmpegTranscoder::with_program("/nonexistent/ffmpeg");
        assert_eq!(transcoder.extension(), "mp3");
        let err = transcoder
            .transcode(&input, &dir.path().join("out.mp3"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Codec(_)));
    }
}
