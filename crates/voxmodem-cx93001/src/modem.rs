//! Modem -- the call lifecycle driver for CX93001 voice modems.
//!
//! A [`Modem`] owns the one [`CommandChannel`] to the device and sequences
//! it through the call lifecycle:
//!
//! ```text
//! Idle -> (Ringing) -> Answering | Dialing -> InCall -> HangingUp -> Idle
//! ```
//!
//! Every operation takes `&mut self`, so commands and audio streaming can
//! never interleave on the link. Multi-step operations run every step and
//! return a [`SequenceReport`]; only transport failures, invalid arguments
//! and lifecycle violations are errors.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Local};
use tracing::{debug, info, warn};

use voxmodem_at::{protocol, CommandChannel, CommandStep, SequenceReport};
use voxmodem_core::{
    AudioSource, CallSession, CallState, CallerIdRecord, DtmfSequence, Error, ModemMode, Result,
    TerminationCause,
};

use crate::bridge::{self, Playback, TONE_DURATION};
use crate::codec::{self, Synthesizer, Transcoder, WavSource};
use crate::commands;
use crate::detector::MarkerScanner;

/// Default number of rings after which [`Modem::wait_call`] gives up on
/// caller ID.
pub const DEFAULT_MAX_RINGS: u32 = 4;

/// Default maximum length of a recording.
pub const DEFAULT_RECORD_TIMEOUT: Duration = Duration::from_secs(7200);

/// Number recorded in file names when the caller is unknown.
pub const UNKNOWN_NUMBER: &str = "unknown";

static SPEECH_FILES: AtomicU64 = AtomicU64::new(0);

/// Settings a [`Modem`] is created with. Built by
/// [`ModemBuilder`](crate::builder::ModemBuilder).
pub(crate) struct ModemConfig {
    pub recordings_dir: PathBuf,
    pub marker_lookback: bool,
    pub transcoder: Box<dyn Transcoder>,
    pub synthesizer: Box<dyn Synthesizer>,
}

/// Parameters for [`Modem::record_call`].
#[derive(Debug, Clone)]
pub struct RecordOptions {
    /// Timestamp used in the file name.
    pub date: DateTime<Local>,
    /// Number used in the file name.
    pub number: String,
    /// Maximum recording length.
    pub timeout: Duration,
}

impl RecordOptions {
    /// Set the file name timestamp.
    pub fn date(mut self, date: DateTime<Local>) -> Self {
        self.date = date;
        self
    }

    /// Set the number used in the file name.
    pub fn number(mut self, number: impl Into<String>) -> Self {
        self.number = number.into();
        self
    }

    /// Set the maximum recording length.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for RecordOptions {
    fn default() -> Self {
        RecordOptions {
            date: Local::now(),
            number: UNKNOWN_NUMBER.to_string(),
            timeout: DEFAULT_RECORD_TIMEOUT,
        }
    }
}

/// A finished recording.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recording {
    /// The transcoded file.
    pub path: PathBuf,
    /// Raw sample bytes captured.
    pub bytes: usize,
    /// Chunks read from the modem.
    pub chunks: usize,
    /// Why the recording stopped.
    pub cause: TerminationCause,
    /// Outcome of the voice receive setup commands.
    pub setup: SequenceReport,
    /// Outcome of the hang-up that ended the recording.
    pub hang_up: SequenceReport,
}

/// A connected CX93001 voice modem.
///
/// Constructed via [`ModemBuilder`](crate::builder::ModemBuilder), which runs
/// the startup sequence; a `Modem` value always refers to an initialized
/// device.
pub struct Modem {
    channel: CommandChannel,
    state: CallState,
    caller: Option<CallerIdRecord>,
    call: Option<CallSession>,
    last_call: Option<CallSession>,
    config: ModemConfig,
}

impl Modem {
    /// Run the startup sequence over `channel`.
    ///
    /// Fails with [`Error::Initialization`] on the first command that does
    /// not answer `OK`; the channel is dropped in that case.
    pub(crate) async fn connect(mut channel: CommandChannel, config: ModemConfig) -> Result<Self> {
        for (command, failure) in commands::INIT_SEQUENCE {
            match channel.send(command, protocol::OK).await {
                Ok(true) => {}
                Ok(false) => return Err(Error::Initialization(failure.to_string())),
                Err(e) => return Err(Error::Initialization(format!("{failure}: {e}"))),
            }
        }
        info!("modem initialized");
        Ok(Modem {
            channel,
            state: CallState::Idle,
            caller: None,
            call: None,
            last_call: None,
            config,
        })
    }

    /// Position in the call lifecycle.
    pub fn state(&self) -> CallState {
        self.state
    }

    /// Current link mode.
    pub fn mode(&self) -> ModemMode {
        self.channel.mode()
    }

    /// The call in progress, if any.
    pub fn current_call(&self) -> Option<&CallSession> {
        self.call.as_ref()
    }

    /// The most recently ended call.
    pub fn last_call(&self) -> Option<&CallSession> {
        self.last_call.as_ref()
    }

    /// Directory recordings are written to.
    pub fn recordings_dir(&self) -> &Path {
        &self.config.recordings_dir
    }

    /// Issue a single AT command and report whether `expected` came back.
    pub async fn at(&mut self, command: &str, expected: &str) -> Result<bool> {
        self.channel.send(command, expected).await
    }

    /// Check the modem answers the basic command set.
    ///
    /// Stops at the first command that fails.
    pub async fn self_test(&mut self) -> Result<bool> {
        for command in commands::SELF_TEST_SEQUENCE {
            if !self.channel.send(command, protocol::OK).await? {
                warn!(command, "self test failed");
                return Ok(false);
            }
        }
        debug!("self test passed");
        Ok(true)
    }

    /// Wait for an incoming call and return its caller ID.
    ///
    /// Returns as soon as an `NMBR` line arrives. If `max_rings` `RING`
    /// lines arrive first, returns a record with an empty number. There is
    /// no overall timeout; drop the future to stop waiting.
    pub async fn wait_call(&mut self, max_rings: u32) -> Result<CallerIdRecord> {
        self.require_state("wait for a call", &[CallState::Idle, CallState::Ringing])?;

        let mut rings = 0u32;
        loop {
            let line = self.channel.io_mut().read_line().await?;
            let text = protocol::line_text(&line);
            if text.is_empty() {
                continue;
            }
            if let Some(number) = parse_caller_number(&text) {
                info!(number = %number, rings, "incoming call");
                self.state = CallState::Ringing;
                return Ok(self.remember_caller(CallerIdRecord::now(number)));
            }
            if text.contains("RING") {
                rings += 1;
                self.state = CallState::Ringing;
                debug!(rings, max_rings, "ring");
                if rings >= max_rings {
                    info!(rings, "incoming call without caller ID");
                    return Ok(self.remember_caller(CallerIdRecord::now("")));
                }
            } else {
                debug!(line = %text, "ignoring line while waiting for a call");
            }
        }
    }

    /// Answer the ringing call in voice mode.
    ///
    /// The call is up iff the final `ATA` succeeded; otherwise the modem
    /// returns to [`CallState::Idle`].
    pub async fn accept_call(&mut self) -> Result<SequenceReport> {
        self.require_state("answer", &[CallState::Idle, CallState::Ringing])?;
        let number = self.caller.take().map(|c| c.number);

        self.state = CallState::Answering;
        let report = self.run_setup(&commands::accept_steps()).await?;
        self.finish_setup(&report, CallSession::inbound(number));
        Ok(report)
    }

    /// Call `number` in voice mode with silence detection enabled.
    pub async fn dial(&mut self, number: &str) -> Result<SequenceReport> {
        let steps = commands::dial_steps(number)?;
        self.require_state("dial", &[CallState::Idle])?;

        self.state = CallState::Dialing;
        let report = self.run_setup(&steps).await?;
        self.finish_setup(&report, CallSession::outbound(number));
        Ok(report)
    }

    /// Refuse the ringing call by answering and hanging up immediately.
    pub async fn reject_call(&mut self) -> Result<SequenceReport> {
        self.require_state("reject", &[CallState::Idle, CallState::Ringing])?;
        let number = self.caller.take().map(|c| c.number);

        self.state = CallState::Answering;
        self.call = Some(CallSession::inbound(number));
        let mut report = match self
            .channel
            .run_sequence(&[CommandStep::ok(commands::CMD_ANSWER)])
            .await
        {
            Ok(report) => report,
            Err(e) => {
                self.reset();
                return Err(e);
            }
        };
        report.extend(self.hang_up().await?);
        info!("call rejected");
        Ok(report)
    }

    /// End the current call. Always leaves the modem in [`CallState::Idle`].
    pub async fn hang_up(&mut self) -> Result<SequenceReport> {
        self.hang_up_with(TerminationCause::LocalHangup).await
    }

    /// Stream `source` to the line.
    ///
    /// Switches the modem to voice transmit, then plays until the source is
    /// drained or `timeout` elapses (`None` or zero plays the declared
    /// duration). The samples are sent even if the modem rejects `AT+VTX`.
    pub async fn play_audio(
        &mut self,
        source: &mut dyn AudioSource,
        timeout: Option<Duration>,
    ) -> Result<Playback> {
        if !self
            .channel
            .send(commands::CMD_VOICE_TX, protocol::OK)
            .await?
        {
            warn!("modem did not confirm voice transmit mode");
        }
        bridge::transmit(self.channel.io_mut(), source, timeout).await
    }

    /// Play a WAV file (8-bit unsigned mono 8000 Hz) to the line.
    pub async fn play_audio_file(
        &mut self,
        path: impl AsRef<Path>,
        timeout: Option<Duration>,
    ) -> Result<Playback> {
        let mut source = WavSource::open(path)?;
        self.play_audio(&mut source, timeout).await
    }

    /// Speak `phrase` in language `lang` on the line.
    ///
    /// The phrase is rendered by the configured synthesizer into a
    /// temporary WAV that is played in full and then deleted.
    pub async fn tts_say(&mut self, phrase: &str, lang: &str) -> Result<Playback> {
        let path = speech_file_path();
        self.config
            .synthesizer
            .synthesize(phrase, lang, &path)
            .await?;
        let played = self.play_audio_file(&path, None).await;
        if let Err(e) = tokio::fs::remove_file(&path).await {
            warn!(path = %path.display(), error = %e, "could not remove speech file");
        }
        played
    }

    /// Play DTMF tones, allowing one second per tone.
    pub async fn play_tones(&mut self, sequence: &DtmfSequence) -> Result<bool> {
        let ok = self
            .channel
            .send(&commands::cmd_tones(sequence), protocol::OK)
            .await?;
        tokio::time::sleep(TONE_DURATION * sequence.len() as u32).await;
        debug!(tones = %sequence, ok, "played tones");
        Ok(ok)
    }

    /// Record the call until the line reports an end marker or the timeout
    /// elapses, then hang up and save the audio.
    ///
    /// The raw samples are written as
    /// `<recordings_dir>/<DD-MM-YYYY_HH:MM:SS>_<number>.wav`, transcoded
    /// next to it, and the WAV is deleted once transcoding succeeds.
    pub async fn record_call(&mut self, options: RecordOptions) -> Result<Recording> {
        let setup = self
            .channel
            .run_sequence(&commands::record_setup_steps())
            .await?;
        if !setup.last_succeeded() {
            warn!("modem did not confirm voice receive mode");
        }

        let mut scanner = MarkerScanner::new(self.config.marker_lookback);
        let capture =
            bridge::receive(self.channel.io_mut(), &mut scanner, options.timeout).await?;
        let cause = capture
            .marker
            .map_or(TerminationCause::LocalHangup, |m| m.cause());
        let hang_up = self.hang_up_with(cause).await?;

        let stem = codec::recording_file_stem(&options.date, &options.number);
        let wav_path = self.config.recordings_dir.join(format!("{stem}.wav"));
        let out_path = self
            .config
            .recordings_dir
            .join(format!("{stem}.{}", self.config.transcoder.extension()));
        codec::write_wav(&wav_path, &capture.audio)?;
        self.config
            .transcoder
            .transcode(&wav_path, &out_path)
            .await?;
        tokio::fs::remove_file(&wav_path).await?;

        info!(
            path = %out_path.display(),
            bytes = capture.audio.len(),
            cause = %cause,
            "recording saved"
        );
        Ok(Recording {
            path: out_path,
            bytes: capture.audio.len(),
            chunks: capture.chunks,
            cause,
            setup,
            hang_up,
        })
    }

    /// Close the link to the modem.
    pub async fn close(mut self) -> Result<()> {
        debug!("closing modem");
        self.channel.close().await
    }

    async fn hang_up_with(&mut self, cause: TerminationCause) -> Result<SequenceReport> {
        self.state = CallState::HangingUp;
        if let Some(call) = self.call.as_mut() {
            call.terminate(cause);
        }
        let result = self.channel.run_sequence(&commands::hang_up_steps()).await;
        self.reset();
        let report = result?;
        if !report.is_clean() {
            warn!(failed = ?report.failed_commands(), "hang-up incomplete");
        }
        info!(cause = %cause, "call ended");
        Ok(report)
    }

    async fn run_setup(&mut self, steps: &[CommandStep]) -> Result<SequenceReport> {
        match self.channel.run_sequence(steps).await {
            Ok(report) => Ok(report),
            Err(e) => {
                self.reset();
                Err(e)
            }
        }
    }

    fn finish_setup(&mut self, report: &SequenceReport, session: CallSession) {
        if report.last_succeeded() {
            info!(direction = ?session.direction, number = ?session.number, "call established");
            self.call = Some(session);
            self.state = CallState::InCall;
        } else {
            warn!(failed = ?report.failed_commands(), "call setup failed");
            self.state = CallState::Idle;
        }
    }

    /// Back to idle; a call in progress is moved to `last_call`.
    fn reset(&mut self) {
        if let Some(call) = self.call.take() {
            self.last_call = Some(call);
        }
        self.caller = None;
        self.state = CallState::Idle;
    }

    fn remember_caller(&mut self, record: CallerIdRecord) -> CallerIdRecord {
        self.caller = Some(record.clone());
        record
    }

    fn require_state(&self, operation: &'static str, allowed: &[CallState]) -> Result<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(Error::InvalidState {
                operation,
                state: self.state,
            })
        }
    }
}

/// A temp file name no other speech request in this process is using.
fn speech_file_path() -> PathBuf {
    let n = SPEECH_FILES.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!("voxmodem-tts-{}-{n}.wav", std::process::id()))
}

/// The number carried by an `NMBR = <number>` caller ID line.
fn parse_caller_number(line: &str) -> Option<String> {
    let start = line.find("NMBR")?;
    let rest = line[start + 4..].trim_start();
    let number = rest.strip_prefix('=').unwrap_or(rest).trim();
    Some(number.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::ModemBuilder;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};
    use voxmodem_at::StepFailure;
    use voxmodem_core::Transport;
    use voxmodem_test_harness::MockTransport;

    /// Transcoder that copies the WAV and records what it was asked to do.
    #[derive(Clone, Default)]
    struct CopyTranscoder {
        calls: Arc<Mutex<Vec<(PathBuf, PathBuf)>>>,
    }

    #[async_trait]
    impl Transcoder for CopyTranscoder {
        fn extension(&self) -> &str {
            "mp3"
        }

        async fn transcode(&self, input: &Path, output: &Path) -> Result<()> {
            tokio::fs::copy(input, output).await?;
            self.calls
                .lock()
                .unwrap()
                .push((input.to_path_buf(), output.to_path_buf()));
            Ok(())
        }
    }

    /// Synthesizer that writes a fixed voice WAV and remembers where.
    #[derive(Clone, Default)]
    struct ToneSynthesizer {
        outputs: Arc<Mutex<Vec<PathBuf>>>,
    }

    #[async_trait]
    impl Synthesizer for ToneSynthesizer {
        async fn synthesize(&self, _phrase: &str, _lang: &str, output: &Path) -> Result<()> {
            self.outputs.lock().unwrap().push(output.to_path_buf());
            codec::write_wav(output, &[0x80; 1500])
        }
    }

    fn expect_init(mock: &mut MockTransport) {
        for (cmd, _) in commands::INIT_SEQUENCE {
            mock.expect_at(cmd, "OK");
        }
    }

    fn expect_ok(mock: &mut MockTransport, steps: &[CommandStep]) {
        for step in steps {
            mock.expect_at(&step.command, &step.expected);
        }
    }

    async fn modem_with(mock: MockTransport) -> Modem {
        ModemBuilder::new()
            .recordings_dir(std::env::temp_dir())
            .build_with_transport(Box::new(mock))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn init_runs_six_commands() {
        let mut mock = MockTransport::new();
        expect_init(&mut mock);
        let modem = modem_with(mock).await;
        assert_eq!(modem.state(), CallState::Idle);
        assert_eq!(modem.mode(), ModemMode::Command);
    }

    #[tokio::test]
    async fn init_echo_mismatch_is_initialization_error() {
        let mut mock = MockTransport::new();
        mock.expect_at("ATE1", "OK");
        mock.expect_at("AT", "OK");
        mock.expect(b"AT&F0\r", b"AT&F1\r\r\nOK\r\n");
        let result = ModemBuilder::new()
            .build_with_transport(Box::new(mock))
            .await;

        match result {
            Err(Error::Initialization(msg)) => {
                assert_eq!(msg, "could not reset to default state");
            }
            Err(e) => panic!("unexpected error: {e}"),
            Ok(_) => panic!("init should fail"),
        }
    }

    #[tokio::test]
    async fn init_transport_failure_is_initialization_error() {
        let mut mock = MockTransport::new();
        mock.set_connected(false);
        let result = ModemBuilder::new()
            .build_with_transport(Box::new(mock))
            .await;
        assert!(matches!(result, Err(Error::Initialization(_))));
    }

    #[tokio::test]
    async fn self_test_passes() {
        let mut mock = MockTransport::new();
        expect_init(&mut mock);
        for cmd in commands::SELF_TEST_SEQUENCE {
            mock.expect_at(cmd, "OK");
        }
        let mut modem = modem_with(mock).await;
        assert!(modem.self_test().await.unwrap());
    }

    #[tokio::test]
    async fn self_test_stops_at_first_failure() {
        let mut mock = MockTransport::new();
        expect_init(&mut mock);
        mock.expect_at("AT", "OK");
        mock.expect_at("AT&F0", "ERROR");
        let mut modem = modem_with(mock).await;

        // No further expectations: a third command would be a mock error.
        assert!(!modem.self_test().await.unwrap());
    }

    #[tokio::test]
    async fn wait_call_returns_number_before_ring_threshold() {
        let mut mock = MockTransport::new();
        expect_init(&mut mock);
        mock.push_inbound(b"\r\nRING\r\n\r\nDATE = 0307\r\nTIME = 0905\r\nNMBR = 5551234\r\n");
        let mut modem = modem_with(mock).await;

        let record = modem.wait_call(4).await.unwrap();
        assert_eq!(record.number, "5551234");
        assert!(record.has_number());
        assert_eq!(modem.state(), CallState::Ringing);
    }

    #[tokio::test]
    async fn wait_call_empty_number_exactly_at_threshold() {
        let mut mock = MockTransport::new();
        expect_init(&mut mock);
        mock.push_inbound(b"RING\r\n\r\nRING\r\n");
        mock.push_inbound(b"RING\r\n");
        mock.push_inbound(b"NMBR = 5551234\r\n");
        let mut modem = modem_with(mock).await;

        let record = modem.wait_call(3).await.unwrap();
        assert_eq!(record.number, "");
        assert!(!record.has_number());
    }

    #[tokio::test(start_paused = true)]
    async fn wait_call_keeps_waiting_through_read_timeouts() {
        let mut mock = MockTransport::new();
        expect_init(&mut mock);
        let mut modem = modem_with(mock).await;

        let waited = tokio::time::timeout(Duration::from_secs(30), modem.wait_call(1)).await;
        assert!(waited.is_err());
        assert_eq!(modem.state(), CallState::Idle);
    }

    #[tokio::test]
    async fn accept_call_enters_in_call() {
        let mut mock = MockTransport::new();
        expect_init(&mut mock);
        mock.push_inbound(b"NMBR = 5551234\r\n");
        expect_ok(&mut mock, &commands::accept_steps());
        let mut modem = modem_with(mock).await;

        modem.wait_call(4).await.unwrap();
        let report = modem.accept_call().await.unwrap();
        assert!(report.is_clean());
        assert_eq!(modem.state(), CallState::InCall);
        let call = modem.current_call().unwrap();
        assert_eq!(call.direction, voxmodem_core::CallDirection::Inbound);
        assert_eq!(call.number.as_deref(), Some("5551234"));
    }

    #[tokio::test]
    async fn accept_runs_every_step_after_failure() {
        let mut mock = MockTransport::new();
        expect_init(&mut mock);
        mock.expect_at("AT+FCLASS=8", "ERROR");
        mock.expect_at("AT+VSM=1,8000,0,0", "OK");
        mock.expect_at("AT+VLS=1", "OK");
        mock.expect_at("ATA", "OK");
        let mut modem = modem_with(mock).await;

        let report = modem.accept_call().await.unwrap();
        assert_eq!(report.attempted, 4);
        assert_eq!(report.failed_commands(), vec!["AT+FCLASS=8"]);
        assert_eq!(modem.state(), CallState::InCall);
    }

    #[tokio::test(start_paused = true)]
    async fn accept_failed_answer_returns_to_idle() {
        let mut mock = MockTransport::new();
        expect_init(&mut mock);
        expect_ok(&mut mock, &commands::voice_setup_steps());
        mock.expect_at("ATA", "NO CARRIER");
        let mut modem = modem_with(mock).await;

        let report = modem.accept_call().await.unwrap();
        assert!(!report.last_succeeded());
        assert_eq!(modem.state(), CallState::Idle);
        assert!(modem.current_call().is_none());
    }

    #[tokio::test]
    async fn dial_places_outbound_call() {
        let mut mock = MockTransport::new();
        expect_init(&mut mock);
        expect_ok(&mut mock, &commands::dial_steps("5551234").unwrap());
        let mut modem = modem_with(mock).await;

        let report = modem.dial("5551234").await.unwrap();
        assert!(report.is_clean());
        assert_eq!(modem.state(), CallState::InCall);
        assert_eq!(
            modem.current_call().unwrap().direction,
            voxmodem_core::CallDirection::Outbound
        );
    }

    #[tokio::test]
    async fn dial_rejects_bad_number_without_sending() {
        let mut mock = MockTransport::new();
        expect_init(&mut mock);
        let mut modem = modem_with(mock).await;

        assert!(matches!(
            modem.dial("555;H").await,
            Err(Error::InvalidParameter(_))
        ));
        assert_eq!(modem.state(), CallState::Idle);
    }

    #[tokio::test]
    async fn dial_while_in_call_is_invalid_state() {
        let mut mock = MockTransport::new();
        expect_init(&mut mock);
        expect_ok(&mut mock, &commands::dial_steps("100").unwrap());
        let mut modem = modem_with(mock).await;

        modem.dial("100").await.unwrap();
        assert!(matches!(
            modem.dial("200").await,
            Err(Error::InvalidState {
                state: CallState::InCall,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn reject_answers_then_hangs_up() {
        let mut mock = MockTransport::new();
        expect_init(&mut mock);
        mock.push_inbound(b"RING\r\n");
        mock.expect_at("ATA", "OK");
        expect_ok(&mut mock, &commands::hang_up_steps());
        let mut modem = modem_with(mock).await;

        modem.wait_call(1).await.unwrap();
        let report = modem.reject_call().await.unwrap();
        assert_eq!(report.attempted, 3);
        assert!(report.is_clean());
        assert_eq!(modem.state(), CallState::Idle);
        assert_eq!(
            modem.last_call().unwrap().termination,
            Some(TerminationCause::LocalHangup)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn hang_up_always_returns_to_idle() {
        let mut mock = MockTransport::new();
        expect_init(&mut mock);
        expect_ok(&mut mock, &commands::dial_steps("100").unwrap());
        mock.expect_at("AT+FCLASS=8", "ERROR");
        mock.expect_write(b"ATH\r");
        let mut modem = modem_with(mock).await;

        modem.dial("100").await.unwrap();
        let report = modem.hang_up().await.unwrap();
        assert_eq!(report.failed_commands(), vec!["AT+FCLASS=8", "ATH"]);
        assert_eq!(modem.state(), CallState::Idle);
        assert!(modem.current_call().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn play_audio_streams_after_vtx() {
        let mut mock = MockTransport::new();
        expect_init(&mut mock);
        mock.expect_at("AT+VTX", "OK");
        mock.expect_write(&[0x80; 1024]);
        mock.expect_write(&[0x80; 1024]);
        mock.expect_write(&[0x80; 452]);
        let mut modem = modem_with(mock).await;

        let mut source = voxmodem_core::MemorySource::voice(vec![0x80; 2500]);
        let playback = modem.play_audio(&mut source, None).await.unwrap();
        assert_eq!(playback.chunks, 3);
        assert_eq!(modem.mode(), ModemMode::VoiceTransmit);
    }

    #[tokio::test(start_paused = true)]
    async fn text_commands_rejected_while_transmitting() {
        let mut mock = MockTransport::new();
        expect_init(&mut mock);
        mock.expect_at("AT+VTX", "OK");
        mock.expect_write(&[0x80; 10]);
        let mut modem = modem_with(mock).await;

        let mut source = voxmodem_core::MemorySource::voice(vec![0x80; 10]);
        modem.play_audio(&mut source, None).await.unwrap();

        let tones: DtmfSequence = "1".parse().unwrap();
        assert!(matches!(
            modem.play_tones(&tones).await,
            Err(Error::InvalidMode { .. })
        ));
        assert!(matches!(
            modem.self_test().await,
            Err(Error::InvalidMode { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn play_tones_waits_one_second_per_tone() {
        let mut mock = MockTransport::new();
        expect_init(&mut mock);
        mock.expect_at("AT+VTS=1,2,#", "OK");
        let mut modem = modem_with(mock).await;

        let tones: DtmfSequence = "12#".parse().unwrap();
        let start = tokio::time::Instant::now();
        assert!(modem.play_tones(&tones).await.unwrap());
        assert_eq!(start.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn tts_plays_synthesized_file_and_removes_it() {
        let mut mock = MockTransport::new();
        expect_init(&mut mock);
        mock.expect_at("AT+VTX", "OK");
        mock.expect_write(&[0x80; 1024]);
        mock.expect_write(&[0x80; 476]);
        let synthesizer = ToneSynthesizer::default();
        let mut modem = ModemBuilder::new()
            .synthesizer(synthesizer.clone())
            .build_with_transport(Box::new(mock))
            .await
            .unwrap();

        let playback = modem.tts_say("hello", "english").await.unwrap();
        assert_eq!(playback.bytes, 1500);
        let outputs = synthesizer.outputs.lock().unwrap();
        assert_eq!(outputs.len(), 1);
        assert!(!outputs[0].exists());
    }

    #[test]
    fn speech_files_are_unique_per_request() {
        let first = speech_file_path();
        let second = speech_file_path();
        assert_ne!(first, second);
        assert_eq!(first.parent(), Some(std::env::temp_dir().as_path()));
    }

    #[tokio::test(start_paused = true)]
    async fn record_stops_at_marker_chunk_and_hangs_up_once() {
        let dir = tempfile::tempdir().unwrap();
        let mut mock = MockTransport::new();
        expect_init(&mut mock);
        mock.push_inbound(b"NMBR = 5551234\r\n");
        expect_ok(&mut mock, &commands::accept_steps());
        expect_ok(&mut mock, &commands::record_setup_steps());
        mock.push_inbound(&[0x80; 1024]);
        mock.push_inbound(&[0x81; 1024]);
        let mut third = vec![0x82; 1024];
        third[500] = 0x10;
        third[501] = 0x03;
        mock.push_inbound(&third);
        expect_ok(&mut mock, &commands::hang_up_steps());

        let transcoder = CopyTranscoder::default();
        let mut modem = ModemBuilder::new()
            .recordings_dir(dir.path())
            .transcoder(transcoder.clone())
            .build_with_transport(Box::new(mock))
            .await
            .unwrap();

        let caller = modem.wait_call(4).await.unwrap();
        modem.accept_call().await.unwrap();
        let date = Local::now();
        let recording = modem
            .record_call(
                RecordOptions::default()
                    .date(date)
                    .number(caller.number.clone()),
            )
            .await
            .unwrap();

        assert_eq!(recording.bytes, 3072);
        assert_eq!(recording.chunks, 3);
        assert_eq!(recording.cause, TerminationCause::HangupByPeer);
        assert!(recording.setup.is_clean());
        assert!(recording.hang_up.is_clean());
        assert_eq!(modem.state(), CallState::Idle);
        assert_eq!(modem.mode(), ModemMode::Command);
        assert_eq!(
            modem.last_call().unwrap().termination,
            Some(TerminationCause::HangupByPeer)
        );

        let stem = codec::recording_file_stem(&date, "5551234");
        assert_eq!(recording.path, dir.path().join(format!("{stem}.mp3")));
        assert!(recording.path.exists());
        assert!(!dir.path().join(format!("{stem}.wav")).exists());
        assert_eq!(transcoder.calls.lock().unwrap().len(), 1);

        // The transcoder copied the WAV verbatim, so the samples can be checked.
        let mut reader = hound::WavReader::open(&recording.path).unwrap();
        let samples: Vec<i8> = reader.samples::<i8>().map(|s| s.unwrap()).collect();
        assert_eq!(samples.len(), 3072);
        assert_eq!(samples[0], 0);
        assert_eq!(samples[2048], 2);
    }

    #[tokio::test(start_paused = true)]
    async fn record_hang_up_sent_exactly_once() {
        let dir = tempfile::tempdir().unwrap();
        let mut mock = MockTransport::new();
        expect_init(&mut mock);
        expect_ok(&mut mock, &commands::record_setup_steps());
        let mut chunk = vec![0x80; 1024];
        chunk[1022] = 0x10;
        chunk[1023] = b's';
        mock.push_inbound(&chunk);
        expect_ok(&mut mock, &commands::hang_up_steps());

        let sent = Arc::new(Mutex::new(None));
        let mut modem = ModemBuilder::new()
            .recordings_dir(dir.path())
            .transcoder(CopyTranscoder::default())
            .build_with_transport(Box::new(SpyTransport {
                inner: mock,
                sent: sent.clone(),
            }))
            .await
            .unwrap();

        let recording = modem.record_call(RecordOptions::default()).await.unwrap();
        assert_eq!(recording.cause, TerminationCause::SilenceTimeout);
        modem.close().await.unwrap();

        let sent = sent.lock().unwrap().take().unwrap();
        assert_eq!(sent.iter().filter(|d| d.as_slice() == b"ATH\r").count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn record_timeout_is_local_hangup() {
        let dir = tempfile::tempdir().unwrap();
        let mut mock = MockTransport::new();
        expect_init(&mut mock);
        expect_ok(&mut mock, &commands::record_setup_steps());
        mock.push_inbound(&[0x80; 1024]);
        expect_ok(&mut mock, &commands::hang_up_steps());
        let mut modem = ModemBuilder::new()
            .recordings_dir(dir.path())
            .transcoder(CopyTranscoder::default())
            .build_with_transport(Box::new(mock))
            .await
            .unwrap();

        let recording = modem
            .record_call(RecordOptions::default().timeout(Duration::from_secs(10)))
            .await
            .unwrap();
        assert_eq!(recording.cause, TerminationCause::LocalHangup);
        assert_eq!(recording.bytes, 1024);
        assert!(recording.hang_up.is_clean());
        assert!(recording
            .path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .ends_with("_unknown.mp3"));
    }

    #[tokio::test(start_paused = true)]
    async fn record_with_failed_vrx_still_captures() {
        let dir = tempfile::tempdir().unwrap();
        let mut mock = MockTransport::new();
        expect_init(&mut mock);
        expect_ok(&mut mock, &commands::voice_setup_steps());
        mock.expect_at("AT+VSD=128,50", "OK");
        mock.expect_at("AT+VRX", "ERROR");
        mock.push_inbound(&[0x10, 0x62]);
        expect_ok(&mut mock, &commands::hang_up_steps());
        let mut modem = ModemBuilder::new()
            .recordings_dir(dir.path())
            .transcoder(CopyTranscoder::default())
            .build_with_transport(Box::new(mock))
            .await
            .unwrap();

        let recording = modem.record_call(RecordOptions::default()).await.unwrap();
        assert_eq!(recording.cause, TerminationCause::Busy);
        assert_eq!(
            recording.setup.failed[0].reason,
            StepFailure::Mismatch
        );
        assert!(recording.hang_up.is_clean());
    }

    #[tokio::test(start_paused = true)]
    async fn record_leaves_audio_after_marker_chunk_unread() {
        let dir = tempfile::tempdir().unwrap();
        let mut mock = MockTransport::new();
        expect_init(&mut mock);
        expect_ok(&mut mock, &commands::record_setup_steps());
        // 2400 bytes in 600-byte reads; the marker lands in the second chunk.
        let mut stream = vec![0x80; 2400];
        stream[1100] = 0x10;
        stream[1101] = 0x03;
        for segment in stream.chunks(600) {
            mock.push_inbound(segment);
        }
        expect_ok(&mut mock, &commands::hang_up_steps());
        let mut modem = ModemBuilder::new()
            .recordings_dir(dir.path())
            .transcoder(CopyTranscoder::default())
            .build_with_transport(Box::new(mock))
            .await
            .unwrap();

        let recording = modem.record_call(RecordOptions::default()).await.unwrap();
        assert_eq!(recording.cause, TerminationCause::HangupByPeer);
        assert_eq!(recording.chunks, 2);
        assert_eq!(recording.bytes, 2048);
        assert!(recording.hang_up.is_clean());
        assert_eq!(modem.mode(), ModemMode::Command);
    }

    #[tokio::test(start_paused = true)]
    async fn record_reports_failed_hang_up_steps() {
        let dir = tempfile::tempdir().unwrap();
        let mut mock = MockTransport::new();
        expect_init(&mut mock);
        expect_ok(&mut mock, &commands::record_setup_steps());
        mock.push_inbound(&[0x10, 0x03]);
        mock.expect_at("AT+FCLASS=8", "OK");
        mock.expect_at("ATH", "ERROR");
        let mut modem = ModemBuilder::new()
            .recordings_dir(dir.path())
            .transcoder(CopyTranscoder::default())
            .build_with_transport(Box::new(mock))
            .await
            .unwrap();

        let recording = modem.record_call(RecordOptions::default()).await.unwrap();
        assert_eq!(recording.hang_up.failed_commands(), vec!["ATH"]);
        assert_eq!(modem.state(), CallState::Idle);
    }

    #[test]
    fn caller_number_parsing() {
        assert_eq!(parse_caller_number("NMBR = 5551234").as_deref(), Some("5551234"));
        assert_eq!(parse_caller_number("NMBR=P").as_deref(), Some("P"));
        assert_eq!(parse_caller_number("RING"), None);
        assert_eq!(parse_caller_number("DATE = 0307"), None);
    }

    /// Transport wrapper that hands the send log back when closed.
    struct SpyTransport {
        inner: MockTransport,
        sent: Arc<Mutex<Option<Vec<Vec<u8>>>>>,
    }

    #[async_trait]
    impl Transport for SpyTransport {
        async fn send(&mut self, data: &[u8]) -> Result<()> {
            self.inner.send(data).await
        }

        async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
            self.inner.receive(buf, timeout).await
        }

        async fn close(&mut self) -> Result<()> {
            *self.sent.lock().unwrap() = Some(self.inner.sent_data().to_vec());
            self.inner.close().await
        }

        fn is_connected(&self) -> bool {
            self.inner.is_connected()
        }
    }
}
