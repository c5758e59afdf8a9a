// voxmodem command-line tool -- answer, reject, dial, play and record calls
// on a CX93001 voice modem.
//
// Usage:
//   voxmodem-cli --port /dev/ttyACM0 self-test
//   voxmodem-cli wait --rings 4
//   voxmodem-cli --recordings ~/calls answer --greeting greeting.wav --record
//   voxmodem-cli reject
//   voxmodem-cli dial 5551234 --tones 1234# --record --max-duration 300
//   voxmodem-cli play greeting.wav --limit 10
//   voxmodem-cli tones 1234#
//   voxmodem-cli say "Please leave a message" --lang english
//
// `play`, `tones` and `say` wait for the next incoming call, answer it,
// perform the action and hang up. Ctrl-C stops any operation; a call in
// progress is hung up before exiting.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use voxmodem::at::SequenceReport;
use voxmodem::cx93001::{DEFAULT_MAX_RINGS, Modem, ModemBuilder, Playback, RecordOptions};
use voxmodem::transport::DEFAULT_BAUD_RATE;
use voxmodem::{CallState, CallerIdRecord, DtmfSequence};

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// voxmodem command-line tool -- drives a voice modem from the shell.
#[derive(Parser)]
#[command(name = "voxmodem-cli", version, about)]
struct Cli {
    /// Serial port path (e.g. /dev/ttyACM0, COM3).
    #[arg(long, default_value = "/dev/ttyACM0")]
    port: String,

    /// Serial baud rate.
    #[arg(long, default_value_t = DEFAULT_BAUD_RATE)]
    baud: u32,

    /// Per-read timeout in seconds.
    #[arg(long, default_value_t = 3.0)]
    timeout: f64,

    /// Directory recordings are written to.
    #[arg(long, default_value = ".")]
    recordings: PathBuf,

    /// Detect end-of-call markers split across read chunks.
    #[arg(long)]
    marker_lookback: bool,

    /// Enable debug logging (overridden by RUST_LOG).
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check that the modem answers the basic command set.
    SelfTest,

    /// Wait for an incoming call and print its caller ID.
    Wait {
        /// Rings to wait for caller ID before giving up on it.
        #[arg(long, default_value_t = DEFAULT_MAX_RINGS)]
        rings: u32,
    },

    /// Answer the next incoming call.
    Answer {
        /// Rings to wait for caller ID before giving up on it.
        #[arg(long, default_value_t = DEFAULT_MAX_RINGS)]
        rings: u32,
        /// WAV file (8-bit unsigned mono 8000 Hz) to play after answering.
        #[arg(long)]
        greeting: Option<PathBuf>,
        /// Record the call until the caller hangs up.
        #[arg(long)]
        record: bool,
        /// Maximum recording length in seconds.
        #[arg(long, default_value_t = 7200)]
        max_duration: u64,
    },

    /// Reject the next incoming call.
    Reject {
        /// Rings to wait for caller ID before giving up on it.
        #[arg(long, default_value_t = DEFAULT_MAX_RINGS)]
        rings: u32,
    },

    /// Call a number.
    Dial {
        /// Number to dial.
        number: String,
        /// DTMF tones to send once connected.
        #[arg(long)]
        tones: Option<String>,
        /// WAV file to play once connected.
        #[arg(long)]
        play: Option<PathBuf>,
        /// Record the call until the other side hangs up.
        #[arg(long)]
        record: bool,
        /// Maximum recording length in seconds.
        #[arg(long, default_value_t = 7200)]
        max_duration: u64,
    },

    /// Answer the next call, play a WAV file and hang up.
    Play {
        /// WAV file (8-bit unsigned mono 8000 Hz).
        file: PathBuf,
        /// Stop playback after this many seconds.
        #[arg(long)]
        limit: Option<f64>,
    },

    /// Answer the next call, play DTMF tones and hang up.
    Tones {
        /// Tone symbols: 0-9, *, #, A-D.
        sequence: String,
    },

    /// Answer the next call, speak a phrase and hang up.
    Say {
        /// Text to speak.
        phrase: String,
        /// espeak voice/language.
        #[arg(long, default_value = "english")]
        lang: String,
    },
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn seconds(value: f64, what: &str) -> Result<Duration> {
    Duration::try_from_secs_f64(value).with_context(|| format!("invalid {what}: {value}"))
}

async fn open_modem(cli: &Cli) -> Result<Modem> {
    let modem = ModemBuilder::new()
        .serial_port(&cli.port)
        .baud_rate(cli.baud)
        .read_timeout(seconds(cli.timeout, "--timeout")?)
        .recordings_dir(&cli.recordings)
        .marker_lookback(cli.marker_lookback)
        .build()
        .await
        .with_context(|| format!("failed to open modem on {}", cli.port))?;
    info!(port = %cli.port, baud = cli.baud, "modem ready");
    Ok(modem)
}

fn print_caller(caller: &CallerIdRecord) {
    let number = if caller.has_number() {
        caller.number.as_str()
    } else {
        "(no caller ID)"
    };
    println!("  Time:           {}", caller.timestamp.format("%d-%m-%Y %H:%M:%S"));
    println!("  Number:         {number}");
}

fn print_report(what: &str, report: &SequenceReport) {
    if report.is_clean() {
        println!("  {what:<16}ok");
    } else {
        println!(
            "  {what:<16}{} of {} steps failed: {}",
            report.failed.len(),
            report.attempted,
            report.failed_commands().join(", ")
        );
    }
}

fn print_playback(playback: &Playback) {
    println!(
        "  Played:         {} bytes in {:.1} s{}",
        playback.bytes,
        playback.elapsed.as_secs_f64(),
        if playback.completed { "" } else { " (cut short)" }
    );
}

/// Wait for a call and answer it; fails if the modem did not pick up.
async fn answer_next(modem: &mut Modem, rings: u32) -> Result<CallerIdRecord> {
    println!("Waiting for a call...");
    let caller = modem.wait_call(rings).await?;
    print_caller(&caller);
    let report = modem.accept_call().await?;
    print_report("Answer:", &report);
    if modem.state() != CallState::InCall {
        bail!("modem did not answer the call");
    }
    Ok(caller)
}

async fn record(modem: &mut Modem, number: &str, max_duration: u64) -> Result<()> {
    println!("Recording...");
    let recording = modem
        .record_call(
            RecordOptions::default()
                .number(number)
                .timeout(Duration::from_secs(max_duration)),
        )
        .await
        .context("recording failed")?;
    println!("  File:           {}", recording.path.display());
    println!("  Samples:        {} bytes", recording.bytes);
    println!("  Ended by:       {}", recording.cause);
    if !recording.setup.is_clean() {
        print_report("Record setup:", &recording.setup);
    }
    print_report("Hang up:", &recording.hang_up);
    Ok(())
}

// ---------------------------------------------------------------------------
// Command implementations
// ---------------------------------------------------------------------------

async fn cmd_self_test(modem: &mut Modem) -> Result<()> {
    if modem.self_test().await? {
        println!("Self test passed");
        Ok(())
    } else {
        bail!("self test failed")
    }
}

async fn cmd_wait(modem: &mut Modem, rings: u32) -> Result<()> {
    println!("Waiting for a call...");
    let caller = modem.wait_call(rings).await?;
    print_caller(&caller);
    Ok(())
}

async fn cmd_answer(
    modem: &mut Modem,
    rings: u32,
    greeting: Option<&Path>,
    record_call: bool,
    max_duration: u64,
) -> Result<()> {
    let caller = answer_next(modem, rings).await?;
    if let Some(path) = greeting {
        let playback = modem
            .play_audio_file(path, None)
            .await
            .with_context(|| format!("failed to play {}", path.display()))?;
        print_playback(&playback);
    }
    if record_call {
        let number = if caller.has_number() {
            caller.number.as_str()
        } else {
            voxmodem::cx93001::modem::UNKNOWN_NUMBER
        };
        record(modem, number, max_duration).await
    } else {
        print_report("Hang up:", &modem.hang_up().await?);
        Ok(())
    }
}

async fn cmd_reject(modem: &mut Modem, rings: u32) -> Result<()> {
    println!("Waiting for a call...");
    let caller = modem.wait_call(rings).await?;
    print_caller(&caller);
    print_report("Reject:", &modem.reject_call().await?);
    Ok(())
}

async fn cmd_dial(
    modem: &mut Modem,
    number: &str,
    tones: Option<&DtmfSequence>,
    play: Option<&Path>,
    record_call: bool,
    max_duration: u64,
) -> Result<()> {
    println!("Dialing {number}...");
    let report = modem.dial(number).await?;
    print_report("Dial:", &report);
    if modem.state() != CallState::InCall {
        bail!("call to {number} was not established");
    }
    if let Some(tones) = tones {
        let ok = modem.play_tones(tones).await?;
        println!("  Tones:          {tones}{}", if ok { "" } else { " (not confirmed)" });
    }
    if let Some(path) = play {
        let playback = modem
            .play_audio_file(path, None)
            .await
            .with_context(|| format!("failed to play {}", path.display()))?;
        print_playback(&playback);
    }
    if record_call {
        record(modem, number, max_duration).await
    } else {
        print_report("Hang up:", &modem.hang_up().await?);
        Ok(())
    }
}

async fn cmd_play(modem: &mut Modem, file: &Path, limit: Option<Duration>) -> Result<()> {
    answer_next(modem, DEFAULT_MAX_RINGS).await?;
    let playback = modem
        .play_audio_file(file, limit)
        .await
        .with_context(|| format!("failed to play {}", file.display()))?;
    print_playback(&playback);
    print_report("Hang up:", &modem.hang_up().await?);
    Ok(())
}

async fn cmd_tones(modem: &mut Modem, sequence: &DtmfSequence) -> Result<()> {
    answer_next(modem, DEFAULT_MAX_RINGS).await?;
    let ok = modem.play_tones(sequence).await?;
    println!("  Tones:          {sequence}{}", if ok { "" } else { " (not confirmed)" });
    print_report("Hang up:", &modem.hang_up().await?);
    Ok(())
}

async fn cmd_say(modem: &mut Modem, phrase: &str, lang: &str) -> Result<()> {
    answer_next(modem, DEFAULT_MAX_RINGS).await?;
    let playback = modem
        .tts_say(phrase, lang)
        .await
        .context("speech synthesis failed")?;
    print_playback(&playback);
    print_report("Hang up:", &modem.hang_up().await?);
    Ok(())
}

async fn run(cli: &Cli, modem: &mut Modem) -> Result<()> {
    match &cli.command {
        Command::SelfTest => cmd_self_test(modem).await,
        Command::Wait { rings } => cmd_wait(modem, *rings).await,
        Command::Answer {
            rings,
            greeting,
            record,
            max_duration,
        } => cmd_answer(modem, *rings, greeting.as_deref(), *record, *max_duration).await,
        Command::Reject { rings } => cmd_reject(modem, *rings).await,
        Command::Dial {
            number,
            tones,
            play,
            record,
            max_duration,
        } => {
            let tones = tones
                .as_deref()
                .map(str::parse::<DtmfSequence>)
                .transpose()
                .context("invalid --tones")?;
            cmd_dial(
                modem,
                number,
                tones.as_ref(),
                play.as_deref(),
                *record,
                *max_duration,
            )
            .await
        }
        Command::Play { file, limit } => {
            let limit = limit.map(|l| seconds(l, "--limit")).transpose()?;
            cmd_play(modem, file, limit).await
        }
        Command::Tones { sequence } => {
            let sequence: DtmfSequence = sequence.parse().context("invalid tone sequence")?;
            cmd_tones(modem, &sequence).await
        }
        Command::Say { phrase, lang } => cmd_say(modem, phrase, lang).await,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut modem = open_modem(&cli).await?;

    let result = tokio::select! {
        result = run(&cli, &mut modem) => result,
        _ = tokio::signal::ctrl_c() => {
            println!("Interrupted");
            Ok(())
        }
    };

    if modem.state() != CallState::Idle {
        debug!(state = %modem.state(), "hanging up before exit");
        modem.hang_up().await.ok();
    }
    modem.close().await.ok();
    result
}
