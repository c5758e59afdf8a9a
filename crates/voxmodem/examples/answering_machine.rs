//! Answer every incoming call, play a greeting, and record the message.
//!
//! Usage:
//!   cargo run --example answering_machine -- /dev/ttyACM0 greeting.wav

use std::time::Duration;

use voxmodem::cx93001::{ModemBuilder, RecordOptions, DEFAULT_MAX_RINGS};

const SERIAL_PORT: &str = "/dev/ttyACM0";
const MAX_MESSAGE: Duration = Duration::from_secs(120);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut args = std::env::args().skip(1);
    let port = args.next().unwrap_or_else(|| SERIAL_PORT.to_string());
    let greeting = args.next();

    let mut modem = ModemBuilder::new().serial_port(&port).build().await?;
    println!("Waiting for calls on {port}...");

    loop {
        let caller = modem.wait_call(DEFAULT_MAX_RINGS).await?;
        let number = if caller.has_number() {
            caller.number.clone()
        } else {
            "unknown".to_string()
        };
        println!("Call from {number} at {}", caller.timestamp.format("%H:%M:%S"));

        let report = modem.accept_call().await?;
        if !report.last_succeeded() {
            println!("  could not answer: {:?}", report.failed_commands());
            continue;
        }

        if let Some(path) = &greeting {
            modem.play_audio_file(path, None).await?;
        }

        let recording = modem
            .record_call(
                RecordOptions::default()
                    .date(caller.timestamp)
                    .number(number)
                    .timeout(MAX_MESSAGE),
            )
            .await?;
        println!(
            "  saved {} ({} bytes, {})",
            recording.path.display(),
            recording.bytes,
            recording.cause
        );
    }
}
