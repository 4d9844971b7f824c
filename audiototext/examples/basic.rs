//! Transcribe a local audio file and check it against the expected text.
//!
//! Usage: cargo run --example basic -- <audio-file> <expected-file> <input-bucket> <output-bucket>

use std::time::Duration;

use audiototext::{aws, RunOptions};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let usage = "usage: basic <audio-file> <expected-file> <input-bucket> <output-bucket>";
    let (Some(audio), Some(expected), Some(input), Some(output)) =
        (args.next(), args.next(), args.next(), args.next())
    else {
        return Err(usage.into());
    };

    let opts = RunOptions::new(audio, expected, input, output)
        .timestamped(&chrono::Local::now())
        .poll_interval(Duration::from_secs(5));

    let clients = aws::connect(None).await;
    let report = audiototext::run_transcription(&clients.store, &clients.jobs, &opts).await?;

    println!("{}", report.transcript);
    println!("(waited {}s over {} checks)", report.waited.as_secs(), report.polls);

    Ok(())
}
