//! Print the word timings of a finished transcript.
//!
//! Usage: cargo run --example words -- <output-bucket> <job-name>

use audiototext::{aws, ObjectStore, TranscriptResults, TranscriptionService};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let (Some(bucket), Some(job)) = (args.next(), args.next()) else {
        return Err("usage: words <output-bucket> <job-name>".into());
    };

    let clients = aws::connect(None).await;
    let uri = clients.jobs.result_location(&job).await?;
    let locator = audiototext::Locator::parse(&uri)?;
    let body = clients.store.get(&bucket, &locator.key).await?;
    let transcript = TranscriptResults::from_slice(&body)?;

    println!("{}", transcript.text()?);
    for word in transcript.words() {
        match (word.start, word.end) {
            (Some(start), Some(end)) => println!(
                "[{start:.2}s - {end:.2}s] {} (p={:.2})",
                word.content,
                word.confidence.unwrap_or_default()
            ),
            _ => println!("                  {}", word.content),
        }
    }

    Ok(())
}
