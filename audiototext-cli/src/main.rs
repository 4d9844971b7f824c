use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;

use audiototext::{aws, lifecycle, HarnessConfig, MediaFormat, RunOptions};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};

#[derive(Parser)]
#[command(
    name = "audiototext",
    about = "Transcribe an audio file with Amazon Transcribe and check the result"
)]
struct Cli {
    /// Bucket the audio file is uploaded to.
    #[arg(short, long)]
    input_bucket: Option<String>,

    /// Bucket the transcription service writes its transcript to.
    #[arg(short, long)]
    output_bucket: Option<String>,

    /// The file containing the audio.
    #[arg(short, long)]
    audio_file: Option<PathBuf>,

    /// File containing the expected transcript.
    #[arg(short = 'f', long)]
    result_file: Option<PathBuf>,

    /// Seconds to sleep between checks of whether the job is done.
    #[arg(short, long)]
    sleep_seconds: Option<u64>,

    /// Name of the transcription job.
    #[arg(short, long)]
    job_name: Option<String>,

    /// Language code of the audio (e.g. "en-US"), or "auto" to identify it.
    #[arg(long, default_value = "en-US")]
    language_code: String,

    /// Media format (default: from the audio file extension, else wav).
    #[arg(long)]
    media_format: Option<String>,

    /// Give up after this many pending status checks.
    #[arg(long)]
    max_polls: Option<u32>,

    /// AWS region (default: from the AWS configuration).
    #[arg(long)]
    region: Option<String>,

    /// Append a timestamp to the job name so reruns don't collide.
    #[arg(long)]
    unique_job_name: bool,

    /// Create buckets that don't come from the flags or config, and delete
    /// them when done.
    #[arg(long)]
    create_buckets: bool,

    /// JSON settings file (InputBucket, OutputBucket, AudioFile, ...).
    /// Flags override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Enable debug logging.
    #[arg(short, long)]
    debug: bool,
}

fn fail(msg: impl std::fmt::Display) -> ! {
    eprintln!("Error: {msg}");
    std::process::exit(1);
}

const DEFAULT_AUDIO_FILE: &str = "FourScore.wav";
const DEFAULT_RESULT_FILE: &str = "FourScoreResult.txt";

/// Log writer that hides the spinner while a line is printed.
#[derive(Clone)]
struct SpinnerWriter(ProgressBar);

impl Write for SpinnerWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.suspend(|| io::stderr().write(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()
    }
}

/// Merge flags over the settings file. `env` supplies the environment
/// fallbacks, which win over the built-in file defaults.
fn settings(cli: &Cli, env: impl Fn(&str) -> Option<String>) -> HarnessConfig {
    let mut cfg = match &cli.config {
        Some(path) => HarnessConfig::from_file(path).unwrap_or_else(|e| fail(e)),
        None => HarnessConfig::default(),
    };

    if let Some(bucket) = &cli.input_bucket {
        cfg.input_bucket = bucket.clone();
    }
    if let Some(bucket) = &cli.output_bucket {
        cfg.output_bucket = bucket.clone();
    }
    if let Some(path) = &cli.audio_file {
        cfg.audio_file = path.to_string_lossy().into_owned();
    }
    if let Some(path) = &cli.result_file {
        cfg.result_file = path.to_string_lossy().into_owned();
    }
    if let Some(secs) = cli.sleep_seconds {
        cfg.sleep_seconds = Some(secs);
    }
    if let Some(name) = &cli.job_name {
        cfg.job_name = name.clone();
    }
    cfg.debug |= cli.debug;

    let unset = |var: &str| env(var).is_none_or(|v| v.is_empty());
    if cfg.audio_file.is_empty() && unset("AUDIO_FILE") {
        cfg.audio_file = DEFAULT_AUDIO_FILE.into();
    }
    if cfg.result_file.is_empty() && unset("RESULTS_FILE") {
        cfg.result_file = DEFAULT_RESULT_FILE.into();
    }
    cfg
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let cfg = settings(&cli, |name| std::env::var(name).ok());
    let spinner = ProgressBar::new_spinner();
    let log_writer = SpinnerWriter(spinner.clone());

    let level = if cfg.debug { "audiototext=debug" } else { "audiototext=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(level.parse().unwrap_or_else(|e| fail(e))),
        )
        .with_writer(move || log_writer.clone())
        .init();

    let resolved = cfg.resolve().unwrap_or_else(|e| fail(e));
    if !resolved.owned_buckets.is_empty() && !cli.create_buckets {
        eprintln!("You must supply a value for the input bucket and the output bucket");
        eprintln!("(-i/-o, InputBucket/OutputBucket in --config, INPUT_BUCKET/OUTPUT_BUCKET),");
        eprintln!("or pass --create-buckets to use temporary ones");
        std::process::exit(1);
    }

    let mut opts: RunOptions = resolved
        .options
        .language_code(&cli.language_code)
        .unwrap_or_else(|e| fail(e));

    if let Some(name) = &cli.media_format {
        match MediaFormat::parse_name(name) {
            Some(format) => opts = opts.media_format(format),
            None => fail(format!(
                "unknown media format \"{name}\" (amr, flac, m4a, mp3, mp4, ogg, wav, webm)"
            )),
        }
    }
    if let Some(max) = cli.max_polls {
        opts = opts.max_polls(max);
    }
    if cli.unique_job_name {
        opts = opts.timestamped(&chrono::Local::now());
    }
    if let Err(e) = opts.validate() {
        fail(e);
    }

    let clients = aws::connect(cli.region.clone()).await;
    if let Err(e) = lifecycle::provision(&clients.buckets, &resolved.owned_buckets).await {
        fail(e);
    }

    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(format!(
        "transcribing {} as job {}",
        opts.audio_file.display(),
        opts.job_name
    ));
    spinner.enable_steady_tick(Duration::from_millis(120));

    let outcome = audiototext::run_transcription(&clients.store, &clients.jobs, &opts).await;
    spinner.finish_and_clear();

    let leftover = lifecycle::cleanup(&clients.buckets, &resolved.owned_buckets).await;
    for bucket in &leftover {
        eprintln!("You'll have to delete bucket {bucket} yourself");
    }

    match outcome {
        Ok(report) => {
            println!(
                "Transcription was successful after waiting {} seconds",
                report.waited.as_secs()
            );
        }
        Err(e) => {
            println!(
                "Transcription failed after {} seconds with error:",
                e.waited.as_secs()
            );
            println!("{}", e.source);
            std::process::exit(1);
        }
    }
}
