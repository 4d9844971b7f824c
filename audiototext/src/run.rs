use std::fmt;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::RunOptions;
use crate::error::Error;
use crate::job::{SubmitRequest, TranscriptionService};
use crate::store::{Locator, ObjectStore};
use crate::transcript;

/// Where a run is (or was when it stopped).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Uploading,
    Submitted,
    Polling,
    Done,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Uploading => "uploading",
            Stage::Submitted => "submitted",
            Stage::Polling => "polling",
            Stage::Done => "done",
            Stage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Outcome of a run whose transcript matched.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub job_name: String,
    pub media: Locator,
    pub result_uri: String,
    pub transcript: String,
    /// Time spent sleeping between status checks.
    pub waited: Duration,
    /// Status checks that came back pending.
    pub polls: u32,
}

/// A run that stopped early, with the wait accumulated up to that point.
#[derive(Debug, thiserror::Error)]
#[error("transcription failed after {} seconds while {stage}: {source}", .waited.as_secs())]
pub struct RunError {
    /// Last stage reached before the failure.
    pub stage: Stage,
    pub waited: Duration,
    #[source]
    pub source: Error,
}

impl RunError {
    /// The job ran but its transcript differs from the expected text.
    pub fn is_mismatch(&self) -> bool {
        matches!(self.source, Error::Mismatch { .. })
    }
}

/// Tracks the current stage and the accumulated wait so that every exit
/// path can report both.
struct Progress {
    stage: Stage,
    waited: Duration,
    polls: u32,
}

impl Progress {
    fn advance(&mut self, next: Stage) {
        info!(from = %self.stage, to = %next, "stage");
        self.stage = next;
    }

    fn fail(&self, source: Error) -> RunError {
        info!(from = %self.stage, to = %Stage::Failed, "stage");
        RunError {
            stage: self.stage,
            waited: self.waited,
            source,
        }
    }
}

/// Upload the audio, run the transcription job to completion, and compare
/// its transcript with the expected file.
///
/// Every error ends the run immediately; nothing is retried. A transcript
/// that differs from the expected text is reported as [`Error::Mismatch`]
/// inside the returned [`RunError`].
pub async fn run_transcription(
    store: &dyn ObjectStore,
    jobs: &dyn TranscriptionService,
    options: &RunOptions,
) -> Result<RunReport, RunError> {
    let mut progress = Progress {
        stage: Stage::Uploading,
        waited: Duration::ZERO,
        polls: 0,
    };

    options.validate().map_err(|e| progress.fail(e))?;

    let media = store
        .put(&options.audio_file, &options.input_bucket)
        .await
        .map_err(|e| progress.fail(e))?;

    jobs.submit(&SubmitRequest {
        media: &media,
        output_bucket: &options.output_bucket,
        job_name: &options.job_name,
        language_code: &options.language_code,
        media_format: options.media_format,
    })
    .await
    .map_err(|e| progress.fail(e))?;
    progress.advance(Stage::Submitted);

    progress.advance(Stage::Polling);
    loop {
        let status = jobs
            .poll_status(&options.job_name)
            .await
            .map_err(|e| progress.fail(e))?;
        if status.is_terminal() {
            status
                .into_result(&options.job_name)
                .map_err(|e| progress.fail(e))?;
            break;
        }

        if options.max_polls.is_some_and(|max| progress.polls >= max) {
            return Err(progress.fail(Error::PollLimit {
                polls: progress.polls,
            }));
        }

        progress.polls += 1;
        debug!(
            job = %options.job_name,
            polls = progress.polls,
            waited_secs = progress.waited.as_secs(),
            "job pending"
        );
        tokio::time::sleep(options.poll_interval).await;
        progress.waited += options.poll_interval;
    }
    progress.advance(Stage::Done);
    info!(
        job = %options.job_name,
        waited_secs = progress.waited.as_secs(),
        "transcription job completed"
    );

    let result_uri = jobs
        .result_location(&options.job_name)
        .await
        .map_err(|e| progress.fail(e))?;
    let result = Locator::parse(&result_uri).map_err(|e| progress.fail(e))?;
    if result.bucket != options.output_bucket {
        warn!(
            expected = %options.output_bucket,
            actual = %result.bucket,
            object = result.file_name(),
            "transcript reported outside the output bucket"
        );
    }

    let body = store
        .get(&options.output_bucket, &result.key)
        .await
        .map_err(|e| progress.fail(e))?;
    let text = transcript::extract_text(&body).map_err(|e| progress.fail(e))?;
    let expected = transcript::read_expected(&options.expected_file)
        .await
        .map_err(|e| progress.fail(e))?;
    transcript::compare(&text, &expected).map_err(|e| progress.fail(e))?;

    Ok(RunReport {
        job_name: options.job_name.clone(),
        media,
        result_uri,
        transcript: text,
        waited: progress.waited,
        polls: progress.polls,
    })
}
