use async_trait::async_trait;

use crate::config::{LanguageCode, MediaFormat};
use crate::error::{Error, Result};
use crate::store::Locator;

/// Progress of a transcription job as seen by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    /// Queued, running, or not listed yet.
    Pending,
    /// Transcript is ready.
    Done,
    /// Terminal failure reported by the service.
    Failed { reason: Option<String> },
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Pending)
    }

    /// Turn a reported failure into [`Error::JobFailed`].
    pub fn into_result(self, job_name: &str) -> Result<JobStatus> {
        match self {
            JobStatus::Failed { reason } => Err(Error::JobFailed {
                job: job_name.to_string(),
                reason,
            }),
            status => Ok(status),
        }
    }
}

/// Raw job state as the service spells it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteState {
    Queued,
    InProgress,
    Completed,
    Failed,
    Other(String),
}

/// One entry of a job listing.
#[derive(Debug, Clone, Default)]
pub struct JobSummary {
    pub name: Option<String>,
    pub state: Option<RemoteState>,
    pub failure_reason: Option<String>,
}

/// Pick the summary for `job_name` out of a name-contains listing and
/// classify it.
///
/// An exact name match wins; otherwise the first summary is used. An empty
/// listing or a summary without a state means the job is not visible yet.
pub fn classify_summaries(job_name: &str, summaries: &[JobSummary]) -> JobStatus {
    let summary = summaries
        .iter()
        .find(|s| s.name.as_deref() == Some(job_name))
        .or_else(|| summaries.first());

    let Some(summary) = summary else {
        return JobStatus::Pending;
    };

    match &summary.state {
        Some(RemoteState::Completed) => JobStatus::Done,
        Some(RemoteState::Failed) => JobStatus::Failed {
            reason: summary.failure_reason.clone(),
        },
        Some(RemoteState::Queued | RemoteState::InProgress | RemoteState::Other(_)) | None => {
            JobStatus::Pending
        }
    }
}

/// Parameters of a new transcription job.
#[derive(Debug, Clone)]
pub struct SubmitRequest<'a> {
    pub media: &'a Locator,
    pub output_bucket: &'a str,
    pub job_name: &'a str,
    pub language_code: &'a LanguageCode,
    pub media_format: MediaFormat,
}

/// A batch speech-to-text service.
#[async_trait]
pub trait TranscriptionService: Send + Sync {
    /// Start a job. Returns as soon as the service accepted it.
    async fn submit(&self, request: &SubmitRequest<'_>) -> Result<()>;

    /// Current status of the job. A job the service does not list yet is
    /// [`JobStatus::Pending`].
    async fn poll_status(&self, job_name: &str) -> Result<JobStatus>;

    /// URI of the finished transcript. Only meaningful once the job is done.
    async fn result_location(&self, job_name: &str) -> Result<String>;
}

#[cfg(feature = "aws")]
pub use self::transcribe::TranscribeService;

#[cfg(feature = "aws")]
mod transcribe {
    use async_trait::async_trait;
    use aws_sdk_transcribe::error::DisplayErrorContext;
    use aws_sdk_transcribe::types::{
        LanguageCode, Media, MediaFormat, TranscriptionJobStatus, TranscriptionJobSummary,
    };
    use tracing::{debug, info};

    use super::{classify_summaries, JobStatus, JobSummary, RemoteState, SubmitRequest, TranscriptionService};
    use crate::error::{Error, Result};

    /// Enough to find an exact match among similarly named jobs.
    const LIST_PAGE_SIZE: i32 = 100;

    /// [`TranscriptionService`] backed by Amazon Transcribe.
    #[derive(Debug, Clone)]
    pub struct TranscribeService {
        client: aws_sdk_transcribe::Client,
    }

    impl TranscribeService {
        pub fn new(client: aws_sdk_transcribe::Client) -> Self {
            Self { client }
        }
    }

    impl From<&TranscriptionJobSummary> for JobSummary {
        fn from(summary: &TranscriptionJobSummary) -> Self {
            let state = summary.transcription_job_status().map(|status| match status {
                TranscriptionJobStatus::Queued => RemoteState::Queued,
                TranscriptionJobStatus::InProgress => RemoteState::InProgress,
                TranscriptionJobStatus::Completed => RemoteState::Completed,
                TranscriptionJobStatus::Failed => RemoteState::Failed,
                other => RemoteState::Other(other.as_str().to_string()),
            });
            JobSummary {
                name: summary.transcription_job_name().map(str::to_string),
                state,
                failure_reason: summary.failure_reason().map(str::to_string),
            }
        }
    }

    #[async_trait]
    impl TranscriptionService for TranscribeService {
        async fn submit(&self, request: &SubmitRequest<'_>) -> Result<()> {
            let media = Media::builder()
                .media_file_uri(request.media.to_string())
                .build();

            let builder = self
                .client
                .start_transcription_job()
                .transcription_job_name(request.job_name)
                .media(media)
                .media_format(MediaFormat::from(request.media_format.as_str()))
                .output_bucket_name(request.output_bucket);

            let builder = match request.language_code.code() {
                Some(code) => builder.language_code(LanguageCode::from(code)),
                None => builder.identify_language(true),
            };

            builder.send().await.map_err(|e| {
                Error::Submission(format!("{}: {}", request.job_name, DisplayErrorContext(&e)))
            })?;

            info!(job = request.job_name, media = %request.media, "transcription job submitted");
            Ok(())
        }

        async fn poll_status(&self, job_name: &str) -> Result<JobStatus> {
            let output = self
                .client
                .list_transcription_jobs()
                .job_name_contains(job_name)
                .max_results(LIST_PAGE_SIZE)
                .send()
                .await
                .map_err(|e| Error::Service(format!("listing jobs: {}", DisplayErrorContext(&e))))?;

            let summaries: Vec<JobSummary> = output
                .transcription_job_summaries()
                .iter()
                .map(JobSummary::from)
                .collect();
            debug!(job = job_name, listed = summaries.len(), "job listing");

            classify_summaries(job_name, &summaries).into_result(job_name)
        }

        async fn result_location(&self, job_name: &str) -> Result<String> {
            let output = self
                .client
                .get_transcription_job()
                .transcription_job_name(job_name)
                .send()
                .await
                .map_err(|e| Error::Service(format!("{job_name}: {}", DisplayErrorContext(&e))))?;

            output
                .transcription_job()
                .and_then(|job| job.transcript())
                .and_then(|transcript| transcript.transcript_file_uri())
                .map(str::to_string)
                .ok_or_else(|| Error::MissingResult(job_name.to_string()))
        }
    }
}
