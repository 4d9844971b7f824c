use std::path::PathBuf;

/// All errors that can occur in audiototext.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("upload failed: {0}")]
    Upload(String),

    #[error("transfer failed: {0}")]
    Transfer(String),

    #[error("object not found: s3://{bucket}/{key}")]
    NotFound { bucket: String, key: String },

    #[error("job submission failed: {0}")]
    Submission(String),

    #[error("transcription service error: {0}")]
    Service(String),

    #[error("transcription job {job} failed: {}", .reason.as_deref().unwrap_or("no reason given"))]
    JobFailed { job: String, reason: Option<String> },

    #[error("no transcript location for job {0}")]
    MissingResult(String),

    #[error("invalid locator: {0}")]
    InvalidLocator(String),

    #[error("malformed transcript: {0}")]
    Parse(String),

    #[error("transcript contains no transcripts")]
    EmptyTranscript,

    #[error("Did NOT get the expected results. Got: '{got}' instead of: '{expected}'")]
    Mismatch { got: String, expected: String },

    #[error("job still pending after {polls} status checks")]
    PollLimit { polls: u32 },

    #[error("invalid option: {0}")]
    InvalidOption(String),

    #[error("bucket operation failed: {0}")]
    Bucket(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
