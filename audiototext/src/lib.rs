//! Cloud transcription check — audio file in, verified transcript out.
//!
//! **audiototext** uploads an audio file to S3, starts an Amazon Transcribe
//! job on it, polls until the job finishes, downloads the transcript JSON,
//! and compares the text with an expected-results file.
//!
//! # Quick start
//!
//! ```rust,no_run
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use audiototext::{aws, RunOptions};
//!
//! let clients = aws::connect(None).await;
//! let options = RunOptions::new("FourScore.wav", "FourScoreResult.txt", "my-input", "my-output");
//!
//! let report = audiototext::run_transcription(&clients.store, &clients.jobs, &options).await?;
//! println!("matched after waiting {}s", report.waited.as_secs());
//! # Ok(())
//! # }
//! ```
//!
//! The services sit behind the [`ObjectStore`], [`TranscriptionService`] and
//! [`BucketLifecycle`] traits; the `aws` feature (on by default) provides
//! the SDK-backed implementations.

pub mod config;
pub mod error;
pub mod job;
pub mod lifecycle;
pub mod run;
pub mod store;
pub mod transcript;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{HarnessConfig, LanguageCode, MediaFormat, ResolvedHarness, RunOptions};
pub use error::{Error, Result};
pub use job::{JobStatus, TranscriptionService};
pub use lifecycle::BucketLifecycle;
pub use run::{run_transcription, RunError, RunReport, Stage};
pub use store::{Locator, ObjectStore};
pub use transcript::TranscriptResults;

/// Clients for the real AWS services.
#[cfg(feature = "aws")]
pub mod aws {
    use aws_config::{BehaviorVersion, Region};

    use crate::job::TranscribeService;
    use crate::lifecycle::S3Buckets;
    use crate::store::S3Store;

    /// Everything a run needs, sharing one AWS configuration.
    #[derive(Debug, Clone)]
    pub struct Clients {
        pub store: S3Store,
        pub jobs: TranscribeService,
        pub buckets: S3Buckets,
        /// Region the clients resolved to, if any.
        pub region: Option<String>,
    }

    /// Load credentials and region from the usual AWS sources (environment,
    /// shared config files, instance metadata). `region` overrides the
    /// configured region.
    pub async fn connect(region: Option<String>) -> Clients {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(Region::new(region));
        }
        let shared = loader.load().await;

        let s3 = aws_sdk_s3::Client::new(&shared);
        Clients {
            store: S3Store::new(s3.clone()),
            jobs: TranscribeService::new(aws_sdk_transcribe::Client::new(&shared)),
            buckets: S3Buckets::new(s3),
            region: shared.region().map(|r| r.to_string()),
        }
    }
}
