//! In-memory stand-ins for the cloud services, used by unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::job::{JobStatus, SubmitRequest, TranscriptionService};
use crate::lifecycle::BucketLifecycle;
use crate::store::{Locator, ObjectStore};

#[derive(Default)]
pub struct MemoryStore {
    objects: Mutex<HashMap<(String, String), Vec<u8>>>,
}

impl MemoryStore {
    pub fn insert(&self, bucket: &str, key: &str, body: Vec<u8>) {
        self.objects
            .lock()
            .unwrap()
            .insert((bucket.to_string(), key.to_string()), body);
    }

    pub fn is_empty(&self) -> bool {
        self.objects.lock().unwrap().is_empty()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn upload(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<Locator> {
        self.insert(bucket, key, body);
        Ok(Locator::new(bucket, key))
    }

    async fn download(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        self.objects
            .lock()
            .unwrap()
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
            .ok_or_else(|| Error::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })
    }
}

/// What a [`ScriptedJobs`] was asked to start.
#[derive(Debug, Clone)]
pub struct Submission {
    pub job_name: String,
    pub media: String,
    pub output_bucket: String,
    pub language_code: String,
    pub media_format: String,
}

/// Answers status checks from a script. The last entry repeats once the
/// script runs out.
pub struct ScriptedJobs {
    script: Mutex<VecDeque<JobStatus>>,
    result_uri: String,
    submissions: Mutex<Vec<Submission>>,
    polls: Mutex<u32>,
    raise_failures: bool,
    reject_submissions: bool,
}

impl ScriptedJobs {
    pub fn new(script: Vec<JobStatus>, result_uri: &str) -> Self {
        Self {
            script: Mutex::new(script.into()),
            result_uri: result_uri.to_string(),
            submissions: Mutex::new(Vec::new()),
            polls: Mutex::new(0),
            raise_failures: false,
            reject_submissions: false,
        }
    }

    /// Report failed jobs as [`Error::JobFailed`] the way the real service does.
    pub fn raising_failures(mut self) -> Self {
        self.raise_failures = true;
        self
    }

    pub fn rejecting_submissions(mut self) -> Self {
        self.reject_submissions = true;
        self
    }

    pub fn submissions(&self) -> Vec<Submission> {
        self.submissions.lock().unwrap().clone()
    }

    pub fn polls(&self) -> u32 {
        *self.polls.lock().unwrap()
    }
}

#[async_trait]
impl TranscriptionService for ScriptedJobs {
    async fn submit(&self, request: &SubmitRequest<'_>) -> Result<()> {
        if self.reject_submissions {
            return Err(Error::Submission(format!("{}: limit exceeded", request.job_name)));
        }
        self.submissions.lock().unwrap().push(Submission {
            job_name: request.job_name.to_string(),
            media: request.media.to_string(),
            output_bucket: request.output_bucket.to_string(),
            language_code: request.language_code.to_string(),
            media_format: request.media_format.to_string(),
        });
        Ok(())
    }

    async fn poll_status(&self, job_name: &str) -> Result<JobStatus> {
        *self.polls.lock().unwrap() += 1;
        let mut script = self.script.lock().unwrap();
        let next = if script.len() > 1 {
            script.pop_front()
        } else {
            script.front().cloned()
        };
        drop(script);
        let status = next.unwrap_or(JobStatus::Pending);

        if self.raise_failures {
            status.into_result(job_name)
        } else {
            Ok(status)
        }
    }

    async fn result_location(&self, _job_name: &str) -> Result<String> {
        Ok(self.result_uri.clone())
    }
}

/// Records bucket operations; named buckets can be made to fail.
#[derive(Default)]
pub struct RecordingBuckets {
    created: Mutex<Vec<String>>,
    deleted: Mutex<Vec<String>>,
    fail_create: Option<String>,
    fail_delete: Option<String>,
}

impl RecordingBuckets {
    pub fn failing_create(name: &str) -> Self {
        Self {
            fail_create: Some(name.to_string()),
            ..Self::default()
        }
    }

    pub fn failing_delete(name: &str) -> Self {
        Self {
            fail_delete: Some(name.to_string()),
            ..Self::default()
        }
    }

    pub fn created(&self) -> Vec<String> {
        self.created.lock().unwrap().clone()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }
}

#[async_trait]
impl BucketLifecycle for RecordingBuckets {
    async fn create_bucket(&self, name: &str) -> Result<()> {
        if self.fail_create.as_deref() == Some(name) {
            return Err(Error::Bucket(format!("creating {name}: already exists")));
        }
        self.created.lock().unwrap().push(name.to_string());
        Ok(())
    }

    async fn delete_bucket(&self, name: &str) -> Result<()> {
        if self.fail_delete.as_deref() == Some(name) {
            return Err(Error::Bucket(format!("deleting {name}: access denied")));
        }
        self.deleted.lock().unwrap().push(name.to_string());
        Ok(())
    }
}
