use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, TimeZone};
use serde::Deserialize;

use crate::error::{Error, Result};

/// Default wait between job status checks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Default transcription job name.
pub const DEFAULT_JOB_NAME: &str = "ConvertAudioToText";

/// Language of the audio, as understood by the transcription service.
///
/// Codes are BCP-47 style tags such as `en-US` or `de-DE`. `Identify`
/// asks the service to detect the language instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LanguageCode {
    /// Let the service identify the language.
    Identify,
    /// A language tag (e.g. "en-US").
    Code(String),
}

impl LanguageCode {
    /// Parse a language tag. Accepts `auto` for identification.
    ///
    /// The tag must look like `ll-CC`: a two or three letter lowercase
    /// language followed by a two letter uppercase region.
    pub fn new(code: &str) -> Result<Self> {
        let trimmed = code.trim();
        if trimmed.eq_ignore_ascii_case("auto") {
            return Ok(LanguageCode::Identify);
        }

        let Some((lang, region)) = trimmed.split_once('-') else {
            return Err(Error::InvalidOption(format!(
                "language code \"{code}\" is not of the form ll-CC (e.g. en-US)"
            )));
        };

        let lang_ok = (2..=3).contains(&lang.len()) && lang.bytes().all(|b| b.is_ascii_lowercase());
        let region_ok = region.len() == 2 && region.bytes().all(|b| b.is_ascii_uppercase());
        if !lang_ok || !region_ok {
            return Err(Error::InvalidOption(format!(
                "language code \"{code}\" is not of the form ll-CC (e.g. en-US)"
            )));
        }

        Ok(LanguageCode::Code(trimmed.to_string()))
    }

    /// The tag, or None when the service should identify the language.
    pub fn code(&self) -> Option<&str> {
        match self {
            LanguageCode::Identify => None,
            LanguageCode::Code(code) => Some(code),
        }
    }
}

impl fmt::Display for LanguageCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LanguageCode::Identify => write!(f, "auto"),
            LanguageCode::Code(code) => write!(f, "{code}"),
        }
    }
}

impl Default for LanguageCode {
    fn default() -> Self {
        LanguageCode::Code("en-US".into())
    }
}

/// Media container formats accepted by the transcription service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MediaFormat {
    Amr,
    Flac,
    M4a,
    Mp3,
    Mp4,
    Ogg,
    #[default]
    Wav,
    Webm,
}

impl MediaFormat {
    /// Name as the service expects it.
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaFormat::Amr => "amr",
            MediaFormat::Flac => "flac",
            MediaFormat::M4a => "m4a",
            MediaFormat::Mp3 => "mp3",
            MediaFormat::Mp4 => "mp4",
            MediaFormat::Ogg => "ogg",
            MediaFormat::Wav => "wav",
            MediaFormat::Webm => "webm",
        }
    }

    /// Parse from a format name or file extension (case-insensitive).
    pub fn parse_name(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "amr" => Some(MediaFormat::Amr),
            "flac" => Some(MediaFormat::Flac),
            "m4a" => Some(MediaFormat::M4a),
            "mp3" => Some(MediaFormat::Mp3),
            "mp4" => Some(MediaFormat::Mp4),
            "ogg" | "opus" => Some(MediaFormat::Ogg),
            "wav" | "wave" => Some(MediaFormat::Wav),
            "webm" => Some(MediaFormat::Webm),
            _ => None,
        }
    }

    /// Infer the format from a file's extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::parse_name)
    }
}

impl fmt::Display for MediaFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Builder for a single transcription run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub audio_file: PathBuf,
    pub expected_file: PathBuf,
    pub input_bucket: String,
    pub output_bucket: String,
    pub job_name: String,
    pub language_code: LanguageCode,
    pub media_format: MediaFormat,
    pub poll_interval: Duration,
    /// Give up after this many pending status checks. `None` polls forever.
    pub max_polls: Option<u32>,
}

impl RunOptions {
    pub fn new(
        audio_file: impl Into<PathBuf>,
        expected_file: impl Into<PathBuf>,
        input_bucket: impl Into<String>,
        output_bucket: impl Into<String>,
    ) -> Self {
        let audio_file = audio_file.into();
        let media_format = MediaFormat::from_path(&audio_file).unwrap_or_default();
        Self {
            audio_file,
            expected_file: expected_file.into(),
            input_bucket: input_bucket.into(),
            output_bucket: output_bucket.into(),
            job_name: DEFAULT_JOB_NAME.into(),
            language_code: LanguageCode::default(),
            media_format,
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_polls: None,
        }
    }

    pub fn job_name(mut self, name: impl Into<String>) -> Self {
        self.job_name = name.into();
        self
    }

    /// Set the language. Accepts tags like "en-US" or "auto".
    pub fn language_code(mut self, code: &str) -> Result<Self> {
        self.language_code = LanguageCode::new(code)?;
        Ok(self)
    }

    pub fn media_format(mut self, format: MediaFormat) -> Self {
        self.media_format = format;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn max_polls(mut self, max: u32) -> Self {
        self.max_polls = Some(max);
        self
    }

    /// Append a `-YYYYMMDDHHMMSS` timestamp so repeated runs don't collide
    /// with jobs the service still remembers.
    pub fn timestamped<Tz: TimeZone>(mut self, at: &DateTime<Tz>) -> Self
    where
        Tz::Offset: fmt::Display,
    {
        self.job_name = timestamped_job_name(&self.job_name, at);
        self
    }

    /// Check that every required value is present.
    pub fn validate(&self) -> Result<()> {
        if self.audio_file.as_os_str().is_empty() {
            return Err(Error::InvalidOption("audio file must not be empty".into()));
        }
        if self.expected_file.as_os_str().is_empty() {
            return Err(Error::InvalidOption("results file must not be empty".into()));
        }
        validate_bucket_name("input bucket", &self.input_bucket)?;
        validate_bucket_name("output bucket", &self.output_bucket)?;
        validate_job_name(&self.job_name)?;
        Ok(())
    }
}

pub fn timestamped_job_name<Tz: TimeZone>(base: &str, at: &DateTime<Tz>) -> String
where
    Tz::Offset: fmt::Display,
{
    format!("{base}-{}", at.format("%Y%m%d%H%M%S"))
}

/// Only presence is checked here; the services reject names they don't
/// accept when the bucket or job is used.
fn validate_bucket_name(what: &str, name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidOption(format!("{what} must not be empty")));
    }
    Ok(())
}

fn validate_job_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidOption("job name must not be empty".into()));
    }
    Ok(())
}

/// Settings file of the end-to-end harness.
///
/// Every field may be left empty; [`HarnessConfig::resolve`] fills gaps
/// from the environment and then from defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct HarnessConfig {
    pub input_bucket: String,
    pub output_bucket: String,
    pub audio_file: String,
    pub result_file: String,
    pub sleep_seconds: Option<u64>,
    pub job_name: String,
    pub debug: bool,
}

/// A harness configuration with every value filled in.
#[derive(Debug, Clone)]
pub struct ResolvedHarness {
    pub options: RunOptions,
    /// Buckets whose names were generated, so the harness has to create
    /// them before the run and delete them afterwards.
    pub owned_buckets: Vec<String>,
    pub debug: bool,
}

impl HarnessConfig {
    /// Load from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Resolve against the process environment.
    pub fn resolve(&self) -> Result<ResolvedHarness> {
        self.resolve_with(|name| std::env::var(name).ok())
    }

    /// Resolve every value: config file first, then `env`, then a default.
    pub fn resolve_with(&self, env: impl Fn(&str) -> Option<String>) -> Result<ResolvedHarness> {
        let pick = |configured: &str, var: &str| -> Option<String> {
            if !configured.is_empty() {
                return Some(configured.to_string());
            }
            env(var).filter(|v| !v.is_empty())
        };

        let (Some(audio_file), Some(result_file)) = (
            pick(&self.audio_file, "AUDIO_FILE"),
            pick(&self.result_file, "RESULTS_FILE"),
        ) else {
            return Err(Error::InvalidOption(
                "supply the audio file (AudioFile or AUDIO_FILE) and the results file (ResultFile or RESULTS_FILE)".into(),
            ));
        };

        let suffix = uuid::Uuid::new_v4();
        let mut owned_buckets = Vec::new();
        let mut bucket = |configured: &str, var: &str, prefix: &str| -> String {
            pick(configured, var).unwrap_or_else(|| {
                let name = format!("{prefix}-{suffix}");
                owned_buckets.push(name.clone());
                name
            })
        };
        let input_bucket = bucket(&self.input_bucket, "INPUT_BUCKET", "input");
        let output_bucket = bucket(&self.output_bucket, "OUTPUT_BUCKET", "output");

        let poll_interval = match self.sleep_seconds {
            Some(secs) => Duration::from_secs(secs),
            None => match env("SLEEP_SECONDS").filter(|v| !v.is_empty()) {
                Some(v) => Duration::from_secs(v.trim().parse().map_err(|_| {
                    Error::InvalidOption(format!("SLEEP_SECONDS \"{v}\" is not an integer"))
                })?),
                None => DEFAULT_POLL_INTERVAL,
            },
        };

        let job_name = pick(&self.job_name, "JOB_NAME").unwrap_or_else(|| DEFAULT_JOB_NAME.into());

        let options = RunOptions::new(audio_file, result_file, input_bucket, output_bucket)
            .job_name(job_name)
            .poll_interval(poll_interval);

        Ok(ResolvedHarness {
            options,
            owned_buckets,
            debug: self.debug,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_language_code_accepts_tags() {
        assert_eq!(
            LanguageCode::new("en-US").unwrap(),
            LanguageCode::Code("en-US".into())
        );
        assert_eq!(LanguageCode::new("AUTO").unwrap(), LanguageCode::Identify);
        assert!(LanguageCode::new("fil-PH").is_ok());
    }

    #[test]
    fn test_language_code_rejects_garbage() {
        assert!(LanguageCode::new("english").is_err());
        assert!(LanguageCode::new("en-us").is_err());
        assert!(LanguageCode::new("").is_err());
    }

    #[test]
    fn test_media_format_from_path() {
        assert_eq!(
            MediaFormat::from_path(Path::new("FourScore.WAV")),
            Some(MediaFormat::Wav)
        );
        assert_eq!(
            MediaFormat::from_path(Path::new("talk.mp3")),
            Some(MediaFormat::Mp3)
        );
        assert_eq!(MediaFormat::from_path(Path::new("notes.txt")), None);
        assert_eq!(MediaFormat::from_path(Path::new("noext")), None);
    }

    #[test]
    fn test_run_options_defaults() {
        let opts = RunOptions::new("FourScore.wav", "FourScoreResult.txt", "in-bucket", "out-bucket");
        assert_eq!(opts.job_name, DEFAULT_JOB_NAME);
        assert_eq!(opts.poll_interval, Duration::from_secs(10));
        assert_eq!(opts.media_format, MediaFormat::Wav);
        assert_eq!(opts.language_code.code(), Some("en-US"));
        assert!(opts.max_polls.is_none());
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_bucket() {
        let opts = RunOptions::new("a.wav", "a.txt", "", "out-bucket");
        let err = opts.validate().unwrap_err();
        assert!(err.to_string().contains("input bucket"));
    }

    #[test]
    fn test_validate_accepts_legacy_bucket_names() {
        let opts = RunOptions::new("a.wav", "a.txt", "Legacy_Bucket", "Out_Bucket");
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_job_name() {
        let opts = RunOptions::new("a.wav", "a.txt", "in-bucket", "out-bucket").job_name("");
        assert!(matches!(opts.validate(), Err(Error::InvalidOption(_))));
        let opts = RunOptions::new("a.wav", "a.txt", "in-bucket", "out-bucket").job_name("has space");
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn test_timestamped_job_name() {
        let at = chrono::Utc.with_ymd_and_hms(2020, 1, 2, 3, 4, 5).unwrap();
        let opts = RunOptions::new("a.wav", "a.txt", "in-bucket", "out-bucket").timestamped(&at);
        assert_eq!(opts.job_name, "ConvertAudioToText-20200102030405");
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn test_harness_config_parses_pascal_case() {
        let json = r#"{
            "InputBucket": "my-input",
            "OutputBucket": "",
            "AudioFile": "FourScore.wav",
            "ResultFile": "FourScoreResult.txt",
            "SleepSeconds": 5,
            "JobName": "Job",
            "Debug": true
        }"#;
        let cfg: HarnessConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.input_bucket, "my-input");
        assert_eq!(cfg.sleep_seconds, Some(5));
        assert!(cfg.debug);
    }

    #[test]
    fn test_resolve_prefers_config_then_env_then_default() {
        let env: HashMap<&str, &str> = [
            ("INPUT_BUCKET", "env-input"),
            ("OUTPUT_BUCKET", "env-output"),
            ("JOB_NAME", "EnvJob"),
        ]
        .into_iter()
        .collect();
        let cfg = HarnessConfig {
            input_bucket: "cfg-input".into(),
            audio_file: "FourScore.wav".into(),
            result_file: "FourScoreResult.txt".into(),
            ..Default::default()
        };

        let resolved = cfg
            .resolve_with(|name| env.get(name).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(resolved.options.input_bucket, "cfg-input");
        assert_eq!(resolved.options.output_bucket, "env-output");
        assert_eq!(resolved.options.job_name, "EnvJob");
        assert!(resolved.owned_buckets.is_empty());
    }

    #[test]
    fn test_resolve_generates_owned_buckets() {
        let cfg = HarnessConfig {
            audio_file: "FourScore.wav".into(),
            result_file: "FourScoreResult.txt".into(),
            ..Default::default()
        };
        let resolved = cfg.resolve_with(no_env).unwrap();
        assert_eq!(resolved.owned_buckets.len(), 2);
        assert!(resolved.options.input_bucket.starts_with("input-"));
        assert!(resolved.options.output_bucket.starts_with("output-"));
        assert_eq!(resolved.options.poll_interval, DEFAULT_POLL_INTERVAL);
        assert_eq!(resolved.options.job_name, DEFAULT_JOB_NAME);
        assert!(resolved.options.validate().is_ok());
    }

    #[test]
    fn test_resolve_requires_audio_and_results() {
        let cfg = HarnessConfig::default();
        assert!(matches!(
            cfg.resolve_with(no_env),
            Err(Error::InvalidOption(_))
        ));
    }

    #[test]
    fn test_resolve_sleep_seconds_from_env() {
        let cfg = HarnessConfig {
            audio_file: "a.wav".into(),
            result_file: "a.txt".into(),
            ..Default::default()
        };
        let resolved = cfg
            .resolve_with(|name| (name == "SLEEP_SECONDS").then(|| "3".to_string()))
            .unwrap();
        assert_eq!(resolved.options.poll_interval, Duration::from_secs(3));

        let err = cfg
            .resolve_with(|name| (name == "SLEEP_SECONDS").then(|| "soon".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("soon"));
    }

    #[test]
    fn test_resolve_sleep_seconds_zero() {
        let cfg = HarnessConfig {
            audio_file: "a.wav".into(),
            result_file: "a.txt".into(),
            sleep_seconds: Some(0),
            ..Default::default()
        };
        let resolved = cfg
            .resolve_with(|name| (name == "SLEEP_SECONDS").then(|| "7".to_string()))
            .unwrap();
        assert_eq!(resolved.options.poll_interval, Duration::ZERO);
    }

    #[test]
    fn test_from_file_missing() {
        let err = HarnessConfig::from_file("/nonexistent/config.json").unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }
}
