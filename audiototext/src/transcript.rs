use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Transcript document written by the transcription service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptResults {
    #[serde(default)]
    pub job_name: String,
    #[serde(default)]
    pub account_id: String,
    pub results: Results,
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Results {
    pub transcripts: Vec<TranscriptText>,
    #[serde(default)]
    pub items: Vec<Item>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptText {
    pub transcript: String,
}

/// A recognized word or punctuation mark.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
    #[serde(default)]
    pub alternatives: Vec<Alternative>,
    #[serde(rename = "type")]
    pub kind: ItemKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alternative {
    pub confidence: String,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Pronunciation,
    Punctuation,
}

/// A word with numeric timing, built from an [`Item`]'s best alternative.
#[derive(Debug, Clone, PartialEq)]
pub struct Word {
    pub start: Option<f64>,
    pub end: Option<f64>,
    pub confidence: Option<f64>,
    pub content: String,
    pub kind: ItemKind,
}

impl TranscriptResults {
    /// Parse the JSON document.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| Error::Parse(e.to_string()))
    }

    /// The first transcript, which holds the full text.
    pub fn text(&self) -> Result<&str> {
        self.results
            .transcripts
            .first()
            .map(|t| t.transcript.as_str())
            .ok_or(Error::EmptyTranscript)
    }

    /// Items as typed words. Unparseable numbers become `None`.
    pub fn words(&self) -> impl Iterator<Item = Word> + '_ {
        self.results.items.iter().filter_map(|item| {
            let best = item.alternatives.first()?;
            Some(Word {
                start: item.start_time.as_deref().and_then(|s| s.parse().ok()),
                end: item.end_time.as_deref().and_then(|s| s.parse().ok()),
                confidence: best.confidence.parse().ok(),
                content: best.content.clone(),
                kind: item.kind,
            })
        })
    }
}

/// Parse a transcript document and return its text.
pub fn extract_text(bytes: &[u8]) -> Result<String> {
    let results = TranscriptResults::from_slice(bytes)?;
    Ok(results.text()?.to_string())
}

/// Read the expected transcript from disk.
pub async fn read_expected(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|e| Error::io(path, e))
}

/// Exact comparison; any difference is a [`Error::Mismatch`].
pub fn compare(got: &str, expected: &str) -> Result<()> {
    if got == expected {
        Ok(())
    } else {
        Err(Error::Mismatch {
            got: got.to_string(),
            expected: expected.to_string(),
        })
    }
}
