//! Vendor transcript shape
//!
//! Every field the vendor may omit is optional here. Code reading a
//! [`Transcript`] has to cope with any of them being absent.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{CoreError, Result};

/// Lifecycle state reported by the vendor for a transcription job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TranscriptStatus {
    Queued,
    #[default]
    Processing,
    Completed,
    Error,
    #[serde(other)]
    Unknown,
}

impl TranscriptStatus {
    /// Terminal states end the polling loop
    pub fn is_terminal(&self) -> bool {
        matches!(self, TranscriptStatus::Completed | TranscriptStatus::Error)
    }
}

/// Single recognized word, timestamps in milliseconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Word {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub start: Option<f64>,
    #[serde(default)]
    pub end: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speaker: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

impl Word {
    /// Create a new word spanning `start..end` milliseconds
    pub fn new(text: impl Into<String>, start: f64, end: f64) -> Self {
        Self {
            text: text.into(),
            start: Some(start),
            end: Some(end),
            speaker: None,
            confidence: None,
        }
    }

    /// Set speaker label
    pub fn with_speaker(mut self, speaker: impl Into<String>) -> Self {
        self.speaker = Some(speaker.into());
        self
    }
}

/// Paragraph or sentence returned by the vendor's auxiliary endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Paragraph {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub start: Option<f64>,
    #[serde(default)]
    pub end: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speaker: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub words: Vec<Word>,
}

/// Speaker turn produced when diarization is enabled
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Utterance {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub start: Option<f64>,
    #[serde(default)]
    pub end: Option<f64>,
    #[serde(default)]
    pub speaker: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub words: Vec<Word>,
}

/// Auto-chapter with generated summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Chapter {
    #[serde(default)]
    pub headline: Option<String>,
    #[serde(default)]
    pub gist: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub start: Option<f64>,
    #[serde(default)]
    pub end: Option<f64>,
}

/// Hit from the vendor's word search endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct WordSearchMatch {
    pub text: String,
    #[serde(default)]
    pub count: u32,
    #[serde(default)]
    pub timestamps: Vec<(f64, f64)>,
    #[serde(default)]
    pub indexes: Vec<usize>,
}

/// Transcript payload as returned by the vendor.
///
/// Rich analysis results (highlights, entities, safety labels...) are kept as
/// raw JSON; anything not modelled is preserved in `extra` so it survives a
/// round trip to the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Transcript {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub status: TranscriptStatus,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub words: Option<Vec<Word>>,
    #[serde(default)]
    pub utterances: Option<Vec<Utterance>>,
    /// Paragraphs delivered with the transcript itself, for providers
    /// without a separate paragraphs endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paragraphs: Option<Vec<Paragraph>>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub audio_duration: Option<f64>,
    #[serde(default)]
    pub language_code: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub chapters: Option<Vec<Chapter>>,
    #[serde(default)]
    pub auto_highlights_result: Option<Value>,
    #[serde(default)]
    pub sentiment_analysis_results: Option<Vec<Value>>,
    #[serde(default)]
    pub entities: Option<Vec<Value>>,
    #[serde(default)]
    pub content_safety_labels: Option<Value>,
    #[serde(default)]
    pub iab_categories_result: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Transcript {
    /// Parse a vendor JSON body
    pub fn from_json(body: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(body)?;
        Self::from_value(value)
    }

    /// Convert an already-decoded JSON value
    pub fn from_value(value: Value) -> Result<Self> {
        if !value.is_object() {
            return Err(CoreError::InvalidTranscript(
                "transcript payload must be a JSON object".to_string(),
            ));
        }
        Ok(serde_json::from_value(value)?)
    }

    /// Transcript text, empty when absent
    pub fn text(&self) -> &str {
        self.text.as_deref().unwrap_or("")
    }

    /// Word list, empty when absent
    pub fn words(&self) -> &[Word] {
        self.words.as_deref().unwrap_or(&[])
    }

    /// A completed transcript with no text and no words.
    ///
    /// Silence and a wrong language guess both land here; the orchestrator
    /// uses it to decide on the language detection retry.
    pub fn is_empty(&self) -> bool {
        self.text().trim().is_empty() && self.words().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_transcript_tolerates_missing_fields() {
        let transcript = Transcript::from_value(json!({ "id": "abc" })).unwrap();

        assert_eq!(transcript.id.as_deref(), Some("abc"));
        assert_eq!(transcript.status, TranscriptStatus::Processing);
        assert_eq!(transcript.text(), "");
        assert!(transcript.words().is_empty());
        assert!(transcript.is_empty());
    }

    #[test]
    fn test_transcript_keeps_unmodelled_fields() {
        let transcript = Transcript::from_value(json!({
            "id": "abc",
            "status": "completed",
            "text": "hello",
            "acoustic_model": "assemblyai_default"
        }))
        .unwrap();

        assert_eq!(transcript.status, TranscriptStatus::Completed);
        assert_eq!(
            transcript.extra.get("acoustic_model"),
            Some(&json!("assemblyai_default"))
        );
    }

    #[test]
    fn test_unknown_status_is_not_terminal() {
        let transcript = Transcript::from_value(json!({ "status": "rebooting" })).unwrap();
        assert_eq!(transcript.status, TranscriptStatus::Unknown);
        assert!(!transcript.status.is_terminal());
    }

    #[test]
    fn test_empty_classification() {
        let whitespace = Transcript {
            text: Some("   ".to_string()),
            words: Some(vec![]),
            ..Default::default()
        };
        assert!(whitespace.is_empty());

        let words_only = Transcript {
            text: Some(String::new()),
            words: Some(vec![Word::new("hi", 0.0, 100.0)]),
            ..Default::default()
        };
        assert!(!words_only.is_empty());

        let text_only = Transcript {
            text: Some("hi".to_string()),
            ..Default::default()
        };
        assert!(!text_only.is_empty());
    }

    #[test]
    fn test_non_object_payload_rejected() {
        assert!(Transcript::from_json("[1, 2, 3]").is_err());
        assert!(Transcript::from_json("not json").is_err());
    }
}
