//! Vendor client boundary

use async_trait::async_trait;
use scribe_core::{Paragraph, Transcript, WordSearchMatch};
use scribe_options::{ClientOptions, SubtitleFormat};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::{Result, TranscriptionError};

/// Where the audio comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioSource {
    /// Remote media the vendor can fetch itself
    Url(String),
    /// Local file, uploaded before submission
    File(PathBuf),
    /// In-memory upload (multipart body, stdin...)
    Bytes { file_name: String, data: Vec<u8> },
}

impl AudioSource {
    /// `http(s)://` strings are URLs, anything else is a local path
    pub fn parse(input: &str) -> Self {
        let trimmed = input.trim();
        let lower = trimmed.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            Self::Url(trimmed.to_string())
        } else {
            Self::File(PathBuf::from(trimmed))
        }
    }

    /// Human readable name used for records and output files
    pub fn display_name(&self) -> String {
        match self {
            Self::Url(url) => url.clone(),
            Self::File(path) => path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
            Self::Bytes { file_name, .. } => file_name.clone(),
        }
    }

    /// File stem for naming exports
    pub fn stem(&self) -> String {
        let name = self.display_name();
        let last = name
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or(&name)
            .split(['?', '#'])
            .next()
            .unwrap_or("")
            .to_string();
        let stem = Path::new(&last)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        if stem.is_empty() {
            "transcript".to_string()
        } else {
            stem
        }
    }
}

/// How the vendor client waits for a job to finish
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollingConfig {
    pub interval: Duration,
    /// `None` waits indefinitely
    pub timeout: Option<Duration>,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self::from(&ClientOptions::default())
    }
}

impl From<&ClientOptions> for PollingConfig {
    fn from(options: &ClientOptions) -> Self {
        Self {
            interval: options.polling_interval(),
            timeout: options.polling_timeout(),
        }
    }
}

/// A speech-to-text vendor.
///
/// `submit` blocks until the job reaches a terminal state. The auxiliary
/// calls are optional; providers that lack them return
/// [`TranscriptionError::Unsupported`].
#[async_trait]
pub trait TranscriptionProvider: Send + Sync {
    fn provider_id(&self) -> &str;

    async fn submit(
        &self,
        audio: &AudioSource,
        options: &Map<String, Value>,
        polling: &PollingConfig,
    ) -> Result<Transcript>;

    async fn paragraphs(&self, _transcript_id: &str) -> Result<Vec<Paragraph>> {
        Err(TranscriptionError::Unsupported("paragraphs".to_string()))
    }

    async fn sentences(&self, _transcript_id: &str) -> Result<Vec<Paragraph>> {
        Err(TranscriptionError::Unsupported("sentences".to_string()))
    }

    async fn subtitles(
        &self,
        _transcript_id: &str,
        format: SubtitleFormat,
        _chars_per_caption: u32,
    ) -> Result<String> {
        Err(TranscriptionError::Unsupported(format!("{} subtitles", format)))
    }

    async fn redacted_audio_url(&self, _transcript_id: &str) -> Result<String> {
        Err(TranscriptionError::Unsupported("redacted audio".to_string()))
    }

    async fn word_search(
        &self,
        _transcript_id: &str,
        _words: &[String],
    ) -> Result<Vec<WordSearchMatch>> {
        Err(TranscriptionError::Unsupported("word search".to_string()))
    }
}
