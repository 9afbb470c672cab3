//! AssemblyAI v2 REST client

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Response, StatusCode};
use scribe_core::{Paragraph, Transcript, TranscriptStatus, WordSearchMatch};
use scribe_options::SubtitleFormat;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::time::{Duration, Instant};
use tracing::{debug, info};
use url::Url;

use crate::provider::{AudioSource, PollingConfig, TranscriptionProvider};
use crate::{Result, TranscriptionError};

pub const DEFAULT_BASE_URL: &str = "https://api.assemblyai.com";

/// Connection settings for the AssemblyAI API
#[derive(Debug, Clone)]
pub struct AssemblyAiConfig {
    pub api_key: String,
    pub base_url: String,
    /// Per-request timeout; polling has its own budget
    pub request_timeout: Duration,
}

impl AssemblyAiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(60),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    upload_url: String,
}

#[derive(Debug, Deserialize)]
struct ParagraphsResponse {
    #[serde(default)]
    paragraphs: Vec<Paragraph>,
}

#[derive(Debug, Deserialize)]
struct SentencesResponse {
    #[serde(default)]
    sentences: Vec<Paragraph>,
}

#[derive(Debug, Deserialize)]
struct RedactedAudioResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    redacted_audio_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WordSearchResponse {
    #[serde(default)]
    matches: Vec<WordSearchMatch>,
}

/// AssemblyAI provider
pub struct AssemblyAiClient {
    config: AssemblyAiConfig,
    base_url: Url,
    client: reqwest::Client,
}

impl AssemblyAiClient {
    pub fn new(config: AssemblyAiConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(TranscriptionError::Configuration(
                "AssemblyAI API key required".to_string(),
            ));
        }

        let base_url = Url::parse(&config.base_url).map_err(|e| {
            TranscriptionError::Configuration(format!(
                "invalid AssemblyAI base url {}: {}",
                config.base_url, e
            ))
        })?;

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            config,
            base_url,
            client,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| TranscriptionError::Configuration(format!("invalid endpoint {}: {}", path, e)))
    }

    /// Upload raw media and return the vendor-hosted URL
    pub async fn upload(&self, data: Vec<u8>) -> Result<String> {
        debug!("Uploading {} bytes to AssemblyAI", data.len());

        let response = self
            .client
            .post(self.endpoint("/v2/upload")?)
            .header(AUTHORIZATION, &self.config.api_key)
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(data)
            .send()
            .await?;

        let upload: UploadResponse = check_status(response).await?.json().await?;
        Ok(upload.upload_url)
    }

    /// Create a transcription job without waiting for it
    pub async fn create_transcript(
        &self,
        audio_url: &str,
        options: &Map<String, Value>,
    ) -> Result<Transcript> {
        let mut body = options.clone();
        body.insert("audio_url".to_string(), Value::String(audio_url.to_string()));

        let response = self
            .client
            .post(self.endpoint("/v2/transcript")?)
            .header(AUTHORIZATION, &self.config.api_key)
            .json(&body)
            .send()
            .await?;

        Ok(check_status(response).await?.json().await?)
    }

    pub async fn get_transcript(&self, transcript_id: &str) -> Result<Transcript> {
        let path = format!("/v2/transcript/{}", transcript_id);
        self.get_json(&path, &[]).await
    }

    /// Poll until the job completes, fails or the polling budget runs out
    pub async fn wait_for_completion(
        &self,
        transcript_id: &str,
        polling: &PollingConfig,
    ) -> Result<Transcript> {
        let started = Instant::now();

        loop {
            let transcript = self.get_transcript(transcript_id).await?;
            match transcript.status {
                TranscriptStatus::Completed => return Ok(transcript),
                TranscriptStatus::Error => return Err(vendor_failure(&transcript)),
                status => debug!("Transcript {} is {:?}", transcript_id, status),
            }

            if let Some(timeout) = polling.timeout {
                if started.elapsed() >= timeout {
                    return Err(TranscriptionError::Timeout(format!(
                        "transcript {} not finished after {}ms",
                        transcript_id,
                        timeout.as_millis()
                    )));
                }
            }

            tokio::time::sleep(polling.interval).await;
        }
    }

    async fn resolve_audio_url(&self, audio: &AudioSource) -> Result<String> {
        match audio {
            AudioSource::Url(url) => Ok(url.clone()),
            AudioSource::File(path) => {
                let data = tokio::fs::read(path).await?;
                self.upload(data).await
            }
            AudioSource::Bytes { data, .. } => self.upload(data.clone()).await,
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let response = self
            .client
            .get(self.endpoint(path)?)
            .header(AUTHORIZATION, &self.config.api_key)
            .query(query)
            .send()
            .await?;

        Ok(check_status(response).await?.json().await?)
    }
}

#[async_trait]
impl TranscriptionProvider for AssemblyAiClient {
    fn provider_id(&self) -> &str {
        "assemblyai"
    }

    async fn submit(
        &self,
        audio: &AudioSource,
        options: &Map<String, Value>,
        polling: &PollingConfig,
    ) -> Result<Transcript> {
        let audio_url = self.resolve_audio_url(audio).await?;
        let created = self.create_transcript(&audio_url, options).await?;

        match created.status {
            TranscriptStatus::Completed => return Ok(created),
            TranscriptStatus::Error => return Err(vendor_failure(&created)),
            _ => {}
        }

        let transcript_id = created.id.clone().ok_or_else(|| {
            TranscriptionError::Vendor("transcript created without an id".to_string())
        })?;
        info!("Submitted {} as transcript {}", audio.display_name(), transcript_id);

        self.wait_for_completion(&transcript_id, polling).await
    }

    async fn paragraphs(&self, transcript_id: &str) -> Result<Vec<Paragraph>> {
        let path = format!("/v2/transcript/{}/paragraphs", transcript_id);
        let response: ParagraphsResponse = self.get_json(&path, &[]).await?;
        Ok(response.paragraphs)
    }

    async fn sentences(&self, transcript_id: &str) -> Result<Vec<Paragraph>> {
        let path = format!("/v2/transcript/{}/sentences", transcript_id);
        let response: SentencesResponse = self.get_json(&path, &[]).await?;
        Ok(response.sentences)
    }

    async fn subtitles(
        &self,
        transcript_id: &str,
        format: SubtitleFormat,
        chars_per_caption: u32,
    ) -> Result<String> {
        if format == SubtitleFormat::Txt {
            return Err(TranscriptionError::Unsupported(
                "plain text subtitles are not served by AssemblyAI".to_string(),
            ));
        }

        let path = format!("/v2/transcript/{}/{}", transcript_id, format.as_str());
        let response = self
            .client
            .get(self.endpoint(&path)?)
            .header(AUTHORIZATION, &self.config.api_key)
            .query(&[("chars_per_caption", chars_per_caption)])
            .send()
            .await?;

        Ok(check_status(response).await?.text().await?)
    }

    async fn redacted_audio_url(&self, transcript_id: &str) -> Result<String> {
        let path = format!("/v2/transcript/{}/redacted-audio", transcript_id);
        let response: RedactedAudioResponse = self.get_json(&path, &[]).await?;

        response.redacted_audio_url.ok_or_else(|| {
            TranscriptionError::Vendor(format!(
                "redacted audio not available (status: {})",
                response.status.as_deref().unwrap_or("unknown")
            ))
        })
    }

    async fn word_search(&self, transcript_id: &str, words: &[String]) -> Result<Vec<WordSearchMatch>> {
        if words.is_empty() {
            return Ok(Vec::new());
        }

        let path = format!("/v2/transcript/{}/word-search", transcript_id);
        let response: WordSearchResponse = self
            .get_json(&path, &[("words", words.join(","))])
            .await?;
        Ok(response.matches)
    }
}

/// Map non-success statuses to [`TranscriptionError::Api`], keeping the
/// vendor's `error` message when the body carries one
pub(crate) async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(TranscriptionError::Api {
        status: status.as_u16(),
        message: api_error_message(status, &body),
    })
}

/// `{"error": "..."}` or `{"error": {"message": "..."}}`, else the raw body
fn api_error_message(status: StatusCode, body: &str) -> String {
    let from_json = serde_json::from_str::<Value>(body).ok().and_then(|value| {
        let error = value.get("error")?;
        error
            .as_str()
            .or_else(|| error.get("message").and_then(Value::as_str))
            .map(str::to_string)
    });

    match from_json {
        Some(message) => message,
        None if !body.trim().is_empty() => body.trim().to_string(),
        None => format!("Request failed with status {}", status),
    }
}

fn vendor_failure(transcript: &Transcript) -> TranscriptionError {
    TranscriptionError::Vendor(
        transcript
            .error
            .clone()
            .unwrap_or_else(|| "transcription failed".to_string()),
    )
}
