//! OpenAI Whisper client
//!
//! Whisper answers synchronously with the finished transcript, so there is
//! no job id to poll and no auxiliary endpoints. Timed segments come back
//! in seconds and are handed on as [`Paragraph`]s in milliseconds.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use scribe_core::{Paragraph, Transcript, TranscriptStatus};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

use crate::assemblyai::check_status;
use crate::provider::{AudioSource, PollingConfig, TranscriptionProvider};
use crate::{Result, TranscriptionError};

pub const OPENAI_BASE_URL: &str = "https://api.openai.com";
pub const DEFAULT_WHISPER_MODEL: &str = "whisper-1";

/// Connection settings for the OpenAI transcription endpoint
#[derive(Debug, Clone)]
pub struct WhisperConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub request_timeout: Duration,
}

impl WhisperConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: OPENAI_BASE_URL.to_string(),
            model: DEFAULT_WHISPER_MODEL.to_string(),
            // The whole file is transcribed inside one request
            request_timeout: Duration::from_secs(600),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

#[derive(Debug, Deserialize)]
struct VerboseTranscription {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    duration: Option<f64>,
    #[serde(default)]
    segments: Vec<VerboseSegment>,
}

#[derive(Debug, Deserialize)]
struct VerboseSegment {
    #[serde(default)]
    start: f64,
    #[serde(default)]
    end: f64,
    #[serde(default)]
    text: String,
}

impl VerboseTranscription {
    fn into_transcript(self) -> Transcript {
        let paragraphs: Vec<Paragraph> = self
            .segments
            .iter()
            .filter(|segment| !segment.text.trim().is_empty())
            .map(|segment| Paragraph {
                text: Some(segment.text.trim().to_string()),
                start: Some(seconds_to_ms(segment.start)),
                end: Some(seconds_to_ms(segment.end)),
                ..Default::default()
            })
            .collect();

        let text = match self.text.as_deref().map(str::trim) {
            Some(text) if !text.is_empty() => text.to_string(),
            _ => paragraphs
                .iter()
                .filter_map(|p| p.text.as_deref())
                .collect::<Vec<_>>()
                .join(" "),
        };

        Transcript {
            status: TranscriptStatus::Completed,
            text: Some(text),
            language_code: self.language,
            audio_duration: self.duration,
            paragraphs: Some(paragraphs),
            ..Default::default()
        }
    }
}

fn seconds_to_ms(seconds: f64) -> f64 {
    (seconds * 1000.0).round()
}

/// Whisper accepts ISO-639-1 codes only, so `en_us` becomes `en`
fn whisper_language(options: &Map<String, Value>) -> Option<String> {
    let code = options.get("language_code")?.as_str()?;
    let primary = code.split(['_', '-']).next()?.trim().to_ascii_lowercase();
    (!primary.is_empty()).then_some(primary)
}

/// Boosted words steer recognition through the prompt
fn whisper_prompt(options: &Map<String, Value>) -> Option<String> {
    let words: Vec<&str> = options
        .get("word_boost")?
        .as_array()?
        .iter()
        .filter_map(Value::as_str)
        .collect();
    (!words.is_empty()).then(|| words.join(", "))
}

/// Upload name with an extension Whisper can sniff the format from
fn upload_name(audio: &AudioSource) -> String {
    let name = audio.display_name();
    let last = name
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(&name)
        .split(['?', '#'])
        .next()
        .unwrap_or("")
        .to_string();

    if last.contains('.') {
        last
    } else {
        format!("{}.mp3", audio.stem())
    }
}

/// OpenAI Whisper provider
pub struct WhisperClient {
    config: WhisperConfig,
    base_url: Url,
    client: reqwest::Client,
}

impl WhisperClient {
    pub fn new(config: WhisperConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(TranscriptionError::Configuration(
                "OpenAI API key required".to_string(),
            ));
        }

        let base_url = Url::parse(&config.base_url).map_err(|e| {
            TranscriptionError::Configuration(format!(
                "invalid OpenAI base url {}: {}",
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

    async fn audio_bytes(&self, audio: &AudioSource) -> Result<Vec<u8>> {
        match audio {
            AudioSource::File(path) => Ok(tokio::fs::read(path).await?),
            AudioSource::Bytes { data, .. } => Ok(data.clone()),
            AudioSource::Url(url) => {
                debug!("Downloading {} for Whisper", url);
                let response = self.client.get(url.as_str()).send().await?;
                Ok(check_status(response).await?.bytes().await?.to_vec())
            }
        }
    }
}

#[async_trait]
impl TranscriptionProvider for WhisperClient {
    fn provider_id(&self) -> &str {
        "whisper"
    }

    async fn submit(
        &self,
        audio: &AudioSource,
        options: &Map<String, Value>,
        _polling: &PollingConfig,
    ) -> Result<Transcript> {
        let data = self.audio_bytes(audio).await?;
        if data.is_empty() {
            return Err(TranscriptionError::Configuration(format!(
                "{} contains no audio",
                audio.display_name()
            )));
        }

        let mut form = Form::new()
            .part("file", Part::bytes(data).file_name(upload_name(audio)))
            .text("model", self.config.model.clone())
            .text("response_format", "verbose_json");
        if let Some(language) = whisper_language(options) {
            form = form.text("language", language);
        }
        if let Some(prompt) = whisper_prompt(options) {
            form = form.text("prompt", prompt);
        }

        let endpoint = self
            .base_url
            .join("/v1/audio/transcriptions")
            .map_err(|e| TranscriptionError::Configuration(e.to_string()))?;

        let response = self
            .client
            .post(endpoint)
            .bearer_auth(&self.config.api_key)
            .multipart(form)
            .send()
            .await?;

        let verbose: VerboseTranscription = check_status(response).await?.json().await?;
        info!(
            "Whisper returned {} segments for {}",
            verbose.segments.len(),
            audio.display_name()
        );
        Ok(verbose.into_transcript())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use serde_json::json;

    fn client_for(server: &Server) -> WhisperClient {
        WhisperClient::new(WhisperConfig::new("test-key").with_base_url(server.url())).unwrap()
    }

    fn upload() -> AudioSource {
        AudioSource::Bytes {
            file_name: "lecture.wav".to_string(),
            data: b"RIFF fake audio".to_vec(),
        }
    }

    #[test]
    fn test_missing_key_rejected() {
        assert!(matches!(
            WhisperClient::new(WhisperConfig::new("  ")),
            Err(TranscriptionError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_segments_become_paragraphs() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/audio/transcriptions")
            .match_header("authorization", "Bearer test-key")
            .match_body(Matcher::AllOf(vec![
                Matcher::Regex("whisper-1".to_string()),
                Matcher::Regex("verbose_json".to_string()),
                Matcher::Regex("lecture\\.wav".to_string()),
            ]))
            .with_status(200)
            .with_body(
                json!({
                    "text": "Hello there. General Kenobi.",
                    "language": "english",
                    "duration": 3.5,
                    "segments": [
                        { "id": 0, "start": 0.0, "end": 1.25, "text": " Hello there." },
                        { "id": 1, "start": 1.5, "end": 3.5, "text": " General Kenobi." }
                    ]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = client_for(&server);
        let transcript = client
            .submit(&upload(), &Map::new(), &PollingConfig::default())
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(transcript.status, TranscriptStatus::Completed);
        assert_eq!(transcript.text(), "Hello there. General Kenobi.");
        assert_eq!(transcript.language_code.as_deref(), Some("english"));
        assert_eq!(transcript.audio_duration, Some(3.5));

        let paragraphs = transcript.paragraphs.unwrap();
        assert_eq!(paragraphs.len(), 2);
        assert_eq!(paragraphs[0].text.as_deref(), Some("Hello there."));
        assert_eq!(paragraphs[0].start, Some(0.0));
        assert_eq!(paragraphs[0].end, Some(1250.0));
        assert_eq!(paragraphs[1].start, Some(1500.0));
        assert_eq!(paragraphs[1].end, Some(3500.0));
    }

    #[tokio::test]
    async fn test_text_falls_back_to_segments() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/v1/audio/transcriptions")
            .with_status(200)
            .with_body(
                json!({
                    "segments": [
                        { "start": 0.0, "end": 1.0, "text": " first" },
                        { "start": 1.0, "end": 2.0, "text": "  " },
                        { "start": 2.0, "end": 3.0, "text": "second " }
                    ]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let transcript = client_for(&server)
            .submit(&upload(), &Map::new(), &PollingConfig::default())
            .await
            .unwrap();

        assert_eq!(transcript.text(), "first second");
        assert_eq!(transcript.paragraphs.map(|p| p.len()), Some(2));
        assert!(transcript.id.is_none());
    }

    #[tokio::test]
    async fn test_language_and_prompt_forwarded() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/audio/transcriptions")
            .match_body(Matcher::AllOf(vec![
                Matcher::Regex("name=\"language\"\r\n\r\nes\r\n".to_string()),
                Matcher::Regex("name=\"prompt\"\r\n\r\nAssemblyAI, Kubernetes\r\n".to_string()),
            ]))
            .with_status(200)
            .with_body(json!({ "text": "hola" }).to_string())
            .create_async()
            .await;

        let mut options = Map::new();
        options.insert("language_code".to_string(), json!("es_419"));
        options.insert("word_boost".to_string(), json!(["AssemblyAI", "Kubernetes"]));

        let transcript = client_for(&server)
            .submit(&upload(), &options, &PollingConfig::default())
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(transcript.text(), "hola");
        assert_eq!(transcript.paragraphs, Some(vec![]));
    }

    #[tokio::test]
    async fn test_remote_audio_downloaded_first() {
        let mut server = Server::new_async().await;
        let download = server
            .mock("GET", "/media/talk.m4a")
            .with_status(200)
            .with_body("m4a bytes")
            .create_async()
            .await;
        let transcribe = server
            .mock("POST", "/v1/audio/transcriptions")
            .match_body(Matcher::Regex("filename=\"talk\\.m4a\"".to_string()))
            .with_status(200)
            .with_body(json!({ "text": "downloaded" }).to_string())
            .create_async()
            .await;

        let audio = AudioSource::Url(format!("{}/media/talk.m4a?sig=abc", server.url()));
        let transcript = client_for(&server)
            .submit(&audio, &Map::new(), &PollingConfig::default())
            .await
            .unwrap();

        download.assert_async().await;
        transcribe.assert_async().await;
        assert_eq!(transcript.text(), "downloaded");
    }

    #[tokio::test]
    async fn test_api_error_passthrough() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/v1/audio/transcriptions")
            .with_status(401)
            .with_body(
                json!({
                    "error": { "message": "Incorrect API key provided", "type": "invalid_request_error" }
                })
                .to_string(),
            )
            .create_async()
            .await;

        let err = client_for(&server)
            .submit(&upload(), &Map::new(), &PollingConfig::default())
            .await
            .unwrap_err();

        match err {
            TranscriptionError::Api { status, message } => {
                assert_eq!(status, 401);
                assert_eq!(message, "Incorrect API key provided");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_auxiliary_calls_unsupported() {
        let server = Server::new_async().await;
        let client = client_for(&server);
        assert!(matches!(
            client.paragraphs("any").await,
            Err(TranscriptionError::Unsupported(_))
        ));
        assert!(matches!(
            client.word_search("any", &["x".to_string()]).await,
            Err(TranscriptionError::Unsupported(_))
        ));
    }
}
