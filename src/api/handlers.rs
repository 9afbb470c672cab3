//! API request handlers

use anyhow::Result;
use serde_json::{json, Map, Value};
use tracing::{info, warn};

use scribe_options::{build_transcription_options, normalize};
use scribe_transcription::AudioSource;

use super::models::{ApiError, TranscribeRequest};
use crate::processing::{TranscriptionPayload, TranscriptionPipeline};

const AUDIO_URL_KEYS: &[&str] = &["audioUrl", "audio_url"];

/// Handle health check requests
pub async fn health_check() -> Result<Value> {
    Ok(json!({
        "status": "healthy",
        "service": "scribe-studio",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Configuration used when a request carries no options, including the
/// server's configured defaults
pub fn default_options(pipeline: &TranscriptionPipeline) -> Value {
    normalize_options(pipeline, &json!({}))
}

/// Preview what `/api/transcribe` would submit for the same raw config.
///
/// Request groups are unified and layered over the server defaults exactly
/// as the pipeline does before normalizing.
pub fn normalize_options(pipeline: &TranscriptionPipeline, raw: &Value) -> Value {
    let effective = pipeline.effective_config(raw);
    json!({
        "config": normalize(&effective),
        "submission": build_transcription_options(&effective),
    })
}

/// Build a request from a JSON body. Only remote URLs are accepted here so
/// clients cannot point the server at its own files.
pub fn transcribe_request_from_json(body: Value) -> Result<TranscribeRequest, ApiError> {
    let audio_url = body
        .as_object()
        .and_then(|map| {
            AUDIO_URL_KEYS
                .iter()
                .find_map(|key| map.get(*key).and_then(Value::as_str))
        })
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .ok_or_else(|| ApiError::bad_request("audioUrl or file is required"))?;

    let audio = remote_audio(audio_url)?;
    Ok(TranscribeRequest {
        audio,
        raw_config: body,
    })
}

/// Multipart text fields hold JSON strings; anything unparseable is skipped
pub fn raw_config_from_fields(fields: Vec<(String, String)>) -> Map<String, Value> {
    let mut raw = Map::new();
    for (name, text) in fields {
        if AUDIO_URL_KEYS.contains(&name.as_str()) {
            raw.insert(name, Value::String(text));
            continue;
        }
        if text.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<Value>(&text) {
            Ok(value) => {
                raw.insert(name, value);
            }
            Err(e) => warn!("Ignoring malformed form field {}: {}", name, e),
        }
    }
    raw
}

pub fn remote_audio(url: &str) -> Result<AudioSource, ApiError> {
    match AudioSource::parse(url) {
        source @ AudioSource::Url(_) => Ok(source),
        _ => Err(ApiError::bad_request("audioUrl must be an http(s) URL")),
    }
}

/// Run the full pipeline for one request
pub async fn transcribe(
    pipeline: &TranscriptionPipeline,
    request: TranscribeRequest,
) -> Result<TranscriptionPayload, ApiError> {
    info!("🎙️ Transcription requested for {}", request.audio.display_name());
    let payload = pipeline.process(&request.audio, &request.raw_config).await?;
    info!(
        "✅ Transcription {} finished with {} segments",
        payload.id,
        payload.segments.len()
    );
    Ok(payload)
}
