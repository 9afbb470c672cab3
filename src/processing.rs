use anyhow::Result;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch, Semaphore};
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use scribe_core::{build_segments, Paragraph, Segment, Transcript, TranscriptStatus, WordSearchMatch};
use scribe_options::{
    derive_feature_selections, merge_feature_overrides, merge_raw, normalize, unify_sources,
    ClientOptions, FeatureSelectionMap, SubtitleFormat,
};
use scribe_transcription::{
    AssemblyAiClient, Attempt, AudioSource, PollingConfig, Transcriber, TranscriptionError,
    TranscriptionProvider, WhisperClient,
};

use crate::config::{AppConfig, ProviderKind};

/// Client-facing result of one transcription
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionPayload {
    pub id: String,
    pub file_name: String,
    pub created_at: DateTime<Utc>,
    pub status: TranscriptStatus,
    pub text: String,
    pub segments: Vec<Segment>,
    /// Which submission produced this transcript
    pub attempt: Attempt,
    /// Pruned options that actually produced the transcript
    pub request_options: Map<String, Value>,
    pub client_options: ClientOptions,
    pub feature_selections: FeatureSelectionMap,
    pub subtitles: BTreeMap<SubtitleFormat, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redacted_audio_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub word_matches: Option<Vec<WordSearchMatch>>,
    /// Vendor transcript as returned
    pub transcript: Transcript,
}

struct Enrichment {
    segments: Vec<Segment>,
    subtitles: BTreeMap<SubtitleFormat, String>,
    redacted_audio_url: Option<String>,
}

/// Normalize, transcribe and enrich a single audio source
pub struct TranscriptionPipeline {
    transcriber: Transcriber,
    default_options: Value,
}

impl TranscriptionPipeline {
    pub fn new(transcriber: Transcriber) -> Self {
        Self {
            transcriber,
            default_options: Value::Object(Map::new()),
        }
    }

    /// Pipeline backed by the vendor client selected in `config`
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let provider: Arc<dyn TranscriptionProvider> = match config.processing.provider {
            ProviderKind::AssemblyAi => Arc::new(AssemblyAiClient::new(config.assemblyai_config()?)?),
            ProviderKind::Whisper => Arc::new(WhisperClient::new(config.whisper_config()?)?),
        };
        info!("🎙️ Transcribing with {}", provider.provider_id());
        let pipeline = Self::new(Transcriber::new(provider));

        Ok(match &config.processing.default_options {
            Some(options) => pipeline.with_default_options(options.clone()),
            None => pipeline,
        })
    }

    /// Raw config layered under every request
    pub fn with_default_options(mut self, raw: Value) -> Self {
        self.default_options = unify_sources(&raw);
        self
    }

    pub fn provider(&self) -> &dyn TranscriptionProvider {
        self.transcriber.provider()
    }

    /// Request config merged over the pipeline defaults
    pub fn effective_config(&self, raw: &Value) -> Value {
        merge_raw(&self.default_options, &unify_sources(raw))
    }

    pub async fn process(
        &self,
        audio: &AudioSource,
        raw: &Value,
    ) -> scribe_transcription::Result<TranscriptionPayload> {
        self.process_until(audio, raw, std::future::pending()).await
    }

    /// Like [`TranscriptionPipeline::process`], abandoning the vendor calls
    /// once `cancel` resolves. Enrichment calls are abandoned too.
    pub async fn process_until<F>(
        &self,
        audio: &AudioSource,
        raw: &Value,
        cancel: F,
    ) -> scribe_transcription::Result<TranscriptionPayload>
    where
        F: Future<Output = ()>,
    {
        let cancel = cancel.shared();
        let effective = self.effective_config(raw);
        let config = normalize(&effective);
        let polling = PollingConfig::from(&config.client_options);

        let outcome = self
            .transcriber
            .transcribe_until(audio, &config.transcription_options, &polling, cancel.clone())
            .await?;

        let feature_selections = merge_feature_overrides(
            derive_feature_selections(&outcome.used_options),
            effective.get("featureSelections"),
        );

        let enrichment = tokio::select! {
            biased;
            _ = cancel => {
                warn!("Enrichment of {} cancelled", audio.display_name());
                return Err(TranscriptionError::Cancelled);
            }
            enrichment = self.enrich(
                &outcome.transcript,
                &config.client_options,
                outcome.used_options.redact_pii_audio,
            ) => enrichment,
        };

        let transcript = outcome.transcript;
        Ok(TranscriptionPayload {
            id: transcript
                .id
                .clone()
                .unwrap_or_else(|| format!("transcript-{}", Utc::now().timestamp_millis())),
            file_name: audio.display_name(),
            created_at: Utc::now(),
            status: transcript.status,
            text: transcript.text().to_string(),
            segments: enrichment.segments,
            attempt: outcome.attempt,
            request_options: outcome.used_options.to_submission(),
            client_options: config.client_options,
            feature_selections,
            subtitles: enrichment.subtitles,
            redacted_audio_url: enrichment.redacted_audio_url,
            word_matches: None,
            transcript,
        })
    }

    /// Segments, subtitles and redacted audio for a finished transcript
    async fn enrich(
        &self,
        transcript: &Transcript,
        client_options: &ClientOptions,
        redact_pii_audio: bool,
    ) -> Enrichment {
        let transcript_id = transcript.id.as_deref();

        let fetched = match (&transcript.paragraphs, transcript_id) {
            (Some(_), _) => None,
            (None, Some(id)) if !transcript.is_empty() => self.fetch_paragraphs(id).await,
            _ => None,
        };
        let paragraphs = transcript.paragraphs.as_deref().or(fetched.as_deref());
        let segments = build_segments(paragraphs, transcript.words.as_deref(), transcript.text());

        let subtitles = self
            .collect_subtitles(transcript_id, transcript, client_options)
            .await;

        let redacted_audio_url = match transcript_id {
            Some(id) if redact_pii_audio => self.fetch_redacted_audio(id).await,
            _ => None,
        };

        Enrichment {
            segments,
            subtitles,
            redacted_audio_url,
        }
    }

    /// Vendor word search; failures surface to the caller
    pub async fn search_words(
        &self,
        transcript_id: &str,
        words: &[String],
    ) -> scribe_transcription::Result<Vec<WordSearchMatch>> {
        self.provider().word_search(transcript_id, words).await
    }

    async fn fetch_paragraphs(&self, transcript_id: &str) -> Option<Vec<Paragraph>> {
        match self.provider().paragraphs(transcript_id).await {
            Ok(paragraphs) => Some(paragraphs),
            Err(TranscriptionError::Unsupported(what)) => {
                debug!("Provider does not offer {}", what);
                None
            }
            Err(e) => {
                warn!("Could not fetch paragraphs for {}: {}", transcript_id, e);
                None
            }
        }
    }

    async fn fetch_redacted_audio(&self, transcript_id: &str) -> Option<String> {
        match self.provider().redacted_audio_url(transcript_id).await {
            Ok(url) => Some(url),
            Err(e) => {
                warn!("Redacted audio unavailable for {}: {}", transcript_id, e);
                None
            }
        }
    }

    /// Requested subtitle formats; `txt` is rendered locally, the rest come
    /// from the vendor. Formats that fail are left out.
    async fn collect_subtitles(
        &self,
        transcript_id: Option<&str>,
        transcript: &Transcript,
        client_options: &ClientOptions,
    ) -> BTreeMap<SubtitleFormat, String> {
        let mut subtitles = BTreeMap::new();
        if transcript.is_empty() {
            return subtitles;
        }

        if client_options.subtitle_formats.contains(&SubtitleFormat::Txt) {
            subtitles.insert(SubtitleFormat::Txt, render_plain_text(transcript));
        }

        let Some(id) = transcript_id else {
            return subtitles;
        };

        let remote: Vec<SubtitleFormat> = client_options
            .subtitle_formats
            .iter()
            .copied()
            .filter(|format| *format != SubtitleFormat::Txt)
            .collect();

        let fetches = remote.iter().map(|format| {
            self.provider()
                .subtitles(id, *format, client_options.subtitle_chars_per_caption)
        });

        for (format, result) in remote.iter().zip(join_all(fetches).await) {
            match result {
                Ok(body) => {
                    subtitles.insert(*format, body);
                }
                Err(TranscriptionError::Unsupported(what)) => {
                    debug!("Provider does not offer {}", what)
                }
                Err(e) => warn!("Could not fetch {} subtitles for {}: {}", format, id, e),
            }
        }

        subtitles
    }
}

/// Plain text export: the transcript text with a trailing newline
pub fn render_plain_text(transcript: &Transcript) -> String {
    let mut text = transcript.text().trim().to_string();
    text.push('\n');
    text
}

/// Outcome for one input of a batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileProcessingResult {
    pub source: String,
    pub status: ProcessingStatus,
    pub attempt: Option<Attempt>,
    pub payload_path: Option<PathBuf>,
    pub subtitle_paths: Vec<PathBuf>,
    pub segment_count: usize,
    pub processing_time: Duration,
    pub error_message: Option<String>,
}

/// Overall batch processing results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingResult {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub total_time: Duration,
    pub results: Vec<FileProcessingResult>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessingStatus {
    Completed,
    Failed,
    Cancelled,
}

/// Stops a running batch
#[derive(Clone)]
pub struct CancelHandle {
    sender: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }
}

/// Concurrent transcription of many inputs with a bounded worker pool
pub struct BatchProcessor {
    pipeline: Arc<TranscriptionPipeline>,
    supported_extensions: Vec<String>,
    worker_semaphore: Arc<Semaphore>,
    max_concurrent: usize,
    cancel_sender: Arc<watch::Sender<bool>>,
    search_words: Arc<Vec<String>>,
}

impl BatchProcessor {
    pub fn new(pipeline: Arc<TranscriptionPipeline>, max_workers: usize) -> Self {
        let max_workers = max_workers.max(1);
        info!("🔧 Initializing BatchProcessor with {} workers", max_workers);

        let (cancel_sender, _) = watch::channel(false);
        Self {
            pipeline,
            supported_extensions: AppConfig::default().processing.supported_extensions,
            worker_semaphore: Arc::new(Semaphore::new(max_workers)),
            max_concurrent: max_workers,
            cancel_sender: Arc::new(cancel_sender),
            search_words: Arc::new(Vec::new()),
        }
    }

    /// Words to look up in every finished transcript
    pub fn with_search_words(mut self, words: Vec<String>) -> Self {
        self.search_words = Arc::new(
            words
                .into_iter()
                .map(|word| word.trim().to_string())
                .filter(|word| !word.is_empty())
                .collect(),
        );
        self
    }

    pub fn with_supported_extensions(mut self, extensions: Vec<String>) -> Self {
        self.supported_extensions = extensions
            .into_iter()
            .map(|ext| ext.trim_start_matches('.').to_lowercase())
            .collect();
        self
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            sender: Arc::clone(&self.cancel_sender),
        }
    }

    /// URLs pass through, directories expand to their media files
    pub fn expand_inputs(&self, inputs: &[String]) -> Vec<AudioSource> {
        let mut sources = Vec::new();

        for input in inputs {
            match AudioSource::parse(input) {
                AudioSource::File(path) if path.is_dir() => {
                    let mut found: Vec<PathBuf> = WalkDir::new(&path)
                        .follow_links(true)
                        .into_iter()
                        .filter_map(|entry| match entry {
                            Ok(entry) => Some(entry),
                            Err(e) => {
                                warn!("Skipping unreadable entry under {}: {}", path.display(), e);
                                None
                            }
                        })
                        .filter(|entry| entry.file_type().is_file())
                        .map(|entry| entry.into_path())
                        .filter(|file| self.is_supported(file))
                        .collect();
                    found.sort();

                    if found.is_empty() {
                        warn!("No media files found in {}", path.display());
                    }
                    sources.extend(found.into_iter().map(AudioSource::File));
                }
                source => sources.push(source),
            }
        }

        sources
    }

    fn is_supported(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| self.supported_extensions.contains(&ext.to_lowercase()))
            .unwrap_or(false)
    }

    /// Transcribe every input and write payloads, subtitles and a summary
    pub async fn process_inputs(
        &self,
        inputs: &[String],
        raw_config: &Value,
        output_dir: &Path,
    ) -> Result<ProcessingResult> {
        let start_time = Instant::now();

        info!("🚀 Starting batch transcription...");
        info!("📂 Output: {}", output_dir.display());
        tokio::fs::create_dir_all(output_dir).await?;

        let sources = self.expand_inputs(inputs);
        if sources.is_empty() {
            warn!("Nothing to transcribe");
            return Ok(ProcessingResult {
                total: 0,
                successful: 0,
                failed: 0,
                total_time: start_time.elapsed(),
                results: Vec::new(),
            });
        }

        info!("🎧 Found {} inputs to transcribe", sources.len());

        let results = self
            .process_parallel(sources, raw_config, output_dir)
            .await;

        let successful = results
            .iter()
            .filter(|r| r.status == ProcessingStatus::Completed)
            .count();
        let processing_result = ProcessingResult {
            total: results.len(),
            successful,
            failed: results.len() - successful,
            total_time: start_time.elapsed(),
            results,
        };

        let results_path = output_dir.join("batch_results.json");
        let json_data = serde_json::to_string_pretty(&processing_result)?;
        tokio::fs::write(&results_path, json_data).await?;
        info!("💾 Results saved to: {}", results_path.display());

        Ok(processing_result)
    }

    async fn process_parallel(
        &self,
        sources: Vec<AudioSource>,
        raw_config: &Value,
        output_dir: &Path,
    ) -> Vec<FileProcessingResult> {
        let (tx, mut rx) = mpsc::channel(self.max_concurrent);
        let total = sources.len();
        let stems = unique_stems(&sources);

        for (index, (source, stem)) in sources.into_iter().zip(stems).enumerate() {
            let pipeline = Arc::clone(&self.pipeline);
            let semaphore = Arc::clone(&self.worker_semaphore);
            let mut cancelled = self.cancel_sender.subscribe();
            let search_words = Arc::clone(&self.search_words);
            let raw_config = raw_config.clone();
            let output_dir = output_dir.to_path_buf();
            let tx = tx.clone();

            tokio::spawn(async move {
                let start_time = Instant::now();
                let cancel = async move {
                    let _ = cancelled.wait_for(|cancelled| *cancelled).await;
                };

                let result = match semaphore.acquire_owned().await {
                    Ok(_permit) => {
                        info!("🎙️ Transcribing {}/{}: {}", index + 1, total, source.display_name());
                        let mut outcome = pipeline.process_until(&source, &raw_config, cancel).await;
                        if let Ok(payload) = outcome.as_mut() {
                            attach_word_matches(&pipeline, payload, &search_words).await;
                        }
                        finish_file(outcome, &source, &stem, &output_dir, start_time).await
                    }
                    Err(e) => failed_result(&source, start_time, e.to_string()),
                };

                if let Err(e) = tx.send(result).await {
                    error!("Failed to send result: {}", e);
                }
            });
        }

        drop(tx);

        let mut results = Vec::with_capacity(total);
        while let Some(result) = rx.recv().await {
            match result.status {
                ProcessingStatus::Completed => info!(
                    "✅ Completed: {} in {:.2}s",
                    result.source,
                    result.processing_time.as_secs_f64()
                ),
                _ => warn!(
                    "❌ {:?}: {} - {}",
                    result.status,
                    result.source,
                    result.error_message.as_deref().unwrap_or("Unknown error")
                ),
            }
            results.push(result);
        }

        results
    }

    pub fn get_stats(&self) -> ProcessingStats {
        ProcessingStats {
            max_workers: self.max_concurrent,
            available_permits: self.worker_semaphore.available_permits(),
        }
    }
}

async fn attach_word_matches(
    pipeline: &TranscriptionPipeline,
    payload: &mut TranscriptionPayload,
    words: &[String],
) {
    let Some(id) = payload.transcript.id.clone() else {
        return;
    };
    if words.is_empty() || payload.transcript.is_empty() {
        return;
    }

    match pipeline.search_words(&id, words).await {
        Ok(matches) => payload.word_matches = Some(matches),
        Err(e) => warn!("Word search failed for {}: {}", id, e),
    }
}

async fn finish_file(
    outcome: scribe_transcription::Result<TranscriptionPayload>,
    source: &AudioSource,
    stem: &str,
    output_dir: &Path,
    start_time: Instant,
) -> FileProcessingResult {
    let payload = match outcome {
        Ok(payload) => payload,
        Err(TranscriptionError::Cancelled) => {
            let mut result = failed_result(source, start_time, "cancelled".to_string());
            result.status = ProcessingStatus::Cancelled;
            return result;
        }
        Err(e) => return failed_result(source, start_time, e.to_string()),
    };

    match write_outputs(&payload, stem, output_dir).await {
        Ok((payload_path, subtitle_paths)) => FileProcessingResult {
            source: source.display_name(),
            status: ProcessingStatus::Completed,
            attempt: Some(payload.attempt),
            payload_path: Some(payload_path),
            subtitle_paths,
            segment_count: payload.segments.len(),
            processing_time: start_time.elapsed(),
            error_message: None,
        },
        Err(e) => failed_result(source, start_time, format!("Writing output failed: {}", e)),
    }
}

fn failed_result(source: &AudioSource, start_time: Instant, message: String) -> FileProcessingResult {
    FileProcessingResult {
        source: source.display_name(),
        status: ProcessingStatus::Failed,
        attempt: None,
        payload_path: None,
        subtitle_paths: Vec::new(),
        segment_count: 0,
        processing_time: start_time.elapsed(),
        error_message: Some(message),
    }
}

/// Write `<stem>.json` plus one `<stem>.<ext>` per subtitle format
pub async fn write_outputs(
    payload: &TranscriptionPayload,
    stem: &str,
    output_dir: &Path,
) -> Result<(PathBuf, Vec<PathBuf>)> {
    let payload_path = output_dir.join(format!("{}.json", stem));
    tokio::fs::write(&payload_path, serde_json::to_string_pretty(payload)?).await?;

    let mut subtitle_paths = Vec::new();
    for (format, body) in &payload.subtitles {
        let path = output_dir.join(format!("{}.{}", stem, format.extension()));
        tokio::fs::write(&path, body).await?;
        subtitle_paths.push(path);
    }

    Ok((payload_path, subtitle_paths))
}

/// Output file stems, suffixed when two inputs share a name
fn unique_stems(sources: &[AudioSource]) -> Vec<String> {
    let mut seen = HashSet::new();
    sources
        .iter()
        .map(|source| {
            let base = source.stem();
            let mut stem = base.clone();
            let mut counter = 2;
            while !seen.insert(stem.clone()) {
                stem = format!("{}-{}", base, counter);
                counter += 1;
            }
            stem
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct ProcessingStats {
    pub max_workers: usize,
    pub available_permits: usize,
}
