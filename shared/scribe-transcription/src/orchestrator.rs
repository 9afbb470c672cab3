//! Transcription orchestration with a one-shot language detection retry
//!
//! A completed transcript with no text and no words usually means the vendor
//! was told the wrong language. When the caller pinned a language (detection
//! off), the job is resubmitted once with detection forced on. The two
//! attempts run strictly in sequence and the outcome records which one
//! produced the returned transcript.

use scribe_core::Transcript;
use scribe_options::TranscriptionOptions;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use tracing::{info, warn};

use crate::provider::{AudioSource, PollingConfig, TranscriptionProvider};
use crate::{Result, TranscriptionError};

/// Which submission produced the returned transcript
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Attempt {
    Original,
    LanguageDetectionRetry,
}

/// Transcript plus the options that actually produced it
#[derive(Debug, Clone)]
pub struct TranscriptionOutcome {
    pub transcript: Transcript,
    pub used_options: TranscriptionOptions,
    pub attempt: Attempt,
}

impl TranscriptionOutcome {
    fn original(transcript: Transcript, options: &TranscriptionOptions) -> Self {
        Self {
            transcript,
            used_options: options.clone(),
            attempt: Attempt::Original,
        }
    }
}

/// Drives a [`TranscriptionProvider`] through the submit/retry sequence
#[derive(Clone)]
pub struct Transcriber {
    provider: Arc<dyn TranscriptionProvider>,
}

impl Transcriber {
    pub fn new(provider: Arc<dyn TranscriptionProvider>) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &dyn TranscriptionProvider {
        self.provider.as_ref()
    }

    /// Submit, and resubmit once with language detection if the first
    /// result is empty and detection was off.
    ///
    /// Errors from the first submission propagate untouched. A failed or
    /// empty retry is logged and the first result is returned instead.
    pub async fn transcribe(
        &self,
        audio: &AudioSource,
        options: &TranscriptionOptions,
        polling: &PollingConfig,
    ) -> Result<TranscriptionOutcome> {
        info!(
            "Transcribing {} with {}",
            audio.display_name(),
            self.provider.provider_id()
        );

        let transcript = self
            .provider
            .submit(audio, &options.to_submission(), polling)
            .await?;

        if !transcript.is_empty() || options.language_detection {
            return Ok(TranscriptionOutcome::original(transcript, options));
        }

        warn!(
            "Empty transcript for {} with language {:?}; retrying with language detection",
            audio.display_name(),
            options.language_code
        );

        let retry_options = options.for_language_detection_retry();
        match self
            .provider
            .submit(audio, &retry_options.to_submission(), polling)
            .await
        {
            Ok(retried) if !retried.is_empty() => {
                info!("Language detection retry recovered {}", audio.display_name());
                Ok(TranscriptionOutcome {
                    transcript: retried,
                    used_options: retry_options,
                    attempt: Attempt::LanguageDetectionRetry,
                })
            }
            Ok(_) => {
                info!(
                    "Retry for {} was also empty; keeping the original result",
                    audio.display_name()
                );
                Ok(TranscriptionOutcome::original(transcript, options))
            }
            Err(TranscriptionError::Cancelled) => Err(TranscriptionError::Cancelled),
            Err(e) => {
                warn!(
                    "Language detection retry failed for {}: {}",
                    audio.display_name(),
                    e
                );
                Ok(TranscriptionOutcome::original(transcript, options))
            }
        }
    }

    /// [`Transcriber::transcribe`] that gives up as soon as `cancel` resolves.
    ///
    /// Cancelling abandons whichever attempt is in flight, so a cancelled
    /// first submission never leads to a retry.
    pub async fn transcribe_until<F>(
        &self,
        audio: &AudioSource,
        options: &TranscriptionOptions,
        polling: &PollingConfig,
        cancel: F,
    ) -> Result<TranscriptionOutcome>
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            biased;
            _ = cancel => {
                warn!("Transcription of {} cancelled", audio.display_name());
                Err(TranscriptionError::Cancelled)
            }
            outcome = self.transcribe(audio, options, polling) => outcome,
        }
    }
}
