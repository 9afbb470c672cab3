//! Scribe Studio - transcription service library
//!
//! Normalizes loosely-shaped option blobs, drives AssemblyAI (or Whisper)
//! with a one-shot language detection retry and rebuilds caption segments.

pub mod config;
pub mod processing;

#[cfg(feature = "api")]
pub mod api;

// Re-export main types for easy access
pub use crate::config::{AppConfig, ConfigBuilder, ProviderKind};
pub use crate::processing::{
    BatchProcessor, CancelHandle, ProcessingResult, TranscriptionPayload, TranscriptionPipeline,
};

pub use scribe_core::{build_segments, Segment, Transcript};
pub use scribe_options::{normalize, NormalizedConfig};
pub use scribe_transcription::{AudioSource, Transcriber, TranscriptionError};
