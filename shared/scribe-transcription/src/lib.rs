//! Scribe Transcription - Vendor clients (AssemblyAI, Whisper) and transcription orchestration

pub mod assemblyai;
pub mod orchestrator;
pub mod provider;
pub mod whisper;

pub use assemblyai::{AssemblyAiClient, AssemblyAiConfig, DEFAULT_BASE_URL};
pub use orchestrator::{Attempt, Transcriber, TranscriptionOutcome};
pub use provider::{AudioSource, PollingConfig, TranscriptionProvider};
pub use whisper::{WhisperClient, WhisperConfig, DEFAULT_WHISPER_MODEL, OPENAI_BASE_URL};

/// Result type for transcription operations
pub type Result<T> = std::result::Result<T, TranscriptionError>;

/// Error types for transcription operations
#[derive(thiserror::Error, Debug)]
pub enum TranscriptionError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Non-success HTTP status; `message` is the vendor's text verbatim
    #[error("{message}")]
    Api { status: u16, message: String },

    /// The vendor finished the job with status `error`
    #[error("{0}")]
    Vendor(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Transcription cancelled")]
    Cancelled,

    #[error("Not supported by this provider: {0}")]
    Unsupported(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}
