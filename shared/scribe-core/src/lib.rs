//! Scribe Core - Transcript data model and caption segment reconstruction

pub mod transcript;
pub mod segments;

pub use transcript::{
    Chapter, Paragraph, Transcript, TranscriptStatus, Utterance, Word, WordSearchMatch,
};
pub use segments::{build_segments, Segment, WORDS_PER_SEGMENT};

/// Result type for Scribe Core operations
pub type Result<T> = std::result::Result<T, CoreError>;

/// Error types for Scribe Core operations
#[derive(thiserror::Error, Debug)]
pub enum CoreError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid transcript: {0}")]
    InvalidTranscript(String),
}
