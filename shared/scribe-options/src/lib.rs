//! Scribe Options - Normalization of loosely-typed transcription settings
//!
//! Raw configuration arrives from form controls, query strings and JSON
//! payloads of unknown shape. Nothing in this crate returns an error: every
//! malformed value is coerced or replaced with its default, and the result is
//! always a complete canonical configuration.

pub mod client;
pub mod features;
pub mod normalize;
pub mod parsing;
pub mod transcription;
mod values;

pub use client::{ClientOptions, SubtitleFormat};
pub use features::{
    derive_feature_selections, merge_feature_overrides, FeatureSelectionMap, FEATURE_OPTION_TO_FLAG,
};
pub use normalize::{
    build_transcription_options, merge_raw, normalize, prune_submission, unify_sources,
    NormalizedConfig, SubmissionConfig,
};
pub use parsing::{
    parse_custom_spelling_input, parse_delimited_list, parse_redaction_policies,
    parse_word_boost_input,
};
pub use transcription::{CustomSpelling, RedactionAudioQuality, TranscriptionOptions};
