//! Canonical transcription request options

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::parsing::parse_custom_spelling_input;
use crate::values::{
    coerce_bool, floor_u32, floor_u64, non_blank_string, sanitize_string_list, to_finite_number,
};

/// Bitrate of the redacted audio file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RedactionAudioQuality {
    Low,
    #[default]
    Medium,
    High,
}

impl RedactionAudioQuality {
    /// Case-insensitive parse of `low`, `medium` or `high`
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

/// Spelling correction: every variant in `from` is replaced with `to`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomSpelling {
    pub from: Vec<String>,
    pub to: String,
}

/// Transcription options in the vendor's request vocabulary.
///
/// Built only through [`TranscriptionOptions::from_raw`] or `Default`, so
/// every instance satisfies the list and language invariants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptionOptions {
    pub language_detection: bool,
    pub language_code: Option<String>,
    pub punctuate: bool,
    pub format_text: bool,
    pub dual_channel: bool,
    pub speaker_labels: bool,
    pub speakers_expected: Option<u32>,
    pub disfluencies: bool,
    pub filter_profanity: bool,
    pub auto_highlights: bool,
    pub sentiment_analysis: bool,
    pub sentiment_analysis_threshold: Option<f64>,
    pub entity_detection: bool,
    pub content_safety: bool,
    pub content_safety_ai_labs: bool,
    pub iab_categories: bool,
    pub auto_chapters: bool,
    pub summarization: bool,
    pub summary_model: Option<String>,
    pub summary_type: Option<String>,
    pub summary_auto_chapters: bool,
    pub word_boost: Vec<String>,
    pub boost_param: Option<String>,
    pub custom_spelling: Vec<CustomSpelling>,
    pub redact_pii: bool,
    pub redact_pii_policies: Vec<String>,
    pub redact_pii_audio: bool,
    pub redact_pii_audio_quality: RedactionAudioQuality,
    /// Trim start in milliseconds
    pub audio_start_from: Option<u64>,
    /// Trim end in milliseconds
    pub audio_end_at: Option<u64>,
    pub speech_threshold: Option<f64>,
}

impl Default for TranscriptionOptions {
    fn default() -> Self {
        Self {
            language_detection: true,
            language_code: None,
            punctuate: true,
            format_text: true,
            dual_channel: false,
            speaker_labels: false,
            speakers_expected: None,
            disfluencies: false,
            filter_profanity: false,
            auto_highlights: false,
            sentiment_analysis: false,
            sentiment_analysis_threshold: None,
            entity_detection: false,
            content_safety: false,
            content_safety_ai_labs: false,
            iab_categories: false,
            auto_chapters: false,
            summarization: false,
            summary_model: Some("informative".to_string()),
            summary_type: Some("bullets".to_string()),
            summary_auto_chapters: false,
            word_boost: Vec::new(),
            boost_param: None,
            custom_spelling: Vec::new(),
            redact_pii: false,
            redact_pii_policies: Vec::new(),
            redact_pii_audio: false,
            redact_pii_audio_quality: RedactionAudioQuality::Medium,
            audio_start_from: None,
            audio_end_at: None,
            speech_threshold: None,
        }
    }
}

impl TranscriptionOptions {
    /// Layer a raw option bag over the defaults.
    ///
    /// Unknown keys are ignored. A key that is present but `null` clears an
    /// optional field; a missing key keeps the default.
    pub fn from_raw(raw: &Value) -> Self {
        let mut options = Self::default();
        let Some(map) = raw.as_object() else {
            return options;
        };

        // Anything short of an explicit "off" keeps detection enabled
        if let Some(value) = map.get("language_detection") {
            options.language_detection = coerce_bool(value) != Some(false);
        }
        if let Some(value) = map.get("language_code") {
            options.language_code = non_blank_string(value);
        }

        read_bool(map, "punctuate", &mut options.punctuate);
        read_bool(map, "format_text", &mut options.format_text);
        read_bool(map, "dual_channel", &mut options.dual_channel);
        read_bool(map, "speaker_labels", &mut options.speaker_labels);
        read_bool(map, "disfluencies", &mut options.disfluencies);
        read_bool(map, "filter_profanity", &mut options.filter_profanity);
        read_bool(map, "auto_highlights", &mut options.auto_highlights);
        read_bool(map, "sentiment_analysis", &mut options.sentiment_analysis);
        read_bool(map, "entity_detection", &mut options.entity_detection);
        read_bool(map, "content_safety", &mut options.content_safety);
        read_bool(map, "content_safety_ai_labs", &mut options.content_safety_ai_labs);
        read_bool(map, "iab_categories", &mut options.iab_categories);
        read_bool(map, "auto_chapters", &mut options.auto_chapters);
        read_bool(map, "summarization", &mut options.summarization);
        read_bool(map, "summary_auto_chapters", &mut options.summary_auto_chapters);
        read_bool(map, "redact_pii", &mut options.redact_pii);
        read_bool(map, "redact_pii_audio", &mut options.redact_pii_audio);

        if let Some(value) = map.get("summary_model") {
            read_labelled_string(value, &mut options.summary_model);
        }
        if let Some(value) = map.get("summary_type") {
            read_labelled_string(value, &mut options.summary_type);
        }
        if let Some(value) = map.get("boost_param") {
            options.boost_param = non_blank_string(value);
        }

        if let Some(value) = map.get("speakers_expected") {
            options.speakers_expected = non_negative(value).and_then(floor_u32);
        }
        if let Some(value) = map.get("audio_start_from") {
            options.audio_start_from = non_negative(value).and_then(floor_u64);
        }
        if let Some(value) = map.get("audio_end_at") {
            options.audio_end_at = non_negative(value).and_then(floor_u64);
        }
        if let Some(value) = map.get("sentiment_analysis_threshold") {
            options.sentiment_analysis_threshold = non_negative(value);
        }
        if let Some(value) = map.get("speech_threshold") {
            options.speech_threshold = to_finite_number(value);
        }

        if let Some(value) = map.get("word_boost") {
            options.word_boost = sanitize_string_list(value);
        }
        if let Some(value) = map.get("redact_pii_policies") {
            options.redact_pii_policies = sanitize_string_list(value);
        }
        if let Some(value) = map.get("custom_spelling") {
            options.custom_spelling = sanitize_custom_spelling(value);
        }
        if let Some(value) = map.get("redact_pii_audio_quality") {
            options.redact_pii_audio_quality = value
                .as_str()
                .and_then(RedactionAudioQuality::parse)
                .unwrap_or_default();
        }

        // An explicit language beats auto-detection
        if options.language_detection && options.language_code.is_some() {
            options.language_detection = false;
        }

        options
    }

    /// Options for the second attempt after an empty transcript: drop the
    /// explicit language and let the vendor detect it.
    pub fn for_language_detection_retry(&self) -> Self {
        Self {
            language_detection: true,
            language_code: None,
            ..self.clone()
        }
    }

    /// Flat key/value view in the vendor's vocabulary, unset fields as `null`
    pub fn to_map(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }

    /// Pruned request body: no nulls, blank strings or empty lists
    pub fn to_submission(&self) -> Map<String, Value> {
        crate::normalize::prune_submission(self.to_map())
    }
}

fn read_bool(map: &Map<String, Value>, key: &str, target: &mut bool) {
    if let Some(flag) = map.get(key).and_then(coerce_bool) {
        *target = flag;
    }
}

/// Strings with a default: blank or null clears, other types keep the default
fn read_labelled_string(value: &Value, target: &mut Option<String>) {
    match value {
        Value::String(_) | Value::Null => *target = non_blank_string(value),
        _ => {}
    }
}

fn non_negative(value: &Value) -> Option<f64> {
    to_finite_number(value).filter(|n| *n >= 0.0)
}

/// Keep only entries with at least one variant and a replacement
fn sanitize_custom_spelling(value: &Value) -> Vec<CustomSpelling> {
    match value {
        Value::Array(entries) => entries
            .iter()
            .filter_map(|entry| {
                let map = entry.as_object()?;
                let from = ["from", "source", "words"]
                    .iter()
                    .filter_map(|key| map.get(*key))
                    .find(|v| !v.is_null())
                    .map(sanitize_string_list)
                    .unwrap_or_default();
                let to = map.get("to").and_then(non_blank_string)?;

                if from.is_empty() {
                    return None;
                }
                Some(CustomSpelling { from, to })
            })
            .collect(),
        Value::String(text) => parse_custom_spelling_input(text),
        _ => Vec::new(),
    }
}
