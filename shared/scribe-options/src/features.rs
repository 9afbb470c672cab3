//! Informational feature flags derived from transcription options.
//!
//! The map is display-only: it is never sent to the vendor and never decides
//! what gets requested.

use serde_json::Value;
use std::collections::BTreeMap;

use crate::transcription::TranscriptionOptions;
use crate::values::truthy;

/// Feature name to on/off
pub type FeatureSelectionMap = BTreeMap<String, bool>;

/// Which feature each option key belongs to
pub const FEATURE_OPTION_TO_FLAG: &[(&str, &str)] = &[
    ("auto_chapters", "auto_chapters"),
    ("auto_highlights", "auto_highlights"),
    ("content_safety", "content_safety"),
    ("iab_categories", "iab_categories"),
    ("entity_detection", "entity_detection"),
    ("sentiment_analysis", "sentiment_analysis"),
    ("summarization", "summarization"),
    ("summary_type", "summarization"),
    ("summary_model", "summarization"),
    ("summary_auto_chapters", "summarization"),
    ("speaker_labels", "speaker_labels"),
    ("speakers_expected", "speaker_labels"),
    ("dual_channel", "dual_channel"),
    ("punctuate", "punctuate"),
    ("format_text", "format_text"),
    ("filter_profanity", "filter_profanity"),
    ("disfluencies", "disfluencies"),
    ("word_boost", "word_boost"),
    ("boost_param", "word_boost"),
    ("custom_spelling", "custom_spelling"),
    ("redact_pii", "redact_pii"),
    ("redact_pii_audio", "redact_pii_audio"),
    ("redact_pii_policies", "redact_pii"),
    ("redact_pii_audio_quality", "redact_pii_audio"),
    ("language_detection", "language_detection"),
    ("language_code", "language_code"),
    ("sentiment_analysis_threshold", "sentiment_analysis"),
    ("content_safety_ai_labs", "content_safety"),
    ("audio_start_from", "audio_trimming"),
    ("audio_end_at", "audio_trimming"),
    ("speech_threshold", "speech_threshold"),
];

/// Keys that only tune another option. They have non-empty defaults, so they
/// report their parent toggle rather than their own value.
const QUALIFIER_PARENTS: &[(&str, &str)] = &[
    ("summary_type", "summarization"),
    ("summary_model", "summarization"),
    ("summary_auto_chapters", "summarization"),
    ("redact_pii_audio_quality", "redact_pii_audio"),
];

/// Derive the feature map; a feature is on when any of its keys is set
pub fn derive_feature_selections(options: &TranscriptionOptions) -> FeatureSelectionMap {
    let values = options.to_map();
    let mut selections = FeatureSelectionMap::new();

    for (option_key, feature) in FEATURE_OPTION_TO_FLAG {
        let source_key = QUALIFIER_PARENTS
            .iter()
            .find(|(qualifier, _)| qualifier == option_key)
            .map(|(_, parent)| *parent)
            .unwrap_or(*option_key);

        let on = values.get(source_key).map(is_selected).unwrap_or(false);
        let entry = selections.entry(feature.to_string()).or_insert(false);
        *entry = *entry || on;
    }

    selections
}

/// Apply caller overrides on top of derived selections; overrides win
pub fn merge_feature_overrides(
    mut selections: FeatureSelectionMap,
    overrides: Option<&Value>,
) -> FeatureSelectionMap {
    if let Some(Value::Object(map)) = overrides {
        for (feature, value) in map {
            selections.insert(feature.clone(), truthy(value));
        }
    }
    selections
}

fn is_selected(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().map(f64::is_finite).unwrap_or(false),
        Value::String(text) => !text.trim().is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_selections() {
        let selections = derive_feature_selections(&TranscriptionOptions::default());

        assert_eq!(selections.get("punctuate"), Some(&true));
        assert_eq!(selections.get("format_text"), Some(&true));
        assert_eq!(selections.get("language_detection"), Some(&true));
        assert_eq!(selections.get("summarization"), Some(&false));
        assert_eq!(selections.get("redact_pii_audio"), Some(&false));
        assert_eq!(selections.get("audio_trimming"), Some(&false));
        assert_eq!(selections.get("language_code"), Some(&false));
    }

    #[test]
    fn test_any_key_turns_feature_on() {
        let options = TranscriptionOptions::from_raw(&json!({
            "speakers_expected": 2,
            "audio_end_at": 30000,
            "redact_pii_policies": ["person_name"],
            "boost_param": "high"
        }));
        let selections = derive_feature_selections(&options);

        assert_eq!(selections.get("speaker_labels"), Some(&true));
        assert_eq!(selections.get("audio_trimming"), Some(&true));
        assert_eq!(selections.get("redact_pii"), Some(&true));
        assert_eq!(selections.get("word_boost"), Some(&true));
    }

    #[test]
    fn test_qualifiers_follow_parent() {
        let options = TranscriptionOptions::from_raw(&json!({
            "summary_type": "gist",
            "redact_pii_audio_quality": "high"
        }));
        let selections = derive_feature_selections(&options);
        assert_eq!(selections.get("summarization"), Some(&false));
        assert_eq!(selections.get("redact_pii_audio"), Some(&false));

        let options = TranscriptionOptions::from_raw(&json!({ "summarization": true }));
        let selections = derive_feature_selections(&options);
        assert_eq!(selections.get("summarization"), Some(&true));
    }

    #[test]
    fn test_overrides_win() {
        let derived = derive_feature_selections(&TranscriptionOptions::default());
        let merged = merge_feature_overrides(
            derived,
            Some(&json!({ "punctuate": false, "lemur": "yes", "entity_detection": 0 })),
        );

        assert_eq!(merged.get("punctuate"), Some(&false));
        assert_eq!(merged.get("lemur"), Some(&true));
        assert_eq!(merged.get("entity_detection"), Some(&false));
    }

    #[test]
    fn test_non_object_overrides_ignored() {
        let derived = derive_feature_selections(&TranscriptionOptions::default());
        let merged = merge_feature_overrides(derived.clone(), Some(&json!(["punctuate"])));
        assert_eq!(merged, derived);
    }
}
