//! Single entry point from a raw configuration blob to canonical options

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::client::ClientOptions;
use crate::features::{derive_feature_selections, merge_feature_overrides, FeatureSelectionMap};
use crate::transcription::TranscriptionOptions;
use crate::values::first_present;

const TRANSCRIPTION_SOURCE_KEYS: &[&str] = &[
    "transcriptionOptions",
    "transcription_options",
    "options",
    "request_options",
];
const CLIENT_SOURCE_KEYS: &[&str] = &["clientOptions", "client_options"];
const FEATURE_OVERRIDE_KEYS: &[&str] = &["featureSelections", "feature_selections"];

/// Fully normalized configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedConfig {
    pub transcription_options: TranscriptionOptions,
    pub client_options: ClientOptions,
    pub feature_selections: FeatureSelectionMap,
}

impl Default for NormalizedConfig {
    fn default() -> Self {
        let transcription_options = TranscriptionOptions::default();
        let feature_selections = derive_feature_selections(&transcription_options);
        Self {
            transcription_options,
            client_options: ClientOptions::default(),
            feature_selections,
        }
    }
}

impl NormalizedConfig {
    /// Vendor-ready form: transcription options pruned of empty values
    pub fn build_submission(&self) -> SubmissionConfig {
        SubmissionConfig {
            transcription_options: self.transcription_options.to_submission(),
            client_options: self.client_options.clone(),
            feature_selections: self.feature_selections.clone(),
        }
    }
}

/// What actually goes to the vendor, plus the client-side settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionConfig {
    pub transcription_options: Map<String, Value>,
    pub client_options: ClientOptions,
    pub feature_selections: FeatureSelectionMap,
}

/// Normalize a raw configuration of any shape. Never fails.
///
/// Transcription options are read from `transcriptionOptions`,
/// `transcription_options`, `options` or `request_options` (first non-null
/// wins). Client options come from `clientOptions`/`client_options` and
/// caller feature overrides from `featureSelections`.
pub fn normalize(raw: &Value) -> NormalizedConfig {
    let Some(config) = raw.as_object() else {
        return NormalizedConfig::default();
    };

    let transcription_options = first_present(config, TRANSCRIPTION_SOURCE_KEYS)
        .map(TranscriptionOptions::from_raw)
        .unwrap_or_default();
    let client_options = first_present(config, CLIENT_SOURCE_KEYS)
        .map(ClientOptions::from_raw)
        .unwrap_or_default();

    let feature_selections = merge_feature_overrides(
        derive_feature_selections(&transcription_options),
        first_present(config, FEATURE_OVERRIDE_KEYS),
    );

    NormalizedConfig {
        transcription_options,
        client_options,
        feature_selections,
    }
}

/// Normalize and prune in one step
pub fn build_transcription_options(raw: &Value) -> SubmissionConfig {
    normalize(raw).build_submission()
}

/// Collapse every source spelling into one canonical raw config.
///
/// Sources are layered lowest priority first (`request_options`, `options`,
/// `transcription_options`, `transcriptionOptions`), so keys given only in
/// `options` survive while `transcriptionOptions` wins on conflicts.
/// Non-object sources are ignored.
pub fn unify_sources(raw: &Value) -> Value {
    let mut unified = Map::new();
    let Some(config) = raw.as_object() else {
        return Value::Object(unified);
    };

    let groups: [(&str, &[&str]); 3] = [
        ("transcriptionOptions", TRANSCRIPTION_SOURCE_KEYS),
        ("clientOptions", CLIENT_SOURCE_KEYS),
        ("featureSelections", FEATURE_OVERRIDE_KEYS),
    ];

    for (canonical, keys) in groups {
        let mut merged = Value::Object(Map::new());
        for key in keys.iter().rev() {
            if let Some(source @ Value::Object(_)) = config.get(*key) {
                merged = merge_raw(&merged, source);
            }
        }
        if merged.as_object().is_some_and(|m| !m.is_empty()) {
            unified.insert(canonical.to_string(), merged);
        }
    }

    Value::Object(unified)
}

/// Deep merge of two raw values; objects merge key by key, anything else in
/// `overlay` replaces `base`
pub fn merge_raw(base: &Value, overlay: &Value) -> Value {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            let mut merged = base_map.clone();
            for (key, value) in overlay_map {
                let next = match merged.get(key) {
                    Some(existing) => merge_raw(existing, value),
                    None => value.clone(),
                };
                merged.insert(key.clone(), next);
            }
            Value::Object(merged)
        }
        (_, overlay) => overlay.clone(),
    }
}

/// Drop nulls, blank strings and empty lists; trim the strings that remain.
///
/// Applying it to its own output changes nothing.
pub fn prune_submission(options: Map<String, Value>) -> Map<String, Value> {
    options
        .into_iter()
        .filter_map(|(key, value)| match value {
            Value::Null => None,
            Value::String(text) => {
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some((key, Value::String(trimmed.to_string())))
                }
            }
            Value::Array(items) if items.is_empty() => None,
            other => Some((key, other)),
        })
        .collect()
}
