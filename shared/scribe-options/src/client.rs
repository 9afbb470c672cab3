//! Client-side polling and subtitle settings

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::Duration;

use crate::parsing::parse_delimited_list;
use crate::values::{first_present, floor_u32, floor_u64, to_finite_number, trunc_i64};

/// Subtitle export formats the client may request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubtitleFormat {
    Srt,
    Vtt,
    Txt,
}

impl SubtitleFormat {
    /// Case-insensitive parse against the whitelist
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_ascii_lowercase().as_str() {
            "srt" => Some(Self::Srt),
            "vtt" => Some(Self::Vtt),
            "txt" => Some(Self::Txt),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Srt => "srt",
            Self::Vtt => "vtt",
            Self::Txt => "txt",
        }
    }

    /// File extension for exported subtitles
    pub fn extension(&self) -> &'static str {
        self.as_str()
    }
}

impl fmt::Display for SubtitleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Polling and subtitle preferences
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientOptions {
    /// Delay between status polls, milliseconds
    pub polling_interval: u64,
    /// Give up after this many milliseconds; negative waits indefinitely
    pub polling_timeout: i64,
    pub subtitle_formats: Vec<SubtitleFormat>,
    pub subtitle_chars_per_caption: u32,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            polling_interval: 4000,
            polling_timeout: -1,
            subtitle_formats: vec![SubtitleFormat::Srt],
            subtitle_chars_per_caption: 32,
        }
    }
}

impl ClientOptions {
    /// Layer a raw client option bag over the defaults.
    ///
    /// Accepts camelCase keys and their snake_case spellings.
    pub fn from_raw(raw: &Value) -> Self {
        let mut options = Self::default();
        let Some(map) = raw.as_object() else {
            return options;
        };

        if let Some(interval) = first_present(map, &["pollingInterval", "polling_interval"])
            .and_then(to_finite_number)
            .and_then(floor_u64)
        {
            options.polling_interval = interval;
        }

        if let Some(timeout) = first_present(map, &["pollingTimeout", "polling_timeout"])
            .and_then(to_finite_number)
            .and_then(trunc_i64)
        {
            options.polling_timeout = timeout;
        }

        if let Some(chars) = first_present(
            map,
            &["subtitleCharsPerCaption", "subtitle_chars_per_caption"],
        )
        .and_then(to_finite_number)
        .and_then(floor_u32)
        .filter(|n| *n >= 1)
        {
            options.subtitle_chars_per_caption = chars;
        }

        if let Some(formats) = first_present(map, &["subtitleFormats", "subtitle_formats"]) {
            options.subtitle_formats = sanitize_subtitle_formats(formats);
        }

        options
    }

    pub fn polling_interval(&self) -> Duration {
        Duration::from_millis(self.polling_interval)
    }

    /// `None` when polling should never give up
    pub fn polling_timeout(&self) -> Option<Duration> {
        u64::try_from(self.polling_timeout)
            .ok()
            .map(Duration::from_millis)
    }
}

/// Whitelisted, deduplicated formats; never empty
fn sanitize_subtitle_formats(value: &Value) -> Vec<SubtitleFormat> {
    let requested: Vec<String> = match value {
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        Value::String(text) => parse_delimited_list(text),
        _ => Vec::new(),
    };

    let mut formats: Vec<SubtitleFormat> = Vec::new();
    for format in requested.iter().filter_map(|item| SubtitleFormat::parse(item)) {
        if !formats.contains(&format) {
            formats.push(format);
        }
    }

    if formats.is_empty() {
        ClientOptions::default().subtitle_formats
    } else {
        formats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let options = ClientOptions::from_raw(&json!(null));
        assert_eq!(options.polling_interval, 4000);
        assert_eq!(options.polling_timeout, -1);
        assert_eq!(options.subtitle_formats, vec![SubtitleFormat::Srt]);
        assert_eq!(options.subtitle_chars_per_caption, 32);
        assert_eq!(options.polling_timeout(), None);
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let options = ClientOptions::from_raw(&json!({
            "pollingInterval": -5,
            "pollingTimeout": "soon",
            "subtitleCharsPerCaption": 0
        }));
        assert_eq!(options, ClientOptions::default());
    }

    #[test]
    fn test_out_of_range_values_fall_back() {
        let options = ClientOptions::from_raw(&json!({
            "pollingInterval": 1e300,
            "pollingTimeout": "-1e40",
            "subtitleCharsPerCaption": 1e20
        }));
        assert_eq!(options, ClientOptions::default());
    }

    #[test]
    fn test_valid_values() {
        let options = ClientOptions::from_raw(&json!({
            "pollingInterval": "1500",
            "polling_timeout": 60000,
            "subtitleCharsPerCaption": 42.9
        }));
        assert_eq!(options.polling_interval(), Duration::from_millis(1500));
        assert_eq!(options.polling_timeout(), Some(Duration::from_secs(60)));
        assert_eq!(options.subtitle_chars_per_caption, 42);
    }

    #[test]
    fn test_subtitle_formats_whitelisted_and_deduplicated() {
        let options = ClientOptions::from_raw(&json!({
            "subtitleFormats": ["VTT", "srt", "vtt", "xml", 7]
        }));
        assert_eq!(
            options.subtitle_formats,
            vec![SubtitleFormat::Vtt, SubtitleFormat::Srt]
        );
    }

    #[test]
    fn test_all_invalid_formats_revert_to_default() {
        let options = ClientOptions::from_raw(&json!({
            "subtitleFormats": ["xml", "docx"]
        }));
        assert_eq!(options.subtitle_formats, vec![SubtitleFormat::Srt]);

        let empty = ClientOptions::from_raw(&json!({ "subtitleFormats": [] }));
        assert_eq!(empty.subtitle_formats, vec![SubtitleFormat::Srt]);
    }

    #[test]
    fn test_single_string_format() {
        let options = ClientOptions::from_raw(&json!({ "subtitleFormats": "txt, vtt" }));
        assert_eq!(
            options.subtitle_formats,
            vec![SubtitleFormat::Txt, SubtitleFormat::Vtt]
        );
    }
}
