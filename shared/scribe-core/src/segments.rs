//! Caption segment reconstruction
//!
//! Turns whatever timing data the vendor returned into an ordered list of
//! caption-sized segments. Sources are tried in priority order: vendor
//! paragraphs, then fixed windows of words, then the bare transcript text.

use serde::{Deserialize, Serialize};

use crate::transcript::{Paragraph, Word};

/// Maximum number of words grouped into one segment
pub const WORDS_PER_SEGMENT: usize = 32;

/// Caption-like segment, timestamps in seconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    /// Sequence index
    pub id: usize,
    /// Start time in seconds
    pub start: f64,
    /// End time in seconds, unknown for the text-only fallback
    pub end: Option<f64>,
    /// Segment text
    pub text: String,
    /// Speaker label (if diarization produced one)
    pub speaker: Option<String>,
    /// Words making up this segment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub words: Option<Vec<Word>>,
}

/// Build display segments from vendor output.
///
/// Never fails: missing data degrades to fewer segments, down to an empty
/// list when there is nothing to show.
pub fn build_segments(
    paragraphs: Option<&[Paragraph]>,
    words: Option<&[Word]>,
    fallback_text: &str,
) -> Vec<Segment> {
    if let Some(paragraphs) = paragraphs.filter(|p| !p.is_empty()) {
        return segments_from_paragraphs(paragraphs);
    }

    if let Some(words) = words.filter(|w| !w.is_empty()) {
        return segments_from_words(words);
    }

    if !fallback_text.trim().is_empty() {
        return vec![Segment {
            id: 0,
            start: 0.0,
            end: None,
            text: fallback_text.to_string(),
            speaker: None,
            words: None,
        }];
    }

    Vec::new()
}

fn segments_from_paragraphs(paragraphs: &[Paragraph]) -> Vec<Segment> {
    paragraphs
        .iter()
        .enumerate()
        .map(|(id, paragraph)| {
            let start = paragraph.start.map(ms_to_seconds).unwrap_or(0.0);
            let end = paragraph.end.map(ms_to_seconds).unwrap_or(start).max(start);

            Segment {
                id,
                start,
                end: Some(end),
                text: paragraph.text.clone().unwrap_or_default(),
                speaker: paragraph.speaker.clone(),
                words: (!paragraph.words.is_empty()).then(|| paragraph.words.clone()),
            }
        })
        .collect()
}

fn segments_from_words(words: &[Word]) -> Vec<Segment> {
    let mut segments = Vec::with_capacity(words.len() / WORDS_PER_SEGMENT + 1);
    let mut buffer: Vec<&Word> = Vec::with_capacity(WORDS_PER_SEGMENT);
    // Where the previous segment stopped; stands in for missing start times
    let mut cursor = 0.0;

    for (index, word) in words.iter().enumerate() {
        buffer.push(word);

        let is_last = index + 1 == words.len();
        if buffer.len() < WORDS_PER_SEGMENT && !is_last {
            continue;
        }

        let start = buffer[0].start.map(ms_to_seconds).unwrap_or(cursor);
        let end = word
            .end
            .or(word.start)
            .map(ms_to_seconds)
            .unwrap_or(start)
            .max(start);

        let text = buffer
            .iter()
            .map(|w| w.text.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        segments.push(Segment {
            id: segments.len(),
            start,
            end: Some(end),
            text,
            speaker: word.speaker.clone(),
            words: Some(buffer.drain(..).cloned().collect()),
        });

        cursor = end;
    }

    segments
}

/// Vendor millisecond offset to seconds; garbage maps to zero
fn ms_to_seconds(ms: f64) -> f64 {
    if ms.is_finite() && ms > 0.0 {
        ms / 1000.0
    } else {
        0.0
    }
}
