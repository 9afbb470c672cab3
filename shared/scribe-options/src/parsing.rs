//! Parsers for free-form text inputs
//!
//! Lists are separated by commas, pipes or newlines. Custom spelling rules are
//! written one per line as `from1, from2 => to` (or `->`).

use tracing::debug;

use crate::transcription::CustomSpelling;

/// Trim, drop blanks and deduplicate while keeping first-seen order
pub(crate) fn dedup_trimmed<'a>(items: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    for item in items {
        let trimmed = item.trim();
        if !trimmed.is_empty() && !seen.iter().any(|existing| existing == trimmed) {
            seen.push(trimmed.to_string());
        }
    }
    seen
}

/// Split on commas, pipes and newlines into a clean list
pub fn parse_delimited_list(input: &str) -> Vec<String> {
    dedup_trimmed(input.split(|c| matches!(c, ',' | '|' | '\n' | '\r')))
}

/// Word boost vocabulary, one term per line or comma separated
pub fn parse_word_boost_input(input: &str) -> Vec<String> {
    parse_line_list(input)
}

/// Redaction policy names, one per line or comma separated
pub fn parse_redaction_policies(input: &str) -> Vec<String> {
    parse_line_list(input)
}

fn parse_line_list(input: &str) -> Vec<String> {
    dedup_trimmed(input.split(|c| matches!(c, ',' | '\n' | '\r')))
}

/// Parse custom spelling rules, one per line.
///
/// Lines without an arrow, or with nothing on either side of it, are skipped
/// without affecting their neighbours.
pub fn parse_custom_spelling_input(input: &str) -> Vec<CustomSpelling> {
    input
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| {
            let entry = parse_custom_spelling_line(line);
            if entry.is_none() {
                debug!("Skipping custom spelling line: {}", line);
            }
            entry
        })
        .collect()
}

fn parse_custom_spelling_line(line: &str) -> Option<CustomSpelling> {
    let arrow = line.find("=>").or_else(|| line.find("->"))?;
    let from = parse_delimited_list(&line[..arrow]);
    let to = line[arrow + 2..].trim();

    if from.is_empty() || to.is_empty() {
        return None;
    }

    Some(CustomSpelling {
        from,
        to: to.to_string(),
    })
}
