use serde_json::Value;
use validator::Validate;

use crate::models::dto::generated_item::{GeneratedItemDto, REQUIRED_FIELDS};

pub const MAX_SUMMARY_CHARS: usize = 200;
const MIN_SUMMARY_WORDS: usize = 3;
const MAX_SUMMARY_WORDS: usize = 10;

/// Words a complete topic summary never ends with.
const DANGLING_WORDS: [&str; 22] = [
    "a", "an", "the", "of", "in", "on", "at", "to", "for", "with", "by", "from", "into", "about",
    "and", "or", "as", "per", "than", "between", "during", "over",
];

/// Trims whitespace, wrapping quotes and trailing sentence punctuation from a raw summary.
pub fn clean_summary(raw: &str) -> String {
    let trimmed = raw
        .trim()
        .trim_matches(|c: char| c == '"' || c == '\'' || c == '`')
        .trim();
    let trimmed = trimmed.strip_suffix('.').unwrap_or(trimmed);
    // Collapse internal whitespace so equal topics compare equal.
    trimmed.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Quick shape check applied to any summary: non-empty, bounded length, not structured data.
pub fn check_summary_shape(summary: &str) -> Result<(), String> {
    let summary = summary.trim();

    if summary.is_empty() {
        return Err("summary is empty".to_string());
    }
    if summary.chars().count() > MAX_SUMMARY_CHARS {
        return Err(format!("summary exceeds {} characters", MAX_SUMMARY_CHARS));
    }
    if summary.starts_with('{') || summary.starts_with('[') {
        return Err("summary looks like structured data".to_string());
    }

    Ok(())
}

/// Full check for a standalone topic summary, as produced by Phase 1.
pub fn validate_summary(summary: &str) -> Result<(), String> {
    check_summary_shape(summary)?;

    let summary = summary.trim();
    if summary.ends_with("...") || summary.ends_with('…') {
        return Err("summary looks truncated".to_string());
    }
    if summary.ends_with([',', ':', ';', '-']) {
        return Err("summary ends mid-phrase".to_string());
    }

    let words: Vec<&str> = summary.split_whitespace().collect();
    if words.len() < MIN_SUMMARY_WORDS {
        return Err(format!("summary has fewer than {} words", MIN_SUMMARY_WORDS));
    }
    if words.len() > MAX_SUMMARY_WORDS {
        return Err(format!("summary has more than {} words", MAX_SUMMARY_WORDS));
    }

    if let Some(last) = words.last() {
        let last = last
            .trim_matches(|c: char| !c.is_alphanumeric())
            .to_lowercase();
        if DANGLING_WORDS.contains(&last.as_str()) {
            return Err(format!("summary ends with dangling word '{}'", last));
        }
    }

    Ok(())
}

/// Returns the first balanced `{...}` object in `text`, ignoring braces inside strings.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }

    None
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// Validates a Phase-2 response object and converts it into a candidate item.
pub fn validate_item(value: &Value) -> Result<GeneratedItemDto, String> {
    let object = value
        .as_object()
        .ok_or_else(|| "response is not a JSON object".to_string())?;

    let missing: Vec<&str> = REQUIRED_FIELDS
        .iter()
        .copied()
        .filter(|field| object.get(*field).map_or(true, is_blank))
        .collect();
    if !missing.is_empty() {
        return Err(format!("missing required fields: {}", missing.join(", ")));
    }

    if !object.get("answer").is_some_and(Value::is_number) {
        return Err("answer must be a JSON number".to_string());
    }

    let mut item: GeneratedItemDto = serde_json::from_value(value.clone())
        .map_err(|e| format!("response does not match item shape: {}", e))?;

    item.question = item.question.trim().to_string();
    item.unit = item.unit.trim().to_string();
    item.category = item.category.trim().to_lowercase();
    item.summary = clean_summary(&item.summary);
    item.source_name = item.source_name.trim().to_string();
    item.source_url = item.source_url.trim().to_string();

    item.validate().map_err(|e| e.to_string())?;
    // The stored summary is the duplicate-detection key, so it gets the full topic rules.
    validate_summary(&item.summary)?;

    if !item.answer.is_finite() {
        return Err("answer must be finite".to_string());
    }

    if !item
        .question
        .to_lowercase()
        .contains(&item.unit.to_lowercase())
    {
        return Err(format!(
            "question does not reference its unit '{}'",
            item.unit
        ));
    }

    Ok(item)
}
