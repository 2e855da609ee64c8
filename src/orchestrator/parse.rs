//! Tolerant JSON extraction from LLM output.
//!
//! Models asked for JSON frequently wrap it in prose or a fenced code block.
//! Extraction is a three-stage pipeline: direct parse, fenced-block parse,
//! then first top-level `{...}` span. Failures degrade to a typed
//! [`Extracted::Malformed`] value; parsing never panics or propagates.

use serde_json::Value;

/// Result of attempting to extract JSON from raw model output.
#[derive(Debug)]
pub enum Extracted {
    Parsed(Value),
    /// Human-readable reason the output could not be parsed.
    Malformed(String),
}

impl Extracted {
    pub fn into_value(self) -> Option<Value> {
        match self {
            Self::Parsed(v) => Some(v),
            Self::Malformed(_) => None,
        }
    }
}

/// Extract a JSON value from raw model output.
pub fn extract_json(raw: &str) -> Extracted {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Extracted::Malformed("model output was empty".to_string());
    }

    // Stage 1: the whole response is JSON
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return Extracted::Parsed(value);
    }

    // Stage 2: a fenced code block contains JSON
    if let Some(block) = extract_fenced_block(trimmed) {
        if let Ok(value) = serde_json::from_str::<Value>(block.trim()) {
            return Extracted::Parsed(value);
        }
    }

    // Stage 3: the first balanced top-level {...} span
    if let Some(span) = extract_brace_span(trimmed) {
        if let Ok(value) = serde_json::from_str::<Value>(span) {
            return Extracted::Parsed(value);
        }
    }

    let preview: String = trimmed.chars().take(200).collect();
    Extracted::Malformed(format!(
        "no parseable JSON found in model output: {}",
        preview
    ))
}

/// Pull the contents of the first fenced code block (``` or ```json).
fn extract_fenced_block(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let after_fence = &text[start + 3..];
    // Skip an optional language tag on the fence line
    let body_start = after_fence.find('\n')? + 1;
    let body = &after_fence[body_start..];
    let end = body.find("```")?;
    Some(&body[..end])
}

/// Find the first balanced top-level `{...}` span, respecting strings.
fn extract_brace_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if escaped {
            escaped = false;
            continue;
        }
        match b {
            b'\\' if in_string => escaped = true,
            b'"' => in_string = !in_string,
            b'{' if !in_string => depth += 1,
            b'}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=i]);
                }
            }
            _ => {}
        }
    }

    None
}
