//! Best-effort JSON extraction from language-model output.
//!
//! Classifier responses are prose that *contains* a JSON blob, often wrapped
//! in explanation or markdown fences. This module isolates the extraction
//! heuristic in one place: find the first balanced `{...}` or `[...]` and
//! parse it. Callers get a typed result or the raw text back for debugging —
//! a parse failure is never silently defaulted.

use serde::de::DeserializeOwned;
use thiserror::Error;

/// Extraction failure carrying the raw model output for the task record.
#[derive(Debug, Error)]
pub enum JsonExtractError {
    #[error("no JSON object or array found in model output: {raw}")]
    NotFound { raw: String },
    #[error("model output contained invalid JSON ({source}): {raw}")]
    Invalid {
        raw: String,
        #[source]
        source: serde_json::Error,
    },
}

impl JsonExtractError {
    /// The raw model output, preserved for the task's error record.
    pub fn raw(&self) -> &str {
        match self {
            JsonExtractError::NotFound { raw } | JsonExtractError::Invalid { raw, .. } => raw,
        }
    }
}

/// Extract and deserialize the first balanced JSON value from free-form text.
pub fn extract_json<T: DeserializeOwned>(text: &str) -> Result<T, JsonExtractError> {
    let candidate = first_json_span(text).ok_or_else(|| JsonExtractError::NotFound {
        raw: truncate(text, 2000),
    })?;

    serde_json::from_str(candidate).map_err(|source| JsonExtractError::Invalid {
        raw: truncate(text, 2000),
        source,
    })
}

/// Find the first balanced `{...}` or `[...]` span in the text.
///
/// Tracks string literals and escapes so braces inside strings don't
/// unbalance the scan.
fn first_json_span(text: &str) -> Option<&str> {
    let bytes = text.as_bytes();
    let start = bytes.iter().position(|&b| b == b'{' || b == b'[')?;

    let open = bytes[start];
    let close = if open == b'{' { b'}' } else { b']' };

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }

        match b {
            b'"' => in_string = true,
            _ if b == open => depth += 1,
            _ if b == close => {
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

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].to_string()
}
