//! Response normalization
//!
//! Turns a raw provider completion into `{suggestedName, reasoning, confidence}` and
//! makes the name safe to use as a file name. Parsing is best effort: a structured
//! parse first, otherwise the whole response is the name.

use chrono::Local;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;

/// Name-shaping settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NamingConfig {
    /// Maximum name length in characters, extension excluded
    pub max_name_length: usize,
    /// Replaces whitespace runs
    pub separator: char,
    /// Characters of OCR text kept by the heuristic namer
    pub heuristic_prefix_chars: usize,
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            max_name_length: 50,
            separator: '-',
            heuristic_prefix_chars: 20,
        }
    }
}

/// Canonical shape of a parsed provider response
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedResponse {
    pub suggested_name: String,
    pub reasoning: Option<String>,
    /// Model's self-reported confidence, clamped to [0, 1]
    pub confidence: Option<f32>,
}

/// Field names probed for the name, in order
const NAME_FIELDS: &[&str] = &["suggestedName", "suggested_name", "name", "content"];

#[derive(Debug, Clone)]
pub struct ResponseNormalizer {
    config: NamingConfig,
}

impl ResponseNormalizer {
    pub fn new(config: NamingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &NamingConfig {
        &self.config
    }

    /// Parse a raw completion. The name is returned as-is; see [`Self::sanitize`].
    pub fn parse(&self, raw: &str) -> NormalizedResponse {
        let trimmed = strip_code_fence(raw.trim());

        if let Some(parsed) = parse_structured(trimmed) {
            return parsed;
        }
        if let Some(parsed) = extract_json_object(trimmed).and_then(parse_structured) {
            return parsed;
        }

        NormalizedResponse {
            suggested_name: trimmed
                .trim_matches(|c: char| c == '"' || c == '\'' || c == '`')
                .trim()
                .to_string(),
            reasoning: None,
            confidence: None,
        }
    }

    /// Make a candidate safe as a file name (extension excluded).
    ///
    /// Strips characters illegal in file names, collapses whitespace into the
    /// separator, truncates to the configured length and trims leading dots and
    /// trailing dots/separators. Idempotent. An empty result becomes a timestamp name.
    pub fn sanitize(&self, name: &str) -> String {
        let cleaned = clean_name(name, self.config.max_name_length, self.config.separator);
        if cleaned.is_empty() {
            self.timestamp_name("file")
        } else {
            cleaned
        }
    }

    /// Final file name for a candidate: sanitized stem plus the original extension
    pub fn finalize(&self, candidate: &str, original_name: &str) -> String {
        let ext = extension_of(original_name);
        let stem = match ext {
            Some(ext) => strip_suffix_ignore_case(candidate.trim(), &format!(".{}", ext)),
            None => candidate.trim(),
        };
        with_extension(&self.sanitize(stem), ext)
    }

    /// `<prefix>-<yyyymmdd>-<hhmmss>`, sanitized
    pub fn timestamp_name(&self, prefix: &str) -> String {
        let sep = self.config.separator;
        let stamp = Local::now().format("%Y%m%d-%H%M%S").to_string();
        // Leave room for the stamp so long prefixes never push it out
        let budget = self
            .config
            .max_name_length
            .saturating_sub(stamp.chars().count() + 1);
        let prefix = clean_name(prefix, budget, sep);
        let raw = if prefix.is_empty() {
            stamp
        } else {
            format!("{}{}{}", prefix, sep, stamp)
        };
        let cleaned = clean_name(&raw, self.config.max_name_length, sep);
        if cleaned.is_empty() {
            // Only reachable with a zero max length
            Local::now().format("%Y%m%d%H%M%S").to_string()
        } else {
            cleaned
        }
    }

    /// Catch-all name: original stem plus timestamp, original extension kept
    pub fn error_fallback_name(&self, original_name: &str) -> String {
        let stem = file_stem(original_name);
        let stem = clean_name(stem, self.config.max_name_length, self.config.separator);
        let prefix = if stem.is_empty() { "file" } else { stem.as_str() };
        with_extension(&self.timestamp_name(prefix), extension_of(original_name))
    }
}

impl Default for ResponseNormalizer {
    fn default() -> Self {
        Self::new(NamingConfig::default())
    }
}

fn is_illegal(c: char) -> bool {
    matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*')
        || (c.is_control() && !c.is_whitespace())
}

fn clean_name(name: &str, max_len: usize, separator: char) -> String {
    let stripped: String = name.chars().filter(|c| !is_illegal(*c)).collect();

    let mut collapsed = String::with_capacity(stripped.len());
    for (i, word) in stripped.split_whitespace().enumerate() {
        if i > 0 {
            collapsed.push(separator);
        }
        collapsed.push_str(word);
    }

    let truncated: String = collapsed.chars().take(max_len).collect();
    truncated
        .trim_start_matches('.')
        .trim_end_matches(|c: char| c == '.' || c == separator || c.is_whitespace())
        .to_string()
}

fn parse_structured(text: &str) -> Option<NormalizedResponse> {
    let value: Value = serde_json::from_str(text).ok()?;
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(NormalizedResponse {
            suggested_name: s.trim().to_string(),
            reasoning: None,
            confidence: None,
        }),
        Value::Object(map) => from_object(&map),
        _ => None,
    }
}

fn from_object(map: &Map<String, Value>) -> Option<NormalizedResponse> {
    let name = NAME_FIELDS
        .iter()
        .filter_map(|key| map.get(*key).and_then(Value::as_str))
        .map(str::trim)
        .find(|s| !s.is_empty())?;

    let reasoning = map
        .get("reasoning")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    let confidence = map
        .get("confidence")
        .and_then(Value::as_f64)
        .filter(|c| c.is_finite())
        .map(|c| c.clamp(0.0, 1.0) as f32);

    Some(NormalizedResponse {
        suggested_name: name.to_string(),
        reasoning,
        confidence,
    })
}

/// Unwrap a ```json ... ``` or ``` ... ``` block if the whole response is one
fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let body = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Outermost `{ ... }` span of a response that has prose around the JSON
fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

fn file_stem(name: &str) -> &str {
    Path::new(name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(name)
}

fn extension_of(name: &str) -> Option<&str> {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty())
}

fn strip_suffix_ignore_case<'a>(text: &'a str, suffix: &str) -> &'a str {
    if text.len() >= suffix.len()
        && text.is_char_boundary(text.len() - suffix.len())
        && text[text.len() - suffix.len()..].eq_ignore_ascii_case(suffix)
    {
        &text[..text.len() - suffix.len()]
    } else {
        text
    }
}

fn with_extension(stem: &str, ext: Option<&str>) -> String {
    let ext: String = ext
        .unwrap_or_default()
        .chars()
        .filter(|c| !is_illegal(*c) && !c.is_whitespace())
        .collect();
    if ext.is_empty() {
        stem.to_string()
    } else {
        format!("{}.{}", stem, ext)
    }
}
