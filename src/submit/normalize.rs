//! Coerce generator output into a deterministic shape.
//!
//! Callers always receive a JSON object: either the structured content the
//! generator produced, or `{"unparsed": <raw text>}`. Malformed output is
//! never an error.
use crate::generate::RawOutput;
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;

pub const UNPARSED_KEY: &str = "unparsed";

#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    pub content: Value,
    pub structured: bool,
}

impl Normalized {
    fn structured(content: Map<String, Value>) -> Self {
        Self {
            content: Value::Object(content),
            structured: true,
        }
    }

    fn unparsed(raw: &str) -> Self {
        let mut wrapper = Map::new();
        wrapper.insert(UNPARSED_KEY.to_string(), Value::String(raw.to_string()));
        Self {
            content: Value::Object(wrapper),
            structured: false,
        }
    }
}

pub fn normalize(raw: RawOutput) -> Normalized {
    match raw {
        RawOutput::Structured(Value::Object(map)) => Normalized::structured(map),
        RawOutput::Structured(Value::String(text)) | RawOutput::Text(text) => normalize_text(&text),
        RawOutput::Structured(other) => Normalized::unparsed(&other.to_string()),
    }
}

fn normalize_text(raw: &str) -> Normalized {
    let stripped = strip_code_fences(raw);
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(&stripped) {
        return Normalized::structured(map);
    }
    if let Some(map) = fenced_block(raw).and_then(parse_object) {
        return Normalized::structured(map);
    }
    if let Some(map) = extract_object_from_text(raw) {
        return Normalized::structured(map);
    }
    Normalized::unparsed(raw)
}

fn parse_object(text: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// Drop a leading and trailing fence line when the whole text is fenced.
fn strip_code_fences(raw: &str) -> String {
    let trimmed = raw.trim();
    if !trimmed.starts_with("```") {
        return trimmed.to_string();
    }
    let mut lines: Vec<&str> = trimmed.lines().collect();
    if lines.first().is_some_and(|line| line.trim_start().starts_with("```")) {
        lines.remove(0);
    }
    if lines.last().is_some_and(|line| line.trim_start().starts_with("```")) {
        lines.pop();
    }
    lines.join("\n").trim().to_string()
}

/// First fenced block embedded in surrounding prose.
fn fenced_block(raw: &str) -> Option<&str> {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    let fence = FENCE.get_or_init(|| {
        Regex::new(r"(?s)```[A-Za-z0-9_-]*[ \t]*\r?\n(.*?)```").expect("regex for fenced block")
    });
    fence
        .captures(raw)
        .and_then(|cap| cap.get(1))
        .map(|body| body.as_str())
}

/// First balanced top-level `{...}` span that parses as a JSON object.
fn extract_object_from_text(raw: &str) -> Option<Map<String, Value>> {
    object_spans(raw).find_map(parse_object)
}

/// Top-level brace-balanced spans, found in one pass. Braces inside JSON
/// strings do not count.
fn object_spans(raw: &str) -> impl Iterator<Item = &str> {
    let mut spans = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (idx, byte) in raw.bytes().enumerate() {
        if in_string {
            match byte {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match byte {
            b'"' if depth > 0 => in_string = true,
            b'{' => {
                if depth == 0 {
                    start = idx;
                }
                depth += 1;
            }
            b'}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    spans.push(&raw[start..=idx]);
                }
            }
            _ => {}
        }
    }
    spans.into_iter()
}
