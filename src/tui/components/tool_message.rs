//! # Tool Summaries and JSON View
//!
//! Line builders for the two structured parts of a message:
//!
//! - one summary per tool execution: `⚡ calculate({"expression":"1 + 2"}) ✓`
//! - a pretty-printed, coloured view when the whole content is a JSON
//!   object or array (structured-output replies)

use serde_json::Value;

use crate::core::message::{LineTone, RenderedLine, ToolExecution};
use crate::tui::theme::{self, paint};

/// Longest parameter preview, in characters, including the `...`.
pub const MAX_PREVIEW_CHARS: usize = 100;

pub const JSON_HEADER: &str = "JSON Response:";

/// Compact JSON when `raw` parses, otherwise the trimmed text; capped at
/// [`MAX_PREVIEW_CHARS`].
pub fn params_preview(raw: &str) -> String {
    let trimmed = raw.trim();
    let compact = serde_json::from_str::<Value>(trimmed)
        .map(|value| value.to_string())
        .unwrap_or_else(|_| trimmed.to_string());
    truncate_to(&compact, MAX_PREVIEW_CHARS)
}

/// Keeps `budget` characters, the last three replaced by `...` when cut.
fn truncate_to(s: &str, budget: usize) -> String {
    if s.chars().count() <= budget {
        return s.to_string();
    }
    let kept: String = s.chars().take(budget.saturating_sub(3)).collect();
    format!("{kept}...")
}

pub fn summary_line(execution: &ToolExecution) -> RenderedLine {
    let (marker, tone) = if execution.is_complete() {
        ("✓", LineTone::ToolDone)
    } else {
        ("…", LineTone::ToolPending)
    };
    RenderedLine::new(
        format!(
            "⚡ {}({}) {marker}",
            execution.tool_name,
            params_preview(&execution.parameters)
        ),
        tone,
    )
}

/// The content as JSON, if all of it is one object or array.
pub fn parse_json_document(content: &str) -> Option<Value> {
    let trimmed = content.trim();
    if !(trimmed.starts_with('{') || trimmed.starts_with('[')) {
        return None;
    }
    serde_json::from_str::<Value>(trimmed)
        .ok()
        .filter(|value| value.is_object() || value.is_array())
}

pub fn json_view(value: &Value) -> Vec<RenderedLine> {
    let pretty = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
    std::iter::once(RenderedLine::new(JSON_HEADER, LineTone::JsonHeader))
        .chain(pretty.lines().map(json_line))
        .collect()
}

/// Colours one line of pretty-printed JSON. Keys take the line's tone;
/// values and punctuation carry their own escapes.
fn json_line(line: &str) -> RenderedLine {
    let body = line.trim_start();
    let indent = &line[..line.len() - body.len()];

    if body
        .chars()
        .all(|c| matches!(c, '{' | '}' | '[' | ']' | ','))
    {
        return RenderedLine::new(line, LineTone::JsonPunct);
    }

    if let Some(end) = key_end(body) {
        let (key, rest) = body.split_at(end);
        let value = rest.trim_start_matches(':').trim_start();
        return RenderedLine::new(
            format!(
                "{indent}{key}{}{}",
                paint(": ", theme::JSON_BRACE),
                color_value(value)
            ),
            LineTone::JsonKey,
        );
    }

    RenderedLine::new(format!("{indent}{}", color_value(body)), LineTone::JsonValue)
}

/// Byte index just past a leading quoted key followed by `:`.
fn key_end(body: &str) -> Option<usize> {
    let bytes = body.as_bytes();
    if bytes.first() != Some(&b'"') {
        return None;
    }
    let mut i = 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'"' => {
                return (bytes.get(i + 1) == Some(&b':')).then_some(i + 1);
            }
            _ => i += 1,
        }
    }
    None
}

fn color_value(text: &str) -> String {
    let (value, comma) = match text.strip_suffix(',') {
        Some(v) if !v.starts_with('"') || (v.len() >= 2 && v.ends_with('"')) => (v, ","),
        _ => (text, ""),
    };
    let color = match value {
        "true" | "false" => theme::JSON_BOOLEAN,
        "null" => theme::JSON_NULL,
        v if v.starts_with('"') => theme::JSON_STRING,
        v if v.starts_with(['{', '[']) => theme::JSON_BRACE,
        _ => theme::JSON_NUMBER,
    };
    let mut out = paint(value, color);
    if !comma.is_empty() {
        out.push_str(&paint(comma, theme::JSON_BRACE));
    }
    out
}
