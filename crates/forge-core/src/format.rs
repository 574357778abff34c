//! Response formatting
//!
//! Every tool returns a structured JSON payload plus a text rendering of it.
//! The text comes in two modes:
//!
//! - **terse** (default): one summary line
//! - **verbose** ("compat"): the summary line followed by one detail line per
//!   item, e.g. `- id:7 @alice Looks good to me`
//!
//! Both modes render the same payload, which is returned unchanged.

use serde_json::{Map, Value};

/// Fields shown on a detail line, in display order.
const DETAIL_FIELDS: [&str; 7] = ["id", "number", "title", "state", "user", "author", "body"];

/// Longest body excerpt shown on a detail line, in characters.
const BODY_EXCERPT_LEN: usize = 80;

/// Text and structured halves of a tool result.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutput {
    pub text: String,
    pub structured: Value,
}

/// Render `payload` and keep it alongside the text.
pub fn format_tool_output(payload: Value, verbose: bool) -> ToolOutput {
    let text = format_result(&payload, verbose);
    ToolOutput {
        text,
        structured: payload,
    }
}

/// Render a structured payload as text.
pub fn format_result(payload: &Value, verbose: bool) -> String {
    let mut text = summary_line(payload);
    if verbose {
        for line in detail_lines(payload) {
            text.push('\n');
            text.push_str(&line);
        }
    }
    text
}

fn summary_line(payload: &Value) -> String {
    let Value::Object(fields) = payload else {
        return render_scalar(payload);
    };

    if let Some(Value::String(message)) = fields.get("message") {
        return message.clone();
    }

    let parts: Vec<String> = fields
        .iter()
        .filter_map(|(key, value)| match value {
            Value::Array(items) => Some(format!("{key}: {} items", items.len())),
            Value::Object(_) => None,
            scalar => Some(format!("{key}: {}", render_scalar(scalar))),
        })
        .collect();

    if parts.is_empty() {
        "ok".to_string()
    } else {
        parts.join(", ")
    }
}

fn detail_lines(payload: &Value) -> Vec<String> {
    let Value::Object(fields) = payload else {
        return Vec::new();
    };

    let mut lines = Vec::new();
    for value in fields.values() {
        match value {
            Value::Array(items) => lines.extend(items.iter().map(detail_line)),
            Value::Object(_) => lines.push(detail_line(value)),
            _ => {}
        }
    }
    lines
}

fn detail_line(item: &Value) -> String {
    let Value::Object(fields) = item else {
        return format!("- {}", render_scalar(item));
    };

    let mut parts: Vec<String> = DETAIL_FIELDS
        .iter()
        .filter_map(|key| render_field(key, fields.get(*key)?))
        .collect();

    // Objects without any well-known field, e.g. a resolution record
    if parts.is_empty() {
        parts = generic_fields(fields);
    }

    format!("- {}", parts.join(" "))
}

fn render_field(key: &str, value: &Value) -> Option<String> {
    if value.is_null() {
        return None;
    }
    let rendered = match key {
        "id" => format!("id:{}", render_scalar(value)),
        "number" => format!("#{}", render_scalar(value)),
        "state" => format!("[{}]", render_scalar(value)),
        "user" | "author" => format!("@{}", user_name(value)?),
        "body" => excerpt(value.as_str()?)?,
        _ => render_scalar(value),
    };
    Some(rendered)
}

fn generic_fields(fields: &Map<String, Value>) -> Vec<String> {
    fields
        .iter()
        .filter(|(_, value)| !value.is_array() && !value.is_object())
        .map(|(key, value)| format!("{key}={}", render_scalar(value)))
        .collect()
}

fn user_name(value: &Value) -> Option<String> {
    match value {
        Value::String(name) if !name.is_empty() => Some(name.clone()),
        Value::Object(user) => ["login", "username", "full_name"]
            .iter()
            .find_map(|key| user.get(*key).and_then(Value::as_str))
            .filter(|name| !name.is_empty())
            .map(str::to_string),
        _ => None,
    }
}

/// Single-line excerpt of a body; `None` for blank bodies.
fn excerpt(body: &str) -> Option<String> {
    let flat = body.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.is_empty() {
        return None;
    }
    if flat.chars().count() <= BODY_EXCERPT_LEN {
        return Some(flat);
    }
    let cut: String = flat.chars().take(BODY_EXCERPT_LEN).collect();
    Some(format!("{}...", cut.trim_end()))
}

fn render_scalar(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => "none".to_string(),
        other => other.to_string(),
    }
}
