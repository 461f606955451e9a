//! Fallback parsing of tool calls printed as JSON in message text
//!
//! Some models answer with `{"name": "terminal", "arguments": {...}}` in the
//! content instead of using the native `tool_calls` field. Only calls to
//! tools the agent actually has are accepted, so JSON the agent merely talks
//! about is left alone.

use serde_json::Value;

use super::chat::{FunctionCall, ToolCall};

/// Extract tool calls for any of `known_tools` from free-form text
pub fn parse_tool_calls_from_text(content: &str, known_tools: &[&str]) -> Vec<ToolCall> {
    let content = content.trim();

    // The whole reply may be a single call
    if let Some(call) = try_parse_tool_call(content, known_tools) {
        return vec![call];
    }

    json_objects(content)
        .into_iter()
        .filter_map(|candidate| try_parse_tool_call(candidate, known_tools))
        .collect()
}

/// Top-level `{...}` spans of `text`, ignoring braces inside JSON strings
fn json_objects(text: &str) -> Vec<&str> {
    let mut objects = Vec::new();
    let mut depth = 0usize;
    let mut start = None;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
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
            '"' if depth > 0 => in_string = true,
            '{' => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    if let Some(s) = start.take() {
                        objects.push(&text[s..=i]);
                    }
                }
            }
            _ => {}
        }
    }

    objects
}

fn try_parse_tool_call(json_str: &str, known_tools: &[&str]) -> Option<ToolCall> {
    let value: Value = serde_json::from_str(json_str).ok()?;
    let name = value.get("name").and_then(|n| n.as_str())?;
    if !known_tools.contains(&name) {
        return None;
    }

    // Some models use "parameters" instead of "arguments", and some send the
    // arguments as a JSON-encoded string
    let arguments = value.get("arguments").or_else(|| value.get("parameters"))?;
    let arguments = match arguments {
        Value::String(raw) => serde_json::from_str(raw).ok()?,
        other => other.clone(),
    };

    Some(ToolCall {
        function: FunctionCall {
            name: name.to_string(),
            arguments,
        },
    })
}
