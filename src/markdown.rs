//! Markdown to workspace-block conversion.
//!
//! The workspace API caps each rich-text segment at 2000 characters, so all
//! text is chunked on char boundaries before it becomes a segment.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{json, Value};

const MAX_SEGMENT_CHARS: usize = 2000;

/// Inline syntax, longest patterns first so `***x***` is not eaten by `**`.
fn inline_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?s)\*\*\*(.+?)\*\*\*|\*\*(.+?)\*\*|\*(.+?)\*|`([^`]+)`|\[([^\]]+)\]\(([^)]+)\)",
        )
        .expect("inline markdown regex is valid")
    })
}

fn numbered_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d+\. ").expect("numbered list regex is valid"))
}

/// Split text into 2000-char segments.
fn split_text_chunks(text: &str) -> Vec<Value> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(MAX_SEGMENT_CHARS)
        .map(|chunk| {
            let content: String = chunk.iter().collect();
            json!({"type": "text", "text": {"content": content}})
        })
        .collect()
}

fn annotated_chunks(text: &str, annotations: Value) -> Vec<Value> {
    split_text_chunks(text)
        .into_iter()
        .map(|mut seg| {
            seg["annotations"] = annotations.clone();
            seg
        })
        .collect()
}

fn char_prefix(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// Parse inline markdown (`***`, `**`, `*`, backtick code, links) into
/// rich-text segments.
pub fn parse_rich_text(text: &str) -> Vec<Value> {
    if text.is_empty() {
        return vec![json!({"type": "text", "text": {"content": ""}})];
    }

    let mut rich_text = Vec::new();
    let mut last_end = 0;

    for caps in inline_re().captures_iter(text) {
        let m = caps.get(0).expect("whole-match group always present");
        if m.start() > last_end {
            rich_text.extend(split_text_chunks(&text[last_end..m.start()]));
        }

        if let Some(seg) = caps.get(1) {
            rich_text.extend(annotated_chunks(seg.as_str(), json!({"bold": true, "italic": true})));
        } else if let Some(seg) = caps.get(2) {
            rich_text.extend(annotated_chunks(seg.as_str(), json!({"bold": true})));
        } else if let Some(seg) = caps.get(3) {
            rich_text.extend(annotated_chunks(seg.as_str(), json!({"italic": true})));
        } else if let Some(seg) = caps.get(4) {
            rich_text.extend(annotated_chunks(seg.as_str(), json!({"code": true})));
        } else if let (Some(link_text), Some(link_url)) = (caps.get(5), caps.get(6)) {
            rich_text.push(json!({
                "type": "text",
                "text": {
                    "content": char_prefix(link_text.as_str(), MAX_SEGMENT_CHARS),
                    "link": {"url": link_url.as_str()},
                },
            }));
        }

        last_end = m.end();
    }

    if last_end < text.len() {
        rich_text.extend(split_text_chunks(&text[last_end..]));
    }

    if rich_text.is_empty() {
        rich_text.push(json!({
            "type": "text",
            "text": {"content": char_prefix(text, MAX_SEGMENT_CHARS)},
        }));
    }

    rich_text
}

/// Convert a markdown string into a list of workspace block objects.
///
/// Handles fenced code, headings 1-3, bulleted and numbered lists, dividers,
/// and paragraphs. Blank lines produce no block.
pub fn markdown_to_blocks(markdown: &str) -> Vec<Value> {
    let lines: Vec<&str> = markdown.split('\n').collect();
    let mut blocks = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i];

        if let Some(fence) = line.strip_prefix("```") {
            let lang = fence.trim();
            let mut code_lines = Vec::new();
            i += 1;
            while i < lines.len() && !lines[i].starts_with("```") {
                code_lines.push(lines[i]);
                i += 1;
            }
            let code = code_lines.join("\n");
            blocks.push(json!({
                "object": "block",
                "type": "code",
                "code": {
                    "rich_text": [{"type": "text", "text": {"content": char_prefix(&code, MAX_SEGMENT_CHARS)}}],
                    "language": if lang.is_empty() { "plain text" } else { lang },
                },
            }));
        } else if let Some(text) = line.strip_prefix("### ") {
            blocks.push(heading_block("heading_3", text.trim()));
        } else if let Some(text) = line.strip_prefix("## ") {
            blocks.push(heading_block("heading_2", text.trim()));
        } else if let Some(text) = line.strip_prefix("# ") {
            blocks.push(heading_block("heading_1", text.trim()));
        } else if let Some(text) = line.strip_prefix("- ").or_else(|| line.strip_prefix("* ")) {
            blocks.push(json!({
                "object": "block",
                "type": "bulleted_list_item",
                "bulleted_list_item": {"rich_text": parse_rich_text(text.trim())},
            }));
        } else if let Some(m) = numbered_re().find(line) {
            let text = line[m.end()..].trim();
            blocks.push(json!({
                "object": "block",
                "type": "numbered_list_item",
                "numbered_list_item": {"rich_text": parse_rich_text(text)},
            }));
        } else if matches!(line.trim(), "---" | "***" | "___") {
            blocks.push(json!({"object": "block", "type": "divider", "divider": {}}));
        } else if line.trim().is_empty() {
            // skip
        } else {
            blocks.push(json!({
                "object": "block",
                "type": "paragraph",
                "paragraph": {"rich_text": parse_rich_text(line.trim())},
            }));
        }

        i += 1;
    }

    blocks
}

fn heading_block(kind: &str, text: &str) -> Value {
    json!({
        "object": "block",
        "type": kind,
        kind: {"rich_text": parse_rich_text(text)},
    })
}
