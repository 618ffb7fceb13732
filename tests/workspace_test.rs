use serde_json::json;

use research_golem::workspace::{blocks_to_text, page_from_value, page_title};

fn text_segment(content: &str) -> serde_json::Value {
    json!({"plain_text": content})
}

#[test]
fn page_from_value_maps_fields() {
    let raw = json!({
        "id": "abc-123",
        "url": "https://notion.so/abc-123",
        "created_time": "2026-02-01T09:30:00.000Z",
        "properties": {
            "Name": {
                "type": "title",
                "title": [text_segment("Battery "), text_segment("notes")],
            },
            "Research": {"type": "checkbox", "checkbox": true},
        },
    });

    let page = page_from_value(&raw);
    assert_eq!(page.id, "abc-123");
    assert_eq!(page.title, "Battery notes");
    assert_eq!(page.url, "https://notion.so/abc-123");
    assert_eq!(page.created_time, "2026-02-01T09:30:00.000Z");
}

#[test]
fn page_title_falls_back_to_untitled() {
    assert_eq!(page_title(&json!({"properties": {}})), "Untitled");
    assert_eq!(
        page_title(&json!({
            "properties": {"Name": {"type": "title", "title": []}}
        })),
        "Untitled"
    );
    // Missing properties entirely.
    assert_eq!(page_title(&json!({"id": "x"})), "Untitled");
}

#[test]
fn blocks_to_text_renders_block_types() {
    let blocks = vec![
        json!({"type": "heading_1", "heading_1": {"rich_text": [text_segment("Title")]}}),
        json!({"type": "heading_3", "heading_3": {"rich_text": [text_segment("Sub")]}}),
        json!({"type": "paragraph", "paragraph": {"rich_text": [text_segment("Body text.")]}}),
        json!({"type": "bulleted_list_item", "bulleted_list_item": {"rich_text": [text_segment("point")]}}),
        json!({"type": "numbered_list_item", "numbered_list_item": {"rich_text": [text_segment("step")]}}),
        json!({"type": "quote", "quote": {"rich_text": [text_segment("wise words")]}}),
        json!({"type": "code", "code": {"rich_text": [text_segment("let x = 1;")], "language": "rust"}}),
        json!({"type": "divider", "divider": {}}),
    ];

    let text = blocks_to_text(&blocks);
    assert_eq!(
        text,
        "# Title\n### Sub\nBody text.\n- point\n1. step\n> wise words\n```rust\nlet x = 1;\n```\n---"
    );
}

#[test]
fn blocks_to_text_skips_empty_and_unknown() {
    let blocks = vec![
        json!({"type": "paragraph", "paragraph": {"rich_text": []}}),
        json!({"type": "unsupported_embed", "unsupported_embed": {}}),
        json!({"type": "paragraph", "paragraph": {"rich_text": [text_segment("kept")]}}),
    ];
    assert_eq!(blocks_to_text(&blocks), "kept");
}
