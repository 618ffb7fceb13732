mod common;

use rand::rngs::StdRng;
use rand::SeedableRng;

use research_golem::digest::{
    build_digest_html, build_digest_text, extract_up_to_tldr, select_past_pages,
};

use common::{make_error_record, make_page, make_record};

const FULL_BRIEF: &str = "## 1) Headline\nBrine mining scales.\n\n## 3) TL;DR\n- Direct lithium extraction is commercial.\n\n## 4) What I found\nLong body the email should not carry.\n\n### 7) Recommended reads\n- [Paper](https://example.com/paper)";

#[test]
fn excerpt_stops_before_findings_section() {
    let excerpt = extract_up_to_tldr(FULL_BRIEF);
    assert!(excerpt.contains("## 3) TL;DR"));
    assert!(!excerpt.contains("## 4)"));
    assert!(!excerpt.contains("Long body"));
    // Trailing blank lines before the cutoff are trimmed.
    assert!(!excerpt.ends_with('\n'));
}

#[test]
fn excerpt_without_marker_is_bounded() {
    let long_text = "word ".repeat(500);
    let excerpt = extract_up_to_tldr(&long_text);
    assert_eq!(excerpt.chars().count(), 1000);

    let short_text = "just a short brief";
    assert_eq!(extract_up_to_tldr(short_text), short_text);
}

#[test]
fn digest_text_carries_titles_costs_and_total() {
    let queue = vec![
        make_record("page-1", "Battery notes", FULL_BRIEF, 0.0150),
        make_record("page-2", "Sleep research", "## 1) Headline\nShort.", 0.0250),
    ];
    let text = build_digest_text(&queue);

    assert!(text.starts_with("Research Golem Digest"));
    assert!(text.contains("Battery notes"));
    assert!(text.contains("Notion: https://notion.so/page-1"));
    assert!(text.contains("Cost: $0.0150"));
    assert!(text.contains("Total estimated cost: $0.0400"));
    // The excerpt is stripped of markdown markers.
    assert!(!text.contains("## 1)"));
    assert!(!text.contains("Errors:"));
}

#[test]
fn digest_text_lists_errors() {
    let queue = vec![
        make_record("page-1", "Good page", FULL_BRIEF, 0.01),
        make_error_record("page-2", "Bad page", "Rate limit exceeded - will retry next cycle."),
    ];
    let text = build_digest_text(&queue);

    assert!(text.contains("[ERROR] Rate limit exceeded"));
    assert!(text.contains("Errors:"));
    assert!(text.contains("  - Bad page: Rate limit exceeded"));
}

#[test]
fn digest_html_renders_links_and_error_callouts() {
    let queue = vec![
        make_record("page-1", "Battery notes", FULL_BRIEF, 0.01),
        make_error_record("page-2", "Bad page", "Notion API error: boom"),
    ];
    let html = build_digest_html(&queue);

    assert!(html.starts_with("<!DOCTYPE html>"));
    assert!(html.contains(r#"<a href="https://notion.so/page-1""#));
    assert!(html.contains("<strong>Error:</strong> Notion API error: boom"));
    assert!(html.contains("Total estimated cost: $0.0100"));
    // Markdown link inside the excerpt stays out (it sits past the cutoff),
    // but headings up to the cutoff are rendered as tags.
    assert!(html.contains("<h2"));
}

#[test]
fn select_returns_all_when_pool_is_small() {
    let pages = vec![
        make_page("a", "A", "2026-01-01T00:00:00.000Z"),
        make_page("b", "B", "2026-01-02T00:00:00.000Z"),
    ];
    let mut rng = StdRng::seed_from_u64(7);
    let picked = select_past_pages(&pages, 3, &mut rng);
    assert_eq!(picked.len(), 2);
}

#[test]
fn select_draws_distinct_pages() {
    let pages: Vec<_> = (0..7)
        .map(|i| {
            make_page(
                &format!("p{}", i),
                &format!("Page {}", i),
                &format!("2026-01-0{}T00:00:00.000Z", i + 1),
            )
        })
        .collect();

    let mut rng = StdRng::seed_from_u64(42);
    let picked = select_past_pages(&pages, 3, &mut rng);
    assert_eq!(picked.len(), 3);

    let mut ids: Vec<_> = picked.iter().map(|p| p.id.as_str()).collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 3);
}

#[test]
fn select_favors_newer_pages() {
    let pages: Vec<_> = (0..10)
        .map(|i| {
            make_page(
                &format!("p{}", i),
                &format!("Page {}", i),
                &format!("2026-01-{:02}T00:00:00.000Z", i + 1),
            )
        })
        .collect();

    let mut rng = StdRng::seed_from_u64(1234);
    let mut newest_hits = 0u32;
    let mut oldest_hits = 0u32;
    for _ in 0..300 {
        for page in select_past_pages(&pages, 3, &mut rng) {
            if page.id == "p9" {
                newest_hits += 1;
            }
            if page.id == "p0" {
                oldest_hits += 1;
            }
        }
    }

    // With linear rank weights the newest page is drawn ~10x as often as the
    // oldest; a strict inequality is a safe assertion over 300 trials.
    assert!(newest_hits > oldest_hits);
    // The oldest page still surfaces occasionally.
    assert!(oldest_hits > 0);
}
