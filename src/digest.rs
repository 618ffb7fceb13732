//! Digest rendering and past-page selection.

use std::sync::OnceLock;

use rand::seq::index::sample_weighted;
use rand::Rng;
use regex::Regex;

use crate::types::{Page, QueueRecord};

pub const DIGEST_SUBJECT: &str = "Research Golem Digest";
pub const PAST_DIGEST_SUBJECT: &str = "Research Golem Digest (past highlights)";

const FALLBACK_EXCERPT_CHARS: usize = 1000;

// --- Excerpting ---

fn cutoff_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^## 4\)").expect("cutoff regex is valid"))
}

/// Return everything before the `## 4)` section of a research brief, so the
/// email carries headline through TL;DR only. Falls back to a bounded prefix
/// when the marker is absent.
pub fn extract_up_to_tldr(research_text: &str) -> String {
    if let Some(m) = cutoff_re().find(research_text) {
        return research_text[..m.start()].trim_end().to_string();
    }
    research_text.chars().take(FALLBACK_EXCERPT_CHARS).collect()
}

// --- Past-page selection ---

/// Select `n` distinct pages from a pool of previously researched pages.
///
/// Returns the whole pool when it holds `n` or fewer. Otherwise samples
/// without replacement with linear rank weights, so newer pages are drawn
/// more often but older ones still surface.
pub fn select_past_pages<R: Rng + ?Sized>(pages: &[Page], n: usize, rng: &mut R) -> Vec<Page> {
    if pages.len() <= n {
        return pages.to_vec();
    }

    let mut order: Vec<usize> = (0..pages.len()).collect();
    order.sort_by(|&a, &b| pages[a].created_time.cmp(&pages[b].created_time));

    match sample_weighted(rng, order.len(), |rank| (rank + 1) as f64, n) {
        Ok(picked) => picked
            .into_iter()
            .map(|rank| pages[order[rank]].clone())
            .collect(),
        // Weights are strictly positive, so sampling cannot fail; take the
        // newest n if it somehow does.
        Err(_) => order[order.len() - n..]
            .iter()
            .map(|&i| pages[i].clone())
            .collect(),
    }
}

// --- Plain-text digest ---

struct StripRes {
    bold_italic: Regex,
    bold: Regex,
    italic: Regex,
    link: Regex,
    heading: Regex,
}

fn strip_res() -> &'static StripRes {
    static RES: OnceLock<StripRes> = OnceLock::new();
    RES.get_or_init(|| StripRes {
        bold_italic: Regex::new(r"\*\*\*(.+?)\*\*\*").expect("valid regex"),
        bold: Regex::new(r"\*\*(.+?)\*\*").expect("valid regex"),
        italic: Regex::new(r"\*(.+?)\*").expect("valid regex"),
        link: Regex::new(r"\[([^\]]+)\]\(([^)]+)\)").expect("valid regex"),
        heading: Regex::new(r"(?m)^#{1,3} ").expect("valid regex"),
    })
}

/// Strip inline markdown down to plain text for the text/plain body.
fn strip_markdown(text: &str) -> String {
    let res = strip_res();
    let text = res.bold_italic.replace_all(text, "$1");
    let text = res.bold.replace_all(&text, "$1");
    let text = res.italic.replace_all(&text, "$1");
    let text = res.link.replace_all(&text, "$1");
    res.heading.replace_all(&text, "").into_owned()
}

/// Build the plain-text digest body from queue records.
pub fn build_digest_text(queue: &[QueueRecord]) -> String {
    let mut lines = vec![
        "Research Golem Digest".to_string(),
        "=".repeat(40),
        String::new(),
    ];

    let mut total_cost = 0.0;
    let mut errors = Vec::new();

    for record in queue {
        total_cost += record.cost;

        lines.push(record.title.clone());
        if !record.url.is_empty() {
            lines.push(format!("Notion: {}", record.url));
        }
        if !record.processed_at.is_empty() {
            lines.push(format!("Processed: {}", record.processed_at));
        }
        lines.push(format!("Cost: ${:.4}", record.cost));
        lines.push(String::new());

        if let Some(ref any_error) = record.any_error {
            errors.push(format!("  - {}: {}", record.title, any_error));
            lines.push(format!("[ERROR] {}", any_error));
        } else if let Some(ref research_text) = record.research_text {
            lines.push(strip_markdown(&extract_up_to_tldr(research_text)));
        }

        lines.push(String::new());
        lines.push("-".repeat(40));
        lines.push(String::new());
    }

    lines.push(format!("Total estimated cost: ${:.4}", total_cost));

    if !errors.is_empty() {
        lines.push(String::new());
        lines.push("Errors:".to_string());
        lines.extend(errors);
    }

    lines.join("\n")
}

// --- HTML digest ---

fn inline_md_to_html(text: &str) -> String {
    let res = strip_res();
    let text = res.link.replace_all(text, r#"<a href="$2">$1</a>"#);
    let text = res.bold_italic.replace_all(&text, "<strong><em>$1</em></strong>");
    let text = res.bold.replace_all(&text, "<strong>$1</strong>");
    res.italic.replace_all(&text, "<em>$1</em>").into_owned()
}

/// Render a markdown excerpt as a minimal inline-styled HTML fragment.
fn markdown_to_html(markdown: &str) -> String {
    let mut parts: Vec<String> = Vec::new();
    let mut in_ul = false;

    let mut close_ul = |parts: &mut Vec<String>, in_ul: &mut bool| {
        if *in_ul {
            parts.push("</ul>".to_string());
            *in_ul = false;
        }
    };

    for line in markdown.split('\n') {
        if let Some(text) = line.strip_prefix("### ") {
            close_ul(&mut parts, &mut in_ul);
            parts.push(format!(
                r#"<h3 style="font-size:15px;margin:20px 0 4px;">{}</h3>"#,
                inline_md_to_html(text.trim())
            ));
        } else if let Some(text) = line.strip_prefix("## ") {
            close_ul(&mut parts, &mut in_ul);
            parts.push(format!(
                r#"<h2 style="font-size:16px;margin:20px 0 4px;">{}</h2>"#,
                inline_md_to_html(text.trim())
            ));
        } else if let Some(text) = line.strip_prefix("# ") {
            close_ul(&mut parts, &mut in_ul);
            parts.push(format!(
                r#"<h1 style="font-size:18px;margin:20px 0 4px;">{}</h1>"#,
                inline_md_to_html(text.trim())
            ));
        } else if let Some(text) = line.strip_prefix("- ").or_else(|| line.strip_prefix("* ")) {
            if !in_ul {
                parts.push(r#"<ul style="margin:8px 0;padding-left:20px;">"#.to_string());
                in_ul = true;
            }
            parts.push(format!(
                r#"<li style="margin-bottom:4px;">{}</li>"#,
                inline_md_to_html(text.trim())
            ));
        } else if matches!(line.trim(), "---" | "***" | "___") {
            close_ul(&mut parts, &mut in_ul);
            parts.push(
                r#"<hr style="border:none;border-top:1px solid #e0e0e0;margin:16px 0;">"#
                    .to_string(),
            );
        } else if line.trim().is_empty() {
            close_ul(&mut parts, &mut in_ul);
        } else {
            close_ul(&mut parts, &mut in_ul);
            parts.push(format!(
                r#"<p style="margin:6px 0;line-height:1.6;">{}</p>"#,
                inline_md_to_html(line.trim())
            ));
        }
    }

    close_ul(&mut parts, &mut in_ul);
    parts.join("\n")
}

/// Build the HTML digest body from queue records.
pub fn build_digest_html(queue: &[QueueRecord]) -> String {
    let total_cost: f64 = queue.iter().map(|r| r.cost).sum();
    let mut errors = Vec::new();
    let mut pages_html = Vec::new();

    for record in queue {
        let notion_link = if record.url.is_empty() {
            String::new()
        } else {
            format!(
                r#"<a href="{}" style="color:#555;text-decoration:none;">Open in Notion ↗</a>"#,
                record.url
            )
        };
        let meta: Vec<String> = [
            notion_link,
            record.processed_at.clone(),
            format!("${:.4}", record.cost),
        ]
        .into_iter()
        .filter(|p| !p.is_empty())
        .collect();
        let meta = meta.join(" &nbsp;·&nbsp; ");

        let content_html = if let Some(ref any_error) = record.any_error {
            errors.push(format!("{}: {}", record.title, any_error));
            format!(
                r#"<p style="color:#c0392b;background:#fdf2f2;padding:10px 14px;border-radius:4px;margin:12px 0;"><strong>Error:</strong> {}</p>"#,
                any_error
            )
        } else if let Some(ref research_text) = record.research_text {
            markdown_to_html(&extract_up_to_tldr(research_text))
        } else {
            r#"<p style="color:#888;">No content available.</p>"#.to_string()
        };

        pages_html.push(format!(
            r#"
        <div style="margin-bottom:40px;padding-bottom:40px;border-bottom:1px solid #e8e8e8;">
          <h2 style="font-size:20px;margin:0 0 6px;font-family:Georgia,serif;">{title}</h2>
          <p style="font-size:13px;color:#999;margin:0 0 18px;">{meta}</p>
          {content}
        </div>"#,
            title = record.title,
            meta = meta,
            content = content_html,
        ));
    }

    let errors_section = if errors.is_empty() {
        String::new()
    } else {
        let items: String = errors.iter().map(|e| format!("<li>{}</li>", e)).collect();
        format!(
            r#"<div style="margin-top:16px;"><strong>Errors:</strong><ul style="margin:6px 0;">{}</ul></div>"#,
            items
        )
    };

    format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><meta name="viewport" content="width=device-width,initial-scale=1"></head>
<body style="font-family:Georgia,serif;max-width:660px;margin:0 auto;padding:28px 24px 48px;color:#1a1a1a;background:#ffffff;line-height:1.6;">

  <h1 style="font-size:24px;font-weight:bold;border-bottom:2px solid #1a1a1a;padding-bottom:12px;margin:0 0 32px;">Research Golem Digest</h1>

  {pages}

  <div style="font-size:13px;color:#999;border-top:1px solid #e0e0e0;padding-top:14px;margin-top:8px;">
    Total estimated cost: ${total:.4}
    {errors}
  </div>

</body>
</html>"#,
        pages = pages_html.join(""),
        total = total_cost,
        errors = errors_section,
    )
}
