use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use reqwest::Client;
use serde_json::{json, Value};
use tracing::warn;

use crate::error::PipelineError;
use crate::markdown;
use crate::types::Page;

/// Heading text that marks a page as already processed.
pub const RESULTS_MARKER: &str = "✨ Research Golem Results";

const NOTION_API_URL: &str = "https://api.notion.com/v1";
const NOTION_VERSION: &str = "2022-06-28";

/// Checkbox property that flags a page for research.
const FLAG_PROPERTY: &str = "Research";

/// Recursion cap when flattening a page's block tree.
const MAX_BLOCK_DEPTH: u8 = 3;

/// The workspace API accepts at most 100 children per append call.
const APPEND_BATCH_SIZE: usize = 100;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// --- Trait ---

/// Document-store operations the core calls. Enables fakes in scheduler and
/// pipeline tests.
pub trait Workspace: Send + Sync {
    /// All pages carrying the research flag, unordered.
    fn fetch_flagged_pages(&self) -> impl Future<Output = Result<Vec<Page>, PipelineError>> + Send;

    /// Flagged pages that already carry the results marker, for the
    /// past-research reminder digest.
    fn fetch_past_researched_pages(
        &self,
    ) -> impl Future<Output = Result<Vec<Page>, PipelineError>> + Send;

    /// The page's block tree flattened to plain text.
    fn fetch_page_text(
        &self,
        page_id: &str,
    ) -> impl Future<Output = Result<String, PipelineError>> + Send;

    /// Whether the page already carries the results marker block.
    fn has_results_marker(
        &self,
        page_id: &str,
    ) -> impl Future<Output = Result<bool, PipelineError>> + Send;

    /// Append the results marker block with `content` rendered beneath it.
    fn write_results(
        &self,
        page_id: &str,
        content: &str,
    ) -> impl Future<Output = Result<(), PipelineError>> + Send;
}

// --- Notion implementation ---

pub struct NotionWorkspace {
    http: Client,
    api_key: String,
    database_id: String,
}

impl NotionWorkspace {
    pub fn new(api_key: String, database_id: String) -> Self {
        Self {
            http: Client::new(),
            api_key,
            database_id,
        }
    }

    async fn request(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, PipelineError> {
        let url = format!("{}/{}", NOTION_API_URL, path);
        let mut request = self
            .http
            .request(method, url)
            .bearer_auth(&self.api_key)
            .header("Notion-Version", NOTION_VERSION)
            .timeout(REQUEST_TIMEOUT);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await.map_err(|e| PipelineError::Transport {
            service: "notion",
            source: e,
        })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            let message: String = message.chars().take(300).collect();
            return Err(PipelineError::from_status(
                "notion",
                status.as_u16(),
                message,
            ));
        }

        response.json().await.map_err(|e| PipelineError::Transport {
            service: "notion",
            source: e,
        })
    }

    /// Query the database for flagged pages, following cursor pagination.
    async fn query_flagged(&self) -> Result<Vec<Page>, PipelineError> {
        let mut pages = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut body = json!({
                "filter": {
                    "property": FLAG_PROPERTY,
                    "checkbox": {"equals": true},
                },
            });
            if let Some(ref c) = cursor {
                body["start_cursor"] = json!(c);
            }

            let response = self
                .request(
                    reqwest::Method::POST,
                    &format!("databases/{}/query", self.database_id),
                    Some(body),
                )
                .await?;

            if let Some(results) = response["results"].as_array() {
                pages.extend(results.iter().map(page_from_value));
            }

            if !response["has_more"].as_bool().unwrap_or(false) {
                break;
            }
            cursor = response["next_cursor"].as_str().map(str::to_string);
        }

        Ok(pages)
    }

    async fn list_children(
        &self,
        block_id: &str,
        cursor: Option<&str>,
    ) -> Result<Value, PipelineError> {
        let mut path = format!("blocks/{}/children?page_size=100", block_id);
        if let Some(c) = cursor {
            path.push_str("&start_cursor=");
            path.push_str(c);
        }
        self.request(reqwest::Method::GET, &path, None).await
    }

    /// Fetch a block tree depth-first, inlining children behind their parent.
    /// Child pages and child databases are not descended into.
    fn fetch_blocks<'a>(
        &'a self,
        block_id: &'a str,
        depth: u8,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Value>, PipelineError>> + Send + 'a>> {
        Box::pin(async move {
            if depth > MAX_BLOCK_DEPTH {
                return Ok(Vec::new());
            }

            let mut blocks = Vec::new();
            let mut cursor: Option<String> = None;

            loop {
                let response = self.list_children(block_id, cursor.as_deref()).await?;
                let results = response["results"].as_array().cloned().unwrap_or_default();

                for block in results {
                    let has_children = block["has_children"].as_bool().unwrap_or(false);
                    let block_type = block["type"].as_str().unwrap_or("").to_string();
                    let child_id = block["id"].as_str().map(str::to_string);
                    blocks.push(block);

                    if has_children
                        && block_type != "child_page"
                        && block_type != "child_database"
                    {
                        if let Some(id) = child_id {
                            let children = self.fetch_blocks(&id, depth + 1).await?;
                            blocks.extend(children);
                        }
                    }
                }

                if !response["has_more"].as_bool().unwrap_or(false) {
                    break;
                }
                cursor = response["next_cursor"].as_str().map(str::to_string);
            }

            Ok(blocks)
        })
    }
}

impl Workspace for NotionWorkspace {
    async fn fetch_flagged_pages(&self) -> Result<Vec<Page>, PipelineError> {
        self.query_flagged().await
    }

    async fn fetch_past_researched_pages(&self) -> Result<Vec<Page>, PipelineError> {
        let flagged = self.query_flagged().await?;
        let mut past = Vec::new();
        for page in flagged {
            match self.has_results_marker(&page.id).await {
                Ok(true) => past.push(page),
                Ok(false) => {}
                Err(e) => warn!("could not check past page {}: {}", page.id, e),
            }
        }
        Ok(past)
    }

    async fn fetch_page_text(&self, page_id: &str) -> Result<String, PipelineError> {
        let blocks = self.fetch_blocks(page_id, 0).await?;
        Ok(blocks_to_text(&blocks))
    }

    async fn has_results_marker(&self, page_id: &str) -> Result<bool, PipelineError> {
        let response = self.list_children(page_id, None).await?;
        let results = response["results"].as_array().cloned().unwrap_or_default();
        Ok(results.iter().any(is_marker_block))
    }

    async fn write_results(&self, page_id: &str, content: &str) -> Result<(), PipelineError> {
        // The marker heading goes in first; the content blocks nest under it
        // so the results fold away in the page.
        let response = self
            .request(
                reqwest::Method::PATCH,
                &format!("blocks/{}/children", page_id),
                Some(json!({
                    "children": [{
                        "object": "block",
                        "type": "heading_2",
                        "heading_2": {
                            "rich_text": [{"type": "text", "text": {"content": RESULTS_MARKER}}],
                            "is_toggleable": true,
                            "color": "green_background",
                        },
                    }],
                })),
            )
            .await?;

        let toggle_id = response["results"][0]["id"]
            .as_str()
            .ok_or_else(|| PipelineError::BadResponse {
                service: "notion",
                message: "append response missing created block id".to_string(),
            })?
            .to_string();

        let content_blocks = markdown::markdown_to_blocks(content);
        for batch in content_blocks.chunks(APPEND_BATCH_SIZE) {
            self.request(
                reqwest::Method::PATCH,
                &format!("blocks/{}/children", toggle_id),
                Some(json!({"children": batch})),
            )
            .await?;
        }

        Ok(())
    }
}

// --- Pure helpers (shared with tests) ---

/// Map a raw page object to the core's [`Page`].
pub fn page_from_value(value: &Value) -> Page {
    Page {
        id: value["id"].as_str().unwrap_or("").to_string(),
        title: page_title(value),
        url: value["url"].as_str().unwrap_or("").to_string(),
        created_time: value["created_time"].as_str().unwrap_or("").to_string(),
    }
}

/// Pull the title out of a page's properties (the property with type
/// `title`). Falls back to "Untitled".
pub fn page_title(page: &Value) -> String {
    if let Some(properties) = page["properties"].as_object() {
        for prop in properties.values() {
            if prop["type"] == "title" {
                let title = rich_text_plain(&prop["title"]);
                if !title.is_empty() {
                    return title;
                }
            }
        }
    }
    "Untitled".to_string()
}

/// Join the `plain_text` of every segment in a rich-text array.
fn rich_text_plain(value: &Value) -> String {
    value
        .as_array()
        .map(|segments| {
            segments
                .iter()
                .filter_map(|s| s["plain_text"].as_str())
                .collect()
        })
        .unwrap_or_default()
}

/// True for a toggleable heading_2 whose text contains the results marker.
fn is_marker_block(block: &Value) -> bool {
    if block["type"] != "heading_2" {
        return false;
    }
    let heading = &block["heading_2"];
    heading["is_toggleable"].as_bool().unwrap_or(false)
        && rich_text_plain(&heading["rich_text"]).contains(RESULTS_MARKER)
}

/// Flatten block objects to markdown-flavored plain text. Unknown block
/// types and empty rich text are skipped.
pub fn blocks_to_text(blocks: &[Value]) -> String {
    let mut lines = Vec::new();

    for block in blocks {
        let block_type = block["type"].as_str().unwrap_or("");
        match block_type {
            "heading_1" | "heading_2" | "heading_3" => {
                let level: usize = block_type["heading_".len()..].parse().unwrap_or(1);
                let text = rich_text_plain(&block[block_type]["rich_text"]);
                if !text.is_empty() {
                    lines.push(format!("{} {}", "#".repeat(level), text));
                }
            }
            "paragraph" => {
                let text = rich_text_plain(&block["paragraph"]["rich_text"]);
                if !text.is_empty() {
                    lines.push(text);
                }
            }
            "bulleted_list_item" => {
                let text = rich_text_plain(&block["bulleted_list_item"]["rich_text"]);
                if !text.is_empty() {
                    lines.push(format!("- {}", text));
                }
            }
            "numbered_list_item" => {
                let text = rich_text_plain(&block["numbered_list_item"]["rich_text"]);
                if !text.is_empty() {
                    lines.push(format!("1. {}", text));
                }
            }
            "code" => {
                let code = rich_text_plain(&block["code"]["rich_text"]);
                let lang = block["code"]["language"].as_str().unwrap_or("");
                if !code.is_empty() {
                    lines.push(format!("```{}\n{}\n```", lang, code));
                }
            }
            "quote" => {
                let text = rich_text_plain(&block["quote"]["rich_text"]);
                if !text.is_empty() {
                    lines.push(format!("> {}", text));
                }
            }
            "toggle" | "callout" => {
                let text = rich_text_plain(&block[block_type]["rich_text"]);
                if !text.is_empty() {
                    lines.push(text);
                }
            }
            "divider" => lines.push("---".to_string()),
            _ => {}
        }
    }

    lines.join("\n")
}
