#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use research_golem::error::PipelineError;
use research_golem::mailer::DigestMailer;
use research_golem::model::{QuestionExtractor, Researcher};
use research_golem::types::{ModelReply, Page, QueueRecord, TokenUsage};
use research_golem::workspace::Workspace;

/// Creates a `Page` with a URL derived from its id.
///
/// # Parameters
/// - `id`: The page identifier (e.g., `"page-1"`)
/// - `title`: The page title
/// - `created_time`: ISO-8601 creation timestamp
pub fn make_page(id: &str, title: &str, created_time: &str) -> Page {
    Page {
        id: id.to_string(),
        title: title.to_string(),
        url: format!("https://notion.so/{}", id),
        created_time: created_time.to_string(),
    }
}

/// Creates a successful `QueueRecord` with the given research text and cost.
pub fn make_record(id: &str, title: &str, research_text: &str, cost: f64) -> QueueRecord {
    QueueRecord {
        id: id.to_string(),
        title: title.to_string(),
        url: format!("https://notion.so/{}", id),
        research_text: Some(research_text.to_string()),
        cost,
        processed_at: "2026-02-10 12:00 UTC".to_string(),
        any_error: None,
    }
}

/// Creates a failed `QueueRecord` carrying an error message.
pub fn make_error_record(id: &str, title: &str, error: &str) -> QueueRecord {
    QueueRecord {
        id: id.to_string(),
        title: title.to_string(),
        url: format!("https://notion.so/{}", id),
        research_text: None,
        cost: 0.0,
        processed_at: "2026-02-10 12:00 UTC".to_string(),
        any_error: Some(error.to_string()),
    }
}

// --- Fake workspace ---

#[derive(Default)]
struct WorkspaceState {
    pub pages: Vec<Page>,
    pub past_pages: Vec<Page>,
    pub page_texts: HashMap<String, String>,
    pub markers: HashSet<String>,
    pub written: Vec<(String, String)>,
    pub fail_fetch_pages: bool,
    pub fail_write: bool,
}

/// In-memory `Workspace` for scheduler and pipeline tests. Pages, text, and
/// markers are seeded up front; writes are recorded for assertions.
#[derive(Default)]
pub struct FakeWorkspace {
    state: Mutex<WorkspaceState>,
}

impl FakeWorkspace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_page(&self, page: Page, text: &str) {
        let mut state = self.state.lock().unwrap();
        state.page_texts.insert(page.id.clone(), text.to_string());
        state.pages.push(page);
    }

    pub fn add_past_page(&self, page: Page, text: &str) {
        let mut state = self.state.lock().unwrap();
        state.page_texts.insert(page.id.clone(), text.to_string());
        state.past_pages.push(page);
    }

    /// Mark a page as already carrying the results block.
    pub fn set_marker(&self, page_id: &str) {
        self.state
            .lock()
            .unwrap()
            .markers
            .insert(page_id.to_string());
    }

    pub fn set_fail_fetch_pages(&self, fail: bool) {
        self.state.lock().unwrap().fail_fetch_pages = fail;
    }

    pub fn set_fail_write(&self, fail: bool) {
        self.state.lock().unwrap().fail_write = fail;
    }

    /// Snapshot of `(page_id, content)` writes, in order.
    pub fn written(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().written.clone()
    }
}

impl Workspace for FakeWorkspace {
    async fn fetch_flagged_pages(&self) -> Result<Vec<Page>, PipelineError> {
        let state = self.state.lock().unwrap();
        if state.fail_fetch_pages {
            return Err(PipelineError::Api {
                service: "notion",
                status: 500,
                message: "simulated failure".to_string(),
            });
        }
        Ok(state.pages.clone())
    }

    async fn fetch_past_researched_pages(&self) -> Result<Vec<Page>, PipelineError> {
        Ok(self.state.lock().unwrap().past_pages.clone())
    }

    async fn fetch_page_text(&self, page_id: &str) -> Result<String, PipelineError> {
        let state = self.state.lock().unwrap();
        state
            .page_texts
            .get(page_id)
            .cloned()
            .ok_or(PipelineError::Api {
                service: "notion",
                status: 404,
                message: format!("no such page: {}", page_id),
            })
    }

    async fn has_results_marker(&self, page_id: &str) -> Result<bool, PipelineError> {
        Ok(self.state.lock().unwrap().markers.contains(page_id))
    }

    async fn write_results(&self, page_id: &str, content: &str) -> Result<(), PipelineError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_write {
            return Err(PipelineError::Api {
                service: "notion",
                status: 502,
                message: "simulated write failure".to_string(),
            });
        }
        state
            .written
            .push((page_id.to_string(), content.to_string()));
        Ok(())
    }
}

// --- Fake model clients ---

/// `QuestionExtractor` that returns a canned reply and counts calls.
pub struct FakeExtractor {
    pub reply: String,
    pub usage: TokenUsage,
    pub calls: AtomicU32,
    pub fail: bool,
}

impl FakeExtractor {
    pub fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            usage: TokenUsage {
                input: 1000,
                output: 100,
            },
            calls: AtomicU32::new(0),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        let mut fake = Self::new("");
        fake.fail = true;
        fake
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl QuestionExtractor for FakeExtractor {
    async fn extract(&self, _title: &str, _content: &str) -> Result<ModelReply, PipelineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(PipelineError::RateLimited {
                service: "anthropic",
                message: "simulated".to_string(),
            });
        }
        Ok(ModelReply {
            text: self.reply.clone(),
            usage: self.usage,
        })
    }
}

/// `Researcher` that returns a canned brief and counts calls.
pub struct FakeResearcher {
    pub reply: String,
    pub usage: TokenUsage,
    pub calls: AtomicU32,
    pub fail: bool,
}

impl FakeResearcher {
    pub fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            usage: TokenUsage {
                input: 2000,
                output: 500,
            },
            calls: AtomicU32::new(0),
            fail: false,
        }
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Researcher for FakeResearcher {
    async fn research(&self, _questions: &str) -> Result<ModelReply, PipelineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(PipelineError::Api {
                service: "openai",
                status: 500,
                message: "simulated".to_string(),
            });
        }
        Ok(ModelReply {
            text: self.reply.clone(),
            usage: self.usage,
        })
    }
}

// --- Fake mailer ---

/// `DigestMailer` that records `(subject, plain, html)` sends.
#[derive(Default)]
pub struct FakeMailer {
    sent: Mutex<Vec<(String, String, String)>>,
    pub fail: bool,
}

impl FakeMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn sent(&self) -> Vec<(String, String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

impl DigestMailer for FakeMailer {
    fn send(&self, subject: &str, plain_body: &str, html_body: &str) -> Result<(), PipelineError> {
        if self.fail {
            return Err(PipelineError::Mail("simulated SMTP failure".to_string()));
        }
        self.sent.lock().unwrap().push((
            subject.to_string(),
            plain_body.to_string(),
            html_body.to_string(),
        ));
        Ok(())
    }
}
