use serde::{Deserialize, Serialize};

// --- Model accounting ---

/// Token counts reported by a single model call. Used only for cost estimation.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct TokenUsage {
    pub input: u64,
    pub output: u64,
}

/// Text reply from a model call plus its token usage.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct ModelReply {
    pub text: String,
    pub usage: TokenUsage,
}

// --- Workspace ---

/// A page in the external document workspace.
///
/// `created_time` is the workspace's ISO-8601 creation timestamp, kept as a
/// string; it is only ever compared lexicographically for ordering.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct Page {
    pub id: String,
    pub title: String,
    pub url: String,
    pub created_time: String,
}

// --- Persisted records ---

/// One processed-page attempt, appended to queue.json after each pipeline run.
///
/// Exactly one of `research_text` / `any_error` reflects the terminal state.
/// `research_text` may be `None` on success too: "no researchable questions"
/// is a non-error outcome.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct QueueRecord {
    pub id: String,
    pub title: String,
    pub url: String,
    pub research_text: Option<String>,
    pub cost: f64,
    pub processed_at: String,
    pub any_error: Option<String>,
}

/// Persisted daemon settings (config.json).
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct DaemonConfig {
    pub interval_hours: u64,
    pub email_hour: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_digest_date: Option<String>,
    /// Keys this version doesn't know about are carried through rewrites
    /// untouched, so the on-disk schema can grow without migrations.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

pub const DEFAULT_INTERVAL_HOURS: u64 = 3;
pub const DEFAULT_EMAIL_HOUR: u32 = 18;

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            interval_hours: DEFAULT_INTERVAL_HOURS,
            email_hour: DEFAULT_EMAIL_HOUR,
            last_digest_date: None,
            extra: serde_json::Map::new(),
        }
    }
}
