use std::future::Future;
use std::time::Duration;

use reqwest::Client;
use serde_json::{json, Value};

use crate::error::PipelineError;
use crate::prompt;
use crate::types::{ModelReply, TokenUsage};

pub const EXTRACT_MODEL: &str = "claude-haiku-4-5-20251001";
pub const RESEARCH_MODEL: &str = "gpt-5.2";

const ANTHROPIC_MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const OPENAI_RESPONSES_URL: &str = "https://api.openai.com/v1/responses";

/// Extraction replies are short; research calls can run for minutes while the
/// model searches the web.
const EXTRACT_TIMEOUT: Duration = Duration::from_secs(120);
const RESEARCH_TIMEOUT: Duration = Duration::from_secs(1800);

const MAX_EXTRACT_TOKENS: u32 = 1024;

// --- Traits ---

/// Restates the implicit question(s) in a page's text. Enables fakes in
/// pipeline tests.
pub trait QuestionExtractor: Send + Sync {
    fn extract(
        &self,
        title: &str,
        content: &str,
    ) -> impl Future<Output = Result<ModelReply, PipelineError>> + Send;
}

/// Produces a research brief for extracted questions, with live web search.
pub trait Researcher: Send + Sync {
    fn research(
        &self,
        questions: &str,
    ) -> impl Future<Output = Result<ModelReply, PipelineError>> + Send;
}

// --- Anthropic extraction client ---

pub struct AnthropicExtractor {
    http: Client,
    api_key: String,
    model: String,
}

impl AnthropicExtractor {
    pub fn new(api_key: String) -> Self {
        Self {
            http: Client::new(),
            api_key,
            model: EXTRACT_MODEL.to_string(),
        }
    }
}

impl QuestionExtractor for AnthropicExtractor {
    async fn extract(&self, title: &str, content: &str) -> Result<ModelReply, PipelineError> {
        let body = json!({
            "model": self.model,
            "max_tokens": MAX_EXTRACT_TOKENS,
            "messages": [{"role": "user", "content": prompt::extraction_prompt(title, content)}],
        });

        let response = self
            .http
            .post(ANTHROPIC_MESSAGES_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .timeout(EXTRACT_TIMEOUT)
            .json(&body)
            .send()
            .await
            .map_err(|e| PipelineError::Transport {
                service: "anthropic",
                source: e,
            })?;

        let payload = read_json_response("anthropic", response).await?;

        let text = payload["content"][0]["text"]
            .as_str()
            .ok_or_else(|| PipelineError::BadResponse {
                service: "anthropic",
                message: "missing content text".to_string(),
            })?
            .trim()
            .to_string();

        Ok(ModelReply {
            text,
            usage: usage_from(&payload["usage"]),
        })
    }
}

// --- OpenAI research client ---

pub struct OpenAiResearcher {
    http: Client,
    api_key: String,
    model: String,
}

impl OpenAiResearcher {
    pub fn new(api_key: String) -> Self {
        Self {
            http: Client::new(),
            api_key,
            model: RESEARCH_MODEL.to_string(),
        }
    }
}

impl Researcher for OpenAiResearcher {
    async fn research(&self, questions: &str) -> Result<ModelReply, PipelineError> {
        let body = json!({
            "model": self.model,
            "tools": [{"type": "web_search"}],
            "reasoning": {"effort": "high"},
            "input": prompt::research_prompt(questions),
        });

        let response = self
            .http
            .post(OPENAI_RESPONSES_URL)
            .bearer_auth(&self.api_key)
            .timeout(RESEARCH_TIMEOUT)
            .json(&body)
            .send()
            .await
            .map_err(|e| PipelineError::Transport {
                service: "openai",
                source: e,
            })?;

        let payload = read_json_response("openai", response).await?;

        let text = output_text(&payload);
        if text.is_empty() {
            return Err(PipelineError::BadResponse {
                service: "openai",
                message: "response contains no output text".to_string(),
            });
        }

        Ok(ModelReply {
            text,
            usage: usage_from(&payload["usage"]),
        })
    }
}

// --- Shared helpers ---

/// Check the HTTP status and parse the body as JSON. Non-2xx statuses are
/// classified (rate-limit / auth / other) with a truncated body excerpt.
async fn read_json_response(
    service: &'static str,
    response: reqwest::Response,
) -> Result<Value, PipelineError> {
    let status = response.status();
    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(PipelineError::from_status(
            service,
            status.as_u16(),
            truncate(&message, 300),
        ));
    }
    response
        .json()
        .await
        .map_err(|e| PipelineError::Transport { service, source: e })
}

/// Pull `{input_tokens, output_tokens}` out of a usage object. Both APIs use
/// the same key names; missing counts read as zero.
fn usage_from(value: &Value) -> TokenUsage {
    TokenUsage {
        input: value["input_tokens"].as_u64().unwrap_or(0),
        output: value["output_tokens"].as_u64().unwrap_or(0),
    }
}

/// Assemble the full output text of a responses-API payload: every
/// `output_text` part of every `message` item, in order.
fn output_text(payload: &Value) -> String {
    let mut text = String::new();
    if let Some(items) = payload["output"].as_array() {
        for item in items {
            if item["type"] != "message" {
                continue;
            }
            if let Some(parts) = item["content"].as_array() {
                for part in parts {
                    if part["type"] == "output_text" {
                        if let Some(t) = part["text"].as_str() {
                            text.push_str(t);
                        }
                    }
                }
            }
        }
    }
    text
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
