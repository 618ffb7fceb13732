use chrono::Utc;
use tracing::debug;

use crate::error::PipelineError;
use crate::model::{QuestionExtractor, Researcher};
use crate::types::{Page, TokenUsage};
use crate::workspace::Workspace;

// Per-million-token USD rates, one pair per model.
pub const EXTRACT_COST_PER_M_INPUT: f64 = 0.80;
pub const EXTRACT_COST_PER_M_OUTPUT: f64 = 4.00;
pub const RESEARCH_COST_PER_M_INPUT: f64 = 5.00;
pub const RESEARCH_COST_PER_M_OUTPUT: f64 = 15.00;

/// Minimum reply length (in chars) before an extraction reply counts as a
/// real question. Shorter replies are near-certainly refusals or filler.
const MIN_QUESTION_LENGTH: usize = 30;

/// Phrases that mark an extraction reply as "nothing to research".
/// Deliberately conservative: a false positive wastes one research call, a
/// false negative only skips a page.
const NO_QUESTION_PHRASES: &[&str] = &[
    "no question",
    "no questions",
    "does not contain any question",
    "doesn't contain any question",
    "no specific question",
    "i don't see any question",
    "i cannot find",
    "no researchable",
    "cannot identify any question",
];

// --- Workflow steps ---

/// Steps of the per-page workflow. Three working states and one conditional
/// edge: `ExtractQuestions` forks to `DoResearch` or straight to `WriteBack`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    ExtractQuestions,
    DoResearch,
    WriteBack,
    Done,
}

/// Transient per-page state, owned by one pipeline invocation. Its durable
/// projection is the queue record the scheduler writes.
#[derive(Clone, Debug, Default)]
pub struct ResearchState {
    pub questions: Option<String>,
    pub research_result: Option<String>,
    pub has_questions: bool,
    pub extraction_tokens: TokenUsage,
    pub research_tokens: TokenUsage,
}

/// Terminal result of one pipeline run, handed back to the scheduler.
#[derive(Clone, Debug, PartialEq)]
pub struct ResearchOutcome {
    /// The research brief, or `None` when no researchable questions were
    /// found (a non-error outcome).
    pub research_text: Option<String>,
    pub cost: f64,
    pub processed_at: String,
}

/// Pure transition function for the workflow graph.
pub fn next_step(current: Step, state: &ResearchState) -> Step {
    match current {
        Step::ExtractQuestions => {
            if state.has_questions {
                Step::DoResearch
            } else {
                Step::WriteBack
            }
        }
        Step::DoResearch => Step::WriteBack,
        Step::WriteBack | Step::Done => Step::Done,
    }
}

/// Estimate the total USD cost of both model calls.
pub fn estimate_cost(extraction: TokenUsage, research: TokenUsage) -> f64 {
    let extract_cost = extraction.input as f64 * EXTRACT_COST_PER_M_INPUT
        + extraction.output as f64 * EXTRACT_COST_PER_M_OUTPUT;
    let research_cost = research.input as f64 * RESEARCH_COST_PER_M_INPUT
        + research.output as f64 * RESEARCH_COST_PER_M_OUTPUT;
    (extract_cost + research_cost) / 1_000_000.0
}

/// Classify an extraction reply: does it contain researchable questions?
pub fn looks_like_questions(reply: &str) -> bool {
    if reply.chars().count() <= MIN_QUESTION_LENGTH {
        return false;
    }
    let lower = reply.to_lowercase();
    !NO_QUESTION_PHRASES.iter().any(|p| lower.contains(p))
}

// --- Pipeline ---

/// The per-page workflow: extract questions, conditionally research, write
/// results back. Collaborators are injected so tests can substitute fakes.
pub struct ResearchPipeline<'a, E, R, W> {
    extractor: &'a E,
    researcher: &'a R,
    workspace: &'a W,
}

impl<'a, E, R, W> ResearchPipeline<'a, E, R, W>
where
    E: QuestionExtractor,
    R: Researcher,
    W: Workspace,
{
    pub fn new(extractor: &'a E, researcher: &'a R, workspace: &'a W) -> Self {
        Self {
            extractor,
            researcher,
            workspace,
        }
    }

    /// Run the workflow for one page to completion.
    ///
    /// A linear pipeline with one fork and no internal retry: any error from
    /// a model call or the write-back propagates to the caller, which owns
    /// converting it into a queue record.
    pub async fn run(
        &self,
        page: &Page,
        page_content: &str,
    ) -> Result<ResearchOutcome, PipelineError> {
        let mut state = ResearchState::default();
        let mut step = Step::ExtractQuestions;

        loop {
            match step {
                Step::ExtractQuestions => {
                    debug!("extracting questions from '{}'", page.title);
                    let reply = self.extractor.extract(&page.title, page_content).await?;
                    state.has_questions = looks_like_questions(&reply.text);
                    state.extraction_tokens = reply.usage;
                    if state.has_questions {
                        state.questions = Some(reply.text);
                    }
                }
                Step::DoResearch => {
                    debug!("researching '{}' with web search", page.title);
                    let questions = state.questions.as_deref().unwrap_or_default();
                    let reply = self.researcher.research(questions).await?;
                    state.research_result = Some(reply.text);
                    state.research_tokens = reply.usage;
                }
                Step::WriteBack => {
                    debug!("writing results back to '{}'", page.title);
                    let processed_at = Utc::now().format("%Y-%m-%d %H:%M UTC").to_string();
                    let cost = estimate_cost(state.extraction_tokens, state.research_tokens);
                    let content = final_content(&state, &processed_at, cost);
                    self.workspace.write_results(&page.id, &content).await?;
                    return Ok(ResearchOutcome {
                        research_text: state.research_result,
                        cost,
                        processed_at,
                    });
                }
                Step::Done => unreachable!("write-back is terminal"),
            }
            step = next_step(step, &state);
        }
    }
}

/// Assemble the markdown written back to the page: the research brief, or a
/// fixed no-questions notice, each followed by the processed/cost footer.
fn final_content(state: &ResearchState, processed_at: &str, cost: f64) -> String {
    match state.research_result.as_deref().filter(|_| state.has_questions) {
        Some(text) => format!(
            "{}\n\n---\n\n*Processed: {} | Estimated cost: ${:.4}*",
            text, processed_at, cost
        ),
        None => format!(
            "No researchable questions were found in this page.\n\n*Processed: {} | Estimated cost: ${:.4}*",
            processed_at, cost
        ),
    }
}
