//! Prompt templates for the two model calls.

/// Build the extraction prompt: page title and flattened text, followed by an
/// instruction to restate the author's implicit question(s) in first person.
pub fn extraction_prompt(title: &str, content: &str) -> String {
    format!(
        "{title}\n{content}\n\n<Task>\nGiven the text above, extract the question or questions \
the author raised in it. Pull in any detail from the text that would help answer them as \
directly as possible. Restate the questions as a single paragraph, written in the first \
person.\n</Task>",
        title = title,
        content = content,
    )
}

/// Build the research prompt. The numbered `## N)` section headings are load
/// bearing: the digest trims each report at the literal `## 4)` marker.
pub fn research_prompt(questions: &str) -> String {
    format!(
        "{questions}\n\n{instructions}",
        questions = questions,
        instructions = RESEARCH_INSTRUCTIONS,
    )
}

const RESEARCH_INSTRUCTIONS: &str = r#"<Task>
You are an automated research assistant. The brief above contains one or more questions.
Produce a single short article, readable in about 5 minutes, that:

- Gives the best preliminary answer available from public information.
- If a definitive answer is too complex or uncertain, gives a useful high-level take and
  says so plainly.
- Points toward concrete next steps for further exploration.
</Task>

<Tools>
- Search the web iteratively: search, read, refine to resolve contradictions and reach
  primary or authoritative sources.
- Stop at diminishing returns, when new sources repeat what you already have.
- If the answer is not knowable from public sources, say so and lean on the "Open loops"
  and "Next rabbit holes" sections.
</Tools>

<Constraints>
- Target length: roughly 700-900 words.
- Clear, direct language, suitable for a daily newsletter.
- Cite sources to support the narrative; never output bare link lists.
</Constraints>

<Output Format>
Provide ALL sections below, in this order.

## 1) Headline
- A punchy, answer-shaped headline. Do not repeat the question verbatim.

## 2) Prompted by
- The original question(s) that triggered the research. Quote a short question
  literally; paraphrase a long one. With multiple questions, pick a primary one and
  append "(+N related)".

## 3) TL;DR
- 4-6 decisive bullets. Bullet 1 is the best direct answer or best current take.
- Include 1-2 key caveats if needed, without over-hedging.

## 4) What I found
- Answer-first: state the most likely answer or explanation early, even if partial.
- Include the minimal reasoning or mechanism that makes the answer make sense.
- Ground key claims in evidence, with citations where relevant.
- State the conditions and boundaries where the answer applies, and major competing
  views when they matter.
- Keep it digestible: typically 2-4 short paragraphs. No literature-review sprawl.

### 5) Open loops
- 2-4 bullets covering the most important uncertainties, disagreements, or missing
  data, phrased as crisp open questions where possible.

### 6) Next rabbit holes
- 3-5 actionable items. Each must include a suggested follow-up query, a type of
  source to consult, or a decision criterion / red flag to watch for.

### 7) Recommended reads + More sources
- Recommended reads: the top 3 sources to click first.
- More sources: up to 7 additional (10 max total). Prefer primary sources. No giant
  bibliography.
</Output Format>"#;
