//! Prompt construction for the concierge and the editorial generation flows.
//!
//! Everything here is pure string building so it can be tested without a model.

use std::borrow::Cow;

use crate::application::dtos::DraftArticleRequest;
use crate::domain::Insight;

/// Maximum number of context characters embedded into a concierge prompt.
pub const CONTEXT_CHAR_BUDGET: usize = 1000;

/// Marker appended to a context snippet that was cut to fit the budget.
pub const ELLIPSIS: &str = "...";

/// Substituted when the knowledge base is empty or cannot be read.
pub const FALLBACK_CONTEXT: &str = "AI in fintech refers to the use of artificial intelligence \
technologies such as machine learning, natural language processing and predictive analytics to \
improve financial services, including fraud detection, credit scoring, algorithmic trading, \
customer support and personalised banking.";

/// Upper bound on vendor copy forwarded to the tool-extraction flow.
pub const SOURCE_CHAR_BUDGET: usize = 8000;

const CONCIERGE_FRAMING: &str = "You are an AI FinTech Insights Concierge. You help visitors of \
an AI fintech tools directory understand AI tools, trends and use cases in financial services. \
Answer the user's question using the context below. If the context does not cover the question, \
say so briefly and give general, well-established guidance. Keep the answer concise and never \
give personalised investment advice.";

/// Cut `text` to at most `budget` characters, appending [`ELLIPSIS`] when anything was dropped.
pub fn truncate_context(text: &str, budget: usize) -> Cow<'_, str> {
    match text.char_indices().nth(budget) {
        Some((byte_idx, _)) => Cow::Owned(format!("{}{}", &text[..byte_idx], ELLIPSIS)),
        None => Cow::Borrowed(text),
    }
}

/// Build the single instruction string sent to the hosted model.
pub fn compose_concierge_prompt(context: &str, query: &str, budget: usize) -> String {
    let context = truncate_context(context, budget);
    format!("{CONCIERGE_FRAMING}\n\nContext:\n{context}\n\nUser question: {query}\n\nAnswer:")
}

pub fn draft_article_prompt(request: &DraftArticleRequest) -> String {
    let keywords = if request.keywords.is_empty() {
        "none".to_string()
    } else {
        request.keywords.join(", ")
    };
    let audience = request
        .audience
        .as_deref()
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .unwrap_or("fintech professionals");

    format!(
        "You are an editor for an AI fintech insights publication.\n\
         Write an article draft about: {topic}\n\
         Target audience: {audience}\n\
         Keywords to cover: {keywords}\n\n\
         Respond with a single JSON object and nothing else, using exactly these keys:\n\
         {{\"title\": string, \"summary\": string (two sentences), \"body\": string (markdown, 4-6 paragraphs)}}",
        topic = request.topic.trim(),
    )
}

pub fn extract_tool_prompt(name: &str, source_text: &str) -> String {
    let source = truncate_context(source_text.trim(), SOURCE_CHAR_BUDGET);
    format!(
        "You extract structured facts about AI fintech tools for a directory listing.\n\
         Tool name: {name}\n\
         Source text:\n{source}\n\n\
         Respond with a single JSON object and nothing else, using exactly these keys:\n\
         {{\"name\": string, \"category\": string, \"description\": string (one paragraph), \
         \"features\": [string], \"pricing\": string or null, \"website\": string or null}}\n\
         Only use facts present in the source text.",
        name = name.trim(),
    )
}

pub fn related_insights_prompt(target: &Insight, candidates: &[Insight], limit: usize) -> String {
    let listing = candidates
        .iter()
        .map(|insight| {
            format!(
                "- id: {} | title: {} | tags: {}",
                insight.id,
                insight.title,
                insight.tags.join(", ")
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "You curate related reading for an AI fintech insights site.\n\
         Current article:\ntitle: {title}\nsummary: {summary}\ntags: {tags}\n\n\
         Candidate articles:\n{listing}\n\n\
         Pick at most {limit} candidates that a reader of the current article would find most \
         relevant, best first. Respond with a JSON array of candidate ids and nothing else.",
        title = target.title,
        summary = target.summary,
        tags = target.tags.join(", "),
    )
}

/// Models like to wrap JSON in a Markdown fence even when told not to.
pub fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    // Drop the info string (`json`, `JSON`, ...) on the opening line.
    match rest.split_once('\n') {
        Some((info, body)) if !info.contains('{') && !info.contains('[') => body.trim(),
        _ => rest.trim(),
    }
}
