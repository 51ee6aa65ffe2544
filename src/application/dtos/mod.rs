use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{Agent, ContextEntry, Insight, InsightSummary, ModelErrorKind, Tool};

/// Question submitted to the concierge from the site's chat form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskRequest {
    pub query: String,
}

/// How the concierge arrived at its answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "kind", rename_all = "snake_case")]
pub enum AnswerOutcome {
    Answered,
    Misconfigured,
    EmptyResponse,
    ModelFailure(ModelErrorKind),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskResponse {
    pub answer: String,
    pub outcome: AnswerOutcome,
}

/// Payload used by the knowledge-base admin screen.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpsertContextRequest {
    #[serde(default)]
    pub id: Option<String>,
    pub section: String,
    pub text: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextListResponse {
    pub items: Vec<ContextEntry>,
}

/// Create or fully replace a directory tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolRequest {
    pub name: String,
    pub category: String,
    pub description: String,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub pricing: Option<String>,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsightRequest {
    pub title: String,
    pub summary: String,
    pub body: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub related_tool_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRequest {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub tool_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolListResponse {
    pub items: Vec<Tool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsightListResponse {
    pub items: Vec<Insight>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentListResponse {
    pub items: Vec<Agent>,
}

/// Side-by-side view of several tools, in the order requested.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolComparison {
    pub tools: Vec<Tool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftArticleRequest {
    pub topic: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub audience: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleDraft {
    pub title: String,
    pub summary: String,
    pub body: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractToolRequest {
    pub name: String,
    pub source_text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestInsightsRequest {
    pub insight_id: Uuid,
    #[serde(default = "default_suggestion_limit")]
    pub limit: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestInsightsResponse {
    pub items: Vec<InsightSummary>,
}

/// Health/readiness report for diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatusResponse {
    pub ok: bool,
    pub message: String,
    pub details: Option<String>,
}

const fn default_suggestion_limit() -> usize {
    3
}
