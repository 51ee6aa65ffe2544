use std::collections::HashSet;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    application::dtos::{
        ArticleDraft, DraftArticleRequest, ExtractToolRequest, SuggestInsightsRequest,
        SuggestInsightsResponse,
    },
    domain::{DomainError, Insight, ToolDetails},
};

use super::{
    prompt::{draft_article_prompt, extract_tool_prompt, related_insights_prompt, strip_code_fence},
    CatalogRepository, ConciergeConfig, ModelClient,
};

const MAX_KEYWORDS: usize = 10;
const MAX_SUGGESTIONS: usize = 10;

/// Editorial helpers backed by the hosted model.
///
/// Unlike the concierge these are admin tools, so failures are returned as errors
/// instead of being turned into apologetic sentences.
pub struct ContentService {
    model: Arc<dyn ModelClient>,
    insights: Arc<dyn CatalogRepository<Insight>>,
    config: ConciergeConfig,
}

impl ContentService {
    pub fn new(
        model: Arc<dyn ModelClient>,
        insights: Arc<dyn CatalogRepository<Insight>>,
        config: ConciergeConfig,
    ) -> Self {
        Self {
            model,
            insights,
            config,
        }
    }

    pub fn draft_article(&self, request: DraftArticleRequest) -> Result<ArticleDraft, DomainError> {
        if request.topic.trim().is_empty() {
            return Err(DomainError::validation("topic is required"));
        }
        if request.keywords.len() > MAX_KEYWORDS {
            return Err(DomainError::limit(format!(
                "keywords cannot exceed {MAX_KEYWORDS} entries"
            )));
        }

        let draft: ArticleDraft = self.generate_json(&draft_article_prompt(&request))?;
        if draft.title.trim().is_empty() || draft.body.trim().is_empty() {
            return Err(DomainError::invalid_output("draft is missing a title or body"));
        }

        info!(
            target: "finsight::content",
            title = %draft.title,
            body_chars = draft.body.chars().count(),
            "article draft generated"
        );
        Ok(draft)
    }

    pub fn extract_tool_details(
        &self,
        request: ExtractToolRequest,
    ) -> Result<ToolDetails, DomainError> {
        if request.name.trim().is_empty() {
            return Err(DomainError::validation("name is required"));
        }
        if request.source_text.trim().is_empty() {
            return Err(DomainError::validation("source_text is required"));
        }

        let mut details: ToolDetails =
            self.generate_json(&extract_tool_prompt(&request.name, &request.source_text))?;
        if details.name.trim().is_empty() {
            details.name = request.name.trim().to_string();
        }
        details.features.retain(|feature| !feature.trim().is_empty());
        details.pricing = details.pricing.filter(|p| !p.trim().is_empty());
        details.website = details.website.filter(|w| !w.trim().is_empty());

        info!(
            target: "finsight::content",
            tool = %details.name,
            features = details.features.len(),
            "tool details extracted"
        );
        Ok(details)
    }

    pub fn suggest_related_insights(
        &self,
        request: SuggestInsightsRequest,
    ) -> Result<SuggestInsightsResponse, DomainError> {
        let limit = request.limit.clamp(1, MAX_SUGGESTIONS);
        let all = self.insights.list()?;
        let target = all
            .iter()
            .find(|insight| insight.id == request.insight_id)
            .cloned()
            .ok_or_else(|| DomainError::not_found(format!("insight {}", request.insight_id)))?;

        let candidates: Vec<Insight> = all
            .into_iter()
            .filter(|insight| insight.id != target.id)
            .collect();
        if candidates.is_empty() {
            debug!(target: "finsight::content", "no candidate insights to suggest");
            return Ok(SuggestInsightsResponse { items: Vec::new() });
        }

        let picked: Vec<String> =
            self.generate_json(&related_insights_prompt(&target, &candidates, limit))?;

        let mut seen = HashSet::new();
        let items = picked
            .iter()
            .filter_map(|raw| Uuid::parse_str(raw.trim()).ok())
            .filter(|id| seen.insert(*id))
            .filter_map(|id| candidates.iter().find(|insight| insight.id == id))
            .take(limit)
            .map(Insight::as_summary)
            .collect::<Vec<_>>();

        if items.len() < picked.len().min(limit) {
            warn!(
                target: "finsight::content",
                returned = picked.len(),
                kept = items.len(),
                "model suggested unknown or duplicate insight ids"
            );
        }

        Ok(SuggestInsightsResponse { items })
    }

    fn generate_json<T: DeserializeOwned>(&self, prompt: &str) -> Result<T, DomainError> {
        if !self.config.has_credential() {
            return Err(DomainError::configuration("model API key is not set"));
        }

        let raw = self
            .model
            .generate(prompt)?
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| DomainError::invalid_output("model returned no text"))?;

        serde_json::from_str(strip_code_fence(&raw)).map_err(|err| {
            warn!(target: "finsight::content", error = %err, "model output is not the expected JSON");
            DomainError::invalid_output(format!("could not parse model output: {err}"))
        })
    }
}
