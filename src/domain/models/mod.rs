use serde::{Deserialize, Serialize};
use uuid::Uuid;

mod catalog;

pub use catalog::{Agent, CatalogRecord, Insight, InsightSummary, Tool, ToolDetails};

/// Upper bound to keep tag arrays compact for storage and filtering.
pub const MAX_TAGS: usize = 12;

/// A knowledge-base snippet used to ground concierge answers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextEntry {
    pub id: String,
    pub section: String,
    pub text: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl ContextEntry {
    pub fn new(
        id: Option<String>,
        section: impl Into<String>,
        text: impl Into<String>,
        tags: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        let id = id
            .map(sanitize_single_line)
            .filter(|raw| !raw.is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        Self {
            id,
            section: sanitize_single_line(section),
            text: text.into().trim().to_string(),
            tags: normalize_tags(tags),
        }
    }
}

pub(crate) fn sanitize_single_line(input: impl Into<String>) -> String {
    input
        .into()
        .lines()
        .next()
        .unwrap_or_default()
        .trim()
        .to_string()
}

pub(crate) fn normalize_tags(tags: impl IntoIterator<Item = impl Into<String>>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for tag in tags {
        let normalized = tag.into().trim().to_lowercase().replace(' ', "-");
        if normalized.is_empty() || out.contains(&normalized) {
            continue;
        }
        out.push(normalized);
        if out.len() == MAX_TAGS {
            break;
        }
    }
    out
}
