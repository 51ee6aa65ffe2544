use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use uuid::Uuid;

use super::{normalize_tags, sanitize_single_line};

/// Shared behaviour of directory records persisted by a catalog repository.
pub trait CatalogRecord: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Storage namespace for this record kind.
    const COLLECTION: &'static str;

    fn id(&self) -> Uuid;

    /// Ordering used by listing pages.
    fn listing_order(a: &Self, b: &Self) -> Ordering;
}

/// An AI fintech tool listed in the directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tool {
    pub id: Uuid,
    pub name: String,
    pub category: String,
    pub description: String,
    pub website: Option<String>,
    pub pricing: Option<String>,
    pub features: Vec<String>,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Tool {
    pub fn new(
        name: impl Into<String>,
        category: impl Into<String>,
        description: impl Into<String>,
        website: Option<String>,
        pricing: Option<String>,
        features: Vec<String>,
        tags: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: sanitize_single_line(name),
            category: sanitize_single_line(category),
            description: description.into().trim().to_string(),
            website: website.map(sanitize_single_line).filter(|w| !w.is_empty()),
            pricing: pricing.map(sanitize_single_line).filter(|p| !p.is_empty()),
            features: clean_list(features),
            tags: normalize_tags(tags),
            created_at: now,
            updated_at: now,
        }
    }
}

impl CatalogRecord for Tool {
    const COLLECTION: &'static str = "tools";

    fn id(&self) -> Uuid {
        self.id
    }

    fn listing_order(a: &Self, b: &Self) -> Ordering {
        a.name.to_lowercase().cmp(&b.name.to_lowercase())
    }
}

/// Editorial article about AI in financial services.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    pub id: Uuid,
    pub title: String,
    pub summary: String,
    pub body: String,
    pub tags: Vec<String>,
    pub related_tool_ids: Vec<Uuid>,
    pub published_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Insight {
    pub fn new(
        title: impl Into<String>,
        summary: impl Into<String>,
        body: impl Into<String>,
        tags: impl IntoIterator<Item = impl Into<String>>,
        related_tool_ids: Vec<Uuid>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title: sanitize_single_line(title),
            summary: summary.into().trim().to_string(),
            body: body.into().trim().to_string(),
            tags: normalize_tags(tags),
            related_tool_ids: dedup_ids(related_tool_ids),
            published_at: now,
            updated_at: now,
        }
    }

    pub fn as_summary(&self) -> InsightSummary {
        InsightSummary {
            id: self.id,
            title: self.title.clone(),
            summary: self.summary.clone(),
            tags: self.tags.clone(),
            published_at: self.published_at,
        }
    }
}

impl CatalogRecord for Insight {
    const COLLECTION: &'static str = "insights";

    fn id(&self) -> Uuid {
        self.id
    }

    fn listing_order(a: &Self, b: &Self) -> Ordering {
        b.published_at.cmp(&a.published_at)
    }
}

/// Lightweight projection used by listing and suggestion results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightSummary {
    pub id: Uuid,
    pub title: String,
    pub summary: String,
    pub tags: Vec<String>,
    pub published_at: DateTime<Utc>,
}

/// An autonomous agent composed from one or more listed tools.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub capabilities: Vec<String>,
    pub tool_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Agent {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        capabilities: Vec<String>,
        tool_ids: Vec<Uuid>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: sanitize_single_line(name),
            description: description.into().trim().to_string(),
            capabilities: clean_list(capabilities),
            tool_ids: dedup_ids(tool_ids),
            created_at: now,
            updated_at: now,
        }
    }
}

impl CatalogRecord for Agent {
    const COLLECTION: &'static str = "agents";

    fn id(&self) -> Uuid {
        self.id
    }

    fn listing_order(a: &Self, b: &Self) -> Ordering {
        a.name.to_lowercase().cmp(&b.name.to_lowercase())
    }
}

/// Structured tool facts extracted from free-form vendor copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDetails {
    pub name: String,
    pub category: String,
    pub description: String,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub pricing: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
}

pub(crate) fn clean_list(items: Vec<String>) -> Vec<String> {
    items
        .into_iter()
        .map(sanitize_single_line)
        .filter(|item| !item.is_empty())
        .collect()
}

fn dedup_ids(ids: Vec<Uuid>) -> Vec<Uuid> {
    let mut out = Vec::with_capacity(ids.len());
    for id in ids {
        if !out.contains(&id) {
            out.push(id);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_drops_blank_optional_fields() {
        let tool = Tool::new(
            "  LedgerBot ",
            "Accounting",
            "Reconciles books.",
            Some("   ".into()),
            Some("Freemium".into()),
            vec!["Bank feeds".into(), " ".into()],
            ["Bookkeeping"],
        );
        assert_eq!(tool.name, "LedgerBot");
        assert!(tool.website.is_none());
        assert_eq!(tool.pricing.as_deref(), Some("Freemium"));
        assert_eq!(tool.features, vec!["Bank feeds"]);
        assert_eq!(tool.tags, vec!["bookkeeping"]);
    }

    #[test]
    fn insights_list_newest_first() {
        let mut older = Insight::new("Old", "s", "b", ["a"], Vec::new());
        older.published_at = Utc::now() - chrono::Duration::days(3);
        let newer = Insight::new("New", "s", "b", ["a"], Vec::new());

        let mut items = vec![older.clone(), newer.clone()];
        items.sort_by(Insight::listing_order);
        assert_eq!(items[0].id, newer.id);
    }

    #[test]
    fn agent_tool_ids_are_deduplicated() {
        let id = Uuid::new_v4();
        let agent = Agent::new("Scout", "Finds deals", vec!["search".into()], vec![id, id]);
        assert_eq!(agent.tool_ids, vec![id]);
    }
}
