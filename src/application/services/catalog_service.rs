use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::{
    application::dtos::{
        AgentListResponse, AgentRequest, ContextListResponse, InsightListResponse, InsightRequest,
        ToolComparison, ToolListResponse, ToolRequest, UpsertContextRequest,
    },
    domain::{
        models::MAX_TAGS,
        Agent, CatalogRecord, ContextEntry, DomainError, Insight, Tool,
    },
};

use super::ContextAdmin;

const MAX_TEXT_CHARS: usize = 20_000;
const MAX_COMPARE: usize = 4;

/// Persistence contract for one kind of directory record.
pub trait CatalogRepository<T: CatalogRecord>: Send + Sync {
    /// All records in listing order.
    fn list(&self) -> Result<Vec<T>, DomainError>;

    fn get(&self, id: Uuid) -> Result<Option<T>, DomainError>;

    fn upsert(&self, record: &T) -> Result<(), DomainError>;

    /// Returns `false` when nothing was stored under `id`.
    fn delete(&self, id: Uuid) -> Result<bool, DomainError>;
}

/// Admin CRUD and the plain data-fetch functions used by listing pages.
pub struct CatalogService {
    tools: Arc<dyn CatalogRepository<Tool>>,
    insights: Arc<dyn CatalogRepository<Insight>>,
    agents: Arc<dyn CatalogRepository<Agent>>,
    contexts: Arc<dyn ContextAdmin>,
}

impl CatalogService {
    pub fn new(
        tools: Arc<dyn CatalogRepository<Tool>>,
        insights: Arc<dyn CatalogRepository<Insight>>,
        agents: Arc<dyn CatalogRepository<Agent>>,
        contexts: Arc<dyn ContextAdmin>,
    ) -> Self {
        Self {
            tools,
            insights,
            agents,
            contexts,
        }
    }

    // ---- tools ----

    pub fn list_tools(&self) -> Result<ToolListResponse, DomainError> {
        Ok(ToolListResponse {
            items: self.tools.list()?,
        })
    }

    pub fn get_tool(&self, id: Uuid) -> Result<Tool, DomainError> {
        self.tools
            .get(id)?
            .ok_or_else(|| DomainError::not_found(format!("tool {id}")))
    }

    pub fn create_tool(&self, payload: ToolRequest) -> Result<Tool, DomainError> {
        validate_tool(&payload)?;
        let tool = Tool::new(
            payload.name,
            payload.category,
            payload.description,
            payload.website,
            payload.pricing,
            payload.features,
            payload.tags,
        );
        self.tools.upsert(&tool)?;
        info!(target: "finsight::catalog", id = %tool.id, name = %tool.name, "tool created");
        Ok(tool)
    }

    pub fn update_tool(&self, id: Uuid, payload: ToolRequest) -> Result<Tool, DomainError> {
        validate_tool(&payload)?;
        let existing = self.get_tool(id)?;
        let mut tool = Tool::new(
            payload.name,
            payload.category,
            payload.description,
            payload.website,
            payload.pricing,
            payload.features,
            payload.tags,
        );
        tool.id = existing.id;
        tool.created_at = existing.created_at;
        tool.updated_at = Utc::now();
        self.tools.upsert(&tool)?;
        Ok(tool)
    }

    pub fn delete_tool(&self, id: Uuid) -> Result<(), DomainError> {
        if !self.tools.delete(id)? {
            return Err(DomainError::not_found(format!("tool {id}")));
        }
        info!(target: "finsight::catalog", %id, "tool deleted");
        Ok(())
    }

    /// The requested tools side by side, in request order.
    pub fn compare_tools(&self, ids: &[Uuid]) -> Result<ToolComparison, DomainError> {
        if ids.is_empty() {
            return Err(DomainError::validation("at least one tool id is required"));
        }
        if ids.len() > MAX_COMPARE {
            return Err(DomainError::limit(format!(
                "cannot compare more than {MAX_COMPARE} tools"
            )));
        }

        let tools = ids
            .iter()
            .map(|id| self.get_tool(*id))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ToolComparison { tools })
    }

    // ---- insights ----

    pub fn list_insights(&self) -> Result<InsightListResponse, DomainError> {
        Ok(InsightListResponse {
            items: self.insights.list()?,
        })
    }

    pub fn get_insight(&self, id: Uuid) -> Result<Insight, DomainError> {
        self.insights
            .get(id)?
            .ok_or_else(|| DomainError::not_found(format!("insight {id}")))
    }

    pub fn create_insight(&self, payload: InsightRequest) -> Result<Insight, DomainError> {
        self.validate_insight(&payload)?;
        let insight = Insight::new(
            payload.title,
            payload.summary,
            payload.body,
            payload.tags,
            payload.related_tool_ids,
        );
        self.insights.upsert(&insight)?;
        info!(target: "finsight::catalog", id = %insight.id, "insight created");
        Ok(insight)
    }

    pub fn update_insight(
        &self,
        id: Uuid,
        payload: InsightRequest,
    ) -> Result<Insight, DomainError> {
        self.validate_insight(&payload)?;
        let existing = self.get_insight(id)?;
        let mut insight = Insight::new(
            payload.title,
            payload.summary,
            payload.body,
            payload.tags,
            payload.related_tool_ids,
        );
        insight.id = existing.id;
        insight.published_at = existing.published_at;
        insight.updated_at = Utc::now();
        self.insights.upsert(&insight)?;
        Ok(insight)
    }

    pub fn delete_insight(&self, id: Uuid) -> Result<(), DomainError> {
        if !self.insights.delete(id)? {
            return Err(DomainError::not_found(format!("insight {id}")));
        }
        Ok(())
    }

    // ---- agents ----

    pub fn list_agents(&self) -> Result<AgentListResponse, DomainError> {
        Ok(AgentListResponse {
            items: self.agents.list()?,
        })
    }

    pub fn get_agent(&self, id: Uuid) -> Result<Agent, DomainError> {
        self.agents
            .get(id)?
            .ok_or_else(|| DomainError::not_found(format!("agent {id}")))
    }

    pub fn create_agent(&self, payload: AgentRequest) -> Result<Agent, DomainError> {
        self.validate_agent(&payload)?;
        let agent = Agent::new(
            payload.name,
            payload.description,
            payload.capabilities,
            payload.tool_ids,
        );
        self.agents.upsert(&agent)?;
        info!(target: "finsight::catalog", id = %agent.id, name = %agent.name, "agent created");
        Ok(agent)
    }

    pub fn update_agent(&self, id: Uuid, payload: AgentRequest) -> Result<Agent, DomainError> {
        self.validate_agent(&payload)?;
        let existing = self.get_agent(id)?;
        let mut agent = Agent::new(
            payload.name,
            payload.description,
            payload.capabilities,
            payload.tool_ids,
        );
        agent.id = existing.id;
        agent.created_at = existing.created_at;
        agent.updated_at = Utc::now();
        self.agents.upsert(&agent)?;
        Ok(agent)
    }

    pub fn delete_agent(&self, id: Uuid) -> Result<(), DomainError> {
        if !self.agents.delete(id)? {
            return Err(DomainError::not_found(format!("agent {id}")));
        }
        Ok(())
    }

    // ---- knowledge base ----

    pub fn list_contexts(&self) -> Result<ContextListResponse, DomainError> {
        Ok(ContextListResponse {
            items: self.contexts.fetch_all()?,
        })
    }

    pub fn get_context(&self, id: &str) -> Result<ContextEntry, DomainError> {
        self.contexts
            .get_entry(id)?
            .ok_or_else(|| DomainError::not_found(format!("context entry {id}")))
    }

    pub fn upsert_context(
        &self,
        payload: UpsertContextRequest,
    ) -> Result<ContextEntry, DomainError> {
        require("section", &payload.section)?;
        require("text", &payload.text)?;
        check_length("text", &payload.text)?;
        check_tags(&payload.tags)?;

        let entry = ContextEntry::new(payload.id, payload.section, payload.text, payload.tags);
        self.contexts.upsert_entry(&entry)?;
        info!(target: "finsight::catalog", id = %entry.id, section = %entry.section, "context entry saved");
        Ok(entry)
    }

    pub fn delete_context(&self, id: &str) -> Result<(), DomainError> {
        if !self.contexts.delete_entry(id)? {
            return Err(DomainError::not_found(format!("context entry {id}")));
        }
        info!(target: "finsight::catalog", %id, "context entry deleted");
        Ok(())
    }

    fn validate_insight(&self, payload: &InsightRequest) -> Result<(), DomainError> {
        require("title", &payload.title)?;
        require("summary", &payload.summary)?;
        require("body", &payload.body)?;
        check_length("body", &payload.body)?;
        check_tags(&payload.tags)?;
        self.ensure_tools_exist(&payload.related_tool_ids)
    }

    fn validate_agent(&self, payload: &AgentRequest) -> Result<(), DomainError> {
        require("name", &payload.name)?;
        require("description", &payload.description)?;
        check_length("description", &payload.description)?;
        self.ensure_tools_exist(&payload.tool_ids)
    }

    fn ensure_tools_exist(&self, ids: &[Uuid]) -> Result<(), DomainError> {
        for id in ids {
            if self.tools.get(*id)?.is_none() {
                return Err(DomainError::validation(format!("unknown tool id {id}")));
            }
        }
        Ok(())
    }
}

fn validate_tool(payload: &ToolRequest) -> Result<(), DomainError> {
    require("name", &payload.name)?;
    require("category", &payload.category)?;
    require("description", &payload.description)?;
    check_length("description", &payload.description)?;
    check_tags(&payload.tags)
}

fn require(field: &str, value: &str) -> Result<(), DomainError> {
    if value.trim().is_empty() {
        return Err(DomainError::validation(format!("{field} is required")));
    }
    Ok(())
}

fn check_length(field: &str, value: &str) -> Result<(), DomainError> {
    if value.chars().count() > MAX_TEXT_CHARS {
        return Err(DomainError::limit(format!(
            "{field} cannot exceed {MAX_TEXT_CHARS} characters"
        )));
    }
    Ok(())
}

fn check_tags(tags: &[String]) -> Result<(), DomainError> {
    if tags.len() > MAX_TAGS {
        return Err(DomainError::limit(format!(
            "tags cannot exceed {MAX_TAGS} entries"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::SledStore;

    fn service() -> (tempfile::TempDir, CatalogService) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = Arc::new(SledStore::open(dir.path().join("store")).expect("open store"));
        let service = CatalogService::new(
            Arc::new(store.catalog::<Tool>().expect("tools")),
            Arc::new(store.catalog::<Insight>().expect("insights")),
            Arc::new(store.catalog::<Agent>().expect("agents")),
            store,
        );
        (dir, service)
    }

    fn tool_request(name: &str) -> ToolRequest {
        ToolRequest {
            name: name.into(),
            category: "Payments".into(),
            description: format!("{name} automates reconciliation."),
            website: Some("https://example.com".into()),
            pricing: None,
            features: vec!["Invoice matching".into()],
            tags: vec!["Payments".into()],
        }
    }

    #[test]
    fn tool_crud_round() {
        let (_dir, service) = service();
        let created = service.create_tool(tool_request("LedgerBot")).expect("create");
        assert_eq!(created.tags, vec!["payments"]);

        let updated = service
            .update_tool(created.id, tool_request("LedgerBot Pro"))
            .expect("update");
        assert_eq!(updated.id, created.id);
        assert_eq!(updated.created_at, created.created_at);
        assert_eq!(service.get_tool(created.id).expect("get").name, "LedgerBot Pro");

        service.delete_tool(created.id).expect("delete");
        assert!(matches!(
            service.get_tool(created.id),
            Err(DomainError::NotFound(_))
        ));
        assert!(matches!(
            service.delete_tool(created.id),
            Err(DomainError::NotFound(_))
        ));
    }

    #[test]
    fn tool_validation_rejects_blank_fields_and_tag_floods() {
        let (_dir, service) = service();
        let mut blank = tool_request("x");
        blank.category = "  ".into();
        assert!(matches!(
            service.create_tool(blank),
            Err(DomainError::Validation(_))
        ));

        let mut flood = tool_request("Tagged");
        flood.tags = (0..=MAX_TAGS).map(|i| format!("tag{i}")).collect();
        assert!(matches!(
            service.create_tool(flood),
            Err(DomainError::LimitExceeded(_))
        ));
        assert!(service.list_tools().expect("list").items.is_empty());
    }

    #[test]
    fn compare_returns_tools_in_request_order() {
        let (_dir, service) = service();
        let a = service.create_tool(tool_request("Alpha")).expect("a");
        let b = service.create_tool(tool_request("Beta")).expect("b");

        let names: Vec<String> = service
            .compare_tools(&[b.id, a.id])
            .expect("compare")
            .tools
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(names, vec!["Beta", "Alpha"]);

        assert!(matches!(
            service.compare_tools(&[]),
            Err(DomainError::Validation(_))
        ));
        assert!(matches!(
            service.compare_tools(&[a.id, Uuid::new_v4()]),
            Err(DomainError::NotFound(_))
        ));
        assert!(matches!(
            service.compare_tools(&[a.id; 5]),
            Err(DomainError::LimitExceeded(_))
        ));
    }

    #[test]
    fn insights_and_agents_require_known_tools() {
        let (_dir, service) = service();
        let tool = service.create_tool(tool_request("RiskLens")).expect("tool");

        let insight = InsightRequest {
            title: "Fraud models in 2024".into(),
            summary: "What changed".into(),
            body: "Graph features went mainstream.".into(),
            tags: vec![],
            related_tool_ids: vec![Uuid::new_v4()],
        };
        assert!(matches!(
            service.create_insight(insight.clone()),
            Err(DomainError::Validation(_))
        ));

        let created = service
            .create_insight(InsightRequest {
                related_tool_ids: vec![tool.id],
                ..insight
            })
            .expect("insight");
        assert_eq!(service.list_insights().expect("list").items.len(), 1);

        let agent = service
            .create_agent(AgentRequest {
                name: "Underwriter".into(),
                description: "Scores loan applications.".into(),
                capabilities: vec!["credit scoring".into()],
                tool_ids: vec![tool.id],
            })
            .expect("agent");
        assert_eq!(service.get_agent(agent.id).expect("get").tool_ids, vec![tool.id]);

        let updated = service
            .update_insight(
                created.id,
                InsightRequest {
                    title: "Fraud models, revisited".into(),
                    summary: "Updated".into(),
                    body: "Still graphs.".into(),
                    tags: vec![],
                    related_tool_ids: vec![],
                },
            )
            .expect("update");
        assert_eq!(updated.published_at, created.published_at);
    }

    #[test]
    fn context_entries_are_managed_in_creation_order() {
        let (_dir, service) = service();
        let first = service
            .upsert_context(UpsertContextRequest {
                id: None,
                section: "Basics".into(),
                text: "AI in fintech covers fraud and lending.".into(),
                tags: vec![],
            })
            .expect("first");
        service
            .upsert_context(UpsertContextRequest {
                id: Some("lending".into()),
                section: "Lending".into(),
                text: "Alternative credit data.".into(),
                tags: vec![],
            })
            .expect("second");
        service
            .upsert_context(UpsertContextRequest {
                id: Some(first.id.clone()),
                section: "Basics".into(),
                text: "Revised overview.".into(),
                tags: vec![],
            })
            .expect("update");

        let items = service.list_contexts().expect("list").items;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id, first.id);
        assert_eq!(items[0].text, "Revised overview.");
        assert_eq!(items[1].id, "lending");

        assert!(matches!(
            service.upsert_context(UpsertContextRequest {
                id: None,
                section: "Basics".into(),
                text: " ".into(),
                tags: vec![],
            }),
            Err(DomainError::Validation(_))
        ));

        service.delete_context("lending").expect("delete");
        assert!(matches!(
            service.get_context("lending"),
            Err(DomainError::NotFound(_))
        ));
    }
}
