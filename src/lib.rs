use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use tracing::info;

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod settings;

use application::services::{
    ConciergeConfig, ContextSelector, ContextStore, FirstEntrySelector, KeywordOverlapSelector,
    ModelClient,
};
use application::{CatalogService, ConciergeService, ContentService, HealthStatusResponse};
use domain::{Agent, DomainError, Insight, Tool};
use infrastructure::{FirestoreContextStore, GeminiClient, SledStore};
use settings::{AppConfig, ConfigManager, ContextStoreBackend, Credentials, SelectorKind};

const ENV_DATA_DIR: &str = "FINSIGHT_DATA_DIR";
const ENV_LOG: &str = "FINSIGHT_LOG";

/// Everything a front end needs, wired once at startup.
pub struct AppHandles {
    pub concierge: Arc<ConciergeService>,
    pub content: Arc<ContentService>,
    pub catalog: Arc<CatalogService>,
    pub store: Arc<SledStore>,
    pub config: Arc<ConfigManager>,
    pub data_dir: PathBuf,
}

impl AppHandles {
    /// Readiness of the local store plus a summary of the active wiring.
    pub fn health(&self) -> Result<HealthStatusResponse, DomainError> {
        self.store.ping()?;

        let config = self.config.current();
        let configured = self.concierge.config().has_credential();
        Ok(HealthStatusResponse {
            ok: true,
            message: if configured {
                "ready".into()
            } else {
                "ready (model credential missing)".into()
            },
            details: Some(format!(
                "model: {}, context_store: {}, checked_at: {}",
                config.model.model,
                config.context_store.id(),
                Utc::now()
            )),
        })
    }
}

/// Install the global tracing subscriber once; later calls are no-ops.
pub fn init_tracing() {
    static INIT: std::sync::OnceLock<()> = std::sync::OnceLock::new();

    let _ = INIT.get_or_init(|| {
        let filter = std::env::var(ENV_LOG).unwrap_or_else(|_| "info".into());
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .compact()
            .try_init();
    });
}

/// Bootstrap using the data directory and credentials from the environment.
pub fn build_environment() -> Result<AppHandles> {
    let data_dir = resolve_data_dir()?;
    build_environment_at(data_dir, Credentials::from_env())
}

/// Bootstrap against an explicit data directory and credential set.
pub fn build_environment_at(data_dir: PathBuf, credentials: Credentials) -> Result<AppHandles> {
    std::fs::create_dir_all(&data_dir).context("failed to create data directory")?;

    let config = Arc::new(ConfigManager::load(&data_dir).context("failed to load config file")?);
    let active = config.current();

    let store = Arc::new(
        SledStore::open(data_dir.join("store"))
            .map_err(|err| anyhow!(err.to_string()))
            .context("failed to open embedded store")?,
    );

    let context_store = init_context_store(&active, &credentials, &store);
    let model = init_model(&active, &credentials);
    let concierge_config = ConciergeConfig {
        context_char_budget: active.concierge.context_char_budget.max(1),
        ..ConciergeConfig::new(credentials.model_api_key.clone(), active.model.model.clone())
    };

    if !concierge_config.has_credential() {
        tracing::warn!(
            target: "finsight::settings",
            "no model API key found; the concierge will answer with a configuration notice"
        );
    }

    let concierge = Arc::new(ConciergeService::with_selector(
        context_store,
        Arc::clone(&model),
        init_selector(active.concierge.selector),
        concierge_config.clone(),
    ));

    let insights = Arc::new(store.catalog::<Insight>().map_err(|err| anyhow!(err))?);
    let content = Arc::new(ContentService::new(
        model,
        insights.clone(),
        concierge_config,
    ));

    let catalog = Arc::new(CatalogService::new(
        Arc::new(store.catalog::<Tool>().map_err(|err| anyhow!(err))?),
        insights,
        Arc::new(store.catalog::<Agent>().map_err(|err| anyhow!(err))?),
        store.clone(),
    ));

    info!(
        target: "finsight::settings",
        data_dir = %data_dir.display(),
        context_store = active.context_store.id(),
        model = %active.model.model,
        "environment ready"
    );

    Ok(AppHandles {
        concierge,
        content,
        catalog,
        store,
        config,
        data_dir,
    })
}

fn init_context_store(
    config: &AppConfig,
    credentials: &Credentials,
    local: &Arc<SledStore>,
) -> Arc<dyn ContextStore> {
    let store: Arc<dyn ContextStore> = match &config.context_store {
        ContextStoreBackend::Local => local.clone(),
        ContextStoreBackend::Firestore {
            project_id,
            collection,
            base_url,
        } => Arc::new(FirestoreContextStore::new(
            base_url.clone(),
            credentials
                .firestore_project_id
                .clone()
                .or_else(|| project_id.clone()),
            credentials.firestore_api_key.clone(),
            collection.clone(),
        )),
    };
    store
}

fn init_model(config: &AppConfig, credentials: &Credentials) -> Arc<dyn ModelClient> {
    Arc::new(GeminiClient::new(
        config.model.base_url.clone(),
        config.model.model.clone(),
        credentials.model_api_key.clone().unwrap_or_default(),
        Duration::from_secs(config.model.timeout_secs.max(1)),
    ))
}

fn init_selector(kind: SelectorKind) -> Arc<dyn ContextSelector> {
    match kind {
        SelectorKind::FirstEntry => Arc::new(FirstEntrySelector),
        SelectorKind::KeywordOverlap => Arc::new(KeywordOverlapSelector),
    }
}

fn resolve_data_dir() -> Result<PathBuf> {
    if let Some(dir) = std::env::var_os(ENV_DATA_DIR).filter(|d| !d.is_empty()) {
        return Ok(PathBuf::from(dir));
    }

    let dirs = directories::ProjectDirs::from("dev", "finsight", "FinSight")
        .ok_or_else(|| anyhow!("unable to determine OS data dir"))?;
    Ok(dirs.data_dir().to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::{messages, ContextAdmin};
    use crate::application::{ToolRequest, UpsertContextRequest};

    fn no_credentials() -> Credentials {
        Credentials::default()
    }

    #[test]
    fn bootstrap_without_credentials_answers_with_configuration_notice() {
        let dir = tempfile::tempdir().expect("tempdir");
        let handles = build_environment_at(dir.path().to_path_buf(), no_credentials())
            .expect("bootstrap");

        assert_eq!(
            handles.concierge.ask("What is open banking?"),
            messages::CONFIGURATION_ERROR
        );
        let health = handles.health().expect("health");
        assert!(health.ok);
        assert!(health.message.contains("credential missing"));
    }

    #[test]
    fn catalog_and_knowledge_base_share_the_local_store() {
        let dir = tempfile::tempdir().expect("tempdir");
        let handles = build_environment_at(dir.path().to_path_buf(), no_credentials())
            .expect("bootstrap");

        handles
            .catalog
            .upsert_context(UpsertContextRequest {
                id: Some("intro".into()),
                section: "Basics".into(),
                text: "AI helps detect fraud.".into(),
                tags: vec!["fraud".into()],
            })
            .expect("upsert");
        let tool = handles
            .catalog
            .create_tool(ToolRequest {
                name: "FraudShield".into(),
                category: "Risk".into(),
                description: "Flags suspicious payments.".into(),
                website: None,
                pricing: None,
                features: vec![],
                tags: vec![],
            })
            .expect("tool");

        assert_eq!(handles.store.fetch_all().expect("fetch").len(), 1);
        assert!(handles.store.get_entry("intro").expect("get").is_some());
        assert_eq!(handles.catalog.get_tool(tool.id).expect("get").name, "FraudShield");
    }

    #[test]
    fn firestore_backend_without_credentials_still_boots() {
        let dir = tempfile::tempdir().expect("tempdir");
        let manager = ConfigManager::load(dir.path()).expect("load");
        manager
            .update(|cfg| {
                cfg.context_store = ContextStoreBackend::Firestore {
                    project_id: None,
                    collection: "context".into(),
                    base_url: "http://127.0.0.1:9".into(),
                }
            })
            .expect("update");

        let handles = build_environment_at(dir.path().to_path_buf(), no_credentials())
            .expect("bootstrap");
        assert_eq!(handles.config.current().context_store.id(), "firestore");
    }
}
