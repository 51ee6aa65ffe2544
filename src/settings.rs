use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::application::services::prompt::CONTEXT_CHAR_BUDGET;
use crate::infrastructure::http_client::{firestore_store, gemini_client};

/// Default filename used to persist configuration within the data directory.
const CONFIG_FILENAME: &str = "config.json";

pub const ENV_MODEL_API_KEY: &str = "FINSIGHT_MODEL_API_KEY";
const ENV_MODEL_API_KEY_FALLBACKS: [&str; 2] = ["GEMINI_API_KEY", "GOOGLE_API_KEY"];
pub const ENV_FIRESTORE_API_KEY: &str = "FINSIGHT_FIRESTORE_API_KEY";
pub const ENV_FIRESTORE_PROJECT: &str = "FINSIGHT_FIRESTORE_PROJECT";

/// Where the concierge reads its knowledge base from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "backend", rename_all = "kebab-case")]
pub enum ContextStoreBackend {
    /// Embedded sled store in the data directory.
    Local,
    /// A Firestore collection read over REST.
    Firestore {
        #[serde(default)]
        project_id: Option<String>,
        #[serde(default = "default_collection")]
        collection: String,
        #[serde(default = "default_firestore_url")]
        base_url: String,
    },
}

impl Default for ContextStoreBackend {
    fn default() -> Self {
        ContextStoreBackend::Local
    }
}

impl ContextStoreBackend {
    pub fn id(&self) -> &'static str {
        match self {
            ContextStoreBackend::Local => "local",
            ContextStoreBackend::Firestore { .. } => "firestore",
        }
    }
}

/// Fixed model identity and transport settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModelSettings {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_model_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            model: default_model(),
            base_url: default_model_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum SelectorKind {
    #[default]
    FirstEntry,
    KeywordOverlap,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConciergeSettings {
    #[serde(default)]
    pub selector: SelectorKind,
    #[serde(default = "default_char_budget")]
    pub context_char_budget: usize,
}

impl Default for ConciergeSettings {
    fn default() -> Self {
        Self {
            selector: SelectorKind::default(),
            context_char_budget: default_char_budget(),
        }
    }
}

/// Complete persisted configuration payload. Credentials are never part of it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppConfig {
    #[serde(default)]
    pub model: ModelSettings,
    #[serde(default)]
    pub context_store: ContextStoreBackend,
    #[serde(default)]
    pub concierge: ConciergeSettings,
}

/// Secrets resolved from the environment at startup.
#[derive(Clone, Default)]
pub struct Credentials {
    pub model_api_key: Option<String>,
    pub firestore_api_key: Option<String>,
    pub firestore_project_id: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("model_api_key", &self.model_api_key.as_ref().map(|_| "<set>"))
            .field(
                "firestore_api_key",
                &self.firestore_api_key.as_ref().map(|_| "<set>"),
            )
            .field("firestore_project_id", &self.firestore_project_id)
            .finish()
    }
}

impl Credentials {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Resolve credentials through `lookup`; blank values count as absent.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let model_api_key = std::iter::once(ENV_MODEL_API_KEY)
            .chain(ENV_MODEL_API_KEY_FALLBACKS)
            .find_map(|name| get(name));

        Self {
            model_api_key,
            firestore_api_key: get(ENV_FIRESTORE_API_KEY),
            firestore_project_id: get(ENV_FIRESTORE_PROJECT),
        }
    }
}

/// Thread-safe manager responsible for loading and persisting `AppConfig`.
pub struct ConfigManager {
    path: PathBuf,
    state: RwLock<AppConfig>,
}

impl ConfigManager {
    /// Create a manager rooted at `data_dir`. The JSON file will be located at
    /// `<data_dir>/config.json`. A missing or unreadable file yields defaults.
    pub fn load(data_dir: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = data_dir.as_ref().join(CONFIG_FILENAME);
        let config = if path.exists() {
            match serde_json::from_slice::<AppConfig>(&fs::read(&path)?) {
                Ok(config) => config,
                Err(err) => {
                    tracing::warn!(
                        target: "finsight::settings",
                        path = %path.display(),
                        error = %err,
                        "config file is invalid, using defaults"
                    );
                    AppConfig::default()
                }
            }
        } else {
            AppConfig::default()
        };

        Ok(Self {
            path,
            state: RwLock::new(config),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Snapshot of the current configuration.
    pub fn current(&self) -> AppConfig {
        self.state.read().clone()
    }

    /// Apply `change` and persist the result to disk.
    pub fn update(&self, change: impl FnOnce(&mut AppConfig)) -> std::io::Result<AppConfig> {
        let mut guard = self.state.write();
        let mut next = guard.clone();
        change(&mut next);
        self.persist(&next)?;
        *guard = next.clone();
        Ok(next)
    }

    /// Ensure the backing directory exists and write the JSON payload.
    fn persist(&self, config: &AppConfig) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let payload = serde_json::to_vec_pretty(config)?;
        fs::write(&self.path, payload)
    }
}

fn default_model() -> String {
    gemini_client::DEFAULT_MODEL.to_string()
}

fn default_model_url() -> String {
    gemini_client::DEFAULT_BASE_URL.to_string()
}

const fn default_timeout_secs() -> u64 {
    60
}

const fn default_char_budget() -> usize {
    CONTEXT_CHAR_BUDGET
}

fn default_collection() -> String {
    firestore_store::DEFAULT_COLLECTION.to_string()
}

fn default_firestore_url() -> String {
    firestore_store::DEFAULT_BASE_URL.to_string()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let manager = ConfigManager::load(dir.path()).expect("load");
        let config = manager.current();
        assert_eq!(config.context_store, ContextStoreBackend::Local);
        assert_eq!(config.model.model, "gemini-1.5-flash");
        assert_eq!(config.concierge.context_char_budget, 1000);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(
            dir.path().join(CONFIG_FILENAME),
            r#"{"context_store":{"backend":"firestore","project_id":"demo"},"concierge":{"selector":"keyword-overlap"}}"#,
        )
        .expect("write");

        let config = ConfigManager::load(dir.path()).expect("load").current();
        assert_eq!(
            config.context_store,
            ContextStoreBackend::Firestore {
                project_id: Some("demo".into()),
                collection: "context".into(),
                base_url: "https://firestore.googleapis.com".into(),
            }
        );
        assert_eq!(config.concierge.selector, SelectorKind::KeywordOverlap);
        assert_eq!(config.model, ModelSettings::default());
    }

    #[test]
    fn invalid_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join(CONFIG_FILENAME), "not json").expect("write");
        let config = ConfigManager::load(dir.path()).expect("load").current();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn update_persists_to_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let manager = ConfigManager::load(dir.path()).expect("load");
        manager
            .update(|cfg| cfg.model.model = "gemini-1.5-pro".into())
            .expect("update");

        let reloaded = ConfigManager::load(dir.path()).expect("reload").current();
        assert_eq!(reloaded.model.model, "gemini-1.5-pro");
    }

    #[test]
    fn credentials_prefer_primary_key_and_ignore_blanks() {
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_MODEL_API_KEY, "  "),
            ("GEMINI_API_KEY", "gemini-key"),
            ("GOOGLE_API_KEY", "google-key"),
            (ENV_FIRESTORE_PROJECT, "demo"),
        ]);
        let creds = Credentials::from_lookup(|name| env.get(name).map(|v| v.to_string()));

        assert_eq!(creds.model_api_key.as_deref(), Some("gemini-key"));
        assert_eq!(creds.firestore_project_id.as_deref(), Some("demo"));
        assert!(creds.firestore_api_key.is_none());
        assert!(!format!("{creds:?}").contains("gemini-key"));
    }
}
