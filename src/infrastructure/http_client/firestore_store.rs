//! Knowledge-base reader for a managed Firestore collection over its REST API.

use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::application::services::ContextStore;
use crate::domain::{ContextEntry, DomainError};

use super::ErrorResponse;

pub const DEFAULT_BASE_URL: &str = "https://firestore.googleapis.com";
pub const DEFAULT_COLLECTION: &str = "context";

const PAGE_SIZE: usize = 300;
/// Hard stop so a misbehaving page token can never loop forever.
const MAX_PAGES: usize = 20;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ListDocumentsResponse {
    #[serde(default)]
    documents: Vec<Document>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Document {
    name: String,
    #[serde(default)]
    fields: HashMap<String, Value>,
}

/// The subset of Firestore's typed value encoding we read; other value types are ignored.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Value {
    #[serde(default)]
    string_value: Option<String>,
    #[serde(default)]
    array_value: Option<ArrayValue>,
}

#[derive(Debug, Default, Deserialize)]
struct ArrayValue {
    #[serde(default)]
    values: Vec<Value>,
}

/// Read-only [`ContextStore`] over one Firestore collection.
///
/// Missing credentials do not prevent construction; they surface as
/// `StoreUnavailable` on every read.
pub struct FirestoreContextStore {
    base_url: String,
    project_id: Option<String>,
    api_key: Option<String>,
    collection: String,
    agent: ureq::Agent,
}

impl FirestoreContextStore {
    pub fn new(
        base_url: impl Into<String>,
        project_id: Option<String>,
        api_key: Option<String>,
        collection: impl Into<String>,
    ) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(30))
            .build();

        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            project_id: project_id.filter(|p| !p.trim().is_empty()),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            collection: collection.into(),
            agent,
        }
    }

    fn collection_url(&self, project_id: &str) -> String {
        format!(
            "{}/v1/projects/{}/databases/(default)/documents/{}",
            self.base_url,
            urlencoding::encode(project_id),
            urlencoding::encode(&self.collection)
        )
    }

    fn fetch_page(
        &self,
        url: &str,
        api_key: &str,
        page_token: Option<&str>,
    ) -> Result<ListDocumentsResponse, DomainError> {
        let mut request = self
            .agent
            .get(url)
            .set("x-goog-api-key", api_key)
            .query("pageSize", &PAGE_SIZE.to_string());
        if let Some(token) = page_token {
            request = request.query("pageToken", token);
        }

        let response = request.call().map_err(|err| match err {
            ureq::Error::Status(code, response) => {
                let detail = response
                    .into_json::<ErrorResponse>()
                    .map(|body| body.error.message)
                    .unwrap_or_default();
                DomainError::store_unavailable(format!("HTTP {code} {detail}"))
            }
            // The transport's Display includes the request URL; keep it out of logs.
            ureq::Error::Transport(transport) => DomainError::store_unavailable(format!(
                "network error: {}: {}",
                transport.kind(),
                transport.message().unwrap_or("no detail")
            )),
        })?;

        response.into_json().map_err(|err| {
            DomainError::store_unavailable(format!("failed to parse documents response: {err}"))
        })
    }
}

impl ContextStore for FirestoreContextStore {
    fn fetch_all(&self) -> Result<Vec<ContextEntry>, DomainError> {
        let project_id = self
            .project_id
            .as_deref()
            .ok_or_else(|| DomainError::store_unavailable("Firestore project id is not set"))?;
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| DomainError::store_unavailable("Firestore API key is not set"))?;

        let url = self.collection_url(project_id);
        let mut entries = Vec::new();
        let mut page_token: Option<String> = None;

        for _ in 0..MAX_PAGES {
            let page = self.fetch_page(&url, api_key, page_token.as_deref())?;
            entries.extend(decode_documents(page.documents));

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        debug!(
            target: "finsight::http",
            collection = %self.collection,
            count = entries.len(),
            "context entries fetched"
        );
        Ok(entries)
    }
}

fn decode_documents(documents: Vec<Document>) -> impl Iterator<Item = ContextEntry> {
    documents.into_iter().map(|mut doc| {
        let id = doc
            .name
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_string();
        let section = take_string(&mut doc.fields, "section");
        let text = take_string(&mut doc.fields, "text");
        let tags: Vec<String> = doc
            .fields
            .remove("tags")
            .and_then(|value| value.array_value)
            .map(|array| {
                array
                    .values
                    .into_iter()
                    .filter_map(|value| value.string_value)
                    .collect()
            })
            .unwrap_or_default();

        ContextEntry {
            id,
            section,
            text,
            tags,
        }
    })
}

fn take_string(fields: &mut HashMap<String, Value>, key: &str) -> String {
    fields
        .remove(key)
        .and_then(|value| value.string_value)
        .unwrap_or_default()
}
