use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::{
    application::dtos::{AnswerOutcome, AskResponse},
    domain::{ContextEntry, DomainError, ModelError, ModelErrorKind},
};

use crate::infrastructure::http_client::gemini_client::DEFAULT_MODEL;

use super::prompt::{compose_concierge_prompt, CONTEXT_CHAR_BUDGET, FALLBACK_CONTEXT};

/// Fixed user-facing sentences returned instead of raw failures.
pub mod messages {
    pub const CONFIGURATION_ERROR: &str = "The AI Concierge is not configured correctly right \
now. Please contact the site administrator.";
    pub const EMPTY_RESPONSE: &str = "I'm sorry, I was unable to generate a response to your \
question. Please try rephrasing it.";
    pub const CREDENTIAL_ERROR: &str = "There seems to be a problem with the AI service \
configuration (API key). Please contact the site administrator.";
    pub const CONNECTIVITY_ERROR: &str = "I'm having trouble connecting to the AI service. \
Please check your network connection and try again.";
    pub const QUOTA_ERROR: &str = "The AI service is experiencing high demand at the moment. \
Please try again in a few minutes.";
    pub const GENERIC_ERROR: &str = "I'm sorry, something went wrong while answering your \
question. Please try again later.";
}

/// Explicit configuration handed to the concierge at construction time.
#[derive(Debug, Clone)]
pub struct ConciergeConfig {
    pub model_api_key: Option<String>,
    pub model: String,
    pub context_char_budget: usize,
}

impl Default for ConciergeConfig {
    fn default() -> Self {
        Self {
            model_api_key: None,
            model: DEFAULT_MODEL.into(),
            context_char_budget: CONTEXT_CHAR_BUDGET,
        }
    }
}

impl ConciergeConfig {
    pub fn new(model_api_key: Option<String>, model: impl Into<String>) -> Self {
        Self {
            model_api_key: model_api_key.filter(|key| !key.trim().is_empty()),
            model: model.into(),
            ..Self::default()
        }
    }

    pub fn has_credential(&self) -> bool {
        self.model_api_key
            .as_deref()
            .is_some_and(|key| !key.trim().is_empty())
    }
}

/// Read access to the knowledge base.
pub trait ContextStore: Send + Sync {
    /// Every entry currently stored, in store order.
    fn fetch_all(&self) -> Result<Vec<ContextEntry>, DomainError>;
}

/// Write access used by the knowledge-base admin screens.
pub trait ContextAdmin: ContextStore {
    fn get_entry(&self, id: &str) -> Result<Option<ContextEntry>, DomainError>;

    fn upsert_entry(&self, entry: &ContextEntry) -> Result<(), DomainError>;

    /// Returns `false` when no entry had that id.
    fn delete_entry(&self, id: &str) -> Result<bool, DomainError>;
}

/// Contract for the hosted generative model.
pub trait ModelClient: Send + Sync {
    /// Generate text for `prompt`. `Ok(None)` means the call succeeded without any text.
    fn generate(&self, prompt: &str) -> Result<Option<String>, ModelError>;

    fn model_name(&self) -> &str;
}

/// Picks the entry whose text grounds the answer.
pub trait ContextSelector: Send + Sync {
    fn select<'a>(&self, query: &str, entries: &'a [ContextEntry]) -> Option<&'a ContextEntry>;
}

/// Always uses the first entry the store returned.
#[derive(Debug, Default, Clone, Copy)]
pub struct FirstEntrySelector;

impl ContextSelector for FirstEntrySelector {
    fn select<'a>(&self, _query: &str, entries: &'a [ContextEntry]) -> Option<&'a ContextEntry> {
        entries.first()
    }
}

/// Scores entries by how many distinct query words appear in their section, tags or text.
///
/// Ties (including "no overlap at all") resolve to the earliest entry, so an unrelated
/// question behaves exactly like [`FirstEntrySelector`].
#[derive(Debug, Default, Clone, Copy)]
pub struct KeywordOverlapSelector;

impl KeywordOverlapSelector {
    fn words(text: &str) -> HashSet<String> {
        text.split(|c: char| !c.is_alphanumeric())
            .filter(|word| word.chars().count() >= 3)
            .map(str::to_lowercase)
            .collect()
    }
}

impl ContextSelector for KeywordOverlapSelector {
    fn select<'a>(&self, query: &str, entries: &'a [ContextEntry]) -> Option<&'a ContextEntry> {
        let wanted = Self::words(query);
        let mut best: Option<(&ContextEntry, usize)> = None;

        for entry in entries {
            let haystack = format!("{} {} {}", entry.section, entry.tags.join(" "), entry.text);
            let score = Self::words(&haystack).intersection(&wanted).count();
            if best.map_or(true, |(_, top)| score > top) {
                best = Some((entry, score));
            }
        }

        best.map(|(entry, _)| entry)
    }
}

/// The concierge pipeline: fetch context, compose a prompt, call the model, answer.
///
/// Every path ends in a plain sentence; nothing here returns an error to the caller.
pub struct ConciergeService {
    store: Arc<dyn ContextStore>,
    model: Arc<dyn ModelClient>,
    selector: Arc<dyn ContextSelector>,
    config: ConciergeConfig,
}

impl ConciergeService {
    pub fn new(
        store: Arc<dyn ContextStore>,
        model: Arc<dyn ModelClient>,
        config: ConciergeConfig,
    ) -> Self {
        Self::with_selector(store, model, Arc::new(FirstEntrySelector), config)
    }

    pub fn with_selector(
        store: Arc<dyn ContextStore>,
        model: Arc<dyn ModelClient>,
        selector: Arc<dyn ContextSelector>,
        config: ConciergeConfig,
    ) -> Self {
        Self {
            store,
            model,
            selector,
            config,
        }
    }

    pub fn config(&self) -> &ConciergeConfig {
        &self.config
    }

    /// Answer `query` with model text or one of the fixed fallback sentences.
    pub fn ask(&self, query: &str) -> String {
        self.respond(query).answer
    }

    /// Same as [`ask`](Self::ask) but also reports which terminal state was reached.
    pub fn respond(&self, query: &str) -> AskResponse {
        debug!(
            target: "finsight::concierge",
            query_chars = query.chars().count(),
            "concierge request received"
        );

        if !self.config.has_credential() {
            warn!(
                target: "finsight::concierge",
                "model credential missing, skipping context fetch and model call"
            );
            return reply(messages::CONFIGURATION_ERROR, AnswerOutcome::Misconfigured);
        }

        let context = self.fetch_context(query);
        let prompt = compose_concierge_prompt(&context, query, self.config.context_char_budget);
        debug!(
            target: "finsight::concierge",
            prompt_chars = prompt.chars().count(),
            "prompt composed"
        );

        match self.model.generate(&prompt) {
            Ok(Some(text)) if !text.trim().is_empty() => {
                info!(
                    target: "finsight::concierge",
                    model = self.model.model_name(),
                    answer_chars = text.chars().count(),
                    "concierge answered"
                );
                AskResponse {
                    answer: text,
                    outcome: AnswerOutcome::Answered,
                }
            }
            Ok(_) => {
                warn!(target: "finsight::concierge", "model returned no text");
                reply(messages::EMPTY_RESPONSE, AnswerOutcome::EmptyResponse)
            }
            Err(err) => {
                warn!(
                    target: "finsight::concierge",
                    kind = %err.kind,
                    error = %err.message,
                    "model call failed"
                );
                reply(
                    failure_message(err.kind),
                    AnswerOutcome::ModelFailure(err.kind),
                )
            }
        }
    }

    fn fetch_context(&self, query: &str) -> String {
        match self.store.fetch_all() {
            Ok(entries) => match self.selector.select(query, &entries) {
                Some(entry) => {
                    debug!(
                        target: "finsight::concierge",
                        entry = %entry.id,
                        available = entries.len(),
                        "context entry selected"
                    );
                    entry.text.clone()
                }
                None => {
                    debug!(target: "finsight::concierge", "knowledge base is empty");
                    FALLBACK_CONTEXT.to_string()
                }
            },
            Err(err) => {
                warn!(
                    target: "finsight::concierge",
                    error = %err,
                    "context store unavailable, using fallback context"
                );
                FALLBACK_CONTEXT.to_string()
            }
        }
    }
}

/// The fixed sentence shown for each model failure category.
pub fn failure_message(kind: ModelErrorKind) -> &'static str {
    match kind {
        ModelErrorKind::Credential => messages::CREDENTIAL_ERROR,
        ModelErrorKind::Connectivity => messages::CONNECTIVITY_ERROR,
        ModelErrorKind::Quota => messages::QUOTA_ERROR,
        ModelErrorKind::Generic => messages::GENERIC_ERROR,
    }
}

fn reply(message: &str, outcome: AnswerOutcome) -> AskResponse {
    AskResponse {
        answer: message.to_string(),
        outcome,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use parking_lot::Mutex;

    use super::*;

    struct StubStore {
        result: Result<Vec<ContextEntry>, String>,
        calls: AtomicUsize,
    }

    impl StubStore {
        fn with_entries(entries: Vec<ContextEntry>) -> Arc<Self> {
            Arc::new(Self {
                result: Ok(entries),
                calls: AtomicUsize::new(0),
            })
        }

        fn failing(message: &str) -> Arc<Self> {
            Arc::new(Self {
                result: Err(message.to_string()),
                calls: AtomicUsize::new(0),
            })
        }
    }

    impl ContextStore for StubStore {
        fn fetch_all(&self) -> Result<Vec<ContextEntry>, DomainError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result
                .clone()
                .map_err(DomainError::store_unavailable)
        }
    }

    struct StubModel {
        reply: Result<Option<String>, ModelError>,
        calls: AtomicUsize,
        prompts: Mutex<Vec<String>>,
    }

    impl StubModel {
        fn replying(reply: Result<Option<String>, ModelError>) -> Arc<Self> {
            Arc::new(Self {
                reply,
                calls: AtomicUsize::new(0),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn text(text: &str) -> Arc<Self> {
            Self::replying(Ok(Some(text.to_string())))
        }

        fn last_prompt(&self) -> String {
            self.prompts.lock().last().cloned().unwrap_or_default()
        }
    }

    impl ModelClient for StubModel {
        fn generate(&self, prompt: &str) -> Result<Option<String>, ModelError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.prompts.lock().push(prompt.to_string());
            self.reply.clone()
        }

        fn model_name(&self) -> &str {
            "stub-model"
        }
    }

    fn entry(id: &str, section: &str, text: &str) -> ContextEntry {
        ContextEntry::new(Some(id.into()), section, text, ["fintech"])
    }

    fn configured() -> ConciergeConfig {
        ConciergeConfig::new(Some("test-key".into()), "stub-model")
    }

    fn service(store: Arc<StubStore>, model: Arc<StubModel>) -> ConciergeService {
        ConciergeService::new(store, model, configured())
    }

    #[test]
    fn missing_credential_short_circuits_without_remote_calls() {
        let store = StubStore::with_entries(vec![entry("a", "Basics", "text")]);
        let model = StubModel::text("should not be used");
        let concierge = ConciergeService::new(
            store.clone(),
            model.clone(),
            ConciergeConfig::new(None, "stub-model"),
        );

        let response = concierge.respond("What is open banking?");

        assert_eq!(response.answer, messages::CONFIGURATION_ERROR);
        assert_eq!(response.outcome, AnswerOutcome::Misconfigured);
        assert_eq!(store.calls.load(Ordering::SeqCst), 0);
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn blank_credential_counts_as_missing() {
        let store = StubStore::with_entries(Vec::new());
        let model = StubModel::text("unused");
        let mut config = configured();
        config.model_api_key = Some("   ".into());
        let concierge = ConciergeService::new(store.clone(), model.clone(), config);

        assert_eq!(concierge.ask("hi"), messages::CONFIGURATION_ERROR);
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn returns_model_text_verbatim() {
        let store = StubStore::with_entries(vec![entry("a", "Basics", "Robo-advisors exist.")]);
        let model = StubModel::text("  Robo-advisors automate investing.\n");
        let concierge = service(store.clone(), model.clone());

        let response = concierge.respond("What is a robo-advisor?");

        assert_eq!(response.answer, "  Robo-advisors automate investing.\n");
        assert_eq!(response.outcome, AnswerOutcome::Answered);
        assert_eq!(store.calls.load(Ordering::SeqCst), 1);
        assert_eq!(model.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn first_entry_grounds_the_prompt() {
        let store = StubStore::with_entries(vec![
            entry("a", "Payments", "FIRST-ENTRY-TEXT"),
            entry("b", "Lending", "SECOND-ENTRY-TEXT"),
        ]);
        let model = StubModel::text("ok");
        let concierge = service(store, model.clone());

        concierge.ask("Tell me about lending");

        let prompt = model.last_prompt();
        assert!(prompt.contains("FIRST-ENTRY-TEXT"));
        assert!(!prompt.contains("SECOND-ENTRY-TEXT"));
        assert!(prompt.contains("Tell me about lending"));
    }

    #[test]
    fn long_context_is_truncated_in_prompt() {
        let text = format!("{}{}", "k".repeat(1000), "REMAINDER");
        let store = StubStore::with_entries(vec![entry("a", "Basics", &text)]);
        let model = StubModel::text("ok");
        let concierge = service(store, model.clone());

        concierge.ask("q");

        let prompt = model.last_prompt();
        assert!(prompt.contains(&format!("{}...", "k".repeat(1000))));
        assert!(!prompt.contains("REMAINDER"));
    }

    #[test]
    fn empty_store_uses_fallback_context() {
        let store = StubStore::with_entries(Vec::new());
        let model = StubModel::text("ok");
        let concierge = service(store, model.clone());

        concierge.ask("What is AI in fintech?");

        assert!(model.last_prompt().contains("AI in fintech refers to"));
    }

    #[test]
    fn store_failure_is_absorbed() {
        let store = StubStore::failing("firestore: permission denied");
        let model = StubModel::text("Answer from fallback");
        let concierge = service(store.clone(), model.clone());

        let response = concierge.respond("What is AI in fintech?");

        assert_eq!(response.answer, "Answer from fallback");
        assert_eq!(store.calls.load(Ordering::SeqCst), 1);
        assert_eq!(model.calls.load(Ordering::SeqCst), 1);
        let prompt = model.last_prompt();
        assert!(prompt.contains("AI in fintech refers to"));
        assert!(!prompt.contains("permission denied"));
    }

    #[test]
    fn empty_model_output_yields_fixed_sentence() {
        for reply in [Ok(Some(String::new())), Ok(Some("  \n".into())), Ok(None)] {
            let concierge = service(
                StubStore::with_entries(Vec::new()),
                StubModel::replying(reply),
            );
            let response = concierge.respond("q");
            assert_eq!(response.answer, messages::EMPTY_RESPONSE);
            assert_eq!(response.outcome, AnswerOutcome::EmptyResponse);
        }
    }

    #[test]
    fn model_failures_map_to_fixed_sentences() {
        let cases = [
            ("You exceeded your current quota", messages::QUOTA_ERROR),
            ("network timeout", messages::CONNECTIVITY_ERROR),
            ("API key not valid", messages::CREDENTIAL_ERROR),
            ("something odd happened", messages::GENERIC_ERROR),
            // Priority: API key before network before quota.
            ("network error: API key rejected", messages::CREDENTIAL_ERROR),
            ("quota check failed: network down", messages::CONNECTIVITY_ERROR),
        ];

        for (message, expected) in cases {
            let concierge = service(
                StubStore::with_entries(Vec::new()),
                StubModel::replying(Err(ModelError::from_message(message))),
            );
            let answer = concierge.ask("q");
            assert_eq!(answer, expected, "message: {message}");
            assert!(!answer.contains(message));
        }
    }

    #[test]
    fn tagged_model_errors_skip_substring_matching() {
        let concierge = service(
            StubStore::with_entries(Vec::new()),
            StubModel::replying(Err(ModelError::new(
                ModelErrorKind::Quota,
                "HTTP 429 from upstream",
            ))),
        );
        let response = concierge.respond("q");
        assert_eq!(response.answer, messages::QUOTA_ERROR);
        assert_eq!(
            response.outcome,
            AnswerOutcome::ModelFailure(ModelErrorKind::Quota)
        );
    }

    #[test]
    fn every_path_returns_non_empty_text() {
        let replies = [
            Ok(Some("text".to_string())),
            Ok(None),
            Err(ModelError::from_message("boom")),
        ];
        for reply in replies {
            let concierge = service(StubStore::failing("down"), StubModel::replying(reply));
            assert!(!concierge.ask("").is_empty());
        }
        let unconfigured = ConciergeService::new(
            StubStore::failing("down"),
            StubModel::text("x"),
            ConciergeConfig::default(),
        );
        assert!(!unconfigured.ask("q").is_empty());
    }

    #[test]
    fn default_config_uses_client_default_model() {
        let config = ConciergeConfig::default();
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.context_char_budget, CONTEXT_CHAR_BUDGET);
        assert!(!config.has_credential());
    }

    #[test]
    fn repeated_questions_get_the_same_answer() {
        let store = StubStore::with_entries(vec![entry("a", "Basics", "ctx")]);
        let model = StubModel::text("stable answer");
        let concierge = service(store, model.clone());

        let first = concierge.ask("same question");
        let second = concierge.ask("same question");

        assert_eq!(first, second);
        let prompts = model.prompts.lock();
        assert_eq!(prompts.len(), 2);
        assert_eq!(prompts[0], prompts[1]);
    }

    #[test]
    fn keyword_selector_prefers_overlapping_entry() {
        let entries = vec![
            entry("a", "Payments", "Card networks and settlement."),
            entry("b", "Lending", "Credit scoring models estimate default risk."),
        ];
        let selector = KeywordOverlapSelector;

        let picked = selector.select("How does credit scoring work?", &entries);
        assert_eq!(picked.map(|e| e.id.as_str()), Some("b"));

        let unrelated = selector.select("zzz qqq", &entries);
        assert_eq!(unrelated.map(|e| e.id.as_str()), Some("a"));

        assert!(selector.select("anything", &[]).is_none());
    }

    #[test]
    fn custom_selector_is_used_by_pipeline() {
        let store = StubStore::with_entries(vec![
            entry("a", "Payments", "PAYMENTS-TEXT"),
            entry("b", "Lending", "Credit scoring LENDING-TEXT"),
        ]);
        let model = StubModel::text("ok");
        let concierge = ConciergeService::with_selector(
            store,
            model.clone(),
            Arc::new(KeywordOverlapSelector),
            configured(),
        );

        concierge.ask("credit scoring");

        assert!(model.last_prompt().contains("LENDING-TEXT"));
    }
}
