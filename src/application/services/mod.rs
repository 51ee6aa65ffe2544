//! Service layer orchestrating domain operations and infrastructure adapters.

mod catalog_service;
mod concierge_service;
mod content_service;
pub mod prompt;

pub use catalog_service::{CatalogRepository, CatalogService};
pub use concierge_service::{
    failure_message, messages, ConciergeConfig, ConciergeService, ContextAdmin, ContextSelector,
    ContextStore, FirstEntrySelector, KeywordOverlapSelector, ModelClient,
};
pub use content_service::ContentService;
