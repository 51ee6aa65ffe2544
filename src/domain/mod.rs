//! Domain layer: core business entities and value objects for FinSight.

pub mod errors;
pub mod models;

pub use errors::{DomainError, ModelError, ModelErrorKind};
pub use models::{
    Agent, CatalogRecord, ContextEntry, Insight, InsightSummary, Tool, ToolDetails,
};
