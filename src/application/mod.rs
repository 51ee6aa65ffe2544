//! Application layer wiring DTOs and services for FinSight.

pub mod dtos;
pub mod services;

pub use dtos::{
    AgentRequest, AnswerOutcome, ArticleDraft, AskRequest, AskResponse, DraftArticleRequest,
    ExtractToolRequest, HealthStatusResponse, InsightRequest, SuggestInsightsRequest,
    ToolRequest, UpsertContextRequest,
};
pub use services::{CatalogService, ConciergeService, ContentService};
