//! Storage adapters for FinSight.
//!
//! The embedded sled store holds the knowledge base and the tool/insight/agent
//! catalog for local deployments.

pub mod sled_store;

pub use sled_store::{SledCatalog, SledStore};
