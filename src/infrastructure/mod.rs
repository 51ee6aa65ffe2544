//! Infrastructure layer wiring concrete adapters (storage, hosted services).

pub mod http_client;
pub mod storage;

pub use http_client::{FirestoreContextStore, GeminiClient};
pub use storage::{SledCatalog, SledStore};
