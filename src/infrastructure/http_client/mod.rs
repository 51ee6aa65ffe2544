//! HTTP adapters for the managed services FinSight depends on.
//!
//! Both clients are blocking `ureq` agents; async callers run them on a blocking
//! thread.

pub mod firestore_store;
pub mod gemini_client;

pub use firestore_store::FirestoreContextStore;
pub use gemini_client::GeminiClient;

use serde::Deserialize;

/// Error envelope returned by Google REST APIs.
#[derive(Debug, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub code: u16,
    pub message: String,
    #[serde(default)]
    pub status: String,
}
