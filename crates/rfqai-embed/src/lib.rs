//! # rfqai-embed
//!
//! Embedding backends for the RFQAI ingestion engine: the Gemini batch
//! endpoint for production and a deterministic mock for tests and offline
//! runs. Both implement the `EmbeddingBackend` trait from `rfqai-core`.

pub mod gemini;
pub mod mock;

pub use gemini::GeminiEmbedder;
pub use mock::MockEmbedder;
