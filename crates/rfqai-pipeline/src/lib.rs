//! # rfqai-pipeline
//!
//! Orchestration for the RFQAI ingestion engine: the ingest run (paginate,
//! change-detect, upsert, checkpoint), document assembly from stored raw
//! rows, chunking, and selective reprocessing into the vector store.

pub mod chunker;
pub mod docs;
pub mod ingest;
pub mod reprocess;
pub mod sources;

pub use chunker::{chunk_doc, split_text, ChunkParams};
pub use docs::build_docs;
pub use ingest::{IngestOrchestrator, IngestReport};
pub use reprocess::{ReprocessOrchestrator, ReprocessReport, ReprocessScope};
pub use sources::file_targets;
