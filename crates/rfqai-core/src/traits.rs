//! Core trait seams for the ingestion engine.
//!
//! These traits define the interfaces that concrete implementations must
//! satisfy, enabling pluggable backends and testability: the PostgreSQL
//! implementations live in `rfqai-db`, embedding backends in `rfqai-embed`,
//! and the orchestrators in `rfqai-pipeline` depend only on the traits.

use async_trait::async_trait;
use uuid::Uuid;

use crate::columns::TableContract;
use crate::error::Result;
use crate::models::{
    Chunk, ExtractedText, FileTarget, IngestMode, PageStats, ReconcileOutcome, RfqBundle,
    RunStatus, SourceRow, TableKey, TableProgress, TokenKind,
};

/// Run ledger: sole source of truth for run lifecycle, per-table progress,
/// pagination checkpoints, and the changed-RFQ set of a run.
#[async_trait]
pub trait RunLedger: Send + Sync {
    /// Create a RUNNING run record and return its id.
    async fn start_run(&self, mode: IngestMode) -> Result<Uuid>;

    /// Persist progress for one (run, table). Idempotent per (run, table):
    /// repeated calls overwrite the same row.
    #[allow(clippy::too_many_arguments)]
    async fn record_table_progress(
        &self,
        run_id: Uuid,
        progress: &TableProgress,
        status: RunStatus,
        last_token: Option<&str>,
        token_kind: Option<TokenKind>,
        error: Option<&str>,
    ) -> Result<()>;

    /// Persist the latest continuation token for a table. Keyed by table,
    /// not by run; written after every page for operational visibility.
    async fn upsert_checkpoint(
        &self,
        table_key: TableKey,
        table_name: &str,
        run_id: Uuid,
        next_token: Option<&str>,
        token_kind: Option<TokenKind>,
    ) -> Result<()>;

    /// Finalize a run. Status transitions exactly once.
    async fn finish_run(
        &self,
        run_id: Uuid,
        status: RunStatus,
        summary: &serde_json::Value,
        error: Option<&str>,
    ) -> Result<()>;

    /// Distinct RFQs changed during a run (directly or via a child).
    async fn count_changed_rfqs(&self, run_id: Uuid) -> Result<i64>;

    /// Keyset-paginated slice of the run's changed RFQ ids, ordered by id,
    /// strictly after `after` when given. A short or empty result means the
    /// set is exhausted.
    async fn next_changed_batch(
        &self,
        run_id: Uuid,
        after: Option<&str>,
        limit: i64,
    ) -> Result<Vec<String>>;
}

/// Row change detector and entity upsert writer for one page of rows.
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Apply one page: per row, resolve the external id (absent ⇒ skipped),
    /// hash, and conditionally upsert — reporting "changed" only when the
    /// hash differs from what is stored. Child tables skip rows whose RFQ
    /// was never ingested. Runs in one transaction.
    async fn apply_page(
        &self,
        table_key: TableKey,
        rows: &[SourceRow],
        contract: &TableContract,
        run_id: Uuid,
    ) -> Result<PageStats>;
}

/// Derived-vector store with per-RFQ reconciliation.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Replace the stored vectors in the scopes covered by `chunks`:
    /// delete stale rows (whole-RFQ scope for briefs, per-child scope for
    /// child-derived kinds, keyed by the child ids present in the batch),
    /// then insert the new set, relying on the
    /// (rfq_id, doc_kind, content_sha) uniqueness to absorb duplicates.
    async fn reconcile_rfq(&self, rfq_id: &str, chunks: &[Chunk]) -> Result<ReconcileOutcome>;
}

/// Loader for DB-prefetched raw rows used by reprocessing.
#[async_trait]
pub trait BundleLoader: Send + Sync {
    /// All raw rows for one RFQ, children ordered by id. None when the RFQ
    /// was never ingested.
    async fn load_bundle(&self, rfq_id: &str) -> Result<Option<RfqBundle>>;

    /// All ingested RFQ ids ordered by id, capped at `limit` (0 = no cap).
    /// Backfill reprocessing input.
    async fn list_rfq_ids(&self, limit: i64) -> Result<Vec<String>>;
}

/// Embedding generation backend.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// Embed a batch of texts, one vector per input, in order.
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Dimension of produced vectors.
    fn dimension(&self) -> usize;
}

/// File text extraction collaborator. Format-specific parsing is outside
/// the engine; implementations plug in here.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract(&self, target: &FileTarget) -> Result<Vec<ExtractedText>>;
}

/// Extractor that yields nothing. Default when no extraction collaborator
/// is configured; file targets are then skipped with a warning.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopExtractor;

#[async_trait]
impl TextExtractor for NoopExtractor {
    async fn extract(&self, _target: &FileTarget) -> Result<Vec<ExtractedText>> {
        Ok(Vec::new())
    }
}
