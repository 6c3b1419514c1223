//! Selective reprocessing of RFQs into the vector store.
//!
//! Works entirely from the relational store: bundles are loaded from the
//! preserved raw rows, rendered into documents, chunked, embedded in
//! batches, and reconciled per RFQ. A cron run scopes to the run's
//! changed-RFQ set via keyset pagination; a backfill walks every ingested
//! RFQ. One RFQ failing never stops the others.

use std::time::Instant;

use tracing::{error, info, warn};
use uuid::Uuid;

use rfqai_core::defaults::{CHANGED_BATCH_SIZE, EMBED_BATCH_SIZE};
use rfqai_core::{
    BundleLoader, Chunk, EmbeddingBackend, Result, RunLedger, TableContracts, TextExtractor,
    VectorStore,
};

use crate::chunker::{chunk_doc, ChunkParams};
use crate::docs::{build_docs, file_doc};
use crate::sources::file_targets;

/// Which RFQs to reprocess.
#[derive(Debug, Clone, Copy)]
pub enum ReprocessScope {
    /// The changed-RFQ set of one run, walked with keyset pagination.
    ChangedInRun(Uuid),
    /// Every ingested RFQ; `limit <= 0` means all of them.
    AllRfqs { limit: i64 },
}

/// Outcome of one reprocessing pass.
#[derive(Debug, Default)]
pub struct ReprocessReport {
    pub ok: u64,
    pub failed: u64,
    pub chunks_deleted: u64,
    pub chunks_inserted: u64,
    /// (rfq_id, error) per failed RFQ.
    pub failures: Vec<(String, String)>,
}

impl ReprocessReport {
    pub fn succeeded(&self) -> bool {
        self.failed == 0
    }
}

/// Drives reprocessing over injected collaborators.
pub struct ReprocessOrchestrator<'a, L, B, V, M, X>
where
    L: RunLedger,
    B: BundleLoader,
    V: VectorStore,
    M: EmbeddingBackend,
    X: TextExtractor,
{
    ledger: &'a L,
    bundles: &'a B,
    vectors: &'a V,
    embedder: &'a M,
    extractor: &'a X,
    contracts: &'a TableContracts,
    chunk_params: ChunkParams,
    changed_batch_size: i64,
}

impl<'a, L, B, V, M, X> ReprocessOrchestrator<'a, L, B, V, M, X>
where
    L: RunLedger,
    B: BundleLoader,
    V: VectorStore,
    M: EmbeddingBackend,
    X: TextExtractor,
{
    pub fn new(
        ledger: &'a L,
        bundles: &'a B,
        vectors: &'a V,
        embedder: &'a M,
        extractor: &'a X,
        contracts: &'a TableContracts,
        chunk_params: ChunkParams,
    ) -> Self {
        Self {
            ledger,
            bundles,
            vectors,
            embedder,
            extractor,
            contracts,
            chunk_params,
            changed_batch_size: CHANGED_BATCH_SIZE,
        }
    }

    pub fn changed_batch_size(mut self, size: i64) -> Self {
        self.changed_batch_size = size.max(1);
        self
    }

    /// Reprocess every RFQ in scope, isolating per-RFQ failures.
    pub async fn run(&self, scope: ReprocessScope) -> Result<ReprocessReport> {
        let start = Instant::now();
        let mut report = ReprocessReport::default();

        match scope {
            ReprocessScope::ChangedInRun(run_id) => {
                let mut after: Option<String> = None;
                loop {
                    let batch = self
                        .ledger
                        .next_changed_batch(run_id, after.as_deref(), self.changed_batch_size)
                        .await?;
                    if batch.is_empty() {
                        break;
                    }
                    let exhausted = (batch.len() as i64) < self.changed_batch_size;
                    after = batch.last().cloned();
                    for rfq_id in &batch {
                        self.reprocess_one(rfq_id, &mut report).await;
                    }
                    if exhausted {
                        break;
                    }
                }
            }
            ReprocessScope::AllRfqs { limit } => {
                for rfq_id in self.bundles.list_rfq_ids(limit).await? {
                    self.reprocess_one(&rfq_id, &mut report).await;
                }
            }
        }

        info!(
            subsystem = "pipeline",
            component = "reprocess",
            op = "run_done",
            ok = report.ok,
            failed = report.failed,
            chunks_inserted = report.chunks_inserted,
            chunks_deleted = report.chunks_deleted,
            duration_ms = start.elapsed().as_millis() as u64,
            "Reprocessing pass finished"
        );
        Ok(report)
    }

    async fn reprocess_one(&self, rfq_id: &str, report: &mut ReprocessReport) {
        match self.rebuild_rfq(rfq_id).await {
            Ok(Some((deleted, inserted))) => {
                report.ok += 1;
                report.chunks_deleted += deleted;
                report.chunks_inserted += inserted;
            }
            Ok(None) => {
                warn!(
                    subsystem = "pipeline",
                    component = "reprocess",
                    op = "reprocess_one",
                    rfq_id = %rfq_id,
                    "RFQ not found in store, skipping"
                );
            }
            Err(e) => {
                let message = e.to_string();
                error!(
                    subsystem = "pipeline",
                    component = "reprocess",
                    op = "reprocess_one",
                    rfq_id = %rfq_id,
                    error = %message,
                    "RFQ reprocessing failed, continuing with the rest"
                );
                report.failed += 1;
                report.failures.push((rfq_id.to_string(), message));
            }
        }
    }

    /// Rebuild one RFQ's chunks end to end. None when the RFQ is unknown.
    async fn rebuild_rfq(&self, rfq_id: &str) -> Result<Option<(u64, u64)>> {
        let Some(bundle) = self.bundles.load_bundle(rfq_id).await? else {
            return Ok(None);
        };

        let mut docs = build_docs(&bundle, self.contracts);

        for target in file_targets(&bundle, self.contracts) {
            // A dead link costs this target its text, nothing more.
            let extracted = match self.extractor.extract(&target).await {
                Ok(extracted) => extracted,
                Err(e) => {
                    warn!(
                        subsystem = "pipeline",
                        component = "reprocess",
                        op = "extract",
                        rfq_id = %rfq_id,
                        url = %target.url,
                        error = %e,
                        "File extraction failed, continuing without it"
                    );
                    continue;
                }
            };
            for piece in extracted {
                if piece.text.trim().is_empty() {
                    continue;
                }
                docs.push(file_doc(
                    rfq_id,
                    target.product_id.as_deref(),
                    target.query_id.as_deref(),
                    &piece.file_id,
                    piece.page_num,
                    piece.text,
                ));
            }
        }

        let mut chunks: Vec<Chunk> = docs
            .iter()
            .flat_map(|doc| chunk_doc(doc, self.chunk_params))
            .collect();

        self.embed_chunks(&mut chunks).await?;

        let outcome = self.vectors.reconcile_rfq(rfq_id, &chunks).await?;
        Ok(Some((outcome.deleted, outcome.inserted)))
    }

    async fn embed_chunks(&self, chunks: &mut [Chunk]) -> Result<()> {
        for batch in chunks.chunks_mut(EMBED_BATCH_SIZE) {
            let texts: Vec<String> = batch.iter().map(|c| c.content_text.clone()).collect();
            let vectors = self.embedder.embed_texts(&texts).await?;
            for (chunk, vector) in batch.iter_mut().zip(vectors) {
                chunk.embedding = Some(vector);
            }
        }
        Ok(())
    }
}
