//! Vector store reconciliation and similarity search.
//!
//! Reconciliation converges the stored chunks in exactly the scopes the new
//! batch covers: brief chunks scope the whole RFQ, child-derived chunks the
//! child ids present in the batch. A child absent from the batch keeps its
//! old chunks. Within a scope, only rows whose content digest is absent
//! from the fresh batch are deleted; inserts rely on the
//! (rfq_id, doc_kind, content_sha) uniqueness to absorb duplicates. An
//! identical batch therefore deletes zero rows and inserts zero rows.

use std::collections::BTreeSet;

use async_trait::async_trait;
use pgvector::Vector;
use sqlx::postgres::PgPool;
use sqlx::{Postgres, Row, Transaction};
use tracing::debug;

use rfqai_core::{Chunk, DocKind, Error, ReconcileOutcome, Result, VectorStore};

/// One similarity-search hit.
#[derive(Debug, Clone)]
pub struct ChunkHit {
    pub rfq_id: String,
    pub doc_kind: String,
    pub chunk_idx: i32,
    pub content_text: String,
    pub distance: f64,
}

/// Delete scopes derived from one batch of fresh chunks.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct DeleteScopes {
    /// Whole-RFQ scope: the batch contains brief chunks, so every stored
    /// brief chunk for the RFQ is stale.
    pub brief: bool,
    pub product_ids: BTreeSet<String>,
    pub query_ids: BTreeSet<String>,
    pub file_ids: BTreeSet<String>,
}

/// Compute which stored chunks the batch supersedes.
pub(crate) fn delete_scopes(chunks: &[Chunk]) -> DeleteScopes {
    let mut scopes = DeleteScopes::default();
    for chunk in chunks {
        match chunk.doc_kind {
            DocKind::RfqBrief => scopes.brief = true,
            DocKind::ProductCard => {
                if let Some(id) = &chunk.product_id {
                    scopes.product_ids.insert(id.clone());
                }
            }
            DocKind::ThreadMessage => {
                if let Some(id) = &chunk.query_id {
                    scopes.query_ids.insert(id.clone());
                }
            }
            DocKind::FileChunk => {
                if let Some(id) = &chunk.file_id {
                    scopes.file_ids.insert(id.clone());
                }
            }
        }
    }
    scopes
}

/// Content digests the batch carries for one doc kind. Stored rows matching
/// one of these are current and survive the scope delete.
fn batch_shas(chunks: &[Chunk], kind: DocKind) -> Vec<String> {
    chunks
        .iter()
        .filter(|c| c.doc_kind == kind)
        .map(|c| c.content_sha.clone())
        .collect()
}

/// PostgreSQL-backed [`VectorStore`] over the `rfq_chunks` table.
#[derive(Clone)]
pub struct PgVectorStore {
    pool: PgPool,
}

impl PgVectorStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn delete_stale(
        tx: &mut Transaction<'_, Postgres>,
        rfq_id: &str,
        scopes: &DeleteScopes,
        chunks: &[Chunk],
    ) -> Result<u64> {
        let mut deleted = 0u64;

        if scopes.brief {
            let keep = batch_shas(chunks, DocKind::RfqBrief);
            deleted += sqlx::query(
                "DELETE FROM rfq_chunks
                 WHERE rfq_id = $1 AND doc_kind = $2 AND content_sha <> ALL($3)",
            )
            .bind(rfq_id)
            .bind(DocKind::RfqBrief.as_str())
            .bind(&keep)
            .execute(&mut **tx)
            .await?
            .rows_affected();
        }
        for (kind, column, ids) in [
            (DocKind::ProductCard, "product_id", &scopes.product_ids),
            (DocKind::ThreadMessage, "query_id", &scopes.query_ids),
            (DocKind::FileChunk, "file_id", &scopes.file_ids),
        ] {
            if ids.is_empty() {
                continue;
            }
            let ids: Vec<String> = ids.iter().cloned().collect();
            let keep = batch_shas(chunks, kind);
            let sql = format!(
                "DELETE FROM rfq_chunks
                 WHERE rfq_id = $1 AND doc_kind = $2 AND {column} = ANY($3)
                   AND content_sha <> ALL($4)"
            );
            deleted += sqlx::query(&sql)
                .bind(rfq_id)
                .bind(kind.as_str())
                .bind(&ids)
                .bind(&keep)
                .execute(&mut **tx)
                .await?
                .rows_affected();
        }
        Ok(deleted)
    }

    /// Cosine similarity search over one RFQ's stored chunks, optionally
    /// restricted to a subset of document kinds.
    pub async fn search(
        &self,
        rfq_id: &str,
        query_vec: Vec<f32>,
        limit: i64,
        doc_kinds: Option<&[DocKind]>,
    ) -> Result<Vec<ChunkHit>> {
        let kinds: Option<Vec<String>> =
            doc_kinds.map(|ks| ks.iter().map(|k| k.as_str().to_string()).collect());
        let rows = sqlx::query(
            "SELECT rfq_id, doc_kind, chunk_idx, content_text,
                    (embedding <=> $1) AS distance
             FROM rfq_chunks
             WHERE embedding IS NOT NULL
               AND rfq_id = $2
               AND ($3::text[] IS NULL OR doc_kind = ANY($3))
             ORDER BY embedding <=> $1
             LIMIT $4",
        )
        .bind(Vector::from(query_vec))
        .bind(rfq_id)
        .bind(kinds)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|r| ChunkHit {
                rfq_id: r.get("rfq_id"),
                doc_kind: r.get("doc_kind"),
                chunk_idx: r.get("chunk_idx"),
                content_text: r.get("content_text"),
                distance: r.get("distance"),
            })
            .collect())
    }
}

#[async_trait]
impl VectorStore for PgVectorStore {
    async fn reconcile_rfq(&self, rfq_id: &str, chunks: &[Chunk]) -> Result<ReconcileOutcome> {
        for chunk in chunks {
            if chunk.rfq_id != rfq_id {
                return Err(Error::InvalidInput(format!(
                    "chunk for RFQ {} in a reconcile batch for RFQ {}",
                    chunk.rfq_id, rfq_id
                )));
            }
        }

        let mut tx = self.pool.begin().await?;
        let scopes = delete_scopes(chunks);
        let deleted = Self::delete_stale(&mut tx, rfq_id, &scopes, chunks).await?;

        let mut inserted = 0u64;
        for chunk in chunks {
            let result = sqlx::query(
                "INSERT INTO rfq_chunks
                     (rfq_id, doc_kind, chunk_idx, content_text, content_sha,
                      embedding, product_id, query_id, file_id, page_num, meta)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                 ON CONFLICT (rfq_id, doc_kind, content_sha) DO NOTHING",
            )
            .bind(&chunk.rfq_id)
            .bind(chunk.doc_kind.as_str())
            .bind(chunk.chunk_idx)
            .bind(&chunk.content_text)
            .bind(&chunk.content_sha)
            .bind(chunk.embedding.clone().map(Vector::from))
            .bind(&chunk.product_id)
            .bind(&chunk.query_id)
            .bind(&chunk.file_id)
            .bind(chunk.page_num)
            .bind(serde_json::Value::Object(chunk.meta.clone()))
            .execute(&mut *tx)
            .await?;
            inserted += result.rows_affected();
        }

        tx.commit().await?;

        debug!(
            subsystem = "database",
            component = "vectors",
            op = "reconcile_rfq",
            rfq_id = %rfq_id,
            chunk_count = chunks.len(),
            deleted,
            inserted,
            "Reconciled RFQ chunks"
        );
        Ok(ReconcileOutcome { deleted, inserted })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn chunk(doc_kind: DocKind, product_id: Option<&str>, query_id: Option<&str>, file_id: Option<&str>) -> Chunk {
        Chunk {
            rfq_id: "rfq-1".into(),
            doc_kind,
            chunk_idx: 0,
            content_text: "text".into(),
            content_sha: "sha".into(),
            embedding: None,
            product_id: product_id.map(String::from),
            query_id: query_id.map(String::from),
            file_id: file_id.map(String::from),
            page_num: None,
            meta: Map::new(),
        }
    }

    #[test]
    fn brief_chunk_scopes_whole_rfq_kind() {
        let scopes = delete_scopes(&[chunk(DocKind::RfqBrief, None, None, None)]);
        assert!(scopes.brief);
        assert!(scopes.product_ids.is_empty());
    }

    #[test]
    fn child_chunks_scope_only_present_ids() {
        let scopes = delete_scopes(&[
            chunk(DocKind::ProductCard, Some("p1"), None, None),
            chunk(DocKind::ProductCard, Some("p1"), None, None),
            chunk(DocKind::ThreadMessage, None, Some("q1"), None),
            chunk(DocKind::FileChunk, None, None, Some("f1")),
        ]);
        assert!(!scopes.brief);
        assert_eq!(scopes.product_ids.len(), 1);
        assert!(scopes.product_ids.contains("p1"));
        assert!(scopes.query_ids.contains("q1"));
        assert!(scopes.file_ids.contains("f1"));
    }

    #[test]
    fn child_chunk_without_id_scopes_nothing() {
        let scopes = delete_scopes(&[chunk(DocKind::ProductCard, None, None, None)]);
        assert_eq!(scopes, DeleteScopes::default());
    }

    #[test]
    fn empty_batch_deletes_nothing() {
        assert_eq!(delete_scopes(&[]), DeleteScopes::default());
    }

    #[test]
    fn batch_digests_are_collected_per_kind() {
        let mut brief = chunk(DocKind::RfqBrief, None, None, None);
        brief.content_sha = "sha-brief".into();
        let mut card = chunk(DocKind::ProductCard, Some("p1"), None, None);
        card.content_sha = "sha-card".into();
        let batch = [brief, card];

        assert_eq!(batch_shas(&batch, DocKind::RfqBrief), vec!["sha-brief"]);
        assert_eq!(batch_shas(&batch, DocKind::ProductCard), vec!["sha-card"]);
        assert!(batch_shas(&batch, DocKind::FileChunk).is_empty());
    }
}
