//! Conditional entity upserts with content-hash change detection.
//!
//! One page of source rows is applied in a single transaction. Per row the
//! store resolves the external id, hashes the canonical row content, and
//! issues an upsert whose UPDATE arm only fires when the stored hash differs
//! (`IS DISTINCT FROM`). The `RETURNING` clause is the change signal: a row
//! back means inserted-or-updated, nothing back means unchanged. Child rows
//! whose RFQ was never ingested are skipped, never errors.

use std::collections::HashSet;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::PgPool;
use sqlx::{Postgres, Row, Transaction};
use tracing::{debug, warn};
use uuid::Uuid;

use rfqai_core::{
    as_text, as_timestamp, canonical_json, row_hash, row_id, ColumnMap, EntityStore, Error,
    PageStats, Result, SourceRow, TableContract, TableKey,
};

/// PostgreSQL-backed [`EntityStore`].
#[derive(Clone)]
pub struct PgEntityStore {
    pool: PgPool,
}

impl PgEntityStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Parent-existence filter for child pages: the subset of `rfq_ids`
    /// already present in the root table.
    async fn existing_rfqs(
        tx: &mut Transaction<'_, Postgres>,
        rfq_ids: &[String],
    ) -> Result<HashSet<String>> {
        if rfq_ids.is_empty() {
            return Ok(HashSet::new());
        }
        let rows = sqlx::query("SELECT rfq_id FROM rfqs WHERE rfq_id = ANY($1)")
            .bind(rfq_ids)
            .fetch_all(&mut **tx)
            .await?;
        Ok(rows.iter().map(|r| r.get::<String, _>("rfq_id")).collect())
    }

    async fn record_changed_rfqs(
        tx: &mut Transaction<'_, Postgres>,
        run_id: Uuid,
        rfq_ids: &[String],
    ) -> Result<()> {
        if rfq_ids.is_empty() {
            return Ok(());
        }
        sqlx::query(
            "INSERT INTO ingest_run_changed_rfqs (run_id, rfq_id)
             SELECT $1, unnest($2::text[])
             ON CONFLICT DO NOTHING",
        )
        .bind(run_id)
        .bind(rfq_ids)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl EntityStore for PgEntityStore {
    async fn apply_page(
        &self,
        table_key: TableKey,
        rows: &[SourceRow],
        contract: &TableContract,
        run_id: Uuid,
    ) -> Result<PageStats> {
        let mut tx = self.pool.begin().await?;
        let mut stats = PageStats::default();
        let map = &contract.columns;

        // Child tables check parent existence once per page, not per row.
        let parents = if table_key == TableKey::AllRfq {
            None
        } else {
            let ids: Vec<String> = rows
                .iter()
                .filter_map(|row| as_text(map.get(row, "rfq_id")))
                .collect();
            Some(Self::existing_rfqs(&mut tx, &ids).await?)
        };

        for row in rows {
            stats.seen += 1;

            let Some(id) = row_id(row) else {
                stats.skipped += 1;
                debug!(
                    subsystem = "database",
                    component = "entities",
                    op = "apply_page",
                    table_key = %table_key,
                    "Row without a stable id skipped"
                );
                continue;
            };
            let id = id.to_string();

            // For child rows, resolve and validate the parent before writing.
            let parent_rfq = if table_key == TableKey::AllRfq {
                id.clone()
            } else {
                let Some(rfq_id) = as_text(map.get(row, "rfq_id")) else {
                    stats.skipped += 1;
                    continue;
                };
                if !parents.as_ref().map(|p| p.contains(&rfq_id)).unwrap_or(false) {
                    stats.skipped += 1;
                    warn!(
                        subsystem = "database",
                        component = "entities",
                        op = "apply_page",
                        table_key = %table_key,
                        rfq_id = %rfq_id,
                        "Child row references an RFQ that was never ingested, skipping"
                    );
                    continue;
                }
                rfq_id
            };

            let hash = row_hash(row);
            let changed = match table_key {
                TableKey::AllRfq => upsert_rfq(&mut tx, &id, &hash, row, map, run_id).await?,
                TableKey::AllProducts => {
                    upsert_product(&mut tx, &id, &parent_rfq, &hash, row, map, run_id).await?
                }
                TableKey::Queries => {
                    upsert_query(&mut tx, &id, &parent_rfq, &hash, row, map, run_id).await?
                }
                TableKey::SupplierShares => {
                    upsert_share(&mut tx, &id, &parent_rfq, &hash, row, map, run_id).await?
                }
            };

            if changed {
                stats.changed += 1;
                stats.changed_rfq_ids.insert(parent_rfq);
            } else {
                stats.unchanged += 1;
            }
        }

        let changed_ids: Vec<String> = stats.changed_rfq_ids.iter().cloned().collect();
        Self::record_changed_rfqs(&mut tx, run_id, &changed_ids).await?;

        tx.commit().await?;
        Ok(stats)
    }
}

fn raw_source(row: &SourceRow) -> Result<Value> {
    // Canonical form keeps the stored raw row byte-stable across key orders.
    serde_json::from_str(&canonical_json(&Value::Object(row.clone())))
        .map_err(|e| Error::Serialization(e.to_string()))
}

async fn upsert_rfq(
    tx: &mut Transaction<'_, Postgres>,
    id: &str,
    hash: &str,
    row: &SourceRow,
    map: &ColumnMap,
    run_id: Uuid,
) -> Result<bool> {
    let result = sqlx::query(
        "INSERT INTO rfqs (rfq_id, row_hash, title, status, buyer, deadline, raw_source,
                           last_changed_run_id)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
         ON CONFLICT (rfq_id) DO UPDATE SET
             row_hash = EXCLUDED.row_hash,
             title = EXCLUDED.title,
             status = EXCLUDED.status,
             buyer = EXCLUDED.buyer,
             deadline = EXCLUDED.deadline,
             raw_source = EXCLUDED.raw_source,
             last_changed_run_id = EXCLUDED.last_changed_run_id,
             ingested_at = now()
         WHERE rfqs.row_hash IS DISTINCT FROM EXCLUDED.row_hash
         RETURNING rfq_id",
    )
    .bind(id)
    .bind(hash)
    .bind(as_text(map.get(row, "title")))
    .bind(as_text(map.get(row, "status")))
    .bind(as_text(map.get(row, "buyer")))
    .bind(as_timestamp(map.get(row, "deadline")))
    .bind(raw_source(row)?)
    .bind(run_id)
    .fetch_optional(&mut **tx)
    .await?;
    Ok(result.is_some())
}

async fn upsert_product(
    tx: &mut Transaction<'_, Postgres>,
    id: &str,
    rfq_id: &str,
    hash: &str,
    row: &SourceRow,
    map: &ColumnMap,
    run_id: Uuid,
) -> Result<bool> {
    let result = sqlx::query(
        "INSERT INTO products (product_id, rfq_id, row_hash, name, quantity, target_price,
                               raw_source, last_changed_run_id)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
         ON CONFLICT (product_id) DO UPDATE SET
             rfq_id = EXCLUDED.rfq_id,
             row_hash = EXCLUDED.row_hash,
             name = EXCLUDED.name,
             quantity = EXCLUDED.quantity,
             target_price = EXCLUDED.target_price,
             raw_source = EXCLUDED.raw_source,
             last_changed_run_id = EXCLUDED.last_changed_run_id,
             ingested_at = now()
         WHERE products.row_hash IS DISTINCT FROM EXCLUDED.row_hash
         RETURNING product_id",
    )
    .bind(id)
    .bind(rfq_id)
    .bind(hash)
    .bind(as_text(map.get(row, "name")))
    .bind(rfqai_core::as_f64(map.get(row, "quantity")))
    .bind(rfqai_core::as_f64(map.get(row, "target_price")))
    .bind(raw_source(row)?)
    .bind(run_id)
    .fetch_optional(&mut **tx)
    .await?;
    Ok(result.is_some())
}

async fn upsert_query(
    tx: &mut Transaction<'_, Postgres>,
    id: &str,
    rfq_id: &str,
    hash: &str,
    row: &SourceRow,
    map: &ColumnMap,
    run_id: Uuid,
) -> Result<bool> {
    let result = sqlx::query(
        "INSERT INTO queries (query_id, rfq_id, row_hash, author, comment, created_ts,
                              raw_source, last_changed_run_id)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
         ON CONFLICT (query_id) DO UPDATE SET
             rfq_id = EXCLUDED.rfq_id,
             row_hash = EXCLUDED.row_hash,
             author = EXCLUDED.author,
             comment = EXCLUDED.comment,
             created_ts = EXCLUDED.created_ts,
             raw_source = EXCLUDED.raw_source,
             last_changed_run_id = EXCLUDED.last_changed_run_id,
             ingested_at = now()
         WHERE queries.row_hash IS DISTINCT FROM EXCLUDED.row_hash
         RETURNING query_id",
    )
    .bind(id)
    .bind(rfq_id)
    .bind(hash)
    .bind(as_text(map.get(row, "author")))
    .bind(as_text(map.get(row, "comment")))
    .bind(as_timestamp(map.get(row, "created_ts")))
    .bind(raw_source(row)?)
    .bind(run_id)
    .fetch_optional(&mut **tx)
    .await?;
    Ok(result.is_some())
}

async fn upsert_share(
    tx: &mut Transaction<'_, Postgres>,
    id: &str,
    rfq_id: &str,
    hash: &str,
    row: &SourceRow,
    map: &ColumnMap,
    run_id: Uuid,
) -> Result<bool> {
    let result = sqlx::query(
        "INSERT INTO supplier_shares (share_id, rfq_id, row_hash, supplier, shared_ts,
                                      raw_source, last_changed_run_id)
         VALUES ($1, $2, $3, $4, $5, $6, $7)
         ON CONFLICT (share_id) DO UPDATE SET
             rfq_id = EXCLUDED.rfq_id,
             row_hash = EXCLUDED.row_hash,
             supplier = EXCLUDED.supplier,
             shared_ts = EXCLUDED.shared_ts,
             raw_source = EXCLUDED.raw_source,
             last_changed_run_id = EXCLUDED.last_changed_run_id,
             ingested_at = now()
         WHERE supplier_shares.row_hash IS DISTINCT FROM EXCLUDED.row_hash
         RETURNING share_id",
    )
    .bind(id)
    .bind(rfq_id)
    .bind(hash)
    .bind(as_text(map.get(row, "supplier")))
    .bind(as_timestamp(map.get(row, "shared_ts")))
    .bind(raw_source(row)?)
    .bind(run_id)
    .fetch_optional(&mut **tx)
    .await?;
    Ok(result.is_some())
}
