//! Bundle loading for reprocessing.
//!
//! Reprocessing never re-calls the source API: it works from the raw rows
//! preserved in the relational store. A bundle is one RFQ's raw row plus all
//! of its child rows, each ordered by id for deterministic document order.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::PgPool;
use sqlx::Row;

use rfqai_core::{BundleLoader, Result, RfqBundle, SourceRow};

/// PostgreSQL-backed [`BundleLoader`].
#[derive(Clone)]
pub struct PgBundleLoader {
    pool: PgPool,
}

impl PgBundleLoader {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn child_rows(&self, sql: &str, rfq_id: &str) -> Result<Vec<SourceRow>> {
        let rows = sqlx::query(sql).bind(rfq_id).fetch_all(&self.pool).await?;
        Ok(rows
            .iter()
            .filter_map(|r| r.get::<Value, _>("raw_source").as_object().cloned())
            .collect())
    }
}

#[async_trait]
impl BundleLoader for PgBundleLoader {
    async fn load_bundle(&self, rfq_id: &str) -> Result<Option<RfqBundle>> {
        let root = sqlx::query("SELECT raw_source FROM rfqs WHERE rfq_id = $1")
            .bind(rfq_id)
            .fetch_optional(&self.pool)
            .await?;
        let Some(root) = root else {
            return Ok(None);
        };
        let rfq_row = root
            .get::<Value, _>("raw_source")
            .as_object()
            .cloned()
            .unwrap_or_default();

        Ok(Some(RfqBundle {
            rfq_id: rfq_id.to_string(),
            rfq_row,
            product_rows: self
                .child_rows(
                    "SELECT raw_source FROM products WHERE rfq_id = $1 ORDER BY product_id",
                    rfq_id,
                )
                .await?,
            query_rows: self
                .child_rows(
                    "SELECT raw_source FROM queries WHERE rfq_id = $1 ORDER BY query_id",
                    rfq_id,
                )
                .await?,
            share_rows: self
                .child_rows(
                    "SELECT raw_source FROM supplier_shares WHERE rfq_id = $1 ORDER BY share_id",
                    rfq_id,
                )
                .await?,
        }))
    }

    async fn list_rfq_ids(&self, limit: i64) -> Result<Vec<String>> {
        // LIMIT NULL is "no limit" in Postgres; limit <= 0 means uncapped.
        let cap = (limit > 0).then_some(limit);
        let rows = sqlx::query("SELECT rfq_id FROM rfqs ORDER BY rfq_id LIMIT $1")
            .bind(cap)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(|r| r.get::<String, _>("rfq_id")).collect())
    }
}
