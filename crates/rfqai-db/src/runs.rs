//! Run ledger: run lifecycle, per-table progress, pagination checkpoints,
//! and the changed-RFQ set of a run.

use async_trait::async_trait;
use sqlx::postgres::PgPool;
use sqlx::Row;
use tracing::{info, warn};
use uuid::Uuid;

use rfqai_core::defaults::ERROR_TEXT_MAX;
use rfqai_core::{IngestMode, Result, RunLedger, RunStatus, TableKey, TableProgress, TokenKind};

/// PostgreSQL-backed [`RunLedger`].
#[derive(Clone)]
pub struct PgRunLedger {
    pool: PgPool,
}

impl PgRunLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Bound the error text persisted on run and table rows; a full stack of
/// upstream context can run to kilobytes.
fn truncate_error(error: Option<&str>) -> Option<String> {
    error.map(|e| e.chars().take(ERROR_TEXT_MAX).collect())
}

#[async_trait]
impl RunLedger for PgRunLedger {
    async fn start_run(&self, mode: IngestMode) -> Result<Uuid> {
        let row = sqlx::query(
            "INSERT INTO ingest_runs (mode, status) VALUES ($1, $2) RETURNING run_id",
        )
        .bind(mode.as_str())
        .bind(RunStatus::Running.as_str())
        .fetch_one(&self.pool)
        .await?;
        let run_id: Uuid = row.get("run_id");

        info!(
            subsystem = "database",
            component = "runs",
            op = "start_run",
            run_id = %run_id,
            mode = %mode,
            "Ingest run started"
        );
        Ok(run_id)
    }

    async fn record_table_progress(
        &self,
        run_id: Uuid,
        progress: &TableProgress,
        status: RunStatus,
        last_token: Option<&str>,
        token_kind: Option<TokenKind>,
        error: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO ingest_run_tables
                 (run_id, table_key, table_name, status, pages,
                  rows_seen, rows_changed, rows_unchanged, rows_skipped,
                  last_token, token_kind, error)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
             ON CONFLICT (run_id, table_key) DO UPDATE SET
                 status = EXCLUDED.status,
                 pages = EXCLUDED.pages,
                 rows_seen = EXCLUDED.rows_seen,
                 rows_changed = EXCLUDED.rows_changed,
                 rows_unchanged = EXCLUDED.rows_unchanged,
                 rows_skipped = EXCLUDED.rows_skipped,
                 last_token = EXCLUDED.last_token,
                 token_kind = EXCLUDED.token_kind,
                 error = EXCLUDED.error,
                 updated_at = now()",
        )
        .bind(run_id)
        .bind(progress.table_key.as_str())
        .bind(&progress.table_name)
        .bind(status.as_str())
        .bind(progress.pages as i64)
        .bind(progress.rows_seen as i64)
        .bind(progress.rows_changed as i64)
        .bind(progress.rows_unchanged as i64)
        .bind(progress.rows_skipped as i64)
        .bind(last_token)
        .bind(token_kind.map(|k| k.as_str()))
        .bind(truncate_error(error))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn upsert_checkpoint(
        &self,
        table_key: TableKey,
        table_name: &str,
        run_id: Uuid,
        next_token: Option<&str>,
        token_kind: Option<TokenKind>,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO source_cursors (table_key, table_name, run_id, next_token, token_kind)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (table_key) DO UPDATE SET
                 table_name = EXCLUDED.table_name,
                 run_id = EXCLUDED.run_id,
                 next_token = EXCLUDED.next_token,
                 token_kind = EXCLUDED.token_kind,
                 updated_at = now()",
        )
        .bind(table_key.as_str())
        .bind(table_name)
        .bind(run_id)
        .bind(next_token)
        .bind(token_kind.map(|k| k.as_str()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn finish_run(
        &self,
        run_id: Uuid,
        status: RunStatus,
        summary: &serde_json::Value,
        error: Option<&str>,
    ) -> Result<()> {
        // The status guard makes the transition one-shot: a second finish on
        // the same run is a no-op rather than a rewrite of history.
        let result = sqlx::query(
            "UPDATE ingest_runs
             SET status = $2, summary = $3, error = $4, finished_at = now()
             WHERE run_id = $1 AND status = $5",
        )
        .bind(run_id)
        .bind(status.as_str())
        .bind(summary)
        .bind(truncate_error(error))
        .bind(RunStatus::Running.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            warn!(
                subsystem = "database",
                component = "runs",
                op = "finish_run",
                run_id = %run_id,
                "Run already finalized, finish ignored"
            );
        } else {
            info!(
                subsystem = "database",
                component = "runs",
                op = "finish_run",
                run_id = %run_id,
                status = %status,
                "Ingest run finished"
            );
        }
        Ok(())
    }

    async fn count_changed_rfqs(&self, run_id: Uuid) -> Result<i64> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS count FROM ingest_run_changed_rfqs WHERE run_id = $1",
        )
        .bind(run_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.get::<i64, _>("count"))
    }

    async fn next_changed_batch(
        &self,
        run_id: Uuid,
        after: Option<&str>,
        limit: i64,
    ) -> Result<Vec<String>> {
        let rows = sqlx::query(
            "SELECT rfq_id FROM ingest_run_changed_rfqs
             WHERE run_id = $1 AND ($2::text IS NULL OR rfq_id > $2)
             ORDER BY rfq_id
             LIMIT $3",
        )
        .bind(run_id)
        .bind(after)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(|r| r.get::<String, _>("rfq_id")).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_text_is_bounded() {
        let long = "x".repeat(ERROR_TEXT_MAX + 500);
        let truncated = truncate_error(Some(&long)).unwrap();
        assert_eq!(truncated.chars().count(), ERROR_TEXT_MAX);

        assert_eq!(truncate_error(Some("short")).as_deref(), Some("short"));
        assert_eq!(truncate_error(None), None);
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let long = "é".repeat(ERROR_TEXT_MAX + 10);
        let truncated = truncate_error(Some(&long)).unwrap();
        assert_eq!(truncated.chars().count(), ERROR_TEXT_MAX);
    }
}
