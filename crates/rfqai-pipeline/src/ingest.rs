//! Ingest orchestration.
//!
//! One run walks the four source tables in fixed order (RFQ roots first,
//! then children), paginating each to exhaustion. Every page is applied
//! through the entity store, then the pagination checkpoint and per-table
//! progress are persisted before the next page is fetched, so an operator
//! can watch a run advance and a crash leaves an accurate trail.
//!
//! Failure is fail-fast: the first table error finalizes the run as FAILED
//! with a partial summary and nothing further is fetched.

use std::time::Instant;

use tracing::{error, info};
use uuid::Uuid;

use rfqai_core::defaults::SOURCE_MAX_PAGES;
use rfqai_core::{
    run_summary, EntityStore, Error, IngestMode, Result, RunLedger, RunStatus, TableContracts,
    TableKey, TableProgress,
};
use rfqai_source::{SourceClient, SourceTransport};

/// Outcome of one ingest run.
#[derive(Debug)]
pub struct IngestReport {
    pub run_id: Uuid,
    pub mode: IngestMode,
    pub status: RunStatus,
    pub progress: Vec<TableProgress>,
    pub changed_rfq_count: i64,
    pub error: Option<String>,
}

impl IngestReport {
    pub fn succeeded(&self) -> bool {
        self.status == RunStatus::Success
    }
}

/// Drives one ingest run over injected collaborators.
pub struct IngestOrchestrator<'a, T, L, E>
where
    T: SourceTransport,
    L: RunLedger,
    E: EntityStore,
{
    client: &'a SourceClient<T>,
    ledger: &'a L,
    entities: &'a E,
    contracts: &'a TableContracts,
    page_size_hint: i64,
}

impl<'a, T, L, E> IngestOrchestrator<'a, T, L, E>
where
    T: SourceTransport,
    L: RunLedger,
    E: EntityStore,
{
    pub fn new(
        client: &'a SourceClient<T>,
        ledger: &'a L,
        entities: &'a E,
        contracts: &'a TableContracts,
        page_size_hint: i64,
    ) -> Self {
        Self {
            client,
            ledger,
            entities,
            contracts,
            page_size_hint,
        }
    }

    /// Execute one full run. Returns Ok even when the run fails; the report
    /// carries the outcome. Err is reserved for ledger write failures, after
    /// which no consistent run state can be promised.
    pub async fn run(&self, mode: IngestMode) -> Result<IngestReport> {
        let start = Instant::now();
        let run_id = self.ledger.start_run(mode).await?;
        let mut completed: Vec<TableProgress> = Vec::new();

        for table_key in TableKey::INGEST_ORDER {
            let contract = self.contracts.for_table(table_key);
            match self.ingest_table(run_id, table_key).await {
                Ok(progress) => {
                    self.ledger
                        .record_table_progress(run_id, &progress, RunStatus::Success, None, None, None)
                        .await?;
                    completed.push(progress);
                }
                Err((progress, err)) => {
                    let message = err.to_string();
                    error!(
                        subsystem = "pipeline",
                        component = "ingest",
                        op = "run",
                        run_id = %run_id,
                        table_key = %table_key,
                        error = %message,
                        "Table ingest failed, aborting run"
                    );
                    self.ledger
                        .record_table_progress(
                            run_id,
                            &progress,
                            RunStatus::Failed,
                            None,
                            None,
                            Some(&message),
                        )
                        .await?;
                    completed.push(progress);

                    let changed = self.ledger.count_changed_rfqs(run_id).await?;
                    let summary = run_summary(&completed, changed);
                    self.ledger
                        .finish_run(run_id, RunStatus::Failed, &summary, Some(&message))
                        .await?;
                    return Ok(IngestReport {
                        run_id,
                        mode,
                        status: RunStatus::Failed,
                        progress: completed,
                        changed_rfq_count: changed,
                        error: Some(message),
                    });
                }
            }
            info!(
                subsystem = "pipeline",
                component = "ingest",
                op = "table_done",
                run_id = %run_id,
                table_key = %table_key,
                table = %contract.table_name,
                "Table ingested"
            );
        }

        let changed = self.ledger.count_changed_rfqs(run_id).await?;
        let summary = run_summary(&completed, changed);
        self.ledger
            .finish_run(run_id, RunStatus::Success, &summary, None)
            .await?;

        info!(
            subsystem = "pipeline",
            component = "ingest",
            op = "run_done",
            run_id = %run_id,
            changed_rfq_count = changed,
            duration_ms = start.elapsed().as_millis() as u64,
            "Ingest run succeeded"
        );
        Ok(IngestReport {
            run_id,
            mode,
            status: RunStatus::Success,
            progress: completed,
            changed_rfq_count: changed,
            error: None,
        })
    }

    /// Paginate one table to exhaustion. On error, hands back the progress
    /// accumulated so far so the caller can persist an accurate FAILED row.
    async fn ingest_table(
        &self,
        run_id: Uuid,
        table_key: TableKey,
    ) -> std::result::Result<TableProgress, (TableProgress, Error)> {
        let contract = self.contracts.for_table(table_key);
        let mut progress = TableProgress::new(table_key, &contract.table_name);
        let mut cursor = self.client.fetch_pages(&contract.table_name, self.page_size_hint);

        loop {
            if progress.pages >= SOURCE_MAX_PAGES {
                return Err((
                    progress,
                    Error::Internal(format!(
                        "page ceiling of {SOURCE_MAX_PAGES} reached for table {table_key}"
                    )),
                ));
            }

            let page = match cursor.next_page().await {
                Ok(Some(page)) => page,
                Ok(None) => break,
                Err(e) => return Err((progress, e)),
            };

            let stats = match self
                .entities
                .apply_page(table_key, &page.rows, contract, run_id)
                .await
            {
                Ok(stats) => stats,
                Err(e) => return Err((progress, e)),
            };
            progress.absorb_page(&stats);

            // Checkpoint and progress land after every page, before the next
            // fetch.
            let persist = async {
                self.ledger
                    .upsert_checkpoint(
                        table_key,
                        &contract.table_name,
                        run_id,
                        page.next_token.as_deref(),
                        page.token_kind,
                    )
                    .await?;
                self.ledger
                    .record_table_progress(
                        run_id,
                        &progress,
                        RunStatus::Running,
                        page.next_token.as_deref(),
                        page.token_kind,
                        None,
                    )
                    .await
            };
            if let Err(e) = persist.await {
                return Err((progress, e));
            }
        }

        Ok(progress)
    }
}
