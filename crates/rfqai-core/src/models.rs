//! Shared data model for ingestion and reconciliation.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One opaque row as returned by the source API. Preserved verbatim in the
/// relational store alongside the typed projection.
pub type SourceRow = Map<String, Value>;

// =============================================================================
// PAGINATION
// =============================================================================

/// Continuation-token style supplied by the source.
///
/// The source may hand back either a pointer-style token (`next`, sent back
/// as `startAt`) or a cursor-style token (`cursor`). A request carries at
/// most one of them — whichever style the source supplied last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenKind {
    /// Pointer style: "continue after X", request field `startAt`.
    StartAt,
    /// Opaque cursor style, request field `cursor`.
    Cursor,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::StartAt => "startAt",
            TokenKind::Cursor => "cursor",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "startAt" => Some(TokenKind::StartAt),
            "cursor" => Some(TokenKind::Cursor),
            _ => None,
        }
    }
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One normalized page of source rows. The fetcher folds every response
/// shape the source produces into this type; nothing past the fetcher sees
/// shape quirks.
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub rows: Vec<SourceRow>,
    pub next_token: Option<String>,
    pub token_kind: Option<TokenKind>,
}

// =============================================================================
// TABLES
// =============================================================================

/// The four source tables, in mandatory ingestion order: the RFQ root table
/// first, then the child tables that reference it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TableKey {
    AllRfq,
    AllProducts,
    Queries,
    SupplierShares,
}

impl TableKey {
    /// Fixed ingestion order. Children depend on roots already being
    /// present, so `AllRfq` always comes first.
    pub const INGEST_ORDER: [TableKey; 4] = [
        TableKey::AllRfq,
        TableKey::AllProducts,
        TableKey::Queries,
        TableKey::SupplierShares,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TableKey::AllRfq => "all_rfq",
            TableKey::AllProducts => "all_products",
            TableKey::Queries => "queries",
            TableKey::SupplierShares => "supplier_shares",
        }
    }
}

impl std::fmt::Display for TableKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// STATS & PROGRESS
// =============================================================================

/// Outcome of applying one page of rows through the change detector.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageStats {
    pub seen: u64,
    pub changed: u64,
    pub unchanged: u64,
    pub skipped: u64,
    /// RFQ ids touched by a changed row on this page: the row's own id for
    /// root rows, the parent's id for child rows.
    pub changed_rfq_ids: BTreeSet<String>,
}

impl PageStats {
    pub fn merge(&mut self, other: &PageStats) {
        self.seen += other.seen;
        self.changed += other.changed;
        self.unchanged += other.unchanged;
        self.skipped += other.skipped;
        self.changed_rfq_ids
            .extend(other.changed_rfq_ids.iter().cloned());
    }
}

/// Accumulated progress for one (run, table), persisted after every page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableProgress {
    pub table_key: TableKey,
    pub table_name: String,
    pub pages: u32,
    pub rows_seen: u64,
    pub rows_changed: u64,
    pub rows_unchanged: u64,
    pub rows_skipped: u64,
}

impl TableProgress {
    pub fn new(table_key: TableKey, table_name: impl Into<String>) -> Self {
        Self {
            table_key,
            table_name: table_name.into(),
            pages: 0,
            rows_seen: 0,
            rows_changed: 0,
            rows_unchanged: 0,
            rows_skipped: 0,
        }
    }

    pub fn absorb_page(&mut self, stats: &PageStats) {
        self.pages += 1;
        self.rows_seen += stats.seen;
        self.rows_changed += stats.changed;
        self.rows_unchanged += stats.unchanged;
        self.rows_skipped += stats.skipped;
    }
}

// =============================================================================
// RUNS
// =============================================================================

/// Execution mode of an ingest run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IngestMode {
    /// Ingest everything and reprocess every RFQ.
    Backfill,
    /// Scheduled incremental run; reprocessing limited to this run's
    /// changed-RFQ set.
    Cron,
}

impl IngestMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            IngestMode::Backfill => "backfill",
            IngestMode::Cron => "cron",
        }
    }
}

impl std::fmt::Display for IngestMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of a run or of one table within a run. Runs transition
/// RUNNING → SUCCESS or RUNNING → FAILED exactly once; a crash mid-run
/// leaves the row RUNNING for operators to see.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    Running,
    Success,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "RUNNING",
            RunStatus::Success => "SUCCESS",
            RunStatus::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build the free-form run summary persisted on the run row: per-table
/// counts plus the distinct changed-RFQ count.
pub fn run_summary(progress: &[TableProgress], changed_rfq_count: i64) -> Value {
    let mut tables = Map::new();
    for p in progress {
        tables.insert(
            p.table_key.as_str().to_string(),
            serde_json::json!({
                "pages": p.pages,
                "rows_seen": p.rows_seen,
                "rows_changed": p.rows_changed,
                "rows_unchanged": p.rows_unchanged,
                "rows_skipped": p.rows_skipped,
            }),
        );
    }
    serde_json::json!({
        "table_progress": tables,
        "changed_rfq_count": changed_rfq_count,
    })
}

// =============================================================================
// DERIVED TEXT
// =============================================================================

/// Kind of derived text document for one RFQ.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocKind {
    RfqBrief,
    ProductCard,
    ThreadMessage,
    FileChunk,
}

impl DocKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocKind::RfqBrief => "RFQ_BRIEF",
            DocKind::ProductCard => "PRODUCT_CARD",
            DocKind::ThreadMessage => "THREAD_MESSAGE",
            DocKind::FileChunk => "FILE_CHUNK",
        }
    }
}

impl std::fmt::Display for DocKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// In-memory text unit derived from one RFQ, pre-chunking.
#[derive(Debug, Clone)]
pub struct TextDoc {
    pub doc_kind: DocKind,
    pub rfq_id: String,
    pub product_id: Option<String>,
    pub query_id: Option<String>,
    pub file_id: Option<String>,
    pub title: String,
    pub text: String,
    pub meta: Map<String, Value>,
}

/// Bounded slice of a TextDoc, optionally carrying its embedding.
///
/// `content_sha` is a deterministic function of doc kind, RFQ id, child ids,
/// ordinal index, and text — the vector-store uniqueness key component that
/// makes re-inserting identical content a no-op.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub rfq_id: String,
    pub doc_kind: DocKind,
    pub chunk_idx: i32,
    pub content_text: String,
    pub content_sha: String,
    pub embedding: Option<Vec<f32>>,
    pub product_id: Option<String>,
    pub query_id: Option<String>,
    pub file_id: Option<String>,
    pub page_num: Option<i32>,
    pub meta: Map<String, Value>,
}

/// Outcome of reconciling one RFQ's vectors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub deleted: u64,
    pub inserted: u64,
}

// =============================================================================
// FILE TARGETS
// =============================================================================

/// Where a file-derived document came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceKind {
    RfqFolder,
    DirectUrl,
    ProductLink,
    QueryAttachment,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::RfqFolder => "RFQ_FOLDER",
            SourceKind::DirectUrl => "DIRECT_URL",
            SourceKind::ProductLink => "PRODUCT_LINK",
            SourceKind::QueryAttachment => "QUERY_ATTACHMENT",
        }
    }
}

/// A file or folder URL referenced by an RFQ, to be handed to the text
/// extraction collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileTarget {
    pub rfq_id: String,
    pub product_id: Option<String>,
    pub query_id: Option<String>,
    pub source_kind: SourceKind,
    pub url: String,
}

/// Text extracted from one file target by a collaborator.
#[derive(Debug, Clone)]
pub struct ExtractedText {
    /// Stable id for the extracted file (url-derived or storage id).
    pub file_id: String,
    pub page_num: Option<i32>,
    pub text: String,
}

// =============================================================================
// BUNDLES
// =============================================================================

/// DB-prefetched raw rows for one RFQ, the reprocessing input. Built from
/// the relational store so reprocessing never re-calls the source API.
#[derive(Debug, Clone, Default)]
pub struct RfqBundle {
    pub rfq_id: String,
    pub rfq_row: SourceRow,
    pub product_rows: Vec<SourceRow>,
    pub query_rows: Vec<SourceRow>,
    pub share_rows: Vec<SourceRow>,
}
