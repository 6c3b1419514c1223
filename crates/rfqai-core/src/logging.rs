//! Structured logging field name constants.
//!
//! All crates use these constants for consistent structured logging fields
//! so log aggregation tools can query by standardized names across every
//! subsystem.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Run/table aborted, requires operator attention |
//! | WARN  | Recoverable issue, recorded skip or per-RFQ failure |
//! | INFO  | Lifecycle events (run start/finish), table completions |
//! | DEBUG | Per-page progress, retry decisions, config choices |
//! | TRACE | Per-row detail (high volume) |

/// Subsystem originating the log event.
/// Values: "source", "database", "pipeline", "embed", "cli"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "fetcher", "entity_store", "run_ledger", "reconciler"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "fetch_page", "apply_page", "reconcile_rfq"
pub const OPERATION: &str = "op";

/// Ingest run UUID.
pub const RUN_ID: &str = "run_id";

/// Source table key being processed.
pub const TABLE_KEY: &str = "table_key";

/// RFQ external id being operated on.
pub const RFQ_ID: &str = "rfq_id";

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of source rows in a page or batch.
pub const ROW_COUNT: &str = "row_count";

/// Number of chunks processed (chunking, embedding, reconcile).
pub const CHUNK_COUNT: &str = "chunk_count";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";
