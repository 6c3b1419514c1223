//! Centralized default constants for the RFQAI ingestion engine.
//!
//! **This module is the single source of truth** for shared default values.
//! All crates reference these constants instead of defining their own magic
//! numbers.

// =============================================================================
// SOURCE API PAGINATION
// =============================================================================

/// Hard ceiling on rows per source API call. The source rejects larger
/// limits; requested page sizes are clamped down to this, never up.
pub const SOURCE_PAGE_ROWS_MAX: i64 = 10_000;

/// Default rows per source API call when no hint (or a non-positive hint)
/// is given. Conservative; raise via `SOURCE_MAX_ROWS_PER_CALL`.
pub const SOURCE_PAGE_ROWS_DEFAULT: i64 = 1_000;

/// Safety cap on pages fetched from a single table in one run.
pub const SOURCE_MAX_PAGES: u32 = 200;

// =============================================================================
// SOURCE API RETRY
// =============================================================================

/// Maximum attempts per source API request (first try + retries).
pub const SOURCE_RETRY_MAX_ATTEMPTS: u32 = 5;

/// Initial retry backoff in milliseconds; doubles per attempt.
pub const SOURCE_RETRY_BASE_MS: u64 = 500;

/// Backoff ceiling in milliseconds.
pub const SOURCE_RETRY_CAP_MS: u64 = 8_000;

/// HTTP request timeout for source API calls in seconds.
pub const SOURCE_HTTP_TIMEOUT_SECS: u64 = 60;

// =============================================================================
// CHUNKING
// =============================================================================

/// Maximum characters per chunk for text splitting.
pub const CHUNK_SIZE: usize = 1_200;

/// Overlap characters between adjacent chunks for context preservation.
pub const CHUNK_OVERLAP: usize = 150;

// =============================================================================
// EMBEDDING
// =============================================================================

/// Default embedding model name.
pub const EMBED_MODEL: &str = "gemini-embedding-001";

/// Embedding vector dimension required by the chunk table schema.
pub const EMBED_DIMENSION: usize = 1_536;

/// Number of chunk texts sent per embedding request.
pub const EMBED_BATCH_SIZE: usize = 64;

/// HTTP request timeout for embedding calls in seconds.
pub const EMBED_TIMEOUT_SECS: u64 = 60;

// =============================================================================
// REPROCESSING
// =============================================================================

/// Changed-RFQ ids fetched per keyset-pagination batch.
pub const CHANGED_BATCH_SIZE: i64 = 200;

// =============================================================================
// RUN LEDGER
// =============================================================================

/// Maximum characters of error text persisted on run/table rows.
pub const ERROR_TEXT_MAX: usize = 2_000;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_limits_ordered() {
        const {
            assert!(SOURCE_PAGE_ROWS_DEFAULT < SOURCE_PAGE_ROWS_MAX);
            assert!(SOURCE_PAGE_ROWS_DEFAULT > 0);
        }
    }

    #[test]
    fn chunk_overlap_smaller_than_size() {
        const {
            assert!(CHUNK_OVERLAP < CHUNK_SIZE);
        }
    }

    #[test]
    fn retry_backoff_capped() {
        const {
            assert!(SOURCE_RETRY_BASE_MS < SOURCE_RETRY_CAP_MS);
            assert!(SOURCE_RETRY_MAX_ATTEMPTS >= 1);
        }
    }
}
