//! Engine configuration.
//!
//! Everything is env-driven so cron, CLI, and tests all behave the same.
//! The struct is loaded once at startup and injected by value into each
//! collaborator; core logic never reads ambient state.

use crate::defaults;
use crate::error::{Error, Result};

/// Default read-only source API endpoint.
pub const DEFAULT_SOURCE_ENDPOINT: &str = "https://api.glideapp.io/api/function/queryTables";

/// Runtime settings for the ingestion engine.
#[derive(Debug, Clone)]
pub struct Settings {
    // Database
    pub database_url: String,

    // Source API
    pub source_endpoint: String,
    pub source_api_key: String,
    pub source_app_id: String,
    pub source_max_rows_per_call: i64,
    /// Optional path to a JSON table-contracts document; identity contracts
    /// are used when absent.
    pub source_contracts_path: Option<String>,

    // Embeddings
    pub embed_api_key: String,
    pub embed_model: String,
    pub embed_dim: usize,

    // Chunking
    pub chunk_size: usize,
    pub chunk_overlap: usize,

    // Reprocessing
    pub changed_batch_size: i64,
}

impl Settings {
    /// Load settings from environment variables, with defaults for
    /// everything except credentials.
    pub fn from_env() -> Self {
        Self {
            database_url: env_str("DATABASE_URL", ""),
            source_endpoint: env_str("SOURCE_ENDPOINT", DEFAULT_SOURCE_ENDPOINT),
            source_api_key: env_str("SOURCE_API_KEY", ""),
            source_app_id: env_str("SOURCE_APP_ID", ""),
            source_max_rows_per_call: env_parse(
                "SOURCE_MAX_ROWS_PER_CALL",
                defaults::SOURCE_PAGE_ROWS_DEFAULT,
            ),
            source_contracts_path: std::env::var("SOURCE_CONTRACTS_PATH").ok(),
            embed_api_key: env_str("EMBED_API_KEY", ""),
            embed_model: env_str("EMBED_MODEL", defaults::EMBED_MODEL),
            embed_dim: env_parse("EMBED_DIM", defaults::EMBED_DIMENSION),
            chunk_size: env_parse("CHUNK_SIZE", defaults::CHUNK_SIZE),
            chunk_overlap: env_parse("CHUNK_OVERLAP", defaults::CHUNK_OVERLAP),
            changed_batch_size: env_parse("CHANGED_BATCH_SIZE", defaults::CHANGED_BATCH_SIZE),
        }
    }

    /// Validate invariants that would otherwise fail deep inside a run.
    pub fn validate(&self) -> Result<()> {
        if self.database_url.is_empty() {
            return Err(Error::Config("DATABASE_URL is required".into()));
        }
        if self.embed_dim != defaults::EMBED_DIMENSION {
            return Err(Error::Config(format!(
                "EMBED_DIM must be {} for the current chunk schema; got {}",
                defaults::EMBED_DIMENSION,
                self.embed_dim
            )));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(Error::Config(format!(
                "CHUNK_OVERLAP ({}) must be smaller than CHUNK_SIZE ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

fn env_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr + Copy>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_settings() -> Settings {
        Settings {
            database_url: "postgres://localhost/rfqai".into(),
            source_endpoint: DEFAULT_SOURCE_ENDPOINT.into(),
            source_api_key: String::new(),
            source_app_id: String::new(),
            source_max_rows_per_call: defaults::SOURCE_PAGE_ROWS_DEFAULT,
            source_contracts_path: None,
            embed_api_key: String::new(),
            embed_model: defaults::EMBED_MODEL.into(),
            embed_dim: defaults::EMBED_DIMENSION,
            chunk_size: defaults::CHUNK_SIZE,
            chunk_overlap: defaults::CHUNK_OVERLAP,
            changed_batch_size: defaults::CHANGED_BATCH_SIZE,
        }
    }

    #[test]
    fn validate_accepts_defaults() {
        assert!(base_settings().validate().is_ok());
    }

    #[test]
    fn validate_rejects_missing_database_url() {
        let mut s = base_settings();
        s.database_url = String::new();
        assert!(s.validate().is_err());
    }

    #[test]
    fn validate_rejects_wrong_embed_dim() {
        let mut s = base_settings();
        s.embed_dim = 768;
        assert!(s.validate().is_err());
    }

    #[test]
    fn validate_rejects_overlap_not_smaller_than_size() {
        let mut s = base_settings();
        s.chunk_overlap = s.chunk_size;
        assert!(s.validate().is_err());
    }
}
