//! # rfqai-db
//!
//! PostgreSQL persistence layer for the RFQAI ingestion engine.
//!
//! This crate provides:
//! - Connection pool management
//! - Conditional entity upserts with content-hash change detection
//! - The run ledger (runs, per-table progress, pagination checkpoints,
//!   changed-RFQ facts)
//! - Bundle loading for reprocessing
//! - Vector reconciliation and similarity search with pgvector
//!
//! ## Example
//!
//! ```rust,ignore
//! use rfqai_db::Database;
//! use rfqai_core::IngestMode;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("postgres://localhost/rfqai").await?;
//!     db.migrate().await?;
//!
//!     let run_id = db.runs.start_run(IngestMode::Cron).await?;
//!     println!("Started run: {}", run_id);
//!     Ok(())
//! }
//! ```

pub mod bundles;
pub mod entities;
pub mod pool;
pub mod runs;
pub mod vectors;

pub use bundles::PgBundleLoader;
pub use entities::PgEntityStore;
pub use pool::create_pool;
pub use runs::PgRunLedger;
pub use vectors::{ChunkHit, PgVectorStore};

use sqlx::postgres::PgPool;

use rfqai_core::{Error, Result};

/// Facade bundling every repository over one shared pool.
#[derive(Clone)]
pub struct Database {
    pub pool: PgPool,
    pub runs: PgRunLedger,
    pub entities: PgEntityStore,
    pub bundles: PgBundleLoader,
    pub vectors: PgVectorStore,
}

impl Database {
    /// Connect with default pool configuration.
    pub async fn connect(database_url: &str) -> Result<Self> {
        Ok(Self::from_pool(create_pool(database_url).await?))
    }

    /// Build the facade over an existing pool.
    pub fn from_pool(pool: PgPool) -> Self {
        Self {
            runs: PgRunLedger::new(pool.clone()),
            entities: PgEntityStore::new(pool.clone()),
            bundles: PgBundleLoader::new(pool.clone()),
            vectors: PgVectorStore::new(pool.clone()),
            pool,
        }
    }

    /// Apply embedded schema migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(e.into()))
    }
}
