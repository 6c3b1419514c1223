//! # rfqai-core
//!
//! Core types, traits, and abstractions for the RFQAI ingestion and
//! reconciliation engine.
//!
//! This crate provides the shared data model (pages, stats, runs, derived
//! text), the canonical row-hashing primitive, lenient column coercions,
//! engine settings, and the trait seams that the source client, PostgreSQL
//! layer, embedding backends, and orchestrators plug into.

pub mod columns;
pub mod defaults;
pub mod error;
pub mod hash;
pub mod logging;
pub mod models;
pub mod settings;
pub mod traits;

// Re-export commonly used types at crate root
pub use columns::{as_bool, as_f64, as_string_list, as_text, as_timestamp, row_id};
pub use columns::{ColumnMap, TableContract, TableContracts};
pub use error::{Error, Result};
pub use hash::{canonical_json, row_hash};
pub use models::*;
pub use settings::Settings;
pub use traits::*;
