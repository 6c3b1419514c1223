//! # rfqai-source
//!
//! Read-only client for the paginated source-table API: request shaping,
//! token-style tracking, retry with capped backoff, and normalization of
//! the source's several response shapes into one canonical page type.

pub mod client;
pub mod normalize;

pub use client::{HttpTransport, PageCursor, SourceClient, SourceConfig, SourceResponse, SourceTransport};
pub use normalize::normalize_response;
