//! Deterministic mock backend for tests and offline runs.

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use rfqai_core::defaults::EMBED_DIMENSION;
use rfqai_core::{EmbeddingBackend, Result};

/// Backend producing deterministic unit-norm-ish vectors derived from the
/// text's digest. Same text, same vector, every time, no network.
#[derive(Debug, Clone)]
pub struct MockEmbedder {
    dimension: usize,
}

impl MockEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn vector_for(&self, text: &str) -> Vec<f32> {
        let digest = Sha256::digest(text.as_bytes());
        (0..self.dimension)
            .map(|i| {
                let byte = digest[i % digest.len()];
                // Mix the index in so long vectors don't just repeat the digest.
                let mixed = byte.wrapping_add((i / digest.len()) as u8);
                (mixed as f32 / 255.0) - 0.5
            })
            .collect()
    }
}

impl Default for MockEmbedder {
    fn default() -> Self {
        Self::new(EMBED_DIMENSION)
    }
}

#[async_trait]
impl EmbeddingBackend for MockEmbedder {
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.vector_for(t)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn vectors_are_deterministic_and_sized() {
        let backend = MockEmbedder::default();
        let texts = vec!["alpha".to_string(), "beta".to_string()];

        let first = backend.embed_texts(&texts).await.unwrap();
        let second = backend.embed_texts(&texts).await.unwrap();

        assert_eq!(first.len(), 2);
        assert_eq!(first[0].len(), EMBED_DIMENSION);
        assert_eq!(first, second);
        assert_ne!(first[0], first[1]);
    }

    #[tokio::test]
    async fn empty_batch_yields_empty_result() {
        let backend = MockEmbedder::new(8);
        assert!(backend.embed_texts(&[]).await.unwrap().is_empty());
    }
}
