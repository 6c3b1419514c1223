//! Gemini batch embedding backend.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use rfqai_core::defaults::EMBED_TIMEOUT_SECS;
use rfqai_core::{EmbeddingBackend, Error, Result, Settings};

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Embedding backend over the Gemini `batchEmbedContents` endpoint.
pub struct GeminiEmbedder {
    client: reqwest::Client,
    api_key: String,
    model: String,
    dimension: usize,
}

#[derive(Deserialize)]
struct BatchResponse {
    #[serde(default)]
    embeddings: Vec<EmbeddingValues>,
}

#[derive(Deserialize)]
struct EmbeddingValues {
    #[serde(default)]
    values: Vec<f32>,
}

impl GeminiEmbedder {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>, dimension: usize) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(EMBED_TIMEOUT_SECS))
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            model: model.into(),
            dimension,
        })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        if settings.embed_api_key.is_empty() {
            return Err(Error::Config("EMBED_API_KEY is required for embedding".into()));
        }
        Self::new(
            settings.embed_api_key.clone(),
            settings.embed_model.clone(),
            settings.embed_dim,
        )
    }

    fn batch_payload(&self, texts: &[String]) -> Value {
        let requests: Vec<Value> = texts
            .iter()
            .map(|text| {
                json!({
                    "model": format!("models/{}", self.model),
                    "content": {"parts": [{"text": text}]},
                    "outputDimensionality": self.dimension,
                })
            })
            .collect();
        json!({"requests": requests})
    }
}

#[async_trait]
impl EmbeddingBackend for GeminiEmbedder {
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{API_BASE}/models/{}:batchEmbedContents", self.model);
        let resp = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&self.batch_payload(texts))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Embedding(format!(
                "embedding request failed with HTTP {status}: {body}"
            )));
        }

        let parsed: BatchResponse = resp.json().await?;
        if parsed.embeddings.len() != texts.len() {
            return Err(Error::Embedding(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                parsed.embeddings.len()
            )));
        }

        let mut vectors = Vec::with_capacity(parsed.embeddings.len());
        for (i, e) in parsed.embeddings.into_iter().enumerate() {
            if e.values.len() != self.dimension {
                return Err(Error::Embedding(format!(
                    "embedding {} has dimension {}, expected {}",
                    i,
                    e.values.len(),
                    self.dimension
                )));
            }
            vectors.push(e.values);
        }

        debug!(
            subsystem = "embed",
            component = "gemini",
            op = "embed_texts",
            batch_size = texts.len(),
            model = %self.model,
            "Embedded text batch"
        );
        Ok(vectors)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
