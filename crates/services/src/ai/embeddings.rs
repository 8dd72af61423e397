//! Text embedding providers.
//!
//! `HttpEmbeddingProvider` talks to an `/embeddings` endpoint;
//! `HashingEmbeddingProvider` runs offline and is deterministic, which makes
//! it the default for development and tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ai::llm::DEFAULT_REQUEST_TIMEOUT;
use crate::error::EmbeddingError;

pub const DEFAULT_DIMENSIONS: usize = 384;
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

const STOP_WORDS: &[&str] = &[
    "the", "is", "at", "which", "on", "a", "an", "as", "are", "was", "were", "for", "to", "of",
    "in", "and", "or", "but", "with", "by", "from", "this", "that", "be", "have", "has", "had",
    "it", "its", "their", "they", "them",
];

#[async_trait]
pub trait EmbeddingProvider: Send + Sync + std::fmt::Debug {
    fn provider_name(&self) -> &str;

    fn dimensions(&self) -> usize;

    /// One vector per input, in input order.
    ///
    /// # Errors
    ///
    /// Returns `EmbeddingError` when the backend fails or returns the wrong
    /// number of vectors.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// # Errors
    ///
    /// Returns `EmbeddingError` when the backend fails.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or(EmbeddingError::CountMismatch { expected: 1, got: 0 })
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingKind {
    Http,
    #[default]
    Hashing,
}

#[derive(Clone, Debug)]
pub struct EmbeddingConfig {
    pub kind: EmbeddingKind,
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub dimensions: usize,
    pub timeout: Duration,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            kind: EmbeddingKind::Hashing,
            base_url: crate::ai::llm::DEFAULT_BASE_URL.to_string(),
            api_key: None,
            model: DEFAULT_EMBEDDING_MODEL.to_string(),
            dimensions: DEFAULT_DIMENSIONS,
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// Build the provider named by `config`.
///
/// # Errors
///
/// Returns `EmbeddingError::MissingApiKey` for the HTTP provider without a key.
pub fn create_provider(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>, EmbeddingError> {
    match config.kind {
        EmbeddingKind::Hashing => Ok(Arc::new(HashingEmbeddingProvider::new(config.dimensions))),
        EmbeddingKind::Http => {
            let api_key = config
                .api_key
                .as_deref()
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .ok_or(EmbeddingError::MissingApiKey)?;
            Ok(Arc::new(
                HttpEmbeddingProvider::new(&config.base_url, api_key, &config.model, config.dimensions)
                    .with_timeout(config.timeout),
            ))
        }
    }
}

//
// ─── HASHING ───────────────────────────────────────────────────────────────────
//

/// Offline provider hashing word trigrams into a fixed number of buckets.
#[derive(Debug, Clone)]
pub struct HashingEmbeddingProvider {
    dimensions: usize,
}

impl HashingEmbeddingProvider {
    #[must_use]
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    fn bucket(&self, bytes: &[u8], multiplier: u64) -> usize {
        let hash = bytes
            .iter()
            .fold(0_u64, |acc, b| acc.wrapping_mul(multiplier).wrapping_add(u64::from(*b)));
        usize::try_from(hash % self.dimensions as u64).unwrap_or(0)
    }

    #[must_use]
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0_f32; self.dimensions];
        let lower = text.to_lowercase();

        let mut frequencies: HashMap<&str, u32> = HashMap::new();
        for word in lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.chars().count() > 2 && !STOP_WORDS.contains(w))
        {
            *frequencies.entry(word).or_insert(0) += 1;
        }

        #[allow(clippy::cast_precision_loss)]
        for (word, freq) in &frequencies {
            let weight = (*freq as f32).sqrt();
            let chars: Vec<char> = word.chars().collect();
            for window in chars.windows(3) {
                let trigram: String = window.iter().collect();
                let idx = self.bucket(trigram.as_bytes(), 37);
                vector[idx] += weight;
            }
            let idx = self.bucket(word.as_bytes(), 31);
            vector[idx] += *freq as f32;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for HashingEmbeddingProvider {
    fn provider_name(&self) -> &str {
        "hashing"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}

//
// ─── HTTP ──────────────────────────────────────────────────────────────────────
//

/// Provider for `OpenAI`-style `/embeddings` endpoints.
#[derive(Debug, Clone)]
pub struct HttpEmbeddingProvider {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    dimensions: usize,
    timeout: Duration,
}

impl HttpEmbeddingProvider {
    #[must_use]
    pub fn new(base_url: &str, api_key: &str, model: &str, dimensions: usize) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            dimensions,
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingDatum {
    index: usize,
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
    fn provider_name(&self) -> &str {
        "http"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .timeout(self.timeout)
            .json(&EmbeddingRequest {
                model: &self.model,
                input: texts,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(EmbeddingError::HttpStatus(response.status()));
        }

        let mut body: EmbeddingResponse = response.json().await?;
        if body.data.len() != texts.len() {
            return Err(EmbeddingError::CountMismatch {
                expected: texts.len(),
                got: body.data.len(),
            });
        }
        body.data.sort_by_key(|d| d.index);
        debug!(count = body.data.len(), model = %self.model, "embedded batch");
        Ok(body.data.into_iter().map(|d| d.embedding).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use study_core::retrieval::cosine_similarity;

    #[test]
    fn hashing_is_deterministic_and_unit_length() {
        let provider = HashingEmbeddingProvider::new(DEFAULT_DIMENSIONS);
        let a = provider.embed_text("Binary search trees keep keys ordered");
        let b = provider.embed_text("Binary search trees keep keys ordered");
        assert_eq!(a, b);
        assert_eq!(a.len(), DEFAULT_DIMENSIONS);
        let norm = a.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn related_text_scores_higher_than_unrelated() {
        let provider = HashingEmbeddingProvider::new(DEFAULT_DIMENSIONS);
        let query = provider.embed_text("photosynthesis in plant leaves");
        let related = provider.embed_text("Plant leaves use photosynthesis to make sugar");
        let unrelated = provider.embed_text("Database normalization removes redundancy");
        assert!(cosine_similarity(&query, &related) > cosine_similarity(&query, &unrelated));
    }

    #[test]
    fn stop_words_only_embed_to_zero() {
        let provider = HashingEmbeddingProvider::new(16);
        assert!(provider.embed_text("the and of").iter().all(|v| *v == 0.0));
    }

    #[test]
    fn http_provider_needs_a_key() {
        let config = EmbeddingConfig {
            kind: EmbeddingKind::Http,
            ..EmbeddingConfig::default()
        };
        assert!(matches!(
            create_provider(&config),
            Err(EmbeddingError::MissingApiKey)
        ));
        assert_eq!(
            create_provider(&EmbeddingConfig::default()).unwrap().provider_name(),
            "hashing"
        );
    }
}
