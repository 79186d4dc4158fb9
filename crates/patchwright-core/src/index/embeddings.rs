//! Embedding providers
//!
//! - [`OpenAIEmbedder`] - OpenAI-compatible `/v1/embeddings` over HTTP
//! - [`FastEmbedder`] - local ONNX inference via fastembed
//! - [`HashedEmbedder`] - deterministic feature hashing, no network or model

use async_trait::async_trait;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::error::{IndexError, IndexResult};
use crate::config::EmbeddingConfig;

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Stored with each collection; loading requires the same name
    fn model_name(&self) -> &str;

    /// Vector dimensionality, 0 when only known after the first call
    fn dims(&self) -> usize;

    /// One vector per input, in input order
    async fn embed_batch(&self, texts: &[String]) -> IndexResult<Vec<Vec<f32>>>;

    async fn embed_query(&self, text: &str) -> IndexResult<Vec<f32>> {
        self.embed_batch(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| IndexError::EmbeddingService("Empty embedding response".to_string()))
    }
}

/// Build the provider named by `config.provider`
pub fn create_provider(
    config: &EmbeddingConfig,
    runtime_dir: &Path,
) -> IndexResult<Arc<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "openai" => Ok(Arc::new(OpenAIEmbedder::new(config)?)),
        "fastembed" => Ok(Arc::new(FastEmbedder::new(
            &config.model_or_default(),
            &runtime_dir.join("models"),
        )?)),
        "hashed" => Ok(Arc::new(HashedEmbedder::new(config.dims))),
        other => Err(IndexError::EmbeddingService(format!(
            "Unknown embedding provider: {}",
            other
        ))),
    }
}

/// Cosine similarity; 0 for mismatched lengths or zero vectors
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Little-endian f32 BLOB encoding
pub fn embedding_to_blob(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
}

pub fn blob_to_embedding(blob: &[u8]) -> Option<Vec<f32>> {
    if blob.len() % 4 != 0 {
        return None;
    }
    Some(
        blob.chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect(),
    )
}

// ============ OpenAI ============

pub struct OpenAIEmbedder {
    client: reqwest::Client,
    url: String,
    api_key: String,
    model: String,
}

impl OpenAIEmbedder {
    pub fn new(config: &EmbeddingConfig) -> IndexResult<Self> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            IndexError::EmbeddingService(format!(
                "{} environment variable not set",
                config.api_key_env
            ))
        })?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| IndexError::EmbeddingService(e.to_string()))?;

        Ok(Self {
            client,
            url: config.api_url.clone(),
            api_key,
            model: config.model_or_default(),
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        match self.model.as_str() {
            "text-embedding-3-small" | "text-embedding-ada-002" => 1536,
            "text-embedding-3-large" => 3072,
            _ => 0,
        }
    }

    async fn embed_batch(&self, texts: &[String]) -> IndexResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let response = self
            .client
            .post(&self.url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| IndexError::EmbeddingService(format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(IndexError::EmbeddingService(format!(
                "API error {}: {}",
                status, text
            )));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| IndexError::EmbeddingService(format!("Invalid response body: {}", e)))?;
        let embeddings = parse_openai_response(&json)?;
        if embeddings.len() != texts.len() {
            return Err(IndexError::EmbeddingService(format!(
                "Expected {} embeddings, got {}",
                texts.len(),
                embeddings.len()
            )));
        }
        debug!("Embedded {} texts with {}", texts.len(), self.model);
        Ok(embeddings)
    }
}

/// `data[].embedding`, reordered by `data[].index` when present
fn parse_openai_response(json: &serde_json::Value) -> IndexResult<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| IndexError::EmbeddingService("Response is missing the data array".to_string()))?;

    let mut indexed = Vec::with_capacity(data.len());
    for (position, item) in data.iter().enumerate() {
        let values = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| IndexError::EmbeddingService("Response item is missing embedding".to_string()))?;
        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map_or(position, |i| i as usize);
        let vector: Vec<f32> = values
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();
        indexed.push((index, vector));
    }
    indexed.sort_by_key(|(i, _)| *i);
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

// ============ fastembed ============

pub struct FastEmbedder {
    model: Arc<Mutex<fastembed::TextEmbedding>>,
    name: String,
    dims: usize,
}

impl FastEmbedder {
    /// Loads (downloading on first use) the model into `cache_dir`
    pub fn new(name: &str, cache_dir: &Path) -> IndexResult<Self> {
        let (model, dims) = fastembed_model(name)?;
        let options = fastembed::InitOptions::new(model).with_cache_dir(cache_dir.to_path_buf());
        let embedding = fastembed::TextEmbedding::try_new(options).map_err(|e| {
            IndexError::EmbeddingService(format!("Failed to load fastembed model {}: {}", name, e))
        })?;

        Ok(Self {
            model: Arc::new(Mutex::new(embedding)),
            name: name.to_string(),
            dims,
        })
    }
}

fn fastembed_model(name: &str) -> IndexResult<(fastembed::EmbeddingModel, usize)> {
    use fastembed::EmbeddingModel;
    match name {
        "all-minilm-l6-v2" => Ok((EmbeddingModel::AllMiniLML6V2, 384)),
        "bge-small-en-v1.5" => Ok((EmbeddingModel::BGESmallENV15, 384)),
        "bge-base-en-v1.5" => Ok((EmbeddingModel::BGEBaseENV15, 768)),
        "bge-large-en-v1.5" => Ok((EmbeddingModel::BGELargeENV15, 1024)),
        "nomic-embed-text-v1.5" => Ok((EmbeddingModel::NomicEmbedTextV15, 768)),
        other => Err(IndexError::EmbeddingService(format!(
            "Unknown fastembed model: '{}'. Supported: all-minilm-l6-v2, bge-small-en-v1.5, \
             bge-base-en-v1.5, bge-large-en-v1.5, nomic-embed-text-v1.5",
            other
        ))),
    }
}

#[async_trait]
impl EmbeddingProvider for FastEmbedder {
    fn model_name(&self) -> &str {
        &self.name
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_batch(&self, texts: &[String]) -> IndexResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let model = Arc::clone(&self.model);
        let texts = texts.to_vec();

        tokio::task::spawn_blocking(move || {
            let model = model.lock();
            model
                .embed(texts, None)
                .map_err(|e| IndexError::EmbeddingService(format!("fastembed failed: {}", e)))
        })
        .await
        .map_err(|e| IndexError::EmbeddingService(format!("Embedding task panicked: {}", e)))?
    }
}

// ============ hashed ============

/// Bag-of-tokens feature hashing into a fixed number of buckets
#[derive(Debug, Clone)]
pub struct HashedEmbedder {
    dims: usize,
    name: String,
}

impl HashedEmbedder {
    pub fn new(dims: usize) -> Self {
        let dims = dims.max(1);
        Self {
            dims,
            name: format!("hashed-{}", dims),
        }
    }

    pub fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dims];
        for token in tokenize(text) {
            let digest = Sha256::digest(token.as_bytes());
            let bucket = u64::from_le_bytes([
                digest[0], digest[1], digest[2], digest[3], digest[4], digest[5], digest[6],
                digest[7],
            ]) as usize
                % self.dims;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
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
impl EmbeddingProvider for HashedEmbedder {
    fn model_name(&self) -> &str {
        &self.name
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_batch(&self, texts: &[String]) -> IndexResult<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed(t)).collect())
    }
}

/// Lowercased identifier-like tokens; snake_case parts are emitted too
fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    for word in text
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|w| !w.is_empty())
    {
        let lower = word.to_lowercase();
        if lower.contains('_') {
            tokens.extend(
                lower
                    .split('_')
                    .filter(|p| !p.is_empty())
                    .map(str::to_string),
            );
        }
        tokens.push(lower);
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_blob_conversion() {
        let v = vec![0.5f32, -1.25, 3.0];
        assert_eq!(blob_to_embedding(&embedding_to_blob(&v)).unwrap(), v);
        assert!(blob_to_embedding(&[0, 1, 2]).is_none());
    }

    #[test]
    fn test_tokenize_splits_snake_case() {
        assert_eq!(
            tokenize("def parse_url(x):"),
            vec!["def", "parse", "url", "parse_url", "x"]
        );
    }

    #[tokio::test]
    async fn test_hashed_embedder_is_deterministic_and_normalized() {
        let embedder = HashedEmbedder::new(1024);
        assert_eq!(embedder.model_name(), "hashed-1024");

        let a = embedder.embed_query("def foo(): return 1").await.unwrap();
        let b = embedder.embed_query("def foo(): return 1").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 1024);
        let norm: f32 = a.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);

        let related = embedder.embed("foo");
        let unrelated = embedder.embed("completely different words here");
        assert!(cosine_similarity(&a, &related) > cosine_similarity(&a, &unrelated));

        assert!(embedder.embed("").iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_parse_openai_response_orders_by_index() {
        let json = serde_json::json!({
            "data": [
                {"index": 1, "embedding": [0.0, 1.0]},
                {"index": 0, "embedding": [1.0, 0.0]}
            ]
        });
        let parsed = parse_openai_response(&json).unwrap();
        assert_eq!(parsed, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
        assert!(parse_openai_response(&serde_json::json!({})).is_err());
    }

    #[test]
    fn test_create_provider_by_name() {
        let config = EmbeddingConfig {
            provider: "hashed".to_string(),
            dims: 32,
            ..EmbeddingConfig::default()
        };
        let provider = create_provider(&config, Path::new("/tmp")).unwrap();
        assert_eq!(provider.model_name(), "hashed-32");
        assert_eq!(provider.dims(), 32);

        let bad = EmbeddingConfig {
            provider: "nope".to_string(),
            ..EmbeddingConfig::default()
        };
        assert!(create_provider(&bad, Path::new("/tmp")).is_err());
    }
}
