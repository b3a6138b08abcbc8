//! Embedding provider abstraction and implementations.
//!
//! Defines the [`EmbeddingProvider`] trait and concrete backends:
//! - **hash** — deterministic offline vectors derived from a SHA-256 of the
//!   text; for dev/test deployments with no model service.
//! - **ollama** — calls an Ollama instance's `/api/embed` endpoint.
//! - **openai** — calls the OpenAI embeddings API (`OPENAI_API_KEY`).
//! - **local** — runs models in-process via fastembed (behind the
//!   `local-embeddings` feature); no network calls after model download.
//!
//! [`Embedder`] is the process-wide handle: constructed once from config and
//! injected into the ETL orchestrator and the retrieval service. The backend
//! is initialized lazily exactly once — model loading is expensive, and
//! concurrent first use must resolve to a single initialization — via
//! [`tokio::sync::OnceCell`].
//!
//! Every outbound call carries the configured timeout and fails with the
//! `Timeout` error class when exceeded. There are no automatic retries;
//! callers decide (ETL skips the date, retrieval falls back to keywords).

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;

use crate::config::EmbeddingConfig;
use crate::error::PipelineError;

/// A batch text→vector backend. Output must be 1:1 with input, in order.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Model identifier (e.g. `"nomic-embed-text"`).
    fn model_name(&self) -> &str;
    /// Embedding vector dimensionality.
    fn dims(&self) -> usize;
    /// Embed one batch of texts.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, PipelineError>;
}

/// Process-wide embedding handle with lazy-once backend initialization.
pub struct Embedder {
    config: EmbeddingConfig,
    backend: OnceCell<Arc<dyn EmbeddingProvider>>,
}

impl Embedder {
    pub fn new(config: EmbeddingConfig) -> Self {
        Embedder {
            config,
            backend: OnceCell::new(),
        }
    }

    async fn backend(&self) -> Result<&Arc<dyn EmbeddingProvider>, PipelineError> {
        self.backend
            .get_or_try_init(|| build_provider(&self.config))
            .await
    }

    /// Embed a batch of texts, preserving order.
    ///
    /// Texts are fed to the backend in `batch_size` sub-batches; the split
    /// has no semantic effect, it only bounds per-call payloads. Output
    /// arity or dimensionality mismatches are `MalformedResponse`.
    pub async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, PipelineError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let backend = self.backend().await?;
        let batch_size = self.config.batch_size.max(1);

        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(batch_size) {
            let mut out = backend.embed(batch).await?;
            if out.len() != batch.len() {
                return Err(PipelineError::MalformedResponse(format!(
                    "provider returned {} vectors for {} texts",
                    out.len(),
                    batch.len()
                )));
            }
            if let Some(bad) = out.iter().find(|v| v.len() != backend.dims()) {
                return Err(PipelineError::MalformedResponse(format!(
                    "provider returned a {}-dim vector, expected {}",
                    bad.len(),
                    backend.dims()
                )));
            }
            vectors.append(&mut out);
        }

        Ok(vectors)
    }

    /// Embed a single query text.
    pub async fn embed_query(&self, text: &str) -> Result<Vec<f32>, PipelineError> {
        let texts = [text.to_string()];
        let mut vectors = self.embed_texts(&texts).await?;
        vectors
            .pop()
            .ok_or_else(|| PipelineError::MalformedResponse("empty embedding response".into()))
    }
}

async fn build_provider(
    config: &EmbeddingConfig,
) -> Result<Arc<dyn EmbeddingProvider>, PipelineError> {
    match config.provider.as_str() {
        "hash" => Ok(Arc::new(HashProvider::new(config.dims))),
        "ollama" => Ok(Arc::new(OllamaProvider::new(config)?)),
        "openai" => Ok(Arc::new(OpenAiProvider::new(config)?)),
        #[cfg(feature = "local-embeddings")]
        "local" => Ok(Arc::new(LocalProvider::load(config).await?)),
        #[cfg(not(feature = "local-embeddings"))]
        "local" => Err(PipelineError::Connection(
            "local embedding provider requires --features local-embeddings".to_string(),
        )),
        other => Err(PipelineError::Connection(format!(
            "unknown embedding provider: {}",
            other
        ))),
    }
}

// ============ Hash provider ============

/// Deterministic offline provider: expands a SHA-256 of the text into a
/// unit vector of the configured dimension. Identical text always maps to
/// the identical vector, so cosine scores behave sensibly in dev setups.
pub struct HashProvider {
    dims: usize,
}

impl HashProvider {
    pub fn new(dims: usize) -> Self {
        HashProvider { dims }
    }

    pub fn vector_for(&self, text: &str) -> Vec<f32> {
        let mut out = Vec::with_capacity(self.dims);
        let mut counter: u32 = 0;
        while out.len() < self.dims {
            let mut hasher = Sha256::new();
            hasher.update(text.as_bytes());
            hasher.update(counter.to_le_bytes());
            let digest = hasher.finalize();
            for chunk in digest.chunks_exact(4) {
                if out.len() == self.dims {
                    break;
                }
                let raw = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
                out.push((raw as f32 / u32::MAX as f32) * 2.0 - 1.0);
            }
            counter += 1;
        }

        let norm = out.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > f32::EPSILON {
            for v in &mut out {
                *v /= norm;
            }
        }
        out
    }
}

#[async_trait]
impl EmbeddingProvider for HashProvider {
    fn model_name(&self) -> &str {
        "hash"
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, PipelineError> {
        Ok(texts.iter().map(|t| self.vector_for(t)).collect())
    }
}

// ============ Ollama provider ============

/// Calls `POST {url}/api/embed` on an Ollama instance.
pub struct OllamaProvider {
    model: String,
    dims: usize,
    url: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl OllamaProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self, PipelineError> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| PipelineError::Connection("embedding.model required".to_string()))?;
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| "http://localhost:11434".to_string());

        let timeout = Duration::from_secs(config.timeout_secs);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(PipelineError::connection)?;

        Ok(OllamaProvider {
            model,
            dims: config.dims,
            url,
            client,
            timeout,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaProvider {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, PipelineError> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let response = self
            .client
            .post(format!("{}/api/embed", self.url.trim_end_matches('/')))
            .json(&body)
            .send()
            .await
            .map_err(|err| classify_http_error(err, self.timeout))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(PipelineError::Connection(format!(
                "ollama returned {}: {}",
                status, body_text
            )));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|err| PipelineError::MalformedResponse(err.to_string()))?;
        parse_vector_array(json.get("embeddings"), "embeddings")
    }
}

// ============ OpenAI provider ============

/// Calls `POST https://api.openai.com/v1/embeddings`.
pub struct OpenAiProvider {
    model: String,
    dims: usize,
    api_key: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl OpenAiProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self, PipelineError> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| PipelineError::Connection("embedding.model required".to_string()))?;
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| {
            PipelineError::Connection("OPENAI_API_KEY environment variable not set".to_string())
        })?;

        let timeout = Duration::from_secs(config.timeout_secs);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(PipelineError::connection)?;

        Ok(OpenAiProvider {
            model,
            dims: config.dims,
            api_key,
            client,
            timeout,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiProvider {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, PipelineError> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let response = self
            .client
            .post("https://api.openai.com/v1/embeddings")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|err| classify_http_error(err, self.timeout))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(PipelineError::Connection(format!(
                "openai returned {}: {}",
                status, body_text
            )));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|err| PipelineError::MalformedResponse(err.to_string()))?;

        let data = json
            .get("data")
            .and_then(|d| d.as_array())
            .ok_or_else(|| {
                PipelineError::MalformedResponse("missing data array".to_string())
            })?;

        let mut embeddings = Vec::with_capacity(data.len());
        for item in data {
            let vec = parse_float_array(item.get("embedding"), "data[].embedding")?;
            embeddings.push(vec);
        }
        Ok(embeddings)
    }
}

// ============ Local provider (fastembed) ============

/// In-process inference via fastembed. The model is loaded once at backend
/// initialization; `embed` calls run on the blocking pool.
#[cfg(feature = "local-embeddings")]
pub struct LocalProvider {
    model_name: String,
    dims: usize,
    model: Arc<std::sync::Mutex<fastembed::TextEmbedding>>,
    batch_size: usize,
}

#[cfg(feature = "local-embeddings")]
impl LocalProvider {
    pub async fn load(config: &EmbeddingConfig) -> Result<Self, PipelineError> {
        let model_name = config
            .model
            .clone()
            .ok_or_else(|| PipelineError::Connection("embedding.model required".to_string()))?;
        let fastembed_model = match model_name.as_str() {
            "all-minilm-l6-v2" => fastembed::EmbeddingModel::AllMiniLML6V2,
            "bge-small-en-v1.5" => fastembed::EmbeddingModel::BGESmallENV15,
            "bge-base-en-v1.5" => fastembed::EmbeddingModel::BGEBaseENV15,
            "multilingual-e5-base" => fastembed::EmbeddingModel::MultilingualE5Base,
            other => {
                return Err(PipelineError::Connection(format!(
                    "unknown local embedding model: {}",
                    other
                )))
            }
        };

        tracing::info!(model = %model_name, device = %config.device, "loading local embedding model");

        let model = tokio::task::spawn_blocking(move || {
            fastembed::TextEmbedding::try_new(fastembed::InitOptions::new(fastembed_model))
        })
        .await
        .map_err(PipelineError::connection)?
        .map_err(PipelineError::connection)?;

        Ok(LocalProvider {
            model_name,
            dims: config.dims,
            model: Arc::new(std::sync::Mutex::new(model)),
            batch_size: config.batch_size,
        })
    }
}

#[cfg(feature = "local-embeddings")]
#[async_trait]
impl EmbeddingProvider for LocalProvider {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, PipelineError> {
        let model = Arc::clone(&self.model);
        let texts = texts.to_vec();
        let batch_size = self.batch_size;

        tokio::task::spawn_blocking(move || {
            let mut model = model.lock().expect("embedding model mutex poisoned");
            model
                .embed(texts, Some(batch_size))
                .map_err(|err| PipelineError::MalformedResponse(err.to_string()))
        })
        .await
        .map_err(PipelineError::connection)?
    }
}

// ============ Shared parsing helpers ============

fn classify_http_error(err: reqwest::Error, budget: Duration) -> PipelineError {
    if err.is_timeout() {
        PipelineError::Timeout(budget)
    } else {
        PipelineError::connection(err)
    }
}

fn parse_vector_array(
    value: Option<&serde_json::Value>,
    field: &str,
) -> Result<Vec<Vec<f32>>, PipelineError> {
    let outer = value.and_then(|v| v.as_array()).ok_or_else(|| {
        PipelineError::MalformedResponse(format!("missing {} array", field))
    })?;

    outer
        .iter()
        .map(|inner| parse_float_array(Some(inner), field))
        .collect()
}

fn parse_float_array(
    value: Option<&serde_json::Value>,
    field: &str,
) -> Result<Vec<f32>, PipelineError> {
    let array = value.and_then(|v| v.as_array()).ok_or_else(|| {
        PipelineError::MalformedResponse(format!("{} is not an array", field))
    })?;

    array
        .iter()
        .map(|v| {
            v.as_f64().map(|f| f as f32).ok_or_else(|| {
                PipelineError::MalformedResponse(format!("{} holds a non-numeric value", field))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hash_provider_is_deterministic_and_order_preserving() {
        let embedder = Embedder::new(EmbeddingConfig {
            provider: "hash".to_string(),
            dims: 64,
            batch_size: 2,
            ..EmbeddingConfig::default()
        });

        let texts: Vec<String> = (0..5).map(|i| format!("record {}", i)).collect();
        let first = embedder.embed_texts(&texts).await.unwrap();
        let second = embedder.embed_texts(&texts).await.unwrap();

        assert_eq!(first.len(), texts.len());
        assert_eq!(first, second);
        // Distinct texts land on distinct vectors.
        assert_ne!(first[0], first[1]);
    }

    #[tokio::test]
    async fn hash_vectors_are_unit_length() {
        let provider = HashProvider::new(128);
        let v = provider.vector_for("type=history CPU_Usage=95");
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
        assert_eq!(v.len(), 128);
    }

    #[tokio::test]
    async fn empty_batch_short_circuits() {
        let embedder = Embedder::new(EmbeddingConfig::default());
        assert!(embedder.embed_texts(&[]).await.unwrap().is_empty());
    }

    #[test]
    fn malformed_payloads_are_typed() {
        let json: serde_json::Value = serde_json::json!({"embeddings": [[1.0, "x"]]});
        let err = parse_vector_array(json.get("embeddings"), "embeddings").unwrap_err();
        assert!(matches!(err, PipelineError::MalformedResponse(_)));

        let err = parse_vector_array(json.get("missing"), "missing").unwrap_err();
        assert!(matches!(err, PipelineError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn ollama_parse_shape() {
        let json: serde_json::Value =
            serde_json::json!({"embeddings": [[0.1, 0.2], [0.3, 0.4]]});
        let vectors = parse_vector_array(json.get("embeddings"), "embeddings").unwrap();
        assert_eq!(vectors, vec![vec![0.1, 0.2], vec![0.3, 0.4]]);
    }
}
