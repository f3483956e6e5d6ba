//! Text embedding clients.
//!
//! [`EmbeddingClient`] is the only thing the context store knows about
//! embeddings. Two implementations are provided: [`RemoteEmbeddings`] for any
//! OpenAI-compatible `/embeddings` endpoint (Together by default), and, with
//! the `local-embeddings` feature, [`LocalEmbeddings`] running a fastembed
//! model in-process.

use std::sync::Arc;

use async_trait::async_trait;
use erpmind_common::ErpError;
use erpmind_llm::RetryConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};

/// Errors that can occur during embedding operations.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("Failed to initialize embedding model: {0}")]
    ModelInit(String),

    #[error("Failed to generate embeddings: {0}")]
    Generation(String),

    #[error("Embedding request failed: {0}")]
    Request(String),

    #[error("Blocking task failed: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}

/// Maps text to a fixed-dimension vector. May fail transiently.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Length of every vector this client produces.
    fn dimension(&self) -> usize;
}

#[async_trait]
impl<T: EmbeddingClient + ?Sized> EmbeddingClient for Arc<T> {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        (**self).embed(text).await
    }

    fn dimension(&self) -> usize {
        (**self).dimension()
    }
}

/// Embedding backend selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// `remote` or `local`.
    pub provider: String,
    pub model: String,
    pub api_url: String,
    pub api_key: Option<String>,
    pub dimension: usize,
    pub retry: RetryConfig,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "remote".into(),
            model: "togethercomputer/m2-bert-80M-2k-retrieval".into(),
            api_url: "https://api.together.xyz/v1".into(),
            api_key: None,
            dimension: 768,
            retry: RetryConfig {
                max_retries: 2,
                ..RetryConfig::default()
            },
        }
    }
}

/// Build the configured embedding client.
pub fn build_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingClient>, EmbeddingError> {
    match config.provider.as_str() {
        "remote" => {
            let api_key = config
                .api_key
                .clone()
                .or_else(|| std::env::var("TOGETHER_API_KEY").ok())
                .or_else(|| std::env::var("OPENAI_API_KEY").ok());
            Ok(Arc::new(
                RemoteEmbeddings::new(
                    config.api_url.clone(),
                    config.model.clone(),
                    api_key,
                    config.dimension,
                )
                .with_retry(config.retry.clone()),
            ))
        }
        #[cfg(feature = "local-embeddings")]
        "local" => Ok(Arc::new(LocalEmbeddings::from_config(
            &config.model,
            config.dimension,
        )?)),
        other => Err(EmbeddingError::ModelInit(format!(
            "Unknown embedding provider: '{other}'"
        ))),
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
}

/// Client for an OpenAI-compatible `/embeddings` endpoint.
pub struct RemoteEmbeddings {
    base_url: String,
    model: String,
    api_key: Option<String>,
    dimension: usize,
    retry: RetryConfig,
    http_client: reqwest::Client,
}

impl RemoteEmbeddings {
    pub fn new(base_url: String, model: String, api_key: Option<String>, dimension: usize) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            api_key,
            dimension,
            retry: RetryConfig::disabled(),
            http_client: reqwest::Client::new(),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    async fn request(&self, text: &str) -> erpmind_common::Result<Vec<f32>> {
        let url = format!("{}/embeddings", self.base_url);
        let mut http_req = self.http_client.post(&url).json(&EmbeddingRequest {
            model: &self.model,
            input: text,
        });
        if let Some(ref key) = self.api_key {
            http_req = http_req.bearer_auth(key);
        }

        let response = http_req
            .send()
            .await
            .map_err(|e| ErpError::Embedding(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(ErpError::Embedding(format!("API error {status}: {body_text}")));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| ErpError::Embedding(format!("failed to parse response: {e}")))?;

        parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| ErpError::Embedding("empty embedding result".into()))
    }
}

#[async_trait]
impl EmbeddingClient for RemoteEmbeddings {
    #[instrument(skip(self, text), fields(text_len = text.len()))]
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let vector = self
            .retry
            .run("embedding", || self.request(text))
            .await
            .map_err(|e| EmbeddingError::Request(e.to_string()))?;
        debug!(dimension = vector.len(), "Generated embedding");
        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[cfg(feature = "local-embeddings")]
pub use local::LocalEmbeddings;

#[cfg(feature = "local-embeddings")]
mod local {
    use std::sync::Arc;

    use async_trait::async_trait;
    use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
    use once_cell::sync::OnceCell;
    use tokio::task;
    use tracing::{debug, info, instrument};

    use super::{EmbeddingClient, EmbeddingError};

    /// In-process embeddings via fastembed.
    ///
    /// The model is loaded on first use and shared across calls.
    pub struct LocalEmbeddings {
        model_name: EmbeddingModel,
        dimension: usize,
        model: OnceCell<Arc<TextEmbedding>>,
    }

    impl LocalEmbeddings {
        pub fn new(model_name: EmbeddingModel, dimension: usize) -> Self {
            Self {
                model_name,
                dimension,
                model: OnceCell::new(),
            }
        }

        /// Resolve a model name and check it produces `expected_dim` vectors.
        pub fn from_config(model_name: &str, expected_dim: usize) -> Result<Self, EmbeddingError> {
            let (model, dimension) = match model_name {
                "bge-base-en-v1.5" | "BGEBaseENV15" => (EmbeddingModel::BGEBaseENV15, 768),
                "bge-small-en-v1.5" | "BGESmallENV15" => (EmbeddingModel::BGESmallENV15, 384),
                "all-MiniLM-L6-v2" | "AllMiniLML6V2" => (EmbeddingModel::AllMiniLML6V2, 384),
                "nomic-embed-text-v1.5" | "NomicEmbedTextV15" => {
                    (EmbeddingModel::NomicEmbedTextV15, 768)
                }
                _ => {
                    return Err(EmbeddingError::ModelInit(format!(
                        "Unknown local embedding model: '{model_name}'"
                    )));
                }
            };
            if dimension != expected_dim {
                return Err(EmbeddingError::ModelInit(format!(
                    "Dimension mismatch: model '{model_name}' produces {dimension}-dim vectors but config specifies {expected_dim}"
                )));
            }
            Ok(Self::new(model, dimension))
        }

        fn get_or_init_model(&self) -> Result<Arc<TextEmbedding>, EmbeddingError> {
            self.model
                .get_or_try_init(|| {
                    info!(model = ?self.model_name, "Initializing embedding model");
                    let mut options = InitOptions::new(self.model_name.clone());
                    options.show_download_progress = true;
                    let model = TextEmbedding::try_new(options)
                        .map_err(|e| EmbeddingError::ModelInit(e.to_string()))?;
                    Ok(Arc::new(model))
                })
                .cloned()
        }
    }

    #[async_trait]
    impl EmbeddingClient for LocalEmbeddings {
        #[instrument(skip(self, text), fields(text_len = text.len()))]
        async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
            let model = self.get_or_init_model()?;
            let text = text.to_string();

            let embeddings = task::spawn_blocking(move || {
                model
                    .embed(vec![text], None)
                    .map_err(|e| EmbeddingError::Generation(e.to_string()))
            })
            .await??;

            let vector = embeddings
                .into_iter()
                .next()
                .ok_or_else(|| EmbeddingError::Generation("Empty embedding result".into()))?;
            debug!(dimension = vector.len(), "Generated embedding");
            Ok(vector)
        }

        fn dimension(&self) -> usize {
            self.dimension
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn from_config_checks_dimension() {
            assert!(LocalEmbeddings::from_config("bge-base-en-v1.5", 768).is_ok());
            assert!(LocalEmbeddings::from_config("bge-base-en-v1.5", 384).is_err());
            assert!(LocalEmbeddings::from_config("unknown-model", 768).is_err());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_is_openai_shaped() {
        let body = serde_json::to_value(EmbeddingRequest {
            model: "m2-bert",
            input: "Q: stock\nA: 40 units",
        })
        .unwrap();
        assert_eq!(body["model"], "m2-bert");
        assert_eq!(body["input"], "Q: stock\nA: 40 units");
    }

    #[test]
    fn response_parses_first_vector() {
        let parsed: EmbeddingResponse =
            serde_json::from_str(r#"{"data":[{"embedding":[0.1,0.2],"index":0}],"model":"x"}"#)
                .unwrap();
        assert_eq!(parsed.data[0].embedding, vec![0.1, 0.2]);
    }

    #[test]
    fn build_remote_embedder_reports_dimension() {
        let config = EmbeddingConfig {
            dimension: 16,
            ..Default::default()
        };
        let embedder = build_embedder(&config).unwrap();
        assert_eq!(embedder.dimension(), 16);
    }

    #[test]
    fn unknown_provider_is_rejected() {
        let config = EmbeddingConfig {
            provider: "carrier-pigeon".into(),
            ..Default::default()
        };
        assert!(build_embedder(&config).is_err());
    }

    #[tokio::test]
    #[ignore = "Calls the embedding API over the network"]
    async fn remote_embedding_roundtrip() {
        let embedder = build_embedder(&EmbeddingConfig::default()).unwrap();
        let vector = embedder.embed("Q: low stock\nA: 3 items").await.unwrap();
        assert_eq!(vector.len(), 768);
    }
}
