use std::sync::Arc;

use async_trait::async_trait;
use erpmind_common::{ErpError, Result};
use serde::{Deserialize, Serialize};

use crate::chat::{ChatClient, Provider};
use crate::client::{LlmClient, LlmRequest, LlmResponse};
use crate::retry::{RetryConfig, RetryingClient};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// `together`, `openai` or `ollama`; all speak the OpenAI chat protocol.
    pub provider: String,
    pub model: String,
    pub api_key: Option<String>,
    pub api_url: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub max_concurrent_requests: usize,
    pub retry: RetryConfig,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "together".into(),
            model: "meta-llama/Llama-3-70b-chat-hf".into(),
            api_key: None,
            api_url: None,
            temperature: 0.3,
            max_tokens: 1024,
            max_concurrent_requests: 2,
            retry: RetryConfig::default(),
        }
    }
}

impl LlmConfig {
    pub fn provider(&self) -> Result<Provider> {
        self.provider.parse()
    }

    /// Explicit key, else the provider's conventional environment variable.
    pub fn resolved_api_key(&self) -> Option<String> {
        if self.api_key.is_some() {
            return self.api_key.clone();
        }
        let var = self.provider().ok()?.key_var()?;
        std::env::var(var).ok().filter(|k| !k.trim().is_empty())
    }
}

pub struct SemaphoredClient {
    inner: Arc<dyn LlmClient>,
    semaphore: Arc<tokio::sync::Semaphore>,
}

impl SemaphoredClient {
    pub fn new(inner: Arc<dyn LlmClient>, max_concurrent: usize) -> Self {
        Self {
            inner,
            semaphore: Arc::new(tokio::sync::Semaphore::new(max_concurrent.max(1))),
        }
    }
}

#[async_trait]
impl LlmClient for SemaphoredClient {
    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|e| ErpError::Llm(format!("Semaphore acquire failed: {e}")))?;
        self.inner.complete(request).await
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }
}

/// Provider client, wrapped in retry and then in the concurrency gate.
pub fn build_llm_client(config: &LlmConfig) -> Result<Arc<dyn LlmClient>> {
    let chat = ChatClient::new(
        config.provider()?,
        config.api_url.as_deref(),
        config.model.clone(),
        config.resolved_api_key(),
    );
    let retrying = RetryingClient::new(chat, config.retry.clone());
    Ok(Arc::new(SemaphoredClient::new(
        Arc::new(retrying),
        config.max_concurrent_requests,
    )))
}
