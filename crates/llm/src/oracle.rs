//! Language-model backed [`Oracle`].

use std::sync::Arc;

use async_trait::async_trait;
use erpmind_common::{ErpError, Oracle, Result};
use tracing::debug;

use crate::client::{LlmClient, LlmRequest};

/// Low-temperature, short-output completions for parameter suggestions.
pub struct LlmOracle {
    client: Arc<dyn LlmClient>,
    temperature: f32,
    max_tokens: u32,
}

impl LlmOracle {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self {
            client,
            temperature: 0.3,
            max_tokens: 256,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

#[async_trait]
impl Oracle for LlmOracle {
    async fn suggest(&self, prompt: &str) -> Result<String> {
        let request = LlmRequest::prompt(prompt).with_sampling(self.temperature, self.max_tokens);
        let response = self
            .client
            .complete(request)
            .await
            .map_err(|e| ErpError::Oracle(e.to_string()))?;
        debug!(
            model = %response.model,
            len = response.content.len(),
            "Oracle suggestion received"
        );
        Ok(response.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::LlmResponse;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Captured(Mutex<Vec<(String, Option<f32>, Option<u32>)>>);

    struct RecordingClient {
        seen: Arc<Captured>,
        reply: std::result::Result<String, String>,
    }

    #[async_trait]
    impl LlmClient for RecordingClient {
        async fn complete(&self, request: LlmRequest) -> Result<LlmResponse> {
            self.seen.0.lock().unwrap().push((
                request.messages[0].content.clone(),
                request.temperature,
                request.max_tokens,
            ));
            match &self.reply {
                Ok(content) => Ok(LlmResponse {
                    content: content.clone(),
                    model: "test".into(),
                    usage: None,
                    finish_reason: None,
                }),
                Err(e) => Err(ErpError::Llm(e.clone())),
            }
        }
        fn model_name(&self) -> &str {
            "test"
        }
    }

    #[tokio::test]
    async fn forwards_prompt_with_low_temperature() {
        let seen = Arc::new(Captured::default());
        let oracle = LlmOracle::new(Arc::new(RecordingClient {
            seen: seen.clone(),
            reply: Ok("{\"amount\": 5000}".into()),
        }))
        .with_max_tokens(64);

        let out = oracle.suggest("suggest amount").await.unwrap();
        assert_eq!(out, "{\"amount\": 5000}");

        let calls = seen.0.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "suggest amount");
        assert_eq!(calls[0].1, Some(0.3));
        assert_eq!(calls[0].2, Some(64));
    }

    #[tokio::test]
    async fn client_errors_become_oracle_errors() {
        let oracle = LlmOracle::new(Arc::new(RecordingClient {
            seen: Arc::new(Captured::default()),
            reply: Err("quota exceeded".into()),
        }));
        let err = oracle.suggest("anything").await.unwrap_err();
        assert!(matches!(err, ErpError::Oracle(msg) if msg.contains("quota")));
    }
}
