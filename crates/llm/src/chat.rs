//! Chat completions over the OpenAI wire protocol.
//!
//! Together, OpenAI and a local Ollama all serve `POST {base}/chat/completions`,
//! but they disagree on credentials, on the name of the completion budget and
//! on how a Llama 3 turn ends. [`Provider`] carries those differences and
//! [`ChatClient`] shapes each request body from it.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use erpmind_common::{ErpError, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::client::{LlmClient, LlmRequest, LlmResponse, Role, TokenUsage};

/// End-of-turn marker of Llama 3 chat models. Together streams it back
/// unless it is listed as a stop sequence.
const LLAMA3_END_OF_TURN: &str = "<|eot_id|>";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Together,
    OpenAi,
    Ollama,
}

impl Provider {
    pub fn default_url(self) -> &'static str {
        match self {
            Self::Together => "https://api.together.xyz/v1",
            Self::OpenAi => "https://api.openai.com/v1",
            Self::Ollama => "http://localhost:11434/v1",
        }
    }

    /// Environment variable holding the API key. Ollama runs unauthenticated.
    pub fn key_var(self) -> Option<&'static str> {
        match self {
            Self::Together => Some("TOGETHER_API_KEY"),
            Self::OpenAi => Some("OPENAI_API_KEY"),
            Self::Ollama => None,
        }
    }

    fn stop_sequences(self, model: &str) -> Vec<String> {
        let llama3 = model.to_ascii_lowercase().contains("llama-3");
        match self {
            Self::Together if llama3 => vec![LLAMA3_END_OF_TURN.to_string()],
            _ => Vec::new(),
        }
    }
}

impl FromStr for Provider {
    type Err = ErpError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "together" => Ok(Self::Together),
            "openai" => Ok(Self::OpenAi),
            "ollama" => Ok(Self::Ollama),
            other => Err(ErpError::Config(format!("Unknown LLM provider: {other}"))),
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Together => "together",
            Self::OpenAi => "openai",
            Self::Ollama => "ollama",
        })
    }
}

#[derive(Serialize)]
struct ChatBody<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_completion_tokens: Option<u32>,
    #[serde(skip_serializing_if = "<[_]>::is_empty")]
    stop: &'a [String],
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: Role,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatReply {
    choices: Vec<ChatChoice>,
    model: String,
    usage: Option<WireUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ReplyMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct WireUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

/// Department agents and the corrective oracle both talk through this client.
pub struct ChatClient {
    provider: Provider,
    base_url: String,
    model: String,
    api_key: Option<String>,
    stop: Vec<String>,
    http: reqwest::Client,
}

impl ChatClient {
    /// `base_url` overrides the provider's endpoint and includes the version
    /// segment, e.g. `http://gateway:8080/v1`.
    pub fn new(
        provider: Provider,
        base_url: Option<&str>,
        model: impl Into<String>,
        api_key: Option<String>,
    ) -> Self {
        let model = model.into();
        let base_url = base_url
            .unwrap_or(provider.default_url())
            .trim_end_matches('/')
            .to_string();
        Self {
            stop: provider.stop_sequences(&model),
            provider,
            base_url,
            model,
            api_key,
            http: reqwest::Client::new(),
        }
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn body<'a>(&'a self, request: &'a LlmRequest) -> ChatBody<'a> {
        let system = request.system_prompt.as_deref().map(|content| WireMessage {
            role: Role::System,
            content,
        });
        let turns = request.messages.iter().map(|m| WireMessage {
            role: m.role,
            content: &m.content,
        });
        let (max_tokens, max_completion_tokens) = match self.provider {
            Provider::OpenAi => (None, request.max_tokens),
            Provider::Together | Provider::Ollama => (request.max_tokens, None),
        };
        ChatBody {
            model: &self.model,
            messages: system.into_iter().chain(turns).collect(),
            temperature: request.temperature,
            max_tokens,
            max_completion_tokens,
            stop: &self.stop,
        }
    }

    /// Strip a stop sequence the backend echoed at the end of the reply.
    fn clean(&self, content: &str) -> String {
        let mut text = content.trim();
        for stop in &self.stop {
            text = text.strip_suffix(stop.as_str()).unwrap_or(text).trim_end();
        }
        text.to_string()
    }
}

#[async_trait]
impl LlmClient for ChatClient {
    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse> {
        let url = format!("{}/chat/completions", self.base_url);
        let mut http_req = self.http.post(&url).json(&self.body(&request));
        if let Some(key) = &self.api_key {
            http_req = http_req.bearer_auth(key);
        }

        let response = http_req
            .send()
            .await
            .map_err(|e| ErpError::Llm(format!("{} request failed: {e}", self.provider)))?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(ErpError::Llm(format!(
                "{} API error {status}: {detail}",
                self.provider
            )));
        }

        let ChatReply {
            choices,
            model,
            usage,
        } = response.json().await.map_err(|e| {
            ErpError::Llm(format!("failed to parse {} reply: {e}", self.provider))
        })?;
        let choice = choices
            .into_iter()
            .next()
            .ok_or_else(|| ErpError::Llm(format!("{} returned no choices", self.provider)))?;

        let usage = usage.map(|u| TokenUsage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
        });
        debug!(
            provider = %self.provider,
            model = %model,
            tokens = usage.as_ref().map(TokenUsage::total),
            "Chat reply received"
        );
        Ok(LlmResponse {
            content: self.clean(choice.message.content.as_deref().unwrap_or_default()),
            model,
            usage,
            finish_reason: choice.finish_reason,
        })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body_json(client: &ChatClient, request: &LlmRequest) -> serde_json::Value {
        serde_json::to_value(client.body(request)).unwrap()
    }

    #[test]
    fn together_llama3_stops_at_end_of_turn() {
        let client = ChatClient::new(
            Provider::Together,
            None,
            "meta-llama/Llama-3-70b-chat-hf",
            None,
        );
        let request = LlmRequest::prompt("Which invoices are unpaid?")
            .with_system("You are the Accounts assistant.")
            .with_sampling(0.3, 1024);
        let json = body_json(&client, &request);

        assert_eq!(json["model"], "meta-llama/Llama-3-70b-chat-hf");
        assert_eq!(json["max_tokens"], 1024);
        assert!(json.get("max_completion_tokens").is_none());
        assert_eq!(json["stop"], serde_json::json!([LLAMA3_END_OF_TURN]));

        let messages = json["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[0]["content"], "You are the Accounts assistant.");
        assert_eq!(messages[1]["role"], "user");
        assert_eq!(messages[1]["content"], "Which invoices are unpaid?");
    }

    #[test]
    fn openai_names_the_completion_budget() {
        let client = ChatClient::new(Provider::OpenAi, None, "gpt-4o-mini", None);
        let request = LlmRequest::prompt("suggest amount").with_sampling(0.3, 256);
        let json = body_json(&client, &request);

        assert_eq!(json["max_completion_tokens"], 256);
        assert!(json.get("max_tokens").is_none());
        assert!(json.get("stop").is_none());
    }

    #[test]
    fn ollama_body_leaves_sampling_to_the_server() {
        let client = ChatClient::new(Provider::Ollama, None, "llama3", None);
        let json = body_json(&client, &LlmRequest::prompt("Show stock levels"));

        assert_eq!(json["messages"].as_array().unwrap().len(), 1);
        assert!(json.get("temperature").is_none());
        assert!(json.get("max_tokens").is_none());
        assert!(json.get("stop").is_none());
    }

    #[test]
    fn echoed_end_of_turn_is_stripped() {
        let client = ChatClient::new(
            Provider::Together,
            None,
            "meta-llama/Llama-3-8b-chat-hf",
            None,
        );
        assert_eq!(
            client.clean("{\"operation\": \"get_sales_data\"}<|eot_id|>\n"),
            "{\"operation\": \"get_sales_data\"}"
        );

        let plain = ChatClient::new(Provider::Ollama, None, "llama3", None);
        assert_eq!(plain.clean("  Stock is fine<|eot_id|>"), "Stock is fine<|eot_id|>");
    }

    #[test]
    fn endpoint_follows_provider_unless_overridden() {
        let local = ChatClient::new(Provider::Ollama, None, "llama3", None);
        assert_eq!(local.base_url(), "http://localhost:11434/v1");

        let gateway = ChatClient::new(
            Provider::Together,
            Some("http://gateway.internal/v1/"),
            "m",
            None,
        );
        assert_eq!(gateway.base_url(), "http://gateway.internal/v1");
        assert_eq!(gateway.provider(), Provider::Together);
    }

    #[test]
    fn provider_names_parse_case_insensitively() {
        assert_eq!("Together".parse::<Provider>().unwrap(), Provider::Together);
        assert_eq!(" OLLAMA ".parse::<Provider>().unwrap(), Provider::Ollama);
        assert_eq!(Provider::OpenAi.to_string(), "openai");
        assert_eq!(Provider::Ollama.key_var(), None);
        assert!(matches!(
            "gemini".parse::<Provider>(),
            Err(ErpError::Config(msg)) if msg.contains("gemini")
        ));
    }
}
