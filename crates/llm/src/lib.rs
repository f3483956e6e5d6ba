pub mod chat;
pub mod client;
pub mod config;
pub mod oracle;
pub mod retry;

pub use chat::{ChatClient, Provider};
pub use client::{ChatMessage, LlmClient, LlmRequest, LlmResponse, Role, TokenUsage};
pub use config::{LlmConfig, SemaphoredClient, build_llm_client};
pub use oracle::LlmOracle;
pub use retry::{RetryConfig, RetryingClient};
