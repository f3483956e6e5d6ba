//! Application configuration.
//!
//! Every section is optional; missing keys take their defaults. API keys are
//! best left to the environment (`TOGETHER_API_KEY`, `OPENAI_API_KEY`).

use std::path::{Path, PathBuf};
use std::time::Duration;

use erpmind_agents::AgentSettings;
use erpmind_llm::LlmConfig;
use erpmind_memory::{ContextConfig, EmbeddingConfig};
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub embedding: EmbeddingConfig,
    pub memory: MemorySection,
    pub agent: AgentSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemorySection {
    /// Directory for `context_<Department>` snapshots.
    pub context_dir: PathBuf,
    pub use_hnsw: bool,
    /// Prior interactions shown with each query.
    pub context_k: usize,
}

impl Default for MemorySection {
    fn default() -> Self {
        Self {
            context_dir: PathBuf::from("context_data"),
            use_hnsw: true,
            context_k: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSection {
    pub timeout_secs: u64,
    /// Seed for the synthetic ERP data.
    pub seed: u64,
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            timeout_secs: 45,
            seed: 42,
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();

        #[cfg(unix)]
        validate_config_file_permissions(path)?;

        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path.display(), e))?;
        let config = Self::from_toml(&content)?;

        if config.llm.api_key.is_some() || config.embedding.api_key.is_some() {
            warn!(
                "API key found in config file '{}'. Prefer environment variables \
                 (TOGETHER_API_KEY, OPENAI_API_KEY).",
                path.display()
            );
        }
        Ok(config)
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn context_config(&self) -> ContextConfig {
        ContextConfig::new(self.embedding.dimension, self.memory.use_hnsw)
    }

    pub fn agent_settings(&self) -> AgentSettings {
        AgentSettings {
            context_dir: self.memory.context_dir.clone(),
            context_k: self.memory.context_k,
            timeout: Duration::from_secs(self.agent.timeout_secs),
            temperature: self.llm.temperature,
            max_tokens: self.llm.max_tokens,
        }
    }
}

/// Reject config files other users could tamper with or read keys from.
#[cfg(unix)]
fn validate_config_file_permissions(path: &Path) -> anyhow::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let metadata = std::fs::metadata(path)
        .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path.display(), e))?;
    if !metadata.is_file() {
        anyhow::bail!("Config path '{}' is not a regular file", path.display());
    }

    let permission_bits = metadata.permissions().mode() & 0o777;
    if permission_bits & 0o002 != 0 {
        anyhow::bail!(
            "Config file '{}' is world-writable (mode {:04o}). Fix with: chmod o-w {}",
            path.display(),
            permission_bits,
            path.display()
        );
    }

    let content = std::fs::read_to_string(path).unwrap_or_default();
    if content.contains("api_key") && permission_bits & 0o004 != 0 {
        anyhow::bail!(
            "Config file '{}' contains an API key but is world-readable (mode {:04o}). \
             Fix with: chmod 600 {}",
            path.display(),
            permission_bits,
            path.display()
        );
    }
    Ok(())
}
