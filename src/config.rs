use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::prompts;

pub const DEFAULT_MODEL: &str = "gpt-4o";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_DB_PATH: &str = "prompt_agent.db";

/// Application configuration, loaded once at startup and read-only afterwards.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api_key: ApiKeySection,
    #[serde(default)]
    pub model: ModelSection,
    #[serde(default)]
    pub agent: AgentSection,
    #[serde(default)]
    pub database: DatabaseSection,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiKeySection {
    /// Completion-service API key. Required only when LLM mode is active.
    pub key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelSection {
    #[serde(default = "default_model_name")]
    pub name: String,
    /// Explicit service base URL. When unset, the `LLM_BASE_URL` environment
    /// variable is consulted before falling back to the OpenAI default.
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AgentSection {
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Overrides the built-in internal prompt when set.
    pub system_prompt: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSection {
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_model_name() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    1000
}

fn default_db_path() -> String {
    DEFAULT_DB_PATH.to_string()
}

impl Default for ModelSection {
    fn default() -> Self {
        Self {
            name: default_model_name(),
            base_url: None,
        }
    }
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            system_prompt: None,
        }
    }
}

impl Default for DatabaseSection {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file. A file that exists but cannot be
    /// read or parsed is a startup error.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_yaml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// The system prompt driving LLM-mode answers: the configured override,
    /// or the built-in internal prompt.
    pub fn system_prompt(&self) -> &str {
        self.agent
            .system_prompt
            .as_deref()
            .unwrap_or(prompts::INTERNAL_PROMPT)
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.key.as_deref().is_some_and(|k| !k.is_empty())
    }
}
