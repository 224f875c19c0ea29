use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::{Config, DEFAULT_BASE_URL};
use crate::insights::Insights;
use crate::prompts;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

/// Per-call overrides for `complete`. Unset fields fall back to the
/// configured defaults.
#[derive(Debug, Clone, Default)]
pub struct CompletionOptions {
    pub system_prompt: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

/// Client for an OpenAI-compatible chat-completions service.
pub struct CompletionClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
    temperature: f32,
    max_tokens: u32,
    system_prompt: String,
}

impl CompletionClient {
    /// Build a client from the loaded configuration. Fails when no API key is
    /// configured — completion mode cannot run without one.
    pub fn new(config: &Config) -> Result<Self> {
        let api_key = config
            .api_key
            .key
            .clone()
            .filter(|k| !k.is_empty())
            .context("API key não encontrada na configuração")?;

        let base_url = config
            .model
            .base_url
            .clone()
            .or_else(|| dotenv::var("LLM_BASE_URL").ok())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url,
            model: config.model.name.clone(),
            api_key,
            temperature: config.agent.temperature,
            max_tokens: config.agent.max_tokens,
            system_prompt: config.system_prompt().to_string(),
        })
    }

    /// Ask the model for a completion. Failures are absorbed into a
    /// user-facing error string with `success = false` — callers decide
    /// whether to fall back.
    pub async fn complete(&self, prompt: &str, opts: &CompletionOptions) -> (String, bool) {
        let temperature = opts.temperature.unwrap_or(self.temperature);
        let max_tokens = opts.max_tokens.unwrap_or(self.max_tokens);
        let system_prompt = opts.system_prompt.as_deref().unwrap_or(&self.system_prompt);
        let messages = build_messages(system_prompt, prompt);

        match self.request(&messages, temperature, max_tokens).await {
            Ok(answer) => (answer, true),
            Err(e) => {
                warn!("completion call failed: {e:#}");
                (
                    format!("Desculpe, ocorreu um erro ao processar sua solicitação: {e:#}"),
                    false,
                )
            }
        }
    }

    /// Ask the model to analyse one interaction, returning structured
    /// insights. Never fails: call or parse errors yield the fallback value.
    pub async fn extract_insights(&self, query: &str, answer: &str) -> Insights {
        let prompt = prompts::insight_prompt(query, answer);
        let messages = build_messages("", &prompt);

        // Low temperature keeps the analysis output consistent.
        match self.request(&messages, 0.3, 500).await {
            Ok(text) => Insights::from_llm_text(&text),
            Err(e) => {
                warn!("insight extraction failed: {e:#}");
                Insights::analysis_error(format!("{e:#}"))
            }
        }
    }

    /// Non-streaming chat completion against the configured endpoint.
    async fn request(
        &self,
        messages: &[Message],
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "temperature": temperature,
            "max_tokens": max_tokens,
        });

        debug!(model = %self.model, temperature, max_tokens, "sending completion request");

        let resp = self
            .client
            .post(resolve_endpoint(&self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .context("LLM request failed")?;
        let text = resp.text().await.context("Failed to read LLM response")?;
        let json: serde_json::Value =
            serde_json::from_str(&text).context("Failed to parse LLM JSON")?;

        // Extract content from choices[0].message.content (handle null)
        let content = json["choices"]
            .get(0)
            .and_then(|c| c["message"]["content"].as_str())
            .unwrap_or("")
            .trim()
            .to_string();

        Ok(content)
    }
}

/// Resolve the chat completions endpoint from a base URL that may or may not
/// already include the `/v1` segment.
fn resolve_endpoint(base_url: &str) -> String {
    let base = base_url.trim_end_matches('/');
    if base.ends_with("/chat/completions") {
        base.to_string()
    } else if base.ends_with("/v1") {
        format!("{}/chat/completions", base)
    } else {
        format!("{}/v1/chat/completions", base)
    }
}

/// Build the message list: optional system message first, then the user prompt.
fn build_messages(system_prompt: &str, prompt: &str) -> Vec<Message> {
    let mut messages = Vec::new();
    if !system_prompt.is_empty() {
        messages.push(Message {
            role: "system".to_string(),
            content: system_prompt.to_string(),
        });
    }
    messages.push(Message {
        role: "user".to_string(),
        content: prompt.to_string(),
    });
    messages
}
