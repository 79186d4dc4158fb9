//! Non-streaming chat clients (OpenAI chat-completions or Anthropic messages)

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::config::GenerationConfig;

const ANTHROPIC_VERSION: &str = "2023-06-01";

#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Returns the reply text, trimmed
    async fn call_simple(&self, system_prompt: &str, user_message: &str) -> Result<String>;
}

pub fn create_client(config: &GenerationConfig) -> Result<Arc<dyn GenerationClient>> {
    Ok(Arc::new(HttpGenerationClient::new(config.clone())?))
}

/// Builds the HTTP client (and looks up its API key) on the first call, so
/// sessions that never search need no generation credentials
pub struct LazyGenerationClient {
    config: GenerationConfig,
    inner: OnceCell<Arc<dyn GenerationClient>>,
}

impl LazyGenerationClient {
    pub fn new(config: GenerationConfig) -> Self {
        Self {
            config,
            inner: OnceCell::new(),
        }
    }
}

#[async_trait]
impl GenerationClient for LazyGenerationClient {
    async fn call_simple(&self, system_prompt: &str, user_message: &str) -> Result<String> {
        let client = self
            .inner
            .get_or_try_init(|| async { create_client(&self.config) })
            .await?;
        client.call_simple(system_prompt, user_message).await
    }
}

pub struct HttpGenerationClient {
    http: reqwest::Client,
    config: GenerationConfig,
    api_key: String,
}

impl HttpGenerationClient {
    pub fn new(config: GenerationConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .with_context(|| format!("{} environment variable not set", config.api_key_env))?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            http,
            config,
            api_key,
        })
    }

    fn uses_openai_format(&self) -> bool {
        self.config.api_format == "openai"
    }

    fn build_request(&self) -> reqwest::RequestBuilder {
        let request = self.http.post(&self.config.api_url);
        if self.uses_openai_format() {
            request.header("Authorization", format!("Bearer {}", self.api_key))
        } else {
            request
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
        }
    }

    async fn send(&self, body: Value) -> Result<Value> {
        let response = self
            .build_request()
            .json(&body)
            .send()
            .await
            .context("Generation request failed")?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            bail!("Generation API error {}: {}", status, text);
        }
        response
            .json()
            .await
            .context("Generation response was not JSON")
    }

    async fn call_simple_openai(&self, system_prompt: &str, user_message: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.config.model,
            "max_tokens": self.config.max_tokens,
            "messages": [
                {"role": "system", "content": system_prompt},
                {"role": "user", "content": user_message}
            ]
        });
        let json = self.send(body).await?;
        Ok(openai_text(&json))
    }

    async fn call_simple_anthropic(
        &self,
        system_prompt: &str,
        user_message: &str,
    ) -> Result<String> {
        let body = serde_json::json!({
            "model": self.config.model,
            "max_tokens": self.config.max_tokens,
            "system": system_prompt,
            "messages": [{
                "role": "user",
                "content": user_message
            }]
        });
        let json = self.send(body).await?;
        Ok(anthropic_text(&json))
    }
}

#[async_trait]
impl GenerationClient for HttpGenerationClient {
    async fn call_simple(&self, system_prompt: &str, user_message: &str) -> Result<String> {
        debug!(
            "Generation call to {} ({} format)",
            self.config.model, self.config.api_format
        );
        if self.uses_openai_format() {
            return self.call_simple_openai(system_prompt, user_message).await;
        }
        self.call_simple_anthropic(system_prompt, user_message).await
    }
}

fn openai_text(json: &Value) -> String {
    json.get("choices")
        .and_then(|c| c.as_array())
        .and_then(|arr| arr.first())
        .and_then(|choice| choice.get("message"))
        .and_then(|msg| msg.get("content"))
        .and_then(|t| t.as_str())
        .unwrap_or("")
        .trim()
        .to_string()
}

/// Concatenation of all text blocks
fn anthropic_text(json: &Value) -> String {
    json.get("content")
        .and_then(|c| c.as_array())
        .map(|blocks| {
            blocks
                .iter()
                .filter_map(|block| block.get("text").and_then(|t| t.as_str()))
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default()
        .trim()
        .to_string()
}
