//! Offline stand-ins for generation calls

use anyhow::{bail, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use super::GenerationClient;

/// Explains every result the prompt lists, echoing its file path
#[derive(Default)]
pub struct EchoExplainer {
    pub calls: Mutex<usize>,
}

#[async_trait]
impl GenerationClient for EchoExplainer {
    async fn call_simple(&self, _system_prompt: &str, user_message: &str) -> Result<String> {
        *self.calls.lock() += 1;
        // results are the first fenced block of the prompt
        let Some(listing) = user_message.split("```").nth(1) else {
            bail!("prompt has no fenced results");
        };
        let results: Vec<Value> = serde_json::from_str(listing)?;

        let explanations: Vec<Value> = results
            .iter()
            .map(|r| {
                serde_json::json!({
                    "file_path": r["file_path"],
                    "explanation": format!("{} defines the requested behavior", r["file_path"].as_str().unwrap_or("")),
                })
            })
            .collect();
        Ok(format!("```json\n{}\n```", serde_json::to_string_pretty(&explanations)?))
    }
}

/// Answers every call with the same text
pub struct CannedReply(String);

impl CannedReply {
    pub fn new(reply: &str) -> Self {
        Self(reply.to_string())
    }
}

#[async_trait]
impl GenerationClient for CannedReply {
    async fn call_simple(&self, _system_prompt: &str, _user_message: &str) -> Result<String> {
        Ok(self.0.clone())
    }
}

/// Always fails
pub struct FailingGenerator;

#[async_trait]
impl GenerationClient for FailingGenerator {
    async fn call_simple(&self, _system_prompt: &str, _user_message: &str) -> Result<String> {
        bail!("service unavailable")
    }
}
