//! Tool trait, result envelope, and registry

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::edit::EditError;
use crate::index::IndexError;

/// Uniform envelope returned by every tool call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResult {
    pub ok: bool,
    pub output: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResult {
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            ok: true,
            output: output.into(),
            error: None,
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            output: String::new(),
            error: Some(message.into()),
        }
    }

    pub fn invalid_params(detail: impl std::fmt::Display) -> Self {
        Self::err(format!("InvalidParameterError: {}", detail))
    }
}

impl From<EditError> for ToolResult {
    fn from(e: EditError) -> Self {
        Self::err(format!("{}: {}", e.kind(), e))
    }
}

impl From<IndexError> for ToolResult {
    fn from(e: IndexError) -> Self {
        Self::err(format!("{}: {}", e.kind(), e))
    }
}

/// Tool schema as handed to a model
#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn parameters_schema(&self) -> Value;
    async fn execute(&self, params: Value) -> ToolResult;
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: RwLock<HashMap<String, Arc<dyn Tool>>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces any tool registered under the same name
    pub async fn register(&self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        debug!("Registered tool {}", name);
        self.tools.write().await.insert(name, tool);
    }

    pub async fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.read().await.get(name).cloned()
    }

    /// Sorted tool names
    pub async fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// Definitions sorted by name
    pub async fn definitions(&self) -> Vec<ToolDefinition> {
        let tools = self.tools.read().await;
        let mut defs: Vec<ToolDefinition> = tools
            .values()
            .map(|t| ToolDefinition {
                name: t.name().to_string(),
                description: t.description().to_string(),
                input_schema: t.parameters_schema(),
            })
            .collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    pub async fn execute(&self, name: &str, params: Value) -> ToolResult {
        let Some(tool) = self.get(name).await else {
            return ToolResult::err(format!("UnknownToolError: no tool named '{}'", name));
        };
        if !params.is_object() {
            return ToolResult::invalid_params("parameters must be a JSON object");
        }
        let result = tool.execute(params).await;
        debug!("Tool {} finished (ok={})", name, result.ok);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Echo;

    #[async_trait]
    impl Tool for Echo {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "Echo the text parameter"
        }
        fn parameters_schema(&self) -> Value {
            json!({"type": "object", "properties": {"text": {"type": "string"}}})
        }
        async fn execute(&self, params: Value) -> ToolResult {
            ToolResult::ok(params["text"].as_str().unwrap_or_default())
        }
    }

    #[tokio::test]
    async fn test_register_and_execute() {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(Echo)).await;

        assert_eq!(registry.list().await, vec!["echo"]);
        assert_eq!(registry.definitions().await[0].input_schema["type"], "object");

        let result = registry.execute("echo", json!({"text": "hi"})).await;
        assert_eq!(result, ToolResult::ok("hi"));
    }

    #[tokio::test]
    async fn test_unknown_tool_and_bad_params() {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(Echo)).await;

        let missing = registry.execute("nope", json!({})).await;
        assert!(!missing.ok);
        assert!(missing.error.unwrap().contains("nope"));

        let bad = registry.execute("echo", json!("text")).await;
        assert!(bad.error.unwrap().starts_with("InvalidParameterError"));
    }

    #[test]
    fn test_envelope_serialization() {
        let ok = serde_json::to_value(ToolResult::ok("done")).unwrap();
        assert_eq!(ok, json!({"ok": true, "output": "done"}));

        let err: ToolResult = EditError::NoHistory {
            path: "a.py".to_string(),
        }
        .into();
        let value = serde_json::to_value(err).unwrap();
        assert_eq!(value["ok"], false);
        assert!(value["error"]
            .as_str()
            .unwrap()
            .starts_with("NoHistoryError: No edit history found for a.py"));
    }
}
