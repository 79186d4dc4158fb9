//! view_directory - project structure listing

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::edit::FileEditor;
use crate::tools::registry::{Tool, ToolResult};

pub struct ViewDirectoryTool {
    editor: Arc<Mutex<FileEditor>>,
}

impl ViewDirectoryTool {
    pub fn new(editor: Arc<Mutex<FileEditor>>) -> Self {
        Self { editor }
    }
}

#[derive(Deserialize)]
struct Params {
    #[serde(default = "default_dir")]
    dir_path: String,
    #[serde(default)]
    depth: Option<usize>,
}

fn default_dir() -> String {
    "./".to_string()
}

#[async_trait]
impl Tool for ViewDirectoryTool {
    fn name(&self) -> &str {
        "view_directory"
    }

    fn description(&self) -> &str {
        "View the file structure of the project or one of its directories. \
         Directories end with `/`; hidden entries are skipped. \
         When the listing is too large the depth is reduced automatically and a note says so."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "dir_path": {
                    "type": "string",
                    "description": "Directory relative to the project root (default: ./)"
                },
                "depth": {
                    "type": "integer",
                    "minimum": 0,
                    "description": "Levels below dir_path to include (0 = direct children). Unlimited if omitted."
                }
            }
        })
    }

    async fn execute(&self, params: Value) -> ToolResult {
        let params: Params = match serde_json::from_value(params) {
            Ok(p) => p,
            Err(e) => return ToolResult::invalid_params(format!("Invalid parameters: {}", e)),
        };

        let result = self
            .editor
            .lock()
            .view_directory(&params.dir_path, params.depth);
        match result {
            Ok(listing) => ToolResult::ok(listing),
            Err(e) => e.into(),
        }
    }
}
