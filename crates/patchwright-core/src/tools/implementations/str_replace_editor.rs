//! str_replace_editor - view, create, and edit files with undo

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::edit::{EditError, FileEditor};
use crate::tools::registry::{Tool, ToolResult};

pub struct StrReplaceEditorTool {
    editor: Arc<Mutex<FileEditor>>,
}

impl StrReplaceEditorTool {
    pub fn new(editor: Arc<Mutex<FileEditor>>) -> Self {
        Self { editor }
    }
}

#[derive(Deserialize)]
struct Params {
    command: String,
    path: String,
    #[serde(default)]
    file_text: Option<String>,
    #[serde(default)]
    old_str: Option<String>,
    #[serde(default)]
    new_str: Option<String>,
    #[serde(default)]
    insert_line: Option<i64>,
    #[serde(default)]
    view_range: Option<Vec<i64>>,
}

fn required<T>(value: Option<T>, name: &str, command: &str) -> Result<T, EditError> {
    value.ok_or_else(|| {
        EditError::invalid(format!(
            "Parameter `{}` is required for command: {}",
            name, command
        ))
    })
}

impl Params {
    fn run(self, editor: &mut FileEditor) -> Result<String, EditError> {
        let command = self.command.as_str();
        match command {
            "view" => {
                let range = match self.view_range {
                    None => None,
                    Some(r) if r.len() == 2 => Some([r[0], r[1]]),
                    Some(_) => {
                        return Err(EditError::invalid(
                            "Invalid `view_range`. It should be a list of two integers.",
                        ))
                    }
                };
                editor.view(&self.path, range)
            }
            "create" => {
                let text = required(self.file_text, "file_text", command)?;
                editor.create(&self.path, &text)
            }
            "str_replace" => {
                let old = required(self.old_str, "old_str", command)?;
                let new = self.new_str.unwrap_or_default();
                editor.str_replace(&self.path, &old, &new)
            }
            "insert" => {
                let line = required(self.insert_line, "insert_line", command)?;
                let text = required(self.new_str, "new_str", command)?;
                editor.insert(&self.path, line, &text)
            }
            "undo_edit" => editor.undo(&self.path),
            other => Err(EditError::invalid(format!(
                "Unrecognized command {}. The allowed commands are: view, create, str_replace, insert, undo_edit",
                other
            ))),
        }
    }
}

#[async_trait]
impl Tool for StrReplaceEditorTool {
    fn name(&self) -> &str {
        "str_replace_editor"
    }

    fn description(&self) -> &str {
        "Custom editing tool for viewing, creating and editing files. \
         `view` shows a file with `cat -n` line numbers (optionally only `view_range`) or lists a directory up to 2 levels deep. \
         `create` cannot be used if `path` already exists. \
         `str_replace` replaces `old_str`, which must match EXACTLY ONE location in the file including whitespace; \
         include enough surrounding context to make it unique. \
         `insert` adds `new_str` after line `insert_line` (0 inserts at the top). \
         `undo_edit` reverts the last edit made to the file at `path`. \
         Long outputs are truncated and marked with `<response clipped>`."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "enum": ["view", "create", "str_replace", "insert", "undo_edit"],
                    "description": "The command to run"
                },
                "path": {
                    "type": "string",
                    "description": "File or directory path, relative to the project root"
                },
                "file_text": {
                    "type": "string",
                    "description": "Required for `create`: content of the new file"
                },
                "old_str": {
                    "type": "string",
                    "description": "Required for `str_replace`: exact text to replace"
                },
                "new_str": {
                    "type": "string",
                    "description": "Replacement text for `str_replace` (empty deletes), or the text for `insert`"
                },
                "insert_line": {
                    "type": "integer",
                    "description": "Required for `insert`: `new_str` goes after this line"
                },
                "view_range": {
                    "type": "array",
                    "items": { "type": "integer" },
                    "description": "Optional for `view` on a file: [start, end], 1-based; end -1 means to the last line"
                }
            },
            "required": ["command", "path"]
        })
    }

    async fn execute(&self, params: Value) -> ToolResult {
        let params: Params = match serde_json::from_value(params) {
            Ok(p) => p,
            Err(e) => return ToolResult::invalid_params(format!("Invalid parameters: {}", e)),
        };

        let result = {
            let mut editor = self.editor.lock();
            params.run(&mut editor)
        };
        match result {
            Ok(output) => ToolResult::ok(output),
            Err(e) => e.into(),
        }
    }
}
