//! One workspace session: an editor, an index engine, and a shell behind a registry

use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;

use super::implementations::{
    RunShellCmdTool, SearchRelevantFilesTool, StrReplaceEditorTool, ViewDirectoryTool,
};
use super::registry::{ToolRegistry, ToolResult};
use crate::ai::GenerationClient;
use crate::config::Config;
use crate::edit::FileEditor;
use crate::index::{CodebaseIndex, EmbeddingProvider, RelevanceExplainer};
use crate::workspace::WorkspaceContext;

pub struct ToolSession {
    editor: Arc<Mutex<FileEditor>>,
    index: Arc<CodebaseIndex>,
    registry: ToolRegistry,
}

impl ToolSession {
    pub async fn new(
        workspace: WorkspaceContext,
        config: &Config,
        embedder: Arc<dyn EmbeddingProvider>,
        generator: Arc<dyn GenerationClient>,
    ) -> Self {
        let editor = Arc::new(Mutex::new(FileEditor::new(
            workspace.clone(),
            config.editor.clone(),
        )));
        let index = Arc::new(CodebaseIndex::new(
            config.runtime_dir.clone(),
            config.index.clone(),
            embedder,
        ));

        let registry = ToolRegistry::new();
        registry
            .register(Arc::new(StrReplaceEditorTool::new(Arc::clone(&editor))))
            .await;
        registry
            .register(Arc::new(ViewDirectoryTool::new(Arc::clone(&editor))))
            .await;
        registry
            .register(Arc::new(SearchRelevantFilesTool::new(
                Arc::clone(&index),
                RelevanceExplainer::new(generator),
                workspace.current_project_root(),
            )))
            .await;
        registry
            .register(Arc::new(RunShellCmdTool::new(
                workspace.current_project_root(),
                config.shell.clone(),
            )))
            .await;

        Self {
            editor,
            index,
            registry,
        }
    }

    pub fn editor(&self) -> Arc<Mutex<FileEditor>> {
        Arc::clone(&self.editor)
    }

    pub fn index(&self) -> &CodebaseIndex {
        &self.index
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub async fn execute(&self, tool: &str, params: Value) -> ToolResult {
        self.registry.execute(tool, params).await
    }
}
