//! search_relevant_files - semantic code search with explanations

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::info;

use crate::index::{CodebaseIndex, IndexResult, RelevanceExplainer, Retriever};
use crate::tools::registry::{Tool, ToolResult};

pub struct SearchRelevantFilesTool {
    index: Arc<CodebaseIndex>,
    explainer: RelevanceExplainer,
    project_root: PathBuf,
    /// Built or loaded on first use, then reused for the session
    retriever: OnceCell<Retriever>,
}

impl SearchRelevantFilesTool {
    pub fn new(
        index: Arc<CodebaseIndex>,
        explainer: RelevanceExplainer,
        project_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            index,
            explainer,
            project_root: project_root.into(),
            retriever: OnceCell::new(),
        }
    }

    async fn retriever(&self) -> IndexResult<&Retriever> {
        self.retriever
            .get_or_try_init(|| async {
                let collection = self.index.default_collection();
                info!(
                    "Preparing collection {} for {}",
                    collection,
                    self.project_root.display()
                );
                self.index.build(&self.project_root, collection).await
            })
            .await
    }
}

#[derive(Deserialize)]
struct Params {
    query: String,
    #[serde(default = "default_k")]
    k: usize,
}

fn default_k() -> usize {
    10
}

#[async_trait]
impl Tool for SearchRelevantFilesTool {
    fn name(&self) -> &str {
        "search_relevant_files"
    }

    fn description(&self) -> &str {
        "Given a query search string (for example, the issue report description, filenames, etc.), \
         search for relevant code snippets of files and functions in the project by embedding \
         similarity. Returns a JSON list of {file_path, explanation}; definition hits use \
         `path:name` as file_path. The project is indexed on first use."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Search string used to find relevant files and functions"
                },
                "k": {
                    "type": "integer",
                    "minimum": 1,
                    "description": "Number of results (default: 10)"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, params: Value) -> ToolResult {
        let params: Params = match serde_json::from_value(params) {
            Ok(p) => p,
            Err(e) => return ToolResult::invalid_params(format!("Invalid parameters: {}", e)),
        };

        let retriever = match self.retriever().await {
            Ok(r) => r,
            Err(e) => return e.into(),
        };
        match retriever
            .search_explained(&params.query, params.k, &self.explainer)
            .await
        {
            Ok(explanations) => match serde_json::to_string_pretty(&explanations) {
                Ok(output) => ToolResult::ok(output),
                Err(e) => ToolResult::err(format!("SerializationError: {}", e)),
            },
            Err(e) => e.into(),
        }
    }
}
