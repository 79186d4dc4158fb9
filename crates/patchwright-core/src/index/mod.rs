//! Codebase index and retrieval engine
//!
//! Turns a project's source files into embedded chunks persisted per
//! collection, and answers nearest-neighbor queries over them.
//!
//! Key components:
//! - `languages` - extension to tree-sitter grammar registry
//! - `parser` - file and definition units via tree-sitter queries
//! - `chunker` - overlapping, line-preferring chunking
//! - `embeddings` - OpenAI, fastembed, and hashed embedding providers
//! - `store` - SQLite persistence of one collection
//! - `codebase` - build orchestration and collection lifecycle
//! - `retrieval` - cosine top-k search
//! - `explain` - generated explanations for search results

pub mod chunker;
pub mod codebase;
pub mod embeddings;
pub mod error;
pub mod explain;
pub mod languages;
pub mod parser;
pub mod retrieval;
pub mod store;

pub use chunker::{chunk_text, reassemble, Chunk};
pub use codebase::CodebaseIndex;
pub use embeddings::{create_provider, EmbeddingProvider, HashedEmbedder};
pub use error::{IndexError, IndexResult};
pub use explain::{RelevanceExplainer, RelevantFile};
pub use languages::{LanguageRegistry, LanguageSpec};
pub use parser::{CodeUnit, DefinitionParser, UnitKind};
pub use retrieval::{RetrievedChunk, Retriever};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::testing::EchoExplainer;
    use crate::config::IndexConfig;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_search_finds_single_function() {
        let proj = TempDir::new().unwrap();
        std::fs::write(proj.path().join("a.py"), "def foo():\n    return 42\n").unwrap();
        let runtime = TempDir::new().unwrap();

        let index = CodebaseIndex::new(
            runtime.path(),
            IndexConfig::default(),
            Arc::new(HashedEmbedder::new(512)),
        );
        let retriever = index.build(proj.path(), "kb").await.unwrap();
        let explainer = RelevanceExplainer::new(Arc::new(EchoExplainer::default()));

        let results = retriever.search_explained("foo", 1, &explainer).await.unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].file_path == "a.py" || results[0].file_path == "a.py:foo");
        assert!(!results[0].explanation.is_empty());
    }
}
