//! Nearest-neighbor search over a persisted collection

use parking_lot::Mutex;
use serde::Serialize;
use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use super::embeddings::{cosine_similarity, EmbeddingProvider};
use super::error::IndexResult;
use super::explain::{RelevanceExplainer, RelevantFile};
use super::parser::UnitKind;
use super::store::{CollectionStore, StoredChunk};

/// One search hit
#[derive(Debug, Clone, Serialize)]
pub struct RetrievedChunk {
    pub file_path: String,
    pub definition_name: Option<String>,
    pub kind: UnitKind,
    pub chunk_index: usize,
    pub text: String,
    pub score: f32,
}

impl RetrievedChunk {
    /// `path` for file chunks, `path:name` for definition chunks
    pub fn display_path(&self) -> String {
        match &self.definition_name {
            Some(name) => format!("{}:{}", self.file_path, name),
            None => self.file_path.clone(),
        }
    }
}

/// Handle to one collection, bound to the embedding provider it was built with
pub struct Retriever {
    collection: String,
    location: PathBuf,
    store: Option<Mutex<CollectionStore>>,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl Retriever {
    pub(crate) fn new(
        collection: &str,
        store: CollectionStore,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        Self {
            collection: collection.to_string(),
            location: store.dir().to_path_buf(),
            store: Some(Mutex::new(store)),
            embedder,
        }
    }

    /// A collection with nothing in it; every search returns no results
    pub(crate) fn empty(
        collection: &str,
        location: &Path,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        Self {
            collection: collection.to_string(),
            location: location.to_path_buf(),
            store: None,
            embedder,
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn location(&self) -> &Path {
        &self.location
    }

    /// Top `k` chunks by cosine similarity, ties kept in insertion order
    pub async fn search(&self, query: &str, k: usize) -> IndexResult<Vec<RetrievedChunk>> {
        let Some(store) = &self.store else {
            return Ok(Vec::new());
        };
        if k == 0 {
            return Ok(Vec::new());
        }

        let candidates = store.lock().load_all()?;
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let query_embedding = self.embedder.embed_query(query).await?;
        let results = top_k(&query_embedding, candidates, k);
        debug!(
            "Search in {} returned {} results for {:?}",
            self.collection,
            results.len(),
            query
        );
        Ok(results)
    }

    /// Search, then annotate every hit with a generated explanation
    pub async fn search_explained(
        &self,
        query: &str,
        k: usize,
        explainer: &RelevanceExplainer,
    ) -> IndexResult<Vec<RelevantFile>> {
        let results = self.search(query, k).await?;
        explainer.explain(query, k, &results).await
    }
}

fn top_k(query: &[f32], candidates: Vec<StoredChunk>, k: usize) -> Vec<RetrievedChunk> {
    let mut scored: Vec<(f32, StoredChunk)> = candidates
        .into_iter()
        .map(|c| (cosine_similarity(query, &c.embedding), c))
        .collect();
    // stable sort keeps insertion order among equal scores
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));
    scored.truncate(k);

    scored
        .into_iter()
        .map(|(score, c)| RetrievedChunk {
            file_path: c.file_path,
            definition_name: c.definition_name,
            kind: c.kind,
            chunk_index: c.chunk_index,
            text: c.text,
            score,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored(path: &str, embedding: Vec<f32>) -> StoredChunk {
        StoredChunk {
            file_path: path.to_string(),
            definition_name: None,
            kind: UnitKind::File,
            chunk_index: 0,
            offset: 0,
            text: String::new(),
            embedding,
        }
    }

    #[test]
    fn test_top_k_orders_by_score_then_insertion() {
        let candidates = vec![
            stored("low.py", vec![0.0, 1.0]),
            stored("tie_a.py", vec![1.0, 1.0]),
            stored("best.py", vec![1.0, 0.0]),
            stored("tie_b.py", vec![1.0, 1.0]),
        ];
        let results = top_k(&[1.0, 0.0], candidates, 3);
        let paths: Vec<_> = results.iter().map(|r| r.file_path.as_str()).collect();
        assert_eq!(paths, vec!["best.py", "tie_a.py", "tie_b.py"]);
        assert!(results[0].score > results[1].score);
    }

    #[test]
    fn test_display_path() {
        let mut hit = RetrievedChunk {
            file_path: "a.py".to_string(),
            definition_name: None,
            kind: UnitKind::File,
            chunk_index: 0,
            text: String::new(),
            score: 1.0,
        };
        assert_eq!(hit.display_path(), "a.py");
        hit.definition_name = Some("foo".to_string());
        hit.kind = UnitKind::Definition;
        assert_eq!(hit.display_path(), "a.py:foo");
    }
}
