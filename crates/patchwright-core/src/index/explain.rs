//! Natural-language explanations of why search results match a query

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};
use tracing::debug;

use super::error::{IndexError, IndexResult};
use super::retrieval::RetrievedChunk;
use crate::ai::GenerationClient;

static FENCED_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"```(?:[A-Za-z]+)?\s*([\s\S]*?)```").expect("fence pattern is valid")
});

const SYSTEM_PROMPT: &str =
    "You explain code search results to a software engineer. Respond with JSON only.";

/// One annotated search result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelevantFile {
    pub file_path: String,
    pub explanation: String,
}

#[derive(Deserialize)]
struct RelevantFileExplanations {
    relevant_file_explanations: Vec<RelevantFile>,
}

#[derive(Serialize)]
struct PromptEntry<'a> {
    file_path: String,
    code_snippet: &'a str,
}

pub struct RelevanceExplainer {
    client: Arc<dyn GenerationClient>,
}

impl RelevanceExplainer {
    pub fn new(client: Arc<dyn GenerationClient>) -> Self {
        Self { client }
    }

    /// One generation call covering every result, answered with exactly one
    /// explanation per distinct result path in result order. No results
    /// means no call.
    pub async fn explain(
        &self,
        query: &str,
        k: usize,
        results: &[RetrievedChunk],
    ) -> IndexResult<Vec<RelevantFile>> {
        if results.is_empty() {
            return Ok(Vec::new());
        }

        let prompt = build_prompt(query, k, results)?;
        let reply = self
            .client
            .call_simple(SYSTEM_PROMPT, &prompt)
            .await
            .map_err(|e| IndexError::GenerationService(format!("{:#}", e)))?;

        let explanations = align_with_results(parse_explanations(&reply)?, results)?;
        debug!(
            "Generated {} explanations for {} results",
            explanations.len(),
            results.len()
        );
        Ok(explanations)
    }
}

fn build_prompt(query: &str, k: usize, results: &[RetrievedChunk]) -> IndexResult<String> {
    let entries: Vec<PromptEntry> = results
        .iter()
        .map(|r| PromptEntry {
            file_path: r.display_path(),
            code_snippet: &r.text,
        })
        .collect();
    let listing = serde_json::to_string(&entries)
        .map_err(|e| IndexError::GenerationService(format!("Failed to encode results: {}", e)))?;

    Ok(format!(
        "Given a search term {query}, a vector database performing similarity search of embeddings \
         between the search term and code snippets of files and functions/methods in the project \
         returned {k} relevant documents. For each document, provide a description explaining why \
         the search term is relevant to the code retrieved from the database. Below is a list of \
         the filepaths and their corresponding code snippets in JSON format:\n\
         ```{listing}```\n\n\
         Only respond with your result as a list of JSON with the \"file_path\" key and the \
         \"explanation\" key for your corresponding explanation. An example of the format is below:\n\
         ```[{{\"file_path\": \"filepath1/file1.py\", \"explanation\": \"This file contains the \
         keyword \\\"UIButton\\\" from the search term\"}}]```"
    ))
}

/// Accepts a bare JSON array, the same inside a Markdown fence, or an object
/// wrapping it under `relevant_file_explanations`
fn parse_explanations(reply: &str) -> IndexResult<Vec<RelevantFile>> {
    let body = FENCED_BLOCK
        .captures(reply)
        .and_then(|c| c.get(1))
        .map_or(reply, |m| m.as_str())
        .trim();

    let invalid = |detail: String| {
        IndexError::GenerationService(format!(
            "Could not parse explanations ({}): {}",
            detail,
            truncate_for_error(reply)
        ))
    };

    let value: Value = serde_json::from_str(body).map_err(|e| invalid(e.to_string()))?;
    let explanations = if value.is_array() {
        serde_json::from_value::<Vec<RelevantFile>>(value).map_err(|e| invalid(e.to_string()))?
    } else {
        serde_json::from_value::<RelevantFileExplanations>(value)
            .map_err(|e| invalid(e.to_string()))?
            .relevant_file_explanations
    };

    if explanations.is_empty() {
        return Err(invalid("no explanations returned".to_string()));
    }
    Ok(explanations)
}

/// Reorder the reply to follow the results. Paths the search did not return
/// and results left unexplained are errors, never silently dropped.
fn align_with_results(
    explanations: Vec<RelevantFile>,
    results: &[RetrievedChunk],
) -> IndexResult<Vec<RelevantFile>> {
    let mut expected: Vec<String> = Vec::new();
    for result in results {
        let path = result.display_path();
        if !expected.contains(&path) {
            expected.push(path);
        }
    }

    let mut by_path: HashMap<String, String> = HashMap::new();
    for item in explanations {
        if !expected.contains(&item.file_path) {
            return Err(IndexError::GenerationService(format!(
                "Explanation names {} which is not among the search results",
                item.file_path
            )));
        }
        by_path.entry(item.file_path).or_insert(item.explanation);
    }

    let missing: Vec<&str> = expected
        .iter()
        .filter(|p| !by_path.contains_key(*p))
        .map(String::as_str)
        .collect();
    if !missing.is_empty() {
        return Err(IndexError::GenerationService(format!(
            "No explanation returned for {}",
            missing.join(", ")
        )));
    }

    Ok(expected
        .into_iter()
        .filter_map(|path| {
            by_path.remove(&path).map(|explanation| RelevantFile {
                file_path: path,
                explanation,
            })
        })
        .collect())
}

fn truncate_for_error(reply: &str) -> String {
    const LIMIT: usize = 200;
    match reply.char_indices().nth(LIMIT) {
        Some((i, _)) => format!("{}...", &reply[..i]),
        None => reply.to_string(),
    }
}
