//! Grammar-aware splitting of source files into code units via tree-sitter

use serde::{Deserialize, Serialize};
use streaming_iterator::StreamingIterator;
use tree_sitter::{Parser, Query, QueryCursor};

use super::error::{IndexError, IndexResult};
use super::languages::LanguageSpec;

/// Granularity of a code unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitKind {
    File,
    Definition,
}

impl UnitKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Definition => "definition",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "file" => Some(Self::File),
            "definition" => Some(Self::Definition),
            _ => None,
        }
    }
}

/// A whole file, or the source span of one function/method/constructor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeUnit {
    /// Relative to the project root, `/`-separated
    pub file_path: String,
    pub name: Option<String>,
    pub kind: UnitKind,
    pub text: String,
}

/// Parser for one language; reusable across files
pub struct DefinitionParser {
    parser: Parser,
    /// One query per definition kind, in registry order
    queries: Vec<Query>,
}

impl DefinitionParser {
    pub fn new(spec: &LanguageSpec) -> IndexResult<Self> {
        let mut parser = Parser::new();
        parser
            .set_language(&spec.language)
            .map_err(|e| IndexError::Parse(format!("Failed to set {} language: {}", spec.name, e)))?;

        let queries = spec
            .definition_kinds
            .iter()
            .map(|kind| {
                let source = format!("({} name: (_) @name) @definition", kind);
                Query::new(&spec.language, &source).map_err(|e| {
                    IndexError::Parse(format!("Failed to compile {} query for {}: {}", kind, spec.name, e))
                })
            })
            .collect::<IndexResult<Vec<_>>>()?;

        Ok(Self { parser, queries })
    }

    /// The file unit followed by every named definition, grouped by kind in
    /// registry order and in source order within a kind
    pub fn parse_units(&mut self, file_path: &str, source: &str) -> IndexResult<Vec<CodeUnit>> {
        let mut units = vec![CodeUnit {
            file_path: file_path.to_string(),
            name: None,
            kind: UnitKind::File,
            text: source.to_string(),
        }];

        let tree = self
            .parser
            .parse(source, None)
            .ok_or_else(|| IndexError::Parse(format!("Failed to parse {}", file_path)))?;
        let root = tree.root_node();

        for query in &self.queries {
            let (Some(name_idx), Some(def_idx)) = (
                query.capture_index_for_name("name"),
                query.capture_index_for_name("definition"),
            ) else {
                continue;
            };

            let mut cursor = QueryCursor::new();
            let mut matches = cursor.matches(query, root, source.as_bytes());
            while let Some(match_) = matches.next() {
                let mut name = None;
                let mut span = None;
                for capture in match_.captures.iter() {
                    if capture.index == name_idx {
                        name = capture.node.utf8_text(source.as_bytes()).ok();
                    } else if capture.index == def_idx {
                        span = Some(capture.node.byte_range());
                    }
                }

                let (Some(name), Some(span)) = (name, span) else {
                    continue;
                };
                if name.is_empty() {
                    continue;
                }

                units.push(CodeUnit {
                    file_path: file_path.to_string(),
                    name: Some(name.to_string()),
                    kind: UnitKind::Definition,
                    text: source[span].to_string(),
                });
            }
        }

        Ok(units)
    }
}
