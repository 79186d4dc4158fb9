//! Index engine errors

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IndexError {
    /// Fatal: aborts index construction
    #[error("Index build failed: {0}")]
    BuildFailure(String),

    #[error("Embedding service error: {0}")]
    EmbeddingService(String),

    #[error("Generation service error: {0}")]
    GenerationService(String),

    #[error("Index storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// Grammar could not be loaded or a query failed to compile
    #[error("Parser error: {0}")]
    Parse(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl IndexError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::BuildFailure(_) => "BuildFailure",
            Self::EmbeddingService(_) => "EmbeddingServiceError",
            Self::GenerationService(_) => "GenerationServiceError",
            Self::Storage(_) => "StorageError",
            Self::Parse(_) => "ParseError",
            Self::Io { .. } => "IoError",
        }
    }

    pub(crate) fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type IndexResult<T> = std::result::Result<T, IndexError>;
