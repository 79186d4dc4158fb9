//! Edit engine error taxonomy

use thiserror::Error;

use crate::workspace::PathEscapeError;

#[derive(Debug, Error)]
pub enum EditError {
    #[error("The path {path} does not exist. Please provide a valid path.")]
    NotFound { path: String },

    #[error("File already exists at: {path}. Cannot overwrite files using command `create`.")]
    AlreadyExists { path: String },

    #[error(
        "No replacement was performed. old_str matches {count} locations in {path} (lines {lines}), must be unique.",
        count = .lines.len(),
        lines = join_lines(.lines)
    )]
    AmbiguousMatch { path: String, lines: Vec<usize> },

    #[error("No replacement was performed, old_str `{old}` did not appear verbatim in {path}.")]
    NoMatch { path: String, old: String },

    #[error("No replacement was performed: new_str is identical to old_str in {path}.")]
    NoOp { path: String },

    #[error("{message}")]
    Range { message: String },

    #[error("No edit history found for {path}.")]
    NoHistory { path: String },

    #[error(transparent)]
    PathEscape(#[from] PathEscapeError),

    #[error("{message}")]
    InvalidParameter { message: String },

    #[error("Failed to access {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl EditError {
    /// Stable name of the violated precondition, used in tool envelopes
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NotFoundError",
            Self::AlreadyExists { .. } => "AlreadyExistsError",
            Self::AmbiguousMatch { .. } => "AmbiguousMatchError",
            Self::NoMatch { .. } => "NoMatchError",
            Self::NoOp { .. } => "NoOpError",
            Self::Range { .. } => "RangeError",
            Self::NoHistory { .. } => "NoHistoryError",
            Self::PathEscape(_) => "PathEscapeError",
            Self::InvalidParameter { .. } => "InvalidParameterError",
            Self::Io { .. } => "IoError",
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            message: message.into(),
        }
    }

    pub(crate) fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

fn join_lines(lines: &[usize]) -> String {
    lines
        .iter()
        .map(|l| l.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
