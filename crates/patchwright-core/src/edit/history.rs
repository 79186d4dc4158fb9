//! Per-path undo stacks

use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Mutating operation that produced a history entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOperation {
    Create,
    StrReplace,
    Insert,
}

/// Content of a file before one mutation
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    /// `None` when the file did not exist before the operation
    pub previous: Option<String>,
    pub operation: EditOperation,
}

/// Undo stacks keyed by absolute path, created lazily on first mutation
#[derive(Debug, Default)]
pub struct EditHistory {
    stacks: HashMap<PathBuf, Vec<HistoryEntry>>,
}

impl EditHistory {
    pub fn push(&mut self, path: &Path, entry: HistoryEntry) {
        self.stacks.entry(path.to_path_buf()).or_default().push(entry);
    }

    pub fn pop(&mut self, path: &Path) -> Option<HistoryEntry> {
        self.stacks.get_mut(path).and_then(|stack| stack.pop())
    }

    /// Oldest first
    pub fn entries(&self, path: &Path) -> &[HistoryEntry] {
        self.stacks.get(path).map(Vec::as_slice).unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stacks_are_per_path_and_lifo() {
        let mut history = EditHistory::default();
        let a = Path::new("/p/a.py");
        let b = Path::new("/p/b.py");

        history.push(
            a,
            HistoryEntry {
                previous: None,
                operation: EditOperation::Create,
            },
        );
        history.push(
            a,
            HistoryEntry {
                previous: Some("v1".to_string()),
                operation: EditOperation::StrReplace,
            },
        );

        assert_eq!(history.entries(a).len(), 2);
        assert!(history.entries(b).is_empty());
        assert!(history.pop(b).is_none());

        let top = history.pop(a).unwrap();
        assert_eq!(top.operation, EditOperation::StrReplace);
        assert_eq!(top.previous.as_deref(), Some("v1"));
        assert!(history.pop(a).unwrap().previous.is_none());
        assert!(history.pop(a).is_none());
    }
}
