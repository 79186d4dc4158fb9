//! Structural edit engine
//!
//! Exact, uniqueness-checked string replacement and line insertion on files
//! inside the workspace, with a per-path undo stack. Every operation either
//! fully succeeds or leaves the file untouched: writes go to a sibling
//! temporary file that is renamed over the target.
//!
//! Key components:
//! - `error` - the failure taxonomy returned to callers
//! - `history` - undo stacks keyed by path
//! - `render` - `cat -n` rendering, snippets, truncation
//! - `listing` - project structure listing with depth reduction

pub mod error;
pub mod history;
pub mod listing;
pub mod render;

pub use error::EditError;
pub use history::{EditHistory, EditOperation, HistoryEntry};
pub use listing::{list_directory, DirectoryListing};

use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::config::EditorConfig;
use crate::workspace::WorkspaceContext;
use render::{
    directory_entries, number_lines, snippet, truncate, DIRECTORY_CONTENT_TRUNCATED_NOTICE,
    FILE_CONTENT_TRUNCATED_NOTICE,
};

type EditResult = Result<String, EditError>;

/// File editor owned by one workspace session
pub struct FileEditor {
    workspace: WorkspaceContext,
    limits: EditorConfig,
    history: EditHistory,
}

impl FileEditor {
    pub fn new(workspace: WorkspaceContext, limits: EditorConfig) -> Self {
        Self {
            workspace,
            limits,
            history: EditHistory::default(),
        }
    }

    /// Show a file with line numbers (optionally only `[start, end]`, 1-based,
    /// `end = -1` meaning the last line) or a shallow listing of a directory
    pub fn view(&self, path: &str, range: Option<[i64; 2]>) -> EditResult {
        let result = self.view_inner(path, range);
        self.trace("view", path, &result);
        result
    }

    /// Create a new file; fails if anything already exists at `path`
    pub fn create(&mut self, path: &str, text: &str) -> EditResult {
        let result = self.create_inner(path, text);
        self.trace("create", path, &result);
        result
    }

    /// Replace the single occurrence of `old` with `new`
    pub fn str_replace(&mut self, path: &str, old: &str, new: &str) -> EditResult {
        let result = self.str_replace_inner(path, old, new);
        self.trace("str_replace", path, &result);
        result
    }

    /// Insert `text` as new line(s) after 1-based line `after_line` (0 = top)
    pub fn insert(&mut self, path: &str, after_line: i64, text: &str) -> EditResult {
        let result = self.insert_inner(path, after_line, text);
        self.trace("insert", path, &result);
        result
    }

    /// Restore the content from before the most recent edit of `path`
    pub fn undo(&mut self, path: &str) -> EditResult {
        let result = self.undo_inner(path);
        self.trace("undo", path, &result);
        result
    }

    /// Project structure below `dir`, reducing depth to fit the entry limit
    pub fn view_directory(&self, dir: &str, depth: Option<usize>) -> EditResult {
        let full = self.workspace.resolve(dir)?;
        if !full.exists() {
            return Err(EditError::NotFound {
                path: dir.to_string(),
            });
        }
        if !full.is_dir() {
            return Err(EditError::invalid(format!("{} is not a directory", dir)));
        }
        let listing = list_directory(
            self.workspace.current_project_root(),
            &full,
            depth,
            self.limits.max_directory_entries,
        );
        Ok(listing.render())
    }

    /// Edits recorded for `path`, oldest first
    pub fn history(&self, path: &str) -> Result<&[HistoryEntry], EditError> {
        let full = self.workspace.resolve(path)?;
        Ok(self.history.entries(&full))
    }

    fn view_inner(&self, path: &str, range: Option<[i64; 2]>) -> EditResult {
        let full = self.resolve_existing(path)?;

        if full.is_dir() {
            if range.is_some() {
                return Err(EditError::invalid(
                    "The `view_range` parameter is not allowed when `path` points to a directory.",
                ));
            }
            let depth = self.limits.directory_view_depth;
            let entries = directory_entries(self.workspace.current_project_root(), &full, depth);
            let output = format!(
                "Here are the files and directories up to {} levels deep in {}, excluding hidden items:\n{}\n",
                depth,
                self.workspace.relative(&full),
                entries.join("\n")
            );
            return Ok(truncate(
                output,
                self.limits.max_response_chars,
                DIRECTORY_CONTENT_TRUNCATED_NOTICE,
            ));
        }

        let content = read_file(&full, path)?;
        let numbered = match range {
            None => number_lines(&content, 1),
            Some(range) => {
                let lines: Vec<&str> = content.split_inclusive('\n').collect();
                let (start, end) = validate_view_range(range, lines.len())?;
                number_lines(&lines[start - 1..end].concat(), start)
            }
        };

        Ok(truncate(
            numbered,
            self.limits.max_response_chars,
            FILE_CONTENT_TRUNCATED_NOTICE,
        ))
    }

    fn create_inner(&mut self, path: &str, text: &str) -> EditResult {
        let full = self.workspace.resolve(path)?;
        if full.exists() {
            return Err(EditError::AlreadyExists {
                path: path.to_string(),
            });
        }
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).map_err(|e| EditError::io(path, e))?;
        }

        write_atomic(&full, text).map_err(|e| EditError::io(path, e))?;
        self.history.push(
            &full,
            HistoryEntry {
                previous: None,
                operation: EditOperation::Create,
            },
        );

        Ok(format!(
            "File created successfully at: {}",
            self.workspace.relative(&full)
        ))
    }

    fn str_replace_inner(&mut self, path: &str, old: &str, new: &str) -> EditResult {
        let full = self.resolve_file(path)?;
        if old.is_empty() {
            return Err(EditError::invalid(
                "Parameter `old_str` must not be empty for command: str_replace",
            ));
        }
        if old == new {
            return Err(EditError::NoOp {
                path: path.to_string(),
            });
        }

        let content = read_file(&full, path)?;
        let positions = occurrences(&content, old);
        let start = match positions.as_slice() {
            [] => {
                return Err(EditError::NoMatch {
                    path: path.to_string(),
                    old: old.to_string(),
                })
            }
            [only] => *only,
            many => {
                return Err(EditError::AmbiguousMatch {
                    path: path.to_string(),
                    lines: many.iter().map(|&pos| line_of(&content, pos)).collect(),
                })
            }
        };

        let mut updated = String::with_capacity(content.len() + new.len());
        updated.push_str(&content[..start]);
        updated.push_str(new);
        updated.push_str(&content[start + old.len()..]);

        write_atomic(&full, &updated).map_err(|e| EditError::io(path, e))?;

        let first_line = line_of(&content, start) - 1;
        let span = new.matches('\n').count() + 1;
        self.history.push(
            &full,
            HistoryEntry {
                previous: Some(content),
                operation: EditOperation::StrReplace,
            },
        );

        Ok(self.edited_message(&full, &updated, first_line, span))
    }

    fn insert_inner(&mut self, path: &str, after_line: i64, text: &str) -> EditResult {
        let full = self.resolve_file(path)?;
        let content = read_file(&full, path)?;

        let lines: Vec<&str> = content.split_inclusive('\n').collect();
        let line_count = lines.len();
        if after_line < 0 || after_line as usize > line_count {
            return Err(EditError::Range {
                message: format!(
                    "Invalid `insert_line` parameter: {}. It should be within the range of lines of the file: [0, {}]",
                    after_line, line_count
                ),
            });
        }
        let after = after_line as usize;

        let mut updated = lines[..after].concat();
        if !updated.is_empty() && !updated.ends_with('\n') {
            updated.push('\n');
        }
        updated.push_str(text);
        let rest = lines[after..].concat();
        if !text.ends_with('\n') && (!rest.is_empty() || content.ends_with('\n')) {
            updated.push('\n');
        }
        updated.push_str(&rest);

        write_atomic(&full, &updated).map_err(|e| EditError::io(path, e))?;

        let span = text.split_inclusive('\n').count().max(1);
        self.history.push(
            &full,
            HistoryEntry {
                previous: Some(content),
                operation: EditOperation::Insert,
            },
        );

        Ok(self.edited_message(&full, &updated, after, span))
    }

    fn undo_inner(&mut self, path: &str) -> EditResult {
        let full = self.workspace.resolve(path)?;
        let entry = self.history.pop(&full).ok_or_else(|| EditError::NoHistory {
            path: path.to_string(),
        })?;
        let rel = self.workspace.relative(&full);

        let restored = match &entry.previous {
            Some(text) => write_atomic(&full, text),
            None if full.exists() => fs::remove_file(&full),
            None => Ok(()),
        };
        if let Err(e) = restored {
            self.history.push(&full, entry);
            return Err(EditError::io(path, e));
        }

        match entry.previous {
            Some(text) => Ok(truncate(
                format!(
                    "Last edit to {} undone successfully. Here's the result of running `cat -n` on {}:\n{}",
                    rel,
                    rel,
                    number_lines(&text, 1)
                ),
                self.limits.max_response_chars,
                FILE_CONTENT_TRUNCATED_NOTICE,
            )),
            None => Ok(format!(
                "Last edit to {} undone successfully. The file did not exist before it was created and has been removed.",
                rel
            )),
        }
    }

    fn edited_message(&self, full: &Path, updated: &str, first_line: usize, span: usize) -> String {
        let rel = self.workspace.relative(full);
        let window = snippet(
            updated,
            first_line,
            span,
            self.limits.snippet_context_lines,
        );
        format!(
            "The file {} has been edited. Here's the result of running `cat -n` on a snippet of {}:\n{}\nReview the changes and make sure they are as expected. Edit the file again if necessary.",
            rel, rel, window
        )
    }

    fn resolve_existing(&self, path: &str) -> Result<PathBuf, EditError> {
        let full = self.workspace.resolve(path)?;
        if !full.exists() {
            return Err(EditError::NotFound {
                path: path.to_string(),
            });
        }
        Ok(full)
    }

    fn resolve_file(&self, path: &str) -> Result<PathBuf, EditError> {
        let full = self.resolve_existing(path)?;
        if full.is_dir() {
            return Err(EditError::invalid(format!(
                "The path {} is a directory and only the `view` command can be used on directories",
                path
            )));
        }
        Ok(full)
    }

    fn trace(&self, op: &str, path: &str, result: &EditResult) {
        match result {
            Ok(_) => debug!("{} {} succeeded", op, path),
            Err(e) => debug!("{} {} rejected ({}): {}", op, path, e.kind(), e),
        }
    }
}

fn read_file(full: &Path, path: &str) -> Result<String, EditError> {
    fs::read_to_string(full).map_err(|e| EditError::io(path, e))
}

/// Write via a sibling temporary file so the target is never half-written
fn write_atomic(path: &Path, content: &str) -> std::io::Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let tmp = parent.join(format!(".{}.{}.tmp", name, uuid::Uuid::new_v4().simple()));

    fs::write(&tmp, content)?;
    if let Ok(meta) = fs::metadata(path) {
        if let Err(e) = fs::set_permissions(&tmp, meta.permissions()) {
            debug!(
                "Could not carry permissions of {} over to the rewrite: {}",
                path.display(),
                e
            );
        }
    }
    fs::rename(&tmp, path).inspect_err(|_| {
        let _ = fs::remove_file(&tmp);
    })
}

/// Byte offsets of every occurrence of `needle`, overlapping ones included
fn occurrences(haystack: &str, needle: &str) -> Vec<usize> {
    let mut found = Vec::new();
    let mut from = 0;
    while let Some(pos) = haystack[from..].find(needle) {
        let at = from + pos;
        found.push(at);
        let step = haystack[at..].chars().next().map_or(1, char::len_utf8);
        from = at + step;
        if from > haystack.len() {
            break;
        }
    }
    found
}

/// 1-based line containing byte offset `pos`
fn line_of(content: &str, pos: usize) -> usize {
    content[..pos].matches('\n').count() + 1
}

fn validate_view_range(range: [i64; 2], line_count: usize) -> Result<(usize, usize), EditError> {
    let [start, end] = range;
    let n = line_count as i64;
    if start < 1 || start > n {
        return Err(EditError::Range {
            message: format!(
                "Invalid `view_range`: [{}, {}]. Its first element `{}` should be within the range of lines of the file: [1, {}]",
                start, end, start, n
            ),
        });
    }
    if end == -1 {
        return Ok((start as usize, line_count));
    }
    if end > n {
        return Err(EditError::Range {
            message: format!(
                "Invalid `view_range`: [{}, {}]. Its second element `{}` should be smaller than the number of lines in the file: `{}`",
                start, end, end, n
            ),
        });
    }
    if end < start {
        return Err(EditError::Range {
            message: format!(
                "Invalid `view_range`: [{}, {}]. Its second element `{}` should be larger or equal than its first `{}`",
                start, end, end, start
            ),
        });
    }
    Ok((start as usize, end as usize))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn editor() -> (TempDir, FileEditor) {
        let dir = TempDir::new().unwrap();
        let ws = WorkspaceContext::open(dir.path()).unwrap();
        (dir, FileEditor::new(ws, EditorConfig::default()))
    }

    fn read(dir: &TempDir, rel: &str) -> String {
        fs::read_to_string(dir.path().join(rel)).unwrap()
    }

    #[test]
    fn test_create_then_view_round_trips() {
        let (_dir, mut ed) = editor();
        let text = "import os\n\ndef foo():\n\treturn 1\n";
        ed.create("pkg/a.py", text).unwrap();

        let view = ed.view("pkg/a.py", None).unwrap();
        assert_eq!(view, number_lines(text, 1));
        let stripped: String = view.split_inclusive('\n').map(|l| &l[7..]).collect();
        assert_eq!(stripped, text);
    }

    #[test]
    fn test_create_existing_fails_and_keeps_content() {
        let (dir, mut ed) = editor();
        fs::write(dir.path().join("a.py"), "original\n").unwrap();

        let err = ed.create("a.py", "replacement\n").unwrap_err();
        assert!(matches!(err, EditError::AlreadyExists { .. }));
        assert_eq!(read(&dir, "a.py"), "original\n");
        assert!(ed.history("a.py").unwrap().is_empty());
    }

    #[test]
    fn test_str_replace_and_undo_restore_exactly() {
        let (dir, mut ed) = editor();
        let original = "def foo():\n    return 1\n\ndef bar():\n    return 2\n";
        fs::write(dir.path().join("a.py"), original).unwrap();

        let out = ed.str_replace("a.py", "return 2", "return 42").unwrap();
        assert!(out.contains("has been edited"));
        assert!(out.contains("     5\t    return 42"));
        assert_eq!(
            read(&dir, "a.py"),
            original.replace("return 2", "return 42")
        );
        assert_eq!(
            ed.history("a.py").unwrap()[0].operation,
            EditOperation::StrReplace
        );

        ed.undo("a.py").unwrap();
        assert_eq!(read(&dir, "a.py"), original);
    }

    #[test]
    fn test_str_replace_no_match_and_ambiguous_leave_file() {
        let (dir, mut ed) = editor();
        let original = "x = 1\ny = 1\nx = 1\n";
        fs::write(dir.path().join("a.py"), original).unwrap();

        let err = ed.str_replace("a.py", "z = 1", "z = 2").unwrap_err();
        assert!(matches!(err, EditError::NoMatch { .. }));

        let err = ed.str_replace("a.py", "x = 1", "x = 2").unwrap_err();
        match &err {
            EditError::AmbiguousMatch { lines, .. } => assert_eq!(lines, &vec![1, 3]),
            other => panic!("expected AmbiguousMatch, got {:?}", other),
        }
        assert!(err.to_string().contains("matches 2 locations"));

        assert_eq!(read(&dir, "a.py"), original);
        assert!(matches!(
            ed.undo("a.py").unwrap_err(),
            EditError::NoHistory { .. }
        ));
    }

    #[test]
    fn test_str_replace_counts_overlapping_matches() {
        let (dir, mut ed) = editor();
        fs::write(dir.path().join("a.txt"), "aaa").unwrap();
        let err = ed.str_replace("a.txt", "aa", "b").unwrap_err();
        assert!(matches!(err, EditError::AmbiguousMatch { .. }));
    }

    #[test]
    fn test_str_replace_noop_and_empty_old() {
        let (dir, mut ed) = editor();
        fs::write(dir.path().join("a.py"), "x = 1\n").unwrap();
        assert!(matches!(
            ed.str_replace("a.py", "x = 1", "x = 1").unwrap_err(),
            EditError::NoOp { .. }
        ));
        assert!(matches!(
            ed.str_replace("a.py", "", "y").unwrap_err(),
            EditError::InvalidParameter { .. }
        ));
    }

    #[test]
    fn test_insert_positions() {
        let (dir, mut ed) = editor();
        fs::write(dir.path().join("a.py"), "a\nb\n").unwrap();

        ed.insert("a.py", 0, "top").unwrap();
        assert_eq!(read(&dir, "a.py"), "top\na\nb\n");

        ed.insert("a.py", 2, "mid1\nmid2").unwrap();
        assert_eq!(read(&dir, "a.py"), "top\na\nmid1\nmid2\nb\n");

        ed.insert("a.py", 5, "end").unwrap();
        assert_eq!(read(&dir, "a.py"), "top\na\nmid1\nmid2\nb\nend\n");

        ed.undo("a.py").unwrap();
        ed.undo("a.py").unwrap();
        ed.undo("a.py").unwrap();
        assert_eq!(read(&dir, "a.py"), "a\nb\n");
    }

    #[test]
    fn test_insert_without_trailing_newline() {
        let (dir, mut ed) = editor();
        fs::write(dir.path().join("a.py"), "a\nb").unwrap();
        let out = ed.insert("a.py", 2, "c").unwrap();
        assert_eq!(read(&dir, "a.py"), "a\nb\nc");
        assert!(out.contains("     3\tc"));
    }

    #[test]
    fn test_insert_out_of_range_fails() {
        let (dir, mut ed) = editor();
        fs::write(dir.path().join("a.py"), "a\nb\n").unwrap();

        for bad in [-1, 3] {
            let err = ed.insert("a.py", bad, "x").unwrap_err();
            assert!(matches!(err, EditError::Range { .. }));
            assert!(err.to_string().contains("[0, 2]"));
        }
        assert_eq!(read(&dir, "a.py"), "a\nb\n");
    }

    #[test]
    fn test_undo_of_create_removes_file() {
        let (dir, mut ed) = editor();
        ed.create("new.py", "print('hi')\n").unwrap();
        ed.str_replace("new.py", "hi", "hello").unwrap();

        ed.undo("new.py").unwrap();
        assert_eq!(read(&dir, "new.py"), "print('hi')\n");

        let out = ed.undo("new.py").unwrap();
        assert!(out.contains("removed"));
        assert!(!dir.path().join("new.py").exists());
        assert!(ed.undo("new.py").is_err());
    }

    #[test]
    fn test_view_range() {
        let (dir, ed) = editor();
        fs::write(dir.path().join("a.py"), "l1\nl2\nl3\nl4\n").unwrap();

        assert_eq!(ed.view("a.py", Some([2, 3])).unwrap(), "     2\tl2\n     3\tl3\n");
        assert_eq!(ed.view("a.py", Some([3, -1])).unwrap(), "     3\tl3\n     4\tl4\n");

        for bad in [[0, 2], [5, -1], [2, 9], [3, 2]] {
            assert!(matches!(
                ed.view("a.py", Some(bad)).unwrap_err(),
                EditError::Range { .. }
            ));
        }
    }

    #[test]
    fn test_view_missing_and_directory() {
        let (dir, ed) = editor();
        fs::create_dir_all(dir.path().join("pkg/sub")).unwrap();
        fs::write(dir.path().join("pkg/sub/a.py"), "").unwrap();

        assert!(matches!(
            ed.view("nope.py", None).unwrap_err(),
            EditError::NotFound { .. }
        ));

        let out = ed.view(".", None).unwrap();
        assert!(out.contains("up to 2 levels deep"));
        assert!(out.contains("pkg/\n"));
        assert!(out.contains("pkg/sub/\n"));
        assert!(!out.contains("pkg/sub/a.py"));

        assert!(ed.view("pkg", Some([1, 2])).is_err());
    }

    #[test]
    fn test_view_truncates_long_output() {
        let dir = TempDir::new().unwrap();
        let ws = WorkspaceContext::open(dir.path()).unwrap();
        let limits = EditorConfig {
            max_response_chars: 100,
            ..EditorConfig::default()
        };
        let ed = FileEditor::new(ws, limits);
        fs::write(dir.path().join("big.txt"), "line\n".repeat(100)).unwrap();

        let out = ed.view("big.txt", None).unwrap();
        assert!(out.ends_with(FILE_CONTENT_TRUNCATED_NOTICE));
        assert!(out.len() <= 100 + FILE_CONTENT_TRUNCATED_NOTICE.len());
    }

    #[test]
    fn test_path_escape_is_rejected() {
        let (_dir, mut ed) = editor();
        assert!(matches!(
            ed.create("../escape.py", "x").unwrap_err(),
            EditError::PathEscape(_)
        ));
        assert!(matches!(
            ed.view("/etc/hosts", None).unwrap_err(),
            EditError::PathEscape(_)
        ));
    }

    #[test]
    fn test_view_directory_tool_listing() {
        let (dir, ed) = editor();
        fs::create_dir_all(dir.path().join("pkg")).unwrap();
        fs::write(dir.path().join("pkg/a.py"), "").unwrap();
        let out = ed.view_directory("./", None).unwrap();
        assert_eq!(out, "pkg/\npkg/a.py");
        assert!(ed.view_directory("pkg/a.py", None).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_write_atomic_keeps_permissions_and_leaves_no_temp_file() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("run.sh");
        fs::write(&path, "echo 1\n").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();

        write_atomic(&path, "echo 2\n").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "echo 2\n");
        assert_eq!(fs::metadata(&path).unwrap().permissions().mode() & 0o777, 0o755);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_helpers() {
        assert_eq!(occurrences("abcabc", "bc"), vec![1, 4]);
        assert_eq!(occurrences("ééé", "éé"), vec![0, 2]);
        assert_eq!(line_of("a\nb\nc", 4), 3);
    }
}
