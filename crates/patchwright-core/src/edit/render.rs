//! Output formatting shared by the edit operations

use std::path::Path;
use walkdir::WalkDir;

pub const FILE_CONTENT_TRUNCATED_NOTICE: &str = "<response clipped><NOTE>Only part of this file is shown because it exceeded the response limit. Search the file for the lines you need, then view them with view_range.</NOTE>";

pub const DIRECTORY_CONTENT_TRUNCATED_NOTICE: &str = "<response clipped><NOTE>Only part of this directory is shown because it exceeded the response limit. View its subdirectories individually instead.</NOTE>";

/// Prefix each line with its number (`cat -n` style). The text's own line
/// endings are kept, so stripping the prefixes gives back `text` exactly.
pub fn number_lines(text: &str, first_line: usize) -> String {
    let mut out = String::with_capacity(text.len() + text.len() / 8);
    for (i, line) in text.split_inclusive('\n').enumerate() {
        out.push_str(&format!("{:>6}\t", first_line + i));
        out.push_str(line);
    }
    out
}

/// Cut `content` to at most `limit` bytes (on a char boundary) and append `notice`
pub fn truncate(content: String, limit: usize, notice: &str) -> String {
    if content.len() <= limit {
        return content;
    }
    let mut cut = limit;
    while cut > 0 && !content.is_char_boundary(cut) {
        cut -= 1;
    }
    let mut clipped = content[..cut].to_string();
    clipped.push_str(notice);
    clipped
}

/// Numbered lines around an edit: `context` lines above `first_line`
/// (0-based) and below the last of its `span` lines
pub fn snippet(content: &str, first_line: usize, span: usize, context: usize) -> String {
    let lines: Vec<&str> = content.split_inclusive('\n').collect();
    let start = first_line.saturating_sub(context).min(lines.len());
    let end = (first_line + span.max(1) + context).min(lines.len());
    number_lines(&lines[start..end].concat(), start + 1)
}

pub fn is_hidden(name: &str) -> bool {
    name.starts_with('.') && name != "." && name != ".."
}

/// Non-hidden entries up to `depth` levels below `dir`, relative to `root`,
/// directories suffixed with `/`, sorted
pub fn directory_entries(root: &Path, dir: &Path, depth: usize) -> Vec<String> {
    let mut entries: Vec<String> = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(depth)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden(&e.file_name().to_string_lossy()))
        .filter_map(|e| e.ok())
        .map(|e| {
            let rel = e
                .path()
                .strip_prefix(root)
                .unwrap_or(e.path())
                .to_string_lossy()
                .replace('\\', "/");
            if e.file_type().is_dir() {
                format!("{}/", rel)
            } else {
                rel
            }
        })
        .collect();
    entries.sort();
    entries
}
