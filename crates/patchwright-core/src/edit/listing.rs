//! Project structure listing with automatic depth reduction
//!
//! Lists files and directories below a directory. When the listing would
//! exceed the entry limit, depth is reduced one level at a time until it
//! fits, and a note saying so is placed first.

use std::collections::BTreeSet;
use std::path::Path;
use walkdir::WalkDir;

use super::render::is_hidden;

/// Result of [`list_directory`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryListing {
    /// Present when the depth was reduced or the listing was capped
    pub note: Option<String>,
    pub entries: Vec<String>,
}

impl DirectoryListing {
    pub fn render(&self) -> String {
        let mut lines = Vec::with_capacity(self.entries.len() + 1);
        if let Some(note) = &self.note {
            lines.push(note.clone());
        }
        lines.extend(self.entries.iter().cloned());
        lines.join("\n")
    }
}

/// List entries below `dir` (paths relative to `root`). `depth` counts
/// levels below `dir`, 0 meaning direct children only; `None` is unlimited.
pub fn list_directory(
    root: &Path,
    dir: &Path,
    depth: Option<usize>,
    max_entries: usize,
) -> DirectoryListing {
    // (path relative to root, depth below dir)
    let mut files: Vec<(String, usize)> = Vec::new();
    let mut dirs: Vec<(String, usize)> = Vec::new();

    let walker = WalkDir::new(dir)
        .min_depth(1)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden(&e.file_name().to_string_lossy()));

    for entry in walker.filter_map(|e| e.ok()) {
        let rel = entry
            .path()
            .strip_prefix(root)
            .unwrap_or(entry.path())
            .to_string_lossy()
            .replace('\\', "/");
        let level = entry.depth() - 1;
        if entry.file_type().is_dir() {
            dirs.push((format!("{}/", rel), level));
        } else {
            files.push((rel, level));
        }
    }

    let filter = |max_depth: Option<usize>| -> Vec<String> {
        let within = |d: usize| max_depth.map_or(true, |m| d <= m);
        files
            .iter()
            .chain(dirs.iter())
            .filter(|(_, d)| within(*d))
            .map(|(p, _)| p.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    };

    let initial = filter(depth);
    if initial.len() <= max_entries {
        return DirectoryListing {
            note: None,
            entries: initial,
        };
    }

    let deepest = files
        .iter()
        .chain(dirs.iter())
        .map(|(_, d)| *d)
        .max()
        .unwrap_or(0);
    let start_depth = depth.unwrap_or(deepest).min(deepest);

    for d in (0..=start_depth).rev() {
        let entries = filter(Some(d));
        if entries.len() <= max_entries {
            return DirectoryListing {
                note: Some(format!(
                    "Note: Reduced depth to {} with {} entries",
                    d,
                    entries.len()
                )),
                entries,
            };
        }
    }

    let mut entries = filter(Some(0));
    let total = entries.len();
    entries.truncate(max_entries);
    DirectoryListing {
        note: Some(format!(
            "Note: Limited to depth 0 with {} entries (showing first {})",
            total,
            entries.len()
        )),
        entries,
    }
}
