//! Workspace context: the checked-out project both engines operate on
//!
//! Passed explicitly into the edit and index engines; there is no global
//! lookup. At most one active session is expected per checkout, so nothing
//! here locks the working tree.

use anyhow::{Context, Result};
use chrono::Utc;
use git2::{DiffFormat, DiffOptions, Repository};
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// A path that resolves outside the project root
#[derive(Debug, Clone, Error)]
#[error("path '{path}' resolves outside the project root {root}")]
pub struct PathEscapeError {
    pub path: String,
    pub root: String,
}

/// The project checkout plus the commit it is pinned at
#[derive(Debug, Clone)]
pub struct WorkspaceContext {
    project_root: PathBuf,
    project_name: String,
    commit: Option<String>,
}

impl WorkspaceContext {
    /// Open a project directory, reading the HEAD commit if it is a git checkout
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        let project_root = root
            .canonicalize()
            .with_context(|| format!("Project directory not found: {}", root.display()))?;
        if !project_root.is_dir() {
            anyhow::bail!("Project root is not a directory: {}", project_root.display());
        }

        let commit = head_commit(&project_root);
        debug!(
            "Opened workspace {} at commit {}",
            project_root.display(),
            commit.as_deref().unwrap_or("<none>")
        );

        Ok(Self {
            project_name: project_name(&project_root),
            project_root,
            commit,
        })
    }

    pub fn current_project_root(&self) -> &Path {
        &self.project_root
    }

    /// Informational only; neither engine reads it
    pub fn current_commit(&self) -> Option<&str> {
        self.commit.as_deref()
    }

    /// Final component of the project root
    pub fn project_name(&self) -> &str {
        &self.project_name
    }

    /// Resolve a relative, `./`-prefixed, or absolute path to an absolute path
    /// inside the project root
    pub fn resolve(&self, path: &str) -> Result<PathBuf, PathEscapeError> {
        let escape = || PathEscapeError {
            path: path.to_string(),
            root: self.project_root.display().to_string(),
        };

        let requested = Path::new(path);
        let joined = if requested.is_absolute() {
            requested.to_path_buf()
        } else {
            self.project_root.join(requested)
        };

        let normalized = normalize_lexically(&joined).ok_or_else(escape)?;
        if !normalized.starts_with(&self.project_root) {
            return Err(escape());
        }

        // Symlinks inside the tree may still point outside it
        if let Some(existing) = deepest_existing_ancestor(&normalized) {
            if let Ok(real) = existing.canonicalize() {
                if !real.starts_with(&self.project_root) {
                    return Err(escape());
                }
            }
        }

        Ok(normalized)
    }

    /// Render an absolute path relative to the project root
    pub fn relative(&self, path: &Path) -> String {
        match path.strip_prefix(&self.project_root) {
            Ok(rel) if rel.as_os_str().is_empty() => ".".to_string(),
            Ok(rel) => rel.to_string_lossy().replace('\\', "/"),
            Err(_) => path.display().to_string(),
        }
    }

    /// Unified diff of the working tree (including untracked files) against HEAD
    pub fn working_tree_diff(&self) -> Result<String> {
        let repo = Repository::discover(&self.project_root).with_context(|| {
            format!("Not a git repository: {}", self.project_root.display())
        })?;
        let head_tree = repo
            .head()
            .and_then(|head| head.peel_to_tree())
            .context("Failed to read HEAD tree")?;

        let mut opts = DiffOptions::new();
        opts.include_untracked(true)
            .recurse_untracked_dirs(true)
            .show_untracked_content(true);

        let diff = repo
            .diff_tree_to_workdir_with_index(Some(&head_tree), Some(&mut opts))
            .context("Failed to diff working tree")?;

        let mut patch = String::new();
        diff.print(DiffFormat::Patch, |_delta, _hunk, line| {
            if matches!(line.origin(), '+' | '-' | ' ') {
                patch.push(line.origin());
            }
            patch.push_str(&String::from_utf8_lossy(line.content()));
            true
        })
        .context("Failed to render diff")?;

        Ok(patch)
    }

    /// Write the working-tree diff to `<dir>/<project>@<unix seconds>.patch`
    /// and return the file's path along with the patch itself
    pub fn save_working_tree_diff(&self, dir: &Path) -> Result<(PathBuf, String)> {
        let patch = self.working_tree_diff()?;
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create patch directory: {}", dir.display()))?;

        let path = dir.join(patch_file_name(&self.project_name, Utc::now().timestamp()));
        std::fs::write(&path, &patch)
            .with_context(|| format!("Failed to write patch: {}", path.display()))?;
        info!("Saved {} byte patch to {}", patch.len(), path.display());
        Ok((path, patch))
    }
}

fn patch_file_name(project: &str, timestamp: i64) -> String {
    format!("{}@{}.patch", project.replace(['/', '\\'], "+"), timestamp)
}

fn head_commit(root: &Path) -> Option<String> {
    let repo = Repository::discover(root).ok()?;
    let commit = repo.head().ok()?.peel_to_commit().ok()?;
    Some(commit.id().to_string())
}

fn project_name(root: &Path) -> String {
    root.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "project".to_string())
}

/// Resolve `.` and `..` without touching the filesystem. Returns `None` when
/// `..` climbs above the filesystem root.
fn normalize_lexically(path: &Path) -> Option<PathBuf> {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(prefix) => out.push(prefix.as_os_str()),
            Component::RootDir => out.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    return None;
                }
            }
            Component::Normal(part) => out.push(part),
        }
    }
    Some(out)
}

fn deepest_existing_ancestor(path: &Path) -> Option<&Path> {
    path.ancestors().find(|p| p.exists())
}
