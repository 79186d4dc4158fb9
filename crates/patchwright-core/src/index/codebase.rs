//! Collection building: enumerate, parse, chunk, embed, persist
//!
//! A collection lives in `<runtime_dir>/<collection>_<project basename>`.
//! The presence of that directory is the only "already indexed" signal: an
//! existing collection is loaded as-is, without walking the project, and never
//! refreshed when sources change. Builds write into a `.partial` staging directory that is
//! renamed into place only after every batch has been stored, so a failed
//! build leaves nothing behind that could be mistaken for a complete one.

use chrono::Utc;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::chunker::chunk_text;
use super::embeddings::EmbeddingProvider;
use super::error::{IndexError, IndexResult};
use super::languages::LanguageRegistry;
use super::parser::{DefinitionParser, UnitKind};
use super::retrieval::Retriever;
use super::store::{CollectionMeta, CollectionStore, StoredChunk};
use crate::config::IndexConfig;
use crate::edit::render::is_hidden;

const STAGING_SUFFIX: &str = ".partial";
const DIGEST_LEN: usize = 12;

/// Chunk awaiting its embedding
struct PendingChunk {
    file_path: String,
    definition_name: Option<String>,
    kind: UnitKind,
    chunk_index: usize,
    offset: usize,
    text: String,
}

/// Source file selected for indexing
struct SourceFile {
    absolute: PathBuf,
    relative: String,
    extension: String,
}

pub struct CodebaseIndex {
    runtime_dir: PathBuf,
    settings: IndexConfig,
    languages: LanguageRegistry,
    embedder: Arc<dyn EmbeddingProvider>,
    /// Project walks performed so far
    scans: AtomicUsize,
}

impl CodebaseIndex {
    pub fn new(
        runtime_dir: impl Into<PathBuf>,
        settings: IndexConfig,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        let languages = LanguageRegistry::builtin().select(&settings.extensions);
        Self {
            runtime_dir: runtime_dir.into(),
            settings,
            languages,
            embedder,
            scans: AtomicUsize::new(0),
        }
    }

    pub fn default_collection(&self) -> &str {
        &self.settings.default_collection
    }

    /// Directory holding the collection for `project_dir`
    pub fn persist_dir(&self, project_dir: &Path, collection: &str) -> IndexResult<PathBuf> {
        let project_dir = canonical_project(project_dir)?;
        Ok(self.locate(&project_dir, collection)?.0)
    }

    /// Load the collection if it exists, otherwise build it from scratch
    pub async fn build(&self, project_dir: &Path, collection: &str) -> IndexResult<Retriever> {
        let project_dir = canonical_project(project_dir)?;
        let (dir, scanned) = self.locate(&project_dir, collection)?;

        if dir.exists() {
            let store = open_existing(&dir)?;
            let meta = store.meta()?.ok_or_else(|| {
                IndexError::BuildFailure(format!(
                    "Collection at {} has no metadata; clear it and rebuild",
                    dir.display()
                ))
            })?;
            if meta.model != self.embedder.model_name() {
                return Err(IndexError::EmbeddingService(format!(
                    "Collection {} was built with embedding model {} but the current provider is {}",
                    collection,
                    meta.model,
                    self.embedder.model_name()
                )));
            }
            info!(
                "Reusing existing collection {} at {} (built {})",
                collection,
                dir.display(),
                meta.created_at.to_rfc3339()
            );
            return Ok(Retriever::new(collection, store, Arc::clone(&self.embedder)));
        }

        let files = match scanned {
            Some(files) => files,
            None => self.source_files(&project_dir),
        };
        let staging = staging_dir(&dir);
        remove_dir_if_exists(&staging)?;

        let result = self
            .build_into(&staging, &project_dir, collection, &files)
            .await;
        if let Err(e) = result {
            warn!("Index build for {} failed: {}", collection, e);
            if let Err(cleanup) = remove_dir_if_exists(&staging) {
                warn!("Failed to remove staging directory: {}", cleanup);
            }
            return Err(e);
        }

        if let Err(e) = std::fs::rename(&staging, &dir) {
            if let Err(cleanup) = remove_dir_if_exists(&staging) {
                warn!("Failed to remove staging directory: {}", cleanup);
            }
            return Err(IndexError::io(dir.display().to_string(), e));
        }

        let store = CollectionStore::open(&dir)?.ok_or_else(|| {
            IndexError::BuildFailure(format!("Collection vanished from {}", dir.display()))
        })?;
        let (files_n, defs_n) = store.counts()?;
        info!(
            "Connected to collection {} at {} containing {} file and {} definition chunks",
            collection,
            dir.display(),
            files_n,
            defs_n
        );
        Ok(Retriever::new(collection, store, Arc::clone(&self.embedder)))
    }

    /// Open the collection without building it; a missing collection
    /// yields a retriever whose searches return nothing
    pub fn connect(&self, project_dir: &Path, collection: &str) -> IndexResult<Retriever> {
        let dir = self.persist_dir(project_dir, collection)?;
        if !dir.exists() {
            debug!("No collection at {}", dir.display());
            return Ok(Retriever::empty(collection, &dir, Arc::clone(&self.embedder)));
        }
        let store = open_existing(&dir)?;
        Ok(Retriever::new(collection, store, Arc::clone(&self.embedder)))
    }

    /// Remove the persisted collection (and any content-keyed variants).
    /// Returns whether anything was removed.
    pub fn clear(&self, project_dir: &Path, collection: &str) -> IndexResult<bool> {
        let project_dir = canonical_project(project_dir)?;
        let base = key_name(&project_dir, collection);
        let entries = match std::fs::read_dir(&self.runtime_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(IndexError::io(self.runtime_dir.display().to_string(), e)),
        };

        let mut removed = false;
        for entry in entries.filter_map(|e| e.ok()) {
            let name = entry.file_name().to_string_lossy().to_string();
            if belongs_to_key(&name, &base) {
                remove_dir_if_exists(&entry.path())?;
                debug!("Removed {}", entry.path().display());
                removed = true;
            }
        }
        if removed {
            info!("Cleared collection {} for {}", collection, project_dir.display());
        }
        Ok(removed)
    }

    async fn build_into(
        &self,
        staging: &Path,
        project_dir: &Path,
        collection: &str,
        files: &[SourceFile],
    ) -> IndexResult<()> {
        let meta = CollectionMeta {
            collection: collection.to_string(),
            project: project_name(project_dir),
            model: self.embedder.model_name().to_string(),
            dims: self.embedder.dims(),
            created_at: Utc::now(),
        };
        let mut store = CollectionStore::create(staging, &meta)?;

        let batches: Vec<&[SourceFile]> = files.chunks(self.settings.file_batch_size).collect();
        info!(
            "Indexing {} files from {} into {} ({} batches)",
            files.len(),
            project_dir.display(),
            staging.display(),
            batches.len()
        );

        let mut parsers: HashMap<String, DefinitionParser> = HashMap::new();
        let mut dims_recorded = meta.dims > 0;

        for (batch_no, batch) in batches.iter().enumerate() {
            let pending = self.chunk_batch(batch, &mut parsers)?;
            let file_chunks = pending.iter().filter(|c| c.kind == UnitKind::File).count();
            let definition_chunks = pending.len() - file_chunks;

            for group in pending.chunks(self.settings.embed_batch_size) {
                let texts: Vec<String> = group.iter().map(|c| c.text.clone()).collect();
                let vectors = self.embedder.embed_batch(&texts).await?;
                if vectors.len() != group.len() {
                    return Err(IndexError::EmbeddingService(format!(
                        "Expected {} embeddings, got {}",
                        group.len(),
                        vectors.len()
                    )));
                }
                if !dims_recorded {
                    if let Some(first) = vectors.first() {
                        store.set_dims(first.len())?;
                        dims_recorded = true;
                    }
                }

                let stored: Vec<StoredChunk> = group
                    .iter()
                    .zip(vectors)
                    .map(|(c, embedding)| StoredChunk {
                        file_path: c.file_path.clone(),
                        definition_name: c.definition_name.clone(),
                        kind: c.kind,
                        chunk_index: c.chunk_index,
                        offset: c.offset,
                        text: c.text.clone(),
                        embedding,
                    })
                    .collect();
                store.insert_chunks(&stored)?;
            }

            info!(
                "Batch {}/{}: {} files, {} file chunks, {} definition chunks",
                batch_no + 1,
                batches.len(),
                batch.len(),
                file_chunks,
                definition_chunks
            );
        }

        Ok(())
    }

    /// Parse and chunk every file of one batch
    fn chunk_batch(
        &self,
        batch: &[SourceFile],
        parsers: &mut HashMap<String, DefinitionParser>,
    ) -> IndexResult<Vec<PendingChunk>> {
        let mut pending = Vec::new();
        for file in batch {
            let source = read_source(file)?;

            let parser = match parsers.entry(file.extension.clone()) {
                std::collections::hash_map::Entry::Occupied(e) => e.into_mut(),
                std::collections::hash_map::Entry::Vacant(e) => {
                    let spec = self.languages.get(&file.extension).ok_or_else(|| {
                        IndexError::BuildFailure(format!(
                            "No grammar registered for .{}",
                            file.extension
                        ))
                    })?;
                    e.insert(DefinitionParser::new(spec)?)
                }
            };

            for unit in parser.parse_units(&file.relative, &source)? {
                for chunk in chunk_text(
                    &unit.text,
                    self.settings.chunk_size,
                    self.settings.chunk_overlap,
                ) {
                    pending.push(PendingChunk {
                        file_path: unit.file_path.clone(),
                        definition_name: unit.name.clone(),
                        kind: unit.kind,
                        chunk_index: chunk.index,
                        offset: chunk.offset,
                        text: chunk.text,
                    });
                }
            }
        }
        Ok(pending)
    }

    /// Collection directory, plus the source listing when the key needed one
    fn locate(
        &self,
        project_dir: &Path,
        collection: &str,
    ) -> IndexResult<(PathBuf, Option<Vec<SourceFile>>)> {
        if !self.settings.content_hash_key {
            return Ok((self.key_dir(project_dir, collection, None), None));
        }
        let files = self.source_files(project_dir);
        let digest = content_digest(&files)?;
        Ok((
            self.key_dir(project_dir, collection, Some(&digest)),
            Some(files),
        ))
    }

    /// Non-hidden files with a registered extension, sorted by relative path
    fn source_files(&self, project_dir: &Path) -> Vec<SourceFile> {
        let scan = self.scans.fetch_add(1, Ordering::Relaxed) + 1;
        let mut files: Vec<SourceFile> = WalkDir::new(project_dir)
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(&e.file_name().to_string_lossy()))
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter_map(|e| {
                let extension = e
                    .path()
                    .extension()?
                    .to_string_lossy()
                    .to_ascii_lowercase();
                self.languages.get(&extension)?;
                let relative = e
                    .path()
                    .strip_prefix(project_dir)
                    .ok()?
                    .to_string_lossy()
                    .replace('\\', "/");
                Some(SourceFile {
                    absolute: e.path().to_path_buf(),
                    relative,
                    extension,
                })
            })
            .collect();
        files.sort_by(|a, b| a.relative.cmp(&b.relative));
        debug!(
            "Scan {} of {} found {} source files",
            scan,
            project_dir.display(),
            files.len()
        );
        files
    }

    fn key_dir(&self, project_dir: &Path, collection: &str, digest: Option<&str>) -> PathBuf {
        let base = key_name(project_dir, collection);
        match digest {
            Some(d) => self.runtime_dir.join(format!("{}_{}", base, d)),
            None => self.runtime_dir.join(base),
        }
    }
}

fn canonical_project(project_dir: &Path) -> IndexResult<PathBuf> {
    let dir = project_dir
        .canonicalize()
        .map_err(|e| IndexError::io(project_dir.display().to_string(), e))?;
    if !dir.is_dir() {
        return Err(IndexError::BuildFailure(format!(
            "Project path is not a directory: {}",
            dir.display()
        )));
    }
    Ok(dir)
}

/// Open a collection directory that must hold a database
fn open_existing(dir: &Path) -> IndexResult<CollectionStore> {
    CollectionStore::open(dir)?.ok_or_else(|| {
        IndexError::BuildFailure(format!(
            "Directory {} exists but holds no collection; clear it and rebuild",
            dir.display()
        ))
    })
}

fn project_name(project_dir: &Path) -> String {
    project_dir
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "project".to_string())
}

fn key_name(project_dir: &Path, collection: &str) -> String {
    format!("{}_{}", collection, project_name(project_dir))
}

/// `base`, `base.partial`, `base_<digest>` or `base_<digest>.partial`
fn belongs_to_key(name: &str, base: &str) -> bool {
    let name = name.strip_suffix(STAGING_SUFFIX).unwrap_or(name);
    if name == base {
        return true;
    }
    name.strip_prefix(base)
        .and_then(|rest| rest.strip_prefix('_'))
        .is_some_and(|d| d.len() == DIGEST_LEN && d.chars().all(|c| c.is_ascii_hexdigit()))
}

fn staging_dir(dir: &Path) -> PathBuf {
    let mut name = dir.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(STAGING_SUFFIX);
    dir.with_file_name(name)
}

fn read_source(file: &SourceFile) -> IndexResult<String> {
    std::fs::read_to_string(&file.absolute)
        .map_err(|e| IndexError::BuildFailure(format!("Failed to read {}: {}", file.relative, e)))
}

/// Short SHA-256 over the sorted (path, content) set
fn content_digest(files: &[SourceFile]) -> IndexResult<String> {
    let mut hasher = Sha256::new();
    for file in files {
        let source = read_source(file)?;
        hasher.update(file.relative.as_bytes());
        hasher.update([0u8]);
        hasher.update(source.as_bytes());
        hasher.update([0u8]);
    }
    let digest = hasher.finalize();
    let hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
    Ok(hex[..DIGEST_LEN].to_string())
}

fn remove_dir_if_exists(dir: &Path) -> IndexResult<()> {
    match std::fs::remove_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(IndexError::io(dir.display().to_string(), e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::embeddings::HashedEmbedder;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use tempfile::TempDir;

    /// Hashed embeddings that count calls and can be told to fail
    struct CountingEmbedder {
        inner: HashedEmbedder,
        calls: Mutex<usize>,
        fail: bool,
    }

    impl CountingEmbedder {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                inner: HashedEmbedder::new(256),
                calls: Mutex::new(0),
                fail,
            })
        }
    }

    #[async_trait]
    impl EmbeddingProvider for CountingEmbedder {
        fn model_name(&self) -> &str {
            self.inner.model_name()
        }
        fn dims(&self) -> usize {
            self.inner.dims()
        }
        async fn embed_batch(&self, texts: &[String]) -> IndexResult<Vec<Vec<f32>>> {
            *self.calls.lock() += 1;
            if self.fail {
                return Err(IndexError::EmbeddingService("rate limited".to_string()));
            }
            self.inner.embed_batch(texts).await
        }
    }

    fn project() -> TempDir {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("a.py"),
            "import os\n\n\ndef foo():\n    return os.getcwd()\n",
        )
        .unwrap();
        std::fs::create_dir_all(dir.path().join("pkg")).unwrap();
        std::fs::write(
            dir.path().join("pkg/Widget.java"),
            "class Widget {\n  Widget() {}\n  void render() {}\n}\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "def not_indexed(): pass\n").unwrap();
        std::fs::create_dir_all(dir.path().join(".venv")).unwrap();
        std::fs::write(dir.path().join(".venv/site.py"), "def hidden(): pass\n").unwrap();
        dir
    }

    fn index(runtime: &TempDir, embedder: Arc<dyn EmbeddingProvider>) -> CodebaseIndex {
        CodebaseIndex::new(runtime.path(), IndexConfig::default(), embedder)
    }

    #[tokio::test]
    async fn test_build_persists_units_and_skips_unsupported() {
        let proj = project();
        let runtime = TempDir::new().unwrap();
        let idx = index(&runtime, CountingEmbedder::new(false));

        let retriever = idx.build(proj.path(), "kb").await.unwrap();
        let name = proj.path().canonicalize().unwrap();
        let expected = runtime
            .path()
            .join(format!("kb_{}", name.file_name().unwrap().to_string_lossy()));
        assert_eq!(retriever.location(), expected);
        assert!(expected.join("index.db").is_file());
        assert!(!staging_dir(&expected).exists());

        let store = CollectionStore::open(&expected).unwrap().unwrap();
        // a.py + Widget.java file units; foo + Widget() + render definitions
        assert_eq!(store.counts().unwrap(), (2, 3));
        let chunks = store.load_all().unwrap();
        assert!(chunks.iter().all(|c| c.file_path != "notes.txt"));
        assert!(chunks.iter().all(|c| c.file_path != ".venv/site.py"));
        let names: Vec<_> = chunks
            .iter()
            .filter_map(|c| c.definition_name.as_deref())
            .collect();
        assert_eq!(names, vec!["foo", "Widget", "render"]);
    }

    #[tokio::test]
    async fn test_second_build_loads_without_embedding() {
        let proj = project();
        let runtime = TempDir::new().unwrap();
        let embedder = CountingEmbedder::new(false);
        let idx = index(&runtime, embedder.clone());

        idx.build(proj.path(), "kb").await.unwrap();
        let calls_after_first = *embedder.calls.lock();
        assert!(calls_after_first > 0);

        // stale by design: new files are not picked up
        std::fs::write(proj.path().join("b.py"), "def bar(): pass\n").unwrap();
        let retriever = idx.build(proj.path(), "kb").await.unwrap();
        assert_eq!(*embedder.calls.lock(), calls_after_first);

        let store = CollectionStore::open(retriever.location()).unwrap().unwrap();
        assert_eq!(store.counts().unwrap(), (2, 3));
    }

    #[tokio::test]
    async fn test_failed_build_leaves_no_collection() {
        let proj = project();
        let runtime = TempDir::new().unwrap();
        let idx = index(&runtime, CountingEmbedder::new(true));

        let err = idx.build(proj.path(), "kb").await.err().unwrap();
        assert!(matches!(err, IndexError::EmbeddingService(_)));

        let dir = idx.persist_dir(proj.path(), "kb").unwrap();
        assert!(!dir.exists());
        assert!(!staging_dir(&dir).exists());
    }

    #[tokio::test]
    async fn test_directory_without_database_fails_before_embedding() {
        let proj = project();
        let runtime = TempDir::new().unwrap();
        let embedder = CountingEmbedder::new(false);
        let idx = index(&runtime, embedder.clone());

        let dir = idx.persist_dir(proj.path(), "kb").unwrap();
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("leftover.bin"), [0u8; 4]).unwrap();

        let err = idx.build(proj.path(), "kb").await.err().unwrap();
        assert!(matches!(err, IndexError::BuildFailure(_)));
        assert!(err.to_string().contains("holds no collection"));
        assert_eq!(*embedder.calls.lock(), 0);
        assert!(!staging_dir(&dir).exists());
        assert!(dir.join("leftover.bin").exists());

        assert!(matches!(
            idx.connect(proj.path(), "kb").err().unwrap(),
            IndexError::BuildFailure(_)
        ));

        assert!(idx.clear(proj.path(), "kb").unwrap());
        assert!(idx.build(proj.path(), "kb").await.is_ok());
    }

    #[tokio::test]
    async fn test_reuse_does_not_walk_the_project() {
        let proj = project();
        let runtime = TempDir::new().unwrap();
        let idx = index(&runtime, Arc::new(HashedEmbedder::new(64)));

        idx.build(proj.path(), "kb").await.unwrap();
        assert_eq!(idx.scans.load(Ordering::Relaxed), 1);

        idx.build(proj.path(), "kb").await.unwrap();
        idx.connect(proj.path(), "kb").unwrap();
        idx.persist_dir(proj.path(), "kb").unwrap();
        assert_eq!(idx.scans.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_content_key_walks_once_per_build() {
        let proj = project();
        let runtime = TempDir::new().unwrap();
        let settings = IndexConfig {
            content_hash_key: true,
            ..IndexConfig::default()
        };
        let idx = CodebaseIndex::new(runtime.path(), settings, Arc::new(HashedEmbedder::new(64)));

        idx.build(proj.path(), "kb").await.unwrap();
        assert_eq!(idx.scans.load(Ordering::Relaxed), 1);
        idx.build(proj.path(), "kb").await.unwrap();
        assert_eq!(idx.scans.load(Ordering::Relaxed), 2);
    }

    #[tokio::test]
    async fn test_unreadable_file_is_build_failure() {
        let proj = project();
        std::fs::write(proj.path().join("bad.py"), [0xff, 0xfe, 0x00]).unwrap();
        let runtime = TempDir::new().unwrap();
        let idx = index(&runtime, CountingEmbedder::new(false));

        let err = idx.build(proj.path(), "kb").await.err().unwrap();
        assert!(matches!(err, IndexError::BuildFailure(_)));
        assert!(err.to_string().contains("bad.py"));
    }

    #[tokio::test]
    async fn test_model_mismatch_is_rejected() {
        let proj = project();
        let runtime = TempDir::new().unwrap();
        index(&runtime, Arc::new(HashedEmbedder::new(64)))
            .build(proj.path(), "kb")
            .await
            .unwrap();

        let err = index(&runtime, Arc::new(HashedEmbedder::new(128)))
            .build(proj.path(), "kb")
            .await
            .err()
            .unwrap();
        assert!(matches!(err, IndexError::EmbeddingService(_)));
    }

    #[tokio::test]
    async fn test_content_hash_key_invalidates_on_change() {
        let proj = project();
        let runtime = TempDir::new().unwrap();
        let settings = IndexConfig {
            content_hash_key: true,
            ..IndexConfig::default()
        };
        let idx = CodebaseIndex::new(runtime.path(), settings, Arc::new(HashedEmbedder::new(64)));

        let first = idx.build(proj.path(), "kb").await.unwrap();
        std::fs::write(proj.path().join("b.py"), "def bar(): pass\n").unwrap();
        let second = idx.build(proj.path(), "kb").await.unwrap();
        assert_ne!(first.location(), second.location());

        assert!(idx.clear(proj.path(), "kb").unwrap());
        assert!(!first.location().exists());
        assert!(!second.location().exists());
        assert!(!idx.clear(proj.path(), "kb").unwrap());
    }

    #[tokio::test]
    async fn test_small_batches_cover_all_files() {
        let proj = project();
        for i in 0..5 {
            std::fs::write(
                proj.path().join(format!("m{}.py", i)),
                format!("def f{}():\n    return {}\n", i, i),
            )
            .unwrap();
        }
        let runtime = TempDir::new().unwrap();
        let settings = IndexConfig {
            file_batch_size: 2,
            embed_batch_size: 3,
            ..IndexConfig::default()
        };
        let idx = CodebaseIndex::new(runtime.path(), settings, Arc::new(HashedEmbedder::new(64)));
        let retriever = idx.build(proj.path(), "kb").await.unwrap();

        let store = CollectionStore::open(retriever.location()).unwrap().unwrap();
        assert_eq!(store.counts().unwrap(), (7, 8));
    }

    #[tokio::test]
    async fn test_missing_collection_searches_empty() {
        let proj = project();
        let runtime = TempDir::new().unwrap();
        let embedder = CountingEmbedder::new(false);
        let idx = index(&runtime, embedder.clone());

        let retriever = idx.connect(proj.path(), "never_built").unwrap();
        assert!(retriever.search("foo", 5).await.unwrap().is_empty());
        assert_eq!(*embedder.calls.lock(), 0);
    }

    #[tokio::test]
    async fn test_empty_project_builds_empty_collection() {
        let proj = TempDir::new().unwrap();
        let runtime = TempDir::new().unwrap();
        let idx = index(&runtime, Arc::new(HashedEmbedder::new(64)));

        let retriever = idx.build(proj.path(), "kb").await.unwrap();
        assert!(retriever.location().join("index.db").is_file());
        assert!(retriever.search("foo", 5).await.unwrap().is_empty());
    }

    #[test]
    fn test_belongs_to_key() {
        assert!(belongs_to_key("kb_proj", "kb_proj"));
        assert!(belongs_to_key("kb_proj.partial", "kb_proj"));
        assert!(belongs_to_key("kb_proj_0123456789ab", "kb_proj"));
        assert!(!belongs_to_key("kb_proj_x", "kb_proj"));
        assert!(!belongs_to_key("kb_project", "kb_proj"));
    }
}
