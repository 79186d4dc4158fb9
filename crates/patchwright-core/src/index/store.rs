//! SQLite persistence for one collection directory

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};

use super::embeddings::{blob_to_embedding, embedding_to_blob};
use super::error::{IndexError, IndexResult};
use super::parser::UnitKind;

pub const DB_FILE: &str = "index.db";

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS collection_meta (
        id INTEGER PRIMARY KEY CHECK (id = 1),
        collection TEXT NOT NULL,
        project TEXT NOT NULL,
        model TEXT NOT NULL,
        dims INTEGER NOT NULL,
        created_at TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS chunks (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        file_path TEXT NOT NULL,
        unit_kind TEXT NOT NULL,
        definition_name TEXT,
        chunk_index INTEGER NOT NULL,
        byte_offset INTEGER NOT NULL,
        content TEXT NOT NULL,
        embedding BLOB NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_chunks_file ON chunks(file_path);
";

#[derive(Debug, Clone)]
pub struct CollectionMeta {
    pub collection: String,
    pub project: String,
    pub model: String,
    pub dims: usize,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct StoredChunk {
    pub file_path: String,
    pub definition_name: Option<String>,
    pub kind: UnitKind,
    pub chunk_index: usize,
    pub offset: usize,
    pub text: String,
    pub embedding: Vec<f32>,
}

pub struct CollectionStore {
    conn: Connection,
    dir: PathBuf,
}

impl CollectionStore {
    /// Create the database inside `dir` (created if missing)
    pub fn create(dir: &Path, meta: &CollectionMeta) -> IndexResult<Self> {
        std::fs::create_dir_all(dir).map_err(|e| IndexError::io(dir.display().to_string(), e))?;
        let conn = Connection::open(dir.join(DB_FILE))?;
        conn.execute_batch(SCHEMA)?;
        conn.execute(
            "INSERT OR REPLACE INTO collection_meta (id, collection, project, model, dims, created_at)
             VALUES (1, ?1, ?2, ?3, ?4, ?5)",
            params![
                meta.collection,
                meta.project,
                meta.model,
                meta.dims as i64,
                meta.created_at.to_rfc3339()
            ],
        )?;
        Ok(Self {
            conn,
            dir: dir.to_path_buf(),
        })
    }

    /// Open an existing collection; `None` if `dir` holds no database
    pub fn open(dir: &Path) -> IndexResult<Option<Self>> {
        let db = dir.join(DB_FILE);
        if !db.is_file() {
            return Ok(None);
        }
        let conn = Connection::open(db)?;
        Ok(Some(Self {
            conn,
            dir: dir.to_path_buf(),
        }))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn meta(&self) -> IndexResult<Option<CollectionMeta>> {
        let row = self
            .conn
            .query_row(
                "SELECT collection, project, model, dims, created_at FROM collection_meta WHERE id = 1",
                [],
                |row| {
                    let collection: String = row.get(0)?;
                    let project: String = row.get(1)?;
                    let model: String = row.get(2)?;
                    let dims: i64 = row.get(3)?;
                    let created_at: String = row.get(4)?;
                    Ok((collection, project, model, dims, created_at))
                },
            )
            .optional()?;

        let Some((collection, project, model, dims, created_at)) = row else {
            return Ok(None);
        };
        let created_at = DateTime::parse_from_rfc3339(&created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| self.corrupt(format!("created_at {:?}: {}", created_at, e)))?;
        Ok(Some(CollectionMeta {
            collection,
            project,
            model,
            dims: dims as usize,
            created_at,
        }))
    }

    /// Record the dimensionality once the first vectors are known
    pub fn set_dims(&self, dims: usize) -> IndexResult<()> {
        self.conn.execute(
            "UPDATE collection_meta SET dims = ?1 WHERE id = 1",
            [dims as i64],
        )?;
        Ok(())
    }

    /// Insert a batch in one transaction
    pub fn insert_chunks(&mut self, chunks: &[StoredChunk]) -> IndexResult<()> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO chunks (file_path, unit_kind, definition_name, chunk_index, byte_offset, content, embedding)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for chunk in chunks {
                stmt.execute(params![
                    chunk.file_path,
                    chunk.kind.as_str(),
                    chunk.definition_name,
                    chunk.chunk_index as i64,
                    chunk.offset as i64,
                    chunk.text,
                    embedding_to_blob(&chunk.embedding),
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// (file chunks, definition chunks)
    pub fn counts(&self) -> IndexResult<(usize, usize)> {
        let count = |kind: UnitKind| -> IndexResult<usize> {
            let n: i64 = self.conn.query_row(
                "SELECT COUNT(*) FROM chunks WHERE unit_kind = ?1",
                [kind.as_str()],
                |row| row.get(0),
            )?;
            Ok(n as usize)
        };
        Ok((count(UnitKind::File)?, count(UnitKind::Definition)?))
    }

    fn corrupt(&self, detail: String) -> IndexError {
        IndexError::BuildFailure(format!(
            "Collection at {} is corrupt ({}); clear it and rebuild",
            self.dir.display(),
            detail
        ))
    }

    /// Every chunk in insertion order
    pub fn load_all(&self) -> IndexResult<Vec<StoredChunk>> {
        let mut stmt = self.conn.prepare(
            "SELECT file_path, unit_kind, definition_name, chunk_index, byte_offset, content, embedding
             FROM chunks ORDER BY id",
        )?;
        let rows = stmt.query_map([], |row| {
            let file_path: String = row.get(0)?;
            let kind: String = row.get(1)?;
            let definition_name: Option<String> = row.get(2)?;
            let chunk_index: i64 = row.get(3)?;
            let offset: i64 = row.get(4)?;
            let text: String = row.get(5)?;
            let blob: Vec<u8> = row.get(6)?;
            Ok((file_path, kind, definition_name, chunk_index, offset, text, blob))
        })?;

        let mut chunks = Vec::new();
        for row in rows {
            let (file_path, kind, definition_name, chunk_index, offset, text, blob) = row?;
            let embedding = blob_to_embedding(&blob).ok_or_else(|| {
                self.corrupt(format!(
                    "embedding of {} chunk {} is {} bytes",
                    file_path,
                    chunk_index,
                    blob.len()
                ))
            })?;
            let kind = UnitKind::parse(&kind)
                .ok_or_else(|| self.corrupt(format!("unknown unit kind {:?}", kind)))?;
            chunks.push(StoredChunk {
                file_path,
                definition_name,
                kind,
                chunk_index: chunk_index as usize,
                offset: offset as usize,
                text,
                embedding,
            });
        }
        Ok(chunks)
    }
}
