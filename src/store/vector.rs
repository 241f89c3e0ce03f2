// Embedding + metadata store backed by SQLite

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Row};
use tracing::{debug, info};

use crate::index::{DocMetadata, IndexedDocument, Language, SymbolKind};
use crate::store::embed::Embedder;
use crate::store::schema::{drop_schema, init_schema};
use crate::store::StoreError;

pub type ConnectionPool = Pool<SqliteConnectionManager>;

/// One ranked candidate out of a similarity query
#[derive(Debug, Clone)]
pub struct VectorHit {
    pub id: String,
    pub document: String,
    pub metadata: DocMetadata,
    /// L2 distance between query and stored embedding
    pub distance: f32,
}

/// Vector store: owns embeddings and metadata, supports filtered deletes.
///
/// Similarity is an exhaustive scan over stored embeddings; approximate
/// nearest-neighbor search belongs to an external backend and is not this
/// store's concern.
pub struct VectorStore {
    pool: ConnectionPool,
    embedder: Arc<dyn Embedder>,
    db_path: PathBuf,
}

impl VectorStore {
    pub fn new(db_path: impl AsRef<Path>, embedder: Arc<dyn Embedder>) -> Result<Self> {
        let db_path = db_path.as_ref().to_path_buf();
        info!("Opening vector store at: {}", db_path.display());

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let manager = SqliteConnectionManager::file(&db_path);
        let pool = Pool::builder()
            .max_size(10)
            .build(manager)
            .context("Failed to create connection pool")?;

        {
            let conn = pool.get().context("Failed to get connection")?;
            init_schema(&conn).context("Failed to initialize vector store schema")?;
        }

        Ok(Self { pool, embedder, db_path })
    }

    fn get_conn(&self) -> Result<r2d2::PooledConnection<SqliteConnectionManager>, StoreError> {
        Ok(self.pool.get()?)
    }

    /// Insert or replace documents; one transaction per call so a file's
    /// batch lands atomically.
    pub fn add(
        &self,
        ids: &[String],
        documents: &[String],
        metadatas: &[DocMetadata],
    ) -> Result<(), StoreError> {
        if ids.is_empty() {
            return Ok(());
        }
        debug_assert_eq!(ids.len(), documents.len());
        debug_assert_eq!(ids.len(), metadatas.len());

        let texts: Vec<&str> = documents.iter().map(String::as_str).collect();
        let embeddings = self.embedder.embed_batch(&texts)?;

        let mut conn = self.get_conn()?;
        let tx = conn.transaction().map_err(StoreError::Database)?;
        for ((id, document), (embedding, meta)) in ids
            .iter()
            .zip(documents)
            .zip(embeddings.iter().zip(metadatas))
        {
            tx.execute(
                "INSERT OR REPLACE INTO documents (
                    id, document, embedding, file_path, project_root, relative_path,
                    name, kind, language, start_line, end_line,
                    parent_name, signature, return_type, imports, parameters, called_names
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
                params![
                    id,
                    document,
                    embedding_to_blob(embedding),
                    meta.file_path,
                    meta.project_root,
                    meta.relative_path,
                    meta.name,
                    meta.kind.as_str(),
                    meta.language.as_str(),
                    meta.start_line as i64,
                    meta.end_line as i64,
                    meta.parent_name,
                    meta.signature,
                    meta.return_type,
                    meta.imports,
                    meta.parameters,
                    meta.called_names,
                ],
            )?;
        }
        tx.commit().map_err(StoreError::Database)?;
        debug!("Stored {} documents", ids.len());
        Ok(())
    }

    /// Embed the query and rank stored documents by L2 distance, optionally
    /// restricted to one project root.
    pub fn query(
        &self,
        text: &str,
        k: usize,
        project_root: Option<&str>,
    ) -> Result<Vec<VectorHit>, StoreError> {
        let query_vec = self.embedder.embed(text)?;
        let conn = self.get_conn()?;

        let mut hits = Vec::new();
        let mut scan = |row: &Row| -> rusqlite::Result<()> {
            let id: String = row.get(0)?;
            let document: String = row.get(1)?;
            let blob: Vec<u8> = row.get(2)?;
            let metadata = row_to_metadata(row, 3)?;
            let distance = l2_distance(&query_vec, &blob_to_embedding(&blob));
            hits.push(VectorHit { id, document, metadata, distance });
            Ok(())
        };

        if let Some(root) = project_root {
            let mut stmt = conn.prepare(&format!(
                "SELECT id, document, embedding, {} FROM documents WHERE project_root = ?1",
                METADATA_COLUMNS
            ))?;
            let mut rows = stmt.query([root])?;
            while let Some(row) = rows.next()? {
                scan(row)?;
            }
        } else {
            let mut stmt = conn.prepare(&format!(
                "SELECT id, document, embedding, {} FROM documents",
                METADATA_COLUMNS
            ))?;
            let mut rows = stmt.query([])?;
            while let Some(row) = rows.next()? {
                scan(row)?;
            }
        }

        hits.sort_by(|a, b| a.distance.partial_cmp(&b.distance).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(k);
        Ok(hits)
    }

    /// Full dump for resyncing the lexical index: (id, document, file_path)
    pub fn get_all(&self) -> Result<Vec<(String, String, String)>, StoreError> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare("SELECT id, document, file_path FROM documents")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Documents defined under a name, optionally narrowed by kind
    pub fn get_by_name(
        &self,
        name: &str,
        kind: Option<SymbolKind>,
    ) -> Result<Vec<IndexedDocument>, StoreError> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT id, document, {} FROM documents WHERE name = ?1",
            METADATA_COLUMNS
        );
        let mut docs = Vec::new();
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query([name])?;
        while let Some(row) = rows.next()? {
            docs.push(row_to_document(row)?);
        }
        if let Some(kind) = kind {
            docs.retain(|d| d.metadata.kind == kind);
        }
        Ok(docs)
    }

    /// Documents whose file path equals `path` or starts with it (directory)
    pub fn get_by_path_prefix(&self, path: &str) -> Result<Vec<IndexedDocument>, StoreError> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT id, document, {} FROM documents
             WHERE file_path = ?1 OR file_path LIKE ?2
             ORDER BY file_path, start_line",
            METADATA_COLUMNS
        );
        let prefix = format!("{}/%", path.trim_end_matches('/'));
        let mut docs = Vec::new();
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query(params![path, prefix])?;
        while let Some(row) = rows.next()? {
            docs.push(row_to_document(row)?);
        }
        Ok(docs)
    }

    /// Remove every document indexed from a file (exact path match)
    pub fn delete_by_file_path(&self, file_path: &str) -> Result<usize, StoreError> {
        let conn = self.get_conn()?;
        let removed = conn.execute("DELETE FROM documents WHERE file_path = ?1", [file_path])?;
        Ok(removed)
    }

    /// Remove every document belonging to a project root
    pub fn delete_by_project(&self, project_root: &str) -> Result<usize, StoreError> {
        let conn = self.get_conn()?;
        let removed =
            conn.execute("DELETE FROM documents WHERE project_root = ?1", [project_root])?;
        Ok(removed)
    }

    pub fn count(&self) -> Result<usize, StoreError> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Distinct file count, for stats reporting
    pub fn file_count(&self) -> Result<usize, StoreError> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(DISTINCT file_path) FROM documents",
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Drop and recreate all tables
    pub fn reset(&self) -> Result<(), StoreError> {
        info!("Resetting vector store at {}", self.db_path.display());
        let conn = self.get_conn()?;
        drop_schema(&conn)?;
        init_schema(&conn)?;
        Ok(())
    }

    pub fn embedder_name(&self) -> &'static str {
        self.embedder.name()
    }
}

const METADATA_COLUMNS: &str = "file_path, project_root, relative_path, name, kind, language, \
     start_line, end_line, parent_name, signature, return_type, imports, parameters, called_names";

fn row_to_metadata(row: &Row, offset: usize) -> rusqlite::Result<DocMetadata> {
    let kind_str: String = row.get(offset + 4)?;
    let language_str: String = row.get(offset + 5)?;
    Ok(DocMetadata {
        file_path: row.get(offset)?,
        project_root: row.get(offset + 1)?,
        relative_path: row.get(offset + 2)?,
        name: row.get(offset + 3)?,
        kind: SymbolKind::parse(&kind_str).map_err(|_| {
            rusqlite::Error::FromSqlConversionFailure(
                offset + 4,
                rusqlite::types::Type::Text,
                format!("bad kind: {}", kind_str).into(),
            )
        })?,
        language: match language_str.as_str() {
            "python" => Language::Python,
            "c" => Language::C,
            "cpp" => Language::Cpp,
            other => {
                return Err(rusqlite::Error::FromSqlConversionFailure(
                    offset + 5,
                    rusqlite::types::Type::Text,
                    format!("bad language: {}", other).into(),
                ))
            }
        },
        start_line: row.get::<_, i64>(offset + 6)? as usize,
        end_line: row.get::<_, i64>(offset + 7)? as usize,
        parent_name: row.get(offset + 8)?,
        signature: row.get(offset + 9)?,
        return_type: row.get(offset + 10)?,
        imports: row.get(offset + 11)?,
        parameters: row.get(offset + 12)?,
        called_names: row.get(offset + 13)?,
    })
}

fn row_to_document(row: &Row) -> rusqlite::Result<IndexedDocument> {
    Ok(IndexedDocument {
        id: row.get(0)?,
        document: row.get(1)?,
        metadata: row_to_metadata(row, 2)?,
    })
}

fn embedding_to_blob(embedding: &[f32]) -> Vec<u8> {
    let mut blob = Vec::with_capacity(embedding.len() * 4);
    for value in embedding {
        blob.extend_from_slice(&value.to_le_bytes());
    }
    blob
}

fn blob_to_embedding(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

fn l2_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::embed::HashingEmbedder;
    use tempfile::tempdir;

    fn meta(file_path: &str, name: &str) -> DocMetadata {
        DocMetadata {
            file_path: file_path.to_string(),
            project_root: "/proj".to_string(),
            relative_path: file_path.trim_start_matches("/proj/").to_string(),
            name: name.to_string(),
            kind: SymbolKind::Function,
            language: Language::Python,
            start_line: 0,
            end_line: 2,
            parent_name: None,
            signature: Some(format!("def {}()", name)),
            return_type: None,
            imports: None,
            parameters: None,
            called_names: None,
        }
    }

    fn open_store(dir: &Path) -> VectorStore {
        VectorStore::new(dir.join("index.db"), Arc::new(HashingEmbedder::new(64))).unwrap()
    }

    #[test]
    fn test_add_query_roundtrip() {
        let dir = tempdir().unwrap();
        let store = open_store(dir.path());

        store
            .add(
                &["id1".to_string(), "id2".to_string()],
                &[
                    "parse configuration from toml file".to_string(),
                    "render triangles to the screen".to_string(),
                ],
                &[meta("/proj/config.py", "load_config"), meta("/proj/gfx.py", "render")],
            )
            .unwrap();

        let hits = store.query("parse toml configuration", 2, None).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "id1", "closest match should rank first");
        assert!(hits[0].distance <= hits[1].distance);
    }

    #[test]
    fn test_project_filter() {
        let dir = tempdir().unwrap();
        let store = open_store(dir.path());

        let mut other = meta("/elsewhere/x.py", "stray");
        other.project_root = "/elsewhere".to_string();
        store
            .add(
                &["a".to_string(), "b".to_string()],
                &["alpha beta".to_string(), "alpha beta".to_string()],
                &[meta("/proj/a.py", "local"), other],
            )
            .unwrap();

        let hits = store.query("alpha", 10, Some("/proj")).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].metadata.project_root, "/proj");
    }

    #[test]
    fn test_delete_by_file_and_project() {
        let dir = tempdir().unwrap();
        let store = open_store(dir.path());

        store
            .add(
                &["a".to_string(), "b".to_string()],
                &["one".to_string(), "two".to_string()],
                &[meta("/proj/a.py", "fa"), meta("/proj/b.py", "fb")],
            )
            .unwrap();

        assert_eq!(store.delete_by_file_path("/proj/a.py").unwrap(), 1);
        assert_eq!(store.count().unwrap(), 1);

        assert_eq!(store.delete_by_project("/proj").unwrap(), 1);
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn test_replace_same_id() {
        let dir = tempdir().unwrap();
        let store = open_store(dir.path());

        store
            .add(&["x".to_string()], &["old text".to_string()], &[meta("/proj/a.py", "f")])
            .unwrap();
        store
            .add(&["x".to_string()], &["new text".to_string()], &[meta("/proj/a.py", "f")])
            .unwrap();

        assert_eq!(store.count().unwrap(), 1);
        let dump = store.get_all().unwrap();
        assert_eq!(dump[0].1, "new text");
    }

    #[test]
    fn test_get_by_name_and_kind() {
        let dir = tempdir().unwrap();
        let store = open_store(dir.path());

        let mut class_meta = meta("/proj/a.py", "Widget");
        class_meta.kind = SymbolKind::Class;
        store
            .add(
                &["f".to_string(), "c".to_string()],
                &["def Widget".to_string(), "class Widget".to_string()],
                &[meta("/proj/a.py", "Widget"), class_meta],
            )
            .unwrap();

        assert_eq!(store.get_by_name("Widget", None).unwrap().len(), 2);
        let classes = store.get_by_name("Widget", Some(SymbolKind::Class)).unwrap();
        assert_eq!(classes.len(), 1);
        assert_eq!(classes[0].id, "c");
    }

    #[test]
    fn test_get_by_path_prefix() {
        let dir = tempdir().unwrap();
        let store = open_store(dir.path());

        store
            .add(
                &["a".to_string(), "b".to_string()],
                &["one".to_string(), "two".to_string()],
                &[meta("/proj/sub/a.py", "fa"), meta("/proj/other.py", "fo")],
            )
            .unwrap();

        let docs = store.get_by_path_prefix("/proj/sub").unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].metadata.name, "fa");

        // Exact file path works too
        let docs = store.get_by_path_prefix("/proj/other.py").unwrap();
        assert_eq!(docs.len(), 1);
    }

    #[test]
    fn test_reset() {
        let dir = tempdir().unwrap();
        let store = open_store(dir.path());
        store
            .add(&["a".to_string()], &["one".to_string()], &[meta("/proj/a.py", "f")])
            .unwrap();
        store.reset().unwrap();
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn test_embedding_blob_roundtrip() {
        let original = vec![0.5f32, -1.25, 3.0];
        let blob = embedding_to_blob(&original);
        assert_eq!(blob_to_embedding(&blob), original);
    }
}
