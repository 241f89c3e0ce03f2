// Index strategies: one per backing store, all driven by the same ids

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use parking_lot::RwLock;
use tracing::debug;

use crate::index::{embedding_text, DocMetadata, SymbolRecord};
use crate::store::graph::GraphStore;
use crate::store::lexical::LexicalStore;
use crate::store::vector::VectorStore;

/// Capability interface every index maintainer implements. The orchestrator
/// holds a small fixed collection of these and fans each file batch out to
/// all of them.
pub trait IndexStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Index one file's records. Ids are already assigned.
    fn index(&self, file_path: &str, records: &[SymbolRecord]) -> Result<()>;

    /// Remove everything previously indexed for a file
    fn delete(&self, file_path: &str) -> Result<()>;
}

// ---------------------------------------------------------------------------
// Vector
// ---------------------------------------------------------------------------

pub struct VectorStrategy {
    store: Arc<VectorStore>,
    project_root: String,
}

impl VectorStrategy {
    pub fn new(store: Arc<VectorStore>, project_root: impl Into<String>) -> Self {
        Self { store, project_root: project_root.into() }
    }

    fn build_metadata(&self, file_path: &str, record: &SymbolRecord) -> DocMetadata {
        let relative_path = Path::new(file_path)
            .strip_prefix(&self.project_root)
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_else(|_| file_path.to_string());

        DocMetadata {
            file_path: file_path.to_string(),
            project_root: self.project_root.clone(),
            relative_path,
            name: record.name.clone(),
            kind: record.kind,
            language: record.language,
            start_line: record.start_line,
            end_line: record.end_line,
            parent_name: record.parent_name.clone(),
            signature: record.signature.clone(),
            return_type: record.return_type.clone(),
            imports: if record.imports.is_empty() {
                None
            } else {
                Some(truncate(&record.imports.join(", "), 1000))
            },
            parameters: if record.parameters.is_empty() {
                None
            } else {
                serde_json::to_string(&record.parameters).ok()
            },
            called_names: if record.called_symbol_names.is_empty() {
                None
            } else {
                Some(truncate(&record.called_symbol_names.join(", "), 1000))
            },
        }
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].to_string()
}

impl IndexStrategy for VectorStrategy {
    fn name(&self) -> &'static str {
        "vector"
    }

    fn index(&self, file_path: &str, records: &[SymbolRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let mut ids = Vec::with_capacity(records.len());
        let mut documents = Vec::with_capacity(records.len());
        let mut metadatas = Vec::with_capacity(records.len());

        for record in records {
            if record.id.is_empty() {
                debug!("Skipping record without id: {}", record.name);
                continue;
            }
            ids.push(record.id.clone());
            documents.push(embedding_text(record));
            metadatas.push(self.build_metadata(file_path, record));
        }

        self.store
            .add(&ids, &documents, &metadatas)
            .with_context(|| format!("vector index failed for {}", file_path))
    }

    fn delete(&self, file_path: &str) -> Result<()> {
        self.store
            .delete_by_file_path(file_path)
            .with_context(|| format!("vector delete failed for {}", file_path))?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Lexical
// ---------------------------------------------------------------------------

pub struct LexicalStrategy {
    store: Arc<RwLock<LexicalStore>>,
}

impl LexicalStrategy {
    pub fn new(store: Arc<RwLock<LexicalStore>>) -> Self {
        Self { store }
    }
}

impl IndexStrategy for LexicalStrategy {
    fn name(&self) -> &'static str {
        "lexical"
    }

    fn index(&self, file_path: &str, records: &[SymbolRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let mut ids = Vec::with_capacity(records.len());
        let mut documents = Vec::with_capacity(records.len());
        let mut paths = Vec::with_capacity(records.len());

        for record in records {
            if record.id.is_empty() {
                continue;
            }
            ids.push(record.id.clone());
            documents.push(embedding_text(record));
            paths.push(file_path.to_string());
        }

        self.store.write().add(&ids, &documents, &paths);
        Ok(())
    }

    fn delete(&self, file_path: &str) -> Result<()> {
        let mut store = self.store.write();
        let ids = store.ids_for_file(file_path);
        store.delete(&ids);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Graph
// ---------------------------------------------------------------------------

pub struct GraphStrategy {
    store: Arc<RwLock<GraphStore>>,
}

impl GraphStrategy {
    pub fn new(store: Arc<RwLock<GraphStore>>) -> Self {
        Self { store }
    }
}

impl IndexStrategy for GraphStrategy {
    fn name(&self) -> &'static str {
        "graph"
    }

    fn index(&self, file_path: &str, records: &[SymbolRecord]) -> Result<()> {
        self.store.write().add_file_symbols(file_path, records);
        Ok(())
    }

    fn delete(&self, file_path: &str) -> Result<()> {
        self.store.write().delete_file(file_path);
        Ok(())
    }
}
