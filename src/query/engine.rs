// Query execution engine

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;
use parking_lot::RwLock;

use crate::index::{IndexedDocument, SymbolKind};
use crate::store::graph::{ChainDirection, GraphStore, SymbolNode};
use crate::store::vector::VectorStore;

/// One row of a structural query result
#[derive(Debug, Clone, serde::Serialize)]
pub struct QueryResult {
    pub symbol_id: String,
    pub name: String,
    pub file: String,
    pub line: usize,
    pub kind: String,
}

impl From<&SymbolNode> for QueryResult {
    fn from(node: &SymbolNode) -> Self {
        Self {
            symbol_id: node.id.clone(),
            name: node.name.clone(),
            file: node.file_path.clone(),
            line: node.start_line,
            kind: node.kind.as_str().to_string(),
        }
    }
}

/// Symbols of one file, grouped for the module summary
#[derive(Debug, Clone)]
pub struct ModuleSummary {
    pub path: String,
    pub total_symbols: usize,
    /// file path -> (kind, name, start_line, end_line, signature?)
    pub by_file: BTreeMap<String, Vec<SummaryEntry>>,
}

#[derive(Debug, Clone)]
pub struct SummaryEntry {
    pub kind: SymbolKind,
    pub name: String,
    pub start_line: usize,
    pub end_line: usize,
    pub signature: Option<String>,
}

/// Read-side facade over the call graph and symbol metadata
pub struct QueryEngine {
    graph: Arc<RwLock<GraphStore>>,
    vector: Arc<VectorStore>,
}

impl QueryEngine {
    pub fn new(graph: Arc<RwLock<GraphStore>>, vector: Arc<VectorStore>) -> Self {
        Self { graph, vector }
    }

    /// Symbols that call `name`
    pub fn get_callers(&self, name: &str) -> Vec<QueryResult> {
        self.graph.read().callers(name).iter().map(QueryResult::from).collect()
    }

    /// Symbols that `name` calls
    pub fn get_callees(&self, name: &str) -> Vec<QueryResult> {
        self.graph.read().callees(name).iter().map(QueryResult::from).collect()
    }

    /// Depth-limited transitive call chain, one Vec per hop
    pub fn get_call_chain(
        &self,
        name: &str,
        direction: ChainDirection,
        max_depth: usize,
    ) -> Vec<Vec<QueryResult>> {
        self.graph
            .read()
            .call_chain(name, direction, max_depth)
            .iter()
            .map(|level| level.iter().map(QueryResult::from).collect())
            .collect()
    }

    /// Definition lookup by symbol name, optionally narrowed by kind
    pub fn get_symbol_definition(
        &self,
        name: &str,
        kind: Option<SymbolKind>,
    ) -> Result<Vec<IndexedDocument>> {
        Ok(self.vector.get_by_name(name, kind)?)
    }

    /// High-level symbol summary for a file or directory path
    pub fn get_module_summary(&self, path: &str) -> Result<ModuleSummary> {
        let docs = self.vector.get_by_path_prefix(path)?;
        let total_symbols = docs.len();

        let mut by_file: BTreeMap<String, Vec<SummaryEntry>> = BTreeMap::new();
        for doc in docs {
            by_file
                .entry(doc.metadata.file_path.clone())
                .or_default()
                .push(SummaryEntry {
                    kind: doc.metadata.kind,
                    name: doc.metadata.name,
                    start_line: doc.metadata.start_line,
                    end_line: doc.metadata.end_line,
                    signature: doc.metadata.signature,
                });
        }
        for entries in by_file.values_mut() {
            entries.sort_by(|a, b| {
                a.kind
                    .as_str()
                    .cmp(b.kind.as_str())
                    .then(a.start_line.cmp(&b.start_line))
            });
        }

        Ok(ModuleSummary { path: path.to_string(), total_symbols, by_file })
    }
}
