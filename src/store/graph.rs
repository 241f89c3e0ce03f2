// Directed symbol-call graph with two-phase edge resolution

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::{EdgeRef, IntoEdgeReferences};
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::index::{SymbolKind, SymbolRecord};

/// Call-graph node payload for a real, indexed symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolNode {
    pub id: String,
    pub file_path: String,
    pub name: String,
    pub kind: SymbolKind,
    pub start_line: usize,
}

/// A node is either an indexed symbol or a placeholder for a bare callee
/// name that has not been resolved yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GraphNode {
    Symbol(SymbolNode),
    Pending(String),
}

/// Edge kinds: provisional name-only edges become `Calls` edges during the
/// resolution pass and must not outlive it when resolvable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    CallsByName,
    Calls,
}

/// Direction for call-chain traversal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainDirection {
    Callers,
    Callees,
}

/// Counts reported by one resolution pass
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ResolutionStats {
    /// Provisional edges replaced by real edges
    pub resolved: usize,
    /// Real edges added (fan-out can add several per provisional edge)
    pub edges_added: usize,
    /// Provisional edges with no matching symbol anywhere in the graph
    pub unresolved: usize,
}

/// Serialized snapshot layout
#[derive(Serialize, Deserialize)]
struct GraphSnapshot {
    nodes: Vec<GraphNode>,
    /// (source position, target position, kind) into `nodes`
    edges: Vec<(usize, usize, EdgeKind)>,
}

/// In-memory call graph. Nodes are symbols keyed by id plus transient
/// name placeholders; edges carry the provisional/resolved kind.
#[derive(Debug, Default)]
pub struct GraphStore {
    graph: StableDiGraph<GraphNode, EdgeKind>,
    by_id: HashMap<String, NodeIndex>,
    pending_by_name: HashMap<String, NodeIndex>,
}

impl GraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn symbol_count(&self) -> usize {
        self.by_id.len()
    }

    /// Provisional edges still waiting for resolution
    pub fn pending_edge_count(&self) -> usize {
        self.graph
            .edge_references()
            .filter(|e| *e.weight() == EdgeKind::CallsByName)
            .count()
    }

    /// Add one file's symbols: a node per record plus one provisional edge
    /// per called name, pointing at a shared placeholder node.
    pub fn add_file_symbols(&mut self, file_path: &str, records: &[SymbolRecord]) {
        for record in records {
            if record.id.is_empty() {
                continue;
            }
            let node = SymbolNode {
                id: record.id.clone(),
                file_path: file_path.to_string(),
                name: record.name.clone(),
                kind: record.kind,
                start_line: record.start_line,
            };
            let idx = match self.by_id.get(&record.id) {
                Some(idx) => {
                    self.graph[*idx] = GraphNode::Symbol(node);
                    *idx
                }
                None => {
                    let idx = self.graph.add_node(GraphNode::Symbol(node));
                    self.by_id.insert(record.id.clone(), idx);
                    idx
                }
            };

            for callee in &record.called_symbol_names {
                let target = self.pending_node(callee);
                if !self.has_edge(idx, target, EdgeKind::CallsByName) {
                    self.graph.add_edge(idx, target, EdgeKind::CallsByName);
                }
            }
        }
    }

    fn has_edge(&self, from: NodeIndex, to: NodeIndex, kind: EdgeKind) -> bool {
        self.graph
            .edges_directed(from, Direction::Outgoing)
            .any(|e| e.target() == to && *e.weight() == kind)
    }

    fn pending_node(&mut self, name: &str) -> NodeIndex {
        if let Some(idx) = self.pending_by_name.get(name) {
            return *idx;
        }
        let idx = self.graph.add_node(GraphNode::Pending(name.to_string()));
        self.pending_by_name.insert(name.to_string(), idx);
        idx
    }

    /// Remove every symbol node belonging to a file. Edges between
    /// survivors are untouched; placeholder nodes left without any edge
    /// are pruned.
    pub fn delete_file(&mut self, file_path: &str) {
        let doomed: Vec<NodeIndex> = self
            .graph
            .node_indices()
            .filter(|idx| match &self.graph[*idx] {
                GraphNode::Symbol(node) => node.file_path == file_path,
                GraphNode::Pending(_) => false,
            })
            .collect();

        for idx in doomed {
            if let GraphNode::Symbol(node) = &self.graph[idx] {
                self.by_id.remove(&node.id);
            }
            self.graph.remove_node(idx);
        }
        self.prune_orphan_placeholders();
    }

    fn prune_orphan_placeholders(&mut self) {
        let orphans: Vec<(String, NodeIndex)> = self
            .pending_by_name
            .iter()
            .filter(|(_, idx)| {
                self.graph.edges_directed(**idx, Direction::Incoming).next().is_none()
                    && self.graph.edges_directed(**idx, Direction::Outgoing).next().is_none()
            })
            .map(|(name, idx)| (name.clone(), *idx))
            .collect();
        for (name, idx) in orphans {
            self.graph.remove_node(idx);
            self.pending_by_name.remove(&name);
        }
    }

    /// Resolve provisional edges against every symbol currently in the
    /// graph. A bare name matching several symbols fans out to an edge per
    /// match (minus self-loops); that trades precision for recall on
    /// purpose. Idempotent: running twice adds nothing new.
    pub fn resolve_edges(&mut self) -> ResolutionStats {
        let mut name_to_ids: HashMap<String, Vec<NodeIndex>> = HashMap::new();
        for idx in self.graph.node_indices() {
            if let GraphNode::Symbol(node) = &self.graph[idx] {
                name_to_ids.entry(node.name.clone()).or_default().push(idx);
            }
        }

        // Collect first: resolution mutates the edge set
        let provisional: Vec<(petgraph::stable_graph::EdgeIndex, NodeIndex, String)> = self
            .graph
            .edge_references()
            .filter(|e| *e.weight() == EdgeKind::CallsByName)
            .filter_map(|e| match &self.graph[e.target()] {
                GraphNode::Pending(name) => Some((e.id(), e.source(), name.clone())),
                GraphNode::Symbol(_) => None,
            })
            .collect();

        let mut stats = ResolutionStats::default();
        for (edge_id, source, name) in provisional {
            let Some(targets) = name_to_ids.get(&name) else {
                stats.unresolved += 1;
                continue;
            };

            self.graph.remove_edge(edge_id);
            stats.resolved += 1;

            for target in targets {
                if *target == source {
                    continue;
                }
                if !self.has_edge(source, *target, EdgeKind::Calls) {
                    self.graph.add_edge(source, *target, EdgeKind::Calls);
                    stats.edges_added += 1;
                }
            }
        }

        self.prune_orphan_placeholders();
        info!(
            "Edge resolution: {} provisional edges resolved into {} call edges, {} unresolved remain",
            stats.resolved, stats.edges_added, stats.unresolved
        );
        stats
    }

    fn symbols_named(&self, name: &str) -> Vec<NodeIndex> {
        self.graph
            .node_indices()
            .filter(|idx| matches!(&self.graph[*idx], GraphNode::Symbol(n) if n.name == name))
            .collect()
    }

    fn symbol_at(&self, idx: NodeIndex) -> Option<&SymbolNode> {
        match &self.graph[idx] {
            GraphNode::Symbol(node) => Some(node),
            GraphNode::Pending(_) => None,
        }
    }

    /// Symbols with a resolved `Calls` edge into any symbol named `name`
    pub fn callers(&self, name: &str) -> Vec<SymbolNode> {
        let mut result = Vec::new();
        for target in self.symbols_named(name) {
            for edge in self.graph.edges_directed(target, Direction::Incoming) {
                if *edge.weight() != EdgeKind::Calls {
                    continue;
                }
                if let Some(node) = self.symbol_at(edge.source()) {
                    if !result.contains(node) {
                        result.push(node.clone());
                    }
                }
            }
        }
        result
    }

    /// Symbols any symbol named `name` has a resolved `Calls` edge into
    pub fn callees(&self, name: &str) -> Vec<SymbolNode> {
        let mut result = Vec::new();
        for source in self.symbols_named(name) {
            for edge in self.graph.edges_directed(source, Direction::Outgoing) {
                if *edge.weight() != EdgeKind::Calls {
                    continue;
                }
                if let Some(node) = self.symbol_at(edge.target()) {
                    if !result.contains(node) {
                        result.push(node.clone());
                    }
                }
            }
        }
        result
    }

    /// Breadth-first call chain from `name`, one Vec per depth level
    pub fn call_chain(
        &self,
        name: &str,
        direction: ChainDirection,
        max_depth: usize,
    ) -> Vec<Vec<SymbolNode>> {
        let petgraph_dir = match direction {
            ChainDirection::Callers => Direction::Incoming,
            ChainDirection::Callees => Direction::Outgoing,
        };

        let mut visited: std::collections::HashSet<NodeIndex> = std::collections::HashSet::new();
        let mut frontier = self.symbols_named(name);
        visited.extend(frontier.iter().copied());

        let mut levels = Vec::new();
        for _ in 0..max_depth {
            let mut next = Vec::new();
            for idx in &frontier {
                for edge in self.graph.edges_directed(*idx, petgraph_dir) {
                    if *edge.weight() != EdgeKind::Calls {
                        continue;
                    }
                    let neighbor = match petgraph_dir {
                        Direction::Incoming => edge.source(),
                        Direction::Outgoing => edge.target(),
                    };
                    if visited.insert(neighbor) {
                        next.push(neighbor);
                    }
                }
            }
            if next.is_empty() {
                break;
            }
            levels.push(
                next.iter()
                    .filter_map(|idx| self.symbol_at(*idx).cloned())
                    .collect(),
            );
            frontier = next;
        }
        levels
    }

    /// Serialize the graph to a JSON snapshot
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut positions: HashMap<NodeIndex, usize> = HashMap::new();
        let mut nodes = Vec::with_capacity(self.graph.node_count());
        for idx in self.graph.node_indices() {
            positions.insert(idx, nodes.len());
            nodes.push(self.graph[idx].clone());
        }
        let edges = self
            .graph
            .edge_references()
            .map(|e| (positions[&e.source()], positions[&e.target()], *e.weight()))
            .collect();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let snapshot = GraphSnapshot { nodes, edges };
        let json = serde_json::to_string(&snapshot)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write graph snapshot {}", path.display()))?;
        debug!(
            "Graph snapshot saved: {} nodes, {} edges",
            self.graph.node_count(),
            self.graph.edge_count()
        );
        Ok(())
    }

    /// Load a snapshot; a missing file yields an empty graph
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("No graph snapshot at {}, starting fresh", path.display());
            return Ok(Self::new());
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read graph snapshot {}", path.display()))?;
        let snapshot: GraphSnapshot = serde_json::from_str(&raw)
            .with_context(|| format!("Invalid graph snapshot {}", path.display()))?;

        let mut store = Self::new();
        let mut indices = Vec::with_capacity(snapshot.nodes.len());
        for node in snapshot.nodes {
            let idx = store.graph.add_node(node.clone());
            match node {
                GraphNode::Symbol(sym) => {
                    store.by_id.insert(sym.id, idx);
                }
                GraphNode::Pending(name) => {
                    store.pending_by_name.insert(name, idx);
                }
            }
            indices.push(idx);
        }
        for (from, to, kind) in snapshot.edges {
            store.graph.add_edge(indices[from], indices[to], kind);
        }
        info!(
            "Graph snapshot loaded: {} nodes, {} edges",
            store.graph.node_count(),
            store.graph.edge_count()
        );
        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::Language;
    use tempfile::tempdir;

    fn record(name: &str, file: &str, calls: &[&str]) -> SymbolRecord {
        SymbolRecord {
            id: format!("{}::{}", file, name),
            kind: SymbolKind::Function,
            name: name.to_string(),
            file_path: file.to_string(),
            start_line: 0,
            end_line: 3,
            raw_content: format!("def {}(): pass", name),
            language: Language::Python,
            docstring: None,
            signature: None,
            return_type: None,
            parameters: vec![],
            parent_name: None,
            imports: vec![],
            called_symbol_names: calls.iter().map(|c| c.to_string()).collect(),
        }
    }

    fn two_file_graph() -> GraphStore {
        let mut store = GraphStore::new();
        store.add_file_symbols("/p/a.py", &[record("helper", "/p/a.py", &[])]);
        store.add_file_symbols("/p/b.py", &[record("main", "/p/b.py", &["helper", "missing"])]);
        store
    }

    #[test]
    fn test_resolution_creates_call_edge() {
        let mut store = two_file_graph();
        assert_eq!(store.pending_edge_count(), 2);

        let stats = store.resolve_edges();
        assert_eq!(stats.resolved, 1);
        assert_eq!(stats.edges_added, 1);
        assert_eq!(stats.unresolved, 1);

        let callers = store.callers("helper");
        assert_eq!(callers.len(), 1);
        assert_eq!(callers[0].name, "main");

        let callees = store.callees("main");
        assert_eq!(callees.len(), 1);
        assert_eq!(callees[0].name, "helper");
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let mut store = two_file_graph();
        store.resolve_edges();
        let edges_after_first = store.edge_count();

        let stats = store.resolve_edges();
        assert_eq!(stats.resolved, 0);
        assert_eq!(stats.edges_added, 0);
        assert_eq!(store.edge_count(), edges_after_first);
    }

    #[test]
    fn test_ambiguous_name_fans_out() {
        let mut store = GraphStore::new();
        store.add_file_symbols("/p/a.py", &[record("save", "/p/a.py", &[])]);
        store.add_file_symbols("/p/b.py", &[record("save", "/p/b.py", &[])]);
        store.add_file_symbols("/p/c.py", &[record("main", "/p/c.py", &["save"])]);

        let stats = store.resolve_edges();
        assert_eq!(stats.resolved, 1);
        assert_eq!(stats.edges_added, 2, "ambiguous names resolve to every match");
        assert_eq!(store.callees("main").len(), 2);
    }

    #[test]
    fn test_self_loop_excluded() {
        let mut store = GraphStore::new();
        store.add_file_symbols("/p/a.py", &[record("recurse", "/p/a.py", &["recurse"])]);
        let stats = store.resolve_edges();
        assert_eq!(stats.resolved, 1);
        assert_eq!(stats.edges_added, 0);
        assert!(store.callers("recurse").is_empty());
    }

    #[test]
    fn test_delete_file_keeps_survivor_edges() {
        let mut store = GraphStore::new();
        store.add_file_symbols("/p/a.py", &[record("a", "/p/a.py", &["b"])]);
        store.add_file_symbols("/p/b.py", &[record("b", "/p/b.py", &["c"])]);
        store.add_file_symbols("/p/c.py", &[record("c", "/p/c.py", &[])]);
        store.resolve_edges();

        store.delete_file("/p/a.py");
        assert!(store.callers("b").is_empty());
        // b -> c survives untouched
        assert_eq!(store.callers("c").len(), 1);
        assert_eq!(store.symbol_count(), 2);
    }

    #[test]
    fn test_orphan_placeholder_pruned() {
        let mut store = GraphStore::new();
        store.add_file_symbols("/p/a.py", &[record("a", "/p/a.py", &["phantom"])]);
        assert_eq!(store.node_count(), 2);

        store.delete_file("/p/a.py");
        assert_eq!(store.node_count(), 0, "placeholder with no edges must be pruned");
    }

    #[test]
    fn test_call_chain_levels() {
        let mut store = GraphStore::new();
        store.add_file_symbols("/p/a.py", &[record("top", "/p/a.py", &["mid"])]);
        store.add_file_symbols("/p/b.py", &[record("mid", "/p/b.py", &["leaf"])]);
        store.add_file_symbols("/p/c.py", &[record("leaf", "/p/c.py", &[])]);
        store.resolve_edges();

        let chain = store.call_chain("top", ChainDirection::Callees, 5);
        assert_eq!(chain.len(), 2);
        assert_eq!(chain[0][0].name, "mid");
        assert_eq!(chain[1][0].name, "leaf");

        let up = store.call_chain("leaf", ChainDirection::Callers, 1);
        assert_eq!(up.len(), 1);
        assert_eq!(up[0][0].name, "mid");
    }

    #[test]
    fn test_snapshot_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("graph.json");

        let mut store = two_file_graph();
        store.resolve_edges();
        store.save(&path).unwrap();

        let loaded = GraphStore::load(&path).unwrap();
        assert_eq!(loaded.node_count(), store.node_count());
        assert_eq!(loaded.edge_count(), store.edge_count());
        assert_eq!(loaded.callers("helper")[0].name, "main");
    }

    #[test]
    fn test_load_missing_snapshot() {
        let dir = tempdir().unwrap();
        let store = GraphStore::load(&dir.path().join("nope.json")).unwrap();
        assert_eq!(store.node_count(), 0);
    }

    #[test]
    fn test_reindex_same_file_replaces_nodes() {
        let mut store = GraphStore::new();
        store.add_file_symbols("/p/a.py", &[record("f", "/p/a.py", &[])]);
        store.delete_file("/p/a.py");
        store.add_file_symbols("/p/a.py", &[record("g", "/p/a.py", &[])]);
        assert_eq!(store.symbol_count(), 1);
        assert!(store.symbols_named("f").is_empty());
        assert_eq!(store.symbols_named("g").len(), 1);
    }
}
