// Indexing orchestration: discovery, diffing, strategy fan-out

pub mod parser;
pub mod strategy;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use parking_lot::RwLock;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use crate::config::Config;
use crate::index::registry::{build_file_record, Registry};
use crate::index::{identity, Language};
use crate::store::graph::{GraphStore, ResolutionStats};
use crate::store::lexical::LexicalStore;
use crate::store::vector::VectorStore;
use parser::SourceParser;
use strategy::{GraphStrategy, IndexStrategy, LexicalStrategy, VectorStrategy};

/// Directory names never descended into during discovery
const SKIP_DIRS: &[&str] = &[
    "target",
    "build",
    "node_modules",
    "venv",
    ".venv",
    "__pycache__",
    "dist",
    "vendor",
];

/// Per-run tallies reported back to the caller
#[derive(Debug, Default)]
pub struct IndexReport {
    pub files_indexed: usize,
    pub files_skipped: usize,
    pub files_deleted: usize,
    pub errors: usize,
    pub symbols_indexed: usize,
    pub parse_issues: usize,
    pub resolution: ResolutionStats,
}

/// Drives one indexing run: discovers files, diffs them against the
/// registry, fans changed files out to all three strategies, then runs the
/// edge-resolution barrier once and persists everything.
pub struct ProjectIndexer {
    project_root: PathBuf,
    config: Config,
    parsers: Vec<Box<dyn SourceParser>>,
    strategies: Vec<Box<dyn IndexStrategy>>,
    graph: Arc<RwLock<GraphStore>>,
    registry_path: PathBuf,
    graph_path: PathBuf,
}

impl ProjectIndexer {
    pub fn new(
        project_root: impl AsRef<Path>,
        config: Config,
        vector: Arc<VectorStore>,
        lexical: Arc<RwLock<LexicalStore>>,
        graph: Arc<RwLock<GraphStore>>,
        registry_path: PathBuf,
        graph_path: PathBuf,
    ) -> Result<Self> {
        let project_root = project_root
            .as_ref()
            .canonicalize()
            .with_context(|| format!("Project root not found: {}", project_root.as_ref().display()))?;
        let root_str = project_root.to_string_lossy().to_string();

        let strategies: Vec<Box<dyn IndexStrategy>> = vec![
            Box::new(VectorStrategy::new(vector, root_str)),
            Box::new(LexicalStrategy::new(lexical)),
            Box::new(GraphStrategy::new(graph.clone())),
        ];

        Ok(Self {
            project_root,
            config,
            parsers: parser::all_parsers(),
            strategies,
            graph,
            registry_path,
            graph_path,
        })
    }

    fn parser_for(&self, file_path: &str) -> Option<&dyn SourceParser> {
        self.parsers
            .iter()
            .find(|p| p.can_parse(file_path))
            .map(|p| p.as_ref())
    }

    /// Walk the project tree collecting indexable files. Hidden directories
    /// and well-known build/vendor directories are skipped by name.
    pub fn discover_files(&self) -> Vec<String> {
        let enabled = self.config.enabled_languages();
        let mut files = Vec::new();
        let walker = WalkDir::new(&self.project_root).into_iter().filter_entry(|entry| {
            let name = entry.file_name().to_string_lossy();
            if entry.depth() == 0 {
                return true;
            }
            if name.starts_with('.') {
                return false;
            }
            if entry.file_type().is_dir() && SKIP_DIRS.contains(&name.as_ref()) {
                return false;
            }
            true
        });

        for entry in walker.filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            let path_str = entry.path().to_string_lossy().to_string();
            let Some(language) = Language::from_path(&path_str) else {
                continue;
            };
            if !enabled.iter().any(|l| l == language.as_str()) {
                continue;
            }
            if !self.config.should_index_file(&path_str) {
                continue;
            }
            files.push(path_str);
        }
        files.sort();
        files
    }

    /// Run one full indexing pass over the project
    pub fn index_project(&self) -> Result<IndexReport> {
        let root_str = self.project_root.to_string_lossy().to_string();
        info!("Indexing project at {}", root_str);

        let discovered = self.discover_files();
        debug!("Discovered {} candidate files", discovered.len());

        let mut registry = Registry::load(&self.registry_path);
        let mut manifest = registry.project_files(&root_str);
        let delta = registry.diff(&root_str, &discovered);

        let mut report = IndexReport::default();
        report.errors += delta.errors.len();
        for (path, reason) in &delta.errors {
            error!("Cannot stat or hash {}: {}", path, reason);
        }

        if delta.is_empty() {
            info!("No changes detected, nothing to index");
        }

        // Deleted or modified files are evicted from every store first, so
        // re-indexed content never coexists with stale entries.
        for path in delta.deleted.iter().chain(&delta.modified) {
            self.delete_file(path);
            manifest.remove(path);
            if delta.deleted.contains(path) {
                report.files_deleted += 1;
            }
        }

        let to_index: Vec<&String> = delta.added.iter().chain(&delta.modified).collect();
        report.files_skipped = discovered.len() - to_index.len();
        let bar = ProgressBar::new(to_index.len() as u64);
        bar.set_style(
            ProgressStyle::with_template("{spinner} [{bar:30}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );

        for path in to_index {
            bar.set_message(
                Path::new(path)
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default(),
            );
            match self.index_file(path) {
                Ok((symbols, issues)) => {
                    report.files_indexed += 1;
                    report.symbols_indexed += symbols;
                    report.parse_issues += issues;
                    match build_file_record(Path::new(path)) {
                        Ok(record) => {
                            manifest.insert(path.clone(), record);
                        }
                        Err(e) => {
                            warn!("Indexed {} but could not record it: {}", path, e);
                            report.errors += 1;
                        }
                    }
                }
                Err(e) => {
                    error!("Failed to index {}: {:#}", path, e);
                    report.errors += 1;
                }
            }
            bar.inc(1);
        }
        bar.finish_and_clear();

        // Persist the registry before resolution: resolution only touches
        // the graph, and a crash there heals on the next diff.
        registry.update_project(&root_str, manifest);
        registry.save(&self.registry_path)?;

        // Global barrier: resolution needs every file of the run in the
        // graph, so it runs exactly once, after the loop.
        report.resolution = self.graph.write().resolve_edges();
        self.graph
            .read()
            .save(&self.graph_path)
            .context("Failed to persist graph snapshot")?;

        info!(
            "Indexing complete: {} indexed, {} skipped, {} errors, {} symbols",
            report.files_indexed, report.files_skipped, report.errors, report.symbols_indexed
        );
        Ok(report)
    }

    /// Evict one file from every store. Failures are logged, not fatal:
    /// the next run re-detects and repairs.
    fn delete_file(&self, file_path: &str) {
        for strategy in &self.strategies {
            if let Err(e) = strategy.delete(file_path) {
                error!("{} strategy failed to delete {}: {:#}", strategy.name(), file_path, e);
            }
        }
    }

    /// Parse, assign ids, and fan one file out to all strategies.
    /// Returns (symbols indexed, parse issues).
    fn index_file(&self, file_path: &str) -> Result<(usize, usize)> {
        let parser = self
            .parser_for(file_path)
            .ok_or_else(|| anyhow::anyhow!("No parser for {}", file_path))?;
        let source = std::fs::read_to_string(file_path)
            .with_context(|| format!("Failed to read {}", file_path))?;

        let outcome = parser.parse(file_path, &source);
        for issue in &outcome.issues {
            debug!("Parse issue at {}:{}: {}", issue.file_path, issue.line + 1, issue.reason);
        }

        let mut records = outcome.records;
        identity::assign_ids(&mut records);

        for strategy in &self.strategies {
            strategy
                .index(file_path, &records)
                .with_context(|| format!("{} strategy failed", strategy.name()))?;
        }

        debug!("Indexed {} symbols from {}", records.len(), file_path);
        Ok((records.len(), outcome.issues.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::SearchEngine;
    use crate::store::embed::HashingEmbedder;
    use std::fs;
    use tempfile::tempdir;

    struct Fixture {
        _data_dir: tempfile::TempDir,
        project_dir: tempfile::TempDir,
        vector: Arc<VectorStore>,
        lexical: Arc<RwLock<LexicalStore>>,
        graph: Arc<RwLock<GraphStore>>,
        indexer: ProjectIndexer,
    }

    fn fixture() -> Fixture {
        let data_dir = tempdir().unwrap();
        let project_dir = tempdir().unwrap();

        let vector = Arc::new(
            VectorStore::new(
                data_dir.path().join("index.db"),
                Arc::new(HashingEmbedder::new(64)),
            )
            .unwrap(),
        );
        let lexical = Arc::new(RwLock::new(LexicalStore::new()));
        let graph = Arc::new(RwLock::new(GraphStore::new()));

        let indexer = ProjectIndexer::new(
            project_dir.path(),
            Config::default(),
            vector.clone(),
            lexical.clone(),
            graph.clone(),
            data_dir.path().join("registry.json"),
            data_dir.path().join("graph.json"),
        )
        .unwrap();

        Fixture { _data_dir: data_dir, project_dir, vector, lexical, graph, indexer }
    }

    #[test]
    fn test_end_to_end_two_file_project() {
        let fx = fixture();
        let a = fx.project_dir.path().join("a.py");
        let b = fx.project_dir.path().join("b.py");
        fs::write(&a, "def helper():\n    return 1\n").unwrap();
        fs::write(&b, "def main():\n    return helper()\n").unwrap();

        let report = fx.indexer.index_project().unwrap();
        assert_eq!(report.files_indexed, 2);
        assert_eq!(report.symbols_indexed, 2);
        assert_eq!(report.errors, 0);
        assert_eq!(report.resolution.edges_added, 1);

        // Call graph: main -> helper
        let callers = fx.graph.read().callers("helper");
        assert_eq!(callers.len(), 1);
        assert_eq!(callers[0].name, "main");

        // Hybrid search over the indexed pair returns results
        let engine = SearchEngine::new(fx.vector.clone(), fx.lexical.clone()).unwrap();
        let hits = engine.hybrid_search("helper", 1, 0.7, None).unwrap();
        assert_eq!(hits.len(), 1);

        // Re-index with changed content: helper's id must change
        let old_id = fx
            .vector
            .get_by_name("helper", None)
            .unwrap()
            .pop()
            .unwrap()
            .id;
        fs::write(&a, "def helper():\n    return 2\n").unwrap();
        let report = fx.indexer.index_project().unwrap();
        assert_eq!(report.files_indexed, 1);

        let new_id = fx
            .vector
            .get_by_name("helper", None)
            .unwrap()
            .pop()
            .unwrap()
            .id;
        assert_ne!(old_id, new_id);
    }

    #[test]
    fn test_incremental_touch_only_affected_file() {
        let fx = fixture();
        let a = fx.project_dir.path().join("a.py");
        let b = fx.project_dir.path().join("b.py");
        fs::write(&a, "def first():\n    return 1\n").unwrap();
        fs::write(&b, "def second():\n    return 2\n").unwrap();
        fx.indexer.index_project().unwrap();

        let untouched_id = fx.vector.get_by_name("second", None).unwrap()[0].id.clone();

        fs::write(&a, "def first():\n    return 100\n").unwrap();
        let report = fx.indexer.index_project().unwrap();
        assert_eq!(report.files_indexed, 1, "only the changed file re-indexes");

        // The untouched file's entry is byte-identical
        let still = fx.vector.get_by_name("second", None).unwrap();
        assert_eq!(still.len(), 1);
        assert_eq!(still[0].id, untouched_id);
    }

    #[test]
    fn test_deletion_completeness() {
        let fx = fixture();
        let a = fx.project_dir.path().join("gone.py");
        fs::write(&a, "def vanishing():\n    return 1\n").unwrap();
        fx.indexer.index_project().unwrap();
        assert_eq!(fx.vector.count().unwrap(), 1);

        fs::remove_file(&a).unwrap();
        let report = fx.indexer.index_project().unwrap();
        assert_eq!(report.files_deleted, 1);

        assert_eq!(fx.vector.count().unwrap(), 0);
        assert!(fx.lexical.read().is_empty());
        assert_eq!(fx.graph.read().symbol_count(), 0);
        let registry = Registry::load(&fx.indexer.registry_path);
        let root = fx.indexer.project_root.to_string_lossy().to_string();
        assert!(registry.project_files(&root).is_empty());
    }

    #[test]
    fn test_noop_rerun() {
        let fx = fixture();
        fs::write(fx.project_dir.path().join("a.py"), "def f():\n    return 1\n").unwrap();
        fx.indexer.index_project().unwrap();

        let report = fx.indexer.index_project().unwrap();
        assert_eq!(report.files_indexed, 0);
        assert_eq!(report.files_deleted, 0);
        assert_eq!(report.errors, 0);
    }

    #[test]
    fn test_bad_file_does_not_abort_run() {
        let fx = fixture();
        fs::write(fx.project_dir.path().join("ok.py"), "def fine():\n    return 1\n").unwrap();
        // Thoroughly broken file still parses best-effort and never panics
        fs::write(fx.project_dir.path().join("bad.py"), "def ((((\n????\n").unwrap();

        let report = fx.indexer.index_project().unwrap();
        assert!(report.files_indexed >= 1);
        assert!(fx.vector.get_by_name("fine", None).unwrap().len() == 1);
    }

    #[test]
    fn test_discovery_skips_hidden_and_build_dirs() {
        let fx = fixture();
        let root = fx.project_dir.path();
        fs::create_dir_all(root.join("src")).unwrap();
        fs::create_dir_all(root.join(".git")).unwrap();
        fs::create_dir_all(root.join("build")).unwrap();
        fs::create_dir_all(root.join("__pycache__")).unwrap();
        fs::write(root.join("src/keep.py"), "def keep(): pass\n").unwrap();
        fs::write(root.join(".git/skip.py"), "def skip(): pass\n").unwrap();
        fs::write(root.join("build/skip.py"), "def skip(): pass\n").unwrap();
        fs::write(root.join("__pycache__/skip.py"), "def skip(): pass\n").unwrap();
        fs::write(root.join("notes.txt"), "not code").unwrap();

        let files = fx.indexer.discover_files();
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("keep.py"));
    }

    #[test]
    fn test_graph_snapshot_persisted() {
        let fx = fixture();
        fs::write(
            fx.project_dir.path().join("a.py"),
            "def a():\n    return b()\n\ndef b():\n    return 1\n",
        )
        .unwrap();
        fx.indexer.index_project().unwrap();

        let loaded = GraphStore::load(&fx.indexer.graph_path).unwrap();
        assert_eq!(loaded.symbol_count(), 2);
        assert_eq!(loaded.callers("b").len(), 1);
    }
}
