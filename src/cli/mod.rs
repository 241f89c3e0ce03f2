// CLI command implementations

pub mod index;
pub mod query;
pub mod reset;
pub mod search;
pub mod stats;
pub mod symbol;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use parking_lot::RwLock;

use crate::config::Config;
use crate::store::embed::HashingEmbedder;
use crate::store::graph::GraphStore;
use crate::store::lexical::LexicalStore;
use crate::store::vector::VectorStore;

/// Everything a command needs: config plus the opened stores
pub struct AppContext {
    pub config: Config,
    pub project_root: PathBuf,
    pub vector: Arc<VectorStore>,
    pub lexical: Arc<RwLock<LexicalStore>>,
    pub graph: Arc<RwLock<GraphStore>>,
    pub registry_path: PathBuf,
    pub graph_path: PathBuf,
}

/// Open (or create) the per-project data directory and its stores
pub fn open_project(project: &str) -> Result<AppContext> {
    let project_root = PathBuf::from(project)
        .canonicalize()
        .with_context(|| format!("Project directory not found: {}", project))?;
    let config = Config::from_project_dir(&project_root);
    let data_dir = config.data_dir(&project_root);

    let vector = Arc::new(VectorStore::new(
        data_dir.join("index.db"),
        Arc::new(HashingEmbedder::default()),
    )?);
    let lexical = Arc::new(RwLock::new(LexicalStore::new()));
    let graph_path = data_dir.join("graph.json");
    let graph = Arc::new(RwLock::new(GraphStore::load(&graph_path)?));

    Ok(AppContext {
        config,
        project_root,
        vector,
        lexical,
        graph,
        registry_path: data_dir.join("registry.json"),
        graph_path,
    })
}
