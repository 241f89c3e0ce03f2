use anyhow::Result;

use crate::index::registry::Registry;

pub async fn show_stats(project: String) -> Result<()> {
    let ctx = super::open_project(&project)?;
    let root = ctx.project_root.to_string_lossy().to_string();

    let symbol_count = ctx.vector.count()?;
    let file_count = ctx.vector.file_count()?;
    let registered = Registry::load(&ctx.registry_path).project_files(&root).len();
    let graph = ctx.graph.read();

    println!("Index statistics for {}", ctx.project_root.display());
    println!("  Indexed symbols:  {}", symbol_count);
    println!("  Indexed files:    {}", file_count);
    println!("  Registered files: {}", registered);
    println!("  Graph nodes:      {}", graph.node_count());
    println!("  Graph symbols:    {}", graph.symbol_count());
    println!("  Graph edges:      {}", graph.edge_count());
    println!("  Unresolved edges: {}", graph.pending_edge_count());
    println!("  Embedder:         {}", ctx.vector.embedder_name());

    Ok(())
}
