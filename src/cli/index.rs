use anyhow::Result;
use tracing::info;

use crate::indexer::ProjectIndexer;

pub async fn index_project(project: String) -> Result<()> {
    info!("Indexing project: {}", project);

    let ctx = super::open_project(&project)?;

    println!("Symdex Indexer");
    println!("Project: {}", ctx.project_root.display());
    println!("Languages: {}", ctx.config.enabled_languages().join(", "));
    println!("Embedder: {}", ctx.vector.embedder_name());

    let indexer = ProjectIndexer::new(
        &ctx.project_root,
        ctx.config.clone(),
        ctx.vector.clone(),
        ctx.lexical.clone(),
        ctx.graph.clone(),
        ctx.registry_path.clone(),
        ctx.graph_path.clone(),
    )?;

    let report = indexer.index_project()?;

    println!("\nIndexing complete!");
    println!("Files indexed:   {}", report.files_indexed);
    println!("Files unchanged: {}", report.files_skipped);
    println!("Files removed:   {}", report.files_deleted);
    println!("Errors:          {}", report.errors);
    println!("Symbols:         {}", report.symbols_indexed);
    if report.parse_issues > 0 {
        println!("Parse issues:    {} (rerun with --debug for details)", report.parse_issues);
    }
    println!(
        "Call edges:      {} resolved, {} added, {} unresolved",
        report.resolution.resolved, report.resolution.edges_added, report.resolution.unresolved
    );

    Ok(())
}
