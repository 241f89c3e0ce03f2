use anyhow::Result;

use crate::search::SearchEngine;

pub async fn search_code(
    project: String,
    query: String,
    n_results: Option<usize>,
    alpha: Option<f32>,
    scoped: bool,
) -> Result<()> {
    let ctx = super::open_project(&project)?;
    let n_results = n_results.unwrap_or(ctx.config.search.n_results);
    let alpha = alpha.unwrap_or(ctx.config.search.alpha);

    let engine = SearchEngine::new(ctx.vector.clone(), ctx.lexical.clone())?;
    let root = ctx.project_root.to_string_lossy().to_string();
    let project_filter = scoped.then_some(root.as_str());

    let results = engine.hybrid_search(&query, n_results, alpha, project_filter)?;

    println!("\nSearch results for: '{}'\n", query);
    if results.is_empty() {
        println!("No results found.");
        return Ok(());
    }

    for (i, hit) in results.iter().enumerate() {
        let meta = &hit.metadata;
        println!("--- Result {} (score: {:.2}) ---", i + 1, hit.score);
        println!(
            "File: {}:{}-{}",
            meta.file_path,
            meta.start_line + 1,
            meta.end_line + 1
        );
        println!("Kind: {}, Name: {}", meta.kind.as_str(), meta.name);
        let snippet = if hit.document.len() > 400 {
            let mut end = 400;
            while !hit.document.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}...", &hit.document[..end])
        } else {
            hit.document.clone()
        };
        println!("{}\n", snippet);
    }

    Ok(())
}
