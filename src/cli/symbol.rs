use anyhow::Result;

use crate::index::SymbolKind;
use crate::query::engine::QueryEngine;

pub async fn show_definition(project: String, name: String, kind: Option<String>) -> Result<()> {
    let ctx = super::open_project(&project)?;
    let engine = QueryEngine::new(ctx.graph.clone(), ctx.vector.clone());

    let kind = kind.map(|k| SymbolKind::parse(&k)).transpose()?;
    let docs = engine.get_symbol_definition(&name, kind)?;

    if docs.is_empty() {
        println!(
            "No definition found for '{}'{}. The symbol may not be indexed.",
            name,
            kind.map(|k| format!(" (kind={})", k.as_str())).unwrap_or_default()
        );
        return Ok(());
    }

    println!("Found {} definition(s) for '{}':", docs.len(), name);
    for (i, doc) in docs.iter().enumerate() {
        let meta = &doc.metadata;
        println!("\n--- Match {} ---", i + 1);
        println!("Name: {}", meta.name);
        println!("Kind: {}", meta.kind.as_str());
        println!("File: {}", meta.file_path);
        println!("Lines: {}-{}", meta.start_line + 1, meta.end_line + 1);
        if let Some(signature) = &meta.signature {
            println!("Signature: {}", signature);
        }
        let content = if doc.document.len() > 2000 {
            let mut end = 2000;
            while !doc.document.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}...", &doc.document[..end])
        } else {
            doc.document.clone()
        };
        println!("Content:\n{}", content);
    }

    Ok(())
}

pub async fn show_summary(project: String, path: String) -> Result<()> {
    let ctx = super::open_project(&project)?;
    let engine = QueryEngine::new(ctx.graph.clone(), ctx.vector.clone());

    // Resolve relative paths against the current directory, not the project
    let abs_path = std::fs::canonicalize(&path)
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or(path);

    let summary = engine.get_module_summary(&abs_path)?;
    if summary.total_symbols == 0 {
        println!("No indexed symbols found for '{}'.", summary.path);
        return Ok(());
    }

    println!(
        "Module summary for '{}' ({} symbols):",
        summary.path, summary.total_symbols
    );
    for (file, entries) in &summary.by_file {
        println!("\n  {}:", file);
        for entry in entries {
            let detail = entry
                .signature
                .as_ref()
                .map(|s| format!(" :: {}", s))
                .unwrap_or_default();
            println!(
                "    [{}] {} (L{}-{}){}",
                entry.kind.as_str(),
                entry.name,
                entry.start_line + 1,
                entry.end_line + 1,
                detail
            );
        }
    }

    Ok(())
}
