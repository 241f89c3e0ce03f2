use anyhow::Result;

use crate::query::engine::{QueryEngine, QueryResult};
use crate::store::graph::ChainDirection;

pub async fn query_index(
    query_type: String,
    target: String,
    project: String,
    depth: usize,
    format: String,
) -> Result<()> {
    let ctx = super::open_project(&project)?;
    let engine = QueryEngine::new(ctx.graph.clone(), ctx.vector.clone());

    match query_type.as_str() {
        "callers" => {
            let results = engine.get_callers(&target);
            print_results(&format!("Callers of '{}'", target), &results, &format)?;
        }
        "callees" => {
            let results = engine.get_callees(&target);
            print_results(&format!("Callees of '{}'", target), &results, &format)?;
        }
        "chain" | "chain-up" => {
            let direction = if query_type == "chain-up" {
                ChainDirection::Callers
            } else {
                ChainDirection::Callees
            };
            let levels = engine.get_call_chain(&target, direction, depth);
            print_chain(&target, &levels, direction, &format)?;
        }
        other => {
            anyhow::bail!(
                "Unknown query type: {} (expected callers, callees, chain, chain-up)",
                other
            );
        }
    }

    Ok(())
}

fn print_results(title: &str, results: &[QueryResult], format: &str) -> Result<()> {
    if format == "json" {
        println!("{}", serde_json::to_string_pretty(results)?);
        return Ok(());
    }

    println!("{}:", title);
    if results.is_empty() {
        println!("  (none)");
        return Ok(());
    }
    for result in results {
        println!(
            "  [{}] {} ({}:{})",
            result.kind,
            result.name,
            result.file,
            result.line + 1
        );
    }
    Ok(())
}

fn print_chain(
    target: &str,
    levels: &[Vec<QueryResult>],
    direction: ChainDirection,
    format: &str,
) -> Result<()> {
    if format == "json" {
        println!("{}", serde_json::to_string_pretty(levels)?);
        return Ok(());
    }

    let label = match direction {
        ChainDirection::Callers => "called by",
        ChainDirection::Callees => "calls",
    };
    println!("Call chain from '{}':", target);
    if levels.is_empty() {
        println!("  (none)");
        return Ok(());
    }
    for (depth, level) in levels.iter().enumerate() {
        for result in level {
            println!(
                "  {}{} {} ({}:{})",
                "  ".repeat(depth),
                label,
                result.name,
                result.file,
                result.line + 1
            );
        }
    }
    Ok(())
}
