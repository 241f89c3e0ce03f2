use std::io::Write;

use anyhow::Result;
use tracing::info;

use crate::index::registry::Registry;

pub async fn reset_index(project: String, all: bool, yes: bool) -> Result<()> {
    let ctx = super::open_project(&project)?;
    let root = ctx.project_root.to_string_lossy().to_string();

    if !yes {
        print!(
            "This will delete {} indexed data for {}. Continue? [y/N]: ",
            if all { "ALL" } else { "this project's" },
            ctx.project_root.display()
        );
        std::io::stdout().flush()?;
        let mut answer = String::new();
        std::io::stdin().read_line(&mut answer)?;
        if !answer.trim().eq_ignore_ascii_case("y") {
            println!("Operation cancelled.");
            return Ok(());
        }
    }

    if all {
        ctx.vector.reset()?;
        if ctx.registry_path.exists() {
            std::fs::remove_file(&ctx.registry_path)?;
        }
    } else {
        // Scoped to this project root: other projects sharing the store survive
        let removed = ctx.vector.delete_by_project(&root)?;
        let mut registry = Registry::load(&ctx.registry_path);
        registry.remove_project(&root);
        registry.save(&ctx.registry_path)?;
        info!("Removed {} documents for {}", removed, root);
    }

    if ctx.graph_path.exists() {
        std::fs::remove_file(&ctx.graph_path)?;
    }

    info!("Index reset for {}", root);
    println!("Index reset. Run 'symdex index' to rebuild.");

    Ok(())
}
