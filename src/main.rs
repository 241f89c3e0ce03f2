use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::Level;

mod cli;
mod config;
mod index;
mod indexer;
mod query;
mod search;
mod store;

#[derive(Parser)]
#[command(name = "symdex")]
#[command(version = "0.1.0")]
#[command(about = "Symbol-level code index with hybrid semantic + lexical retrieval", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Index (or incrementally re-index) a project
    Index {
        /// Project directory to index
        #[arg(default_value = ".")]
        project: String,
    },

    /// Hybrid semantic + lexical search over the indexed code
    Search {
        /// Query string
        query: String,

        /// Project directory
        #[arg(short, long, default_value = ".")]
        project: String,

        /// Number of results to return
        #[arg(short = 'k', long)]
        n_results: Option<usize>,

        /// Weight for the vector score (1.0 = semantic only, 0.0 = lexical only)
        #[arg(long)]
        alpha: Option<f32>,

        /// Restrict results to this project's root
        #[arg(long)]
        scoped: bool,
    },

    /// Query the call graph
    Query {
        /// Query type: callers, callees, chain, chain-up
        query_type: String,

        /// Target symbol name
        target: String,

        /// Project directory
        #[arg(short, long, default_value = ".")]
        project: String,

        /// Maximum traversal depth for chain queries
        #[arg(long, default_value_t = 3)]
        depth: usize,

        /// Output format: text, json
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Look up a symbol's definition
    Symbol {
        /// Symbol name
        name: String,

        /// Project directory
        #[arg(short, long, default_value = ".")]
        project: String,

        /// Narrow by kind (function, method, class, struct, ...)
        #[arg(short, long)]
        kind: Option<String>,
    },

    /// Summarize the indexed symbols of a file or directory
    Summary {
        /// File or directory path
        path: String,

        /// Project directory
        #[arg(short, long, default_value = ".")]
        project: String,
    },

    /// Show index statistics
    Stats {
        /// Project directory
        #[arg(short, long, default_value = ".")]
        project: String,
    },

    /// Delete indexed data for a project
    Reset {
        /// Project directory
        #[arg(short, long, default_value = ".")]
        project: String,

        /// Wipe the whole store instead of just this project's entries
        #[arg(long)]
        all: bool,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

fn init_logging(debug: bool, verbose: bool) {
    let level = if debug {
        Level::DEBUG
    } else if verbose {
        Level::INFO
    } else {
        Level::WARN
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.debug, cli.verbose);

    match cli.command {
        Commands::Index { project } => {
            cli::index::index_project(project).await?;
        }

        Commands::Search { query, project, n_results, alpha, scoped } => {
            cli::search::search_code(project, query, n_results, alpha, scoped).await?;
        }

        Commands::Query { query_type, target, project, depth, format } => {
            cli::query::query_index(query_type, target, project, depth, format).await?;
        }

        Commands::Symbol { name, project, kind } => {
            cli::symbol::show_definition(project, name, kind).await?;
        }

        Commands::Summary { path, project } => {
            cli::symbol::show_summary(project, path).await?;
        }

        Commands::Stats { project } => {
            cli::stats::show_stats(project).await?;
        }

        Commands::Reset { project, all, yes } => {
            cli::reset::reset_index(project, all, yes).await?;
        }
    }

    Ok(())
}
