// Backing stores: vector (embedding + metadata), lexical (BM25), graph (calls)

pub mod embed;
pub mod graph;
pub mod lexical;
pub mod schema;
pub mod vector;

use thiserror::Error;

/// Store-level failures surfaced to the orchestrator
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("embedding backend failed: {0}")]
    Embedding(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),
}
