// Hybrid retrieval: vector candidates re-ranked with lexical scores

use std::sync::Arc;

use anyhow::Result;
use parking_lot::RwLock;
use tracing::debug;

use crate::index::DocMetadata;
use crate::store::lexical::LexicalStore;
use crate::store::vector::VectorStore;

/// One ranked hybrid search result
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub id: String,
    pub document: String,
    pub metadata: DocMetadata,
    pub score: f32,
}

/// Fuses vector similarity and BM25 relevance over the same query.
///
/// This is a re-ranking design: lexical scores are only applied to the
/// vector-retrieved candidate set, so a lexical-only match outside the top
/// 2n vector hits stays unreachable even at alpha 0. That biases recall
/// toward the semantic side.
pub struct SearchEngine {
    vector: Arc<VectorStore>,
    lexical: Arc<RwLock<LexicalStore>>,
}

impl SearchEngine {
    /// Build the engine, rebuilding the lexical corpus from the vector
    /// store when it is empty (fresh process, persisted vector data).
    pub fn new(vector: Arc<VectorStore>, lexical: Arc<RwLock<LexicalStore>>) -> Result<Self> {
        {
            let mut lex = lexical.write();
            if lex.is_empty() {
                let dump = vector.get_all()?;
                if !dump.is_empty() {
                    debug!("Syncing lexical index from {} stored documents", dump.len());
                    lex.sync_from(dump);
                }
            }
        }
        Ok(Self { vector, lexical })
    }

    /// Weighted hybrid search. `alpha` = 1.0 is pure semantic ranking,
    /// 0.0 ranks the candidate set purely by normalized BM25.
    pub fn hybrid_search(
        &self,
        query: &str,
        n_results: usize,
        alpha: f32,
        project_root: Option<&str>,
    ) -> Result<Vec<SearchHit>> {
        let alpha = alpha.clamp(0.0, 1.0);

        // Over-fetch so lexical re-ranking has room to reorder
        let candidates = self.vector.query(query, n_results * 2, project_root)?;
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let bm25_scores = self.lexical.read().search(query);
        let max_bm25 = bm25_scores.values().cloned().fold(0.0f32, f32::max);

        let mut hits: Vec<SearchHit> = candidates
            .into_iter()
            .map(|candidate| {
                let vector_similarity = 1.0 / (1.0 + candidate.distance);
                let lexical_similarity = if max_bm25 > 0.0 {
                    bm25_scores.get(&candidate.id).cloned().unwrap_or(0.0) / max_bm25
                } else {
                    0.0
                };
                let score = alpha * vector_similarity + (1.0 - alpha) * lexical_similarity;
                SearchHit {
                    id: candidate.id,
                    document: candidate.document,
                    metadata: candidate.metadata,
                    score,
                }
            })
            .collect();

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(n_results);
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{Language, SymbolKind};
    use crate::store::embed::Embedder;
    use crate::store::StoreError;
    use tempfile::tempdir;

    /// Fixed-vector embedder: maps known texts to chosen unit vectors so
    /// distances are under test control.
    struct StaticEmbedder;

    impl Embedder for StaticEmbedder {
        fn dimensions(&self) -> usize {
            3
        }

        fn embed(&self, text: &str) -> Result<Vec<f32>, StoreError> {
            Ok(match text {
                t if t.contains("query-near-alpha") => vec![0.99, 0.1, 0.0],
                t if t.contains("alpha") => vec![1.0, 0.0, 0.0],
                t if t.contains("beta") => vec![0.8, 0.6, 0.0],
                _ => vec![0.0, 0.0, 1.0],
            })
        }

        fn name(&self) -> &'static str {
            "static"
        }
    }

    fn meta(name: &str) -> DocMetadata {
        DocMetadata {
            file_path: format!("/proj/{}.py", name),
            project_root: "/proj".to_string(),
            relative_path: format!("{}.py", name),
            name: name.to_string(),
            kind: SymbolKind::Function,
            language: Language::Python,
            start_line: 0,
            end_line: 1,
            parent_name: None,
            signature: None,
            return_type: None,
            imports: None,
            parameters: None,
            called_names: None,
        }
    }

    fn engine_with(
        docs: &[(&str, &str)],
    ) -> (SearchEngine, Arc<VectorStore>, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let vector = Arc::new(
            VectorStore::new(dir.path().join("index.db"), Arc::new(StaticEmbedder)).unwrap(),
        );
        let ids: Vec<String> = docs.iter().map(|(id, _)| id.to_string()).collect();
        let texts: Vec<String> = docs.iter().map(|(_, d)| d.to_string()).collect();
        let metas: Vec<DocMetadata> = docs.iter().map(|(id, _)| meta(id)).collect();
        vector.add(&ids, &texts, &metas).unwrap();

        let lexical = Arc::new(RwLock::new(LexicalStore::new()));
        let engine = SearchEngine::new(vector.clone(), lexical).unwrap();
        (engine, vector, dir)
    }

    #[test]
    fn test_alpha_one_is_pure_vector_ranking() {
        let (engine, _, _dir) = engine_with(&[
            ("a", "alpha function body"),
            ("b", "beta function body"),
        ]);

        // Vector-wise the query is nearest to "alpha"; lexically it only
        // mentions "beta". At alpha=1.0 the vector order must win.
        let hits = engine
            .hybrid_search("query-near-alpha beta beta beta", 2, 1.0, None)
            .unwrap();
        assert_eq!(hits[0].id, "a");
    }

    #[test]
    fn test_alpha_zero_ranks_candidates_lexically() {
        let (engine, _, _dir) = engine_with(&[
            ("a", "alpha function body"),
            ("b", "beta function body"),
        ]);

        let hits = engine
            .hybrid_search("query-near-alpha beta beta beta", 2, 0.0, None)
            .unwrap();
        // Both are in the candidate set; "beta" wins on BM25 alone
        assert_eq!(hits[0].id, "b");
        assert!(hits[0].score > hits[1].score);
    }

    #[test]
    fn test_empty_store_returns_empty() {
        let (engine, _, _dir) = engine_with(&[]);
        let hits = engine.hybrid_search("anything", 5, 0.7, None).unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn test_truncates_to_n_results() {
        let (engine, _, _dir) = engine_with(&[
            ("a", "alpha one"),
            ("b", "alpha two"),
            ("c", "alpha three"),
        ]);
        let hits = engine.hybrid_search("alpha", 2, 0.7, None).unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn test_lexical_synced_from_vector_dump() {
        let (engine, _, _dir) = engine_with(&[("a", "alpha searchable content")]);
        // alpha=0 still works because the lexical corpus was rebuilt
        let hits = engine.hybrid_search("alpha searchable", 1, 0.0, None).unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits[0].score > 0.0);
    }

    #[test]
    fn test_scores_bounded() {
        let (engine, _, _dir) = engine_with(&[("a", "alpha content"), ("b", "beta content")]);
        for alpha in [0.0, 0.3, 0.7, 1.0] {
            for hit in engine.hybrid_search("alpha beta", 5, alpha, None).unwrap() {
                assert!(hit.score >= 0.0 && hit.score <= 1.0, "score {} out of bounds", hit.score);
            }
        }
    }
}
