// In-memory BM25 index over symbol text

use std::collections::{BTreeMap, HashMap};

use tracing::debug;

/// Term frequency saturation
const K1: f32 = 1.2;
/// Document length normalization
const B: f32 = 0.75;

/// Split on any non-alphanumeric/non-underscore character and lowercase.
/// Tuned for identifier-heavy code text rather than natural language.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_ascii_alphanumeric() && c != '_')
        .filter(|w| !w.is_empty())
        .map(|w| w.to_ascii_lowercase())
        .collect()
}

#[derive(Debug, Clone)]
struct Posting {
    doc_id: String,
    tf: u32,
}

/// Lexical store: keeps the full document map and rebuilds the BM25
/// inverted index whenever the corpus changes. Acceptable for moderate
/// corpus sizes; incremental posting-list maintenance is the known scaling
/// follow-up, not a correctness issue.
#[derive(Debug, Default)]
pub struct LexicalStore {
    documents: BTreeMap<String, String>,
    /// file path per document, so a file's entries can be evicted
    paths: HashMap<String, String>,
    inverted: HashMap<String, Vec<Posting>>,
    doc_lengths: HashMap<String, u32>,
    avg_doc_length: f32,
}

impl LexicalStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Add or replace documents and rebuild the index
    pub fn add(&mut self, ids: &[String], documents: &[String], file_paths: &[String]) {
        if ids.is_empty() {
            return;
        }
        for ((id, doc), path) in ids.iter().zip(documents).zip(file_paths) {
            self.documents.insert(id.clone(), doc.clone());
            self.paths.insert(id.clone(), path.clone());
        }
        self.rebuild();
    }

    /// Remove documents by id and rebuild the index
    pub fn delete(&mut self, ids: &[String]) {
        let mut changed = false;
        for id in ids {
            changed |= self.documents.remove(id).is_some();
            self.paths.remove(id);
        }
        if changed {
            self.rebuild();
        }
    }

    /// Ids of every document that came from `file_path`
    pub fn ids_for_file(&self, file_path: &str) -> Vec<String> {
        self.paths
            .iter()
            .filter(|(_, p)| p.as_str() == file_path)
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Replace the whole corpus from a store dump (id, document, file path)
    pub fn sync_from(&mut self, entries: Vec<(String, String, String)>) {
        self.documents.clear();
        self.paths.clear();
        for (id, doc, path) in entries {
            self.documents.insert(id.clone(), doc);
            self.paths.insert(id, path);
        }
        self.rebuild();
        debug!("Lexical index rebuilt with {} documents", self.documents.len());
    }

    fn rebuild(&mut self) {
        self.inverted.clear();
        self.doc_lengths.clear();

        for (id, doc) in &self.documents {
            let tokens = tokenize(doc);
            self.doc_lengths.insert(id.clone(), tokens.len() as u32);

            let mut freqs: HashMap<String, u32> = HashMap::new();
            for token in tokens {
                *freqs.entry(token).or_insert(0) += 1;
            }
            for (term, tf) in freqs {
                self.inverted
                    .entry(term)
                    .or_default()
                    .push(Posting { doc_id: id.clone(), tf });
            }
        }

        let total = self.documents.len();
        self.avg_doc_length = if total > 0 {
            self.doc_lengths.values().map(|l| *l as u64).sum::<u64>() as f32 / total as f32
        } else {
            0.0
        };
    }

    /// BM25 scores for the query; zero-score entries are omitted
    pub fn search(&self, query: &str) -> HashMap<String, f32> {
        let mut scores: HashMap<String, f32> = HashMap::new();
        if self.documents.is_empty() {
            return scores;
        }

        let total_docs = self.documents.len() as f32;
        for term in tokenize(query) {
            let Some(postings) = self.inverted.get(&term) else {
                continue;
            };
            let df = postings.len() as f32;
            let idf = ((total_docs - df + 0.5) / (df + 0.5) + 1.0).ln();

            for posting in postings {
                let doc_len = *self.doc_lengths.get(&posting.doc_id).unwrap_or(&0) as f32;
                let tf = posting.tf as f32;
                let numerator = tf * (K1 + 1.0);
                let denominator = tf + K1 * (1.0 - B + B * doc_len / self.avg_doc_length.max(1.0));
                *scores.entry(posting.doc_id.clone()).or_insert(0.0) += idf * numerator / denominator;
            }
        }

        scores.retain(|_, score| *score > 0.0);
        scores
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(docs: &[(&str, &str, &str)]) -> LexicalStore {
        let mut store = LexicalStore::new();
        let ids: Vec<String> = docs.iter().map(|(id, _, _)| id.to_string()).collect();
        let texts: Vec<String> = docs.iter().map(|(_, d, _)| d.to_string()).collect();
        let paths: Vec<String> = docs.iter().map(|(_, _, p)| p.to_string()).collect();
        store.add(&ids, &texts, &paths);
        store
    }

    #[test]
    fn test_tokenize_identifiers() {
        assert_eq!(tokenize("open_file(path)"), vec!["open_file", "path"]);
        assert_eq!(tokenize("Foo::bar->baz"), vec!["foo", "bar", "baz"]);
        assert_eq!(tokenize("  "), Vec::<String>::new());
    }

    #[test]
    fn test_search_ranks_matching_doc() {
        let store = store_with(&[
            ("d1", "def authenticate_user(token): validate(token)", "/p/auth.py"),
            ("d2", "def render_frame(buffer): draw(buffer)", "/p/gfx.py"),
        ]);

        let scores = store.search("authenticate token");
        assert!(scores.contains_key("d1"));
        assert!(!scores.contains_key("d2"), "zero-score entries must be omitted");
    }

    #[test]
    fn test_delete_removes_from_results() {
        let mut store = store_with(&[
            ("d1", "parse configuration file", "/p/a.py"),
            ("d2", "parse command line", "/p/b.py"),
        ]);
        store.delete(&["d1".to_string()]);
        let scores = store.search("configuration");
        assert!(scores.is_empty());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_ids_for_file() {
        let store = store_with(&[
            ("d1", "alpha", "/p/a.py"),
            ("d2", "beta", "/p/a.py"),
            ("d3", "gamma", "/p/b.py"),
        ]);
        let mut ids = store.ids_for_file("/p/a.py");
        ids.sort();
        assert_eq!(ids, vec!["d1", "d2"]);
    }

    #[test]
    fn test_sync_replaces_corpus() {
        let mut store = store_with(&[("old", "stale entry", "/p/old.py")]);
        store.sync_from(vec![(
            "new".to_string(),
            "fresh entry".to_string(),
            "/p/new.py".to_string(),
        )]);
        assert!(store.search("stale").is_empty());
        assert!(store.search("fresh").contains_key("new"));
    }

    #[test]
    fn test_search_skips_nonmatching_docs() {
        let store = store_with(&[
            ("d1", "buffer buffer buffer flush", "/p/a.c"),
            ("d2", "buffer flush", "/p/b.c"),
            ("d3", "buffer resize", "/p/c.c"),
        ]);
        let scores = store.search("flush");
        // "flush" appears in two of three docs; both must score, shorter doc higher
        assert!(scores["d2"] > 0.0);
        assert!(scores.get("d3").is_none());
    }

    #[test]
    fn test_empty_query() {
        let store = store_with(&[("d1", "something", "/p/a.py")]);
        assert!(store.search("").is_empty());
        assert!(store.search("???").is_empty());
    }
}
