//! Hand-rolled BM25 over an in-memory inverted index (spec.md §4.D).
//!
//! Computed in Rust rather than delegated to SQLite FTS5's `bm25()` so
//! the ranking formula (and its constants) are pinned exactly, not at
//! the mercy of whatever SQLite version is linked.

use std::collections::HashMap;

use crate::node::NodeId;

pub const K1: f64 = 1.5;
pub const B: f64 = 0.75;

/// Split on anything that isn't alphanumeric, lowercase ASCII. Good
/// enough for a keyword index; the tokenizer used for embeddings is a
/// separate, stricter pipeline (see [`crate::tokenizer`]).
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_lowercase())
        .collect()
}

#[derive(Debug, Default)]
pub struct Bm25Index {
    postings: HashMap<String, HashMap<NodeId, u32>>,
    doc_len: HashMap<NodeId, u32>,
    total_len: u64,
}

impl Bm25Index {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn doc_count(&self) -> usize {
        self.doc_len.len()
    }

    pub fn avg_doc_len(&self) -> f64 {
        if self.doc_len.is_empty() {
            0.0
        } else {
            self.total_len as f64 / self.doc_len.len() as f64
        }
    }

    /// Index (or re-index) a document's text. Call [`remove_document`]
    /// first if the text changed.
    pub fn index_document(&mut self, id: NodeId, text: &str) {
        let terms = tokenize(text);
        let len = terms.len() as u32;
        self.doc_len.insert(id, len);
        self.total_len += len as u64;

        let mut tf: HashMap<String, u32> = HashMap::new();
        for term in terms {
            *tf.entry(term).or_insert(0) += 1;
        }
        for (term, count) in tf {
            self.postings.entry(term).or_default().insert(id, count);
        }
    }

    pub fn remove_document(&mut self, id: NodeId) {
        if let Some(len) = self.doc_len.remove(&id) {
            self.total_len = self.total_len.saturating_sub(len as u64);
        }
        for postings in self.postings.values_mut() {
            postings.remove(&id);
        }
        self.postings.retain(|_, postings| !postings.is_empty());
    }

    /// Smoothed IDF: `ln((N - df + 0.5)/(df + 0.5) + 1)` (spec.md §4.D).
    fn idf(&self, term: &str) -> f64 {
        let n = self.doc_count() as f64;
        let df = self.postings.get(term).map(|p| p.len()).unwrap_or(0) as f64;
        ((n - df + 0.5) / (df + 0.5) + 1.0).ln()
    }

    /// Score and rank all documents containing at least one query term,
    /// returning the top `k` by descending BM25 score.
    pub fn search(&self, query: &str, k: usize) -> Vec<(NodeId, f64)> {
        if self.doc_len.is_empty() {
            return Vec::new();
        }
        let avgdl = self.avg_doc_len().max(1e-9);
        let query_terms = tokenize(query);
        let mut scores: HashMap<NodeId, f64> = HashMap::new();

        for term in &query_terms {
            let Some(postings) = self.postings.get(term) else {
                continue;
            };
            let idf = self.idf(term);
            for (&id, &tf) in postings {
                let doc_len = *self.doc_len.get(&id).unwrap_or(&0) as f64;
                let tf = tf as f64;
                let denom = tf + K1 * (1.0 - B + B * doc_len / avgdl);
                let contribution = idf * (tf * (K1 + 1.0)) / denom;
                *scores.entry(id).or_insert(0.0) += contribution;
            }
        }

        let mut ranked: Vec<(NodeId, f64)> = scores.into_iter().collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        ranked.truncate(k);
        ranked
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn term_present_in_one_document_only_is_found() {
        let mut idx = Bm25Index::new();
        let a = NodeId::new();
        let b = NodeId::new();
        idx.index_document(a, "rust memory engine retrieval");
        idx.index_document(b, "completely unrelated text about gardening");

        let hits = idx.search("memory engine", 10);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0, a);
    }

    #[test]
    fn longer_document_is_penalised_for_equal_term_frequency() {
        let mut idx = Bm25Index::new();
        let short = NodeId::new();
        let long = NodeId::new();
        idx.index_document(short, "memory memory");
        idx.index_document(
            long,
            "memory memory padding padding padding padding padding padding padding padding",
        );

        let hits = idx.search("memory", 10);
        assert_eq!(hits[0].0, short);
    }

    #[test]
    fn removing_a_document_drops_it_from_results() {
        let mut idx = Bm25Index::new();
        let a = NodeId::new();
        idx.index_document(a, "ephemeral content");
        assert_eq!(idx.search("ephemeral", 10).len(), 1);
        idx.remove_document(a);
        assert_eq!(idx.search("ephemeral", 10).len(), 0);
    }

    #[test]
    fn empty_index_returns_no_hits() {
        let idx = Bm25Index::new();
        assert!(idx.search("anything", 10).is_empty());
    }
}
