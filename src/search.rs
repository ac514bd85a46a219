use crate::model::{CodeElement, SearchHit};
use crate::util;
use std::cmp::Ordering;
use std::collections::HashMap;

const K1: f64 = 1.5;
const B: f64 = 0.75;

/// Okapi BM25 over element name, code and docstring.
#[derive(Debug, Default, Clone)]
pub struct Bm25Index {
    doc_ids: Vec<String>,
    doc_lengths: Vec<usize>,
    /// term -> (document slot, term frequency)
    postings: HashMap<String, Vec<(usize, u32)>>,
    total_length: usize,
}

impl Bm25Index {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_elements<'a>(elements: impl IntoIterator<Item = &'a CodeElement>) -> Self {
        let mut index = Self::new();
        for element in elements {
            index.add_document(&element.id, &document_text(element));
        }
        index
    }

    pub fn add_document(&mut self, doc_id: &str, text: &str) {
        let tokens = util::tokenize(text);
        let slot = self.doc_ids.len();
        let mut counts: HashMap<String, u32> = HashMap::new();
        for token in &tokens {
            *counts.entry(token.clone()).or_insert(0) += 1;
        }
        for (term, tf) in counts {
            self.postings.entry(term).or_default().push((slot, tf));
        }
        self.doc_ids.push(doc_id.to_string());
        self.doc_lengths.push(tokens.len());
        self.total_length += tokens.len();
    }

    pub fn len(&self) -> usize {
        self.doc_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.doc_ids.is_empty()
    }

    /// Top `k` documents for `query`, best first; equal scores order by id.
    /// A query with no indexed terms yields nothing.
    pub fn search(&self, query: &str, k: usize) -> Vec<SearchHit> {
        if k == 0 || self.is_empty() {
            return Vec::new();
        }
        let mut terms = util::tokenize(query);
        terms.sort();
        terms.dedup();

        let n = self.len() as f64;
        let avg_len = (self.total_length as f64 / n).max(1.0);
        let mut scores: HashMap<usize, f64> = HashMap::new();
        for term in &terms {
            let Some(postings) = self.postings.get(term) else {
                continue;
            };
            let df = postings.len() as f64;
            let idf = ((n - df + 0.5) / (df + 0.5) + 1.0).ln();
            for &(slot, tf) in postings {
                let tf = f64::from(tf);
                let norm = 1.0 - B + B * self.doc_lengths[slot] as f64 / avg_len;
                *scores.entry(slot).or_insert(0.0) += idf * tf * (K1 + 1.0) / (tf + K1 * norm);
            }
        }

        let mut hits: Vec<SearchHit> = scores
            .into_iter()
            .map(|(slot, score)| (self.doc_ids[slot].clone(), score))
            .collect();
        hits.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        hits.truncate(k);
        hits
    }
}

fn document_text(element: &CodeElement) -> String {
    let mut text = String::with_capacity(element.name.len() + element.code.len() + 2);
    text.push_str(&element.name);
    text.push('\n');
    text.push_str(&element.code);
    if let Some(doc) = &element.docstring {
        text.push('\n');
        text.push_str(doc);
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index() -> Bm25Index {
        let mut index = Bm25Index::new();
        index.add_document("a", "parse config file");
        index.add_document("b", "render html template");
        index.add_document("c", "parse parse json parse");
        index.add_document("d", "open socket");
        index
    }

    #[test]
    fn ranks_by_term_frequency() {
        let hits = index().search("parse", 10);
        let ids: Vec<&str> = hits.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a"]);
        assert!(hits[0].1 > hits[1].1);
        assert!(hits.iter().all(|(_, score)| *score > 0.0));
    }

    #[test]
    fn unknown_and_empty_queries_find_nothing() {
        let index = index();
        assert!(index.search("xyznonexistent", 5).is_empty());
        assert!(index.search("", 5).is_empty());
        assert!(index.search("parse", 0).is_empty());
        assert!(Bm25Index::new().search("parse", 5).is_empty());
    }

    #[test]
    fn ties_break_by_id_and_truncate() {
        let mut index = Bm25Index::new();
        index.add_document("z", "alpha beta");
        index.add_document("m", "alpha beta");
        index.add_document("q", "gamma");
        let hits = index.search("ALPHA", 1);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0, "m");
    }
}
