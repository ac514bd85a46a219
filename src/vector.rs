use crate::model::SearchHit;
use anyhow::{Result, bail};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Brute-force cosine similarity over element embeddings.
///
/// The dimension is fixed by the first vector added.
#[derive(Debug, Default, Clone)]
pub struct VectorIndex {
    dimension: Option<usize>,
    vectors: BTreeMap<String, Vec<f32>>,
}

impl VectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores (or replaces) one vector per id. Either every vector is
    /// accepted or none is.
    pub fn add(&mut self, ids: &[String], vectors: &[Vec<f32>]) -> Result<()> {
        if ids.len() != vectors.len() {
            bail!(
                "embedding count mismatch: {} ids, {} vectors",
                ids.len(),
                vectors.len()
            );
        }
        let mut dimension = self.dimension;
        for (id, vector) in ids.iter().zip(vectors) {
            if vector.is_empty() {
                bail!("empty embedding for {id}");
            }
            match dimension {
                Some(expected) if expected != vector.len() => {
                    bail!(
                        "embedding for {id} has dimension {}, expected {expected}",
                        vector.len()
                    );
                }
                _ => dimension = Some(vector.len()),
            }
        }
        self.dimension = dimension;
        for (id, vector) in ids.iter().zip(vectors) {
            self.vectors.insert(id.clone(), vector.clone());
        }
        Ok(())
    }

    /// Nearest `k` ids to `query`; a query of the wrong dimension or with
    /// zero norm matches nothing.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<SearchHit> {
        if k == 0 || self.dimension != Some(query.len()) {
            return Vec::new();
        }
        let query_norm = norm(query);
        if query_norm == 0.0 {
            return Vec::new();
        }
        let mut hits: Vec<SearchHit> = self
            .vectors
            .iter()
            .map(|(id, vector)| (id.clone(), cosine(query, query_norm, vector)))
            .collect();
        hits.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        hits.truncate(k);
        hits
    }

    pub fn vector(&self, id: &str) -> Option<&[f32]> {
        self.vectors.get(id).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }
}

fn norm(vector: &[f32]) -> f64 {
    vector
        .iter()
        .map(|x| f64::from(*x) * f64::from(*x))
        .sum::<f64>()
        .sqrt()
}

fn cosine(query: &[f32], query_norm: f64, other: &[f32]) -> f64 {
    let other_norm = norm(other);
    if other_norm == 0.0 {
        return 0.0;
    }
    let dot: f64 = query
        .iter()
        .zip(other)
        .map(|(a, b)| f64::from(*a) * f64::from(*b))
        .sum();
    dot / (query_norm * other_norm)
}
