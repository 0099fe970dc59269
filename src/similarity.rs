//! Cosine similarity against a corpus of known-spam samples (spec §4.4,
//! component C4).

use std::collections::HashMap;

/// An immutable (per load cycle) ordered sequence of token-count vectors,
/// one per learned spam sample.
#[derive(Debug, Clone, Default)]
pub struct SimilarityIndex {
    samples: Vec<HashMap<String, usize>>,
}

fn dot(a: &HashMap<String, usize>, b: &HashMap<String, usize>) -> f64 {
    let (smaller, larger) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    smaller
        .iter()
        .filter_map(|(token, &count)| larger.get(token).map(|&other| (count * other) as f64))
        .sum()
}

fn magnitude(v: &HashMap<String, usize>) -> f64 {
    v.values().map(|&c| (c * c) as f64).sum::<f64>().sqrt()
}

fn cosine_similarity(a: &HashMap<String, usize>, b: &HashMap<String, usize>) -> f64 {
    let denom = magnitude(a) * magnitude(b);
    if denom == 0.0 {
        return 0.0;
    }
    dot(a, b) / denom
}

impl SimilarityIndex {
    pub fn new() -> Self {
        SimilarityIndex::default()
    }

    pub fn from_samples(samples: Vec<HashMap<String, usize>>) -> Self {
        SimilarityIndex { samples }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn clone_samples(&self) -> Vec<HashMap<String, usize>> {
        self.samples.clone()
    }

    /// Returns the maximum cosine similarity between `candidate` and every
    /// learned sample, or `0.0` if there are no samples.
    pub fn similarity(&self, candidate: &HashMap<String, usize>) -> f64 {
        self.samples
            .iter()
            .map(|sample| cosine_similarity(candidate, sample))
            .fold(0.0, f64::max)
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;

    fn vec_of(pairs: &[(&str, usize)]) -> HashMap<String, usize> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn identical_vectors_are_maximally_similar() {
        let index = SimilarityIndex::from_samples(vec![vec_of(&[("win", 1), ("free", 1)])]);
        let similarity = index.similarity(&vec_of(&[("win", 1), ("free", 1)]));
        assert!((similarity - 1.0).abs() < 1e-9);
    }

    #[test]
    fn disjoint_vectors_are_not_similar() {
        let index = SimilarityIndex::from_samples(vec![vec_of(&[("win", 1)])]);
        let similarity = index.similarity(&vec_of(&[("hello", 1)]));
        assert_eq!(similarity, 0.0);
    }

    #[test]
    fn returns_the_maximum_across_samples() {
        let index = SimilarityIndex::from_samples(vec![
            vec_of(&[("hello", 1)]),
            vec_of(&[("win", 1), ("free", 1)]),
        ]);

        let similarity = index.similarity(&vec_of(&[("win", 1), ("free", 1)]));
        assert!((similarity - 1.0).abs() < 1e-9);
    }

    #[test]
    fn empty_index_has_zero_similarity() {
        let index = SimilarityIndex::new();
        assert_eq!(index.similarity(&vec_of(&[("a", 1)])), 0.0);
    }
}
