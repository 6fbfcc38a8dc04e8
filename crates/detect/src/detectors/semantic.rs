use super::{Comparison, Detector, SimilarityScore};
use crate::candidate::Candidate;
use crate::embedding::cosine_similarity;
use rayon::prelude::*;

const CONFIDENCE: f32 = 0.95;

/// Cosine similarity over embedding vectors. The most expensive and the
/// only comparison that catches behavioral duplicates written with
/// different names and structure.
///
/// Candidates without a stored or freshly computed embedding are
/// skipped here; the framework is responsible for populating vectors
/// before detection runs.
pub struct SemanticDetector {
    floor: f32,
}

impl SemanticDetector {
    pub fn new(floor: f32) -> Self {
        Self { floor }
    }
}

impl Detector for SemanticDetector {
    fn name(&self) -> &'static str {
        "semantic"
    }

    fn comparison(&self) -> Comparison {
        Comparison::Semantic
    }

    fn compare(&self, candidates: &[Candidate]) -> Vec<SimilarityScore> {
        let embedded: Vec<(&Candidate, &ndarray::Array1<f32>)> = candidates
            .iter()
            .filter_map(|c| c.embedding.as_ref().map(|e| (c, e)))
            .collect();

        embedded
            .par_iter()
            .enumerate()
            .flat_map_iter(|(i, (a, vec_a))| {
                let floor = self.floor;
                embedded[i + 1..].iter().filter_map(move |(b, vec_b)| {
                    if vec_a.len() != vec_b.len() {
                        return None;
                    }
                    let score = cosine_similarity(vec_a, vec_b).clamp(0.0, 1.0);
                    if score < floor {
                        return None;
                    }
                    Some(SimilarityScore::new(
                        &a.symbol.qualified_name,
                        &b.symbol.qualified_name,
                        score,
                        Comparison::Semantic,
                        CONFIDENCE,
                    ))
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array1;
    use symbols::{Symbol, SymbolKind};

    fn candidate(name: &str, embedding: Option<Vec<f32>>) -> Candidate {
        let mut c = Candidate::new(
            Symbol {
                qualified_name: format!("rust:src/lib.rs::{name}"),
                name: name.to_string(),
                kind: SymbolKind::Function,
                file_path: "src/lib.rs".to_string(),
                language: "rust".to_string(),
                range_start: 1,
                range_end: 10,
                body: format!("fn {name}() {{}}"),
                structure: vec![],
            },
            1,
        );
        c.embedding = embedding.map(Array1::from_vec);
        c
    }

    #[test]
    fn parallel_vectors_score_full() {
        let candidates = vec![
            candidate("a", Some(vec![1.0, 0.0, 0.0])),
            candidate("b", Some(vec![2.0, 0.0, 0.0])),
        ];
        let scores = SemanticDetector::new(0.65).compare(&candidates);
        assert_eq!(scores.len(), 1);
        assert!((scores[0].score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn orthogonal_vectors_stay_below_floor() {
        let candidates = vec![
            candidate("a", Some(vec![1.0, 0.0])),
            candidate("b", Some(vec![0.0, 1.0])),
        ];
        assert!(SemanticDetector::new(0.65).compare(&candidates).is_empty());
    }

    #[test]
    fn missing_embeddings_are_skipped() {
        let candidates = vec![candidate("a", Some(vec![1.0, 0.0])), candidate("b", None)];
        assert!(SemanticDetector::new(0.65).compare(&candidates).is_empty());
    }
}
