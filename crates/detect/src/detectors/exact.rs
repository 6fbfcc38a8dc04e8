use super::{Comparison, Detector, SimilarityScore};
use crate::candidate::Candidate;
use std::collections::HashMap;

/// Finds byte-identical symbols after comment and whitespace
/// normalization, by bucketing on the content hash. Catches copy-paste
/// duplicates in linear time.
pub struct ExactDetector;

impl Detector for ExactDetector {
    fn name(&self) -> &'static str {
        "exact"
    }

    fn comparison(&self) -> Comparison {
        Comparison::Exact
    }

    fn compare(&self, candidates: &[Candidate]) -> Vec<SimilarityScore> {
        let mut buckets: HashMap<&str, Vec<&Candidate>> = HashMap::new();
        for candidate in candidates {
            buckets
                .entry(candidate.content_hash.as_str())
                .or_default()
                .push(candidate);
        }

        let mut scores = Vec::new();
        for group in buckets.values() {
            if group.len() < 2 {
                continue;
            }
            for (i, a) in group.iter().enumerate() {
                for b in &group[i + 1..] {
                    scores.push(
                        SimilarityScore::new(
                            &a.symbol.qualified_name,
                            &b.symbol.qualified_name,
                            1.0,
                            Comparison::Exact,
                            1.0,
                        )
                        .with_reason("identical normalized content"),
                    );
                }
            }
        }
        scores
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate::Candidate;
    use symbols::{Symbol, SymbolKind};

    fn candidate(name: &str, body: &str) -> Candidate {
        Candidate::new(
            Symbol {
                qualified_name: format!("rust:src/lib.rs::{name}"),
                name: name.to_string(),
                kind: SymbolKind::Function,
                file_path: "src/lib.rs".to_string(),
                language: "rust".to_string(),
                range_start: 1,
                range_end: 5,
                body: body.to_string(),
                structure: vec!["function_item".to_string()],
            },
            1,
        )
    }

    #[test]
    fn identical_bodies_are_paired() {
        let candidates = vec![
            candidate("a", "fn f() { 1 + 1 }"),
            candidate("b", "fn f() {\n    // note\n    1 + 1\n}"),
            candidate("c", "fn f() { 2 + 2 }"),
        ];
        let scores = ExactDetector.compare(&candidates);
        assert_eq!(scores.len(), 1);
        assert_eq!(scores[0].unit_a, "rust:src/lib.rs::a");
        assert_eq!(scores[0].unit_b, "rust:src/lib.rs::b");
        assert_eq!(scores[0].score, 1.0);
    }

    #[test]
    fn no_pairs_without_duplicates() {
        let candidates = vec![candidate("a", "fn f() { 1 }"), candidate("b", "fn g() { 2 }")];
        assert!(ExactDetector.compare(&candidates).is_empty());
    }
}
