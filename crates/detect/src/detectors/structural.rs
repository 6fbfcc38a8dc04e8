use super::{Comparison, Detector, SimilarityScore};
use crate::candidate::Candidate;
use rayon::prelude::*;

/// Minimum AST nodes before a structural comparison is meaningful.
/// Tiny bodies all look alike at the node-kind level.
const MIN_NODES: usize = 8;

const CONFIDENCE_SCALE: f32 = 0.9;
const CONFIDENCE_CAP: f32 = 0.95;

/// Compares the AST node-kind sequences of two symbols with a longest
/// common subsequence ratio. Identifier renames and literal changes do
/// not affect the sequence, so this catches near-copies that the exact
/// hash misses.
pub struct StructuralDetector {
    floor: f32,
}

impl StructuralDetector {
    pub fn new(floor: f32) -> Self {
        Self { floor }
    }
}

/// 2 * LCS(a, b) / (len(a) + len(b)), the classic sequence ratio.
fn sequence_ratio(a: &[String], b: &[String]) -> f32 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    // rolling single-row LCS table
    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];
    for item_a in a {
        for (j, item_b) in b.iter().enumerate() {
            curr[j + 1] = if item_a == item_b {
                prev[j] + 1
            } else {
                prev[j + 1].max(curr[j])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    let lcs = prev[b.len()];
    (2.0 * lcs as f32) / (a.len() + b.len()) as f32
}

impl Detector for StructuralDetector {
    fn name(&self) -> &'static str {
        "structural"
    }

    fn comparison(&self) -> Comparison {
        Comparison::Structural
    }

    fn compare(&self, candidates: &[Candidate]) -> Vec<SimilarityScore> {
        let eligible: Vec<&Candidate> = candidates
            .iter()
            .filter(|c| c.symbol.structure.len() >= MIN_NODES)
            .collect();

        eligible
            .par_iter()
            .enumerate()
            .flat_map_iter(|(i, a)| {
                let floor = self.floor;
                eligible[i + 1..].iter().filter_map(move |b| {
                    if a.structure_hash == b.structure_hash {
                        // identical structure, score without the DP pass
                        return Some(SimilarityScore::new(
                            &a.symbol.qualified_name,
                            &b.symbol.qualified_name,
                            1.0,
                            Comparison::Structural,
                            CONFIDENCE_CAP,
                        ));
                    }
                    let score = sequence_ratio(&a.symbol.structure, &b.symbol.structure);
                    if score < floor {
                        return None;
                    }
                    Some(SimilarityScore::new(
                        &a.symbol.qualified_name,
                        &b.symbol.qualified_name,
                        score,
                        Comparison::Structural,
                        (CONFIDENCE_SCALE * score).min(CONFIDENCE_CAP),
                    ))
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use symbols::{Symbol, SymbolKind};

    fn candidate(name: &str, structure: &[&str]) -> Candidate {
        Candidate::new(
            Symbol {
                qualified_name: format!("rust:src/lib.rs::{name}"),
                name: name.to_string(),
                kind: SymbolKind::Function,
                file_path: "src/lib.rs".to_string(),
                language: "rust".to_string(),
                range_start: 1,
                range_end: 20,
                body: format!("fn {name}() {{}}"),
                structure: structure.iter().map(|s| s.to_string()).collect(),
            },
            1,
        )
    }

    const BASE: &[&str] = &[
        "function_item",
        "identifier",
        "parameters",
        "block",
        "let_declaration",
        "call_expression",
        "if_expression",
        "return_expression",
    ];

    #[test]
    fn sequence_ratio_bounds() {
        let a: Vec<String> = BASE.iter().map(|s| s.to_string()).collect();
        assert_eq!(sequence_ratio(&a, &a), 1.0);
        assert_eq!(sequence_ratio(&a, &[]), 0.0);
    }

    #[test]
    fn identical_structure_scores_full() {
        let candidates = vec![candidate("a", BASE), candidate("b", BASE)];
        let scores = StructuralDetector::new(0.65).compare(&candidates);
        assert_eq!(scores.len(), 1);
        assert_eq!(scores[0].score, 1.0);
    }

    #[test]
    fn short_bodies_are_skipped() {
        let candidates = vec![
            candidate("a", &["function_item", "block"]),
            candidate("b", &["function_item", "block"]),
        ];
        assert!(StructuralDetector::new(0.65).compare(&candidates).is_empty());
    }

    #[test]
    fn dissimilar_structure_stays_below_floor() {
        let other: Vec<&str> = vec![
            "struct_item",
            "field_declaration_list",
            "field_declaration",
            "type_identifier",
            "impl_item",
            "declaration_list",
            "match_expression",
            "match_arm",
        ];
        let candidates = vec![candidate("a", BASE), candidate("b", &other)];
        assert!(StructuralDetector::new(0.65).compare(&candidates).is_empty());
    }
}
