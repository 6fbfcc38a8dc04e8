use super::{Comparison, Detector, SimilarityScore};
use crate::candidate::Candidate;
use rayon::prelude::*;
use regex::Regex;
use std::collections::HashSet;

/// Symbols with fewer distinct identifiers than this produce noisy
/// Jaccard scores and are skipped.
const MIN_TOKENS: usize = 5;

const CONFIDENCE_SCALE: f32 = 0.8;
const CONFIDENCE_CAP: f32 = 0.85;

/// Jaccard similarity over the sets of identifiers appearing in each
/// body. Insensitive to statement order, so it complements the
/// structural comparison.
pub struct TokenDetector {
    floor: f32,
    identifier: Regex,
}

impl TokenDetector {
    pub fn new(floor: f32) -> Self {
        Self {
            floor,
            identifier: Regex::new(r"[A-Za-z_][A-Za-z0-9_]*").expect("valid identifier pattern"),
        }
    }

    fn tokens(&self, body: &str) -> HashSet<String> {
        self.identifier
            .find_iter(body)
            .map(|m| m.as_str().to_string())
            .collect()
    }
}

fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f32 {
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    if union == 0 {
        return 0.0;
    }
    intersection as f32 / union as f32
}

impl Detector for TokenDetector {
    fn name(&self) -> &'static str {
        "token"
    }

    fn comparison(&self) -> Comparison {
        Comparison::Token
    }

    fn compare(&self, candidates: &[Candidate]) -> Vec<SimilarityScore> {
        let token_sets: Vec<(&Candidate, HashSet<String>)> = candidates
            .iter()
            .filter(|c| c.has_body())
            .map(|c| (c, self.tokens(&c.symbol.body)))
            .filter(|(_, tokens)| tokens.len() >= MIN_TOKENS)
            .collect();

        token_sets
            .par_iter()
            .enumerate()
            .flat_map_iter(|(i, (a, tokens_a))| {
                let floor = self.floor;
                token_sets[i + 1..].iter().filter_map(move |(b, tokens_b)| {
                    let score = jaccard(tokens_a, tokens_b);
                    if score < floor {
                        return None;
                    }
                    Some(SimilarityScore::new(
                        &a.symbol.qualified_name,
                        &b.symbol.qualified_name,
                        score,
                        Comparison::Token,
                        (CONFIDENCE_SCALE * score).min(CONFIDENCE_CAP),
                    ))
                })
            })
            .collect()
    }
}
