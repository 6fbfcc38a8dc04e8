//! Pluggable comparison algorithms.
//!
//! Each detector scores candidate pairs independently. The framework
//! registers detectors in order of increasing cost and merges their
//! scores, keeping the best score per pair.

mod exact;
mod semantic;
mod structural;
mod token;

pub use exact::ExactDetector;
pub use semantic::SemanticDetector;
pub use structural::StructuralDetector;
pub use token::TokenDetector;

use crate::candidate::Candidate;
use serde::Serialize;

/// Which algorithm produced a score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Comparison {
    Exact,
    Structural,
    Token,
    Semantic,
}

impl Comparison {
    pub fn as_str(&self) -> &'static str {
        match self {
            Comparison::Exact => "exact",
            Comparison::Structural => "structural",
            Comparison::Token => "token",
            Comparison::Semantic => "semantic",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "exact" => Some(Comparison::Exact),
            "structural" => Some(Comparison::Structural),
            "token" => Some(Comparison::Token),
            "semantic" => Some(Comparison::Semantic),
            _ => None,
        }
    }
}

/// One scored pair. `unit_a` and `unit_b` are lexically ordered so the
/// same pair never appears under two keys.
#[derive(Debug, Clone, Serialize)]
pub struct SimilarityScore {
    pub unit_a: String,
    pub unit_b: String,
    pub score: f32,
    pub comparison: Comparison,
    pub confidence: f32,
    pub reason: Option<String>,
}

impl SimilarityScore {
    pub fn new(
        name_a: &str,
        name_b: &str,
        score: f32,
        comparison: Comparison,
        confidence: f32,
    ) -> Self {
        let (unit_a, unit_b) = if name_a <= name_b {
            (name_a.to_string(), name_b.to_string())
        } else {
            (name_b.to_string(), name_a.to_string())
        };
        Self {
            unit_a,
            unit_b,
            score,
            comparison,
            confidence,
            reason: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

pub trait Detector: Send + Sync {
    fn name(&self) -> &'static str;

    fn comparison(&self) -> Comparison;

    /// Scores every qualifying pair in `candidates`. Detectors only emit
    /// pairs at or above their own floor, so the result stays sparse.
    fn compare(&self, candidates: &[Candidate]) -> Vec<SimilarityScore>;
}
