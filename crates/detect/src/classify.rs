//! Turns similarity scores into severity-classified findings.

use crate::config::ComparisonConfig;
use crate::detectors::SimilarityScore;
use serde::Serialize;
use serde_json::json;

/// Severity bucket a score falls into, ordered from most to least
/// actionable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Exact,
    High,
    Medium,
    Low,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Exact => "exact",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
        }
    }
}

/// One reportable duplicate pair, anchored at the first symbol's
/// location with the counterpart carried in the metadata.
#[derive(Debug, Clone, Serialize)]
pub struct Finding {
    pub title: String,
    pub description: String,
    pub severity: Severity,
    pub file_path: String,
    pub line_number: u32,
    pub recommendation: String,
    pub metadata: serde_json::Value,
}

pub struct Classifier {
    config: ComparisonConfig,
}

impl Classifier {
    pub fn new(config: ComparisonConfig) -> Self {
        Self { config }
    }

    /// Maps a score to its severity bucket, or `None` below the low
    /// threshold.
    pub fn severity(&self, score: f32) -> Option<Severity> {
        if score >= self.config.exact_threshold {
            Some(Severity::Exact)
        } else if score >= self.config.high_threshold {
            Some(Severity::High)
        } else if score >= self.config.medium_threshold {
            Some(Severity::Medium)
        } else if score >= self.config.low_threshold {
            Some(Severity::Low)
        } else {
            None
        }
    }

    /// Builds the finding for one scored pair. Each score produces at
    /// most one finding, anchored at `unit_a`.
    pub fn classify(
        &self,
        score: &SimilarityScore,
        location_a: (&str, u32),
        location_b: (&str, u32),
    ) -> Option<Finding> {
        let severity = self.severity(score.score)?;
        let short_a = short_name(&score.unit_a);
        let short_b = short_name(&score.unit_b);
        let percent = score.score * 100.0;

        let title = match severity {
            Severity::Exact => format!("Duplicate implementation: {short_a} and {short_b}"),
            Severity::High => format!("Near-duplicate implementation: {short_a} and {short_b}"),
            Severity::Medium => format!("Similar implementation: {short_a} and {short_b}"),
            Severity::Low => format!("Possibly related implementation: {short_a} and {short_b}"),
        };
        let description = format!(
            "{} and {} are {:.1}% similar ({} comparison). Counterpart at {}:{}.",
            score.unit_a,
            score.unit_b,
            percent,
            score.comparison.as_str(),
            location_b.0,
            location_b.1,
        );
        let recommendation = match severity {
            Severity::Exact | Severity::High => format!(
                "Extract the shared logic of {short_a} and {short_b} into one \
                 implementation and reuse it from both call sites."
            ),
            Severity::Medium => format!(
                "Review {short_a} and {short_b} for shared intent; consider \
                 consolidating if they evolve together."
            ),
            Severity::Low => format!(
                "Check whether {short_a} and {short_b} intentionally overlap."
            ),
        };

        Some(Finding {
            title,
            description,
            severity,
            file_path: location_a.0.to_string(),
            line_number: location_a.1,
            recommendation,
            metadata: json!({
                "similarity": score.score,
                "comparison": score.comparison.as_str(),
                "confidence": score.confidence,
                "unit_a": score.unit_a,
                "unit_b": score.unit_b,
                "counterpart_file": location_b.0,
                "counterpart_line": location_b.1,
            }),
        })
    }
}

/// Last path segment of a qualified name, for readable titles.
fn short_name(qualified: &str) -> &str {
    qualified.rsplit("::").next().unwrap_or(qualified)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detectors::Comparison;

    fn classifier() -> Classifier {
        Classifier::new(ComparisonConfig::default())
    }

    fn score(value: f32) -> SimilarityScore {
        SimilarityScore::new(
            "rust:src/a.rs::parse_config",
            "rust:src/b.rs::load_config",
            value,
            Comparison::Token,
            0.8,
        )
    }

    #[test]
    fn severity_buckets_follow_thresholds() {
        let c = classifier();
        assert_eq!(c.severity(1.0), Some(Severity::Exact));
        assert_eq!(c.severity(0.95), Some(Severity::Exact));
        assert_eq!(c.severity(0.90), Some(Severity::High));
        assert_eq!(c.severity(0.80), Some(Severity::Medium));
        assert_eq!(c.severity(0.70), Some(Severity::Low));
        assert_eq!(c.severity(0.50), None);
    }

    #[test]
    fn finding_carries_anchor_and_counterpart() {
        let c = classifier();
        let finding = c
            .classify(&score(0.97), ("src/a.rs", 10), ("src/b.rs", 42))
            .unwrap();
        assert_eq!(finding.severity, Severity::Exact);
        assert_eq!(finding.file_path, "src/a.rs");
        assert_eq!(finding.line_number, 10);
        assert!(finding.title.contains("parse_config"));
        assert!(finding.title.contains("load_config"));
        assert_eq!(finding.metadata["counterpart_file"], "src/b.rs");
        assert_eq!(finding.metadata["counterpart_line"], 42);
        assert_eq!(finding.metadata["comparison"], "token");
    }

    #[test]
    fn below_floor_produces_no_finding() {
        let c = classifier();
        assert!(c.classify(&score(0.2), ("src/a.rs", 1), ("src/b.rs", 2)).is_none());
    }
}
