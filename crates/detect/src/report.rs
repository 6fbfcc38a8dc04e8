//! Scan result aggregation and rendering.

use crate::classify::{Finding, Severity};
use serde::Serialize;
use std::fmt::Write as _;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize)]
pub struct Summary {
    pub exact: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct Report {
    pub findings: Vec<Finding>,
    pub summary: Summary,
    pub symbols_compared: usize,
    pub duration_ms: u64,
}

impl Report {
    pub fn new(findings: Vec<Finding>, symbols_compared: usize, duration: Duration) -> Self {
        let mut summary = Summary::default();
        for finding in &findings {
            match finding.severity {
                Severity::Exact => summary.exact += 1,
                Severity::High => summary.high += 1,
                Severity::Medium => summary.medium += 1,
                Severity::Low => summary.low += 1,
            }
        }
        summary.total = findings.len();
        Self {
            findings,
            summary,
            symbols_compared,
            duration_ms: duration.as_millis() as u64,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn render_text(&self) -> String {
        let mut out = String::new();
        if self.findings.is_empty() {
            let _ = writeln!(
                out,
                "No duplicates found across {} symbols ({} ms)",
                self.symbols_compared, self.duration_ms
            );
            return out;
        }

        let _ = writeln!(
            out,
            "Found {} duplicate pairs across {} symbols ({} ms)",
            self.summary.total, self.symbols_compared, self.duration_ms
        );
        let _ = writeln!(
            out,
            "  exact: {}  high: {}  medium: {}  low: {}",
            self.summary.exact, self.summary.high, self.summary.medium, self.summary.low
        );
        for finding in &self.findings {
            let _ = writeln!(out);
            let _ = writeln!(
                out,
                "[{}] {}",
                finding.severity.as_str().to_uppercase(),
                finding.title
            );
            let _ = writeln!(out, "  {}:{}", finding.file_path, finding.line_number);
            let _ = writeln!(out, "  {}", finding.description);
            let _ = writeln!(out, "  -> {}", finding.recommendation);
        }
        out
    }
}
