//! Comparison configuration

use symbols::SymbolKind;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("thresholds must satisfy exact >= high >= medium >= low, got {exact} / {high} / {medium} / {low}")]
    UnorderedThresholds {
        exact: f32,
        high: f32,
        medium: f32,
        low: f32,
    },
    #[error("threshold {0} outside [0, 1]")]
    OutOfRange(f32),
    #[error("unknown detector: {0}")]
    UnknownDetector(String),
}

/// Which comparison scope a scan covers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Compare against everything in the registry
    All,
    /// Compare only within the scanned project
    Project,
    /// Report only pairs that span two projects
    CrossOnly,
}

/// Detector selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorKind {
    Exact,
    Structural,
    Token,
    Semantic,
}

impl DetectorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Structural => "structural",
            Self::Token => "token",
            Self::Semantic => "semantic",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "exact" => Some(Self::Exact),
            "structural" => Some(Self::Structural),
            "token" => Some(Self::Token),
            "semantic" => Some(Self::Semantic),
            _ => None,
        }
    }
}

/// Configuration for one comparison run, immutable once built.
#[derive(Debug, Clone)]
pub struct ComparisonConfig {
    pub exact_threshold: f32,
    pub high_threshold: f32,
    pub medium_threshold: f32,
    pub low_threshold: f32,
    pub min_lines: u32,
    pub max_results: usize,
    pub include_kinds: Vec<SymbolKind>,
    pub scope: Scope,
    pub detectors: Vec<DetectorKind>,
    pub model: String,
    pub endpoint: String,
}

impl Default for ComparisonConfig {
    fn default() -> Self {
        Self {
            exact_threshold: 0.95,
            high_threshold: 0.85,
            medium_threshold: 0.75,
            low_threshold: 0.65,
            min_lines: 5,
            max_results: 100,
            include_kinds: vec![SymbolKind::Function, SymbolKind::Method, SymbolKind::Class],
            scope: Scope::All,
            detectors: vec![
                DetectorKind::Exact,
                DetectorKind::Structural,
                DetectorKind::Token,
                DetectorKind::Semantic,
            ],
            model: "bge-m3".to_string(),
            endpoint: "http://localhost:11434".to_string(),
        }
    }
}

impl ComparisonConfig {
    /// Defaults overridden by SELFSAME_* environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(v) = std::env::var("SELFSAME_THRESHOLD") {
            if let Ok(t) = v.parse() {
                config.set_base_threshold(t);
            }
        }
        if let Ok(v) = std::env::var("SELFSAME_MIN_LINES") {
            if let Ok(m) = v.parse() {
                config.min_lines = m;
            }
        }
        if let Ok(v) = std::env::var("SELFSAME_MAX_RESULTS") {
            if let Ok(m) = v.parse() {
                config.max_results = m;
            }
        }
        if let Ok(v) = std::env::var("SELFSAME_SCOPE") {
            config.scope = match v.as_str() {
                "project" => Scope::Project,
                "cross" => Scope::CrossOnly,
                _ => Scope::All,
            };
        }
        if let Ok(v) = std::env::var("SELFSAME_MODEL") {
            config.model = v;
        }
        if let Ok(v) = std::env::var("SELFSAME_ENDPOINT") {
            config.endpoint = v;
        }

        config
    }

    /// Parse a comma-separated detector list ("exact,token").
    pub fn set_detectors(&mut self, list: &str) -> Result<(), ConfigError> {
        let mut detectors = Vec::new();
        for name in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let kind = DetectorKind::from_str(name)
                .ok_or_else(|| ConfigError::UnknownDetector(name.to_string()))?;
            if !detectors.contains(&kind) {
                detectors.push(kind);
            }
        }
        self.detectors = detectors;
        Ok(())
    }

    /// Sets the low threshold, raising any upper tier below it so the
    /// ordering invariant holds instead of rejecting the run.
    pub fn set_base_threshold(&mut self, threshold: f32) {
        self.low_threshold = threshold;
        self.medium_threshold = self.medium_threshold.max(threshold);
        self.high_threshold = self.high_threshold.max(threshold);
        self.exact_threshold = self.exact_threshold.max(threshold);
    }

    pub fn semantic_enabled(&self) -> bool {
        self.detectors.contains(&DetectorKind::Semantic)
    }

    /// Enforce the threshold ordering invariant.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for t in [
            self.exact_threshold,
            self.high_threshold,
            self.medium_threshold,
            self.low_threshold,
        ] {
            if !(0.0..=1.0).contains(&t) {
                return Err(ConfigError::OutOfRange(t));
            }
        }
        if self.exact_threshold >= self.high_threshold
            && self.high_threshold >= self.medium_threshold
            && self.medium_threshold >= self.low_threshold
        {
            Ok(())
        } else {
            Err(ConfigError::UnorderedThresholds {
                exact: self.exact_threshold,
                high: self.high_threshold,
                medium: self.medium_threshold,
                low: self.low_threshold,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ComparisonConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.low_threshold, 0.65);
        assert!(config.semantic_enabled());
    }

    #[test]
    fn test_unordered_thresholds_rejected() {
        let config = ComparisonConfig {
            medium_threshold: 0.9,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::UnorderedThresholds { .. })
        ));
    }

    #[test]
    fn test_out_of_range_threshold_rejected() {
        let config = ComparisonConfig {
            exact_threshold: 1.5,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::OutOfRange(_))));
    }

    #[test]
    fn test_base_threshold_raises_upper_tiers() {
        let mut config = ComparisonConfig::default();
        config.set_base_threshold(0.9);
        assert!(config.validate().is_ok());
        assert_eq!(config.low_threshold, 0.9);
        assert_eq!(config.medium_threshold, 0.9);
        assert_eq!(config.high_threshold, 0.9);
        assert_eq!(config.exact_threshold, 0.95);

        let mut config = ComparisonConfig::default();
        config.set_base_threshold(0.5);
        assert!(config.validate().is_ok());
        assert_eq!(config.low_threshold, 0.5);
        assert_eq!(config.medium_threshold, 0.75);
    }

    #[test]
    fn test_detector_list_parsing() {
        let mut config = ComparisonConfig::default();
        config.set_detectors("exact, token").unwrap();
        assert_eq!(
            config.detectors,
            vec![DetectorKind::Exact, DetectorKind::Token]
        );
        assert!(!config.semantic_enabled());

        assert!(config.set_detectors("exact,bogus").is_err());
    }
}
