//! Runs the configured detectors over a candidate set and merges their
//! scores into one ranked list.

use crate::candidate::Candidate;
use crate::config::{ComparisonConfig, ConfigError, DetectorKind, Scope};
use crate::detectors::{
    Comparison, Detector, ExactDetector, SemanticDetector, SimilarityScore, StructuralDetector,
    TokenDetector,
};
use crate::registry::{Registry, RegistryError};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

#[derive(Debug, thiserror::Error)]
pub enum FrameworkError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
}

pub struct ComparisonFramework {
    config: ComparisonConfig,
    detectors: Vec<Box<dyn Detector>>,
}

impl ComparisonFramework {
    /// Builds the detector pipeline from the configuration. Detectors
    /// always run cheapest first so that on tied scores the cheaper
    /// comparison is the one reported.
    pub fn new(config: ComparisonConfig) -> Result<Self, FrameworkError> {
        config.validate()?;
        let floor = config.low_threshold;
        let mut detectors: Vec<Box<dyn Detector>> = Vec::new();
        for kind in [
            DetectorKind::Exact,
            DetectorKind::Structural,
            DetectorKind::Token,
            DetectorKind::Semantic,
        ] {
            if !config.detectors.contains(&kind) {
                continue;
            }
            match kind {
                DetectorKind::Exact => detectors.push(Box::new(ExactDetector)),
                DetectorKind::Structural => {
                    detectors.push(Box::new(StructuralDetector::new(floor)))
                }
                DetectorKind::Token => detectors.push(Box::new(TokenDetector::new(floor))),
                DetectorKind::Semantic => detectors.push(Box::new(SemanticDetector::new(floor))),
            }
        }
        Ok(Self { config, detectors })
    }

    pub fn config(&self) -> &ComparisonConfig {
        &self.config
    }

    pub fn detector_names(&self) -> Vec<&'static str> {
        self.detectors.iter().map(|d| d.name()).collect()
    }

    /// Scores all candidate pairs.
    ///
    /// When a registry with a vector index is available the semantic
    /// comparison goes through approximate nearest neighbor search over
    /// the whole stored corpus instead of brute-force pairing within
    /// the batch. `changed` restricts results to pairs touching at
    /// least one of the given qualified names.
    pub fn run(
        &self,
        candidates: &[Candidate],
        registry: Option<&Registry>,
        changed: Option<&HashSet<String>>,
    ) -> Result<Vec<SimilarityScore>, FrameworkError> {
        let use_ann = registry.is_some_and(Registry::has_vector_index);

        // stored-only candidates carry no body, their line count comes
        // from the recorded range
        let candidates: Vec<Candidate> = candidates
            .iter()
            .filter(|c| self.config.include_kinds.contains(&c.symbol.kind))
            .filter(|c| c.symbol.line_count() >= self.config.min_lines)
            .cloned()
            .collect();
        let candidates = candidates.as_slice();

        let mut raw: Vec<SimilarityScore> = Vec::new();
        for detector in &self.detectors {
            if detector.comparison() == Comparison::Semantic && use_ann {
                continue;
            }
            let scores = detector.compare(candidates);
            debug!(detector = detector.name(), scores = scores.len(), "detector finished");
            raw.extend(scores);
        }

        if use_ann && self.config.semantic_enabled() {
            if let Some(registry) = registry {
                raw.extend(self.semantic_via_index(candidates, registry)?);
            }
        }

        // keep the best score per ordered pair; on ties the earlier
        // (cheaper) detector's score survives
        let mut merged: HashMap<(String, String), SimilarityScore> = HashMap::new();
        for score in raw {
            let key = (score.unit_a.clone(), score.unit_b.clone());
            match merged.get(&key) {
                Some(existing) if score.score <= existing.score => {}
                _ => {
                    merged.insert(key, score);
                }
            }
        }

        let suppressed = self.suppressed_pairs(registry)?;
        let projects: HashMap<&str, i64> = candidates
            .iter()
            .map(|c| (c.symbol.qualified_name.as_str(), c.project_id))
            .collect();

        let mut results: Vec<SimilarityScore> = merged
            .into_values()
            .filter(|s| s.score >= self.config.low_threshold)
            .filter(|s| !suppressed.contains(&(s.unit_a.clone(), s.unit_b.clone())))
            .filter(|s| {
                let pair = (
                    projects.get(s.unit_a.as_str()),
                    projects.get(s.unit_b.as_str()),
                );
                match self.config.scope {
                    Scope::All => true,
                    // ANN hits can reach stored symbols outside the
                    // candidate batch; under Project scope both sides
                    // must be batch members of the same project
                    Scope::Project => matches!(pair, (Some(a), Some(b)) if a == b),
                    Scope::CrossOnly => match pair {
                        (Some(a), Some(b)) => a != b,
                        _ => true,
                    },
                }
            })
            .filter(|s| match changed {
                Some(set) => set.contains(&s.unit_a) || set.contains(&s.unit_b),
                None => true,
            })
            .collect();

        // descending, NaN sinks to the end
        let rank = |s: f32| if s.is_nan() { f32::NEG_INFINITY } else { s };
        results.sort_by(|a, b| rank(b.score).total_cmp(&rank(a.score)));
        results.truncate(self.config.max_results);
        info!(pairs = results.len(), "comparison finished");
        Ok(results)
    }

    fn semantic_via_index(
        &self,
        candidates: &[Candidate],
        registry: &Registry,
    ) -> Result<Vec<SimilarityScore>, FrameworkError> {
        const SEMANTIC_CONFIDENCE: f32 = 0.95;
        // enough neighbors to survive the post-filters
        let k = 10usize;

        let queries: Vec<(String, ndarray::Array1<f32>)> = candidates
            .iter()
            .filter_map(|c| {
                c.embedding
                    .as_ref()
                    .map(|e| (c.symbol.qualified_name.clone(), e.clone()))
            })
            .collect();

        let hits = registry.search_batch_parallel(&queries, k)?;
        let scores = hits
            .into_iter()
            .filter(|(_, _, similarity)| *similarity >= self.config.low_threshold)
            .map(|(position, matched, similarity)| {
                SimilarityScore::new(
                    &queries[position].0,
                    &matched,
                    similarity.clamp(0.0, 1.0),
                    Comparison::Semantic,
                    SEMANTIC_CONFIDENCE,
                )
            })
            .collect();
        Ok(scores)
    }

    /// Pairs the user has marked ignored, plus pairs whose symbols sit
    /// in the same similarity group.
    fn suppressed_pairs(
        &self,
        registry: Option<&Registry>,
    ) -> Result<HashSet<(String, String)>, FrameworkError> {
        let Some(registry) = registry else {
            return Ok(HashSet::new());
        };
        let mut suppressed: HashSet<(String, String)> =
            registry.db().get_ignored_pairs()?.into_iter().collect();

        let mut by_group: HashMap<i64, Vec<String>> = HashMap::new();
        for record in registry.db().get_all_symbols()? {
            if let Some(group) = record.group_id {
                by_group.entry(group).or_default().push(record.qualified_name);
            }
        }
        for members in by_group.values() {
            for (i, a) in members.iter().enumerate() {
                for b in &members[i + 1..] {
                    let pair = if a <= b {
                        (a.clone(), b.clone())
                    } else {
                        (b.clone(), a.clone())
                    };
                    suppressed.insert(pair);
                }
            }
        }
        Ok(suppressed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use symbols::{Symbol, SymbolKind};

    fn candidate(name: &str, project: i64, body: &str, structure: &[&str]) -> Candidate {
        Candidate::new(
            Symbol {
                qualified_name: format!("rust:src/{name}.rs::{name}"),
                name: name.to_string(),
                kind: SymbolKind::Function,
                file_path: format!("src/{name}.rs"),
                language: "rust".to_string(),
                range_start: 1,
                range_end: 12,
                body: body.to_string(),
                structure: structure.iter().map(|s| s.to_string()).collect(),
            },
            project,
        )
    }

    const BODY: &str = "fn process(items: &[Entry]) -> Vec<Output> {\n    items.iter().map(|entry| transform(entry)).filter(|out| out.valid).collect()\n}";

    const STRUCTURE: &[&str] = &[
        "function_item",
        "identifier",
        "parameters",
        "block",
        "call_expression",
        "closure_expression",
        "call_expression",
        "field_expression",
    ];

    fn config_without_semantic() -> ComparisonConfig {
        let mut config = ComparisonConfig::default();
        config.detectors = vec![
            DetectorKind::Exact,
            DetectorKind::Structural,
            DetectorKind::Token,
        ];
        config
    }

    #[test]
    fn exact_duplicates_merge_to_one_pair() {
        let framework = ComparisonFramework::new(config_without_semantic()).unwrap();
        let candidates = vec![
            candidate("a", 1, BODY, STRUCTURE),
            candidate("b", 1, BODY, STRUCTURE),
        ];
        let scores = framework.run(&candidates, None, None).unwrap();
        assert_eq!(scores.len(), 1);
        // token and structural also hit 1.0 but exact registered first
        assert_eq!(scores[0].comparison, Comparison::Exact);
        assert_eq!(scores[0].score, 1.0);
    }

    #[test]
    fn cross_only_scope_drops_same_project_pairs() {
        let mut config = config_without_semantic();
        config.scope = Scope::CrossOnly;
        let framework = ComparisonFramework::new(config).unwrap();
        let candidates = vec![
            candidate("a", 1, BODY, STRUCTURE),
            candidate("b", 1, BODY, STRUCTURE),
            candidate("c", 2, BODY, STRUCTURE),
        ];
        let scores = framework.run(&candidates, None, None).unwrap();
        assert_eq!(scores.len(), 2);
        assert!(scores
            .iter()
            .all(|s| s.unit_b == "rust:src/c.rs::c" || s.unit_a == "rust:src/c.rs::c"));
    }

    #[test]
    fn changed_filter_keeps_touching_pairs_only() {
        let framework = ComparisonFramework::new(config_without_semantic()).unwrap();
        let candidates = vec![
            candidate("a", 1, BODY, STRUCTURE),
            candidate("b", 1, BODY, STRUCTURE),
            candidate("c", 1, "fn other(x: u32, y: u32) -> u32 { helper(x) + helper(y) }", &[]),
        ];
        let changed: HashSet<String> = ["rust:src/a.rs::a".to_string()].into();
        let scores = framework.run(&candidates, None, Some(&changed)).unwrap();
        assert_eq!(scores.len(), 1);
        assert_eq!(scores[0].unit_a, "rust:src/a.rs::a");
    }

    #[test]
    fn max_results_caps_output() {
        let mut config = config_without_semantic();
        config.max_results = 1;
        let framework = ComparisonFramework::new(config).unwrap();
        let candidates = vec![
            candidate("a", 1, BODY, STRUCTURE),
            candidate("b", 1, BODY, STRUCTURE),
            candidate("c", 1, BODY, STRUCTURE),
        ];
        let scores = framework.run(&candidates, None, None).unwrap();
        assert_eq!(scores.len(), 1);
    }

    #[test]
    fn project_scope_excludes_stored_foreign_symbols() {
        use crate::db::SymbolRecord;
        use crate::embedding::embedding_to_bytes;
        use ndarray::Array1;

        let dir = tempfile::tempdir().unwrap();
        let mut registry = crate::registry::Registry::open_at(dir.path()).unwrap();
        let local_project = registry.db().get_or_create_project("local", "/tmp/local").unwrap();
        let foreign_project = registry
            .db()
            .get_or_create_project("foreign", "/tmp/foreign")
            .unwrap();

        registry
            .upsert_symbol(&SymbolRecord {
                qualified_name: "rust:src/foreign.rs::foreign".to_string(),
                project_id: foreign_project,
                name: "foreign".to_string(),
                kind: "function".to_string(),
                file_path: "src/foreign.rs".to_string(),
                range_start: 1,
                range_end: 12,
                content_hash: "hash-foreign".to_string(),
                structure_hash: "shape-foreign".to_string(),
                embedding: Some(embedding_to_bytes(&Array1::from_vec(vec![1.0, 0.0, 0.0, 0.0]))),
                group_id: None,
            })
            .unwrap();
        registry.ensure_vector_index(4).unwrap();

        let mut local = candidate("local", local_project, BODY, STRUCTURE);
        local.embedding = Some(Array1::from_vec(vec![0.99, 0.01, 0.0, 0.0]));
        let candidates = vec![local];

        let mut config = ComparisonConfig::default();
        config.detectors = vec![DetectorKind::Semantic];
        config.scope = Scope::Project;
        let framework = ComparisonFramework::new(config.clone()).unwrap();
        let scores = framework.run(&candidates, Some(&registry), None).unwrap();
        assert!(scores.is_empty());

        // the same pair is reported once the scope allows it
        config.scope = Scope::All;
        let framework = ComparisonFramework::new(config).unwrap();
        let scores = framework.run(&candidates, Some(&registry), None).unwrap();
        assert_eq!(scores.len(), 1);
        assert!(scores[0].unit_a.contains("foreign") || scores[0].unit_b.contains("foreign"));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut config = ComparisonConfig::default();
        config.high_threshold = 0.99;
        assert!(ComparisonFramework::new(config).is_err());
    }
}
