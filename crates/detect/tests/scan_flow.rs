//! End-to-end flow from candidates through the framework, classifier
//! and report, with and without a persistent registry.

use detect::{
    Candidate, Classifier, ComparisonConfig, ComparisonFramework, DetectorKind, PairStatus,
    Registry, Report, Severity,
};
use std::collections::HashMap;
use std::time::Duration;
use symbols::{Symbol, SymbolKind};

const BODY_SUM: &str = "fn total(items: &[Entry]) -> u64 {\n    let mut acc = 0;\n    for entry in items {\n        acc += entry.amount;\n    }\n    acc\n}";

const STRUCTURE_SUM: &[&str] = &[
    "function_item",
    "identifier",
    "parameters",
    "block",
    "let_declaration",
    "for_expression",
    "compound_assignment_expr",
    "field_expression",
    "identifier",
];

fn candidate(file: &str, name: &str, project: i64, body: &str, structure: &[&str]) -> Candidate {
    Candidate::new(
        Symbol {
            qualified_name: format!("rust:{file}::{name}"),
            name: name.to_string(),
            kind: SymbolKind::Function,
            file_path: file.to_string(),
            language: "rust".to_string(),
            range_start: 3,
            range_end: 14,
            body: body.to_string(),
            structure: structure.iter().map(|s| s.to_string()).collect(),
        },
        project,
    )
}

fn offline_config() -> ComparisonConfig {
    let mut config = ComparisonConfig::default();
    config.detectors = vec![
        DetectorKind::Exact,
        DetectorKind::Structural,
        DetectorKind::Token,
    ];
    config
}

fn classify_all(
    config: &ComparisonConfig,
    candidates: &[Candidate],
    scores: &[detect::SimilarityScore],
) -> Vec<detect::Finding> {
    let classifier = Classifier::new(config.clone());
    let locations: HashMap<&str, (&str, u32)> = candidates
        .iter()
        .map(|c| {
            (
                c.symbol.qualified_name.as_str(),
                (c.symbol.file_path.as_str(), c.symbol.range_start),
            )
        })
        .collect();
    scores
        .iter()
        .filter_map(|score| {
            let a = locations.get(score.unit_a.as_str())?;
            let b = locations.get(score.unit_b.as_str())?;
            classifier.classify(score, *a, *b)
        })
        .collect()
}

#[test]
fn duplicate_pair_becomes_exact_finding() {
    let config = offline_config();
    let framework = ComparisonFramework::new(config.clone()).unwrap();
    let candidates = vec![
        candidate("src/billing.rs", "total", 1, BODY_SUM, STRUCTURE_SUM),
        candidate("src/invoice.rs", "sum_amounts", 1, BODY_SUM, STRUCTURE_SUM),
        candidate(
            "src/io.rs",
            "read_header",
            1,
            "fn read_header(reader: &mut impl BufRead) -> io::Result<String> {\n    let mut line = String::new();\n    reader.read_line(&mut line)?;\n    Ok(line)\n}",
            &["function_item", "identifier", "parameters", "block"],
        ),
    ];

    let scores = framework.run(&candidates, None, None).unwrap();
    let findings = classify_all(&config, &candidates, &scores);
    let report = Report::new(findings, candidates.len(), Duration::from_millis(10));

    assert_eq!(report.summary.exact, 1);
    assert_eq!(report.summary.total, 1);
    let finding = &report.findings[0];
    assert_eq!(finding.severity, Severity::Exact);
    assert_eq!(finding.file_path, "src/billing.rs");
    assert_eq!(finding.line_number, 3);
    assert_eq!(finding.metadata["counterpart_file"], "src/invoice.rs");
}

#[test]
fn every_finding_traces_to_one_score() {
    let config = offline_config();
    let framework = ComparisonFramework::new(config.clone()).unwrap();
    let candidates = vec![
        candidate("src/a.rs", "f", 1, BODY_SUM, STRUCTURE_SUM),
        candidate("src/b.rs", "g", 1, BODY_SUM, STRUCTURE_SUM),
        candidate("src/c.rs", "h", 1, BODY_SUM, STRUCTURE_SUM),
    ];
    let scores = framework.run(&candidates, None, None).unwrap();
    let findings = classify_all(&config, &candidates, &scores);

    // three symbols with the same body yield three distinct pairs,
    // each finding backed by exactly one score
    assert_eq!(scores.len(), 3);
    assert_eq!(findings.len(), scores.len());
    let mut pairs: Vec<(String, String)> = scores
        .iter()
        .map(|s| (s.unit_a.clone(), s.unit_b.clone()))
        .collect();
    pairs.sort();
    pairs.dedup();
    assert_eq!(pairs.len(), 3);
}

#[test]
fn ignored_pairs_are_suppressed_on_rescan() {
    let dir = tempfile::tempdir().unwrap();
    let mut registry = Registry::open_at(dir.path()).unwrap();
    let project = registry
        .db()
        .get_or_create_project("demo", dir.path().to_str().unwrap())
        .unwrap();

    let candidates = vec![
        candidate("src/a.rs", "f", project, BODY_SUM, STRUCTURE_SUM),
        candidate("src/b.rs", "g", project, BODY_SUM, STRUCTURE_SUM),
    ];
    for c in &candidates {
        registry
            .upsert_symbol(&detect::SymbolRecord {
                qualified_name: c.symbol.qualified_name.clone(),
                project_id: project,
                name: c.symbol.name.clone(),
                kind: c.symbol.kind.as_str().to_string(),
                file_path: c.symbol.file_path.clone(),
                range_start: c.symbol.range_start,
                range_end: c.symbol.range_end,
                content_hash: c.content_hash.clone(),
                structure_hash: c.structure_hash.clone(),
                embedding: None,
                group_id: None,
            })
            .unwrap();
    }

    let framework = ComparisonFramework::new(offline_config()).unwrap();
    let first = framework.run(&candidates, Some(&registry), None).unwrap();
    assert_eq!(first.len(), 1);

    // the pair has to exist before its status can change
    registry
        .db()
        .upsert_similar_pair(&first[0].unit_a, &first[0].unit_b, first[0].score, "exact", 1.0)
        .unwrap();
    registry
        .db()
        .update_pair_status(
            &first[0].unit_a,
            &first[0].unit_b,
            PairStatus::Ignored,
            Some("intentional mirror"),
        )
        .unwrap();

    let second = framework.run(&candidates, Some(&registry), None).unwrap();
    assert!(second.is_empty());
}

#[test]
fn grouped_symbols_do_not_pair() {
    let dir = tempfile::tempdir().unwrap();
    let mut registry = Registry::open_at(dir.path()).unwrap();
    let project = registry
        .db()
        .get_or_create_project("demo", dir.path().to_str().unwrap())
        .unwrap();

    let candidates = vec![
        candidate("src/a.rs", "f", project, BODY_SUM, STRUCTURE_SUM),
        candidate("src/b.rs", "g", project, BODY_SUM, STRUCTURE_SUM),
    ];
    for c in &candidates {
        registry
            .upsert_symbol(&detect::SymbolRecord {
                qualified_name: c.symbol.qualified_name.clone(),
                project_id: project,
                name: c.symbol.name.clone(),
                kind: c.symbol.kind.as_str().to_string(),
                file_path: c.symbol.file_path.clone(),
                range_start: c.symbol.range_start,
                range_end: c.symbol.range_end,
                content_hash: c.content_hash.clone(),
                structure_hash: c.structure_hash.clone(),
                embedding: None,
                group_id: None,
            })
            .unwrap();
    }
    let group = registry
        .db()
        .create_group(project, "adapters", Some("per-backend variants"), None)
        .unwrap();
    for c in &candidates {
        registry
            .db()
            .add_to_group(group, &c.symbol.qualified_name)
            .unwrap();
    }

    let framework = ComparisonFramework::new(offline_config()).unwrap();
    let scores = framework.run(&candidates, Some(&registry), None).unwrap();
    assert!(scores.is_empty());
}
