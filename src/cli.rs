//! Subcommand implementations.

use anyhow::Context;
use clap::Subcommand;
use detect::{
    Candidate, Classifier, ComparisonConfig, ComparisonFramework, OllamaEmbedder, PairStatus,
    Registry, Report, Scope, SimilarityScore, SymbolRecord, embedding_to_bytes,
};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Instant;
use symbols::{extract_project, Symbol};
use tracing::warn;

#[derive(Subcommand)]
pub enum Commands {
    /// Index a project into the registry
    Index {
        /// Project path
        #[arg(default_value = ".")]
        path: String,
        /// Minimum symbol lines
        #[arg(long)]
        min_lines: Option<u32>,
        /// Embedding model
        #[arg(short, long)]
        model: Option<String>,
        /// Skip embedding generation
        #[arg(long)]
        no_embeddings: bool,
    },
    /// Scan for duplicate implementations
    Scan {
        /// Project path
        #[arg(default_value = ".")]
        path: String,
        /// Base similarity threshold
        #[arg(short, long)]
        threshold: Option<f32>,
        /// Only report pairs touching symbols changed since the last index
        #[arg(long)]
        changed_files_only: bool,
        /// Only report pairs that span two projects
        #[arg(short = 'x', long)]
        cross_only: bool,
        /// Emit findings as JSON
        #[arg(long)]
        json: bool,
        /// Comma-separated detector list (exact,structural,token,semantic)
        #[arg(short, long)]
        detectors: Option<String>,
        /// Minimum symbol lines
        #[arg(long)]
        min_lines: Option<u32>,
        /// Embedding model
        #[arg(short, long)]
        model: Option<String>,
    },
    /// Show registry status for a project
    Status {
        /// Project path
        #[arg(default_value = ".")]
        path: String,
    },
    /// List indexed projects
    Projects {
        /// Registry location
        #[arg(short = 'P', long, default_value = ".")]
        path: String,
    },
    /// List stored similar pairs
    Pairs {
        /// Registry location
        #[arg(short = 'P', long, default_value = ".")]
        path: String,
        /// Filter by status (new, confirmed, redundant, ignored)
        #[arg(short, long, default_value = "new")]
        status: String,
        /// Max results
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
    /// Mark a pair as intentionally similar
    Ignore {
        /// First qualified name
        unit_a: String,
        /// Second qualified name
        unit_b: String,
        /// Reason
        #[arg(short, long)]
        reason: Option<String>,
        /// Registry location
        #[arg(short = 'P', long, default_value = ".")]
        path: String,
    },
    /// Confirm a pair as a real duplicate
    Confirm {
        /// First qualified name
        unit_a: String,
        /// Second qualified name
        unit_b: String,
        /// Reason
        #[arg(short, long)]
        reason: Option<String>,
        /// Registry location
        #[arg(short = 'P', long, default_value = ".")]
        path: String,
    },
    /// Mark one side of a pair as redundant
    Redundant {
        /// First qualified name
        unit_a: String,
        /// Second qualified name
        unit_b: String,
        /// Reason
        #[arg(short, long)]
        reason: Option<String>,
        /// Registry location
        #[arg(short = 'P', long, default_value = ".")]
        path: String,
    },
    /// Similarity group management
    #[command(subcommand)]
    Group(GroupCommands),
}

#[derive(Subcommand)]
pub enum GroupCommands {
    /// Create a group
    Create {
        /// Group name
        name: String,
        /// Reason
        #[arg(short, long)]
        reason: String,
        /// Name pattern
        #[arg(long)]
        pattern: Option<String>,
        /// Project path
        #[arg(short = 'P', long, default_value = ".")]
        path: String,
    },
    /// Add symbols to a group
    Add {
        /// Group id
        group_id: i64,
        /// Qualified names
        qualified_names: Vec<String>,
        /// Registry location
        #[arg(short = 'P', long, default_value = ".")]
        path: String,
    },
    /// List groups
    List {
        /// Registry location
        #[arg(short = 'P', long, default_value = ".")]
        path: String,
    },
    /// List group members
    Members {
        /// Group id
        group_id: i64,
        /// Registry location
        #[arg(short = 'P', long, default_value = ".")]
        path: String,
    },
}

pub async fn run(cmd: Commands) -> anyhow::Result<()> {
    match cmd {
        Commands::Index {
            path,
            min_lines,
            model,
            no_embeddings,
        } => cmd_index(&path, min_lines, model.as_deref(), no_embeddings).await,
        Commands::Scan {
            path,
            threshold,
            changed_files_only,
            cross_only,
            json,
            detectors,
            min_lines,
            model,
        } => {
            cmd_scan(ScanArgs {
                path,
                threshold,
                changed_files_only,
                cross_only,
                json,
                detectors,
                min_lines,
                model,
            })
            .await
        }
        Commands::Status { path } => cmd_status(&path),
        Commands::Projects { path } => cmd_projects(&path),
        Commands::Pairs {
            path,
            status,
            limit,
        } => cmd_pairs(&path, &status, limit),
        Commands::Ignore {
            unit_a,
            unit_b,
            reason,
            path,
        } => cmd_mark(&path, &unit_a, &unit_b, PairStatus::Ignored, reason.as_deref()),
        Commands::Confirm {
            unit_a,
            unit_b,
            reason,
            path,
        } => cmd_mark(&path, &unit_a, &unit_b, PairStatus::Confirmed, reason.as_deref()),
        Commands::Redundant {
            unit_a,
            unit_b,
            reason,
            path,
        } => cmd_mark(&path, &unit_a, &unit_b, PairStatus::Redundant, reason.as_deref()),
        Commands::Group(sub) => match sub {
            GroupCommands::Create {
                name,
                reason,
                pattern,
                path,
            } => cmd_group_create(&path, &name, &reason, pattern.as_deref()),
            GroupCommands::Add {
                group_id,
                qualified_names,
                path,
            } => cmd_group_add(&path, group_id, &qualified_names),
            GroupCommands::List { path } => cmd_group_list(&path),
            GroupCommands::Members { group_id, path } => cmd_group_members(&path, group_id),
        },
    }
}

struct ScanArgs {
    path: String,
    threshold: Option<f32>,
    changed_files_only: bool,
    cross_only: bool,
    json: bool,
    detectors: Option<String>,
    min_lines: Option<u32>,
    model: Option<String>,
}

fn resolve_root(path: &str) -> anyhow::Result<PathBuf> {
    PathBuf::from(path)
        .canonicalize()
        .with_context(|| format!("cannot resolve path: {path}"))
}

fn project_name(root: &Path) -> String {
    root.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn short_name(qualified: &str) -> &str {
    qualified.rsplit("::").next().unwrap_or(qualified)
}

fn build_config(
    threshold: Option<f32>,
    min_lines: Option<u32>,
    model: Option<&str>,
    detectors: Option<&str>,
    cross_only: bool,
) -> anyhow::Result<ComparisonConfig> {
    let mut config = ComparisonConfig::from_env();
    if let Some(t) = threshold {
        config.set_base_threshold(t);
    }
    if let Some(m) = min_lines {
        config.min_lines = m;
    }
    if let Some(m) = model {
        config.model = m.to_string();
    }
    if let Some(list) = detectors {
        config.set_detectors(list)?;
    }
    if cross_only {
        config.scope = Scope::CrossOnly;
    }
    config.validate()?;
    Ok(config)
}

/// Connects to the embedding backend or aborts the whole run.
async fn connect_embedder(config: &ComparisonConfig) -> anyhow::Result<OllamaEmbedder> {
    let mut embedder = OllamaEmbedder::new(&config.model).with_url(&config.endpoint);
    embedder.ping().await.with_context(|| {
        format!(
            "embedding backend unavailable at {} (start it or disable the semantic detector)",
            config.endpoint
        )
    })?;
    Ok(embedder)
}

fn to_record(symbol: &Symbol, project_id: i64, embedding: Option<Vec<u8>>) -> SymbolRecord {
    SymbolRecord {
        qualified_name: symbol.qualified_name.clone(),
        project_id,
        name: symbol.name.clone(),
        kind: symbol.kind.as_str().to_string(),
        file_path: symbol.file_path.clone(),
        range_start: symbol.range_start,
        range_end: symbol.range_end,
        content_hash: detect::content_hash(&symbol.body),
        structure_hash: detect::structure_hash(&symbol.structure),
        embedding,
        group_id: None,
    }
}

async fn cmd_index(
    path: &str,
    min_lines: Option<u32>,
    model: Option<&str>,
    no_embeddings: bool,
) -> anyhow::Result<()> {
    let root = resolve_root(path)?;
    let config = build_config(None, min_lines, model, None, false)?;

    println!("Project: {}", root.display());
    println!("Model: {}", config.model);

    let mut registry = Registry::open_at(&root)?;
    let project_id = registry
        .db()
        .get_or_create_project(&project_name(&root), &root.to_string_lossy())?;

    println!("\nExtracting symbols...");
    let symbols = extract_project(&root, config.min_lines)?;
    println!("Found {} symbols (>= {} lines)", symbols.len(), config.min_lines);

    if symbols.is_empty() {
        println!("Nothing to index");
        return Ok(());
    }

    let mut embedder = if no_embeddings {
        None
    } else {
        Some(connect_embedder(&config).await?)
    };

    let mut dimensions = None;
    let mut indexed = 0usize;
    let mut by_file: HashMap<String, Vec<String>> = HashMap::new();

    for (i, symbol) in symbols.iter().enumerate() {
        print!(
            "\r  [{}/{}] {}",
            i + 1,
            symbols.len(),
            short_name(&symbol.qualified_name)
        );

        let content_hash = detect::content_hash(&symbol.body);
        let embedding = match registry.db().get_embedding_by_content_hash(&content_hash)? {
            Some(cached) => Some(cached),
            None => match &mut embedder {
                Some(embedder) => match embedder.embed(&symbol.body).await {
                    Ok(vector) => Some(embedding_to_bytes(&vector)),
                    Err(err) => {
                        warn!(symbol = %symbol.qualified_name, error = %err, "embedding failed");
                        None
                    }
                },
                None => None,
            },
        };
        if let Some(bytes) = &embedding {
            dimensions.get_or_insert(bytes.len() / 4);
        }

        registry.upsert_symbol(&to_record(symbol, project_id, embedding))?;
        by_file
            .entry(symbol.file_path.clone())
            .or_default()
            .push(symbol.qualified_name.clone());
        indexed += 1;
    }
    println!();

    let mut removed = 0usize;
    for (file, keep) in &by_file {
        removed += registry.db().delete_stale_file_symbols(project_id, file, keep)?;
    }
    // files that no longer exist lose all their symbols
    let stored_files: HashSet<String> = registry
        .db()
        .get_symbols_by_project(project_id)?
        .into_iter()
        .map(|record| record.file_path)
        .collect();
    for file in stored_files {
        if !by_file.contains_key(&file) {
            removed += registry.db().delete_stale_file_symbols(project_id, &file, &[])?;
        }
    }
    if removed > 0 {
        println!("Removed {removed} stale symbols");
    }

    if let Some(dims) = dimensions {
        registry.ensure_vector_index(dims)?;
        registry.save_vector_index()?;
    }
    registry.db().update_project_indexed_time(project_id)?;

    println!("Indexed {indexed} symbols");
    Ok(())
}

async fn cmd_scan(args: ScanArgs) -> anyhow::Result<()> {
    let t0 = Instant::now();
    let root = resolve_root(&args.path)?;
    let config = build_config(
        args.threshold,
        args.min_lines,
        args.model.as_deref(),
        args.detectors.as_deref(),
        args.cross_only,
    )?;

    let mut registry = Registry::open_at(&root)?;
    let project_id = registry
        .db()
        .get_or_create_project(&project_name(&root), &root.to_string_lossy())?;

    let symbols = extract_project(&root, config.min_lines)?;
    if symbols.len() < 2 && registry.db().get_stats()?.symbols < 2 {
        if args.json {
            let report = Report::new(Vec::new(), symbols.len(), t0.elapsed());
            println!("{}", report.to_json()?);
        } else {
            println!("Not enough symbols to compare");
        }
        return Ok(());
    }

    // symbols whose content changed since the last index run
    let changed = if args.changed_files_only {
        let stored = registry.db().get_content_hashes(project_id)?;
        let set: HashSet<String> = symbols
            .iter()
            .filter(|s| {
                stored
                    .get(&s.qualified_name)
                    .map(|hash| *hash != detect::content_hash(&s.body))
                    .unwrap_or(true)
            })
            .map(|s| s.qualified_name.clone())
            .collect();
        Some(set)
    } else {
        None
    };

    let mut candidates: Vec<Candidate> = symbols
        .into_iter()
        .map(|s| Candidate::new(s, project_id))
        .collect();

    if config.semantic_enabled() {
        let mut embedder = connect_embedder(&config).await?;
        for candidate in &mut candidates {
            let cached = registry
                .db()
                .get_embedding_by_content_hash(&candidate.content_hash)?
                .and_then(|bytes| detect::bytes_to_embedding(&bytes));
            candidate.embedding = match cached {
                Some(vector) => Some(vector),
                None => match embedder.embed(&candidate.symbol.body).await {
                    Ok(vector) => Some(vector),
                    Err(err) => {
                        warn!(
                            symbol = %candidate.symbol.qualified_name,
                            error = %err,
                            "embedding failed"
                        );
                        None
                    }
                },
            };
        }
    }

    // stored symbols from other projects join the comparison
    if config.scope != Scope::Project {
        let local: HashSet<String> = candidates
            .iter()
            .map(|c| c.symbol.qualified_name.clone())
            .collect();
        for record in registry.db().get_all_symbols()? {
            if record.project_id != project_id && !local.contains(&record.qualified_name) {
                candidates.push(Candidate::from_record(&record));
            }
        }
    }

    let framework = ComparisonFramework::new(config.clone())?;
    let scores = framework.run(&candidates, Some(&registry), changed.as_ref())?;

    // pairs reference symbol rows, so the scanned symbols must be
    // stored even when the project was never explicitly indexed
    for candidate in &candidates {
        if candidate.project_id != project_id || !candidate.has_body() {
            continue;
        }
        let embedding = candidate.embedding.as_ref().map(embedding_to_bytes);
        registry.upsert_symbol(&to_record(&candidate.symbol, project_id, embedding))?;
    }

    let mut batch: Vec<(String, String, f32, String, f32)> = Vec::new();
    for s in &scores {
        if registry.db().get_symbol(&s.unit_a)?.is_none()
            || registry.db().get_symbol(&s.unit_b)?.is_none()
        {
            continue;
        }
        batch.push((
            s.unit_a.clone(),
            s.unit_b.clone(),
            s.score,
            s.comparison.as_str().to_string(),
            s.confidence,
        ));
    }
    registry.db_mut().upsert_similar_pairs(&batch)?;

    let report = build_report(&registry, &candidates, &scores, &config, t0)?;
    if args.json {
        println!("{}", report.to_json()?);
    } else {
        print!("{}", report.render_text());
    }
    Ok(())
}

fn build_report(
    registry: &Registry,
    candidates: &[Candidate],
    scores: &[SimilarityScore],
    config: &ComparisonConfig,
    t0: Instant,
) -> anyhow::Result<Report> {
    let classifier = Classifier::new(config.clone());
    let mut locations: HashMap<String, (String, u32)> = candidates
        .iter()
        .map(|c| {
            (
                c.symbol.qualified_name.clone(),
                (c.symbol.file_path.clone(), c.symbol.range_start),
            )
        })
        .collect();

    let mut findings = Vec::new();
    for score in scores {
        for name in [&score.unit_a, &score.unit_b] {
            if !locations.contains_key(name.as_str()) {
                if let Some(record) = registry.db().get_symbol(name)? {
                    locations.insert(name.clone(), (record.file_path, record.range_start));
                }
            }
        }
        let (Some(a), Some(b)) = (locations.get(&score.unit_a), locations.get(&score.unit_b))
        else {
            continue;
        };
        if let Some(finding) =
            classifier.classify(score, (&a.0, a.1), (&b.0, b.1))
        {
            findings.push(finding);
        }
    }
    Ok(Report::new(findings, candidates.len(), t0.elapsed()))
}

fn cmd_status(path: &str) -> anyhow::Result<()> {
    let root = resolve_root(path)?;
    let registry = Registry::open_at(&root)?;

    match registry.db().get_project_by_path(&root.to_string_lossy())? {
        Some(project) => {
            println!("Project: {}", project.name);
            println!("Path: {}", project.root_path);
            println!(
                "Last indexed: {}",
                project.last_indexed_at.unwrap_or_else(|| "never".to_string())
            );
            let stats = registry.db().get_stats()?;
            println!();
            println!("Symbols: {} ({} embedded)", stats.symbols, stats.embedded);
            println!("Pairs: {}", stats.pairs);
            println!("Groups: {}", stats.groups);
            println!(
                "Vector index: {}",
                if registry.has_vector_index() { "ready" } else { "absent" }
            );
        }
        None => println!("Project not indexed: {}", root.display()),
    }
    Ok(())
}

fn cmd_projects(path: &str) -> anyhow::Result<()> {
    let root = resolve_root(path)?;
    let registry = Registry::open_at(&root)?;
    let projects = registry.db().get_all_projects()?;

    if projects.is_empty() {
        println!("No indexed projects.");
        return Ok(());
    }
    for project in projects {
        println!("[{}] {}", project.id, project.name);
        println!("    Path: {}", project.root_path);
        println!(
            "    Last indexed: {}",
            project.last_indexed_at.unwrap_or_else(|| "never".to_string())
        );
    }
    Ok(())
}

fn cmd_pairs(path: &str, status: &str, limit: usize) -> anyhow::Result<()> {
    let root = resolve_root(path)?;
    let registry = Registry::open_at(&root)?;
    let pair_status = PairStatus::from_str(status)
        .ok_or_else(|| anyhow::anyhow!("invalid status: {status}"))?;

    let pairs = registry.db().get_similar_pairs(Some(pair_status), 0.0, limit)?;
    println!("Similar pairs (status: {status}):\n");

    for pair in &pairs {
        println!("[{}] {:.2}% ({})", pair.id, pair.score * 100.0, pair.comparison);
        println!("  A: {}:{} {}", pair.file_a, pair.start_a, short_name(&pair.unit_a));
        println!("  B: {}:{} {}", pair.file_b, pair.start_b, short_name(&pair.unit_b));
        println!();
    }
    if pairs.is_empty() {
        println!("  (none)");
    }
    Ok(())
}

fn cmd_mark(
    path: &str,
    unit_a: &str,
    unit_b: &str,
    status: PairStatus,
    reason: Option<&str>,
) -> anyhow::Result<()> {
    let root = resolve_root(path)?;
    let registry = Registry::open_at(&root)?;

    if registry
        .db()
        .update_pair_status(unit_a, unit_b, status, reason)?
    {
        println!("Marked pair as {}:", status.as_str());
        println!("  A: {unit_a}");
        println!("  B: {unit_b}");
    } else {
        println!("Pair not found.");
    }
    Ok(())
}

fn cmd_group_create(
    path: &str,
    name: &str,
    reason: &str,
    pattern: Option<&str>,
) -> anyhow::Result<()> {
    let root = resolve_root(path)?;
    let registry = Registry::open_at(&root)?;
    let project = registry
        .db()
        .get_project_by_path(&root.to_string_lossy())?
        .ok_or_else(|| anyhow::anyhow!("project not indexed: {}", root.display()))?;

    let group_id = registry
        .db()
        .create_group(project.id, name, Some(reason), pattern)?;
    println!("Created group [{group_id}] '{name}'");
    println!("Add members: selfsame group add {group_id} <qualified_name>");
    Ok(())
}

fn cmd_group_add(path: &str, group_id: i64, qualified_names: &[String]) -> anyhow::Result<()> {
    let root = resolve_root(path)?;
    let registry = Registry::open_at(&root)?;

    for name in qualified_names {
        match registry.db().get_symbol(name)? {
            Some(_) => {
                registry.db().add_to_group(group_id, name)?;
                println!("Added to group {group_id}: {name}");
            }
            None => println!("Warning: symbol not found: {name}"),
        }
    }
    Ok(())
}

fn cmd_group_list(path: &str) -> anyhow::Result<()> {
    let root = resolve_root(path)?;
    let registry = Registry::open_at(&root)?;
    let groups = registry.db().get_groups()?;

    if groups.is_empty() {
        println!("No groups.");
        return Ok(());
    }
    for group in groups {
        println!("[{}] {} ({} members)", group.id, group.name, group.member_count);
        if let Some(reason) = &group.reason {
            println!("    Reason: {reason}");
        }
        if let Some(pattern) = &group.pattern {
            println!("    Pattern: {pattern}");
        }
    }
    Ok(())
}

fn cmd_group_members(path: &str, group_id: i64) -> anyhow::Result<()> {
    let root = resolve_root(path)?;
    let registry = Registry::open_at(&root)?;
    let members = registry.db().get_group_members(group_id)?;

    if members.is_empty() {
        println!("Group {group_id} has no members");
        return Ok(());
    }
    println!("Group {group_id} members:");
    for name in members {
        println!("  {name}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const DUPLICATE_FN: &str = "fn checksum(values: &[u32]) -> u32 {\n    \
        let mut total = 0u32;\n    \
        let mut index = 0usize;\n    \
        while index < values.len() {\n        \
        total = total.wrapping_add(values[index]);\n        \
        index += 1;\n    \
        }\n    \
        total\n\
        }\n";

    fn offline_scan(dir: &TempDir, json: bool) -> ScanArgs {
        ScanArgs {
            path: dir.path().to_string_lossy().to_string(),
            threshold: None,
            changed_files_only: false,
            cross_only: false,
            json,
            detectors: Some("exact,structural,token".to_string()),
            min_lines: None,
            model: None,
        }
    }

    #[tokio::test]
    async fn scan_persists_pairs_without_prior_index() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.rs"), DUPLICATE_FN).unwrap();
        fs::write(dir.path().join("b.rs"), DUPLICATE_FN).unwrap();

        cmd_scan(offline_scan(&dir, false)).await.unwrap();

        let root = dir.path().canonicalize().unwrap();
        let registry = Registry::open_at(&root).unwrap();
        assert_eq!(registry.db().get_stats().unwrap().symbols, 2);

        let pairs = registry.db().get_similar_pairs(None, 0.0, 10).unwrap();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].comparison, "exact");
    }

    #[tokio::test]
    async fn scan_of_empty_project_succeeds_in_json_mode() {
        let dir = TempDir::new().unwrap();
        cmd_scan(offline_scan(&dir, true)).await.unwrap();
    }
}
