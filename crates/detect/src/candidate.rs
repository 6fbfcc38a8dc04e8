//! Comparison unit built from an extracted symbol or a stored record.

use crate::db::SymbolRecord;
use crate::embedding::bytes_to_embedding;
use ndarray::Array1;
use sha2::{Digest, Sha256};
use symbols::{Symbol, SymbolKind};

/// Hash of the symbol body with comment lines dropped and whitespace
/// collapsed, so formatting churn does not change identity.
pub fn content_hash(body: &str) -> String {
    let mut hasher = Sha256::new();
    let code_lines = body
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("//") && !line.starts_with('#'));
    for line in code_lines {
        for token in line.split_whitespace() {
            hasher.update(token.as_bytes());
            hasher.update(b" ");
        }
    }
    format!("{:x}", hasher.finalize())
}

/// Hash of the AST node-kind signature, stable under renames.
pub fn structure_hash(structure: &[String]) -> String {
    let mut hasher = Sha256::new();
    for kind in structure {
        hasher.update(kind.as_bytes());
        hasher.update(b" ");
    }
    format!("{:x}", hasher.finalize())
}

/// A symbol prepared for comparison.
///
/// Candidates built from a live extraction carry the body and structure
/// signature. Candidates rebuilt from registry records carry only the
/// stored hashes and embedding, which is enough for the content-hash and
/// embedding comparisons against them.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub symbol: Symbol,
    pub project_id: i64,
    pub content_hash: String,
    pub structure_hash: String,
    pub embedding: Option<Array1<f32>>,
}

impl Candidate {
    pub fn new(symbol: Symbol, project_id: i64) -> Self {
        let content_hash = content_hash(&symbol.body);
        let structure_hash = structure_hash(&symbol.structure);
        Self {
            symbol,
            project_id,
            content_hash,
            structure_hash,
            embedding: None,
        }
    }

    /// Rebuilds a candidate from the registry, without body or structure.
    pub fn from_record(record: &SymbolRecord) -> Self {
        let language = record
            .qualified_name
            .split(':')
            .next()
            .unwrap_or("unknown")
            .to_string();
        let symbol = Symbol {
            qualified_name: record.qualified_name.clone(),
            name: record.name.clone(),
            kind: SymbolKind::from_str(&record.kind).unwrap_or(SymbolKind::Function),
            file_path: record.file_path.clone(),
            language,
            range_start: record.range_start,
            range_end: record.range_end,
            body: String::new(),
            structure: Vec::new(),
        };
        let embedding = record.embedding.as_deref().and_then(bytes_to_embedding);
        Self {
            symbol,
            project_id: record.project_id,
            content_hash: record.content_hash.clone(),
            structure_hash: record.structure_hash.clone(),
            embedding,
        }
    }

    /// Stored candidates have no body to compare textually.
    pub fn has_body(&self) -> bool {
        !self.symbol.body.is_empty()
    }
}
