//! Symbol types

use serde::{Deserialize, Serialize};

/// Kind of extracted code unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolKind {
    Function,
    Method,
    Class,
}

impl SymbolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::Method => "method",
            Self::Class => "class",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "function" => Some(Self::Function),
            "method" => Some(Self::Method),
            "class" => Some(Self::Class),
            _ => None,
        }
    }
}

/// A named code unit extracted from source.
///
/// Identity is the qualified name `{lang}:{file}::{owner?}::{name}`, stable
/// across runs so incremental re-analysis does not duplicate registry entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Symbol {
    pub qualified_name: String,
    pub name: String,
    pub kind: SymbolKind,
    pub file_path: String,
    pub language: String,
    /// First line, 1-based
    pub range_start: u32,
    /// Last line, 1-based inclusive
    pub range_end: u32,
    /// Raw source snippet, with owner context prepended for methods
    pub body: String,
    /// AST node-kind signature, in depth-first order
    pub structure: Vec<String>,
}

impl Symbol {
    pub fn line_count(&self) -> u32 {
        self.range_end.saturating_sub(self.range_start) + 1
    }
}
