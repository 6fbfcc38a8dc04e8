//! symbols - code unit extraction
//!
//! Tree-sitter based extraction of functions, methods and classes from
//! a project tree, used as input to similarity comparison.

mod error;
mod parser;
mod scanner;
mod types;

pub use error::ExtractError;
pub use parser::SymbolExtractor;
pub use scanner::{language_for, FileScanner};
pub use types::{Symbol, SymbolKind};

use std::path::Path;

/// Extract all symbols from a project directory.
///
/// Unreadable or unparseable files are logged and skipped.
pub fn extract_project(root: &Path, min_lines: u32) -> Result<Vec<Symbol>, ExtractError> {
    let root = root.canonicalize()?;
    let files = FileScanner::new(&root).scan();
    let mut extractor = SymbolExtractor::new();
    let mut all = Vec::new();

    for file in &files {
        let content = match std::fs::read_to_string(file) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!("skipping unreadable file {}: {}", file.display(), e);
                continue;
            }
        };

        let rel = file
            .strip_prefix(&root)
            .unwrap_or(file)
            .to_string_lossy()
            .to_string();

        all.extend(extractor.extract_file(&content, &rel, min_lines));
    }

    tracing::info!("extracted {} symbols from {} files", all.len(), files.len());
    Ok(all)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_extract_project_mixed_files() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("a.rs"),
            "fn alpha() {\n    let x = 1;\n    let y = 2;\n    println!(\"{}\", x + y);\n}\n",
        )
        .unwrap();
        fs::write(dir.path().join("notes.md"), "# not code\n").unwrap();

        let symbols = extract_project(dir.path(), 3).unwrap();
        assert_eq!(symbols.len(), 1);
        assert_eq!(symbols[0].name, "alpha");
        assert_eq!(symbols[0].file_path, "a.rs");
    }

    #[test]
    fn test_extract_project_skips_broken_file() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("bad.rs"), "fn ( {{{").unwrap();
        fs::write(
            dir.path().join("good.rs"),
            "fn ok() {\n    let a = 1;\n    let b = 2;\n    let c = a + b;\n    drop(c);\n}\n",
        )
        .unwrap();

        // broken file must not abort the run
        let symbols = extract_project(dir.path(), 3).unwrap();
        assert!(symbols.iter().any(|s| s.name == "ok"));
    }
}
