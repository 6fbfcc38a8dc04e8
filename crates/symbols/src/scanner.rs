//! Project file scanner, .gitignore aware

use ignore::WalkBuilder;
use std::path::{Path, PathBuf};

/// Files larger than this are skipped outright
const MAX_FILE_SIZE_BYTES: u64 = 2 * 1024 * 1024;

/// Supported extensions and their language tags
const SUPPORTED_EXTENSIONS: &[(&str, &str)] = &[
    ("rs", "rust"),
    ("py", "python"),
    ("ts", "typescript"),
    ("tsx", "typescript"),
    ("js", "javascript"),
    ("jsx", "javascript"),
];

/// Language tag for a path, None if the extension is not supported
pub fn language_for(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_lowercase();
    SUPPORTED_EXTENSIONS
        .iter()
        .find(|(e, _)| *e == ext)
        .map(|(_, lang)| *lang)
}

/// Scanner for finding source files in a project
pub struct FileScanner {
    root: PathBuf,
}

impl FileScanner {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Walk the project and return supported source files
    pub fn scan(&self) -> Vec<PathBuf> {
        let mut files = Vec::new();

        let mut builder = WalkBuilder::new(&self.root);
        builder
            .hidden(true)
            .git_ignore(true)
            .git_global(true)
            .git_exclude(true);

        for result in builder.build() {
            let entry = match result {
                Ok(e) => e,
                Err(e) => {
                    tracing::warn!("failed to read entry: {}", e);
                    continue;
                }
            };

            let Some(file_type) = entry.file_type() else {
                continue;
            };
            if !file_type.is_file() {
                continue;
            }

            let path = entry.path();
            if language_for(path).is_none() {
                continue;
            }

            if let Ok(meta) = entry.metadata() {
                if meta.len() > MAX_FILE_SIZE_BYTES {
                    tracing::debug!(
                        "skipping large file {} ({} bytes)",
                        path.display(),
                        meta.len()
                    );
                    continue;
                }
            }

            files.push(path.to_path_buf());
        }

        files.sort();
        files
    }
}
