//! Project-local persistent store under `.ci-registry/`.
//!
//! Pairs the SQLite database with an approximate nearest neighbor index
//! over the stored embeddings. Vector ids are the SQLite rowids of the
//! symbols table, so a saved index stays consistent with the database
//! across runs.

use crate::db::{Database, SymbolRecord};
use crate::embedding::bytes_to_embedding;
use crate::vector_index::{VectorIndex, VectorIndexConfig, VectorIndexError};
use ndarray::Array1;
use rayon::prelude::*;
use rusqlite::OptionalExtension;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const REGISTRY_DIR: &str = ".ci-registry";

const DB_FILE: &str = "registry.db";
const INDEX_FILE: &str = "registry.usearch";

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("vector index error: {0}")]
    Index(#[from] VectorIndexError),
}

pub struct Registry {
    db: Database,
    vector_index: Option<VectorIndex>,
    index_path: PathBuf,
}

impl Registry {
    /// Opens (or creates) the registry under `root/.ci-registry/`.
    ///
    /// A saved vector index that fails to load is discarded with a
    /// warning; it will be rebuilt from the stored embeddings on the
    /// next indexing run.
    pub fn open_at(root: &Path) -> Result<Self, RegistryError> {
        let dir = root.join(REGISTRY_DIR);
        std::fs::create_dir_all(&dir)?;
        let db = Database::open(&dir.join(DB_FILE))?;
        let index_path = dir.join(INDEX_FILE);

        let vector_index = if index_path.exists() {
            match VectorIndex::load(&index_path, VectorIndexConfig::default()) {
                Ok(index) => {
                    debug!(vectors = index.size(), "loaded vector index");
                    Some(index)
                }
                Err(err) => {
                    warn!(error = %err, "discarding unreadable vector index");
                    let _ = std::fs::remove_file(&index_path);
                    None
                }
            }
        } else {
            None
        };

        Ok(Self {
            db,
            vector_index,
            index_path,
        })
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn db_mut(&mut self) -> &mut Database {
        &mut self.db
    }

    pub fn has_vector_index(&self) -> bool {
        self.vector_index.is_some()
    }

    fn rowid_names(&self) -> Result<HashMap<u64, String>, RegistryError> {
        let conn = self.db.conn();
        let mut stmt = conn.prepare("SELECT rowid, qualified_name FROM symbols")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, i64>(0)? as u64, row.get::<_, String>(1)?))
        })?;
        Ok(rows.collect::<Result<HashMap<_, _>, _>>()?)
    }

    /// Stores a symbol and mirrors its embedding into the vector index.
    pub fn upsert_symbol(&mut self, record: &SymbolRecord) -> Result<(), RegistryError> {
        self.db.upsert_symbol(record)?;
        if let (Some(index), Some(bytes)) = (&self.vector_index, &record.embedding) {
            if let (Some(embedding), Some(id)) = (
                bytes_to_embedding(bytes),
                symbol_rowid(&self.db, &record.qualified_name)?,
            ) {
                if index.contains(id) {
                    index.remove(id)?;
                }
                if index.size() + 1 > index.capacity() {
                    index.reserve(index.capacity() * 2 + 16)?;
                }
                index.add(id, &embedding.to_vec())?;
            }
        }
        Ok(())
    }

    /// Makes sure a vector index with the given dimensionality exists,
    /// rebuilding it from the stored embeddings when absent.
    pub fn ensure_vector_index(&mut self, dimensions: usize) -> Result<(), RegistryError> {
        match &self.vector_index {
            Some(index) if index.dimensions() == dimensions => Ok(()),
            _ => self.rebuild_vector_index(dimensions),
        }
    }

    /// Rebuilds the index from every stored embedding.
    pub fn rebuild_vector_index(&mut self, dimensions: usize) -> Result<(), RegistryError> {
        let config = VectorIndexConfig::with_dimensions(dimensions);
        let records = self.db.get_all_symbols()?;
        let index = VectorIndex::new(config)?;
        index.reserve(records.len().max(16))?;

        let mut added = 0usize;
        for record in &records {
            let Some(bytes) = &record.embedding else {
                continue;
            };
            let Some(embedding) = bytes_to_embedding(bytes) else {
                warn!(symbol = %record.qualified_name, "skipping malformed stored embedding");
                continue;
            };
            if embedding.len() != dimensions {
                warn!(
                    symbol = %record.qualified_name,
                    got = embedding.len(),
                    expected = dimensions,
                    "skipping embedding with stale dimensionality"
                );
                continue;
            }
            if let Some(id) = symbol_rowid(&self.db, &record.qualified_name)? {
                index.add(id, &embedding.to_vec())?;
                added += 1;
            }
        }
        info!(vectors = added, dimensions, "rebuilt vector index");
        self.vector_index = Some(index);
        Ok(())
    }

    pub fn save_vector_index(&self) -> Result<(), RegistryError> {
        if let Some(index) = &self.vector_index {
            index.save(&self.index_path)?;
        }
        Ok(())
    }

    /// Nearest-neighbor lookup for a batch of query vectors.
    ///
    /// Returns `(query_position, matched_qualified_name, similarity)`
    /// tuples, excluding each query's own stored vector.
    pub fn search_batch_parallel(
        &self,
        queries: &[(String, Array1<f32>)],
        k: usize,
    ) -> Result<Vec<(usize, String, f32)>, RegistryError> {
        let Some(index) = &self.vector_index else {
            return Ok(Vec::new());
        };
        let names = self.rowid_names()?;

        let hits: Vec<(usize, String, f32)> = queries
            .par_iter()
            .enumerate()
            .flat_map_iter(|(position, (query_name, vector))| {
                let matches = match index.search(&vector.to_vec(), k + 1) {
                    Ok(matches) => matches,
                    Err(err) => {
                        warn!(query = %query_name, error = %err, "vector search failed");
                        Vec::new()
                    }
                };
                matches
                    .into_iter()
                    .filter_map(|hit| {
                        let name = names.get(&hit.id)?;
                        if name == query_name {
                            return None;
                        }
                        Some((position, name.clone(), hit.similarity()))
                    })
                    .collect::<Vec<_>>()
            })
            .collect();
        Ok(hits)
    }
}

fn symbol_rowid(db: &Database, qualified_name: &str) -> Result<Option<u64>, RegistryError> {
    let id: Option<i64> = db
        .conn()
        .query_row(
            "SELECT rowid FROM symbols WHERE qualified_name = ?1",
            [qualified_name],
            |row| row.get(0),
        )
        .optional()?;
    Ok(id.map(|v| v as u64))
}
