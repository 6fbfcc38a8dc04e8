//! ANN index over symbol embeddings, backed by usearch HNSW

use std::path::Path;
use thiserror::Error;
use usearch::{Index, IndexOptions, MetricKind, ScalarKind};

#[derive(Error, Debug)]
pub enum VectorIndexError {
    #[error("usearch error: {0}")]
    Usearch(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
}

impl From<cxx::Exception> for VectorIndexError {
    fn from(e: cxx::Exception) -> Self {
        VectorIndexError::Usearch(e.what().to_string())
    }
}

pub type Result<T> = std::result::Result<T, VectorIndexError>;

/// One ANN hit
#[derive(Debug, Clone)]
pub struct AnnMatch {
    /// Registry row id of the matched symbol
    pub id: u64,
    /// Cosine distance (1 - similarity)
    pub distance: f32,
}

impl AnnMatch {
    pub fn similarity(&self) -> f32 {
        1.0 - self.distance
    }
}

#[derive(Debug, Clone, Copy)]
pub struct VectorIndexConfig {
    pub dimensions: usize,
    /// HNSW connectivity (M); higher is more accurate and slower
    pub connectivity: usize,
    pub expansion_add: usize,
    pub expansion_search: usize,
}

impl Default for VectorIndexConfig {
    fn default() -> Self {
        Self {
            dimensions: 1024, // bge-m3
            connectivity: 16,
            expansion_add: 128,
            expansion_search: 64,
        }
    }
}

impl VectorIndexConfig {
    pub fn with_dimensions(dimensions: usize) -> Self {
        Self {
            dimensions,
            ..Default::default()
        }
    }

    fn options(&self) -> IndexOptions {
        IndexOptions {
            dimensions: self.dimensions,
            metric: MetricKind::Cos,
            quantization: ScalarKind::F32,
            connectivity: self.connectivity,
            expansion_add: self.expansion_add,
            expansion_search: self.expansion_search,
            multi: false,
        }
    }
}

pub struct VectorIndex {
    index: Index,
    config: VectorIndexConfig,
}

impl VectorIndex {
    pub fn new(config: VectorIndexConfig) -> Result<Self> {
        let index = Index::new(&config.options())?;
        Ok(Self { index, config })
    }

    pub fn load(path: &Path, config: VectorIndexConfig) -> Result<Self> {
        let index = Index::new(&config.options())?;
        index.load(path.to_str().unwrap_or_default())?;
        // the file dictates the dimensionality, not the caller
        let mut config = config;
        config.dimensions = index.dimensions();
        Ok(Self { index, config })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        self.index.save(path.to_str().unwrap_or_default())?;
        Ok(())
    }

    pub fn reserve(&self, capacity: usize) -> Result<()> {
        self.index.reserve(capacity)?;
        Ok(())
    }

    fn check_dimensions(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.config.dimensions {
            return Err(VectorIndexError::DimensionMismatch {
                expected: self.config.dimensions,
                got: vector.len(),
            });
        }
        Ok(())
    }

    pub fn add(&self, id: u64, vector: &[f32]) -> Result<()> {
        self.check_dimensions(vector)?;
        self.index.add(id, vector)?;
        Ok(())
    }

    pub fn remove(&self, id: u64) -> Result<bool> {
        Ok(self.index.remove(id)? > 0)
    }

    pub fn contains(&self, id: u64) -> bool {
        self.index.contains(id)
    }

    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<AnnMatch>> {
        self.check_dimensions(query)?;
        let matches = self.index.search(query, k)?;
        Ok(matches
            .keys
            .iter()
            .zip(matches.distances.iter())
            .map(|(&id, &distance)| AnnMatch { id, distance })
            .collect())
    }

    pub fn search_filtered<F>(&self, query: &[f32], k: usize, filter: F) -> Result<Vec<AnnMatch>>
    where
        F: Fn(u64) -> bool,
    {
        self.check_dimensions(query)?;
        let matches = self.index.filtered_search(query, k, &filter)?;
        Ok(matches
            .keys
            .iter()
            .zip(matches.distances.iter())
            .map(|(&id, &distance)| AnnMatch { id, distance })
            .collect())
    }

    pub fn size(&self) -> usize {
        self.index.size()
    }

    pub fn capacity(&self) -> usize {
        self.index.capacity()
    }

    pub fn memory_usage(&self) -> usize {
        self.index.memory_usage()
    }

    pub fn dimensions(&self) -> usize {
        self.config.dimensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_index() -> VectorIndex {
        let mut config = VectorIndexConfig::with_dimensions(4);
        config.connectivity = 8;
        let index = VectorIndex::new(config).unwrap();
        index.reserve(16).unwrap();
        index
    }

    #[test]
    fn test_add_and_search() {
        let index = small_index();
        index.add(1, &[1.0, 0.0, 0.0, 0.0]).unwrap();
        index.add(2, &[0.9, 0.1, 0.0, 0.0]).unwrap();
        index.add(3, &[0.0, 1.0, 0.0, 0.0]).unwrap();

        let results = index.search(&[1.0, 0.0, 0.0, 0.0], 2).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, 1);
        assert!(results[0].similarity() > 0.99);
        assert_eq!(results[1].id, 2);
    }

    #[test]
    fn test_dimension_mismatch() {
        let index = small_index();
        assert!(matches!(
            index.add(1, &[1.0, 0.0]),
            Err(VectorIndexError::DimensionMismatch { expected: 4, got: 2 })
        ));
    }

    #[test]
    fn test_search_filtered_excludes_id() {
        let index = small_index();
        index.add(1, &[1.0, 0.0, 0.0, 0.0]).unwrap();
        index.add(2, &[0.9, 0.1, 0.0, 0.0]).unwrap();

        let results = index
            .search_filtered(&[1.0, 0.0, 0.0, 0.0], 2, |id| id != 1)
            .unwrap();
        assert!(!results.iter().any(|r| r.id == 1));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.usearch");

        let mut config = VectorIndexConfig::with_dimensions(4);
        config.connectivity = 8;
        let index = VectorIndex::new(config).unwrap();
        index.reserve(8).unwrap();
        index.add(1, &[1.0, 0.0, 0.0, 0.0]).unwrap();
        index.add(2, &[0.0, 1.0, 0.0, 0.0]).unwrap();
        index.save(&path).unwrap();

        let loaded = VectorIndex::load(&path, config).unwrap();
        assert_eq!(loaded.size(), 2);
        assert!(loaded.contains(1));
        assert!(loaded.contains(2));
    }

    #[test]
    fn test_remove() {
        let index = small_index();
        index.add(7, &[0.5, 0.5, 0.0, 0.0]).unwrap();
        assert!(index.contains(7));
        assert!(index.remove(7).unwrap());
        assert!(!index.contains(7));
    }
}
