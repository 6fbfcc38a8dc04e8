//! detect - duplicate/similarity comparison framework
//!
//! Extracted symbols go in, severity-classified findings come out. Scores are
//! produced by pluggable detectors (exact hash, structural, token, semantic
//! embedding), persisted in a project-local registry (SQLite + ANN index).

pub mod candidate;
pub mod classify;
pub mod config;
pub mod db;
pub mod detectors;
pub mod embedding;
pub mod framework;
pub mod registry;
pub mod report;
pub mod vector_index;

pub use candidate::{content_hash, structure_hash, Candidate};
pub use classify::{Classifier, Finding, Severity};
pub use config::{ComparisonConfig, ConfigError, DetectorKind, Scope};
pub use db::{Database, PairStatus, ProjectRecord, SimilarPairRecord, SymbolRecord};
pub use detectors::{Comparison, Detector, SimilarityScore};
pub use embedding::{
    bytes_to_embedding, cosine_similarity, embedding_to_bytes, EmbeddingError, OllamaEmbedder,
};
pub use framework::{ComparisonFramework, FrameworkError};
pub use registry::{Registry, RegistryError, REGISTRY_DIR};
pub use report::Report;
pub use vector_index::{VectorIndex, VectorIndexConfig};
