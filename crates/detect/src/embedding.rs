//! Ollama embedding client and vector helpers

use ndarray::Array1;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error: {0}")]
    Api(String),
    #[error("embedding backend unreachable at {0}; start Ollama or disable the semantic detector")]
    Unavailable(String),
}

pub type Result<T> = std::result::Result<T, EmbeddingError>;

/// Ollama embedding generator
pub struct OllamaEmbedder {
    client: Option<Client>,
    base_url: String,
    model: String,
}

#[derive(Serialize)]
struct EmbedRequest {
    model: String,
    input: String,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

impl OllamaEmbedder {
    pub fn new(model: &str) -> Self {
        Self {
            client: None, // lazy init
            base_url: "http://localhost:11434".to_string(),
            model: model.to_string(),
        }
    }

    pub fn with_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    fn client(&mut self) -> Result<&Client> {
        if self.client.is_none() {
            let client = Client::builder()
                .timeout(std::time::Duration::from_secs(60))
                .build()?;
            self.client = Some(client);
        }
        Ok(self.client.as_ref().unwrap())
    }

    /// Check backend availability before committing to a semantic run.
    pub async fn ping(&mut self) -> Result<()> {
        let url = format!("{}/api/tags", self.base_url);
        let base = self.base_url.clone();
        let client = self.client()?;
        let response = client
            .get(url)
            .send()
            .await
            .map_err(|_| EmbeddingError::Unavailable(base.clone()))?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(EmbeddingError::Unavailable(base))
        }
    }

    /// Embed a single text
    pub async fn embed(&mut self, text: &str) -> Result<Array1<f32>> {
        let url = format!("{}/api/embed", self.base_url);
        let request = EmbedRequest {
            model: self.model.clone(),
            input: text.to_string(),
        };

        let client = self.client()?;
        let response = client.post(url).json(&request).send().await?;

        if !response.status().is_success() {
            return Err(EmbeddingError::Api(format!(
                "Ollama returned status {}",
                response.status()
            )));
        }

        let data: EmbedResponse = response.json().await?;
        let embedding = data
            .embeddings
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::Api("no embedding returned".into()))?;

        Ok(Array1::from_vec(embedding))
    }
}

/// Cosine similarity, 0.0 when either vector has zero norm
pub fn cosine_similarity(a: &Array1<f32>, b: &Array1<f32>) -> f32 {
    let norm_a = a.dot(a).sqrt();
    let norm_b = b.dot(b).sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    a.dot(b) / (norm_a * norm_b)
}

/// Little-endian f32 serialization for BLOB storage
pub fn embedding_to_bytes(embedding: &Array1<f32>) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(embedding.len() * 4);
    for f in embedding.iter() {
        bytes.extend_from_slice(&f.to_le_bytes());
    }
    bytes
}

/// Inverse of [`embedding_to_bytes`]; None when the length is not a multiple of 4
pub fn bytes_to_embedding(bytes: &[u8]) -> Option<Array1<f32>> {
    if bytes.len() % 4 != 0 {
        return None;
    }
    let floats = bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes(chunk.try_into().unwrap()))
        .collect();
    Some(Array1::from_vec(floats))
}
