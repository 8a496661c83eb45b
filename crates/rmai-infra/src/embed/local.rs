//! FastEmbed-based local embedding generator.

use std::str::FromStr;
use std::sync::{Arc, Mutex};

use fastembed::{EmbeddingModel, TextEmbedding, TextInitOptions};

use rmai_core::retrieval::Embedder;
use rmai_types::error::EmbeddingError;

/// Keeps one loaded `TextEmbedding` behind a mutex; inference runs on
/// tokio's blocking pool.
pub struct FastEmbedder {
    model_label: String,
    dimension: usize,
    inner: Arc<Mutex<TextEmbedding>>,
}

impl FastEmbedder {
    /// Load a model by its Hugging Face id (e.g. `BAAI/bge-small-en-v1.5`).
    pub fn try_new(model_name: &str) -> Result<Self, EmbeddingError> {
        let label = model_name.trim();
        if label.is_empty() {
            return Err(EmbeddingError::Init("fastembed model name cannot be empty".into()));
        }

        let embedding_model = EmbeddingModel::from_str(label)
            .map_err(|e| EmbeddingError::Init(format!("unknown fastembed model `{label}`: {e}")))?;
        let info = TextEmbedding::get_model_info(&embedding_model)
            .map_err(|e| EmbeddingError::Init(format!("no metadata for `{label}`: {e}")))?;
        let dimension = info.dim;

        let model = TextEmbedding::try_new(TextInitOptions::new(embedding_model))
            .map_err(|e| EmbeddingError::Init(format!("failed to load `{label}`: {e}")))?;
        tracing::info!(model = label, dimension, "fastembed model loaded");

        Ok(Self {
            model_label: label.to_string(),
            dimension,
            inner: Arc::new(Mutex::new(model)),
        })
    }
}

impl Embedder for FastEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let inner = Arc::clone(&self.inner);
        let batch = texts.to_vec();
        let vectors = tokio::task::spawn_blocking(move || {
            let mut model = inner
                .lock()
                .map_err(|_| EmbeddingError::Embed("embedding model lock poisoned".into()))?;
            model
                .embed(batch, None)
                .map_err(|e| EmbeddingError::Embed(format!("fastembed inference failed: {e}")))
        })
        .await
        .map_err(|e| EmbeddingError::Embed(format!("embedding task failed: {e}")))??;

        if let Some(v) = vectors.iter().find(|v| v.len() != self.dimension) {
            return Err(EmbeddingError::Embed(format!(
                "unexpected embedding dimension (expected {}, got {})",
                self.dimension,
                v.len()
            )));
        }
        Ok(vectors)
    }

    fn model_name(&self) -> &str {
        &self.model_label
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_model_name_rejected() {
        assert!(matches!(
            FastEmbedder::try_new("  "),
            Err(EmbeddingError::Init(_))
        ));
    }

    #[test]
    fn test_unknown_model_rejected() {
        assert!(matches!(
            FastEmbedder::try_new("not-a/real-model"),
            Err(EmbeddingError::Init(_))
        ));
    }
}
