//! Embedding backends.
//!
//! - `FastEmbedder`: local ONNX inference via fastembed (default)
//! - `OpenAiEmbedder`: the `/embeddings` endpoint of an OpenAI-compatible API

pub mod local;
pub mod openai;

use secrecy::SecretString;

use rmai_core::retrieval::BoxEmbedder;
use rmai_types::config::{EmbeddingBackend, EmbeddingConfig};
use rmai_types::error::EmbeddingError;

pub use self::local::FastEmbedder;
pub use self::openai::OpenAiEmbedder;

/// Build the configured embedder.
///
/// Loading the fastembed model may download it on first use, so this runs
/// on a blocking thread.
pub async fn create_embedder(
    config: &EmbeddingConfig,
    openai_key: Option<SecretString>,
) -> Result<BoxEmbedder, EmbeddingError> {
    match config.backend {
        EmbeddingBackend::Fastembed => {
            let model = config.model.clone();
            let embedder = tokio::task::spawn_blocking(move || FastEmbedder::try_new(&model))
                .await
                .map_err(|e| EmbeddingError::Init(format!("embedder init task failed: {e}")))??;
            Ok(BoxEmbedder::new(embedder))
        }
        EmbeddingBackend::Openai => {
            let key = openai_key.ok_or_else(|| {
                EmbeddingError::Init("OPENAI_API_KEY is required for the openai embedding backend".into())
            })?;
            Ok(BoxEmbedder::new(OpenAiEmbedder::new(
                key,
                &config.openai_base_url,
                &config.openai_model,
                config.openai_dimension,
            )))
        }
    }
}
