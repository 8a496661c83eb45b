//! Embeddings through an OpenAI-compatible `/embeddings` endpoint.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use rmai_core::retrieval::Embedder;
use rmai_types::error::EmbeddingError;

pub struct OpenAiEmbedder {
    client: reqwest::Client,
    api_key: SecretString,
    endpoint: String,
    model: String,
    dimension: usize,
}

/// `{base}/embeddings`, tolerating a trailing slash or a full endpoint URL.
pub fn embeddings_endpoint(base_url: &str) -> String {
    let base = base_url.trim_end_matches('/');
    if base.ends_with("/embeddings") {
        base.to_string()
    } else {
        format!("{base}/embeddings")
    }
}

impl OpenAiEmbedder {
    pub fn new(api_key: SecretString, base_url: &str, model: &str, dimension: usize) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            endpoint: embeddings_endpoint(base_url),
            model: model.to_string(),
            dimension,
        }
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

/// Order vectors by their `index` field; the API does not promise order.
fn into_vectors(response: EmbeddingResponse, expected: usize) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    let mut data = response.data;
    if data.len() != expected {
        return Err(EmbeddingError::Embed(format!(
            "expected {expected} embeddings, got {}",
            data.len()
        )));
    }
    data.sort_by_key(|d| d.index);
    Ok(data.into_iter().map(|d| d.embedding).collect())
}

impl Embedder for OpenAiEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(self.api_key.expose_secret())
            .json(&EmbeddingRequest {
                model: &self.model,
                input: texts,
            })
            .send()
            .await
            .map_err(|e| EmbeddingError::Embed(format!("embeddings request failed: {e}")))?
            .error_for_status()
            .map_err(|e| EmbeddingError::Embed(format!("embeddings endpoint returned error: {e}")))?
            .json::<EmbeddingResponse>()
            .await
            .map_err(|e| EmbeddingError::Embed(format!("invalid embeddings response: {e}")))?;

        into_vectors(response, texts.len())
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embeddings_endpoint() {
        assert_eq!(
            embeddings_endpoint("https://api.openai.com/v1/"),
            "https://api.openai.com/v1/embeddings"
        );
        assert_eq!(
            embeddings_endpoint("http://localhost:11434/v1/embeddings"),
            "http://localhost:11434/v1/embeddings"
        );
    }

    #[test]
    fn test_vectors_are_ordered_by_index() {
        let response: EmbeddingResponse = serde_json::from_str(
            r#"{"data":[{"index":1,"embedding":[2.0]},{"index":0,"embedding":[1.0]}]}"#,
        )
        .unwrap();
        let vectors = into_vectors(response, 2).unwrap();
        assert_eq!(vectors, vec![vec![1.0], vec![2.0]]);
    }

    #[test]
    fn test_count_mismatch_is_error() {
        let response: EmbeddingResponse =
            serde_json::from_str(r#"{"data":[{"index":0,"embedding":[1.0]}]}"#).unwrap();
        assert!(into_vectors(response, 2).is_err());
    }
}
