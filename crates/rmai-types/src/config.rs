//! Global configuration types.
//!
//! `GlobalConfig` represents the top-level `config.toml` in the data
//! directory. Every section and field has a default, so an empty file (or no
//! file at all) yields a working configuration.

use serde::{Deserialize, Serialize};

/// Top-level configuration.
///
/// Loaded from `~/.rmai/config.toml`. All fields have sensible defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    pub llm: LlmConfig,
    pub embedding: EmbeddingConfig,
    pub retrieval: RetrievalConfig,
    pub context: ContextConfig,
    pub transcription: TranscriptionConfig,
    pub pubmed: PubmedConfig,
    pub web_search: WebSearchConfig,
    pub server: ServerConfig,
}

/// Chat-completion backend (any OpenAI-compatible endpoint).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider_name: String,
    pub base_url: String,
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider_name: "openai".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            temperature: 0.0,
            max_tokens: 1024,
        }
    }
}

/// Which embedder produces study and query vectors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    /// Local ONNX model via fastembed.
    #[default]
    Fastembed,
    /// OpenAI-compatible `/embeddings` endpoint.
    Openai,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub backend: EmbeddingBackend,
    /// fastembed model code, e.g. `BAAI/bge-small-en-v1.5`.
    pub model: String,
    pub openai_base_url: String,
    pub openai_model: String,
    pub openai_dimension: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend: EmbeddingBackend::Fastembed,
            model: "BAAI/bge-small-en-v1.5".to_string(),
            openai_base_url: "https://api.openai.com/v1".to_string(),
            openai_model: "text-embedding-3-small".to_string(),
            openai_dimension: 1536,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// LanceDB table holding the study vectors.
    pub table: String,
    pub top_k: usize,
    /// Title and abstract are clipped to this many characters in LLM context.
    pub per_field_chars: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            table: "studies".to_string(),
            top_k: 3,
            per_field_chars: 1000,
        }
    }
}

/// A section of the assembled meeting context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextSection {
    Transcription,
    Studies,
    Queries,
    Answers,
}

impl ContextSection {
    pub const DEFAULT_ORDER: [ContextSection; 4] = [
        ContextSection::Transcription,
        ContextSection::Studies,
        ContextSection::Queries,
        ContextSection::Answers,
    ];
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    pub max_chars: usize,
    pub priority_order: Vec<ContextSection>,
    pub max_conversation_messages: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_chars: 2000,
            priority_order: ContextSection::DEFAULT_ORDER.to_vec(),
            max_conversation_messages: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptionConfig {
    pub sample_rate: u32,
    /// Length of the rolling audio window sent to the STT backend.
    pub window_secs: f64,
    /// Minimum audio-clock interval between two STT calls.
    pub refresh_secs: f64,
    /// The window must hold at least this much audio before transcribing.
    pub min_audio_secs: f64,
    /// Committed transcript grows in chunks of this many seconds.
    pub chunk_secs: f64,
    pub activity_threshold: f32,
    pub stt_base_url: String,
    pub stt_model: String,
    pub language: Option<String>,
    /// Upper bound on a single STT request.
    pub stt_timeout_secs: u64,
    /// Insert a paragraph break after this many sentences.
    pub paragraph_every: usize,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            window_secs: 8.0,
            refresh_secs: 0.5,
            min_audio_secs: 0.5,
            chunk_secs: 10.0,
            activity_threshold: 0.01,
            stt_base_url: "https://api.openai.com/v1".to_string(),
            stt_model: "whisper-1".to_string(),
            language: Some("en".to_string()),
            stt_timeout_secs: 30,
            paragraph_every: 10,
        }
    }
}

/// NCBI E-utilities settings for the ingest pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PubmedConfig {
    pub base_url: String,
    pub tool: String,
    pub email: String,
    pub datetype: String,
    /// Only records added within this many days are ingested.
    pub reldays: u32,
    /// Records per efetch page.
    pub retmax: u32,
    /// Records per vector-index upsert.
    pub upsert_chunk: usize,
}

impl Default for PubmedConfig {
    fn default() -> Self {
        Self {
            base_url: "https://eutils.ncbi.nlm.nih.gov/entrez/eutils".to_string(),
            tool: "research-ai".to_string(),
            email: String::new(),
            datetype: "edat".to_string(),
            reldays: 30,
            retmax: 400,
            upsert_chunk: 200,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebSearchConfig {
    pub endpoint: String,
    pub max_results: usize,
    pub fetch_pages: bool,
    pub page_chars: usize,
}

impl Default for WebSearchConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://html.duckduckgo.com/html/".to_string(),
            max_results: 5,
            fetch_pages: false,
            page_chars: 500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Directory with a built web UI, served as the SPA fallback.
    pub web_dir: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8501,
            web_dir: None,
        }
    }
}
