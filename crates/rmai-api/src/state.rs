//! Application state wiring all services together.
//!
//! Services are generic over their ports; `AppState` pins them to the
//! concrete infra implementations. Used by both CLI commands and HTTP
//! handlers.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use dashmap::DashMap;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use rmai_core::assistant::AssistantService;
use rmai_core::llm::BoxLlmProvider;
use rmai_core::meeting::{MeetingAssistant, MeetingService};
use rmai_core::rag::RagService;
use rmai_core::retrieval::{BoxEmbedder, BoxStudyIndex, Retriever};
use rmai_infra::config::{load_global_config, openai_api_key, resolve_data_dir, stt_api_key};
use rmai_infra::embed::create_embedder;
use rmai_infra::llm::{create_provider, prompt_settings};
use rmai_infra::search::DuckDuckGoSearch;
use rmai_infra::sqlite::{DatabasePool, SqliteSessionRepository};
use rmai_infra::stt::OpenAiSttBackend;
use rmai_infra::vector::{LanceStudyIndex, LanceVectorStore};
use rmai_types::config::GlobalConfig;

pub type ConcreteMeetingService = MeetingService<SqliteSessionRepository>;
pub type ConcreteAssistant = AssistantService<DuckDuckGoSearch>;
pub type ConcreteMeetingAssistant = MeetingAssistant<SqliteSessionRepository, DuckDuckGoSearch>;

pub const LLM_UNAVAILABLE: &str =
    "LLM provider unavailable (set OPENAI_API_KEY or point [llm].base_url at a local server)";

/// Embedder, study index and the services built on them.
pub struct RetrievalStack {
    pub embedder: Arc<BoxEmbedder>,
    pub index: Arc<BoxStudyIndex>,
    pub retriever: Arc<Retriever>,
    /// `None` without an LLM provider; plain search still works.
    pub rag: Option<Arc<RagService>>,
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GlobalConfig>,
    pub data_dir: PathBuf,
    pub db_pool: DatabasePool,
    pub meetings: Arc<ConcreteMeetingService>,
    /// `None` when no LLM provider could be created.
    pub assistant: Option<Arc<ConcreteAssistant>>,
    pub meeting_assistant: Option<Arc<ConcreteMeetingAssistant>>,
    /// `None` when the embedder or study index could not be opened.
    pub retrieval: Option<Arc<RetrievalStack>>,
    /// `None` when no speech-to-text key is configured.
    pub stt: Option<Arc<OpenAiSttBackend>>,
    /// Live transcription streams by session; cancelling one stops it.
    pub live_sessions: Arc<DashMap<Uuid, CancellationToken>>,
}

/// Open the embedder and the study index for it.
pub async fn open_retrieval(
    config: &GlobalConfig,
    data_dir: &std::path::Path,
    llm: Option<Arc<BoxLlmProvider>>,
) -> anyhow::Result<RetrievalStack> {
    let embedder = create_embedder(&config.embedding, openai_api_key())
        .await
        .context("failed to initialize the embedding model")?;
    let store = LanceVectorStore::new(data_dir.join("lancedb"))
        .await
        .context("failed to open the vector database")?;
    let index = LanceStudyIndex::open(&store, &config.retrieval.table, embedder.dimension())
        .await
        .context("failed to open the study index")?;

    let embedder = Arc::new(embedder);
    let index = Arc::new(BoxStudyIndex::new(index));
    let retriever = Arc::new(Retriever::new(embedder.clone(), index.clone()));
    let rag = llm.map(|llm| {
        Arc::new(RagService::new(
            retriever.clone(),
            llm,
            prompt_settings(&config.llm),
            config.retrieval.top_k,
            config.retrieval.per_field_chars,
        ))
    });
    Ok(RetrievalStack {
        embedder,
        index,
        retriever,
        rag,
    })
}

fn speech_to_text(config: &GlobalConfig) -> Option<Arc<OpenAiSttBackend>> {
    let key = match stt_api_key() {
        Some(key) => key,
        // Self-hosted servers usually ignore the key.
        None if !config.transcription.stt_base_url.contains("api.openai.com") => {
            secrecy::SecretString::from(String::new())
        }
        None => return None,
    };
    match OpenAiSttBackend::new(&config.transcription, key) {
        Ok(backend) => Some(Arc::new(backend)),
        Err(err) => {
            tracing::warn!(error = %err, "speech-to-text unavailable");
            None
        }
    }
}

impl AppState {
    /// Load config, open the database and wire services.
    ///
    /// With `with_retrieval`, also load the embedder and study index; a
    /// failure there is logged and leaves `retrieval` empty.
    pub async fn init(with_retrieval: bool) -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();
        tokio::fs::create_dir_all(&data_dir)
            .await
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        let config = load_global_config(&data_dir).await;
        Self::build(config, data_dir, with_retrieval).await
    }

    /// Wire services for an explicit config and data directory.
    ///
    /// A missing LLM provider is logged and only disables the services that
    /// generate text; sessions, transcription and ingestion keep working.
    pub async fn build(
        config: GlobalConfig,
        data_dir: PathBuf,
        with_retrieval: bool,
    ) -> anyhow::Result<Self> {
        Self::build_with_llm_key(config, data_dir, with_retrieval, openai_api_key()).await
    }

    pub(crate) async fn build_with_llm_key(
        config: GlobalConfig,
        data_dir: PathBuf,
        with_retrieval: bool,
        llm_key: Option<secrecy::SecretString>,
    ) -> anyhow::Result<Self> {
        let db_url = format!("{}?mode=rwc", rmai_infra::sqlite::database_url(&data_dir));
        let db_pool = DatabasePool::new(&db_url).await.context("failed to open database")?;

        let llm = match create_provider(&config.llm, llm_key.as_ref()) {
            Ok(provider) => Some(Arc::new(provider)),
            Err(err) => {
                tracing::warn!(error = %err, "{LLM_UNAVAILABLE}");
                None
            }
        };

        let retrieval = if with_retrieval {
            match open_retrieval(&config, &data_dir, llm.clone()).await {
                Ok(stack) => Some(Arc::new(stack)),
                Err(e) => {
                    tracing::warn!("study retrieval disabled: {e:#}");
                    None
                }
            }
        } else {
            None
        };

        let meetings = Arc::new(MeetingService::new(SqliteSessionRepository::new(db_pool.clone())));

        let (assistant, meeting_assistant) = match llm {
            Some(llm) => {
                let search = Arc::new(DuckDuckGoSearch::new(&config.web_search)?);
                let assistant = Arc::new(AssistantService::new(
                    llm,
                    search,
                    prompt_settings(&config.llm),
                    config.web_search.page_chars,
                ));
                let meeting_assistant = Arc::new(MeetingAssistant::new(
                    meetings.clone(),
                    assistant.clone(),
                    retrieval.as_ref().map(|r| r.retriever.clone()),
                    config.context.clone(),
                    config.retrieval.top_k,
                ));
                (Some(assistant), Some(meeting_assistant))
            }
            None => (None, None),
        };

        let stt = speech_to_text(&config);

        Ok(Self {
            config: Arc::new(config),
            data_dir,
            db_pool,
            meetings,
            assistant,
            meeting_assistant,
            retrieval,
            stt,
            live_sessions: Arc::new(DashMap::new()),
        })
    }

    /// The retrieval stack, or an error explaining why it is missing.
    pub fn require_retrieval(&self) -> anyhow::Result<&RetrievalStack> {
        self.retrieval
            .as_deref()
            .context("the study index is unavailable (see earlier warnings)")
    }

    pub fn require_assistant(&self) -> anyhow::Result<&ConcreteAssistant> {
        self.assistant.as_deref().context(LLM_UNAVAILABLE)
    }

    /// Study summaries need both the index and an LLM.
    pub fn require_rag(&self) -> anyhow::Result<&RagService> {
        self.require_retrieval()?
            .rag
            .as_deref()
            .context(LLM_UNAVAILABLE)
    }
}
