use crate::settings::{Settings, DEFAULT_SECRET_KEY};
use pdf_chat_core::{
    build_ocr_engine, AiBackends, DocumentCatalog, GenerationalIndex, IngestionPipeline,
    ModelProfile, PipelineConfig, PipelineError, QueryPipeline, SqliteStore, TextExtractor,
    TokenSigner, UserStore, VectorIndex,
};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

/// Shared state handed to every route handler.
#[derive(Clone)]
pub struct AppState {
    pub profile: ModelProfile,
    pub ingestion: Arc<IngestionPipeline>,
    pub query: Arc<QueryPipeline>,
    pub catalog: Arc<dyn DocumentCatalog>,
    pub users: Arc<dyn UserStore>,
    pub tokens: Arc<TokenSigner>,
    pub admins: Arc<HashSet<String>>,
}

impl AppState {
    /// Opens the stores under the data directory and wires both pipelines.
    pub async fn build(settings: &Settings) -> anyhow::Result<Self> {
        let config = settings.pipeline_config()?;
        if settings.secret_key == DEFAULT_SECRET_KEY {
            warn!("SECRET_KEY is not set, tokens are signed with the built-in default");
        }

        let store = Arc::new(SqliteStore::connect(&settings.database_path()).await?);
        let backends = match AiBackends::gemini(&config) {
            Ok(backends) => Some(backends),
            Err(PipelineError::MissingCredential) => {
                warn!("API_KEY is not set, indexing and chat requests will fail");
                None
            }
            Err(error) => return Err(error.into()),
        };

        info!(
            profile = %config.profile,
            index_dir = %config.index_dir.display(),
            top_k = config.top_k,
            "pipelines configured"
        );

        Ok(Self::assemble(
            &config,
            backends,
            store,
            TokenSigner::new(&settings.secret_key, settings.access_token_expire_minutes),
            settings.admins(),
        ))
    }

    pub fn assemble(
        config: &PipelineConfig,
        backends: Option<AiBackends>,
        store: Arc<SqliteStore>,
        tokens: TokenSigner,
        admins: HashSet<String>,
    ) -> Self {
        let index: Arc<dyn VectorIndex> = Arc::new(GenerationalIndex::new(&config.index_dir));
        let extractor = TextExtractor::new(build_ocr_engine(&config.ocr));

        let ingestion = IngestionPipeline::new(
            extractor,
            config.profile.chunking(),
            backends.as_ref().map(|backends| Arc::clone(&backends.embedder)),
            Arc::clone(&index),
            store.clone(),
            store.clone(),
        );
        let query = QueryPipeline::new(
            config.profile,
            backends,
            index,
            config.top_k,
            store.clone(),
            store.clone(),
        );

        Self {
            profile: config.profile,
            ingestion: Arc::new(ingestion),
            query: Arc::new(query),
            catalog: store.clone(),
            users: store,
            tokens: Arc::new(tokens),
            admins: Arc::new(admins),
        }
    }
}
