pub mod auth;
pub mod backends;
pub mod chunking;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod generation;
pub mod ingest;
pub mod models;
pub mod ocr;
pub mod orchestrator;
pub mod retrieval;
pub mod stores;
pub mod traits;

#[cfg(test)]
pub(crate) mod test_support;

pub use auth::{hash_password, verify_password, Claims, TokenSigner};
pub use backends::AiBackends;
pub use chunking::{split_text, ChunkingConfig};
pub use config::{ModelProfile, OcrBackend, PipelineConfig, DEFAULT_TOP_K, VECTOR_INDEX_DIR};
pub use embeddings::{CharacterNgramEmbedder, EmbeddingProvider, GeminiEmbedder};
pub use error::{AuthError, IngestError, PipelineError, SearchError, StoreError};
pub use extractor::{ExtractionMethod, ExtractionOutcome, LopdfExtractor, PageText, TextExtractor};
pub use generation::{AnswerGenerator, GeminiChat, LanguageModel, NOT_IN_CONTEXT};
pub use ingest::{
    discover_pdf_files, DeleteOutcome, IndexingStatus, IngestionPipeline, IngestionReport,
    SkippedDocument, UploadReport,
};
pub use models::{
    CatalogEntry, ConversationPage, ConversationRecord, DocumentSource, DocumentUpload,
    IndexGeneration, NewUser, Page, RetrievedChunk, User,
};
pub use ocr::{build_ocr_engine, OcrEngine};
pub use orchestrator::{ChatAnswer, QueryPipeline};
pub use retrieval::{Indexer, Retriever};
pub use stores::{GenerationalIndex, SqliteStore};
pub use traits::{BlobStore, ConversationLog, DocumentCatalog, UserStore, VectorIndex};
