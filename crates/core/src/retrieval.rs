use crate::chunking::{split_text, ChunkingConfig};
use crate::embeddings::EmbeddingProvider;
use crate::error::{PipelineError, SearchError};
use crate::models::{IndexGeneration, RetrievedChunk};
use crate::traits::VectorIndex;
use std::sync::Arc;
use tracing::{info, warn};

/// Turns one corpus of text into a new current index generation.
pub struct Indexer {
    chunking: ChunkingConfig,
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
}

impl Indexer {
    pub fn new(
        chunking: ChunkingConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
    ) -> Self {
        Self {
            chunking,
            embedder,
            index,
        }
    }

    /// Nothing is committed unless every chunk was embedded.
    pub async fn index_corpus(&self, corpus: &str) -> Result<IndexGeneration, PipelineError> {
        if corpus.trim().is_empty() {
            return Err(PipelineError::NoReadableContent);
        }
        let chunks = split_text(corpus, self.chunking)?;
        if chunks.is_empty() {
            return Err(PipelineError::NoReadableContent);
        }

        let embeddings = self.embedder.embed_documents(&chunks).await?;
        if embeddings.len() != chunks.len() {
            return Err(SearchError::BackendResponse {
                backend: self.embedder.model_name().to_string(),
                details: format!(
                    "returned {} embeddings for {} chunks",
                    embeddings.len(),
                    chunks.len()
                ),
            }
            .into());
        }

        let generation = self
            .index
            .replace(&chunks, &embeddings, self.embedder.model_name())
            .await?;
        info!(
            generation = %generation.id,
            chunks = generation.chunk_count,
            corpus_chars = corpus.chars().count(),
            "corpus indexed"
        );
        Ok(generation)
    }

    pub async fn clear(&self) -> Result<(), PipelineError> {
        Ok(self.index.clear().await?)
    }
}

pub struct Retriever {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    top_k: usize,
}

impl Retriever {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
        top_k: usize,
    ) -> Self {
        Self {
            embedder,
            index,
            top_k: top_k.max(1),
        }
    }

    pub async fn is_ready(&self) -> Result<bool, PipelineError> {
        Ok(self.index.current_generation().await?.is_some())
    }

    /// Most relevant chunks first.
    pub async fn retrieve(&self, question: &str) -> Result<Vec<RetrievedChunk>, PipelineError> {
        let generation = self
            .index
            .current_generation()
            .await?
            .ok_or(PipelineError::IndexNotReady)?;

        if generation.embedding_model != self.embedder.model_name() {
            warn!(
                indexed_with = %generation.embedding_model,
                querying_with = %self.embedder.model_name(),
                "index was built with a different embedding model"
            );
        }

        let query = self.embedder.embed_query(question).await?;
        match self.index.search(&query, self.top_k).await {
            Ok(chunks) => Ok(chunks),
            Err(SearchError::NotReady(_)) => Err(PipelineError::IndexNotReady),
            Err(error) => Err(error.into()),
        }
    }
}
