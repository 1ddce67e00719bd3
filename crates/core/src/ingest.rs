use crate::chunking::ChunkingConfig;
use crate::embeddings::EmbeddingProvider;
use crate::error::{IngestError, PipelineError};
use crate::extractor::{ExtractionOutcome, TextExtractor};
use crate::models::{CatalogEntry, DocumentSource, DocumentUpload, IndexGeneration};
use crate::retrieval::Indexer;
use crate::traits::{BlobStore, DocumentCatalog, VectorIndex};
use chrono::Utc;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;
use walkdir::WalkDir;

pub fn discover_pdf_files(folder: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let is_pdf = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));

        if is_pdf {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

pub fn digest_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedDocument {
    pub name: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestionReport {
    pub generation: IndexGeneration,
    pub indexed_documents: usize,
    pub skipped_documents: Vec<SkippedDocument>,
}

/// How the index reacted to a catalog change. Storage already succeeded
/// by the time one of these is produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IndexingStatus {
    Indexed {
        generation_id: String,
        chunk_count: usize,
        skipped_documents: Vec<SkippedDocument>,
    },
    Skipped {
        reason: String,
    },
    Failed {
        reason: String,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadReport {
    pub files: Vec<CatalogEntry>,
    pub indexing: IndexingStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    NotFound,
    Deleted { indexing: IndexingStatus },
}

pub struct IngestionPipeline {
    extractor: TextExtractor,
    chunking: ChunkingConfig,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    index: Arc<dyn VectorIndex>,
    blobs: Arc<dyn BlobStore>,
    catalog: Arc<dyn DocumentCatalog>,
}

impl IngestionPipeline {
    /// `embedder` is `None` when no credential is configured; indexing then
    /// fails per call with [`PipelineError::MissingCredential`].
    pub fn new(
        extractor: TextExtractor,
        chunking: ChunkingConfig,
        embedder: Option<Arc<dyn EmbeddingProvider>>,
        index: Arc<dyn VectorIndex>,
        blobs: Arc<dyn BlobStore>,
        catalog: Arc<dyn DocumentCatalog>,
    ) -> Self {
        Self {
            extractor,
            chunking,
            embedder,
            index,
            blobs,
            catalog,
        }
    }

    fn require_embedder(&self) -> Result<Arc<dyn EmbeddingProvider>, PipelineError> {
        self.embedder
            .clone()
            .ok_or(PipelineError::MissingCredential)
    }

    /// Extracts every document, skipping the ones that yield no text, and
    /// replaces the index with the combined corpus.
    pub async fn index_documents(
        &self,
        documents: &[DocumentSource],
    ) -> Result<IngestionReport, PipelineError> {
        let embedder = self.require_embedder()?;

        let mut texts = Vec::new();
        let mut skipped_documents = Vec::new();
        for document in documents {
            match self.document_text(&document.name, &document.bytes).await {
                Ok(text) => texts.push(text),
                Err(skipped) => skipped_documents.push(skipped),
            }
        }

        self.index_texts(embedder, texts, skipped_documents).await
    }

    async fn document_text(&self, name: &str, bytes: &[u8]) -> Result<String, SkippedDocument> {
        match self.extractor.extract(name, bytes).await {
            ExtractionOutcome::Extracted { text, method } if !text.trim().is_empty() => {
                info!(document = %name, ?method, chars = text.chars().count(), "text extracted");
                Ok(text)
            }
            ExtractionOutcome::Extracted { .. } => {
                warn!(document = %name, "no text extracted, skipping");
                Err(SkippedDocument {
                    name: name.to_string(),
                    reason: "no text extracted".to_string(),
                })
            }
            ExtractionOutcome::Failed { reason } => {
                warn!(document = %name, %reason, "extraction failed, skipping");
                Err(SkippedDocument {
                    name: name.to_string(),
                    reason,
                })
            }
        }
    }

    async fn index_texts(
        &self,
        embedder: Arc<dyn EmbeddingProvider>,
        texts: Vec<String>,
        skipped_documents: Vec<SkippedDocument>,
    ) -> Result<IngestionReport, PipelineError> {
        let corpus = texts.join("\n\n");
        if corpus.trim().is_empty() {
            return Err(PipelineError::NoReadableContent);
        }

        let generation = Indexer::new(self.chunking, embedder, Arc::clone(&self.index))
            .index_corpus(&corpus)
            .await?;

        Ok(IngestionReport {
            generation,
            indexed_documents: texts.len(),
            skipped_documents,
        })
    }

    /// Stores the blob and catalog entry of every upload. Independent of
    /// whether the file later yields any text.
    pub async fn store_uploads(
        &self,
        uploads: &[DocumentUpload],
    ) -> Result<Vec<CatalogEntry>, PipelineError> {
        let mut entries = Vec::with_capacity(uploads.len());

        for upload in uploads {
            let file_id = self.blobs.put_blob(upload).await?;
            let entry = CatalogEntry {
                id: Uuid::new_v4().to_string(),
                filename: upload.filename.clone(),
                owner: upload.owner.clone(),
                file_id: file_id.clone(),
                size: upload.bytes.len() as u64,
                content_type: upload.content_type.clone(),
                checksum: digest_bytes(&upload.bytes),
                upload_date: Utc::now(),
            };

            if let Err(error) = self.catalog.insert_entry(&entry).await {
                if let Err(cleanup) = self.blobs.delete_blob(&file_id).await {
                    warn!(file_id = %file_id, error = %cleanup, "orphaned blob left behind");
                }
                return Err(error.into());
            }

            info!(filename = %entry.filename, file_id = %entry.file_id, size = entry.size, "document cataloged");
            entries.push(entry);
        }

        Ok(entries)
    }

    /// Stores the uploads, then rebuilds the index from the whole catalog.
    pub async fn upload(&self, uploads: &[DocumentUpload]) -> Result<UploadReport, PipelineError> {
        let files = self.store_uploads(uploads).await?;
        let indexing = self.reindex_catalog().await;
        Ok(UploadReport { files, indexing })
    }

    /// Catalogs every PDF under `folder` and reindexes.
    pub async fn ingest_folder(
        &self,
        folder: &Path,
        owner: Option<&str>,
    ) -> Result<UploadReport, PipelineError> {
        let files = discover_pdf_files(folder);
        if files.is_empty() {
            return Err(PipelineError::NoDocuments);
        }

        let mut uploads = Vec::with_capacity(files.len());
        for path in files {
            let bytes = tokio::fs::read(&path)
                .await
                .map_err(IngestError::from)?;
            let filename = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            uploads.push(DocumentUpload {
                filename,
                content_type: "application/pdf".to_string(),
                owner: owner.map(str::to_string),
                bytes,
            });
        }

        self.upload(&uploads).await
    }

    /// Removes the catalog entry and its blob, then reindexes what remains.
    pub async fn delete_document(&self, file_id: &str) -> Result<DeleteOutcome, PipelineError> {
        if !self.catalog.delete_entry(file_id).await? {
            return Ok(DeleteOutcome::NotFound);
        }

        match self.blobs.delete_blob(file_id).await {
            Ok(true) => {}
            Ok(false) => warn!(file_id, "catalog entry had no blob"),
            Err(error) => warn!(file_id, %error, "blob deletion failed"),
        }

        info!(file_id, "document deleted");
        Ok(DeleteOutcome::Deleted {
            indexing: self.reindex_catalog().await,
        })
    }

    /// Rebuilds the index from every cataloged document. Text extracted on
    /// an earlier rebuild is reused; only documents without cached text are
    /// read from their blobs again.
    pub async fn rebuild_from_catalog(&self) -> Result<IngestionReport, PipelineError> {
        let entries = self.catalog.list_entries(None).await?;
        if entries.is_empty() {
            self.index.clear().await?;
            return Err(PipelineError::NoDocuments);
        }
        let embedder = self.require_embedder()?;

        let mut texts = Vec::with_capacity(entries.len());
        let mut skipped_documents = Vec::new();
        for entry in entries {
            if let Some(text) = self.catalog.cached_text(&entry.file_id).await? {
                debug!(file_id = %entry.file_id, "reusing extracted text");
                texts.push(text);
                continue;
            }

            let Some(bytes) = self.blobs.get_blob(&entry.file_id).await? else {
                warn!(file_id = %entry.file_id, "cataloged document has no stored bytes");
                skipped_documents.push(SkippedDocument {
                    name: entry.filename,
                    reason: "stored file is missing".to_string(),
                });
                continue;
            };

            match self.document_text(&entry.filename, &bytes).await {
                Ok(text) => {
                    self.catalog.cache_text(&entry.file_id, &text).await?;
                    texts.push(text);
                }
                Err(skipped) => skipped_documents.push(skipped),
            }
        }

        match self.index_texts(embedder, texts, skipped_documents).await {
            Err(PipelineError::NoReadableContent) => {
                self.index.clear().await?;
                Err(PipelineError::NoReadableContent)
            }
            other => other,
        }
    }

    pub async fn reindex_catalog(&self) -> IndexingStatus {
        match self.rebuild_from_catalog().await {
            Ok(report) => IndexingStatus::Indexed {
                generation_id: report.generation.id,
                chunk_count: report.generation.chunk_count,
                skipped_documents: report.skipped_documents,
            },
            Err(error @ (PipelineError::NoReadableContent | PipelineError::NoDocuments)) => {
                info!(%error, "index not rebuilt");
                IndexingStatus::Skipped {
                    reason: error.to_string(),
                }
            }
            Err(error) => {
                warn!(%error, "indexing failed, previous generation stays current");
                IndexingStatus::Failed {
                    reason: error.to_string(),
                }
            }
        }
    }
}
