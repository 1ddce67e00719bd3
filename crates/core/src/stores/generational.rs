//! File-backed vector index with immutable generations.
//!
//! Every build is written to `generations/<id>.json`. Only after the file is
//! complete does the `CURRENT` pointer get replaced (write to a temp file,
//! then rename), so a reader resolves either the old or the new generation,
//! never a half-written one. Concurrent builds race on the pointer and the
//! last rename wins.

use crate::models::{IndexGeneration, RetrievedChunk};
use crate::traits::VectorIndex;
use crate::SearchError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

const CURRENT_POINTER: &str = "CURRENT";
const GENERATIONS_DIR: &str = "generations";
const RETAINED_GENERATIONS: usize = 3;

#[derive(Debug, Serialize, Deserialize)]
struct StoredGeneration {
    id: String,
    created_at: DateTime<Utc>,
    embedding_model: String,
    dimensions: usize,
    entries: Vec<StoredEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredEntry {
    text: String,
    vector: Vec<f32>,
}

impl StoredGeneration {
    fn summary(&self) -> IndexGeneration {
        IndexGeneration {
            id: self.id.clone(),
            created_at: self.created_at,
            embedding_model: self.embedding_model.clone(),
            chunk_count: self.entries.len(),
        }
    }
}

pub struct GenerationalIndex {
    root: PathBuf,
    cache: RwLock<Option<Arc<StoredGeneration>>>,
}

impl GenerationalIndex {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            cache: RwLock::new(None),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn generations_dir(&self) -> PathBuf {
        self.root.join(GENERATIONS_DIR)
    }

    fn generation_path(&self, id: &str) -> PathBuf {
        self.generations_dir().join(format!("{id}.json"))
    }

    async fn read_pointer(&self) -> Result<Option<String>, SearchError> {
        match tokio::fs::read_to_string(self.root.join(CURRENT_POINTER)).await {
            Ok(id) => {
                let id = id.trim().to_string();
                Ok((!id.is_empty()).then_some(id))
            }
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(None),
            Err(error) => Err(error.into()),
        }
    }

    async fn load(&self, id: &str) -> Result<Arc<StoredGeneration>, SearchError> {
        if let Some(cached) = self.cache.read().await.as_ref() {
            if cached.id == id {
                return Ok(Arc::clone(cached));
            }
        }

        let bytes = tokio::fs::read(self.generation_path(id)).await?;
        let generation = Arc::new(serde_json::from_slice::<StoredGeneration>(&bytes)?);
        *self.cache.write().await = Some(Arc::clone(&generation));
        debug!(generation = id, "loaded index generation");
        Ok(generation)
    }

    async fn current(&self) -> Result<Option<Arc<StoredGeneration>>, SearchError> {
        let Some(id) = self.read_pointer().await? else {
            return Ok(None);
        };

        match self.load(&id).await {
            Ok(generation) => Ok(Some(generation)),
            // A concurrent build may have moved the pointer and pruned this file.
            Err(SearchError::Io(error)) if error.kind() == ErrorKind::NotFound => {
                match self.read_pointer().await? {
                    Some(next) if next != id => self.load(&next).await.map(Some),
                    _ => Err(SearchError::Io(error)),
                }
            }
            Err(error) => Err(error),
        }
    }

    async fn prune(&self, keep: &str) {
        let mut ids = match list_generation_ids(&self.generations_dir()).await {
            Ok(ids) => ids,
            Err(error) => {
                warn!(%error, "unable to list index generations for pruning");
                return;
            }
        };

        ids.sort_unstable_by(|left, right| right.cmp(left));
        for id in ids.into_iter().skip(RETAINED_GENERATIONS) {
            if id == keep {
                continue;
            }
            if let Err(error) = tokio::fs::remove_file(self.generation_path(&id)).await {
                warn!(generation = %id, %error, "unable to prune index generation");
            }
        }
    }
}

#[async_trait]
impl VectorIndex for GenerationalIndex {
    async fn replace(
        &self,
        texts: &[String],
        embeddings: &[Vec<f32>],
        embedding_model: &str,
    ) -> Result<IndexGeneration, SearchError> {
        if texts.len() != embeddings.len() {
            return Err(SearchError::Request(format!(
                "embedding count {} doesn't match chunk count {}",
                embeddings.len(),
                texts.len()
            )));
        }
        if texts.is_empty() {
            return Err(SearchError::Request(
                "cannot build an index without chunks".to_string(),
            ));
        }

        let dimensions = embeddings[0].len();
        if dimensions == 0 || embeddings.iter().any(|vector| vector.len() != dimensions) {
            return Err(SearchError::Request(
                "embeddings must share one non-zero dimension".to_string(),
            ));
        }

        let created_at = Utc::now();
        let id = format!(
            "{}-{}",
            created_at.format("%Y%m%dT%H%M%S%6fZ"),
            &Uuid::new_v4().simple().to_string()[..8]
        );
        let generation = StoredGeneration {
            id: id.clone(),
            created_at,
            embedding_model: embedding_model.to_string(),
            dimensions,
            entries: texts
                .iter()
                .zip(embeddings)
                .map(|(text, vector)| StoredEntry {
                    text: text.clone(),
                    vector: vector.clone(),
                })
                .collect(),
        };

        tokio::fs::create_dir_all(self.generations_dir()).await?;
        let bytes = serde_json::to_vec(&generation)?;
        write_atomically(&self.generation_path(&id), &bytes).await?;
        write_atomically(&self.root.join(CURRENT_POINTER), id.as_bytes()).await?;

        let summary = generation.summary();
        *self.cache.write().await = Some(Arc::new(generation));
        info!(
            generation = %summary.id,
            chunks = summary.chunk_count,
            dimensions,
            "index generation is now current"
        );

        self.prune(&id).await;
        Ok(summary)
    }

    async fn search(
        &self,
        query_vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<RetrievedChunk>, SearchError> {
        let generation = self.current().await?.ok_or_else(|| {
            SearchError::NotReady("no index generation has been built".to_string())
        })?;

        if query_vector.len() != generation.dimensions {
            return Err(SearchError::Request(format!(
                "query vector dim {} is not {}",
                query_vector.len(),
                generation.dimensions
            )));
        }

        let mut scored = generation
            .entries
            .iter()
            .map(|entry| (cosine_similarity(query_vector, &entry.vector), entry))
            .collect::<Vec<_>>();
        scored.sort_by(|left, right| right.0.total_cmp(&left.0));

        Ok(scored
            .into_iter()
            .take(top_k)
            .map(|(score, entry)| RetrievedChunk {
                text: entry.text.clone(),
                score,
            })
            .collect())
    }

    async fn current_generation(&self) -> Result<Option<IndexGeneration>, SearchError> {
        Ok(self.current().await?.map(|generation| generation.summary()))
    }

    async fn clear(&self) -> Result<(), SearchError> {
        match tokio::fs::remove_file(self.root.join(CURRENT_POINTER)).await {
            Ok(()) => {}
            Err(error) if error.kind() == ErrorKind::NotFound => {}
            Err(error) => return Err(error.into()),
        }
        *self.cache.write().await = None;
        info!("index cleared");
        Ok(())
    }
}

pub fn cosine_similarity(left: &[f32], right: &[f32]) -> f32 {
    let dot = left.iter().zip(right).map(|(a, b)| a * b).sum::<f32>();
    let left_norm = left.iter().map(|value| value * value).sum::<f32>().sqrt();
    let right_norm = right.iter().map(|value| value * value).sum::<f32>().sqrt();

    if left_norm == 0.0 || right_norm == 0.0 {
        0.0
    } else {
        dot / (left_norm * right_norm)
    }
}

async fn write_atomically(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let temporary = path.with_extension(format!("tmp-{}", Uuid::new_v4().simple()));
    tokio::fs::write(&temporary, bytes).await?;
    tokio::fs::rename(&temporary, path).await
}

async fn list_generation_ids(dir: &Path) -> std::io::Result<Vec<String>> {
    let mut ids = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
            ids.push(stem.to_string());
        }
    }
    Ok(ids)
}
