//! Fixtures shared by the unit tests of this crate.

use crate::backends::AiBackends;
use crate::config::ModelProfile;
use crate::embeddings::{CharacterNgramEmbedder, EmbeddingProvider};
use crate::error::{IngestError, SearchError};
use crate::extractor::{PageText, TextExtractor};
use crate::generation::LanguageModel;
use crate::ingest::IngestionPipeline;
use crate::ocr::OcrEngine;
use crate::orchestrator::QueryPipeline;
use crate::stores::{GenerationalIndex, SqliteStore};
use async_trait::async_trait;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Builds a PDF with one page per entry. An empty entry produces a page
/// without any text layer, like a scanned page.
pub(crate) fn pdf_with_pages(pages: &[&str]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for text in pages {
        let operations = if text.is_empty() {
            Vec::new()
        } else {
            vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 14.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new("Tj", vec![Object::string_literal(*text)]),
                Operation::new("ET", vec![]),
            ]
        };
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            content.encode().expect("content encodes"),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("pdf serializes");
    bytes
}

/// OCR double that returns scripted pages (or fails) and counts calls.
pub(crate) struct RecordingOcr {
    pages: Option<Vec<String>>,
    calls: AtomicUsize,
}

impl RecordingOcr {
    pub(crate) fn returning(pages: Vec<&str>) -> Self {
        Self {
            pages: Some(pages.into_iter().map(str::to_string).collect()),
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn failing() -> Self {
        Self {
            pages: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OcrEngine for RecordingOcr {
    async fn recognize(&self, _filename: &str, _pdf: &[u8]) -> Result<Vec<PageText>, IngestError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.pages {
            Some(pages) => Ok(pages
                .iter()
                .enumerate()
                .map(|(index, text)| PageText {
                    number: index as u32 + 1,
                    text: text.clone(),
                })
                .collect()),
            None => Err(IngestError::OcrFailed("scripted failure".to_string())),
        }
    }
}

/// Language model double that answers with the prompt it was given.
#[derive(Default)]
pub(crate) struct EchoModel {
    prompts: Mutex<Vec<String>>,
}

impl EchoModel {
    pub(crate) fn prompts(&self) -> Vec<String> {
        self.prompts.lock().expect("prompt log").clone()
    }
}

#[async_trait]
impl LanguageModel for EchoModel {
    fn model_name(&self) -> &str {
        "echo"
    }

    async fn generate(&self, prompt: &str) -> Result<String, SearchError> {
        self.prompts.lock().expect("prompt log").push(prompt.to_string());
        Ok(prompt.to_string())
    }
}

/// Real SQLite store and generational index in a scratch directory, wired
/// to the offline embedder, a scripted OCR engine and [`EchoModel`].
pub(crate) struct Harness {
    _dir: TempDir,
    pub(crate) store: Arc<SqliteStore>,
    pub(crate) index: Arc<GenerationalIndex>,
    pub(crate) ocr: Arc<RecordingOcr>,
    pub(crate) model: Arc<EchoModel>,
}

impl Harness {
    pub(crate) async fn new() -> Self {
        Self::with_ocr(RecordingOcr::returning(Vec::new())).await
    }

    pub(crate) async fn with_ocr(ocr: RecordingOcr) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SqliteStore::connect(&dir.path().join("store.sqlite3"))
            .await
            .expect("store opens");
        let index = GenerationalIndex::new(dir.path().join("vector_index"));

        Self {
            _dir: dir,
            store: Arc::new(store),
            index: Arc::new(index),
            ocr: Arc::new(ocr),
            model: Arc::new(EchoModel::default()),
        }
    }

    fn backends(&self) -> AiBackends {
        let embedder: Arc<dyn EmbeddingProvider> = Arc::new(CharacterNgramEmbedder::default());
        AiBackends::new(embedder, self.model.clone())
    }

    fn build_ingestion(&self, backends: Option<AiBackends>) -> IngestionPipeline {
        IngestionPipeline::new(
            TextExtractor::new(self.ocr.clone()),
            ModelProfile::GoogleAi.chunking(),
            backends.map(|backends| backends.embedder),
            self.index.clone(),
            self.store.clone(),
            self.store.clone(),
        )
    }

    pub(crate) fn ingestion(&self) -> IngestionPipeline {
        self.build_ingestion(Some(self.backends()))
    }

    pub(crate) fn ingestion_without_credential(&self) -> IngestionPipeline {
        self.build_ingestion(None)
    }

    fn build_query(&self, backends: Option<AiBackends>) -> QueryPipeline {
        QueryPipeline::new(
            ModelProfile::GoogleAi,
            backends,
            self.index.clone(),
            4,
            self.store.clone(),
            self.store.clone(),
        )
    }

    pub(crate) fn query(&self) -> QueryPipeline {
        self.build_query(Some(self.backends()))
    }

    pub(crate) fn query_without_credential(&self) -> QueryPipeline {
        self.build_query(None)
    }
}
