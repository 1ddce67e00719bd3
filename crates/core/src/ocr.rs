use crate::config::OcrBackend;
use crate::error::IngestError;
use crate::extractor::PageText;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::process::Command;

/// Recognizes text on rasterized PDF pages.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    async fn recognize(&self, filename: &str, pdf: &[u8]) -> Result<Vec<PageText>, IngestError>;
}

pub fn build_ocr_engine(backend: &OcrBackend) -> Arc<dyn OcrEngine> {
    match backend {
        OcrBackend::Tesseract { languages, dpi } => Arc::new(TesseractOcr::new(languages, *dpi)),
        OcrBackend::Http { endpoint, api_key } => {
            Arc::new(HttpOcr::new(endpoint.clone(), api_key.clone()))
        }
        OcrBackend::Disabled => Arc::new(DisabledOcr),
    }
}

/// Rasterizes with `pdftoppm` and reads every page with `tesseract`.
pub struct TesseractOcr {
    languages: String,
    dpi: u32,
    pdftoppm: PathBuf,
    tesseract: PathBuf,
}

impl TesseractOcr {
    pub fn new(languages: impl Into<String>, dpi: u32) -> Self {
        Self {
            languages: languages.into(),
            dpi,
            pdftoppm: PathBuf::from("pdftoppm"),
            tesseract: PathBuf::from("tesseract"),
        }
    }

    pub fn with_binaries(mut self, pdftoppm: impl Into<PathBuf>, tesseract: impl Into<PathBuf>) -> Self {
        self.pdftoppm = pdftoppm.into();
        self.tesseract = tesseract.into();
        self
    }
}

#[async_trait]
impl OcrEngine for TesseractOcr {
    async fn recognize(&self, filename: &str, pdf: &[u8]) -> Result<Vec<PageText>, IngestError> {
        let workdir = tempfile::tempdir()?;
        let input = workdir.path().join("input.pdf");
        tokio::fs::write(&input, pdf).await?;

        let mut render = Command::new(&self.pdftoppm);
        render
            .arg("-r")
            .arg(self.dpi.to_string())
            .arg("-png")
            .arg(&input)
            .arg(workdir.path().join("page"));
        run_tool(&mut render).await?;

        let images = rendered_pages(workdir.path())?;
        if images.is_empty() {
            return Err(IngestError::OcrFailed(format!(
                "pdftoppm rendered no pages for {filename}"
            )));
        }

        let mut pages = Vec::with_capacity(images.len());
        for (number, image) in images {
            let mut recognize = Command::new(&self.tesseract);
            recognize
                .arg(&image)
                .arg("stdout")
                .arg("-l")
                .arg(&self.languages);
            let stdout = run_tool(&mut recognize).await?;

            pages.push(PageText {
                number,
                text: String::from_utf8_lossy(&stdout).into_owned(),
            });
        }

        Ok(pages)
    }
}

async fn run_tool(command: &mut Command) -> Result<Vec<u8>, IngestError> {
    let program = command.as_std().get_program().to_string_lossy().into_owned();
    let output = command
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|error| IngestError::OcrFailed(format!("failed to run {program}: {error}")))?;

    if !output.status.success() {
        return Err(IngestError::OcrFailed(format!(
            "{program} exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    Ok(output.stdout)
}

/// `pdftoppm` names its output `page-1.png` or `page-01.png` depending on page count.
fn rendered_pages(dir: &Path) -> Result<Vec<(u32, PathBuf)>, IngestError> {
    let pattern = Regex::new(r"^page-(\d+)\.png$")?;
    let mut pages = Vec::new();

    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let number = path
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(|name| pattern.captures(name))
            .and_then(|captures| captures.get(1))
            .and_then(|digits| digits.as_str().parse::<u32>().ok());

        if let Some(number) = number {
            pages.push((number, path));
        }
    }

    pages.sort_unstable_by_key(|(number, _)| *number);
    Ok(pages)
}

#[derive(Serialize)]
struct OcrUpload<'a> {
    pdf_base64: String,
    source_path: &'a str,
}

/// Reply of the OCR endpoint: per-page text, or one form-feed separated blob.
#[derive(Debug, Default, Deserialize)]
struct OcrReply {
    #[serde(default)]
    pages: Vec<OcrReplyPage>,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OcrReplyPage {
    #[serde(default)]
    page: Option<u32>,
    #[serde(default)]
    text: String,
}

impl OcrReply {
    /// Blank pages are dropped. `None` when no page has text.
    fn into_pages(self) -> Option<Vec<PageText>> {
        let listed: Vec<PageText> = self
            .pages
            .into_iter()
            .zip(1..)
            .filter_map(|(entry, position)| non_blank(entry.page.unwrap_or(position), &entry.text))
            .collect();
        if !listed.is_empty() {
            return Some(listed);
        }

        let split: Vec<PageText> = self
            .text
            .as_deref()
            .unwrap_or_default()
            .split('\u{000c}')
            .zip(1..)
            .filter_map(|(text, number)| non_blank(number, text))
            .collect();
        (!split.is_empty()).then_some(split)
    }
}

fn non_blank(number: u32, text: &str) -> Option<PageText> {
    let text = text.trim();
    (!text.is_empty()).then(|| PageText {
        number,
        text: text.to_string(),
    })
}

/// Sends the whole PDF to a multimodal OCR endpoint.
pub struct HttpOcr {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpOcr {
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
            api_key: api_key.filter(|key| !key.trim().is_empty()),
        }
    }
}

#[async_trait]
impl OcrEngine for HttpOcr {
    async fn recognize(&self, filename: &str, pdf: &[u8]) -> Result<Vec<PageText>, IngestError> {
        let payload = OcrUpload {
            pdf_base64: STANDARD.encode(pdf),
            source_path: filename,
        };

        let mut request = self.client.post(&self.endpoint).json(&payload);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(IngestError::OcrFailed(format!(
                "multimodal OCR request to {} returned {}",
                self.endpoint,
                response.status()
            )));
        }

        let reply: OcrReply = response.json().await?;
        reply.into_pages().ok_or_else(|| {
            IngestError::OcrFailed(format!("multimodal OCR response was empty for {filename}"))
        })
    }
}

/// Used when no OCR backend is configured; scanned documents are skipped.
pub struct DisabledOcr;

#[async_trait]
impl OcrEngine for DisabledOcr {
    async fn recognize(&self, filename: &str, _pdf: &[u8]) -> Result<Vec<PageText>, IngestError> {
        Err(IngestError::OcrFailed(format!(
            "OCR is disabled; cannot read scanned document {filename}"
        )))
    }
}
