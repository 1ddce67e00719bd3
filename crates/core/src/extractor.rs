use crate::error::IngestError;
use crate::ocr::OcrEngine;
use lopdf::Document;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageText {
    pub number: u32,
    pub text: String,
}

pub trait PdfExtractor: Send + Sync {
    /// Returns every page in page order, including pages without a text layer.
    fn extract_pages(&self, bytes: &[u8]) -> Result<Vec<PageText>, IngestError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfExtractor;

impl PdfExtractor for LopdfExtractor {
    fn extract_pages(&self, bytes: &[u8]) -> Result<Vec<PageText>, IngestError> {
        let document =
            Document::load_mem(bytes).map_err(|error| IngestError::PdfParse(error.to_string()))?;

        let mut pages = Vec::new();
        for (page_no, _page_id) in document.get_pages() {
            let text = document
                .extract_text(&[page_no])
                .map_err(|error| IngestError::PdfParse(error.to_string()))?;

            pages.push(PageText {
                number: page_no,
                text,
            });
        }

        if pages.is_empty() {
            return Err(IngestError::PdfParse("pdf has no pages".to_string()));
        }

        Ok(pages)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    TextLayer,
    Ocr,
}

/// Result of reading one document. Failures are values so the caller decides
/// whether the batch continues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionOutcome {
    Extracted {
        text: String,
        method: ExtractionMethod,
    },
    Failed {
        reason: String,
    },
}

impl ExtractionOutcome {
    pub fn text(&self) -> &str {
        match self {
            ExtractionOutcome::Extracted { text, .. } => text,
            ExtractionOutcome::Failed { .. } => "",
        }
    }
}

/// Reads the text layer when every page has one and OCRs the whole
/// document otherwise.
pub struct TextExtractor {
    pdf: Arc<dyn PdfExtractor>,
    ocr: Arc<dyn OcrEngine>,
}

impl TextExtractor {
    pub fn new(ocr: Arc<dyn OcrEngine>) -> Self {
        Self::with_pdf_extractor(Arc::new(LopdfExtractor), ocr)
    }

    pub fn with_pdf_extractor(pdf: Arc<dyn PdfExtractor>, ocr: Arc<dyn OcrEngine>) -> Self {
        Self { pdf, ocr }
    }

    pub async fn extract(&self, filename: &str, bytes: &[u8]) -> ExtractionOutcome {
        let pdf = Arc::clone(&self.pdf);
        let owned = bytes.to_vec();
        let direct = tokio::task::spawn_blocking(move || pdf.extract_pages(&owned))
            .await
            .map_err(|error| IngestError::PdfParse(format!("extraction task failed: {error}")))
            .and_then(|result| result);

        match direct {
            Ok(pages) if pages.iter().all(|page| !page.text.trim().is_empty()) => {
                let text = pages
                    .iter()
                    .map(|page| page.text.trim())
                    .collect::<Vec<_>>()
                    .join("\n\n");
                ExtractionOutcome::Extracted {
                    text,
                    method: ExtractionMethod::TextLayer,
                }
            }
            Ok(pages) => {
                let blank = pages
                    .iter()
                    .filter(|page| page.text.trim().is_empty())
                    .count();
                info!(
                    filename,
                    blank_pages = blank,
                    total_pages = pages.len(),
                    "scanned pages detected, using OCR"
                );
                self.extract_with_ocr(filename, bytes).await
            }
            Err(error) => {
                warn!(filename, %error, "direct text extraction failed, trying OCR");
                self.extract_with_ocr(filename, bytes).await
            }
        }
    }

    async fn extract_with_ocr(&self, filename: &str, bytes: &[u8]) -> ExtractionOutcome {
        match self.ocr.recognize(filename, bytes).await {
            Ok(pages) => ExtractionOutcome::Extracted {
                text: assemble_ocr_text(&pages),
                method: ExtractionMethod::Ocr,
            },
            Err(error) => {
                warn!(filename, %error, "OCR failed");
                ExtractionOutcome::Failed {
                    reason: error.to_string(),
                }
            }
        }
    }
}

fn assemble_ocr_text(pages: &[PageText]) -> String {
    pages
        .iter()
        .filter(|page| !page.text.trim().is_empty())
        .map(|page| format!("--- Page {} ---\n{}", page.number, page.text.trim()))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{pdf_with_pages, RecordingOcr};

    fn extractor(ocr: Arc<RecordingOcr>) -> TextExtractor {
        TextExtractor::new(ocr)
    }

    #[test]
    fn lopdf_reads_every_page_in_order() {
        let bytes = pdf_with_pages(&["Hello world", "", "Goodbye world"]);
        let pages = LopdfExtractor.extract_pages(&bytes).expect("pdf should parse");

        assert_eq!(pages.len(), 3);
        assert_eq!(pages[0].number, 1);
        assert!(pages[0].text.contains("Hello world"));
        assert!(pages[1].text.trim().is_empty());
        assert!(pages[2].text.contains("Goodbye world"));
    }

    #[test]
    fn garbage_bytes_are_a_parse_error() {
        let result = LopdfExtractor.extract_pages(b"%PDF-1.4\n%broken");
        assert!(matches!(result, Err(IngestError::PdfParse(_))));
    }

    #[tokio::test]
    async fn digital_pdf_uses_text_layer_only() {
        let ocr = Arc::new(RecordingOcr::returning(vec!["should not be used"]));
        let bytes = pdf_with_pages(&["Hello world", "Goodbye world"]);

        let outcome = extractor(ocr.clone()).extract("a.pdf", &bytes).await;

        match outcome {
            ExtractionOutcome::Extracted { text, method } => {
                assert_eq!(method, ExtractionMethod::TextLayer);
                let hello = text.find("Hello world").expect("page one text");
                let goodbye = text.find("Goodbye world").expect("page two text");
                assert!(hello < goodbye);
                assert!(text.contains("\n\n"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(ocr.calls(), 0);
    }

    #[tokio::test]
    async fn one_blank_page_sends_whole_document_to_ocr() {
        let ocr = Arc::new(RecordingOcr::returning(vec!["ocr page one", "ocr page two"]));
        let bytes = pdf_with_pages(&["Hello world", ""]);

        let outcome = extractor(ocr.clone()).extract("mixed.pdf", &bytes).await;

        assert_eq!(
            outcome,
            ExtractionOutcome::Extracted {
                text: "--- Page 1 ---\nocr page one\n\n--- Page 2 ---\nocr page two".to_string(),
                method: ExtractionMethod::Ocr,
            }
        );
        assert_eq!(ocr.calls(), 1);
    }

    #[tokio::test]
    async fn unparseable_pdf_falls_back_to_ocr() {
        let ocr = Arc::new(RecordingOcr::returning(vec!["recognized"]));
        let outcome = extractor(ocr.clone()).extract("scan.pdf", b"not a pdf").await;

        assert_eq!(outcome.text(), "--- Page 1 ---\nrecognized");
        assert_eq!(ocr.calls(), 1);
    }

    #[tokio::test]
    async fn ocr_failure_is_reported_not_raised() {
        let ocr = Arc::new(RecordingOcr::failing());
        let outcome = extractor(ocr).extract("scan.pdf", b"not a pdf").await;

        assert!(matches!(outcome, ExtractionOutcome::Failed { .. }));
        assert_eq!(outcome.text(), "");
    }

    #[test]
    fn blank_ocr_pages_are_dropped() {
        let pages = vec![
            PageText {
                number: 1,
                text: "  \n".to_string(),
            },
            PageText {
                number: 2,
                text: "Xin chào\n".to_string(),
            },
        ];
        assert_eq!(assemble_ocr_text(&pages), "--- Page 2 ---\nXin chào");
    }
}
