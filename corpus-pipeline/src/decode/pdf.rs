use std::path::Path;

use corpus_core::domain::DataType;
use corpus_core::{CorpusError, Result};
use serde_json::json;

use super::{DecodedSegment, FormatDecoder};

/// PDF decoder backed by `pdf-extract`. Pages come back separated by form
/// feeds; each non-empty page is one segment.
pub struct PdfDecoder;

impl FormatDecoder for PdfDecoder {
    fn data_type(&self) -> DataType {
        DataType::Pdf
    }

    fn decode(&self, path: &Path) -> Result<Vec<DecodedSegment>> {
        let text = pdf_extract::extract_text(path).map_err(|e| CorpusError::Decode {
            path: path.display().to_string(),
            message: format!("PDF extraction failed: {}", e),
        })?;

        let mut segments = Vec::new();
        let mut offset = 0usize;
        let pages: Vec<&str> = text.split('\u{c}').collect();
        let total_pages = pages.len();
        for (page_index, page) in pages.into_iter().enumerate() {
            let page_chars = page.chars().count();
            let trimmed = page.trim();
            if !trimmed.is_empty() {
                segments.push(
                    DecodedSegment::new(trimmed.to_string(), offset)
                        .with_extra("file_type", json!("pdf"))
                        .with_extra("page_number", json!(page_index + 1))
                        .with_extra("total_pages", json!(total_pages)),
                );
            }
            offset += page_chars.max(1);
        }
        Ok(segments)
    }
}
