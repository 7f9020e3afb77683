use std::path::Path;

use corpus_core::domain::DataType;
use corpus_core::Result;
use serde_json::json;

use super::text::read_text_file;
use super::{DecodedSegment, FormatDecoder};

/// Markdown decoder. Markdown is carried as-is; heading structure survives
/// into the content where the splitter's paragraph breaks respect it.
pub struct MarkdownDecoder;

impl FormatDecoder for MarkdownDecoder {
    fn data_type(&self) -> DataType {
        DataType::Markdown
    }

    fn decode(&self, path: &Path) -> Result<Vec<DecodedSegment>> {
        let (text, encoding) = read_text_file(path)?;
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }
        Ok(vec![DecodedSegment::new(trimmed.to_string(), 0)
            .with_extra("file_type", json!("markdown"))
            .with_extra("encoding", json!(encoding))])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn keeps_markdown_structure() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "# Title\n\nBody paragraph with details.").unwrap();
        let segments = MarkdownDecoder.decode(file.path()).unwrap();
        assert_eq!(segments.len(), 1);
        assert!(segments[0].text.starts_with("# Title"));
        assert_eq!(segments[0].extra["file_type"], json!("markdown"));
    }
}
