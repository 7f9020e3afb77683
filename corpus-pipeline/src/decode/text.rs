use std::fs;
use std::path::Path;

use corpus_core::domain::DataType;
use corpus_core::{CorpusError, Result};
use serde_json::json;

use super::{DecodedSegment, FormatDecoder};

/// Plain-text decoder. Reads the whole file as UTF-8, falling back to a lossy
/// conversion for legacy encodings.
pub struct TextDecoder;

pub(crate) fn read_text_file(path: &Path) -> Result<(String, &'static str)> {
    let bytes = fs::read(path).map_err(|e| CorpusError::Decode {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    match String::from_utf8(bytes) {
        Ok(text) => Ok((text, "utf-8")),
        Err(e) => {
            let text = String::from_utf8_lossy(e.as_bytes()).into_owned();
            Ok((text, "utf-8-lossy"))
        }
    }
}

impl FormatDecoder for TextDecoder {
    fn data_type(&self) -> DataType {
        DataType::Text
    }

    fn decode(&self, path: &Path) -> Result<Vec<DecodedSegment>> {
        let (text, encoding) = read_text_file(path)?;
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }
        Ok(vec![DecodedSegment::new(trimmed.to_string(), 0)
            .with_extra("file_type", json!("text"))
            .with_extra("encoding", json!(encoding))])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn decodes_utf8_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "  some plain text  ").unwrap();
        let segments = TextDecoder.decode(file.path()).unwrap();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].text, "some plain text");
        assert_eq!(segments[0].extra["encoding"], json!("utf-8"));
    }

    #[test]
    fn falls_back_to_lossy_for_invalid_utf8() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"caf\xe9 content with enough text").unwrap();
        let segments = TextDecoder.decode(file.path()).unwrap();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].extra["encoding"], json!("utf-8-lossy"));
    }

    #[test]
    fn empty_file_yields_no_segments() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let segments = TextDecoder.decode(file.path()).unwrap();
        assert!(segments.is_empty());
    }
}
