use std::path::Path;

use corpus_core::domain::DataType;
use corpus_core::{CorpusError, Result};
use serde_json::{json, Value};

use super::text::read_text_file;
use super::{DecodedSegment, FormatDecoder};

/// JSON decoder. Every string leaf becomes a segment tagged with its path,
/// walked in document order so offsets are stable.
pub struct JsonDecoder;

impl FormatDecoder for JsonDecoder {
    fn data_type(&self) -> DataType {
        DataType::Json
    }

    fn decode(&self, path: &Path) -> Result<Vec<DecodedSegment>> {
        let (text, _) = read_text_file(path)?;
        let value: Value = serde_json::from_str(&text).map_err(|e| CorpusError::Decode {
            path: path.display().to_string(),
            message: format!("invalid JSON: {}", e),
        })?;
        let mut segments = Vec::new();
        let mut offset = 0usize;
        collect_string_leaves(&value, String::new(), &mut offset, &mut segments);
        Ok(segments)
    }
}

fn collect_string_leaves(
    value: &Value,
    path: String,
    offset: &mut usize,
    out: &mut Vec<DecodedSegment>,
) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let child_path = if path.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", path, key)
                };
                collect_string_leaves(child, child_path, offset, out);
            }
        }
        Value::Array(items) => {
            for (i, child) in items.iter().enumerate() {
                collect_string_leaves(child, format!("{}[{}]", path, i), offset, out);
            }
        }
        Value::String(s) => {
            let trimmed = s.trim();
            if !trimmed.is_empty() {
                out.push(
                    DecodedSegment::new(trimmed.to_string(), *offset)
                        .with_extra("file_type", json!("json"))
                        .with_extra("json_path", json!(path)),
                );
            }
            *offset += s.chars().count().max(1);
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn extracts_string_leaves_with_paths() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"title": "Reservoir operations", "sections": ["Flood control basics", {{"body": "Levee maintenance notes"}}]}}"#
        )
        .unwrap();
        let segments = JsonDecoder.decode(file.path()).unwrap();
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0].extra["json_path"], json!("sections[0]"));
        assert_eq!(segments[1].extra["json_path"], json!("sections[1].body"));
        assert_eq!(segments[2].extra["json_path"], json!("title"));
        // Offsets are distinct so derived chunk ids cannot collide.
        let mut offsets: Vec<usize> = segments.iter().map(|s| s.offset).collect();
        offsets.dedup();
        assert_eq!(offsets.len(), 3);
    }

    #[test]
    fn rejects_invalid_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json at all").unwrap();
        assert!(JsonDecoder.decode(file.path()).is_err());
    }
}
