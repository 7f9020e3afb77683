use std::path::Path;

use corpus_core::domain::DataType;
use corpus_core::{CorpusError, Result};
use serde_json::json;

use super::{DecodedSegment, FormatDecoder};

/// CSV decoder. Each record becomes one `header: value | …` line, the same
/// linearization tabular sources get elsewhere in the pipeline.
pub struct CsvDecoder;

impl FormatDecoder for CsvDecoder {
    fn data_type(&self) -> DataType {
        DataType::Csv
    }

    fn decode(&self, path: &Path) -> Result<Vec<DecodedSegment>> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(path)
            .map_err(|e| CorpusError::Decode {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
        let headers = reader
            .headers()
            .map_err(|e| CorpusError::Decode {
                path: path.display().to_string(),
                message: e.to_string(),
            })?
            .clone();

        let mut segments = Vec::new();
        let mut offset = 0usize;
        for (row_number, record) in reader.records().enumerate() {
            let record = record.map_err(|e| CorpusError::Decode {
                path: path.display().to_string(),
                message: format!("row {}: {}", row_number, e),
            })?;
            let fields: Vec<String> = record
                .iter()
                .enumerate()
                .filter(|(_, value)| !value.trim().is_empty())
                .map(|(i, value)| {
                    let header = headers.get(i).unwrap_or("").trim();
                    if header.is_empty() {
                        value.trim().to_string()
                    } else {
                        format!("{}: {}", header, value.trim())
                    }
                })
                .collect();
            if fields.is_empty() {
                continue;
            }
            let line = fields.join(" | ");
            let line_len = line.chars().count();
            segments.push(
                DecodedSegment::new(line, offset)
                    .with_extra("file_type", json!("csv"))
                    .with_extra("row_number", json!(row_number)),
            );
            offset += line_len.max(1);
        }
        Ok(segments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn linearizes_rows_with_headers() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "station,discharge\nElk River,120.5\nMill Creek,33.0\n").unwrap();
        let segments = CsvDecoder.decode(file.path()).unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].text, "station: Elk River | discharge: 120.5");
        assert_eq!(segments[1].extra["row_number"], json!(1));
        assert_ne!(segments[0].offset, segments[1].offset);
    }

    #[test]
    fn skips_blank_rows() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "a,b\n,\nx,y\n").unwrap();
        let segments = CsvDecoder.decode(file.path()).unwrap();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].text, "a: x | b: y");
    }
}
