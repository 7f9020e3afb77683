//! Format decoders: one per supported input format.
//!
//! Decoders are the capability seam between the pipeline engine and concrete
//! file formats. Each decoder turns a file into raw text segments with stable
//! offsets; it does no cleaning, enrichment or scoring.

use std::collections::BTreeMap;
use std::path::Path;

use corpus_core::domain::DataType;
use corpus_core::Result;

pub mod csv;
pub mod json;
pub mod markdown;
pub mod pdf;
pub mod text;

/// A raw text segment produced by a decoder. `offset` is a stable position
/// within the decoded document (running character offset) used to derive
/// chunk ids; it must not depend on processing order.
#[derive(Debug, Clone)]
pub struct DecodedSegment {
    pub text: String,
    pub offset: usize,
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl DecodedSegment {
    pub fn new(text: String, offset: usize) -> Self {
        Self {
            text,
            offset,
            extra: BTreeMap::new(),
        }
    }

    pub fn with_extra(mut self, key: &str, value: serde_json::Value) -> Self {
        self.extra.insert(key.to_string(), value);
        self
    }
}

/// Capability interface consumed by the Parse stage.
pub trait FormatDecoder: Send + Sync {
    fn data_type(&self) -> DataType;

    /// Decode a file into raw text segments, in document order.
    fn decode(&self, path: &Path) -> Result<Vec<DecodedSegment>>;
}

/// Select the built-in decoder for a data type.
pub fn decoder_for(data_type: DataType) -> Box<dyn FormatDecoder> {
    match data_type {
        DataType::Pdf => Box::new(pdf::PdfDecoder),
        DataType::Text => Box::new(text::TextDecoder),
        DataType::Json => Box::new(json::JsonDecoder),
        DataType::Csv => Box::new(csv::CsvDecoder),
        DataType::Markdown => Box::new(markdown::MarkdownDecoder),
    }
}

/// Split `text` into windows of at most `chunk_size` characters with
/// `overlap` characters carried between windows, preferring natural break
/// points (paragraph, newline, sentence end) over hard cuts. Returns
/// `(char_offset, slice)` pairs; offsets are relative to `text`.
pub fn split_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<(usize, String)> {
    const BREAKS: [&str; 5] = ["\n\n", "\n", ". ", "! ", "? "];

    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let total = chars.len();
    if total <= chunk_size {
        return vec![(0, text.to_string())];
    }

    let byte_at = |char_pos: usize| -> usize {
        if char_pos >= total {
            text.len()
        } else {
            chars[char_pos].0
        }
    };

    let mut pieces = Vec::new();
    let mut start = 0usize;
    while start < total {
        let mut end = (start + chunk_size).min(total);
        if end < total {
            // Search backwards inside the window for the best break point.
            let window = &text[byte_at(start)..byte_at(end)];
            for brk in BREAKS {
                if let Some(pos) = window.rfind(brk) {
                    let break_chars = window[..pos + brk.len()].chars().count();
                    if break_chars > 0 {
                        end = start + break_chars;
                        break;
                    }
                }
            }
        }
        let piece = text[byte_at(start)..byte_at(end)].to_string();
        pieces.push((start, piece));
        if end >= total {
            break;
        }
        start = end.saturating_sub(overlap).max(start + 1);
    }
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_a_single_piece() {
        let pieces = split_text("hello world", 100, 10);
        assert_eq!(pieces.len(), 1);
        assert_eq!(pieces[0], (0, "hello world".to_string()));
    }

    #[test]
    fn splits_prefer_sentence_boundaries() {
        let text = "First sentence here. Second sentence follows. Third one ends it.";
        let pieces = split_text(text, 30, 5);
        assert!(pieces.len() > 1);
        assert!(pieces[0].1.ends_with(". "));
    }

    #[test]
    fn split_is_deterministic_and_covers_the_tail() {
        let text = "abcdef. ".repeat(100);
        let a = split_text(&text, 64, 8);
        let b = split_text(&text, 64, 8);
        assert_eq!(
            a.iter().map(|(o, s)| (*o, s.clone())).collect::<Vec<_>>(),
            b.iter().map(|(o, s)| (*o, s.clone())).collect::<Vec<_>>()
        );
        let (last_offset, last) = a.last().unwrap();
        assert_eq!(last_offset + last.chars().count(), text.chars().count());
    }

    #[test]
    fn split_handles_multibyte_text() {
        let text = "água e energia. ".repeat(20);
        let pieces = split_text(&text, 40, 5);
        for (_, piece) in &pieces {
            assert!(!piece.is_empty());
        }
    }
}
