use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use corpus_core::domain::{Chunk, SourceInfo};
use corpus_core::{CorpusError, Result};
use serde_json::json;
use tracing::{debug, info};

use crate::config::ParserConfig;
use crate::decode::{decoder_for, split_text};
use crate::enrich::LanguageDetector;
use crate::observability::metrics;

use super::{PipelineStage, StageOutcome};

/// Pipeline stage decoding source files into text chunks.
///
/// Input items are seed chunks (one per input file, empty content); output
/// chunks carry decoded text, a detected language and a stable id derived
/// from the source path and segment offset.
pub struct ParseStage {
    config: ParserConfig,
    detector: Arc<dyn LanguageDetector>,
}

impl ParseStage {
    pub fn new(config: ParserConfig, detector: Arc<dyn LanguageDetector>) -> Self {
        Self { config, detector }
    }
}

#[async_trait]
impl PipelineStage for ParseStage {
    async fn process(&self, seed: Chunk) -> Result<StageOutcome> {
        let path = Path::new(&seed.source.path);
        info!("📄 Parsing {}", path.display());
        let started = Instant::now();

        let decoder = decoder_for(seed.data_type);
        let segments = decoder.decode(path).map_err(|e| {
            metrics::parse::error();
            CorpusError::item(seed.id.clone(), "parse", e.to_string())
        })?;

        let mut chunks = Vec::new();
        for segment in segments {
            metrics::parse::bytes_processed(segment.text.len());
            let pieces = split_text(&segment.text, self.config.chunk_size, self.config.overlap);
            let split = pieces.len() > 1;
            for (piece_index, (piece_offset, piece)) in pieces.into_iter().enumerate() {
                let content = piece.trim().to_string();
                if content.is_empty() {
                    continue;
                }
                let language = self.detector.detect(&content);
                let mut chunk = Chunk::new(
                    content,
                    seed.data_type,
                    language,
                    SourceInfo {
                        path: seed.source.path.clone(),
                        ordinal: seed.source.ordinal,
                        offset: segment.offset + piece_offset,
                    },
                );
                for (key, value) in &segment.extra {
                    chunk.merge_extra(key, value.clone());
                }
                if split {
                    chunk.merge_extra("chunk_number", json!(piece_index));
                }
                chunks.push(chunk);
            }
        }

        metrics::parse::success();
        metrics::parse::duration(started.elapsed().as_secs_f64());
        metrics::parse::chunks_emitted(chunks.len());
        debug!("Parsed {} into {} chunks", path.display(), chunks.len());

        if chunks.is_empty() {
            return Ok(StageOutcome::Filtered {
                chunk_id: seed.id,
                reason: "no decodable text".to_string(),
            });
        }
        Ok(StageOutcome::Emitted(chunks))
    }

    fn stage_name(&self) -> &'static str {
        "parse"
    }

    fn dependencies(&self) -> Vec<&'static str> {
        vec![]
    }
}
