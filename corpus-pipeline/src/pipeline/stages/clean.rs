use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use corpus_core::domain::Chunk;
use corpus_core::{CorpusError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::json;
use tracing::debug;

use crate::config::CleanerConfig;
use crate::observability::metrics;
use crate::pipeline::dedup::{compute_fingerprint, DedupIndex};

use super::{PipelineStage, StageOutcome};

static CLEANUP_RULES: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    vec![
        // HTML tags
        (Regex::new(r"<[^>]+>").unwrap(), ""),
        // URLs
        (Regex::new(r"https?://[^\s]+").unwrap(), ""),
        // Email addresses
        (
            Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").unwrap(),
            "",
        ),
        // Runs of terminal punctuation
        (Regex::new(r"[.!?]{3,}").unwrap(), "..."),
    ]
});

static SPACES: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]+").unwrap());
static LINE_EDGES: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^[ \t]+|[ \t]+$").unwrap());
static BLANK_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

/// Pipeline stage normalizing chunk text and rejecting duplicates.
///
/// The dedup index is the one shared mutable resource of the run; all
/// mutation happens under the mutex, and a poisoned lock is a fatal
/// resource error.
pub struct CleanStage {
    config: CleanerConfig,
    dedup: Arc<Mutex<DedupIndex>>,
}

impl CleanStage {
    pub fn new(config: CleanerConfig, dedup: Arc<Mutex<DedupIndex>>) -> Self {
        Self { config, dedup }
    }

    fn normalize(&self, text: &str) -> String {
        let mut cleaned = text.replace("\r\n", "\n").replace('\r', "\n");
        for (pattern, replacement) in CLEANUP_RULES.iter() {
            cleaned = pattern.replace_all(&cleaned, *replacement).into_owned();
        }
        if self.config.normalize_whitespace {
            cleaned = SPACES.replace_all(&cleaned, " ").into_owned();
            cleaned = LINE_EDGES.replace_all(&cleaned, "").into_owned();
            cleaned = BLANK_RUNS.replace_all(&cleaned, "\n\n").into_owned();
        }
        cleaned.trim().to_string()
    }

    fn quality_floor(&self, text: &str) -> Option<String> {
        let chars = text.chars().count();
        if chars < self.config.min_text_length {
            return Some(format!(
                "below minimum length ({} < {})",
                chars, self.config.min_text_length
            ));
        }
        let distinct: HashSet<char> = text.chars().collect();
        if chars > 20 && distinct.len() < 5 {
            return Some("low character diversity".to_string());
        }
        None
    }
}

#[async_trait]
impl PipelineStage for CleanStage {
    async fn process(&self, mut chunk: Chunk) -> Result<StageOutcome> {
        let original_length = chunk.content.chars().count();
        let cleaned = self.normalize(&chunk.content);

        if let Some(reason) = self.quality_floor(&cleaned) {
            metrics::clean::filtered();
            debug!("Filtering {}: {}", chunk.id, reason);
            return Ok(StageOutcome::Filtered {
                chunk_id: chunk.id,
                reason,
            });
        }

        if self.config.remove_duplicates {
            let fingerprint = compute_fingerprint(&cleaned);
            let mut index = self.dedup.lock().map_err(|_| {
                CorpusError::resource("dedup index mutex poisoned")
            })?;
            if index.is_duplicate(&fingerprint) {
                metrics::clean::duplicate();
                return Ok(StageOutcome::Duplicate { chunk_id: chunk.id });
            }
            index.register(fingerprint);
        }

        let cleaned_length = cleaned.chars().count();
        chunk.content = cleaned;
        chunk.merge_extra("cleaned", json!(true));
        chunk.merge_extra("original_length", json!(original_length));
        chunk.merge_extra("cleaned_length", json!(cleaned_length));
        if original_length > 0 {
            chunk.merge_extra(
                "cleaning_ratio",
                json!(cleaned_length as f64 / original_length as f64),
            );
        }

        metrics::clean::accepted();
        Ok(StageOutcome::Emitted(vec![chunk]))
    }

    fn stage_name(&self) -> &'static str {
        "clean"
    }

    fn dependencies(&self) -> Vec<&'static str> {
        vec!["parse"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use corpus_core::domain::{DataType, Language, SourceInfo};

    fn chunk(offset: usize, content: &str) -> Chunk {
        Chunk::new(
            content.to_string(),
            DataType::Text,
            Language::En,
            SourceInfo {
                path: "doc.txt".to_string(),
                ordinal: 0,
                offset,
            },
        )
    }

    fn stage() -> CleanStage {
        CleanStage::new(
            CleanerConfig::default(),
            Arc::new(Mutex::new(DedupIndex::new(0.9))),
        )
    }

    #[tokio::test]
    async fn strips_markup_and_normalizes_whitespace() {
        let outcome = stage()
            .process(chunk(
                0,
                "Flood   <b>warning</b> issued!!!!!  \nSee https://example.org/alerts now.",
            ))
            .await
            .unwrap();
        let StageOutcome::Emitted(chunks) = outcome else {
            panic!("expected emitted chunk");
        };
        let content = &chunks[0].content;
        assert!(!content.contains('<'));
        assert!(!content.contains("https://"));
        assert!(content.contains("Flood warning issued..."));
        assert_eq!(chunks[0].extra_data["cleaned"], json!(true));
    }

    #[tokio::test]
    async fn short_chunks_are_filtered() {
        let outcome = stage().process(chunk(0, "tiny")).await.unwrap();
        let StageOutcome::Filtered { reason, .. } = outcome else {
            panic!("expected filtered outcome");
        };
        assert!(reason.contains("below minimum length"));
    }

    #[tokio::test]
    async fn exact_duplicates_are_rejected_once() {
        let stage = stage();
        let text = "The levee held through the spring flood season.";
        let first = stage.process(chunk(0, text)).await.unwrap();
        assert!(matches!(first, StageOutcome::Emitted(_)));
        let second = stage.process(chunk(500, text)).await.unwrap();
        assert!(matches!(second, StageOutcome::Duplicate { .. }));
    }

    #[tokio::test]
    async fn dedup_can_be_disabled() {
        let config = CleanerConfig {
            remove_duplicates: false,
            ..CleanerConfig::default()
        };
        let stage = CleanStage::new(config, Arc::new(Mutex::new(DedupIndex::new(0.9))));
        let text = "The levee held through the spring flood season.";
        for offset in [0, 500] {
            let outcome = stage.process(chunk(offset, text)).await.unwrap();
            assert!(matches!(outcome, StageOutcome::Emitted(_)));
        }
    }

    #[tokio::test]
    async fn repeated_character_noise_is_filtered() {
        let outcome = stage().process(chunk(0, &"ababab".repeat(10))).await.unwrap();
        assert!(matches!(outcome, StageOutcome::Filtered { .. }));
    }
}
