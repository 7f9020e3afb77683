use std::sync::Arc;

use async_trait::async_trait;
use corpus_core::domain::Chunk;
use corpus_core::Result;
use serde_json::json;
use tracing::debug;

use crate::config::EnhancerConfig;
use crate::enrich::{ExtractedTerm, QaGenerator, TermExtractor, TermLexicon};
use crate::observability::metrics;

use super::{PipelineStage, StageOutcome};

/// Pipeline stage enriching chunks with extracted terms, generated QA pairs
/// and domain tags.
pub struct EnhanceStage {
    config: EnhancerConfig,
    extractor: Arc<dyn TermExtractor>,
    qa_generator: Arc<dyn QaGenerator>,
    lexicon: Arc<TermLexicon>,
}

impl EnhanceStage {
    pub fn new(
        config: EnhancerConfig,
        extractor: Arc<dyn TermExtractor>,
        qa_generator: Arc<dyn QaGenerator>,
        lexicon: Arc<TermLexicon>,
    ) -> Self {
        Self {
            config,
            extractor,
            qa_generator,
            lexicon,
        }
    }

    /// Append a parenthetical gloss after the first occurrence of each known
    /// term. The untouched text is preserved under `original_content`.
    fn enrich_content(&self, content: &str, terms: &[ExtractedTerm]) -> Option<String> {
        let mut enriched = content.to_string();
        let mut changed = false;
        for term in terms {
            let Some(gloss) = self.lexicon.gloss(&term.term) else {
                continue;
            };
            let annotation = format!(" ({})", gloss);
            if enriched.contains(&annotation) {
                continue;
            }
            let lowered = enriched.to_lowercase();
            if let Some(position) = lowered.find(&term.term) {
                let insert_at = position + term.term.len();
                if enriched.is_char_boundary(insert_at) {
                    enriched.insert_str(insert_at, &annotation);
                    changed = true;
                }
            }
        }
        changed.then_some(enriched)
    }
}

#[async_trait]
impl PipelineStage for EnhanceStage {
    async fn process(&self, mut chunk: Chunk) -> Result<StageOutcome> {
        let mut terms: Vec<ExtractedTerm> = Vec::new();

        if self.config.enable_term_extraction {
            terms = self.extractor.extract(&chunk.content);
            if !terms.is_empty() {
                metrics::enhance::terms_extracted(terms.len());
                chunk.merge_extra("extracted_terms", serde_json::to_value(&terms)?);
                debug!("Extracted {} terms from {}", terms.len(), chunk.id);
            }
        }

        if self.config.enable_qa_generation {
            let pairs = self.qa_generator.generate(&chunk, &terms);
            if !pairs.is_empty() {
                metrics::enhance::qa_generated(pairs.len());
                chunk.merge_extra("generated_qa", serde_json::to_value(&pairs)?);
                debug!("Generated {} QA pairs for {}", pairs.len(), chunk.id);
            }
        }

        if self.config.enable_knowledge_enrichment {
            if let Some(enriched) = self.enrich_content(&chunk.content, &terms) {
                chunk.merge_extra("original_content", json!(chunk.content.clone()));
                chunk.merge_extra("knowledge_enriched", json!(true));
                chunk.content = enriched;
            }
        }

        let tags = self.lexicon.domain_tags(&chunk.content);
        if !tags.is_empty() {
            chunk.merge_extra("domain_tags", json!(tags));
        }
        chunk.merge_extra("enhanced", json!(true));

        Ok(StageOutcome::Emitted(vec![chunk]))
    }

    fn stage_name(&self) -> &'static str {
        "enhance"
    }

    fn dependencies(&self) -> Vec<&'static str> {
        vec!["clean"]
    }
}
