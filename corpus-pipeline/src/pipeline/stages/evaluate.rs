use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use corpus_core::domain::{clamp01, Chunk, Language, QAPair, QualityScore};
use corpus_core::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::json;
use tracing::debug;

use crate::config::EvaluatorConfig;
use crate::enrich::{LanguageDetector, TermLexicon};
use crate::observability::metrics;

use super::{PipelineStage, StageOutcome};

static WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Za-z][A-Za-z'-]*").unwrap());
static DIGIT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d").unwrap());
static SENTENCE_SPLIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.!?]+\s|\n+").unwrap());

/// Pipeline stage computing the four-dimensional quality score.
///
/// Scoring is pure: the same chunk, lexicon and configuration always yield
/// the same numbers. Gating on the score happens in the controller, not here;
/// low scorers are annotated, never dropped.
pub struct EvaluateStage {
    config: EvaluatorConfig,
    lexicon: Arc<TermLexicon>,
    detector: Arc<dyn LanguageDetector>,
}

impl EvaluateStage {
    pub fn new(
        config: EvaluatorConfig,
        lexicon: Arc<TermLexicon>,
        detector: Arc<dyn LanguageDetector>,
    ) -> Self {
        Self {
            config,
            lexicon,
            detector,
        }
    }

    fn enabled(&self, metric: &str) -> bool {
        self.config.quality_metrics.iter().any(|m| m == metric)
    }

    fn score(&self, chunk: &Chunk) -> QualityScore {
        let term_count = chunk
            .extra_data
            .get("extracted_terms")
            .and_then(|v| v.as_array())
            .map(|a| a.len())
            .unwrap_or(0);

        let completeness = if self.enabled("completeness") {
            completeness_score(&chunk.content, term_count)
        } else {
            0.0
        };
        let relevance = if self.enabled("relevance") {
            relevance_score(&chunk.content, &self.lexicon)
        } else {
            0.0
        };
        let consistency = if self.enabled("consistency") {
            let detected = self.detector.detect(&chunk.content);
            consistency_score(chunk.language, detected, &chunk.content, &self.lexicon)
        } else {
            0.0
        };
        let diversity = if self.enabled("diversity") {
            diversity_score(&chunk.content)
        } else {
            0.0
        };

        QualityScore::from_parts(
            completeness,
            relevance,
            consistency,
            diversity,
            &self.config.quality_metrics,
            &self.config.weights,
        )
    }

    fn suggestions(&self, chunk: &Chunk, score: &QualityScore) -> Vec<String> {
        let mut suggestions = Vec::new();
        if self.enabled("completeness") && score.completeness < 0.7 {
            if chunk.content.chars().count() < 100 {
                suggestions.push("Content is short; add more detail.".to_string());
            }
            if !DIGIT_RE.is_match(&chunk.content) {
                suggestions.push("No concrete figures; add supporting data.".to_string());
            }
            if !chunk.extra_data.contains_key("extracted_terms") {
                suggestions.push("No domain terminology recognized.".to_string());
            }
        }
        if self.enabled("relevance") && score.relevance < 0.6 {
            suggestions.push("Weak domain relevance; add subject-matter content.".to_string());
        }
        if self.enabled("consistency") && score.consistency < 0.7 {
            suggestions.push("Inconsistent terminology or language use.".to_string());
        }
        if self.enabled("diversity") && score.diversity < 0.6 {
            suggestions.push("Repetitive wording; vary vocabulary and sentence length.".to_string());
        }
        suggestions
    }
}

#[async_trait]
impl PipelineStage for EvaluateStage {
    async fn process(&self, mut chunk: Chunk) -> Result<StageOutcome> {
        let score = self.score(&chunk);
        metrics::evaluate::quality_score(score.overall);

        chunk.merge_extra("quality_score", serde_json::to_value(score)?);
        let suggestions = self.suggestions(&chunk, &score);
        if !suggestions.is_empty() {
            chunk.merge_extra("improvement_suggestions", json!(suggestions));
        }
        if score.overall < self.config.min_quality_score {
            metrics::evaluate::below_threshold();
            chunk.merge_extra("quality_warning", json!(true));
            debug!(
                "Chunk {} scored {:.3}, below threshold {:.3}",
                chunk.id, score.overall, self.config.min_quality_score
            );
        }

        Ok(StageOutcome::Emitted(vec![chunk]))
    }

    fn stage_name(&self) -> &'static str {
        "evaluate"
    }

    fn dependencies(&self) -> Vec<&'static str> {
        vec!["enhance"]
    }
}

/// Content length (saturating), structural markers, and information density.
pub fn completeness_score(content: &str, term_count: usize) -> f64 {
    let chars = content.chars().count();
    let length_score = (chars as f64 / 500.0).min(1.0);

    let mut structure: f64 = 0.0;
    if DIGIT_RE.is_match(content) {
        structure += 0.25;
    }
    if sentences_of(content).len() >= 2 {
        structure += 0.25;
    }
    if content.contains("\n\n") {
        structure += 0.2;
    }
    if term_count >= 2 {
        structure += 0.3;
    }
    let structure = structure.min(1.0_f64);

    let words = WORD_RE.find_iter(content).count();
    let density = (words as f64 / 80.0).min(1.0);

    clamp01(0.3 * length_score + 0.4 * structure + 0.3 * density)
}

/// Proportion of domain vocabulary among all tokens, amplified, plus
/// coverage of distinct lexicon entries.
pub fn relevance_score(content: &str, lexicon: &TermLexicon) -> f64 {
    let tokens: Vec<&str> = WORD_RE.find_iter(content).map(|m| m.as_str()).collect();
    if tokens.is_empty() {
        return 0.0;
    }
    let hits = tokens
        .iter()
        .filter(|token| lexicon.contains_word(token))
        .count();
    let ratio = hits as f64 / tokens.len() as f64;

    let matched_domains = lexicon.domain_tags(content).len();
    let coverage = (matched_domains as f64 / 4.0).min(1.0);

    clamp01(0.6 * (ratio * 5.0).min(1.0) + 0.4 * coverage)
}

/// Declared-vs-detected language agreement and terminology stability.
pub fn consistency_score(
    declared: Language,
    detected: Language,
    content: &str,
    lexicon: &TermLexicon,
) -> f64 {
    let mut score: f64 = 0.8;
    if detected == declared {
        score += 0.2;
    } else if declared == Language::Unknown || detected == Language::Unknown {
        score += 0.1;
    } else {
        score -= 0.2;
    }

    // The same concept denoted by divergent variants reads as inconsistent.
    let lowered = content.to_lowercase();
    let mut divergent = 0usize;
    let mut checked: BTreeSet<String> = BTreeSet::new();
    for token in WORD_RE.find_iter(&lowered).map(|m| m.as_str()) {
        if !checked.insert(token.to_string()) {
            continue;
        }
        let variants = lexicon.variants_of(token);
        if variants.iter().any(|variant| lowered.contains(variant)) {
            divergent += 1;
        }
    }
    score -= (divergent as f64 * 0.1).min(0.3);

    clamp01(score)
}

/// Lexical diversity and sentence-length variation.
pub fn diversity_score(content: &str) -> f64 {
    let words: Vec<String> = WORD_RE
        .find_iter(content)
        .map(|m| m.as_str().to_lowercase())
        .collect();
    if words.is_empty() {
        return 0.0;
    }
    let distinct: BTreeSet<&String> = words.iter().collect();
    let type_token_ratio = distinct.len() as f64 / words.len() as f64;

    let sentences = sentences_of(content);
    let variation = if sentences.len() >= 2 {
        let lengths: Vec<f64> = sentences
            .iter()
            .map(|s| s.chars().count() as f64)
            .collect();
        let mean = lengths.iter().sum::<f64>() / lengths.len() as f64;
        let variance =
            lengths.iter().map(|l| (l - mean).powi(2)).sum::<f64>() / lengths.len() as f64;
        if mean > 0.0 {
            (variance.sqrt() / mean).min(1.0)
        } else {
            0.0
        }
    } else {
        0.3
    };

    clamp01(0.6 * type_token_ratio + 0.4 * variation)
}

fn sentences_of(content: &str) -> Vec<&str> {
    SENTENCE_SPLIT
        .split(content)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Structural quality of a generated QA pair, weighted by its confidence.
pub fn qa_quality_score(qa: &QAPair, lexicon: &TermLexicon) -> f64 {
    let mut score = 0.0;

    let question_len = qa.question.chars().count();
    score += match question_len {
        10..=80 => 0.2,
        0..=9 => 0.1,
        _ => 0.15,
    };
    let question_lower = qa.question.to_lowercase();
    if ["what", "how", "why", "where", "which", "explain"]
        .iter()
        .any(|w| question_lower.starts_with(w))
    {
        score += 0.2;
    }

    let answer_len = qa.answer.chars().count();
    score += match answer_len {
        20..=300 => 0.2,
        0..=19 => 0.1,
        _ => 0.15,
    };
    if DIGIT_RE.is_match(&qa.answer) {
        score += 0.1;
    }
    if WORD_RE
        .find_iter(&qa.answer)
        .any(|m| lexicon.contains_word(m.as_str()))
    {
        score += 0.1;
    }

    let context_words: BTreeSet<String> = WORD_RE
        .find_iter(&qa.context.to_lowercase())
        .map(|m| m.as_str().to_string())
        .collect();
    let question_words: Vec<String> = WORD_RE
        .find_iter(&question_lower)
        .map(|m| m.as_str().to_string())
        .collect();
    if !question_words.is_empty() {
        let overlap = question_words
            .iter()
            .filter(|w| context_words.contains(*w))
            .count() as f64
            / question_words.len() as f64;
        score += overlap.min(0.2);
    }

    clamp01(score * qa.confidence.clamp(0.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrich::ScriptRatioDetector;
    use corpus_core::domain::{DataType, SourceInfo};

    fn lexicon() -> Arc<TermLexicon> {
        Arc::new(TermLexicon::builtin("hydrology", &[]))
    }

    fn stage() -> EvaluateStage {
        EvaluateStage::new(EvaluatorConfig::default(), lexicon(), Arc::new(ScriptRatioDetector))
    }

    fn chunk(content: &str) -> Chunk {
        Chunk::new(
            content.to_string(),
            DataType::Text,
            Language::En,
            SourceInfo {
                path: "doc.txt".to_string(),
                ordinal: 0,
                offset: 0,
            },
        )
    }

    const RICH_TEXT: &str = "The watershed above the reservoir received 120 mm of rainfall. \
        Runoff concentrated within six hours, and discharge at the dam reached 450 m3 per second. \
        Operators opened the spillway for flood control while monitoring water quality downstream.";

    #[test]
    fn all_dimensions_stay_in_unit_range() {
        let lex = lexicon();
        for content in [RICH_TEXT, "short", "", "12345 67890"] {
            let c = completeness_score(content, 2);
            let r = relevance_score(content, &lex);
            let d = diversity_score(content);
            let s = consistency_score(Language::En, Language::En, content, &lex);
            for value in [c, r, d, s] {
                assert!((0.0..=1.0).contains(&value), "out of range: {}", value);
            }
        }
    }

    #[test]
    fn domain_text_outscores_off_topic_text() {
        let lex = lexicon();
        let off_topic = "The orchestra rehearsed the symphony twice before the evening concert began.";
        assert!(relevance_score(RICH_TEXT, &lex) > relevance_score(off_topic, &lex));
    }

    #[test]
    fn language_mismatch_lowers_consistency() {
        let lex = lexicon();
        let matched = consistency_score(Language::En, Language::En, RICH_TEXT, &lex);
        let mismatched = consistency_score(Language::Zh, Language::En, RICH_TEXT, &lex);
        assert!(matched > mismatched);
    }

    #[test]
    fn divergent_term_variants_are_penalized() {
        let lex = lexicon();
        let stable = "Precipitation totals rose. Precipitation drives the basin response.";
        let divergent = "Precipitation totals rose. Rainfall drives the basin response.";
        let stable_score = consistency_score(Language::En, Language::En, stable, &lex);
        let divergent_score = consistency_score(Language::En, Language::En, divergent, &lex);
        assert!(stable_score > divergent_score);
    }

    #[test]
    fn scoring_is_deterministic() {
        let lex = lexicon();
        assert_eq!(relevance_score(RICH_TEXT, &lex), relevance_score(RICH_TEXT, &lex));
        assert_eq!(diversity_score(RICH_TEXT), diversity_score(RICH_TEXT));
    }

    #[tokio::test]
    async fn attaches_score_and_idempotent_overall() {
        let config = EvaluatorConfig::default();
        let outcome = stage().process(chunk(RICH_TEXT)).await.unwrap();
        let StageOutcome::Emitted(chunks) = outcome else {
            panic!("expected emitted chunk");
        };
        let score: QualityScore =
            serde_json::from_value(chunks[0].extra_data["quality_score"].clone()).unwrap();
        assert!((0.0..=1.0).contains(&score.overall));
        assert_eq!(
            score.overall,
            score.recompute_overall(&config.quality_metrics, &config.weights)
        );
    }

    #[tokio::test]
    async fn low_scores_get_warning_and_suggestions() {
        let mut config = EvaluatorConfig::default();
        config.min_quality_score = 0.99;
        let stage = EvaluateStage::new(config, lexicon(), Arc::new(ScriptRatioDetector));
        let outcome = stage.process(chunk("Plain filler sentence.")).await.unwrap();
        let StageOutcome::Emitted(chunks) = outcome else {
            panic!("expected emitted chunk");
        };
        assert_eq!(chunks[0].extra_data["quality_warning"], json!(true));
        assert!(chunks[0]
            .extra_data
            .get("improvement_suggestions")
            .is_some());
    }

    #[test]
    fn qa_scoring_rewards_wellformed_pairs() {
        let lex = lexicon();
        let good = QAPair {
            question: "What is the role of the reservoir in flood control?".to_string(),
            answer: "The reservoir stores 120 m3 of inflow and releases it slowly through the spillway.".to_string(),
            context: "The reservoir stores inflow for flood control purposes.".to_string(),
            domain: "engineering".to_string(),
            confidence: 0.9,
        };
        let poor = QAPair {
            question: "?".to_string(),
            answer: "yes".to_string(),
            context: String::new(),
            domain: "general".to_string(),
            confidence: 0.5,
        };
        assert!(qa_quality_score(&good, &lex) > qa_quality_score(&poor, &lex));
        assert!((0.0..=1.0).contains(&qa_quality_score(&good, &lex)));
    }
}
