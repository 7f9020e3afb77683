use std::sync::Arc;

use corpus_core::common::hash::stable_hash64;
use corpus_core::domain::{Chunk, QAPair};
use once_cell::sync::Lazy;
use regex::Regex;

use super::lexicon::{ExtractedTerm, TermLexicon};

/// Figures with a unit suffix; these anchor the content-based questions.
static FIGURE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\d+(?:\.\d+)?\s?(?:km|mm|cm|m3|m|ha|MW|t|%|°C)").unwrap()
});

const MAX_QA_PER_CHUNK: usize = 5;
const MAX_TERM_QA: usize = 3;
const MAX_FIGURE_QA: usize = 2;

/// Capability interface: generate question/answer pairs for a chunk.
pub trait QaGenerator: Send + Sync {
    fn generate(&self, chunk: &Chunk, terms: &[ExtractedTerm]) -> Vec<QAPair>;
}

/// Template-driven generator. Question family and wording are picked by a
/// stable hash of the term, so the same chunk always yields the same pairs.
pub struct TemplateQaGenerator {
    lexicon: Arc<TermLexicon>,
}

const TEMPLATES: [[&str; 3]; 4] = [
    [
        "What is {term}?",
        "How is {term} defined?",
        "Explain what {term} means.",
    ],
    [
        "What is the principle behind {term}?",
        "How does {term} work?",
        "What mechanism drives {term}?",
    ],
    [
        "What is {term} used for in practice?",
        "Where is {term} applied?",
        "What role does {term} play in water management?",
    ],
    [
        "How is {term} measured or calculated?",
        "What determines the magnitude of {term}?",
        "Which factors influence {term}?",
    ],
];

impl TemplateQaGenerator {
    pub fn new(lexicon: Arc<TermLexicon>) -> Self {
        Self { lexicon }
    }

    fn question_for(term: &str) -> String {
        let hash = stable_hash64(term.as_bytes());
        let family = (hash % TEMPLATES.len() as u64) as usize;
        let template = ((hash >> 8) % TEMPLATES[family].len() as u64) as usize;
        TEMPLATES[family][template].replace("{term}", term)
    }

    fn term_qa(&self, chunk: &Chunk, terms: &[ExtractedTerm]) -> Vec<QAPair> {
        let mut pairs = Vec::new();
        for term in terms.iter().take(MAX_TERM_QA) {
            let Some(answer) = excerpt_around(&chunk.content, &term.term, 100) else {
                continue;
            };
            pairs.push(QAPair {
                question: Self::question_for(&term.term),
                answer,
                context: context_of(&chunk.content),
                domain: self
                    .lexicon
                    .domain_of(&term.term)
                    .unwrap_or("general")
                    .to_string(),
                confidence: 0.8,
            });
        }
        pairs
    }

    fn figure_qa(&self, chunk: &Chunk) -> Vec<QAPair> {
        let mut pairs = Vec::new();
        for figure in FIGURE_RE.find_iter(&chunk.content).take(MAX_FIGURE_QA) {
            let Some(sentence) = excerpt_around(&chunk.content, figure.as_str(), 50) else {
                continue;
            };
            pairs.push(QAPair {
                question: format!("What does the figure {} refer to in this passage?", figure.as_str()),
                answer: sentence.clone(),
                context: sentence,
                domain: "data".to_string(),
                confidence: 0.7,
            });
        }
        pairs
    }
}

impl QaGenerator for TemplateQaGenerator {
    fn generate(&self, chunk: &Chunk, terms: &[ExtractedTerm]) -> Vec<QAPair> {
        let mut pairs = self.term_qa(chunk, terms);
        pairs.extend(self.figure_qa(chunk));
        pairs.truncate(MAX_QA_PER_CHUNK);
        pairs
    }
}

/// First 200 characters of the content, marked when truncated.
fn context_of(content: &str) -> String {
    let mut context: String = content.chars().take(200).collect();
    if context.len() < content.len() {
        context.push_str("...");
    }
    context
}

/// The text surrounding the first case-insensitive occurrence of `needle`,
/// `radius` bytes on each side snapped to character boundaries.
fn excerpt_around(content: &str, needle: &str, radius: usize) -> Option<String> {
    let haystack = content.to_lowercase();
    let position = haystack.find(&needle.to_lowercase())?;
    // Case mapping can change byte lengths, so the match position is only an
    // anchor; both bounds are re-snapped against the original text.
    let end = snap_to_boundary(content, (position + needle.len() + radius).min(content.len()));
    let start = snap_to_boundary(content, position.saturating_sub(radius)).min(end);
    let excerpt = content[start..end].trim();
    if excerpt.len() >= 20 {
        Some(excerpt.to_string())
    } else {
        Some(content.trim().to_string()).filter(|s| !s.is_empty())
    }
}

fn snap_to_boundary(s: &str, mut index: usize) -> usize {
    while index < s.len() && !s.is_char_boundary(index) {
        index += 1;
    }
    index.min(s.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use corpus_core::domain::{DataType, Language, SourceInfo};

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

    fn generator() -> TemplateQaGenerator {
        TemplateQaGenerator::new(Arc::new(TermLexicon::builtin("hydrology", &[])))
    }

    fn term(name: &str) -> ExtractedTerm {
        ExtractedTerm {
            term: name.to_string(),
            kind: "term".to_string(),
            confidence: 0.9,
            domain: "hydrology".to_string(),
        }
    }

    #[test]
    fn generates_term_questions_with_excerpted_answers() {
        let chunk = chunk(
            "Runoff from the upper watershed converges quickly after storms, \
             and the gauging network tracks how discharge responds downstream.",
        );
        let pairs = generator().generate(&chunk, &[term("runoff"), term("discharge")]);
        assert_eq!(pairs.len(), 2);
        assert!(pairs[0].question.to_lowercase().contains("runoff"));
        assert!(pairs[0].answer.to_lowercase().contains("runoff"));
        assert_eq!(pairs[0].domain, "hydrology");
    }

    #[test]
    fn question_choice_is_deterministic() {
        let a = TemplateQaGenerator::question_for("watershed");
        let b = TemplateQaGenerator::question_for("watershed");
        assert_eq!(a, b);
    }

    #[test]
    fn figures_with_units_yield_data_questions() {
        let chunk = chunk(
            "Peak discharge reached 450 m3 per second during the flood event, \
             while rainfall totaled 120 mm across the basin over two days.",
        );
        let pairs = generator().generate(&chunk, &[]);
        assert_eq!(pairs.len(), 2);
        assert!(pairs[0].question.contains("450 m3"));
        assert_eq!(pairs[0].domain, "data");
    }

    #[test]
    fn output_is_capped_per_chunk() {
        let chunk = chunk(
            "Rainfall of 10 mm and runoff of 5 m3 move through the watershed \
             toward the reservoir, past the dam and the levee system.",
        );
        let terms = vec![
            term("rainfall"),
            term("runoff"),
            term("watershed"),
            term("reservoir"),
            term("dam"),
        ];
        let pairs = generator().generate(&chunk, &terms);
        assert_eq!(pairs.len(), MAX_QA_PER_CHUNK);
    }
}
