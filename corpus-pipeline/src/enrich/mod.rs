//! Enrichment capabilities: language detection, domain terminology and
//! question/answer generation. The pipeline engine only sees the traits;
//! the built-ins here are heuristic implementations good enough to run the
//! binary end-to-end.

pub mod language;
pub mod lexicon;
pub mod qa;

pub use language::{LanguageDetector, ScriptRatioDetector};
pub use lexicon::{ExtractedTerm, LexiconTermExtractor, TermExtractor, TermLexicon};
pub use qa::{QaGenerator, TemplateQaGenerator};
