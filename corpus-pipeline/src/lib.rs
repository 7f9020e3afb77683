//! Main library crate for the corpus preparation pipeline

// Re-export the main modules needed for integration tests
pub mod config;
pub mod decode;
pub mod discover;
pub mod enrich;
pub mod observability;
pub mod pipeline;

// Re-export commonly used types
pub use corpus_core::domain::{Chunk, Corpus, QAPair, QualityScore};
