pub mod common;
pub mod domain;

pub use common::error::{CorpusError, Result};
