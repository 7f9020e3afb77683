use thiserror::Error;

#[derive(Error, Debug)]
pub enum CorpusError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid configuration: {message}")]
    Config { message: String },

    #[error("resource unavailable: {message}")]
    Resource { message: String },

    #[error("chunk {chunk_id} failed in stage {stage}: {message}")]
    Item {
        chunk_id: String,
        stage: &'static str,
        message: String,
    },

    #[error("decode failed for {path}: {message}")]
    Decode { path: String, message: String },
}

impl CorpusError {
    pub fn config(message: impl Into<String>) -> Self {
        CorpusError::Config {
            message: message.into(),
        }
    }

    pub fn resource(message: impl Into<String>) -> Self {
        CorpusError::Resource {
            message: message.into(),
        }
    }

    pub fn item(chunk_id: impl Into<String>, stage: &'static str, message: impl Into<String>) -> Self {
        CorpusError::Item {
            chunk_id: chunk_id.into(),
            stage,
            message: message.into(),
        }
    }

    /// Fatal errors abort the run; item-level errors are recorded and skipped.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            CorpusError::Config { .. } | CorpusError::Resource { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, CorpusError>;
