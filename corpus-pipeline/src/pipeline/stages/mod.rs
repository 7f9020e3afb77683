use async_trait::async_trait;
use corpus_core::domain::Chunk;
use corpus_core::Result;

pub mod clean;
pub mod enhance;
pub mod evaluate;
pub mod parse;

pub use clean::CleanStage;
pub use enhance::EnhanceStage;
pub use evaluate::EvaluateStage;
pub use parse::ParseStage;

/// Common trait for all pipeline stages. A stage transforms one chunk into
/// zero or more chunks; failures are item-scoped and surface as `Err`.
#[async_trait]
pub trait PipelineStage: Send + Sync {
    /// Process a single chunk.
    async fn process(&self, chunk: Chunk) -> Result<StageOutcome>;

    /// Get the name of this pipeline stage
    fn stage_name(&self) -> &'static str;

    /// Get the stages that must complete before this one can run
    fn dependencies(&self) -> Vec<&'static str>;
}

/// What became of one chunk in one stage.
#[derive(Debug, Clone)]
pub enum StageOutcome {
    /// The chunk survived; Parse may emit several chunks per input.
    Emitted(Vec<Chunk>),
    /// Dropped by a filter rule (length floor, quality gate at Clean).
    Filtered { chunk_id: String, reason: String },
    /// Rejected by the dedup index. Not an error.
    Duplicate { chunk_id: String },
}

/// One recorded item-level failure.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ItemFailure {
    pub chunk_id: String,
    pub stage: String,
    pub error: String,
}

/// Aggregated result of executing a stage over one batch.
#[derive(Debug, Default)]
pub struct StageResult {
    pub processed_count: usize,
    pub failed_count: usize,
    pub filtered_count: usize,
    pub duplicate_count: usize,
    pub outputs: Vec<Chunk>,
    pub failures: Vec<ItemFailure>,
    /// Every item id this batch attempted, successes and failures alike;
    /// this is what the checkpoint records.
    pub attempted_ids: Vec<String>,
}

impl StageResult {
    pub fn absorb(&mut self, other: StageResult) {
        self.processed_count += other.processed_count;
        self.failed_count += other.failed_count;
        self.filtered_count += other.filtered_count;
        self.duplicate_count += other.duplicate_count;
        self.outputs.extend(other.outputs);
        self.failures.extend(other.failures);
        self.attempted_ids.extend(other.attempted_ids);
    }
}

/// The fixed stage sequence of the pipeline.
pub const STAGE_ORDER: [&str; 4] = ["parse", "clean", "enhance", "evaluate"];
