//! Batch partitioning and bounded-parallel stage execution.

use std::sync::Arc;

use corpus_core::domain::Chunk;
use corpus_core::{CorpusError, Result};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error};

use crate::observability::metrics;

use super::stages::{ItemFailure, PipelineStage, StageOutcome, StageResult};

/// Contiguous, order-preserving partition. Deterministic for the same input
/// and batch size.
pub fn partition<T>(items: Vec<T>, batch_size: usize) -> Vec<Vec<T>> {
    let batch_size = batch_size.max(1);
    let mut batches = Vec::with_capacity(items.len().div_ceil(batch_size));
    let mut current = Vec::with_capacity(batch_size);
    for item in items {
        current.push(item);
        if current.len() == batch_size {
            batches.push(std::mem::replace(&mut current, Vec::with_capacity(batch_size)));
        }
    }
    if !current.is_empty() {
        batches.push(current);
    }
    batches
}

/// Executes one batch at a time on a pool of at most `worker_count` workers.
pub struct BatchScheduler {
    worker_count: usize,
}

impl BatchScheduler {
    pub fn new(worker_count: usize) -> Self {
        Self {
            worker_count: worker_count.max(1),
        }
    }

    /// Run every item of `batch` through `stage`, workers bounded by the
    /// pool size. Item failures are recorded and do not abort the batch;
    /// fatal resource errors do.
    pub async fn run_batch(
        &self,
        stage: Arc<dyn PipelineStage>,
        batch: Vec<Chunk>,
    ) -> Result<StageResult> {
        let semaphore = Arc::new(Semaphore::new(self.worker_count));
        let mut tasks: JoinSet<(usize, String, Result<StageOutcome>)> = JoinSet::new();

        for (index, chunk) in batch.into_iter().enumerate() {
            let stage = Arc::clone(&stage);
            let semaphore = Arc::clone(&semaphore);
            let chunk_id = chunk.id.clone();
            tasks.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .expect("worker semaphore closed");
                let outcome = stage.process(chunk).await;
                (index, chunk_id, outcome)
            });
        }

        let mut completed: Vec<(usize, String, Result<StageOutcome>)> = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(entry) => completed.push(entry),
                Err(e) => {
                    // A panicked worker loses its chunk id; it is recorded
                    // as a failure entry and the batch continues.
                    error!("Stage worker task failed: {}", e);
                    completed.push((
                        usize::MAX,
                        "<unknown>".to_string(),
                        Err(CorpusError::item("<unknown>", "worker", e.to_string())),
                    ));
                }
            }
        }
        // Completion order is nondeterministic; restore submission order.
        completed.sort_by_key(|(index, _, _)| *index);

        let stage_name = stage.stage_name();
        let mut result = StageResult::default();
        for (_, chunk_id, outcome) in completed {
            result.attempted_ids.push(chunk_id.clone());
            match outcome {
                Ok(StageOutcome::Emitted(chunks)) => {
                    result.processed_count += 1;
                    result.outputs.extend(chunks);
                }
                Ok(StageOutcome::Filtered { chunk_id, reason }) => {
                    debug!("Filtered {} in {}: {}", chunk_id, stage_name, reason);
                    result.filtered_count += 1;
                }
                Ok(StageOutcome::Duplicate { chunk_id }) => {
                    debug!("Duplicate rejected in {}: {}", stage_name, chunk_id);
                    result.duplicate_count += 1;
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    metrics::pipeline::item_failure();
                    result.failed_count += 1;
                    result.failures.push(ItemFailure {
                        chunk_id,
                        stage: stage_name.to_string(),
                        error: e.to_string(),
                    });
                }
            }
        }
        metrics::pipeline::batch_completed();
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
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

    struct UppercaseStage;

    #[async_trait]
    impl PipelineStage for UppercaseStage {
        async fn process(&self, mut chunk: Chunk) -> Result<StageOutcome> {
            if chunk.content.contains("poison") {
                return Err(CorpusError::item(chunk.id, "uppercase", "poisoned item"));
            }
            chunk.content = chunk.content.to_uppercase();
            Ok(StageOutcome::Emitted(vec![chunk]))
        }

        fn stage_name(&self) -> &'static str {
            "uppercase"
        }

        fn dependencies(&self) -> Vec<&'static str> {
            vec![]
        }
    }

    #[test]
    fn partition_is_contiguous_and_total() {
        let batches = partition((0..10).collect::<Vec<_>>(), 4);
        assert_eq!(batches, vec![vec![0, 1, 2, 3], vec![4, 5, 6, 7], vec![8, 9]]);
    }

    #[tokio::test]
    async fn failures_are_isolated_per_item() {
        let scheduler = BatchScheduler::new(4);
        let batch = vec![
            chunk(0, "first"),
            chunk(100, "poison pill"),
            chunk(200, "third"),
        ];
        let result = scheduler
            .run_batch(Arc::new(UppercaseStage), batch)
            .await
            .unwrap();
        assert_eq!(result.processed_count, 2);
        assert_eq!(result.failed_count, 1);
        assert_eq!(result.outputs.len(), 2);
        assert_eq!(result.failures[0].stage, "uppercase");
        assert_eq!(result.attempted_ids.len(), 3);
    }

    #[tokio::test]
    async fn outputs_follow_submission_order() {
        let scheduler = BatchScheduler::new(8);
        let batch: Vec<Chunk> = (0..20).map(|i| chunk(i * 10, "text")).collect();
        let expected: Vec<String> = batch.iter().map(|c| c.id.clone()).collect();
        let result = scheduler
            .run_batch(Arc::new(UppercaseStage), batch)
            .await
            .unwrap();
        let got: Vec<String> = result.outputs.iter().map(|c| c.id.clone()).collect();
        assert_eq!(got, expected);
    }
}
