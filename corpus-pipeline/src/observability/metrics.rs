//! Metrics catalog for the corpus pipeline.
//!
//! Uses the `metrics` facade with standard Prometheus naming conventions; the
//! enum catalog keeps metric names out of call sites.

use std::fmt;
use std::sync::OnceLock;

use tracing::info;

/// Enum representing all metric names used in the system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    // Heartbeat
    Heartbeat,

    // Parse metrics
    ParseSuccess,
    ParseError,
    ParseDuration,
    ParseChunksEmitted,
    ParseBytesProcessed,

    // Clean metrics
    CleanChunksAccepted,
    CleanDuplicates,
    CleanFiltered,

    // Enhance metrics
    EnhanceTermsExtracted,
    EnhanceQaGenerated,

    // Evaluate metrics
    EvaluateQualityScore,
    EvaluateBelowThreshold,

    // Checkpoint metrics
    CheckpointWritesSuccess,
    CheckpointWritesError,
    CheckpointWriteBytes,

    // Pipeline metrics
    PipelineItemFailures,
    PipelineBatchesCompleted,
    PipelineRunDuration,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::Heartbeat => "corpus_heartbeat_total",

            MetricName::ParseSuccess => "corpus_parse_success_total",
            MetricName::ParseError => "corpus_parse_error_total",
            MetricName::ParseDuration => "corpus_parse_duration_seconds",
            MetricName::ParseChunksEmitted => "corpus_parse_chunks_emitted_total",
            MetricName::ParseBytesProcessed => "corpus_parse_bytes_processed",

            MetricName::CleanChunksAccepted => "corpus_clean_chunks_accepted_total",
            MetricName::CleanDuplicates => "corpus_clean_duplicates_total",
            MetricName::CleanFiltered => "corpus_clean_filtered_total",

            MetricName::EnhanceTermsExtracted => "corpus_enhance_terms_extracted_total",
            MetricName::EnhanceQaGenerated => "corpus_enhance_qa_generated_total",

            MetricName::EvaluateQualityScore => "corpus_evaluate_quality_score",
            MetricName::EvaluateBelowThreshold => "corpus_evaluate_below_threshold_total",

            MetricName::CheckpointWritesSuccess => "corpus_checkpoint_writes_success_total",
            MetricName::CheckpointWritesError => "corpus_checkpoint_writes_error_total",
            MetricName::CheckpointWriteBytes => "corpus_checkpoint_write_bytes",

            MetricName::PipelineItemFailures => "corpus_pipeline_item_failures_total",
            MetricName::PipelineBatchesCompleted => "corpus_pipeline_batches_completed_total",
            MetricName::PipelineRunDuration => "corpus_pipeline_run_duration_seconds",
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

static METRICS_HANDLE: OnceLock<metrics_exporter_prometheus::PrometheusHandle> = OnceLock::new();

/// Initialize the metrics system. Safe to call once per process; a second
/// call is a no-op error from the recorder and is ignored by callers.
pub fn init() -> Result<(), Box<dyn std::error::Error>> {
    let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
    let handle = builder
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {}", e))?;
    METRICS_HANDLE.set(handle).ok();
    info!("Metrics system initialized");
    Ok(())
}

/// Render the current metrics snapshot, if the recorder is installed.
#[allow(dead_code)]
pub fn render() -> Option<String> {
    METRICS_HANDLE.get().map(|handle| handle.render())
}

pub fn heartbeat() {
    ::metrics::counter!(MetricName::Heartbeat.as_str()).increment(1);
}

pub mod parse {
    use super::MetricName;

    pub fn success() {
        ::metrics::counter!(MetricName::ParseSuccess.as_str()).increment(1);
    }

    pub fn error() {
        ::metrics::counter!(MetricName::ParseError.as_str()).increment(1);
    }

    pub fn duration(secs: f64) {
        ::metrics::histogram!(MetricName::ParseDuration.as_str()).record(secs);
    }

    pub fn chunks_emitted(count: usize) {
        ::metrics::counter!(MetricName::ParseChunksEmitted.as_str()).increment(count as u64);
    }

    pub fn bytes_processed(bytes: usize) {
        ::metrics::histogram!(MetricName::ParseBytesProcessed.as_str()).record(bytes as f64);
    }
}

pub mod clean {
    use super::MetricName;

    pub fn accepted() {
        ::metrics::counter!(MetricName::CleanChunksAccepted.as_str()).increment(1);
    }

    pub fn duplicate() {
        ::metrics::counter!(MetricName::CleanDuplicates.as_str()).increment(1);
    }

    pub fn filtered() {
        ::metrics::counter!(MetricName::CleanFiltered.as_str()).increment(1);
    }
}

pub mod enhance {
    use super::MetricName;

    pub fn terms_extracted(count: usize) {
        ::metrics::counter!(MetricName::EnhanceTermsExtracted.as_str()).increment(count as u64);
    }

    pub fn qa_generated(count: usize) {
        ::metrics::counter!(MetricName::EnhanceQaGenerated.as_str()).increment(count as u64);
    }
}

pub mod evaluate {
    use super::MetricName;

    pub fn quality_score(score: f64) {
        ::metrics::histogram!(MetricName::EvaluateQualityScore.as_str()).record(score);
    }

    pub fn below_threshold() {
        ::metrics::counter!(MetricName::EvaluateBelowThreshold.as_str()).increment(1);
    }
}

pub mod checkpoint {
    use super::MetricName;

    pub fn write_success() {
        ::metrics::counter!(MetricName::CheckpointWritesSuccess.as_str()).increment(1);
    }

    pub fn write_error() {
        ::metrics::counter!(MetricName::CheckpointWritesError.as_str()).increment(1);
    }

    pub fn write_bytes(bytes: usize) {
        ::metrics::histogram!(MetricName::CheckpointWriteBytes.as_str()).record(bytes as f64);
    }
}

pub mod pipeline {
    use super::MetricName;

    pub fn item_failure() {
        ::metrics::counter!(MetricName::PipelineItemFailures.as_str()).increment(1);
    }

    pub fn batch_completed() {
        ::metrics::counter!(MetricName::PipelineBatchesCompleted.as_str()).increment(1);
    }

    pub fn run_duration(secs: f64) {
        ::metrics::histogram!(MetricName::PipelineRunDuration.as_str()).record(secs);
    }
}
