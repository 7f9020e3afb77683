//! Aggregated run statistics, serialized next to the output corpus.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use corpus_core::domain::CorpusStatistics;
use corpus_core::{CorpusError, Result};
use serde::Serialize;

use super::stages::{ItemFailure, StageResult};

#[derive(Debug, Clone, Serialize)]
pub struct StageReport {
    pub stage: String,
    pub input_items: usize,
    pub resumed_items: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub filtered: usize,
    pub duplicates: usize,
    pub duration_secs: f64,
}

/// Histogram over overall quality scores.
#[derive(Debug, Clone, Default, Serialize)]
pub struct QualityDistribution {
    pub excellent: usize,
    pub good: usize,
    pub fair: usize,
    pub poor: usize,
}

impl QualityDistribution {
    pub fn record(&mut self, score: f64) {
        if score >= 0.8 {
            self.excellent += 1;
        } else if score >= 0.6 {
            self.good += 1;
        } else if score >= 0.4 {
            self.fair += 1;
        } else {
            self.poor += 1;
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct QaQualityReport {
    pub total_pairs: usize,
    pub average_quality: f64,
    pub distribution: QualityDistribution,
}

#[derive(Debug, Serialize)]
pub struct ProcessingReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub total_input_files: usize,
    pub stages: Vec<StageReport>,
    pub failures: Vec<ItemFailure>,
    /// Chunks scored below the quality gate: counted, not emitted.
    pub filtered_low_quality: usize,
    pub quality_distribution: QualityDistribution,
    pub qa_quality: QaQualityReport,
    pub statistics: Option<CorpusStatistics>,
}

impl ProcessingReport {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            total_input_files: 0,
            stages: Vec::new(),
            failures: Vec::new(),
            filtered_low_quality: 0,
            quality_distribution: QualityDistribution::default(),
            qa_quality: QaQualityReport::default(),
            statistics: None,
        }
    }

    pub fn record_stage(
        &mut self,
        stage: &str,
        input_items: usize,
        resumed_items: usize,
        result: &StageResult,
        duration_secs: f64,
    ) {
        self.stages.push(StageReport {
            stage: stage.to_string(),
            input_items,
            resumed_items,
            succeeded: result.processed_count,
            failed: result.failed_count,
            filtered: result.filtered_count,
            duplicates: result.duplicate_count,
            duration_secs,
        });
        self.failures.extend(result.failures.iter().cloned());
    }

    pub fn total_failures(&self) -> usize {
        self.failures.len()
    }

    pub fn finish(&mut self, statistics: CorpusStatistics) {
        self.statistics = Some(statistics);
        self.finished_at = Some(Utc::now());
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(CorpusError::from)
    }
}

impl Default for ProcessingReport {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distribution_buckets_match_thresholds() {
        let mut dist = QualityDistribution::default();
        for score in [0.95, 0.8, 0.7, 0.45, 0.1] {
            dist.record(score);
        }
        assert_eq!(dist.excellent, 2);
        assert_eq!(dist.good, 1);
        assert_eq!(dist.fair, 1);
        assert_eq!(dist.poor, 1);
    }

    #[test]
    fn stage_records_accumulate_failures() {
        let mut report = ProcessingReport::new();
        let mut result = StageResult::default();
        result.processed_count = 3;
        result.failed_count = 1;
        result.failures.push(ItemFailure {
            chunk_id: "a#00000000".to_string(),
            stage: "parse".to_string(),
            error: "boom".to_string(),
        });
        report.record_stage("parse", 4, 0, &result, 0.5);
        assert_eq!(report.stages.len(), 1);
        assert_eq!(report.total_failures(), 1);
        assert_eq!(report.stages[0].succeeded, 3);
    }
}
