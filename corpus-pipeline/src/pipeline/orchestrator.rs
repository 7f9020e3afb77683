//! Pipeline controller: drives the ordered stage sequence over all batches,
//! owns the checkpoint store and the report, and emits the final corpus.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use corpus_core::domain::{Chunk, Corpus, DataType, Language, QAPair, QualityScore, SourceInfo};
use corpus_core::{CorpusError, Result};
use serde_json::json;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::enrich::{
    LexiconTermExtractor, ScriptRatioDetector, TemplateQaGenerator, TermLexicon,
};
use crate::observability::{self, metrics};

use super::batch::{partition, BatchScheduler};
use super::checkpoint::CheckpointStore;
use super::dedup::{compute_fingerprint, DedupIndex};
use super::report::ProcessingReport;
use super::stages::{
    evaluate::qa_quality_score, CleanStage, EnhanceStage, EvaluateStage, ParseStage,
    PipelineStage, StageResult,
};

/// Outcome of a completed run, for the CLI summary.
#[derive(Debug)]
pub struct RunSummary {
    pub corpus_path: PathBuf,
    pub report_path: PathBuf,
    pub total_chunks: usize,
    pub total_qa_pairs: usize,
    pub item_failures: usize,
}

pub struct PipelineController {
    config: AppConfig,
    checkpoints: CheckpointStore,
    dedup: Arc<Mutex<DedupIndex>>,
    lexicon: Arc<TermLexicon>,
    report: ProcessingReport,
}

impl PipelineController {
    pub fn new(config: AppConfig) -> Result<Self> {
        let checkpoint_dir = Path::new(&config.global.temp_dir).join("checkpoints");
        let checkpoints = CheckpointStore::open(checkpoint_dir)?;
        let dedup = Arc::new(Mutex::new(DedupIndex::new(
            config.cleaner.similarity_threshold,
        )));
        let lexicon = Arc::new(TermLexicon::builtin(
            &config.enhancer.domain,
            &config.enhancer.extra_terms,
        ));
        Ok(Self {
            config,
            checkpoints,
            dedup,
            lexicon,
            report: ProcessingReport::new(),
        })
    }

    /// Machine-readable description of the configured pipeline, used by
    /// `--report-only`.
    pub fn describe(&self) -> serde_json::Value {
        json!({
            "stages": super::stages::STAGE_ORDER,
            "supported_formats": self.config.parser.supported_formats,
            "config": {
                "batch_size": self.config.pipeline.batch_size,
                "max_workers": self.config.global.max_workers,
                "parallel_processing": self.config.pipeline.parallel_processing,
                "checkpoint_enabled": self.config.pipeline.checkpoint_enabled,
                "min_quality_score": self.config.evaluator.min_quality_score,
                "similarity_threshold": self.config.cleaner.similarity_threshold,
            },
        })
    }

    /// Run the full Parse → Clean → Enhance → Evaluate sequence over
    /// `input_files` and write the corpus and report.
    pub async fn run(&mut self, input_files: &[PathBuf], output_path: &Path) -> Result<RunSummary> {
        let run_started = Instant::now();
        observability::heartbeat();
        self.report.total_input_files = input_files.len();
        info!("🔄 Starting pipeline over {} input files", input_files.len());

        if !self.config.pipeline.checkpoint_enabled {
            self.checkpoints.clear()?;
        }

        let seeds = self.seed_chunks(input_files);
        let scheduler = BatchScheduler::new(self.config.worker_count());

        // Parse
        let parse_stage: Arc<dyn PipelineStage> = Arc::new(ParseStage::new(
            self.config.parser.clone(),
            Arc::new(ScriptRatioDetector),
        ));
        let parsed = self.run_stage(&scheduler, parse_stage, seeds).await?;

        // Clean. On resume the dedup index is rebuilt from committed output
        // before any new item is fingerprinted.
        self.rebuild_dedup_index()?;
        let clean_stage: Arc<dyn PipelineStage> = Arc::new(CleanStage::new(
            self.config.cleaner.clone(),
            Arc::clone(&self.dedup),
        ));
        let cleaned = self.run_stage(&scheduler, clean_stage, parsed).await?;

        // Enhance
        let enhance_stage: Arc<dyn PipelineStage> = Arc::new(EnhanceStage::new(
            self.config.enhancer.clone(),
            Arc::new(LexiconTermExtractor::new(Arc::clone(&self.lexicon))),
            Arc::new(TemplateQaGenerator::new(Arc::clone(&self.lexicon))),
            Arc::clone(&self.lexicon),
        ));
        let enhanced = self.run_stage(&scheduler, enhance_stage, cleaned).await?;

        // Evaluate
        let evaluate_stage: Arc<dyn PipelineStage> = Arc::new(EvaluateStage::new(
            self.config.evaluator.clone(),
            Arc::clone(&self.lexicon),
            Arc::new(ScriptRatioDetector),
        ));
        let evaluated = self.run_stage(&scheduler, evaluate_stage, enhanced).await?;

        let summary = self.finalize(evaluated, output_path)?;
        metrics::pipeline::run_duration(run_started.elapsed().as_secs_f64());
        info!(
            "✅ Pipeline completed: {} chunks, {} QA pairs, {} item failures",
            summary.total_chunks, summary.total_qa_pairs, summary.item_failures
        );
        Ok(summary)
    }

    /// One seed chunk per input file; the Parse stage expands them.
    fn seed_chunks(&self, input_files: &[PathBuf]) -> Vec<Chunk> {
        let mut seeds = Vec::new();
        for (ordinal, path) in input_files.iter().enumerate() {
            let extension = path
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or_default();
            let Some(data_type) = DataType::from_extension(extension) else {
                warn!("Skipping unsupported input file: {}", path.display());
                continue;
            };
            seeds.push(Chunk::new(
                String::new(),
                data_type,
                Language::Unknown,
                SourceInfo {
                    path: path.display().to_string(),
                    ordinal,
                    offset: 0,
                },
            ));
        }
        seeds
    }

    /// Dispatch one stage over its pending items, committing a checkpoint per
    /// completed batch and merging recovered output from prior runs.
    async fn run_stage(
        &mut self,
        scheduler: &BatchScheduler,
        stage: Arc<dyn PipelineStage>,
        inputs: Vec<Chunk>,
    ) -> Result<Vec<Chunk>> {
        let stage_name = stage.stage_name();
        let stage_started = Instant::now();
        let input_count = inputs.len();

        let (resume_set, recovered) = if self.config.pipeline.checkpoint_enabled {
            match self.checkpoints.load(stage_name)? {
                Some(checkpoint) => (checkpoint.processed_chunk_ids, checkpoint.outputs),
                None => Default::default(),
            }
        } else {
            Default::default()
        };

        let pending: Vec<Chunk> = inputs
            .into_iter()
            .filter(|chunk| !resume_set.contains(&chunk.id))
            .collect();
        let resumed_items = input_count - pending.len();
        if resumed_items > 0 {
            info!(
                "⏩ Stage {}: skipping {} already-completed items",
                stage_name, resumed_items
            );
        }

        let mut stage_total = StageResult::default();
        for batch in partition(pending, self.config.pipeline.batch_size) {
            let result = scheduler.run_batch(Arc::clone(&stage), batch).await?;
            if self.config.pipeline.checkpoint_enabled {
                self.checkpoints
                    .save(stage_name, &result.attempted_ids, &result.outputs)?;
            }
            stage_total.absorb(result);
        }

        let duration = stage_started.elapsed().as_secs_f64();
        self.report
            .record_stage(stage_name, input_count, resumed_items, &stage_total, duration);
        info!(
            "📊 Stage {} done: {} ok, {} failed, {} filtered, {} duplicates ({:.2}s)",
            stage_name,
            stage_total.processed_count,
            stage_total.failed_count,
            stage_total.filtered_count,
            stage_total.duplicate_count,
            duration
        );

        let mut outputs = recovered;
        outputs.extend(stage_total.outputs);
        // Worker completion order must not leak into stage input order.
        outputs.sort_by_key(|chunk| chunk.sort_key());
        Ok(outputs)
    }

    /// Re-register fingerprints of every chunk the Clean stage has already
    /// committed, preserving the no-duplicate invariant across resumes.
    fn rebuild_dedup_index(&self) -> Result<()> {
        if !self.config.pipeline.checkpoint_enabled || !self.config.cleaner.remove_duplicates {
            return Ok(());
        }
        let Some(checkpoint) = self.checkpoints.load("clean")? else {
            return Ok(());
        };
        let mut index = self
            .dedup
            .lock()
            .map_err(|_| CorpusError::resource("dedup index mutex poisoned"))?;
        for chunk in &checkpoint.outputs {
            index.register(compute_fingerprint(&chunk.content));
        }
        if !index.is_empty() {
            info!("🔁 Rebuilt dedup index from {} committed chunks", index.len());
        }
        Ok(())
    }

    /// Quality gating, final ordering, corpus and report serialization.
    fn finalize(&mut self, evaluated: Vec<Chunk>, output_path: &Path) -> Result<RunSummary> {
        let min_score = self.config.evaluator.min_quality_score;
        let mut surviving = Vec::new();
        for chunk in evaluated {
            let overall = chunk
                .extra_data
                .get("quality_score")
                .and_then(|v| serde_json::from_value::<QualityScore>(v.clone()).ok())
                .map(|score| score.overall)
                .unwrap_or(0.0);
            self.report.quality_distribution.record(overall);
            if overall >= min_score {
                surviving.push(chunk);
            } else {
                self.report.filtered_low_quality += 1;
            }
        }
        surviving.sort_by_key(|chunk| chunk.sort_key());

        let mut qa_pairs: Vec<QAPair> = Vec::new();
        for chunk in &surviving {
            if let Some(value) = chunk.extra_data.get("generated_qa") {
                if let Ok(pairs) = serde_json::from_value::<Vec<QAPair>>(value.clone()) {
                    qa_pairs.extend(pairs);
                }
            }
        }

        for qa in &qa_pairs {
            let score = qa_quality_score(qa, &self.lexicon);
            self.report.qa_quality.distribution.record(score);
            self.report.qa_quality.average_quality += score;
        }
        self.report.qa_quality.total_pairs = qa_pairs.len();
        if !qa_pairs.is_empty() {
            self.report.qa_quality.average_quality /= qa_pairs.len() as f64;
        }

        let name = output_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("corpus")
            .to_string();
        let corpus = Corpus::assemble(
            name,
            format!(
                "Corpus built from {} source files",
                self.report.total_input_files
            ),
            &surviving,
            qa_pairs,
        );

        if let Some(parent) = output_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(output_path, serde_json::to_string_pretty(&corpus)?)?;
        info!("💾 Corpus written to {}", output_path.display());

        let statistics = corpus.statistics.clone();
        self.report.finish(statistics);
        let report_path = report_path_for(output_path);
        self.report.write_to(&report_path)?;
        info!("💾 Report written to {}", report_path.display());

        Ok(RunSummary {
            corpus_path: output_path.to_path_buf(),
            report_path,
            total_chunks: corpus.statistics.total_chunks,
            total_qa_pairs: corpus.statistics.total_qa_pairs,
            item_failures: self.report.total_failures(),
        })
    }
}

fn report_path_for(output_path: &Path) -> PathBuf {
    let stem = output_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("corpus");
    output_path.with_file_name(format!("{}.report.json", stem))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_path_sits_next_to_the_corpus() {
        assert_eq!(
            report_path_for(Path::new("/out/corpus.json")),
            PathBuf::from("/out/corpus.report.json")
        );
    }

    #[test]
    fn seeds_skip_unsupported_extensions() {
        let controller = PipelineController::new(test_config()).unwrap();
        let seeds = controller.seed_chunks(&[
            PathBuf::from("a.txt"),
            PathBuf::from("b.docx"),
            PathBuf::from("c.md"),
        ]);
        assert_eq!(seeds.len(), 2);
        assert_eq!(seeds[0].data_type, DataType::Text);
        assert_eq!(seeds[1].data_type, DataType::Markdown);
        // Ordinals keep their input positions even when files are skipped.
        assert_eq!(seeds[1].source.ordinal, 2);
    }

    fn test_config() -> AppConfig {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.global.temp_dir = dir.keep().display().to_string();
        config
    }
}
