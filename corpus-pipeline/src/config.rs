use std::fs;
use std::path::Path;

use corpus_core::domain::{DataType, ScoreWeights};
use corpus_core::{CorpusError, Result};
use serde::Deserialize;

pub const KNOWN_METRICS: [&str; 4] = ["completeness", "relevance", "consistency", "diversity"];

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub global: GlobalConfig,
    pub parser: ParserConfig,
    pub cleaner: CleanerConfig,
    pub enhancer: EnhancerConfig,
    pub evaluator: EvaluatorConfig,
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    pub log_level: String,
    pub output_dir: String,
    pub temp_dir: String,
    pub max_workers: usize,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            output_dir: "./output".to_string(),
            temp_dir: "./temp".to_string(),
            max_workers: 4,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    pub supported_formats: Vec<String>,
    pub chunk_size: usize,
    pub overlap: usize,
    pub extract_tables: bool,
    pub min_confidence: f64,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            supported_formats: vec![
                "pdf".to_string(),
                "txt".to_string(),
                "json".to_string(),
                "csv".to_string(),
                "md".to_string(),
            ],
            chunk_size: 1000,
            overlap: 100,
            extract_tables: true,
            min_confidence: 0.8,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CleanerConfig {
    pub remove_duplicates: bool,
    pub normalize_whitespace: bool,
    pub min_text_length: usize,
    pub similarity_threshold: f64,
}

impl Default for CleanerConfig {
    fn default() -> Self {
        Self {
            remove_duplicates: true,
            normalize_whitespace: true,
            min_text_length: 10,
            similarity_threshold: 0.9,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EnhancerConfig {
    pub enable_qa_generation: bool,
    pub enable_term_extraction: bool,
    pub enable_knowledge_enrichment: bool,
    pub domain: String,
    /// Extra lexicon entries merged into the built-in domain lexicon.
    pub extra_terms: Vec<String>,
}

impl Default for EnhancerConfig {
    fn default() -> Self {
        Self {
            enable_qa_generation: true,
            enable_term_extraction: true,
            enable_knowledge_enrichment: false,
            domain: "hydrology".to_string(),
            extra_terms: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EvaluatorConfig {
    pub quality_metrics: Vec<String>,
    pub min_quality_score: f64,
    pub weights: ScoreWeights,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            quality_metrics: KNOWN_METRICS.iter().map(|m| m.to_string()).collect(),
            min_quality_score: 0.3,
            weights: ScoreWeights::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub batch_size: usize,
    pub parallel_processing: bool,
    pub checkpoint_enabled: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            parallel_processing: true,
            checkpoint_enabled: true,
        }
    }
}

impl AppConfig {
    /// Load a config file, falling back to defaults when `path` is None and
    /// no `corpusprep.toml` exists in the working directory.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(p) => {
                let content = fs::read_to_string(p).map_err(|e| {
                    CorpusError::config(format!("failed to read config file '{}': {}", p.display(), e))
                })?;
                toml::from_str(&content).map_err(|e| {
                    CorpusError::config(format!("config file '{}' is not valid TOML: {}", p.display(), e))
                })?
            }
            None => {
                let default_path = Path::new("corpusprep.toml");
                if default_path.exists() {
                    let content = fs::read_to_string(default_path)?;
                    toml::from_str(&content).map_err(|e| {
                        CorpusError::config(format!("corpusprep.toml is not valid TOML: {}", e))
                    })?
                } else {
                    AppConfig::default()
                }
            }
        };
        config.validate()?;
        Ok(config)
    }

    /// Startup validation; any violation is fatal before processing begins.
    pub fn validate(&self) -> Result<()> {
        if self.pipeline.batch_size == 0 {
            return Err(CorpusError::config("pipeline.batch_size must be at least 1"));
        }
        if self.global.max_workers == 0 {
            return Err(CorpusError::config("global.max_workers must be at least 1"));
        }
        if self.parser.chunk_size == 0 {
            return Err(CorpusError::config("parser.chunk_size must be at least 1"));
        }
        if self.parser.overlap >= self.parser.chunk_size {
            return Err(CorpusError::config(format!(
                "parser.overlap ({}) must be smaller than parser.chunk_size ({})",
                self.parser.overlap, self.parser.chunk_size
            )));
        }
        if !(0.0..=1.0).contains(&self.cleaner.similarity_threshold) {
            return Err(CorpusError::config(format!(
                "cleaner.similarity_threshold must be within [0, 1], got {}",
                self.cleaner.similarity_threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.evaluator.min_quality_score) {
            return Err(CorpusError::config(format!(
                "evaluator.min_quality_score must be within [0, 1], got {}",
                self.evaluator.min_quality_score
            )));
        }
        if !(0.0..=1.0).contains(&self.parser.min_confidence) {
            return Err(CorpusError::config(format!(
                "parser.min_confidence must be within [0, 1], got {}",
                self.parser.min_confidence
            )));
        }
        for fmt in &self.parser.supported_formats {
            if DataType::from_extension(fmt).is_none() {
                return Err(CorpusError::config(format!(
                    "parser.supported_formats contains unknown format '{}'",
                    fmt
                )));
            }
        }
        if self.evaluator.quality_metrics.is_empty() {
            return Err(CorpusError::config("evaluator.quality_metrics must not be empty"));
        }
        for metric in &self.evaluator.quality_metrics {
            if !KNOWN_METRICS.contains(&metric.as_str()) {
                return Err(CorpusError::config(format!(
                    "evaluator.quality_metrics contains unknown metric '{}'",
                    metric
                )));
            }
        }
        let w = &self.evaluator.weights;
        for (name, value) in [
            ("completeness", w.completeness),
            ("relevance", w.relevance),
            ("consistency", w.consistency),
            ("diversity", w.diversity),
        ] {
            if value < 0.0 {
                return Err(CorpusError::config(format!(
                    "evaluator.weights.{} must not be negative",
                    name
                )));
            }
        }
        let enabled_weight: f64 = self
            .evaluator
            .quality_metrics
            .iter()
            .filter_map(|m| w.get(m))
            .sum();
        if enabled_weight <= 0.0 {
            return Err(CorpusError::config(
                "evaluator.weights must be positive for at least one enabled metric",
            ));
        }
        Ok(())
    }

    /// Apply command-line overrides on top of the loaded file.
    pub fn apply_overrides(&mut self, batch_size: Option<usize>, workers: Option<usize>) -> Result<()> {
        if let Some(batch_size) = batch_size {
            self.pipeline.batch_size = batch_size;
        }
        if let Some(workers) = workers {
            self.global.max_workers = workers;
        }
        self.validate()
    }

    /// Effective worker count: 1 when parallel processing is disabled.
    pub fn worker_count(&self) -> usize {
        if self.pipeline.parallel_processing {
            self.global.max_workers.max(1)
        } else {
            1
        }
    }

    pub fn supported_data_types(&self) -> Vec<DataType> {
        let mut types: Vec<DataType> = self
            .parser
            .supported_formats
            .iter()
            .filter_map(|f| DataType::from_extension(f))
            .collect();
        types.sort();
        types.dedup();
        types
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        AppConfig::default().validate().unwrap();
    }

    #[test]
    fn rejects_out_of_range_threshold() {
        let mut config = AppConfig::default();
        config.cleaner.similarity_threshold = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_unknown_format() {
        let mut config = AppConfig::default();
        config.parser.supported_formats.push("docx".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_zero_weight_over_enabled_metrics() {
        let mut config = AppConfig::default();
        config.evaluator.quality_metrics = vec!["relevance".to_string()];
        config.evaluator.weights.relevance = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn parses_partial_toml_with_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [cleaner]
            min_text_length = 25

            [pipeline]
            batch_size = 8
            "#,
        )
        .unwrap();
        assert_eq!(config.cleaner.min_text_length, 25);
        assert_eq!(config.pipeline.batch_size, 8);
        assert_eq!(config.parser.chunk_size, 1000);
        config.validate().unwrap();
    }

    #[test]
    fn overrides_take_effect() {
        let mut config = AppConfig::default();
        config.apply_overrides(Some(16), Some(2)).unwrap();
        assert_eq!(config.pipeline.batch_size, 16);
        assert_eq!(config.global.max_workers, 2);
    }
}
