use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Supported input formats for corpus sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Pdf,
    Text,
    Json,
    Csv,
    Markdown,
}

impl DataType {
    pub const ALL: [DataType; 5] = [
        DataType::Pdf,
        DataType::Text,
        DataType::Json,
        DataType::Csv,
        DataType::Markdown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Pdf => "pdf",
            DataType::Text => "text",
            DataType::Json => "json",
            DataType::Csv => "csv",
            DataType::Markdown => "markdown",
        }
    }

    /// Map a file extension (without the dot) to a data type.
    pub fn from_extension(ext: &str) -> Option<DataType> {
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => Some(DataType::Pdf),
            "txt" | "text" => Some(DataType::Text),
            "json" => Some(DataType::Json),
            "csv" => Some(DataType::Csv),
            "md" | "markdown" => Some(DataType::Markdown),
            _ => None,
        }
    }
}

/// Detected or declared chunk language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Language {
    #[serde(rename = "en")]
    En,
    #[serde(rename = "zh")]
    Zh,
    #[serde(rename = "unknown")]
    Unknown,
}

impl Language {
    pub const ALL: [Language; 3] = [Language::En, Language::Zh, Language::Unknown];

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Zh => "zh",
            Language::Unknown => "unknown",
        }
    }
}

/// Where a chunk came from. `ordinal` is the position of the source file in
/// the resolved input list; together with `offset` it fixes the final output
/// order no matter which worker finished first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceInfo {
    pub path: String,
    pub ordinal: usize,
    pub offset: usize,
}

/// The atomic unit of text carried through every pipeline stage.
///
/// The id is derived from the source path and byte offset at creation and is
/// never reused or rewritten. Later stages may rewrite `content`, refine
/// `language`, and merge into `extra_data`, but must not drop entries they do
/// not own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub content: String,
    pub data_type: DataType,
    pub language: Language,
    pub source: SourceInfo,
    #[serde(default)]
    pub extra_data: BTreeMap<String, serde_json::Value>,
}

impl Chunk {
    pub fn new(content: String, data_type: DataType, language: Language, source: SourceInfo) -> Self {
        let id = Chunk::derive_id(&source.path, source.offset);
        Self {
            id,
            content,
            data_type,
            language,
            source,
            extra_data: BTreeMap::new(),
        }
    }

    /// Stable chunk identity: source path plus byte offset of the segment.
    pub fn derive_id(path: &str, offset: usize) -> String {
        format!("{}#{:08}", path, offset)
    }

    /// Merge a value into `extra_data` without clobbering existing entries.
    /// Object values are merged key-by-key; any other existing value wins.
    pub fn merge_extra(&mut self, key: &str, value: serde_json::Value) {
        match self.extra_data.get_mut(key) {
            None => {
                self.extra_data.insert(key.to_string(), value);
            }
            Some(serde_json::Value::Object(existing)) => {
                if let serde_json::Value::Object(incoming) = value {
                    for (k, v) in incoming {
                        existing.entry(k).or_insert(v);
                    }
                }
            }
            Some(_) => {}
        }
    }

    /// Sort key restoring original input order after parallel processing.
    pub fn sort_key(&self) -> (usize, usize) {
        (self.source.ordinal, self.source.offset)
    }
}

/// A generated question/answer pair. Never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QAPair {
    pub question: String,
    pub answer: String,
    pub context: String,
    pub domain: String,
    pub confidence: f64,
}

/// Weights for combining the four quality dimensions into `overall`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    pub completeness: f64,
    pub relevance: f64,
    pub consistency: f64,
    pub diversity: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            completeness: 0.25,
            relevance: 0.25,
            consistency: 0.25,
            diversity: 0.25,
        }
    }
}

impl ScoreWeights {
    pub fn get(&self, metric: &str) -> Option<f64> {
        match metric {
            "completeness" => Some(self.completeness),
            "relevance" => Some(self.relevance),
            "consistency" => Some(self.consistency),
            "diversity" => Some(self.diversity),
            _ => None,
        }
    }
}

/// Four-dimensional quality assessment plus the weighted overall value.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct QualityScore {
    pub overall: f64,
    pub completeness: f64,
    pub relevance: f64,
    pub consistency: f64,
    pub diversity: f64,
}

impl QualityScore {
    /// Build a score from sub-scores, computing `overall` as the weighted
    /// combination over `metrics`. Weights are re-normalized over the metrics
    /// actually listed, so trimming the metric set keeps the result in [0,1].
    pub fn from_parts(
        completeness: f64,
        relevance: f64,
        consistency: f64,
        diversity: f64,
        metrics: &[String],
        weights: &ScoreWeights,
    ) -> Self {
        let mut score = Self {
            overall: 0.0,
            completeness: clamp01(completeness),
            relevance: clamp01(relevance),
            consistency: clamp01(consistency),
            diversity: clamp01(diversity),
        };
        score.overall = score.recompute_overall(metrics, weights);
        score
    }

    /// Recompute `overall` from the persisted sub-scores. Idempotent: calling
    /// this with the same weights always yields the same value.
    pub fn recompute_overall(&self, metrics: &[String], weights: &ScoreWeights) -> f64 {
        let mut weighted = 0.0;
        let mut total_weight = 0.0;
        for metric in metrics {
            let value = match metric.as_str() {
                "completeness" => self.completeness,
                "relevance" => self.relevance,
                "consistency" => self.consistency,
                "diversity" => self.diversity,
                _ => continue,
            };
            let weight = weights.get(metric).unwrap_or(0.0);
            weighted += value * weight;
            total_weight += weight;
        }
        if total_weight > 0.0 {
            clamp01(weighted / total_weight)
        } else {
            0.0
        }
    }
}

pub fn clamp01(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}

/// Statistics block of the output corpus document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusStatistics {
    pub total_chunks: usize,
    pub total_qa_pairs: usize,
    pub total_characters: usize,
    pub data_types: BTreeMap<String, usize>,
    pub languages: BTreeMap<String, usize>,
}

impl CorpusStatistics {
    pub fn compute(chunks: &[Chunk], qa_pairs: &[QAPair]) -> Self {
        let mut data_types: BTreeMap<String, usize> = DataType::ALL
            .iter()
            .map(|dt| (dt.as_str().to_string(), 0))
            .collect();
        let mut languages: BTreeMap<String, usize> = Language::ALL
            .iter()
            .map(|lang| (lang.as_str().to_string(), 0))
            .collect();
        let mut total_characters = 0;
        for chunk in chunks {
            *data_types.entry(chunk.data_type.as_str().to_string()).or_insert(0) += 1;
            *languages.entry(chunk.language.as_str().to_string()).or_insert(0) += 1;
            total_characters += chunk.content.chars().count();
        }
        Self {
            total_chunks: chunks.len(),
            total_qa_pairs: qa_pairs.len(),
            total_characters,
            data_types,
            languages,
        }
    }
}

/// Output view of a chunk: the internal source bookkeeping is not part of the
/// corpus document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusChunk {
    pub id: String,
    pub content: String,
    pub data_type: DataType,
    pub language: Language,
    pub extra_data: BTreeMap<String, serde_json::Value>,
}

impl From<&Chunk> for CorpusChunk {
    fn from(chunk: &Chunk) -> Self {
        Self {
            id: chunk.id.clone(),
            content: chunk.content.clone(),
            data_type: chunk.data_type,
            language: chunk.language,
            extra_data: chunk.extra_data.clone(),
        }
    }
}

/// The serialized corpus document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Corpus {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub statistics: CorpusStatistics,
    pub chunks: Vec<CorpusChunk>,
    pub qa_pairs: Vec<QAPair>,
}

impl Corpus {
    /// Assemble the final document. The id is a UUIDv5 over the ordered chunk
    /// ids, so identical input and configuration reproduce an identical
    /// document, id included.
    pub fn assemble(
        name: impl Into<String>,
        description: impl Into<String>,
        chunks: &[Chunk],
        qa_pairs: Vec<QAPair>,
    ) -> Self {
        let statistics = CorpusStatistics::compute(chunks, &qa_pairs);
        let mut id_material = String::new();
        for chunk in chunks {
            id_material.push_str(&chunk.id);
            id_material.push('\n');
        }
        Self {
            id: Uuid::new_v5(&Uuid::NAMESPACE_OID, id_material.as_bytes()),
            name: name.into(),
            description: description.into(),
            statistics,
            chunks: chunks.iter().map(CorpusChunk::from).collect(),
            qa_pairs,
        }
    }
}
