use corpus_core::domain::{Chunk, Corpus, DataType, Language, QAPair, SourceInfo};
use jsonschema::JSONSchema;
use serde_json::json;

fn compiled_schema() -> JSONSchema {
    let schema = include_str!("../schemas/corpus.v1.json");
    let schema_json: serde_json::Value = serde_json::from_str(schema).unwrap();
    let schema_static: &'static serde_json::Value = Box::leak(Box::new(schema_json));
    JSONSchema::options().compile(schema_static).unwrap()
}

fn sample_chunk() -> Chunk {
    let mut chunk = Chunk::new(
        "Runoff from the watershed reached the reservoir within six hours.".to_string(),
        DataType::Text,
        Language::En,
        SourceInfo {
            path: "docs/flood_report.txt".to_string(),
            ordinal: 0,
            offset: 0,
        },
    );
    chunk.merge_extra(
        "quality_score",
        json!({
            "overall": 0.74,
            "completeness": 0.8,
            "relevance": 0.9,
            "consistency": 0.7,
            "diversity": 0.56
        }),
    );
    chunk.merge_extra("extracted_terms", json!([{"term": "runoff", "kind": "term", "confidence": 0.9, "domain": "hydrology"}]));
    chunk
}

#[test]
fn assembled_corpus_is_valid() {
    let compiled = compiled_schema();
    let qa = QAPair {
        question: "What is runoff?".to_string(),
        answer: "Runoff from the watershed reached the reservoir within six hours.".to_string(),
        context: "Runoff from the watershed reached the reservoir.".to_string(),
        domain: "hydrology".to_string(),
        confidence: 0.8,
    };
    let corpus = Corpus::assemble("corpus", "test corpus", &[sample_chunk()], vec![qa]);
    let instance = serde_json::to_value(&corpus).unwrap();
    assert!(compiled.is_valid(&instance), "corpus document should validate");
}

#[test]
fn empty_corpus_is_valid() {
    let compiled = compiled_schema();
    let corpus = Corpus::assemble("corpus", "empty corpus", &[], vec![]);
    let instance = serde_json::to_value(&corpus).unwrap();
    assert!(compiled.is_valid(&instance));
}

#[test]
fn out_of_range_quality_score_is_rejected() {
    let compiled = compiled_schema();
    let corpus = Corpus::assemble("corpus", "test corpus", &[sample_chunk()], vec![]);
    let mut instance = serde_json::to_value(&corpus).unwrap();
    instance["chunks"][0]["extra_data"]["quality_score"]["overall"] = json!(1.7);
    assert!(!compiled.is_valid(&instance), "scores above 1.0 should fail");
}

#[test]
fn unknown_data_type_is_rejected() {
    let compiled = compiled_schema();
    let corpus = Corpus::assemble("corpus", "test corpus", &[sample_chunk()], vec![]);
    let mut instance = serde_json::to_value(&corpus).unwrap();
    instance["chunks"][0]["data_type"] = json!("docx");
    assert!(!compiled.is_valid(&instance));
}

#[test]
fn statistics_enumerate_types_and_languages() {
    let corpus = Corpus::assemble("corpus", "test corpus", &[sample_chunk()], vec![]);
    let instance = serde_json::to_value(&corpus).unwrap();
    let data_types = instance["statistics"]["data_types"].as_object().unwrap();
    assert_eq!(data_types.len(), 5);
    assert_eq!(data_types["text"], json!(1));
    let languages = instance["statistics"]["languages"].as_object().unwrap();
    assert_eq!(languages["en"], json!(1));
}
