//! Quick start example for Tessera.
//!
//! Builds a small index from a JSON descriptor, then runs a filtered vector
//! search, a field sort and a count.
//!
//! Run with: RUST_LOG=debug cargo run --example quickstart

use tessera::prelude::*;
use tracing_subscriber::EnvFilter;

const DESCRIPTOR: &str = r#"{
    "CollectionName": "articles",
    "IndexName": "default",
    "VectorIndex": {"IndexType": "flat", "Dimension": 8, "Distance": "cosine"},
    "ScalarIndex": [
        {"FieldName": "lang", "FieldType": "string"},
        {"FieldName": "year", "FieldType": "int64"}
    ]
}"#;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("Tessera Quick Start Example\n");

    let manager = IndexManager::open(DESCRIPTOR)?;

    // Small embeddings for demonstration; real ones are 384-1536 dim
    let documents = [
        (1, "Introduction to Rust programming", "rust", 2019, [0.9, 0.8, 0.1, 0.0, 0.1, 0.0, 0.2, 0.1]),
        (2, "Advanced Rust patterns and idioms", "rust", 2023, [0.85, 0.9, 0.15, 0.05, 0.1, 0.0, 0.25, 0.15]),
        (3, "Python for data science", "python", 2021, [0.1, 0.2, 0.9, 0.85, 0.0, 0.1, 0.0, 0.2]),
        (4, "Machine learning fundamentals", "python", 2020, [0.2, 0.1, 0.7, 0.8, 0.6, 0.7, 0.1, 0.3]),
        (5, "Systems programming with Rust", "rust", 2022, [0.8, 0.7, 0.2, 0.1, 0.15, 0.05, 0.3, 0.2]),
    ];

    println!("Inserting {} documents...", documents.len());
    let batch: Vec<AddDataRequest> = documents
        .iter()
        .map(|(label, _, lang, year, embedding)| {
            AddDataRequest::new(*label, embedding.to_vec())
                .with_fields(format!(r#"{{"lang": "{}", "year": {}}}"#, lang, year))
        })
        .collect();
    manager.add_data(&batch)?;
    println!("Index contains {} rows\n", manager.data_num());

    let title = |label: u64| {
        documents
            .iter()
            .find(|d| d.0 == label)
            .map(|d| d.1)
            .unwrap_or("Unknown")
    };

    let query = vec![0.88, 0.85, 0.12, 0.03, 0.12, 0.02, 0.22, 0.12];
    println!("Rust articles similar to 'Rust programming':");
    let request = SearchRequest::new(query, 3)
        .with_dsl(r#"{"op": "must", "field": "lang", "conds": ["rust"]}"#);
    let result = manager.search(&request)?;
    println!("{:-<60}", "");
    for (rank, (label, score)) in result.labels.iter().zip(&result.scores).enumerate() {
        println!("  {}. [{}] {} (score: {:.4})", rank + 1, label, title(*label), score);
    }
    println!("{:-<60}\n", "");

    println!("Newest two articles:");
    let request = SearchRequest::dsl_only(r#"{"op": "sort", "field": "year", "topk": 2}"#);
    let result = manager.search(&request)?;
    for (label, year) in result.labels.iter().zip(&result.scores) {
        println!("  [{}] {} ({})", label, title(*label), year);
    }

    let request = SearchRequest::dsl_only(r#"{"op": "count", "field": "lang"}"#);
    if let Some(counts) = manager.search(&request)?.extra_json {
        println!("\nArticles per language: {}", serde_json::Value::Object(counts));
    }

    println!("\nDone!");
    Ok(())
}
