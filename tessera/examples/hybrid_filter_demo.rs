//! Hybrid dense/sparse recall combined with scalar filters.
//!
//! Run with: cargo run --example hybrid_filter_demo

use rand::{Rng, SeedableRng};
use tessera::prelude::*;
use tracing_subscriber::EnvFilter;

const DIM: usize = 16;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let meta = ManagerMeta::new(VectorIndexMeta::flat(DIM as u64, DistanceMetric::InnerProduct).with_sparse(0.3))
        .with_names("files", "hybrid")
        .with_scalar_fields(vec![
            ScalarFieldMeta::new("dir", ScalarFieldKind::Path),
            ScalarFieldMeta::new("size", ScalarFieldKind::Int64),
            ScalarFieldMeta::new("score", ScalarFieldKind::Float32),
            ScalarFieldMeta::new("kind", ScalarFieldKind::String),
        ]);
    let manager = IndexManager::from_meta(meta)?;

    let dirs = ["/src", "/src/query", "/src/vector", "/docs", "/docs/api"];
    let kinds = ["code", "text"];
    let terms = ["bitmap", "recall", "sparse", "filter", "dump"];
    let mut rng = rand::rngs::StdRng::seed_from_u64(7);

    let batch: Vec<AddDataRequest> = (0..200u64)
        .map(|label| {
            let vector: Vec<f32> = (0..DIM).map(|_| rng.gen_range(-1.0..1.0)).collect();
            let term = terms[label as usize % terms.len()];
            AddDataRequest::new(label, vector)
                .with_sparse(vec![term.to_string()], vec![rng.gen_range(0.1..1.0)])
                .with_fields(format!(
                    r#"{{"dir": "{}", "size": {}, "score": {:.3}, "kind": "{}"}}"#,
                    dirs[label as usize % dirs.len()],
                    rng.gen_range(1..10_000),
                    rng.gen_range(0.0..1.0f32),
                    kinds[label as usize % kinds.len()],
                ))
        })
        .collect();
    manager.add_data(&batch)?;
    println!("Indexed {} rows\n", manager.data_num());

    let query: Vec<f32> = (0..DIM).map(|i| (i as f32 * 0.3).sin()).collect();

    println!("Code under /src (any depth), at most 4 KB, hybrid scored on 'bitmap':");
    let request = SearchRequest::new(query.clone(), 5)
        .with_sparse(vec!["bitmap".into()], vec![1.0])
        .with_dsl(
            r#"{"op": "and", "conds": [
                {"op": "must", "field": "dir", "conds": ["/src"]},
                {"op": "must", "field": "kind", "conds": ["code"]},
                {"op": "range", "field": "size", "lte": 4096}
            ]}"#,
        );
    print_hits(&manager.search(&request)?);

    println!("\nDirect children of /docs only, excluding /docs/api:");
    let request = SearchRequest::new(query.clone(), 5).with_dsl(
        r#"{"op": "and", "conds": [
            {"op": "must", "field": "dir", "conds": ["/docs"], "para": "-d=0"},
            {"op": "must_not", "field": "dir", "conds": ["/docs/api"]}
        ]}"#,
    );
    print_hits(&manager.search(&request)?);

    println!("\nScores closest to 0.5:");
    let request = SearchRequest::dsl_only(
        r#"{"op": "sort", "type": "center1d", "field": "score", "center": 0.5, "topk": 3}"#,
    );
    print_hits(&manager.search(&request)?);

    println!("\nRows per (dir, kind) with more than 15 entries:");
    let request = SearchRequest::dsl_only(
        r#"{"counter": {"op": "count", "field": ["dir", "kind"], "gt": 15}}"#,
    );
    if let Some(counts) = manager.search(&request)?.extra_json {
        for (key, count) in counts {
            println!("  {:<20} {}", key, count);
        }
    }

    Ok(())
}

fn print_hits(result: &SearchResult) {
    for (label, score) in result.labels.iter().zip(&result.scores) {
        println!("  label {:>4}  score {:.4}", label, score);
    }
    if result.result_num == 0 {
        println!("  (no hits)");
    }
}
