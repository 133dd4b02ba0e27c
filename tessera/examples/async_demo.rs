//! Async API demo using AsyncIndexManager.
//!
//! Run with: cargo run --example async_demo --features async

#[cfg(feature = "async")]
use tessera::prelude::*;
#[cfg(feature = "async")]
use tessera::AsyncIndexManager;

#[cfg(feature = "async")]
#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    println!("Async Tessera Demo\n");

    let temp_dir = std::env::temp_dir().join("tessera_async_demo");
    let _ = std::fs::remove_dir_all(&temp_dir);

    let manager = AsyncIndexManager::open(
        r#"{"VectorIndex": {"IndexType": "flat", "Dimension": 64, "Distance": "cosine"},
            "ScalarIndex": [{"FieldName": "parity", "FieldType": "string"}]}"#
            .to_string(),
    )
    .await
    .expect("Failed to create index");

    // Write batches concurrently; each holds the write lock for its batch
    println!("Inserting 1000 rows in 10 concurrent batches...");
    let start = std::time::Instant::now();
    let mut handles = vec![];
    for chunk in 0..10u64 {
        let manager = manager.clone();
        handles.push(tokio::spawn(async move {
            let batch = (chunk * 100..(chunk + 1) * 100)
                .map(|i| {
                    let vector: Vec<f32> = (0..64).map(|j| ((i * 64 + j) as f32).sin()).collect();
                    let parity = if i % 2 == 0 { "even" } else { "odd" };
                    AddDataRequest::new(i, vector).with_fields(format!(r#"{{"parity": "{}"}}"#, parity))
                })
                .collect();
            manager.add_data(batch).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }
    println!("   [OK] Inserted in {:?}", start.elapsed());
    println!("   Total rows: {}\n", manager.inner().data_num());

    let query: Vec<f32> = (0..64).map(|i| (i as f32 * 0.1).cos()).collect();
    let request = SearchRequest::new(query, 5)
        .with_dsl(r#"{"op": "must", "field": "parity", "conds": ["odd"]}"#);
    let result = manager.search(request).await.unwrap();
    println!("Top 5 odd rows:");
    for (i, (label, score)) in result.labels.iter().zip(&result.scores).enumerate() {
        println!("     {}. label {} (score: {:.4})", i + 1, label, score);
    }

    let ts = manager.dump(temp_dir.clone()).await.unwrap();
    println!("\nDumped at timestamp {}", ts);
    let _ = std::fs::remove_dir_all(&temp_dir);

    println!("\nAsync demo complete!");
}

#[cfg(not(feature = "async"))]
fn main() {
    println!("Run with: cargo run --example async_demo --features async");
}
