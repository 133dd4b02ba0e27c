//! Persistence demonstration for Tessera.
//!
//! This example shows how to:
//! 1. Build an index and dump it
//! 2. Reopen it from the dump directory (simulating restart)
//! 3. Keep writing and dump again
//! 4. Store raw rows in a durable KV store next to the index

use std::fs;
use std::sync::Arc;

use tessera::prelude::*;
use tessera::{DurableStoreConfig, StorageOp};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let root = std::env::temp_dir().join("tessera_persistence_demo");
    let index_dir = root.join("index");
    let kv_dir = root.join("rows");
    let _ = fs::remove_dir_all(&root);

    println!("Tessera Persistence Demo\n");

    let schema = Arc::new(Schema::new(vec![
        FieldDef::new("title", 0, FieldType::String),
        FieldDef::new("tags", 1, FieldType::ListString),
    ])?);
    let codec = BytesRow::new(Arc::clone(&schema));

    println!("Phase 1: building index and row store...");
    let first_timestamp = {
        let manager = IndexManager::open(
            r#"{"VectorIndex": {"IndexType": "flat", "Dimension": 4, "Distance": "l2"},
                "ScalarIndex": [{"FieldName": "tag", "FieldType": "string"}]}"#,
        )?;
        let store = DurableStore::open(&kv_dir, DurableStoreConfig::default())?;

        let docs = [
            (1u64, "Rust basics", vec!["rust", "intro"], [0.9, 0.1, 0.0, 0.0]),
            (2, "Bitmap indexes", vec!["search"], [0.1, 0.9, 0.0, 0.0]),
            (3, "Vector recall", vec!["search", "ml"], [0.0, 0.2, 0.8, 0.0]),
        ];
        let mut batch = Vec::new();
        let mut ops = Vec::new();
        for (label, title, tags, vector) in &docs {
            let fields = serde_json::json!({ "tag": tags }).to_string();
            batch.push(AddDataRequest::new(*label, vector.to_vec()).with_fields(fields));

            let row = codec.serialize(&[
                FieldValue::from(*title),
                FieldValue::ListString(tags.iter().map(|t| t.to_string()).collect()),
            ])?;
            ops.push(StorageOp::put(label.to_be_bytes().to_vec(), row));
        }
        manager.add_data(&batch)?;
        store.exec_op(&ops)?;

        let ts = manager.dump(&index_dir)?;
        println!("   [OK] dumped {} rows at timestamp {}", manager.data_num(), ts);
        ts
    };

    println!("\nPhase 2: reopening from {}...", index_dir.display());
    {
        let manager = IndexManager::open(&index_dir.to_string_lossy())?;
        assert_eq!(manager.get_state().update_timestamp, first_timestamp);
        println!("   [OK] {} rows restored", manager.data_num());

        let request = SearchRequest::new(vec![0.0, 1.0, 0.0, 0.0], 5)
            .with_dsl(r#"{"op": "must", "field": "tag", "conds": ["search"]}"#);
        let result = manager.search(&request)?;
        println!("   'search' rows nearest to the query: {:?}", result.labels);

        manager.delete_data(&[DeleteDataRequest::new(2).with_old_fields(r#"{"tag": ["search"]}"#)])?;
        let ts = manager.dump(&index_dir)?;
        println!("   [OK] deleted label 2, dumped again at timestamp {}", ts);
    }

    println!("\nPhase 3: reading rows back from the KV store...");
    {
        let store = DurableStore::open(&kv_dir, DurableStoreConfig::default())?;
        for (key, row) in store.seek_range(&[], &[0xff; 8]) {
            let label = u64::from_be_bytes(key.as_slice().try_into().unwrap_or([0; 8]));
            println!(
                "   label {}: {:?} {:?}",
                label,
                codec.deserialize_field(&row, "title"),
                codec.deserialize_field(&row, "tags")
            );
        }
    }

    let _ = fs::remove_dir_all(&root);
    println!("\nPersistence demo complete!");
    Ok(())
}
