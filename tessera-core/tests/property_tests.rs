use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use proptest::prelude::*;
use tessera_core::distance::{dot_product, euclidean_distance_squared};
use tessera_core::{
    AddDataRequest, BytesRow, DeleteDataRequest, DurableStore, DurableStoreConfig, FieldDef,
    FieldType, FieldValue, IndexManager, KvStore, Schema, StorageOp, VolatileStore,
};

static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

fn temp_store_path() -> std::path::PathBuf {
    let id = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
    let dir = std::env::temp_dir()
        .join("tessera_test_prop")
        .join(format!("kv_{}_{}", std::process::id(), id));
    let _ = std::fs::remove_dir_all(&dir);
    dir
}

const ROW_TYPES: [FieldType; 9] = [
    FieldType::Int64,
    FieldType::UInt64,
    FieldType::Float32,
    FieldType::Bool,
    FieldType::String,
    FieldType::Binary,
    FieldType::ListInt64,
    FieldType::ListString,
    FieldType::ListFloat32,
];

/// One field per type; an absent default means the type's zero value.
fn row_schema(defaults: &[FieldValue]) -> Arc<Schema> {
    let defs = ROW_TYPES
        .iter()
        .zip(defaults)
        .enumerate()
        .map(|(id, (ty, default))| {
            FieldDef::new(format!("f{}", id), id as i64, *ty).with_default(default.clone())
        })
        .collect();
    Arc::new(Schema::new(defs).unwrap())
}

fn value_of(ty: FieldType) -> BoxedStrategy<FieldValue> {
    match ty {
        FieldType::Int64 => any::<i64>().prop_map(FieldValue::Int64).boxed(),
        FieldType::UInt64 => any::<u64>().prop_map(FieldValue::UInt64).boxed(),
        FieldType::Float32 => (-1.0e6f32..1.0e6f32).prop_map(FieldValue::Float32).boxed(),
        FieldType::Bool => any::<bool>().prop_map(FieldValue::Bool).boxed(),
        FieldType::String => ".{0,40}".prop_map(FieldValue::String).boxed(),
        FieldType::Binary => proptest::collection::vec(any::<u8>(), 0..64)
            .prop_map(FieldValue::Binary)
            .boxed(),
        FieldType::ListInt64 => proptest::collection::vec(any::<i64>(), 0..16)
            .prop_map(FieldValue::ListInt64)
            .boxed(),
        FieldType::ListString => proptest::collection::vec(".{0,12}", 0..8)
            .prop_map(FieldValue::ListString)
            .boxed(),
        FieldType::ListFloat32 => proptest::collection::vec(-1.0e3f32..1.0e3f32, 0..16)
            .prop_map(FieldValue::ListFloat32)
            .boxed(),
    }
}

/// One value per schema field, each present or absent.
fn row_values() -> impl Strategy<Value = Vec<FieldValue>> {
    ROW_TYPES
        .iter()
        .map(|ty| {
            prop_oneof![
                1 => Just(FieldValue::Absent),
                3 => value_of(*ty),
            ]
        })
        .collect::<Vec<_>>()
}

#[derive(Debug, Clone)]
enum KvOp {
    Put(Vec<u8>, Vec<u8>),
    Delete(Vec<u8>),
    Batch(Vec<(Vec<u8>, Option<Vec<u8>>)>),
    Clear,
}

fn small_key() -> impl Strategy<Value = Vec<u8>> {
    proptest::collection::vec(0u8..4, 1..3)
}

fn kv_op() -> impl Strategy<Value = KvOp> {
    prop_oneof![
        4 => (small_key(), proptest::collection::vec(any::<u8>(), 0..8))
            .prop_map(|(k, v)| KvOp::Put(k, v)),
        2 => small_key().prop_map(KvOp::Delete),
        2 => proptest::collection::vec(
            (small_key(), proptest::option::of(proptest::collection::vec(any::<u8>(), 0..4))),
            1..5
        )
        .prop_map(KvOp::Batch),
        1 => Just(KvOp::Clear),
    ]
}

fn apply(store: &dyn KvStore, op: &KvOp) {
    match op {
        KvOp::Put(k, v) => store.put(&[k.clone()], &[v.clone()]).unwrap(),
        KvOp::Delete(k) => store.delete(&[k.clone()]).unwrap(),
        KvOp::Batch(items) => {
            let ops: Vec<StorageOp> = items
                .iter()
                .map(|(k, v)| match v {
                    Some(v) => StorageOp::put(k.clone(), v.clone()),
                    None => StorageOp::delete(k.clone()),
                })
                .collect();
            store.exec_op(&ops).unwrap();
        }
        KvOp::Clear => store.clear().unwrap(),
    }
}

proptest! {
    #[test]
    fn test_dot_product_matches_naive(
        // Constrain to typical normalized embedding range [-1.0, 1.0]
        a in proptest::collection::vec(-1.0f32..1.0f32, 0..100),
        b in proptest::collection::vec(-1.0f32..1.0f32, 0..100)
    ) {
        let len = std::cmp::min(a.len(), b.len());
        let a = &a[..len];
        let b = &b[..len];

        let optim = dot_product(a, b);
        let naive: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();

        prop_assert!((optim - naive).abs() < 1e-4);
    }

    #[test]
    fn test_euclidean_matches_naive(
        a in proptest::collection::vec(-1.0f32..1.0f32, 0..100),
        b in proptest::collection::vec(-1.0f32..1.0f32, 0..100)
    ) {
        let len = std::cmp::min(a.len(), b.len());
        let a = &a[..len];
        let b = &b[..len];

        let optim = euclidean_distance_squared(a, b);
        let naive: f32 = a.iter()
            .zip(b.iter())
            .map(|(x, y)| {
                let diff = x - y;
                diff * diff
            })
            .sum();

        prop_assert!((optim - naive).abs() < 1e-3);
    }

    #[test]
    fn test_row_roundtrip(defaults in row_values(), values in row_values()) {
        let codec = BytesRow::new(row_schema(&defaults));
        let buf = codec.serialize(&values).unwrap();

        let expected: Vec<FieldValue> = values
            .iter()
            .zip(&defaults)
            .zip(ROW_TYPES.iter())
            .map(|((v, default), ty)| match (v.is_absent(), default.is_absent()) {
                (false, _) => v.clone(),
                (true, false) => default.clone(),
                (true, true) => ty.zero_value(),
            })
            .collect();
        prop_assert_eq!(codec.deserialize_values(&buf), expected);
    }

    #[test]
    fn test_row_truncation_never_panics(
        defaults in row_values(),
        values in row_values(),
        cut in any::<prop::sample::Index>()
    ) {
        let codec = BytesRow::new(row_schema(&defaults));
        let buf = codec.serialize(&values).unwrap();
        let truncated = &buf[..cut.index(buf.len() + 1)];

        let decoded = codec.deserialize_values(truncated);
        prop_assert_eq!(decoded.len(), ROW_TYPES.len());
        for (value, ty) in decoded.iter().zip(ROW_TYPES.iter()) {
            prop_assert!(value.fits(*ty), "{:?} does not fit {:?}", value, ty);
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn test_label_offset_invariant(
        ops in proptest::collection::vec((any::<bool>(), 0u64..20), 1..60)
    ) {
        let manager = IndexManager::open(
            r#"{"VectorIndex": {"IndexType": "flat", "Dimension": 2},
                "ScalarIndex": [{"FieldName": "k", "FieldType": "int64"}]}"#,
        ).unwrap();
        let mut live = BTreeSet::new();

        for (insert, label) in ops {
            if insert {
                let request = AddDataRequest::new(label, vec![label as f32, 1.0])
                    .with_fields(format!(r#"{{"k": {}}}"#, label));
                manager.add_data(&[request]).unwrap();
                live.insert(label);
            } else {
                let request = DeleteDataRequest::new(label)
                    .with_old_fields(format!(r#"{{"k": {}}}"#, label));
                manager.delete_data(&[request]).unwrap();
                live.remove(&label);
            }
        }

        prop_assert_eq!(manager.data_num(), live.len() as u64);
        for label in 0..20u64 {
            match manager.offset_by_label(label) {
                Some(offset) => {
                    prop_assert!(live.contains(&label));
                    prop_assert_eq!(manager.label_by_offset(offset), Some(label));
                }
                None => prop_assert!(!live.contains(&label)),
            }
        }
    }

    #[test]
    fn test_kv_backends_agree(ops in proptest::collection::vec(kv_op(), 1..30)) {
        let path = temp_store_path();
        let durable = DurableStore::open(&path, DurableStoreConfig::default()).unwrap();
        let volatile = VolatileStore::new();

        for op in &ops {
            apply(&durable, op);
            apply(&volatile, op);
        }

        let full_durable = durable.seek_range(&[], &[0xff]);
        prop_assert_eq!(&full_durable, &volatile.seek_range(&[], &[0xff]));
        prop_assert_eq!(
            durable.seek_range(&[1], &[2, 2]),
            volatile.seek_range(&[1], &[2, 2])
        );
        let keys: Vec<Vec<u8>> = vec![vec![0], vec![1, 1], vec![3, 3], vec![9]];
        prop_assert_eq!(durable.get(&keys), volatile.get(&keys));

        drop(durable);
        let reopened = DurableStore::open(&path, DurableStoreConfig::default()).unwrap();
        prop_assert_eq!(reopened.seek_range(&[], &[0xff]), full_durable);

        let _ = std::fs::remove_dir_all(&path);
    }
}
