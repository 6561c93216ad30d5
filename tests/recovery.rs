//! End-to-end crash-recovery check against the public API: write through
//! one `WalEngine` handle, drop it, reopen against the same files, and
//! confirm `recovery()` rebuilds the expected state.

use std::sync::Arc;

use tempfile::TempDir;

use tkv_core::catalog::{Catalog, ColumnDef, ColumnType, Schema, TableSpec};
use tkv_core::config::Config;
use tkv_core::engine::wal::WalEngine;
use tkv_core::engine::Engine;
use tkv_core::record::{Record, Value};
use tkv_core::{OpType, Statement};

fn table_spec() -> TableSpec {
    TableSpec {
        name: "accounts".to_string(),
        schema: Schema::new(vec![
            ColumnDef::new("id", ColumnType::I64, true, true),
            ColumnDef::new("balance", ColumnType::I64, true, true),
        ]),
        max_tuple_size: 32,
        indices: vec![vec!["id".to_string()]],
    }
}

fn open_catalog(dir: &TempDir) -> Arc<Catalog> {
    Arc::new(Catalog::open(dir.path(), vec![table_spec()]).unwrap())
}

#[test]
fn writes_survive_a_restart() {
    let dir = TempDir::new().unwrap();
    let mut config = Config::default();
    config.set_fs_path(dir.path());

    let catalog = open_catalog(&dir);
    let schema = Arc::clone(&catalog.table(0).schema);

    {
        let engine = WalEngine::open(Arc::clone(&catalog), config.clone()).unwrap();
        for (id, balance) in [(1, 100), (2, 200), (3, 300)] {
            let record = Record::new(schema.clone(), vec![Value::I64(id), Value::I64(balance)]);
            let stmt = Statement::new(id as u64, OpType::Insert, 0, record, schema.clone());
            engine.insert(stmt).unwrap();
        }
        let withdraw = Record::new(schema.clone(), vec![Value::I64(2), Value::I64(50)]);
        let stmt =
            Statement::new(4, OpType::Update, 0, withdraw, schema.clone()).with_field_ids(vec![1]);
        engine.update(stmt).unwrap();
    }

    let catalog = open_catalog(&dir);
    let engine = WalEngine::open(Arc::clone(&catalog), config).unwrap();
    engine.recovery().unwrap();

    let select = |id: i64| {
        let key = Record::new(schema.clone(), vec![Value::I64(id), Value::Null]);
        let stmt = Statement::new(100, OpType::Select, 0, key, schema.clone());
        engine.select(&stmt).unwrap()
    };

    assert_eq!(select(1), b"1,100".to_vec());
    assert_eq!(select(2), b"2,50".to_vec());
    assert_eq!(select(3), b"3,300".to_vec());
}

#[test]
fn recovery_undoes_the_tail_window() {
    let dir = TempDir::new().unwrap();
    let mut config = Config::default();
    config.set_fs_path(dir.path());
    config.set_active_txn_threshold(10);

    let catalog = open_catalog(&dir);
    let schema = Arc::clone(&catalog.table(0).schema);

    {
        let engine = WalEngine::open(Arc::clone(&catalog), config.clone()).unwrap();
        let record = Record::new(schema.clone(), vec![Value::I64(1), Value::I64(100)]);
        let stmt = Statement::new(1, OpType::Insert, 0, record, schema.clone());
        engine.insert(stmt).unwrap();
    }

    let catalog = open_catalog(&dir);
    let engine = WalEngine::open(Arc::clone(&catalog), config).unwrap();
    engine.recovery().unwrap();

    let key = Record::new(schema.clone(), vec![Value::I64(1), Value::Null]);
    let stmt = Statement::new(100, OpType::Select, 0, key, schema.clone());
    assert!(engine.select(&stmt).unwrap().is_empty());
}
