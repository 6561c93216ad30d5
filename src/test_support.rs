//! Shared fixtures for the engine test modules.

use std::sync::Arc;

use tempfile::TempDir;

use crate::catalog::{Catalog, ColumnDef, ColumnType, Schema, TableSpec};
use crate::config::Config;
use crate::record::{Record, Value};

/// A table `T(id pk, name)` backed by a fresh temp directory.
pub fn open_catalog() -> (TempDir, Arc<Catalog>) {
    let dir = TempDir::new().expect("tempdir");
    let schema = Schema::new(vec![
        ColumnDef::new("id", ColumnType::I64, true, true),
        ColumnDef::new("name", ColumnType::Text, true, false),
    ]);
    let spec = TableSpec {
        name: "t".to_string(),
        schema,
        max_tuple_size: 64,
        indices: vec![vec!["id".to_string()]],
    };
    let catalog = Catalog::open(dir.path(), vec![spec]).expect("open catalog");
    (dir, Arc::new(catalog))
}

/// Reopen the `T(id pk, name)` table at an existing temp directory, as a
/// restart after a crash or clean shutdown would.
pub fn reopen_catalog(dir: &TempDir) -> Arc<Catalog> {
    let schema = Schema::new(vec![
        ColumnDef::new("id", ColumnType::I64, true, true),
        ColumnDef::new("name", ColumnType::Text, true, false),
    ]);
    let spec = TableSpec {
        name: "t".to_string(),
        schema,
        max_tuple_size: 64,
        indices: vec![vec!["id".to_string()]],
    };
    Arc::new(Catalog::open(dir.path(), vec![spec]).expect("reopen catalog"))
}

pub fn config_for(dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.set_fs_path(dir.path());
    config
}

pub fn record(schema: &Arc<crate::catalog::Schema>, id: i64, name: &str) -> Record {
    Record::new(
        Arc::clone(schema),
        vec![Value::I64(id), Value::Text(name.to_string())],
    )
}

/// A table `T(id pk, a, b)`, all columns enabled, for the LSM
/// overlay/merge scenarios.
pub fn open_catalog_ab() -> (TempDir, Arc<Catalog>) {
    let dir = TempDir::new().expect("tempdir");
    let schema = Schema::new(vec![
        ColumnDef::new("id", ColumnType::I64, true, true),
        ColumnDef::new("a", ColumnType::I64, true, true),
        ColumnDef::new("b", ColumnType::I64, true, true),
    ]);
    let spec = TableSpec {
        name: "t".to_string(),
        schema,
        max_tuple_size: 64,
        indices: vec![vec!["id".to_string()]],
    };
    let catalog = Catalog::open(dir.path(), vec![spec]).expect("open catalog");
    (dir, Arc::new(catalog))
}

pub fn record_ab(schema: &Arc<crate::catalog::Schema>, id: i64, a: i64, b: i64) -> Record {
    Record::new(Arc::clone(schema), vec![Value::I64(id), Value::I64(a), Value::I64(b)])
}

/// A table `T(id pk, a, b)` with a secondary index on `a`, for tests that
/// must distinguish primary-index from secondary-index merge behavior.
pub fn open_catalog_ab_secondary() -> (TempDir, Arc<Catalog>) {
    let dir = TempDir::new().expect("tempdir");
    let schema = Schema::new(vec![
        ColumnDef::new("id", ColumnType::I64, true, true),
        ColumnDef::new("a", ColumnType::I64, true, true),
        ColumnDef::new("b", ColumnType::I64, true, true),
    ]);
    let spec = TableSpec {
        name: "t".to_string(),
        schema,
        max_tuple_size: 64,
        indices: vec![vec!["id".to_string()], vec!["a".to_string()]],
    };
    let catalog = Catalog::open(dir.path(), vec![spec]).expect("open catalog");
    (dir, Arc::new(catalog))
}
