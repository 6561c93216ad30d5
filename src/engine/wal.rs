//! The write-ahead-logging engine (spec §4.1).
//!
//! Every mutating call appends a textual log record, applies the change
//! to the table's `fs_data` in place, and updates `off_map` for every
//! index. Grounded on `rdms`'s own `wal.rs` group-commit/journal
//! discipline, simplified to the spec's single-log, single-writer model.

use std::sync::Arc;

use log::{debug, info};

use crate::catalog::{Catalog, TableId};
use crate::config::Config;
use crate::engine::{Engine, EngineKind, Outcome};
use crate::error::Result;
use crate::gc_thread::GcThread;
use crate::keys::index_key;
use crate::log::TxnLog;
use crate::record::Record;
use crate::recovery::{self, LoggedOp};
use crate::statement::{OpType, Statement};

pub struct WalEngine {
    catalog: Arc<Catalog>,
    log: Arc<TxnLog>,
    config: Config,
    _gc: Option<GcThread>,
}

impl WalEngine {
    pub fn open(catalog: Arc<Catalog>, config: Config) -> Result<WalEngine> {
        let log = Arc::new(TxnLog::open(&config.fs_path.join("log"))?);
        let gc = if config.read_only {
            None
        } else {
            let gc_log = Arc::clone(&log);
            Some(GcThread::spawn(config.gc_interval, move || {
                if let Err(err) = gc_log.sync() {
                    log::error!("wal group commit sync failed: {}", err);
                }
            }))
        };
        info!("wal engine opened at {}", config.fs_path.display());
        Ok(WalEngine {
            catalog,
            log,
            config,
            _gc: gc,
        })
    }

    fn format_line(&self, txn_id: u64, op: &str, table_id: TableId, tuples: &[&str]) -> String {
        format!("{} {} {} {}", txn_id, op, table_id, tuples.join(" "))
    }
}

impl Drop for WalEngine {
    /// Joins the group-commit thread before syncing and closing the log
    /// and every table's `fs_data` (spec §4.1). `config.recovery` skips
    /// closing the log, since recovery owns that file's lifecycle instead.
    fn drop(&mut self) {
        self._gc.take();
        if !self.config.recovery {
            if let Err(err) = self.log.close() {
                log::error!("wal engine log close failed on drop: {}", err);
            }
        }
        for table in &self.catalog.tables {
            if let Err(err) = table.fs_data.close() {
                log::error!("wal engine fs_data close failed on drop: {}", err);
            }
        }
    }
}

impl Engine for WalEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Wal
    }

    fn select(&self, statement: &Statement) -> Result<Vec<u8>> {
        let table = self.catalog.table(statement.table_id);
        let index = &table.indices[statement.table_index_id];
        let key = index_key(&statement.record, index);

        let offset = match index.off_map.read()?.get(&key) {
            Some(offset) => *offset,
            None => return Ok(Vec::new()),
        };
        let bytes = table.fs_data.at(offset)?;
        let text = String::from_utf8_lossy(&bytes);
        let rec = Record::deserialize(Arc::clone(&table.schema), &text)?;
        Ok(rec.project(&statement.projection))
    }

    fn insert(&self, statement: Statement) -> Result<Outcome> {
        let table = self.catalog.table(statement.table_id);
        let key0 = index_key(&statement.record, table.primary_index());

        if table.primary_index().off_map.read()?.contains_key(&key0) {
            return Ok(Outcome::NoOp);
        }

        let tuple = statement.record.serialize();
        let line = self.format_line(
            statement.transaction_id,
            "Insert",
            statement.table_id,
            &[&tuple],
        );
        self.log.push_back(&line)?;

        let storage_offset = table.fs_data.push_back(tuple.as_bytes())?;
        for index in &table.indices {
            let key = index_key(&statement.record, index);
            index.off_map.write()?.insert(key, storage_offset);
        }
        debug!("wal insert table={} offset={}", statement.table_id, storage_offset);
        Ok(Outcome::Applied)
    }

    fn update(&self, statement: Statement) -> Result<Outcome> {
        let table = self.catalog.table(statement.table_id);
        let key0 = index_key(&statement.record, table.primary_index());

        let storage_offset = match table.primary_index().off_map.read()?.get(&key0) {
            Some(offset) => *offset,
            None => return Ok(Outcome::NoOp),
        };

        let before_bytes = table.fs_data.at(storage_offset)?;
        let before_text = String::from_utf8_lossy(&before_bytes).into_owned();
        let before_rec = Record::deserialize(Arc::clone(&table.schema), &before_text)?;

        let mut after_rec = before_rec.clone();
        for &field_id in &statement.field_ids {
            after_rec.set_data(field_id, &statement.record);
        }
        let after_text = after_rec.serialize();

        let line = self.format_line(
            statement.transaction_id,
            "Update",
            statement.table_id,
            &[&before_text, &after_text],
        );
        self.log.push_back(&line)?;

        table.fs_data.update(storage_offset, after_text.as_bytes())?;
        Ok(Outcome::Applied)
    }

    fn remove(&self, statement: Statement) -> Result<Outcome> {
        let table = self.catalog.table(statement.table_id);
        let key0 = index_key(&statement.record, table.primary_index());

        let storage_offset = match table.primary_index().off_map.read()?.get(&key0) {
            Some(offset) => *offset,
            None => return Ok(Outcome::NoOp),
        };

        let before_bytes = table.fs_data.at(storage_offset)?;
        let before_text = String::from_utf8_lossy(&before_bytes).into_owned();
        let before_rec = Record::deserialize(Arc::clone(&table.schema), &before_text)?;

        let line = self.format_line(
            statement.transaction_id,
            "Delete",
            statement.table_id,
            &[&before_text],
        );
        self.log.push_back(&line)?;

        for index in &table.indices {
            let key = index_key(&before_rec, index);
            index.off_map.write()?.remove(&key);
        }
        Ok(Outcome::Applied)
    }

    fn recovery(&self) -> Result<()> {
        recovery::run(self, &self.catalog, &self.log, &self.config)
    }
}

pub(crate) fn apply_logged(
    engine: &WalEngine,
    table_id: TableId,
    op: LoggedOp,
    record: Record,
) -> Result<()> {
    let projection = Arc::clone(&engine.catalog.table(table_id).schema);
    match op {
        LoggedOp::Insert => {
            let statement = Statement::new(0, OpType::Insert, table_id, record, projection);
            engine.insert(statement)?;
        }
        LoggedOp::Delete => {
            let statement = Statement::new(0, OpType::Delete, table_id, record, projection);
            engine.remove(statement)?;
        }
        LoggedOp::Update => unreachable!("update is expanded into remove+insert by recovery"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support;

    #[test]
    fn insert_select_delete() {
        let (dir, catalog) = test_support::open_catalog();
        let config = test_support::config_for(&dir);
        let schema = Arc::clone(&catalog.table(0).schema);
        let engine = WalEngine::open(catalog, config).unwrap();

        let rec = test_support::record(&schema, 1, "A");
        let projection = Arc::new(schema.projected(&["name"]));
        let stmt = Statement::new(1, OpType::Insert, 0, rec.clone(), Arc::clone(&projection));
        assert_eq!(engine.insert(stmt).unwrap(), Outcome::Applied);

        // Only the primary-key column is read when computing the lookup
        // key, so the same record serves as the statement's key carrier.
        let stmt = Statement::new(2, OpType::Select, 0, rec.clone(), Arc::clone(&projection));
        assert_eq!(engine.select(&stmt).unwrap(), b"A".to_vec());

        let stmt = Statement::new(3, OpType::Delete, 0, rec.clone(), Arc::clone(&projection));
        assert_eq!(engine.remove(stmt).unwrap(), Outcome::Applied);

        let stmt = Statement::new(4, OpType::Select, 0, rec, projection);
        assert!(engine.select(&stmt).unwrap().is_empty());
    }

    #[test]
    fn update_in_place_preserves_slot_count() {
        let (dir, catalog) = test_support::open_catalog();
        let config = test_support::config_for(&dir);
        let schema = Arc::clone(&catalog.table(0).schema);
        let engine = WalEngine::open(Arc::clone(&catalog), config).unwrap();

        let rec = test_support::record(&schema, 7, "X");
        let projection = Arc::new(schema.projected(&["name"]));
        engine
            .insert(Statement::new(1, OpType::Insert, 0, rec.clone(), Arc::clone(&projection)))
            .unwrap();

        let update_rec = test_support::record(&schema, 7, "Y");
        let stmt = Statement::new(2, OpType::Update, 0, update_rec, Arc::clone(&projection))
            .with_field_ids(vec![1]);
        assert_eq!(engine.update(stmt).unwrap(), Outcome::Applied);

        let stmt = Statement::new(3, OpType::Select, 0, rec, projection);
        assert_eq!(engine.select(&stmt).unwrap(), b"Y".to_vec());

        assert_eq!(catalog.table(0).fs_data.slot_count(), 1);
    }

    #[test]
    fn duplicate_insert_is_noop() {
        let (dir, catalog) = test_support::open_catalog();
        let config = test_support::config_for(&dir);
        let schema = Arc::clone(&catalog.table(0).schema);
        let engine = WalEngine::open(catalog, config).unwrap();

        let projection = Arc::new(schema.projected(&["name"]));
        let rec = test_support::record(&schema, 1, "A");
        engine
            .insert(Statement::new(1, OpType::Insert, 0, rec.clone(), Arc::clone(&projection)))
            .unwrap();
        let outcome = engine
            .insert(Statement::new(2, OpType::Insert, 0, rec, projection))
            .unwrap();
        assert_eq!(outcome, Outcome::NoOp);
    }

    #[test]
    fn update_on_missing_key_is_noop() {
        let (dir, catalog) = test_support::open_catalog();
        let config = test_support::config_for(&dir);
        let schema = Arc::clone(&catalog.table(0).schema);
        let engine = WalEngine::open(catalog, config).unwrap();

        let projection = Arc::new(schema.projected(&["name"]));
        let rec = test_support::record(&schema, 1, "A");
        let outcome = engine
            .update(Statement::new(1, OpType::Update, 0, rec, projection).with_field_ids(vec![1]))
            .unwrap();
        assert_eq!(outcome, Outcome::NoOp);
    }
}
