//! The log-structured-merge engine (spec §4.2).
//!
//! Mutations land only in the log and the volatile `pm_map`; `fs_data`
//! and `off_map` are updated only by `merge`. Grounded on the same
//! `rdms`-style group-commit discipline as the WAL engine, plus a
//! second engine-local `RwLock` around merge so a reader always sees
//! either the pre- or post-merge state of a table.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use log::{debug, info};

use crate::catalog::{Catalog, TableId};
use crate::config::Config;
use crate::engine::{Engine, EngineKind, Outcome};
use crate::error::Result;
use crate::gc_thread::GcThread;
use crate::keys::index_key;
use crate::log::TxnLog;
use crate::record::Record;
use crate::statement::Statement;

pub struct LsmEngine {
    catalog: Arc<Catalog>,
    log: Arc<TxnLog>,
    config: Config,
    /// Guards merge vs. mutators; mutators and selects hold the reader
    /// side, `merge` takes the writer side.
    merge_lock: RwLock<()>,
    merge_looper: AtomicU64,
    _gc: Option<GcThread>,
}

impl LsmEngine {
    pub fn open(catalog: Arc<Catalog>, config: Config) -> Result<LsmEngine> {
        let log = Arc::new(TxnLog::open(&config.fs_path.join("log"))?);
        let gc_log = Arc::clone(&log);
        let gc = if config.read_only {
            None
        } else {
            Some(GcThread::spawn(config.gc_interval, move || {
                if let Err(err) = gc_log.sync() {
                    log::error!("lsm group commit sync failed: {}", err);
                }
            }))
        };
        info!("lsm engine opened at {}", config.fs_path.display());
        Ok(LsmEngine {
            catalog,
            log,
            config,
            merge_lock: RwLock::new(()),
            merge_looper: AtomicU64::new(0),
            _gc: gc,
        })
    }

    fn format_line(&self, txn_id: u64, op: &str, table_id: TableId, tuples: &[&str]) -> String {
        format!("{} {} {} {}", txn_id, op, table_id, tuples.join(" "))
    }

    /// Fold a storage record with its `pm_map` overlay, honoring each
    /// column's `enabled` flag (spec §4.2 Select). Used only for reads.
    fn fold_enabled_only(storage: &mut Record, memory: &Record) {
        let enabled: Vec<usize> = storage
            .schema()
            .columns
            .iter()
            .enumerate()
            .filter(|(_, col)| col.enabled)
            .map(|(i, _)| i)
            .collect();
        for i in enabled {
            storage.set_data(i, memory);
        }
    }

    /// Fold every column regardless of `enabled` (spec §4.2 Merge). The
    /// asymmetry against `fold_enabled_only` is intentional and preserved
    /// from the source.
    fn fold_all_columns(storage: &mut Record, memory: &Record) {
        let n = storage.schema().columns.len();
        for i in 0..n {
            storage.set_data(i, memory);
        }
    }

    /// Run the merge protocol for every table, honoring `force`/`merge_ratio`
    /// (spec §4.2 Merge protocol). Takes the writer side of `merge_lock`.
    ///
    /// Only the primary index's `pm_map` is folded into `fs_data`/`off_map`;
    /// every other index's `pm_map` is drained without touching its
    /// `off_map`, matching the source exactly.
    pub fn merge(&self, force: bool) -> Result<()> {
        let _guard = self.merge_lock.write()?;
        for table in &self.catalog.tables {
            let primary = table.primary_index();
            let pm_size = primary.pm_map.read()?.len();
            let off_size = primary.off_map.read()?.len();
            let should = force || (pm_size as f64) > self.config.merge_ratio * (off_size as f64);
            if should {
                let entries: Vec<(u64, Record)> = primary
                    .pm_map
                    .read()?
                    .iter()
                    .map(|(k, v)| (*k, v.clone()))
                    .collect();
                for (key, pm_rec) in &entries {
                    let existing_offset = primary.off_map.read()?.get(key).copied();
                    if let Some(existing_offset) = existing_offset {
                        let bytes = table.fs_data.at(existing_offset)?;
                        let text = String::from_utf8_lossy(&bytes).into_owned();
                        let mut storage_rec = Record::deserialize(Arc::clone(&table.schema), &text)?;
                        Self::fold_all_columns(&mut storage_rec, pm_rec);
                        let new_bytes = storage_rec.serialize();
                        table.fs_data.update(existing_offset, new_bytes.as_bytes())?;
                    } else {
                        let bytes = pm_rec.serialize();
                        let storage_offset = table.fs_data.push_back(bytes.as_bytes())?;
                        primary.off_map.write()?.insert(*key, storage_offset);
                    }
                }
                debug!(
                    "lsm merge table={} index entries={}",
                    table.name,
                    entries.len()
                );
                for index in &table.indices {
                    index.pm_map.write()?.clear();
                }
            }
        }
        self.merge_looper.store(0, Ordering::SeqCst);
        Ok(())
    }

    fn maybe_merge_after_txn_end(&self) -> Result<()> {
        let count = self.merge_looper.fetch_add(1, Ordering::SeqCst) + 1;
        if self.config.merge_interval > 0 && count % self.config.merge_interval == 0 {
            self.merge(false)?;
        }
        Ok(())
    }
}

impl Drop for LsmEngine {
    /// Joins the group-commit thread, forces a final merge, then syncs
    /// and closes the log and every table's `fs_data` (spec §4.2: merge
    /// is invoked forcibly at shutdown).
    fn drop(&mut self) {
        self._gc.take();
        if let Err(err) = self.merge(true) {
            log::error!("lsm engine merge on drop failed: {}", err);
        }
        if let Err(err) = self.log.close() {
            log::error!("lsm engine log close failed on drop: {}", err);
        }
        for table in &self.catalog.tables {
            if let Err(err) = table.fs_data.close() {
                log::error!("lsm engine fs_data close failed on drop: {}", err);
            }
        }
    }
}

impl Engine for LsmEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Lsm
    }

    fn select(&self, statement: &Statement) -> Result<Vec<u8>> {
        let _guard = self.merge_lock.read()?;
        let table = self.catalog.table(statement.table_id);
        let index = &table.indices[statement.table_index_id];
        let key = index_key(&statement.record, index);

        let memory = index.pm_map.read()?.get(&key).cloned();
        let offset = *index.off_map.read()?.get(&key).unwrap_or(&u64::MAX);
        let has_storage = offset != u64::MAX;

        let result = match (memory, has_storage) {
            (Some(mem_rec), false) => Some(mem_rec),
            (None, true) => {
                let bytes = table.fs_data.at(offset)?;
                let text = String::from_utf8_lossy(&bytes);
                Some(Record::deserialize(Arc::clone(&table.schema), &text)?)
            }
            (Some(mem_rec), true) => {
                let bytes = table.fs_data.at(offset)?;
                let text = String::from_utf8_lossy(&bytes);
                let mut storage_rec = Record::deserialize(Arc::clone(&table.schema), &text)?;
                Self::fold_enabled_only(&mut storage_rec, &mem_rec);
                Some(storage_rec)
            }
            (None, false) => None,
        };

        Ok(result.map(|r| r.project(&statement.projection)).unwrap_or_default())
    }

    fn insert(&self, statement: Statement) -> Result<Outcome> {
        let _guard = self.merge_lock.read()?;
        let table = self.catalog.table(statement.table_id);
        let primary = table.primary_index();
        let key0 = index_key(&statement.record, primary);

        let present = primary.pm_map.read()?.contains_key(&key0) || primary.off_map.read()?.contains_key(&key0);
        if present {
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

        for index in &table.indices {
            let key = index_key(&statement.record, index);
            index.pm_map.write()?.insert(key, statement.record.clone());
        }
        Ok(Outcome::Applied)
    }

    fn update(&self, statement: Statement) -> Result<Outcome> {
        let _guard = self.merge_lock.read()?;
        let table = self.catalog.table(statement.table_id);
        let primary = table.primary_index();
        let key0 = index_key(&statement.record, primary);

        let in_memory = primary.pm_map.read()?.get(&key0).cloned();
        match in_memory {
            Some(mut before_rec) => {
                let before_text = before_rec.serialize();
                for &field_id in &statement.field_ids {
                    before_rec.set_data(field_id, &statement.record);
                }
                let after_text = before_rec.serialize();
                let line = self.format_line(
                    statement.transaction_id,
                    "Update",
                    statement.table_id,
                    &[&before_text, &after_text],
                );
                self.log.push_back(&line)?;
                for index in &table.indices {
                    let key = index_key(&before_rec, index);
                    index.pm_map.write()?.insert(key, before_rec.clone());
                }
                Ok(Outcome::Applied)
            }
            None => {
                // Faithful to the source (spec §4.2, §9): does not consult
                // `off_map` for a before-image. The incoming record becomes
                // the new in-memory entry as if it were freshly inserted.
                let tuple = statement.record.serialize();
                let line = self.format_line(
                    statement.transaction_id,
                    "Update",
                    statement.table_id,
                    &[&tuple, &tuple],
                );
                self.log.push_back(&line)?;
                for index in &table.indices {
                    let key = index_key(&statement.record, index);
                    index.pm_map.write()?.insert(key, statement.record.clone());
                }
                Ok(Outcome::Applied)
            }
        }
    }

    fn remove(&self, statement: Statement) -> Result<Outcome> {
        let _guard = self.merge_lock.read()?;
        let table = self.catalog.table(statement.table_id);
        let primary = table.primary_index();
        let key0 = index_key(&statement.record, primary);

        let mem_rec = primary.pm_map.read()?.get(&key0).cloned();
        let offset = primary.off_map.read()?.get(&key0).copied();
        if mem_rec.is_none() && offset.is_none() {
            return Ok(Outcome::NoOp);
        }

        let before_rec = match (&mem_rec, offset) {
            (Some(rec), _) => rec.clone(),
            (None, Some(offset)) => {
                let bytes = table.fs_data.at(offset)?;
                let text = String::from_utf8_lossy(&bytes);
                Record::deserialize(Arc::clone(&table.schema), &text)?
            }
            (None, None) => unreachable!("checked above"),
        };
        let before_text = before_rec.serialize();
        let line = self.format_line(
            statement.transaction_id,
            "Delete",
            statement.table_id,
            &[&before_text],
        );
        self.log.push_back(&line)?;

        for index in &table.indices {
            let key = index_key(&before_rec, index);
            index.pm_map.write()?.remove(&key);
            index.off_map.write()?.remove(&key);
        }
        Ok(Outcome::Applied)
    }

    fn txn_end(&self, _commit: bool) {
        if let Err(err) = self.maybe_merge_after_txn_end() {
            log::error!("lsm merge on txn_end failed: {}", err);
        }
    }
}
