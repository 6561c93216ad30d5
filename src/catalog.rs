//! The table/index catalog.
//!
//! Out of scope per spec §1 ("the table/index catalog ... only their
//! interfaces matter") — this module exists only so the engines have a
//! concrete `Table`/`TableIndex` to operate on. It is read-only after
//! `Catalog::open` returns, which is what lets engines hand out shared
//! references into it without additional locking (§9: schemas get
//! process-lifetime ownership in this arena, breaking the
//! record→schema→index→table reference cycle the source has).

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, RwLock};

use crate::error::Result;
use crate::record::Record;
use crate::storage::AppendLog;

pub type TableId = usize;
pub type Offset = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    I64,
    F64,
    Bool,
    Text,
    Bytes,
}

#[derive(Debug, Clone)]
pub struct ColumnDef {
    pub name: String,
    pub ty: ColumnType,
    /// Participates in projection/merge.
    pub enabled: bool,
    /// Stored in-line vs owned indirectly (affects `Record::clear_data`).
    pub inlined: bool,
}

impl ColumnDef {
    pub fn new(name: &str, ty: ColumnType, enabled: bool, inlined: bool) -> ColumnDef {
        ColumnDef {
            name: name.to_string(),
            ty,
            enabled,
            inlined,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Schema {
    pub columns: Vec<ColumnDef>,
}

impl Schema {
    pub fn new(columns: Vec<ColumnDef>) -> Schema {
        Schema { columns }
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Build an index-schema, the ordered subset of this table schema's
    /// columns that form one key, by name.
    pub fn projected(&self, names: &[&str]) -> Schema {
        let columns = names
            .iter()
            .filter_map(|n| self.index_of(n).map(|i| self.columns[i].clone()))
            .collect();
        Schema { columns }
    }
}

/// One index over a table: a primary key (index 0) or a secondary index.
///
/// `pm_map` is volatile and used only by the LSM engine; `off_map` is the
/// persistent key→offset mapping used by both WAL and LSM.
pub struct TableIndex {
    /// Positions, into the owning table's schema, of the columns that
    /// form this index's key.
    pub key_columns: Vec<usize>,
    pub pm_map: RwLock<HashMap<u64, Record>>,
    pub off_map: RwLock<HashMap<u64, Offset>>,
}

impl TableIndex {
    pub fn new(key_columns: Vec<usize>) -> TableIndex {
        TableIndex {
            key_columns,
            pm_map: RwLock::new(HashMap::new()),
            off_map: RwLock::new(HashMap::new()),
        }
    }
}

pub struct Table {
    pub name: String,
    pub schema: Arc<Schema>,
    pub max_tuple_size: usize,
    pub indices: Vec<TableIndex>,
    pub fs_data: AppendLog,
}

impl Table {
    pub fn primary_index(&self) -> &TableIndex {
        &self.indices[0]
    }
}

/// Table definition handed to `Catalog::open`, before the backing
/// `AppendLog` files are opened.
pub struct TableSpec {
    pub name: String,
    pub schema: Schema,
    pub max_tuple_size: usize,
    /// One entry per index (index 0 is the primary key), each a list of
    /// column names forming that index's key.
    pub indices: Vec<Vec<String>>,
}

pub struct Catalog {
    pub tables: Vec<Table>,
}

impl Catalog {
    /// Open (or create) the per-table `fs_data` files under `fs_path` and
    /// assemble the read-only catalog.
    pub fn open(fs_path: &Path, specs: Vec<TableSpec>) -> Result<Catalog> {
        let mut tables = Vec::with_capacity(specs.len());
        for spec in specs {
            let schema = Arc::new(spec.schema);
            let indices = spec
                .indices
                .iter()
                .map(|names| {
                    let refs: Vec<&str> = names.iter().map(String::as_str).collect();
                    let key_columns = refs
                        .iter()
                        .filter_map(|n| schema.index_of(n))
                        .collect();
                    TableIndex::new(key_columns)
                })
                .collect();
            let file_path = fs_path.join(&spec.name);
            let fs_data = AppendLog::open(&file_path, spec.max_tuple_size)?;
            tables.push(Table {
                name: spec.name,
                schema,
                max_tuple_size: spec.max_tuple_size,
                indices,
                fs_data,
            });
        }
        Ok(Catalog { tables })
    }

    pub fn table(&self, id: TableId) -> &Table {
        &self.tables[id]
    }

    pub fn sync_all(&self) -> Result<()> {
        for table in &self.tables {
            table.fs_data.sync()?;
        }
        Ok(())
    }
}
