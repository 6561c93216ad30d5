//! The operation envelope passed into every engine call.
//!
//! The transaction queue, workload generator, and coordinator that build
//! and route these are out of scope (spec §1); only the field layout
//! matters to the core.

use std::sync::Arc;

use crate::catalog::{Schema, TableId};
use crate::record::Record;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpType {
    Select,
    Insert,
    Update,
    Delete,
}

/// Carried for wire compatibility with the coordinator; unread by the
/// core (spec §6: "used only by the coordinator, out of scope here").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartType {
    Single,
    All,
}

pub struct Statement {
    pub transaction_id: u64,
    pub op_type: OpType,
    pub table_id: TableId,
    pub table_index_id: usize,
    pub record: Record,
    pub field_ids: Vec<usize>,
    pub projection: Arc<Schema>,
    pub key: Option<String>,
    pub part_type: PartType,
    pub partition_id: u32,
}

impl Statement {
    pub fn new(
        transaction_id: u64,
        op_type: OpType,
        table_id: TableId,
        record: Record,
        projection: Arc<Schema>,
    ) -> Statement {
        Statement {
            transaction_id,
            op_type,
            table_id,
            table_index_id: 0,
            record,
            field_ids: Vec::new(),
            projection,
            key: None,
            part_type: PartType::Single,
            partition_id: 0,
        }
    }

    pub fn with_field_ids(mut self, field_ids: Vec<usize>) -> Statement {
        self.field_ids = field_ids;
        self
    }

    pub fn with_index(mut self, table_index_id: usize) -> Statement {
        self.table_index_id = table_index_id;
        self
    }

    pub fn with_key(mut self, key: String) -> Statement {
        self.key = Some(key);
        self
    }
}
