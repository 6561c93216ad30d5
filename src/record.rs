//! The opaque record/schema codec.
//!
//! The real system treats serialization as an external collaborator (see
//! spec §1: "the schema/record codec ... out of scope, only their
//! interfaces matter"). This module is a minimal stand-in so the engines
//! below have something concrete to push bytes through; it is not meant
//! to be a production wire format.

use std::sync::Arc;

use crate::catalog::{ColumnType, Schema};
use crate::error::{Error, Result};

/// A single column value.
///
/// `Text`/`Bytes` model non-inlined columns that own a heap allocation;
/// `I64`/`F64`/`Bool`/`Null` model inlined scalars.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    I64(i64),
    F64(f64),
    Bool(bool),
    Text(String),
    Bytes(Vec<u8>),
}

impl Value {
    /// Canonical textual rendering, used both for projections and as the
    /// on-the-wire field encoding inside `Record::serialize`.
    pub fn render(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::I64(v) => v.to_string(),
            Value::F64(v) => v.to_string(),
            Value::Bool(v) => v.to_string(),
            Value::Text(v) => v.clone(),
            Value::Bytes(v) => v.iter().map(|b| format!("{:02x}", b)).collect(),
        }
    }

    fn parse(ty: ColumnType, s: &str) -> Result<Value> {
        if s.is_empty() && ty != ColumnType::Text {
            return Ok(Value::Null);
        }
        Ok(match ty {
            ColumnType::I64 => Value::I64(
                s.parse()
                    .map_err(|_| Error::InvalidLogLine(format!("bad i64 {:?}", s)))?,
            ),
            ColumnType::F64 => Value::F64(
                s.parse()
                    .map_err(|_| Error::InvalidLogLine(format!("bad f64 {:?}", s)))?,
            ),
            ColumnType::Bool => Value::Bool(
                s.parse()
                    .map_err(|_| Error::InvalidLogLine(format!("bad bool {:?}", s)))?,
            ),
            ColumnType::Text => Value::Text(s.to_string()),
            ColumnType::Bytes => {
                if s.len() % 2 != 0 {
                    return Err(Error::InvalidLogLine(format!("bad hex {:?}", s)));
                }
                let mut out = Vec::with_capacity(s.len() / 2);
                for i in (0..s.len()).step_by(2) {
                    let byte = u8::from_str_radix(&s[i..i + 2], 16)
                        .map_err(|_| Error::InvalidLogLine(format!("bad hex {:?}", s)))?;
                    out.push(byte);
                }
                Value::Bytes(out)
            }
        })
    }
}

/// An opaque typed tuple bound to a `Schema`.
///
/// A move-only handle: the engines take ownership of a `Record` on every
/// mutating call and never alias it behind a shared pointer (see
/// `DESIGN.md` for why this departs from the source's manual
/// reference-counting).
#[derive(Debug, Clone)]
pub struct Record {
    schema: Arc<Schema>,
    fields: Vec<Value>,
}

impl Record {
    pub fn new(schema: Arc<Schema>, fields: Vec<Value>) -> Record {
        assert_eq!(schema.columns.len(), fields.len());
        Record { schema, fields }
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Field accessor. Named to match the source's `get_pointer`.
    pub fn get_pointer(&self, i: usize) -> &Value {
        &self.fields[i]
    }

    /// Copy field `i` from `other`, a record of the same schema.
    ///
    /// Replacing a non-inlined field drops the previous allocation
    /// automatically (`Vec`/`String`'s `Drop`); there is no manual free
    /// to perform, unlike the source.
    pub fn set_data(&mut self, i: usize, other: &Record) {
        self.fields[i] = other.fields[i].clone();
    }

    /// Release every non-inlined field, per the column's `inlined` flag.
    pub fn clear_data(&mut self) {
        for (i, col) in self.schema.columns.iter().enumerate() {
            if !col.inlined {
                self.fields[i] = Value::Null;
            }
        }
    }

    /// Full-tuple textual encoding, one line's worth of `fs_data`/log
    /// payload. Fields are `;`-joined so the result never contains a
    /// space, keeping it safe to embed in a whitespace-delimited log line.
    pub fn serialize(&self) -> String {
        self.fields
            .iter()
            .map(Value::render)
            .collect::<Vec<_>>()
            .join(";")
    }

    pub fn deserialize(schema: Arc<Schema>, s: &str) -> Result<Record> {
        let parts: Vec<&str> = s.split(';').collect();
        if parts.len() != schema.columns.len() {
            return Err(Error::InvalidLogLine(format!(
                "expected {} fields, got {} in {:?}",
                schema.columns.len(),
                parts.len(),
                s
            )));
        }
        let mut fields = Vec::with_capacity(parts.len());
        for (col, part) in schema.columns.iter().zip(parts.iter()) {
            fields.push(Value::parse(col.ty, part)?);
        }
        Ok(Record { schema, fields })
    }

    /// Render this record through a caller-chosen projection schema,
    /// matching columns by name against this record's own schema.
    pub fn project(&self, projection: &Schema) -> Vec<u8> {
        let rendered: Vec<String> = projection
            .columns
            .iter()
            .filter_map(|col| self.schema.index_of(&col.name))
            .map(|idx| self.fields[idx].render())
            .collect();
        rendered.join(",").into_bytes()
    }
}
