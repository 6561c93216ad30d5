//! The uniform operation contract implemented by every durability
//! strategy (spec §2): `{select, insert, update, remove, txn_begin,
//! txn_end, recovery}`.

pub mod lsm;
pub mod opt_sp;
pub mod wal;

use crate::error::{Error, Result};
use crate::statement::Statement;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineKind {
    Wal,
    Lsm,
    OptSp,
}

/// Result of a mutating call. Logical no-ops (duplicate insert, missing
/// update/delete) are never errors (spec §7); they surface as
/// `Outcome::NoOp`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    NoOp,
}

pub trait Engine {
    fn kind(&self) -> EngineKind;

    fn select(&self, statement: &Statement) -> Result<Vec<u8>>;

    fn insert(&self, statement: Statement) -> Result<Outcome>;

    fn update(&self, statement: Statement) -> Result<Outcome>;

    fn remove(&self, statement: Statement) -> Result<Outcome>;

    fn txn_begin(&self) {}

    fn txn_end(&self, _commit: bool) {}

    /// WAL-only; other engines report unsupported (spec §9: "the variant
    /// tag is observable ... only WAL implements recovery").
    fn recovery(&self) -> Result<()> {
        Err(Error::Unsupported("recovery"))
    }
}
