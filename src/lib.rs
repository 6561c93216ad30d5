//! A pluggable durability core for a single-node transactional
//! key-value table store.
//!
//! Three engine strategies implement the same `Engine` trait over the
//! same catalog: [`engine::wal`] appends a redo/undo log and mutates
//! the table file in place; [`engine::lsm`] defers file writes behind
//! a volatile overlay and a background merge; [`engine::opt_sp`] keeps
//! a single copy-on-write index committed periodically by a background
//! thread. Only the WAL engine implements [`engine::Engine::recovery`].
//!
//! The schema/record codec, the table/index catalog, and the workload
//! coordinator that builds [`statement::Statement`]s are treated as
//! thin collaborators here, not as the interesting part of the system —
//! see each module's doc comment for what is and isn't in scope.

pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;
pub mod gc_thread;
pub mod keys;
pub mod log;
pub mod record;
pub mod recovery;
pub mod statement;
pub mod storage;

#[cfg(test)]
pub(crate) mod test_support;

pub use catalog::{Catalog, TableSpec};
pub use config::Config;
pub use engine::{Engine, EngineKind, Outcome};
pub use error::{Error, Result};
pub use statement::{OpType, Statement};
