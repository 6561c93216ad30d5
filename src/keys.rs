//! Key hashing.
//!
//! Keys are 64-bit hashes of the concatenation of the indexed columns'
//! serialized bytes (spec §3). Collisions are treated as equality and
//! accepted as a limitation (spec §9) — a production system would store
//! and compare full key bytes instead.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::catalog::TableIndex;
use crate::record::Record;

pub fn hash_bytes(bytes: &[u8]) -> u64 {
    let mut hasher = DefaultHasher::new();
    bytes.hash(&mut hasher);
    hasher.finish()
}

/// Compute the hashed key for `record` under `index`.
pub fn index_key(record: &Record, index: &TableIndex) -> u64 {
    let mut buf = Vec::new();
    for &pos in &index.key_columns {
        buf.extend_from_slice(record.get_pointer(pos).render().as_bytes());
        buf.push(0u8);
    }
    hash_bytes(&buf)
}

/// 3-way hash combiner used by the OPT-SP engine to fold a record's
/// key-hash together with its table-id and index-id into one 64-bit
/// composite (boost::hash_combine-style mixing; any deterministic
/// injection suffices per spec §4.3).
pub fn combine3(a: u64, b: u64, c: u64) -> u64 {
    const GOLDEN: u64 = 0x9e3779b97f4a7c15;
    let mut seed = a;
    for v in [b, c] {
        seed ^= v
            .wrapping_add(GOLDEN)
            .wrapping_add(seed << 6)
            .wrapping_add(seed >> 2);
    }
    seed
}

/// Render the OPT-SP composite key as the decimal string the copy-on-write
/// tree is keyed by.
pub fn opt_sp_key(record_key_hash: u64, table_id: usize, index_id: usize) -> String {
    combine3(record_key_hash, table_id as u64, index_id as u64).to_string()
}
