//! `fs_data`: the per-table append-only, fixed-slot byte log.
//!
//! Raw file I/O is out of scope per spec §1 ("raw file I/O wrappers");
//! this is the minimal concrete implementation of the `push_back`,
//! `update`, `at`, `sync`, `close` interface the spec assumes exists.
//! Grounded on `rdms::util::{open_file_w, open_file_r, read_buffer}`.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crate::error::{Error, Result};

pub type Offset = u64;

const LEN_PREFIX: usize = 4;

/// Fixed-slot append-only file. Slots never shrink or move; in-place
/// updates overwrite exactly one slot.
pub struct AppendLog {
    file: Mutex<File>,
    slot_size: usize,
    next_slot: AtomicU64,
}

impl AppendLog {
    pub fn open(path: &Path, max_tuple_size: usize) -> Result<AppendLog> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;
        let slot_size = max_tuple_size + LEN_PREFIX;
        let len = file.metadata()?.len();
        let next_slot = if slot_size == 0 { 0 } else { len / slot_size as u64 };
        Ok(AppendLog {
            file: Mutex::new(file),
            slot_size,
            next_slot: AtomicU64::new(next_slot),
        })
    }

    fn write_slot(&self, offset: Offset, bytes: &[u8]) -> Result<()> {
        if bytes.len() + LEN_PREFIX > self.slot_size {
            return Err(Error::InvalidSlot(format!(
                "tuple of {} bytes exceeds slot size {}",
                bytes.len(),
                self.slot_size
            )));
        }
        let mut buf = vec![0u8; self.slot_size];
        buf[..LEN_PREFIX].copy_from_slice(&(bytes.len() as u32).to_be_bytes());
        buf[LEN_PREFIX..LEN_PREFIX + bytes.len()].copy_from_slice(bytes);

        let mut file = self.file.lock()?;
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(&buf)?;
        Ok(())
    }

    /// Append `bytes` as a new slot, returning its byte offset.
    pub fn push_back(&self, bytes: &[u8]) -> Result<Offset> {
        let slot = self.next_slot.fetch_add(1, Ordering::SeqCst);
        let offset = slot * self.slot_size as u64;
        self.write_slot(offset, bytes)?;
        Ok(offset)
    }

    /// Overwrite the slot at `offset` in place. `offset` must have come
    /// from a previous `push_back` on this log.
    pub fn update(&self, offset: Offset, bytes: &[u8]) -> Result<()> {
        self.write_slot(offset, bytes)
    }

    /// Read the live bytes stored at `offset`.
    pub fn at(&self, offset: Offset) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; self.slot_size];
        {
            let mut file = self.file.lock()?;
            file.seek(SeekFrom::Start(offset))?;
            file.read_exact(&mut buf)?;
        }
        let len = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
        Ok(buf[LEN_PREFIX..LEN_PREFIX + len].to_vec())
    }

    pub fn sync(&self) -> Result<()> {
        self.file.lock()?.sync_all()?;
        Ok(())
    }

    pub fn close(&self) -> Result<()> {
        self.sync()
    }

    pub fn slot_count(&self) -> u64 {
        self.next_slot.load(Ordering::SeqCst)
    }
}
