//! The textual redo/undo log, `<fs_path>log`.
//!
//! One record per line: `<txn-id> <op-type> <table-id> <serialized-tuple>`;
//! `Update` lines carry two tuples (before-image then after-image)
//! separated by a space, to support undo and redo (spec §3).

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use log::debug;

use crate::error::Result;

pub struct TxnLog {
    file: Mutex<File>,
    path: PathBuf,
    disabled: AtomicBool,
}

impl TxnLog {
    pub fn open(path: &Path) -> Result<TxnLog> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .read(true)
            .open(path)?;
        Ok(TxnLog {
            file: Mutex::new(file),
            path: path.to_path_buf(),
            disabled: AtomicBool::new(false),
        })
    }

    /// Append one already-formatted log line. A no-op once `disable()`
    /// has been called (recovery disables further writes, spec §4.4).
    pub fn push_back(&self, line: &str) -> Result<()> {
        if self.disabled.load(Ordering::Relaxed) {
            return Ok(());
        }
        let mut file = self.file.lock()?;
        file.write_all(line.as_bytes())?;
        if !line.ends_with('\n') {
            file.write_all(b"\n")?;
        }
        Ok(())
    }

    pub fn flush(&self) -> Result<()> {
        self.file.lock()?.flush()?;
        Ok(())
    }

    pub fn sync(&self) -> Result<()> {
        self.file.lock()?.sync_all()?;
        Ok(())
    }

    /// Disable further writes; used once at the start of recovery so
    /// replayed operations are not re-logged.
    pub fn disable(&self) {
        debug!("txn log disabled for recovery");
        self.disabled.store(true, Ordering::Relaxed);
    }

    pub fn close(&self) -> Result<()> {
        self.sync()
    }

    /// Read back every line currently on disk, in order.
    pub fn read_lines(&self) -> Result<Vec<String>> {
        let content = fs::read_to_string(&self.path)?;
        Ok(content.lines().map(str::to_string).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn push_back_appends_newline_terminated_lines() {
        let dir = TempDir::new().unwrap();
        let log = TxnLog::open(&dir.path().join("log")).unwrap();
        log.push_back("1 Insert 0 1;A").unwrap();
        log.push_back("2 Insert 0 2;B").unwrap();
        assert_eq!(
            log.read_lines().unwrap(),
            vec!["1 Insert 0 1;A".to_string(), "2 Insert 0 2;B".to_string()]
        );
    }

    #[test]
    fn disable_silences_further_writes() {
        let dir = TempDir::new().unwrap();
        let log = TxnLog::open(&dir.path().join("log")).unwrap();
        log.push_back("1 Insert 0 1;A").unwrap();
        log.disable();
        log.push_back("2 Insert 0 2;B").unwrap();
        assert_eq!(log.read_lines().unwrap(), vec!["1 Insert 0 1;A".to_string()]);
    }
}
