//! Engine configuration.
//!
//! Builder-style, grounded on `rdms::dgm::Config`: a `Default` impl with
//! named constants plus `set_*` methods returning `&mut Self`, and an
//! optional `toml`-backed file loader.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};

#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    /// Directory prefix for the log and per-table data files.
    pub fs_path: PathBuf,
    /// Background sync/commit period.
    pub gc_interval: Duration,
    /// Number of `txn_end` calls between LSM merges.
    pub merge_interval: u64,
    /// Fraction of `off_map` size that triggers a non-forced merge.
    pub merge_ratio: f64,
    /// Undo-mode cutoff for WAL recovery.
    pub active_txn_threshold: u64,
    /// If true, the WAL engine's destructor skips closing the log
    /// (recovery will close it instead).
    pub recovery: bool,
    /// No background threads are spawned; the engine is used purely for
    /// replay or inspection.
    pub read_only: bool,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            fs_path: PathBuf::from("."),
            gc_interval: Self::GC_INTERVAL,
            merge_interval: Self::MERGE_INTERVAL,
            merge_ratio: Self::MERGE_RATIO,
            active_txn_threshold: Self::ACTIVE_TXN_THRESHOLD,
            recovery: false,
            read_only: false,
        }
    }
}

impl Config {
    pub const GC_INTERVAL: Duration = Duration::from_millis(200);
    pub const MERGE_INTERVAL: u64 = 100;
    pub const MERGE_RATIO: f64 = 0.5;
    pub const ACTIVE_TXN_THRESHOLD: u64 = 0;

    pub fn set_fs_path<P: Into<PathBuf>>(&mut self, fs_path: P) -> &mut Self {
        self.fs_path = fs_path.into();
        self
    }

    pub fn set_gc_interval(&mut self, gc_interval: Duration) -> &mut Self {
        self.gc_interval = gc_interval;
        self
    }

    pub fn set_merge_interval(&mut self, merge_interval: u64) -> &mut Self {
        self.merge_interval = merge_interval;
        self
    }

    pub fn set_merge_ratio(&mut self, merge_ratio: f64) -> &mut Self {
        self.merge_ratio = merge_ratio;
        self
    }

    pub fn set_active_txn_threshold(&mut self, threshold: u64) -> &mut Self {
        self.active_txn_threshold = threshold;
        self
    }

    pub fn set_recovery(&mut self, recovery: bool) -> &mut Self {
        self.recovery = recovery;
        self
    }

    pub fn set_read_only(&mut self, read_only: bool) -> &mut Self {
        self.read_only = read_only;
        self
    }

    /// Load overrides from a TOML file; fields left unset keep their
    /// `Default` values.
    pub fn load(path: &Path) -> Result<Config> {
        let text = fs::read_to_string(path)?;
        let raw: RawConfig = toml::from_str(&text)
            .map_err(|err| Error::Config(format!("{}: {}", path.display(), err)))?;
        let mut config = Config::default();
        if let Some(fs_path) = raw.fs_path {
            config.set_fs_path(fs_path);
        }
        if let Some(ms) = raw.gc_interval_ms {
            config.set_gc_interval(Duration::from_millis(ms));
        }
        if let Some(v) = raw.merge_interval {
            config.set_merge_interval(v);
        }
        if let Some(v) = raw.merge_ratio {
            config.set_merge_ratio(v);
        }
        if let Some(v) = raw.active_txn_threshold {
            config.set_active_txn_threshold(v);
        }
        if let Some(v) = raw.recovery {
            config.set_recovery(v);
        }
        if let Some(v) = raw.read_only {
            config.set_read_only(v);
        }
        Ok(config)
    }
}

#[derive(Debug, Deserialize, Default)]
struct RawConfig {
    fs_path: Option<PathBuf>,
    gc_interval_ms: Option<u64>,
    merge_interval: Option<u64>,
    merge_ratio: Option<f64>,
    active_txn_threshold: Option<u64>,
    recovery: Option<bool>,
    read_only: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_match_named_constants() {
        let config = Config::default();
        assert_eq!(config.gc_interval, Config::GC_INTERVAL);
        assert_eq!(config.merge_interval, Config::MERGE_INTERVAL);
        assert_eq!(config.merge_ratio, Config::MERGE_RATIO);
    }

    #[test]
    fn load_applies_only_present_fields() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tkv.toml");
        fs::write(&path, "merge_interval = 7\nread_only = true\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.merge_interval, 7);
        assert!(config.read_only);
        assert_eq!(config.merge_ratio, Config::MERGE_RATIO);
    }

    #[test]
    fn load_rejects_malformed_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tkv.toml");
        fs::write(&path, "not valid toml = [").unwrap();
        assert!(Config::load(&path).is_err());
    }
}
