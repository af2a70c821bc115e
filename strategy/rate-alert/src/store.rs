//! Single-file JSON persistence for the latest [`ThresholdSet`].
//!
//! The batch job is the only writer and the monitor the only reader. Writes
//! go to a sibling temp file which is then renamed over the target, so a
//! reader sees either the old file or the new one, never a torn write.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::AlertError;
use crate::types::{BatchMetadata, CurrencyPair, Threshold, ThresholdSet};

pub const DEFAULT_THRESHOLDS_PATH: &str = "data/thresholds.json";

/// Summary of what is currently stored.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdStatus {
    pub exists: bool,
    pub count: usize,
    pub last_updated: Option<NaiveDateTime>,
    pub percentile: Option<u32>,
    pub lookback_days: Option<u32>,
}

/// Entry of the older layout that repeated batch metadata on every pair.
#[derive(Debug, Deserialize)]
struct LegacyEntry {
    #[serde(flatten)]
    threshold: Threshold,
    last_updated: NaiveDateTime,
    percentile: u32,
    lookback_days: u32,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StoredThresholds {
    Current(ThresholdSet),
    Legacy(BTreeMap<CurrencyPair, LegacyEntry>),
}

impl From<StoredThresholds> for ThresholdSet {
    fn from(stored: StoredThresholds) -> Self {
        match stored {
            StoredThresholds::Current(set) => set,
            StoredThresholds::Legacy(entries) => {
                let metadata = entries.values().next().map(|e| BatchMetadata {
                    last_updated: e.last_updated,
                    percentile: e.percentile,
                    lookback_days: e.lookback_days,
                });
                let thresholds = entries
                    .into_iter()
                    .map(|(pair, e)| (pair, e.threshold))
                    .collect();
                ThresholdSet {
                    metadata,
                    thresholds,
                }
            }
        }
    }
}

/// File-backed threshold cache.
#[derive(Debug, Clone)]
pub struct ThresholdStore {
    path: PathBuf,
}

impl ThresholdStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "thresholds.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    /// Replaces the stored set with `set`.
    pub fn save(&self, set: &ThresholdSet) -> Result<(), AlertError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|e| AlertError::persistence(dir, e))?;
        }
        let json = serde_json::to_string_pretty(set)?;
        let tmp = self.temp_path();
        let write = || -> std::io::Result<()> {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(json.as_bytes())?;
            file.sync_all()
        };
        if let Err(e) = write() {
            let _ = fs::remove_file(&tmp);
            return Err(AlertError::persistence(&tmp, e));
        }
        fs::rename(&tmp, &self.path).map_err(|e| AlertError::persistence(&self.path, e))?;
        debug!(
            path = %self.path.display(),
            count = set.len(),
            "thresholds saved"
        );
        Ok(())
    }

    /// Reads the stored set. A missing file yields an empty set; unreadable
    /// or corrupt files are errors.
    pub fn try_load(&self) -> Result<ThresholdSet, AlertError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(ThresholdSet::default())
            }
            Err(e) => return Err(AlertError::persistence(&self.path, e)),
        };
        if raw.trim().is_empty() {
            return Ok(ThresholdSet::default());
        }
        let stored: StoredThresholds = serde_json::from_str(&raw)?;
        Ok(stored.into())
    }

    /// Like [`try_load`](Self::try_load) but never fails: errors are logged
    /// and treated as an empty store.
    pub fn load(&self) -> ThresholdSet {
        self.try_load().unwrap_or_else(|e| {
            warn!(
                path = %self.path.display(),
                error = %e,
                "ignoring unreadable threshold store"
            );
            ThresholdSet::default()
        })
    }

    pub fn status(&self) -> ThresholdStatus {
        let set = self.load();
        let metadata = set.metadata.as_ref().filter(|_| !set.is_empty());
        ThresholdStatus {
            exists: metadata.is_some(),
            count: set.len(),
            last_updated: metadata.map(|m| m.last_updated),
            percentile: metadata.map(|m| m.percentile),
            lookback_days: metadata.map(|m| m.lookback_days),
        }
    }

    /// Whether thresholds should be recomputed on `today`.
    ///
    /// True when nothing usable is stored, or when `today` is the configured
    /// update day and the stored batch is from an earlier month. On any other
    /// day this returns false however old the data is, which keeps calls to
    /// the rate-limited historical endpoint to one batch per month. A process
    /// that only checks after the update day has passed skips that month.
    pub fn is_stale(&self, update_day_of_month: u32, today: NaiveDate) -> bool {
        let status = self.status();
        let Some(last_updated) = status.last_updated else {
            return true;
        };
        today.day() == update_day_of_month
            && (last_updated.month() != today.month() || last_updated.year() != today.year())
    }

    /// Modification time of the backing file, if it exists.
    pub fn modified(&self) -> Option<SystemTime> {
        fs::metadata(&self.path).and_then(|m| m.modified()).ok()
    }
}
