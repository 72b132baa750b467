//! Durable pipeline state: the processed-id list and per-destination daily
//! upload counters.
//!
//! Both live as flat files so the state survives between cron invocations.
//! The processed-id list is append-only; counter files are overwritten via
//! write-to-temp-then-rename so a crash mid-write cannot corrupt them.
//! Exactly one cycle runs at a time, so no locking beyond that discipline
//! is applied here; overlapping invocations are a deployment concern.

use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;
use tracing::{debug, info};

use crate::error::StateIoError;

/// Read/write access to the ProcessedSet and the DailyCounter.
///
/// Injected into the cycle controller and the source adapters; the file
/// implementation is [`FileStateStore`], tests use the generated mock.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
pub trait StateStore: Send + Sync {
    /// All candidate ids considered permanently handled.
    fn load_processed_ids(&self) -> Result<HashSet<String>, StateIoError>;

    /// Append one id to the ProcessedSet.
    fn record_processed(&self, id: &str) -> Result<(), StateIoError>;

    /// Upload count for `destination` on `today`. A counter stored for a
    /// prior date reads as zero: the day rolled over and superseded it.
    fn daily_count(&self, destination: &str, today: NaiveDate) -> Result<u32, StateIoError>;

    /// Increment `destination`'s counter for `today`, returning the new
    /// count. Overwrites any stale prior-date counter.
    fn increment_daily_count(
        &self,
        destination: &str,
        today: NaiveDate,
    ) -> Result<u32, StateIoError>;
}

/// Daily quota gate: a rate-limited destination is allowed only while its
/// same-day count is below the fixed ceiling. Consulted once per cycle,
/// before publishing.
pub fn is_destination_allowed(
    store: &dyn StateStore,
    destination: &str,
    today: NaiveDate,
    ceiling: u32,
) -> Result<bool, StateIoError> {
    let count = store.daily_count(destination, today)?;
    let allowed = count < ceiling;
    if allowed {
        info!(destination, count, ceiling, "daily quota check: upload allowed");
    } else {
        info!(destination, count, ceiling, "daily quota reached, destination skipped");
    }
    Ok(allowed)
}

/// File-backed [`StateStore`].
///
/// The ProcessedSet is a newline-delimited id file; each destination gets a
/// `<name>_daily_count.txt` file holding a single `YYYY-MM-DD:count` line.
pub struct FileStateStore {
    processed_path: PathBuf,
    counter_dir: PathBuf,
}

impl FileStateStore {
    pub fn new(processed_path: impl Into<PathBuf>, counter_dir: impl Into<PathBuf>) -> Self {
        Self {
            processed_path: processed_path.into(),
            counter_dir: counter_dir.into(),
        }
    }

    fn counter_path(&self, destination: &str) -> PathBuf {
        self.counter_dir
            .join(format!("{destination}_daily_count.txt"))
    }

    fn io_err(path: &Path, source: std::io::Error) -> StateIoError {
        StateIoError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    fn read_counter(&self, path: &Path, today: NaiveDate) -> Result<u32, StateIoError> {
        if !path.exists() {
            return Ok(0);
        }
        let line = fs::read_to_string(path).map_err(|e| Self::io_err(path, e))?;
        let line = line.trim();
        if line.is_empty() {
            return Ok(0);
        }
        let (date_str, count_str) =
            line.split_once(':')
                .ok_or_else(|| StateIoError::Corrupt {
                    path: path.to_path_buf(),
                    detail: format!("expected date:count, got {line:?}"),
                })?;
        let stored_date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d").map_err(|e| {
            StateIoError::Corrupt {
                path: path.to_path_buf(),
                detail: format!("bad date {date_str:?}: {e}"),
            }
        })?;
        if stored_date != today {
            // Prior day's counter is superseded, not decremented.
            debug!(path = %path.display(), %stored_date, %today, "stale counter, reading as 0");
            return Ok(0);
        }
        count_str.parse::<u32>().map_err(|e| StateIoError::Corrupt {
            path: path.to_path_buf(),
            detail: format!("bad count {count_str:?}: {e}"),
        })
    }

    fn write_counter(&self, path: &Path, today: NaiveDate, count: u32) -> Result<(), StateIoError> {
        let dir = path.parent().unwrap_or(Path::new("."));
        fs::create_dir_all(dir).map_err(|e| Self::io_err(dir, e))?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| Self::io_err(dir, e))?;
        write!(tmp, "{}:{count}", today.format("%Y-%m-%d")).map_err(|e| Self::io_err(path, e))?;
        tmp.persist(path)
            .map_err(|e| Self::io_err(path, e.error))?;
        Ok(())
    }
}

impl StateStore for FileStateStore {
    fn load_processed_ids(&self) -> Result<HashSet<String>, StateIoError> {
        if !self.processed_path.exists() {
            info!(path = %self.processed_path.display(), "no processed-id file yet, starting fresh");
            return Ok(HashSet::new());
        }
        let content = fs::read_to_string(&self.processed_path)
            .map_err(|e| Self::io_err(&self.processed_path, e))?;
        let ids: HashSet<String> = content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_owned)
            .collect();
        info!(count = ids.len(), path = %self.processed_path.display(), "loaded processed ids");
        Ok(ids)
    }

    fn record_processed(&self, id: &str) -> Result<(), StateIoError> {
        if let Some(dir) = self.processed_path.parent() {
            fs::create_dir_all(dir).map_err(|e| Self::io_err(dir, e))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.processed_path)
            .map_err(|e| Self::io_err(&self.processed_path, e))?;
        writeln!(file, "{id}").map_err(|e| Self::io_err(&self.processed_path, e))?;
        debug!(id, path = %self.processed_path.display(), "recorded processed id");
        Ok(())
    }

    fn daily_count(&self, destination: &str, today: NaiveDate) -> Result<u32, StateIoError> {
        self.read_counter(&self.counter_path(destination), today)
    }

    fn increment_daily_count(
        &self,
        destination: &str,
        today: NaiveDate,
    ) -> Result<u32, StateIoError> {
        let path = self.counter_path(destination);
        let current = self.read_counter(&path, today)?;
        let new_count = current + 1;
        self.write_counter(&path, today, new_count)?;
        info!(destination, count = new_count, "daily upload counter incremented");
        Ok(new_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn quota_gate_blocks_at_ceiling() {
        let mut store = MockStateStore::new();
        store.expect_daily_count().returning(|_, _| Ok(6));
        let allowed = is_destination_allowed(&store, "youtube", date("2026-08-23"), 6).unwrap();
        assert!(!allowed);
    }

    #[test]
    fn quota_gate_allows_below_ceiling() {
        let mut store = MockStateStore::new();
        store.expect_daily_count().returning(|_, _| Ok(5));
        let allowed = is_destination_allowed(&store, "youtube", date("2026-08-23"), 6).unwrap();
        assert!(allowed);
    }
}
