//! Retention cleanup of probe log files.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDate};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::gather::{LOG_DATE_FORMAT, LOG_EXTENSION};

/// Result of a tidy pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TidyReport {
    /// Log files removed for being outside the retention window.
    pub files_removed: usize,
    /// Log files inside the retention window.
    pub files_kept: usize,
    /// Files whose name does not carry a log date; never touched.
    pub files_ignored: usize,
    /// Expired files that could not be removed.
    pub files_failed: usize,
    /// Total bytes freed by removal.
    pub bytes_freed: u64,
}

/// Removes log files older than the retention window from a data directory.
pub struct LogTidy {
    data_dir: PathBuf,
}

impl LogTidy {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn tidy(&self, retention_days: u32) -> Result<TidyReport> {
        self.tidy_at(retention_days, Local::now().date_naive())
    }

    /// Walks every probe subdirectory and removes log files dated
    /// `retention_days` or more days before `today`.
    ///
    /// The date comes from the file name, not the modification time. A file
    /// that cannot be removed is logged and counted; the walk continues.
    pub fn tidy_at(&self, retention_days: u32, today: NaiveDate) -> Result<TidyReport> {
        if retention_days == 0 {
            return Err(Error::validation("logdays must be greater than 0"));
        }

        let mut report = TidyReport::default();
        let entries = fs::read_dir(&self.data_dir).map_err(|e| Error::io(&self.data_dir, e))?;

        for entry in entries.flatten() {
            let probe_dir = entry.path();
            if !probe_dir.is_dir() {
                continue;
            }

            let files = match fs::read_dir(&probe_dir) {
                Ok(files) => files,
                Err(e) => {
                    warn!("Cannot read {}: {}", probe_dir.display(), e);
                    continue;
                }
            };

            for file in files.flatten() {
                let path = file.path();
                let Some(date) = parse_log_date(&path) else {
                    debug!("Ignoring {}", path.display());
                    report.files_ignored += 1;
                    continue;
                };

                let age = (today - date).num_days();
                if age < retention_days as i64 {
                    report.files_kept += 1;
                    continue;
                }

                let size = file.metadata().map(|m| m.len()).unwrap_or(0);
                match fs::remove_file(&path) {
                    Ok(()) => {
                        debug!("Removed {} ({} days old)", path.display(), age);
                        report.files_removed += 1;
                        report.bytes_freed += size;
                    }
                    Err(e) => {
                        warn!("Cannot remove {}: {}", path.display(), e);
                        report.files_failed += 1;
                    }
                }
            }
        }

        info!(
            "Tidy: removed {} files older than {} days, {} kept",
            report.files_removed, retention_days, report.files_kept
        );
        Ok(report)
    }
}

/// Parses the date from a log file name: `YYYY-MM-DD.dat`.
pub fn parse_log_date(path: &Path) -> Option<NaiveDate> {
    if path.extension()? != LOG_EXTENSION {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    NaiveDate::parse_from_str(stem, LOG_DATE_FORMAT).ok()
}
