//! One gather cycle: run every probe of the table and append its output to
//! the probe's log file for the day.
//!
//! Log files live at `datadir/<probe>/<YYYY-MM-DD>.dat`. A file is created on
//! the first write of its day and starts with a single header line; later
//! ticks only append.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, NaiveDate};
use tracing::{debug, info, warn};

use crate::config::{ConfigStore, Section, keys};
use crate::error::{Error, Result};
use crate::probe::{ProbeDefinition, ProbeRunner};
use crate::{PROG_NAME, VERSION};

/// Date format of log file names.
pub const LOG_DATE_FORMAT: &str = "%Y-%m-%d";

/// Extension of log files.
pub const LOG_EXTENSION: &str = "dat";

/// Path of a probe's log file for `date`.
pub fn log_path(data_dir: &Path, probe: &str, date: NaiveDate) -> PathBuf {
    data_dir
        .join(probe)
        .join(format!("{}.{}", date.format(LOG_DATE_FORMAT), LOG_EXTENSION))
}

/// First line of every log file.
pub fn run_header(hostname: &str, now: DateTime<Local>) -> String {
    format!(
        "### {} v{} host={} started={} ###",
        PROG_NAME,
        VERSION,
        hostname,
        now.format("%Y-%m-%dT%H:%M:%S%:z")
    )
}

/// Opens a log file for appending, writing `header` first if the file is new.
fn open_log(path: &Path, header: &str) -> io::Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    match OpenOptions::new().append(true).create_new(true).open(path) {
        Ok(mut file) => {
            writeln!(file, "{}", header)?;
            debug!("Created {}", path.display());
            Ok(file)
        }
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            OpenOptions::new().append(true).open(path)
        }
        Err(e) => Err(e),
    }
}

/// Outcome of one probe within a gather cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    pub name: String,
    pub bytes_written: u64,
    /// Why the probe did not complete cleanly, if it did not.
    pub error: Option<String>,
}

/// Outcome of a gather cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GatherReport {
    pub probes: Vec<ProbeResult>,
}

impl GatherReport {
    pub fn failed(&self) -> impl Iterator<Item = &ProbeResult> {
        self.probes.iter().filter(|p| p.error.is_some())
    }

    pub fn failed_count(&self) -> usize {
        self.failed().count()
    }
}

/// Runs the probe table, one probe at a time, in stored order.
pub struct Gatherer<R: ProbeRunner> {
    runner: R,
}

impl<R: ProbeRunner> Gatherer<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }

    /// Gathers once, dated now.
    pub fn gather<S: ConfigStore>(&self, store: &S) -> Result<GatherReport> {
        self.gather_at(store, Local::now())
    }

    /// Gathers once as if the current time were `now`.
    ///
    /// Fails only when the store cannot provide the probe table, data
    /// directory or hostname. A failing probe is recorded in the report and
    /// the remaining probes still run.
    pub fn gather_at<S: ConfigStore>(&self, store: &S, now: DateTime<Local>) -> Result<GatherReport> {
        let probes: Vec<ProbeDefinition> = store
            .entries(Section::Utility)
            .into_iter()
            .map(|(name, invocation)| ProbeDefinition::new(name, invocation))
            .collect();
        if probes.is_empty() {
            return Err(Error::NoProbes);
        }

        let data_dir = PathBuf::from(store.get(Section::Global, keys::DATADIR)?);
        let hostname = store.get(Section::Global, keys::HOSTNAME)?;
        let header = run_header(&hostname, now);
        let today = now.date_naive();

        let mut report = GatherReport::default();
        for probe in &probes {
            let path = log_path(&data_dir, &probe.name, today);
            let result = self.run_probe(probe, &path, &header);
            if let Some(ref reason) = result.error {
                warn!("Probe {} failed: {}", probe.name, reason);
            }
            report.probes.push(result);
        }

        info!(
            "Gathered {} probes ({} failed)",
            report.probes.len(),
            report.failed_count()
        );
        Ok(report)
    }

    fn run_probe(&self, probe: &ProbeDefinition, path: &Path, header: &str) -> ProbeResult {
        let mut result = ProbeResult {
            name: probe.name.clone(),
            bytes_written: 0,
            error: None,
        };

        let file = match open_log(path, header) {
            Ok(f) => f,
            Err(e) => {
                result.error = Some(format!("cannot open {}: {}", path.display(), e));
                return result;
            }
        };
        let size_before = file.metadata().map(|m| m.len()).unwrap_or(0);

        let exit = self.runner.run(&probe.invocation, file);
        result.bytes_written = fs::metadata(path)
            .map(|m| m.len().saturating_sub(size_before))
            .unwrap_or(0);

        match exit {
            Ok(exit) if exit.success() => {}
            Ok(exit) => {
                result.error = Some(match exit.exit_code {
                    Some(code) => format!("exited with code {}", code),
                    None => "killed by signal".to_string(),
                });
            }
            Err(e) => {
                result.error = Some(format!("cannot run '{}': {}", probe.invocation, e));
            }
        }

        result
    }
}
