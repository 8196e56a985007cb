//! Operator view of the agent state (`--status`).

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use crate::config::{AgentSettings, ConfigStore, EscalationState, RunStatus, Section};
use crate::error::Result;
use crate::fmt::format_bytes;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub hostname: String,
    pub status: RunStatus,
    pub rtmon: RunStatus,
    pub interval: u32,
    pub logdays: u32,
    pub escalation: EscalationState,
    pub probes: Vec<String>,
    pub data_dir: PathBuf,
    pub config_file: PathBuf,
    /// Total size of the data directory in bytes.
    pub data_size: u64,
}

impl StatusReport {
    /// Reads the report from the store. Never writes.
    pub fn collect<S: ConfigStore>(store: &S) -> Result<Self> {
        let settings = AgentSettings::from_store(store)?;
        let escalation = EscalationState::from_store(store)?;
        let probes = store
            .entries(Section::Utility)
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        let data_size = dir_size(&settings.data_dir);

        Ok(Self {
            hostname: settings.hostname,
            status: settings.status,
            rtmon: settings.rtmon,
            interval: settings.interval,
            logdays: settings.logdays,
            escalation,
            probes,
            data_dir: settings.data_dir,
            config_file: store.path().to_path_buf(),
            data_size,
        })
    }
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "gdg status:     {}", self.status)?;
        writeln!(f, "hostname:       {}", self.hostname)?;
        writeln!(f, "interval:       {}s", self.interval)?;
        writeln!(f, "log retention:  {} days", self.logdays)?;
        writeln!(f, "rtmon:          {}", self.rtmon)?;
        if self.escalation.is_armed() {
            writeln!(
                f,
                "d-state:        armed at {} processes",
                self.escalation.threshold
            )?;
        } else {
            writeln!(f, "d-state:        {}", self.escalation.status)?;
        }
        writeln!(f, "probes:         {}", self.probes.join(" "))?;
        writeln!(f, "config file:    {}", self.config_file.display())?;
        write!(
            f,
            "data directory: {} ({})",
            self.data_dir.display(),
            format_bytes(self.data_size)
        )
    }
}

/// Recursive size of regular files under `path`; unreadable entries count 0.
fn dir_size(path: &Path) -> u64 {
    let entries = match fs::read_dir(path) {
        Ok(entries) => entries,
        Err(e) => {
            debug!("Cannot read {}: {}", path.display(), e);
            return 0;
        }
    };

    entries
        .flatten()
        .map(|entry| match entry.file_type() {
            Ok(ft) if ft.is_dir() => dir_size(&entry.path()),
            Ok(ft) if ft.is_file() => entry.metadata().map(|m| m.len()).unwrap_or(0),
            _ => 0,
        })
        .sum()
}
