use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::Serialize;

use super::ConfigError;
use super::store::ConfigStore;

/// Named sections of the configuration file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Section {
    /// Top-level keys of the file.
    Global,
    /// Probe table: probe name → invocation string.
    Utility,
    /// Escalation threshold and status.
    DState,
}

impl Section {
    pub fn name(self) -> &'static str {
        match self {
            Section::Global => "global",
            Section::Utility => "utility",
            Section::DState => "d-state",
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Key names used in the configuration file.
pub mod keys {
    pub const HOSTNAME: &str = "hostname";
    pub const INTERVAL: &str = "interval";
    pub const LOGDAYS: &str = "logdays";
    pub const STATUS: &str = "status";
    pub const RTMON: &str = "rtmon";
    pub const DATADIR: &str = "datadir";
    pub const CONFIGFILE: &str = "configfile";
    pub const NUMPROCS: &str = "numprocs";
    pub const DSTATE: &str = "dstate";
}

/// Global keys every written store must contain.
pub const REQUIRED_GLOBAL_KEYS: [&str; 7] = [
    keys::HOSTNAME,
    keys::INTERVAL,
    keys::LOGDAYS,
    keys::STATUS,
    keys::RTMON,
    keys::DATADIR,
    keys::CONFIGFILE,
];

/// Started/stopped flag shared by the agent, the rtmon toggle and escalation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Started,
    Stopped,
}

impl RunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Started => "started",
            RunStatus::Stopped => "stopped",
        }
    }

    pub fn is_started(self) -> bool {
        self == RunStatus::Started
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "started" => Ok(RunStatus::Started),
            "stopped" => Ok(RunStatus::Stopped),
            other => Err(format!("unknown status '{}'", other)),
        }
    }
}

/// D-state escalation state: threshold plus armed flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EscalationState {
    pub threshold: u64,
    pub status: RunStatus,
}

impl EscalationState {
    /// State after a stop: threshold 0, disarmed.
    pub const DISARMED: EscalationState = EscalationState {
        threshold: 0,
        status: RunStatus::Stopped,
    };

    pub fn is_armed(&self) -> bool {
        self.status.is_started()
    }

    /// Reads the escalation section. A store without one is disarmed.
    pub fn from_store<S: ConfigStore>(store: &S) -> Result<Self, ConfigError> {
        let status = match store.get(Section::DState, keys::DSTATE) {
            Ok(_) => store.get_parsed::<RunStatus>(Section::DState, keys::DSTATE)?,
            Err(ConfigError::NotFound { .. }) => return Ok(Self::DISARMED),
            Err(e) => return Err(e),
        };
        let threshold = match store.get_parsed::<u64>(Section::DState, keys::NUMPROCS) {
            Ok(n) => n,
            Err(ConfigError::NotFound { .. }) if !status.is_started() => 0,
            Err(e) => return Err(e),
        };
        Ok(Self { threshold, status })
    }

    /// Writes both escalation keys in one store write.
    pub fn store_into<S: ConfigStore>(&self, store: &mut S) -> Result<(), ConfigError> {
        store.set_all(
            Section::DState,
            &[
                (keys::NUMPROCS.to_string(), self.threshold.to_string()),
                (keys::DSTATE.to_string(), self.status.to_string()),
            ],
        )
    }
}

/// Typed view of the global section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentSettings {
    pub hostname: String,
    pub interval: u32,
    pub logdays: u32,
    pub status: RunStatus,
    pub rtmon: RunStatus,
    pub data_dir: PathBuf,
    pub config_file: PathBuf,
}

impl AgentSettings {
    /// Default gathering interval in seconds.
    pub const DEFAULT_INTERVAL: u32 = 30;
    /// Default log retention in days.
    pub const DEFAULT_LOGDAYS: u32 = 7;
    /// Largest accepted gathering interval (one day).
    pub const MAX_INTERVAL: u32 = 86_400;

    pub fn from_store<S: ConfigStore>(store: &S) -> Result<Self, ConfigError> {
        Ok(Self {
            hostname: store.get(Section::Global, keys::HOSTNAME)?,
            interval: store.get_parsed(Section::Global, keys::INTERVAL)?,
            logdays: store.get_parsed(Section::Global, keys::LOGDAYS)?,
            status: store.get_parsed(Section::Global, keys::STATUS)?,
            rtmon: store.get_parsed(Section::Global, keys::RTMON)?,
            data_dir: PathBuf::from(store.get(Section::Global, keys::DATADIR)?),
            config_file: PathBuf::from(store.get(Section::Global, keys::CONFIGFILE)?),
        })
    }

    /// Global section entries in file order.
    pub fn to_entries(&self) -> Vec<(String, String)> {
        vec![
            (keys::HOSTNAME.to_string(), self.hostname.clone()),
            (keys::INTERVAL.to_string(), self.interval.to_string()),
            (keys::LOGDAYS.to_string(), self.logdays.to_string()),
            (keys::STATUS.to_string(), self.status.to_string()),
            (keys::RTMON.to_string(), self.rtmon.to_string()),
            (keys::DATADIR.to_string(), self.data_dir.display().to_string()),
            (
                keys::CONFIGFILE.to_string(),
                self.config_file.display().to_string(),
            ),
        ]
    }
}

/// Reads the run status; every lifecycle operation is gated on it.
pub fn run_status<S: ConfigStore>(store: &S) -> Result<RunStatus, ConfigError> {
    store.get_parsed(Section::Global, keys::STATUS)
}
