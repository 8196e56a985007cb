//! Persistent agent state.
//!
//! The configuration file is the single source of truth for whether gdg is
//! running, how often it gathers, how long logs are kept and whether D-state
//! escalation is armed. Every invocation re-reads it from disk.
//!
//! ```text
//! hostname = "web01"          ┐
//! interval = "30"             │ global (top-level keys)
//! status = "started"          ┘
//!
//! [utility]                   probe table, in gather order
//! iostat = "/usr/bin/iostat 1 3 -t -k -x -N"
//!
//! [d-state]                   escalation state
//! numprocs = "0"
//! dstate = "stopped"
//! ```

mod document;
mod memory;
mod settings;
mod store;

use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub use memory::MemoryStore;
pub use settings::{
    AgentSettings, EscalationState, REQUIRED_GLOBAL_KEYS, RunStatus, Section, keys, run_status,
};
pub use store::{ConfigStore, FileStore};

/// Errors raised by configuration stores.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config file {} does not exist, start gdg first", .0.display())]
    Missing(PathBuf),

    #[error("config file {} is corrupt: {reason}", .path.display())]
    Corrupt { path: PathBuf, reason: String },

    #[error("key '{key}' not found in section [{section}]")]
    NotFound { section: Section, key: String },

    #[error("invalid value '{value}' for key '{key}'")]
    Invalid { key: String, value: String },

    #[error("cannot access config file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
