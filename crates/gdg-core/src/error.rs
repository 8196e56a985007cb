use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::collector::procfs::ParseError;
use crate::config::ConfigError;

/// Error type for every fallible gdg operation.
///
/// Per-probe and per-file failures are not represented here: they are logged
/// and counted in the gather/tidy reports instead.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("invalid argument: {0}")]
    Validation(String),

    #[error("probe table is empty, start gdg first")]
    NoProbes,

    #[error("gdg is not started")]
    NotStarted,

    #[error("cannot find '{0}' executable")]
    UtilityMissing(String),

    #[error("scheduler error: {0}")]
    Scheduler(String),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Result type alias for gdg operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        Error::Validation(msg.into())
    }

    pub fn scheduler<S: Into<String>>(msg: S) -> Self {
        Error::Scheduler(msg.into())
    }

    /// Wraps an I/O error with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::Io {
            context: path.into().display().to_string(),
            source,
        }
    }
}
