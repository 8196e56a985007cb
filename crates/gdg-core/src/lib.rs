//! gdg-core - state and execution engine of the granular data gatherer.
//!
//! Provides:
//! - `config` - persistent sectioned key/value store (file-backed and in-memory)
//! - `collector` - `/proc` access, parsers and the D-state monitor
//! - `probe` - probe catalog, utility discovery, shell runner
//! - `gather` - one gather cycle over the probe table
//! - `escalation` - D-state threshold check and sysrq trigger
//! - `tidy` - retention cleanup of daily log files
//! - `lifecycle` - start/stop/reload state machine
//! - `schedule` - scheduler collaborator (systemd units)
//! - `status` - read-only operator status report
//! - `ticks` - entry points invoked by the scheduler

pub mod collector;
pub mod config;
pub mod error;
pub mod escalation;
pub mod fmt;
pub mod gather;
pub mod lifecycle;
pub mod probe;
pub mod schedule;
pub mod status;
pub mod ticks;
pub mod tidy;
pub mod util;

pub use error::{Error, Result};

/// Process name written into log headers and unit descriptions.
pub const PROG_NAME: &str = "gdg";

/// Version written into log headers.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
