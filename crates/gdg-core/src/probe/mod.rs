//! Probes: which utilities gdg runs and how it runs them.

pub mod catalog;
pub mod runner;

pub use catalog::{
    PathResolver, ProbeDefinition, ProbeKind, RTMON_UTILITY, UtilityResolver, derive_probe_table,
    rtmon_invocation,
};
pub use runner::{ProbeExit, ProbeRunner, ShellRunner};
