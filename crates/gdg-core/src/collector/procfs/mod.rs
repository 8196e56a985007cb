//! Readers for the Linux `/proc` filesystem.

pub mod dstate;
pub mod parser;

pub use dstate::DStateMonitor;
pub use parser::{ParseError, ProcStat, ProcState, ProcStatus, parse_proc_stat, parse_proc_status};
