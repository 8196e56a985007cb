//! Counting processes in uninterruptible sleep.

use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use crate::collector::procfs::parser::{ProcState, parse_proc_stat};
use crate::collector::traits::FileSystem;
use crate::error::{Error, Result};

/// Counts processes currently in D state.
///
/// Holds no state between calls: every count is a fresh scan of `/proc`.
pub struct DStateMonitor<F: FileSystem> {
    fs: F,
    proc_path: PathBuf,
}

impl<F: FileSystem> DStateMonitor<F> {
    /// # Arguments
    /// * `fs` - Filesystem implementation (real or mock)
    /// * `proc_path` - Base path to proc filesystem (usually "/proc")
    pub fn new(fs: F, proc_path: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            proc_path: proc_path.into(),
        }
    }

    /// Returns the number of processes whose state is `D`.
    ///
    /// Processes that exit during the scan, or whose stat cannot be parsed,
    /// are not counted.
    pub fn count_dstate(&self) -> Result<usize> {
        let entries = self
            .fs
            .read_dir(&self.proc_path)
            .map_err(|e| Error::io(&self.proc_path, e))?;

        let mut count = 0;
        for entry in entries {
            let Some(pid) = pid_of(&entry) else {
                continue;
            };

            let stat_path = entry.join("stat");
            let content = match self.fs.read_to_string(&stat_path) {
                Ok(c) => c,
                Err(_) => {
                    trace!("process {} disappeared during scan", pid);
                    continue;
                }
            };

            match parse_proc_stat(&content) {
                Ok(stat) if stat.state == ProcState::DiskSleep => {
                    debug!("pid {} ({}) is in D state", stat.pid, stat.comm);
                    count += 1;
                }
                Ok(_) => {}
                Err(e) => debug!("skipping pid {}: {}", pid, e),
            }
        }

        Ok(count)
    }
}

fn pid_of(entry: &Path) -> Option<u32> {
    entry.file_name()?.to_str()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::mock::MockFs;

    #[test]
    fn test_count_on_idle_system() {
        let monitor = DStateMonitor::new(MockFs::typical_system(), "/proc");
        assert_eq!(monitor.count_dstate().unwrap(), 0);
    }

    #[test]
    fn test_count_matches_blocked_processes() {
        for k in [1, 3, 17] {
            let monitor = DStateMonitor::new(MockFs::with_blocked_io(k), "/proc");
            assert_eq!(monitor.count_dstate().unwrap(), k as usize);
        }
    }

    #[test]
    fn test_count_ignores_non_pid_entries_and_bad_stats() {
        let mut fs = MockFs::with_blocked_io(2);
        fs.add_file("/proc/self/stat", "1 (fake) D 0");
        fs.add_file("/proc/9999/stat", "garbage");
        fs.add_dir("/proc/9998");

        let monitor = DStateMonitor::new(fs, "/proc");
        assert_eq!(monitor.count_dstate().unwrap(), 2);
    }

    #[test]
    fn test_count_recomputed_each_call() {
        let monitor = DStateMonitor::new(MockFs::with_blocked_io(4), "/proc");
        assert_eq!(monitor.count_dstate().unwrap(), 4);
        assert_eq!(monitor.count_dstate().unwrap(), 4);
    }

    #[test]
    fn test_missing_proc_is_error() {
        let monitor = DStateMonitor::new(MockFs::new(), "/proc");
        assert!(monitor.count_dstate().is_err());
    }
}
