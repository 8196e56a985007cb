//! D-state escalation: request a kernel task dump when too many processes are
//! stuck in uninterruptible sleep.
//!
//! Escalation is armed with `--dst <N>`. Every gather cycle then counts
//! D-state processes and, when the count reaches `N`, writes `t` to
//! `/proc/sysrq-trigger` so the kernel logs the stack of every task. It stays
//! armed afterwards; only a stop disarms it.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::PathBuf;

use tracing::{debug, error, info, warn};

use crate::collector::procfs::DStateMonitor;
use crate::collector::traits::FileSystem;
use crate::config::{ConfigError, ConfigStore, EscalationState, keys};
use crate::error::Result;

/// Capability to request the diagnostic dump.
pub trait DiagnosticSink {
    fn trigger(&self) -> io::Result<()>;
}

impl<D: DiagnosticSink + ?Sized> DiagnosticSink for &D {
    fn trigger(&self) -> io::Result<()> {
        (**self).trigger()
    }
}

/// Writes the sysrq `t` command (show task states) to the kernel.
#[derive(Debug, Clone)]
pub struct SysrqTrigger {
    path: PathBuf,
}

impl SysrqTrigger {
    pub const DEFAULT_PATH: &'static str = "/proc/sysrq-trigger";
    /// Sysrq command dumping the state of all tasks.
    pub const SHOW_TASKS: &'static [u8] = b"t";

    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Default for SysrqTrigger {
    fn default() -> Self {
        Self::new(Self::DEFAULT_PATH)
    }
}

impl DiagnosticSink for SysrqTrigger {
    fn trigger(&self) -> io::Result<()> {
        let mut file = OpenOptions::new().write(true).open(&self.path)?;
        file.write_all(Self::SHOW_TASKS)
    }
}

/// Result of one escalation check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EscalationOutcome {
    Disarmed,
    BelowThreshold { count: usize, threshold: u64 },
    Fired { count: usize, threshold: u64 },
    /// The dump was due but the trigger write failed. Not retried.
    TriggerFailed {
        count: usize,
        threshold: u64,
        error: String,
    },
}

impl EscalationOutcome {
    pub fn fired(&self) -> bool {
        matches!(self, EscalationOutcome::Fired { .. })
    }
}

/// Compares the D-state count against the armed threshold.
pub struct EscalationController<F: FileSystem, D: DiagnosticSink> {
    monitor: DStateMonitor<F>,
    sink: D,
}

impl<F: FileSystem, D: DiagnosticSink> EscalationController<F, D> {
    pub fn new(monitor: DStateMonitor<F>, sink: D) -> Self {
        Self { monitor, sink }
    }

    /// Fires the dump if escalation is armed and the current D-state count
    /// is at least the threshold.
    pub fn check_and_escalate<S: ConfigStore>(&self, store: &S) -> Result<EscalationOutcome> {
        let state = EscalationState::from_store(store)?;
        if !state.is_armed() {
            debug!("D-state escalation disarmed");
            return Ok(EscalationOutcome::Disarmed);
        }
        if state.threshold == 0 {
            return Err(ConfigError::Invalid {
                key: keys::NUMPROCS.to_string(),
                value: "0".to_string(),
            }
            .into());
        }

        let count = self.monitor.count_dstate()?;
        let threshold = state.threshold;
        if (count as u64) < threshold {
            debug!("{} D-state processes, threshold {}", count, threshold);
            return Ok(EscalationOutcome::BelowThreshold { count, threshold });
        }

        warn!(
            "{} D-state processes reached threshold {}, triggering sysrq-t",
            count, threshold
        );
        match self.sink.trigger() {
            Ok(()) => {
                info!("Task state dump requested");
                Ok(EscalationOutcome::Fired { count, threshold })
            }
            Err(e) => {
                error!("Cannot trigger task state dump: {}", e);
                Ok(EscalationOutcome::TriggerFailed {
                    count,
                    threshold,
                    error: e.to_string(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::mock::MockFs;
    use crate::config::{MemoryStore, RunStatus};
    use crate::error::Error;
    use std::cell::Cell;
    use tempfile::tempdir;

    #[derive(Default)]
    struct CountingSink {
        fired: Cell<usize>,
        fail: bool,
    }

    impl DiagnosticSink for CountingSink {
        fn trigger(&self) -> io::Result<()> {
            if self.fail {
                return Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied"));
            }
            self.fired.set(self.fired.get() + 1);
            Ok(())
        }
    }

    fn armed_store(threshold: u64) -> MemoryStore {
        let mut store = MemoryStore::new();
        EscalationState {
            threshold,
            status: RunStatus::Started,
        }
        .store_into(&mut store)
        .unwrap();
        store
    }

    fn controller(blocked: u32, sink: &CountingSink) -> EscalationController<MockFs, &CountingSink> {
        EscalationController::new(
            DStateMonitor::new(MockFs::with_blocked_io(blocked), "/proc"),
            sink,
        )
    }

    #[test]
    fn test_fires_at_and_above_threshold_only() {
        let threshold = 5;
        let store = armed_store(threshold);
        let sink = CountingSink::default();

        let outcomes: Vec<EscalationOutcome> = [4, 5, 6]
            .iter()
            .map(|&count| controller(count, &sink).check_and_escalate(&store).unwrap())
            .collect();

        assert_eq!(
            outcomes[0],
            EscalationOutcome::BelowThreshold {
                count: 4,
                threshold: 5
            }
        );
        assert!(outcomes[1].fired());
        assert!(outcomes[2].fired());
        assert_eq!(sink.fired.get(), 2);
        // Still armed for the next tick.
        assert!(EscalationState::from_store(&store).unwrap().is_armed());
    }

    #[test]
    fn test_disarmed_never_fires() {
        let mut store = MemoryStore::new();
        EscalationState::DISARMED.store_into(&mut store).unwrap();
        let sink = CountingSink::default();

        let outcome = controller(50, &sink).check_and_escalate(&store).unwrap();
        assert_eq!(outcome, EscalationOutcome::Disarmed);
        assert_eq!(sink.fired.get(), 0);
    }

    #[test]
    fn test_trigger_failure_is_reported() {
        let store = armed_store(1);
        let sink = CountingSink {
            fail: true,
            ..CountingSink::default()
        };

        let outcome = controller(2, &sink).check_and_escalate(&store).unwrap();
        assert!(matches!(outcome, EscalationOutcome::TriggerFailed { count: 2, .. }));
    }

    #[test]
    fn test_armed_with_zero_threshold_is_rejected() {
        let store = armed_store(0);
        let sink = CountingSink::default();
        assert!(matches!(
            controller(0, &sink).check_and_escalate(&store),
            Err(Error::Config(ConfigError::Invalid { .. }))
        ));
        assert_eq!(sink.fired.get(), 0);
    }

    #[test]
    fn test_sysrq_trigger_writes_t() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sysrq-trigger");
        std::fs::write(&path, "").unwrap();

        SysrqTrigger::new(&path).trigger().unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"t");
    }

    #[test]
    fn test_sysrq_trigger_missing_interface() {
        let dir = tempdir().unwrap();
        assert!(SysrqTrigger::new(dir.path().join("absent")).trigger().is_err());
    }
}
