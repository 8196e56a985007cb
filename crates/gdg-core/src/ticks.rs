//! Entry points run by the installed timers.
//!
//! `gdg --gather` calls [`on_gather_tick`], `gdg --tidylogs` calls
//! [`on_tidy_tick`]. Both re-read the store first so they always see the
//! state written by the last lifecycle operation.

use chrono::{DateTime, Local, NaiveDate};
use tracing::info;

use crate::collector::traits::FileSystem;
use crate::config::{AgentSettings, ConfigStore};
use crate::error::Result;
use crate::escalation::{DiagnosticSink, EscalationController, EscalationOutcome};
use crate::gather::{GatherReport, Gatherer};
use crate::probe::ProbeRunner;
use crate::tidy::{LogTidy, TidyReport};

/// Result of one gather tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub gather: GatherReport,
    pub escalation: EscalationOutcome,
}

impl TickReport {
    /// True when the escalation dump was due but could not be requested.
    pub fn trigger_failed(&self) -> bool {
        matches!(self.escalation, EscalationOutcome::TriggerFailed { .. })
    }
}

pub fn on_gather_tick<S, R, F, D>(
    store: &mut S,
    gatherer: &Gatherer<R>,
    escalation: &EscalationController<F, D>,
) -> Result<TickReport>
where
    S: ConfigStore,
    R: ProbeRunner,
    F: FileSystem,
    D: DiagnosticSink,
{
    on_gather_tick_at(store, gatherer, escalation, Local::now())
}

/// Runs every probe, then the escalation check.
///
/// The run status is not consulted: a store that still holds a probe table
/// gets gathered, and one without fails with [`Error::NoProbes`](crate::Error::NoProbes).
pub fn on_gather_tick_at<S, R, F, D>(
    store: &mut S,
    gatherer: &Gatherer<R>,
    escalation: &EscalationController<F, D>,
    now: DateTime<Local>,
) -> Result<TickReport>
where
    S: ConfigStore,
    R: ProbeRunner,
    F: FileSystem,
    D: DiagnosticSink,
{
    store.load()?;
    let gather = gatherer.gather_at(store, now)?;
    let escalation = escalation.check_and_escalate(store)?;
    Ok(TickReport { gather, escalation })
}

/// Removes expired log files using the stored retention and data directory.
pub fn on_tidy_tick<S: ConfigStore>(store: &mut S, today: NaiveDate) -> Result<TidyReport> {
    store.load()?;
    let settings = AgentSettings::from_store(store)?;
    info!(
        "Tidying {} (keeping {} days)",
        settings.data_dir.display(),
        settings.logdays
    );
    LogTidy::new(&settings.data_dir).tidy_at(settings.logdays, today)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::mock::MockFs;
    use crate::collector::procfs::DStateMonitor;
    use crate::config::{EscalationState, MemoryStore, RunStatus, Section};
    use crate::gather::log_path;
    use crate::error::Error;
    use crate::probe::ProbeExit;
    use chrono::{Duration, TimeZone};
    use std::cell::Cell;
    use std::fs::{self, File};
    use std::io::{self, Write};
    use std::path::{Path, PathBuf};
    use tempfile::tempdir;

    struct EchoRunner;

    impl ProbeRunner for EchoRunner {
        fn run(&self, invocation: &str, mut stdout: File) -> io::Result<ProbeExit> {
            writeln!(stdout, "{}", invocation)?;
            Ok(ProbeExit { exit_code: Some(0) })
        }
    }

    #[derive(Default)]
    struct Sink {
        fired: Cell<usize>,
    }

    impl DiagnosticSink for Sink {
        fn trigger(&self) -> io::Result<()> {
            self.fired.set(self.fired.get() + 1);
            Ok(())
        }
    }

    fn started_store(data_dir: &Path, status: RunStatus) -> MemoryStore {
        let settings = AgentSettings {
            hostname: "web01".to_string(),
            interval: 30,
            logdays: 7,
            status,
            rtmon: RunStatus::Stopped,
            data_dir: data_dir.to_path_buf(),
            config_file: PathBuf::from("/var/lib/gdg/gdg.cfg"),
        };
        let mut store = MemoryStore::new();
        store.set_all(Section::Global, &settings.to_entries()).unwrap();
        store
            .set(Section::Utility, "vmstat", "/usr/bin/vmstat 1 5")
            .unwrap();
        store
    }

    fn now() -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 10, 14, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_gather_tick_runs_probes_then_escalation() {
        let dir = tempdir().unwrap();
        let mut store = started_store(dir.path(), RunStatus::Started);
        EscalationState {
            threshold: 2,
            status: RunStatus::Started,
        }
        .store_into(&mut store)
        .unwrap();
        let sink = Sink::default();
        let escalation =
            EscalationController::new(DStateMonitor::new(MockFs::with_blocked_io(3), "/proc"), &sink);

        let report =
            on_gather_tick_at(&mut store, &Gatherer::new(EchoRunner), &escalation, now()).unwrap();

        assert_eq!(report.gather.probes.len(), 1);
        assert!(report.escalation.fired());
        assert!(!report.trigger_failed());
        assert_eq!(sink.fired.get(), 1);
        assert!(log_path(dir.path(), "vmstat", now().date_naive()).exists());
    }

    #[test]
    fn test_gather_tick_ignores_run_status() {
        let dir = tempdir().unwrap();
        let mut store = started_store(dir.path(), RunStatus::Stopped);
        let sink = Sink::default();
        let escalation =
            EscalationController::new(DStateMonitor::new(MockFs::typical_system(), "/proc"), &sink);

        let report =
            on_gather_tick_at(&mut store, &Gatherer::new(EchoRunner), &escalation, now()).unwrap();

        assert_eq!(report.gather.probes.len(), 1);
        assert_eq!(report.escalation, EscalationOutcome::Disarmed);
        let log = fs::read_to_string(log_path(dir.path(), "vmstat", now().date_naive())).unwrap();
        assert!(log.ends_with("/usr/bin/vmstat 1 5\n"));
    }

    #[test]
    fn test_gather_tick_without_probe_table() {
        let dir = tempdir().unwrap();
        let mut store = started_store(dir.path(), RunStatus::Started);
        store.clear_section(Section::Utility).unwrap();
        let sink = Sink::default();
        let escalation =
            EscalationController::new(DStateMonitor::new(MockFs::with_blocked_io(9), "/proc"), &sink);
        EscalationState {
            threshold: 1,
            status: RunStatus::Started,
        }
        .store_into(&mut store)
        .unwrap();

        let result = on_gather_tick_at(&mut store, &Gatherer::new(EchoRunner), &escalation, now());

        assert!(matches!(result, Err(Error::NoProbes)));
        assert_eq!(sink.fired.get(), 0);
    }

    #[test]
    fn test_tidy_tick_uses_stored_retention() {
        let dir = tempdir().unwrap();
        let mut store = started_store(dir.path(), RunStatus::Started);
        let today = now().date_naive();
        let old = log_path(dir.path(), "vmstat", today - Duration::days(7));
        let recent = log_path(dir.path(), "vmstat", today - Duration::days(6));
        fs::create_dir_all(old.parent().unwrap()).unwrap();
        fs::write(&old, b"old").unwrap();
        fs::write(&recent, b"recent").unwrap();

        let report = on_tidy_tick(&mut store, today).unwrap();

        assert_eq!(report.files_removed, 1);
        assert!(!old.exists());
        assert!(recent.exists());
    }

    #[test]
    fn test_ticks_without_store_fail() {
        let mut store = MemoryStore::new();
        assert!(on_tidy_tick(&mut store, now().date_naive()).is_err());
    }
}
