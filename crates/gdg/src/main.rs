//! gdg - granular data gatherer.
//!
//! Lifecycle commands (`--start`, `--stop`, `--reload`, `--dst`, `--rtmon`)
//! are run by an operator; `--gather` and `--tidylogs` are run by the systemd
//! timers that `--start` installs.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use chrono::Local;
use clap::error::ErrorKind;
use clap::{ArgGroup, CommandFactory, Parser};
use tracing::{Level, debug, error};
use tracing_subscriber::EnvFilter;

use gdg_core::collector::{DStateMonitor, RealFs};
use gdg_core::config::{ConfigStore, FileStore};
use gdg_core::escalation::{EscalationController, EscalationOutcome, SysrqTrigger};
use gdg_core::gather::Gatherer;
use gdg_core::lifecycle::{Lifecycle, StartOptions, Transition};
use gdg_core::probe::{PathResolver, ShellRunner};
use gdg_core::schedule::SystemdScheduler;
use gdg_core::status::StatusReport;
use gdg_core::ticks::{TickReport, on_gather_tick, on_tidy_tick};
use gdg_core::tidy::TidyReport;
use gdg_core::util::{is_root, short_hostname};
use gdg_core::{Error, PROG_NAME, Result, VERSION};

/// Default location of the configuration file.
const DEFAULT_CONFIG: &str = "/var/lib/gdg/gdg.cfg";

#[derive(Parser, Debug)]
#[command(name = "gdg", about = "Granular data gatherer", version)]
#[command(group(
    ArgGroup::new("action")
        .required(true)
        .args(["start", "stop", "reload", "status", "gather", "tidylogs", "rtmon", "dst"])
))]
#[command(group(ArgGroup::new("lifecycle").args(["start", "reload"])))]
struct Args {
    /// Start gathering and install the systemd timers.
    #[arg(long)]
    start: bool,

    /// Stop gathering and remove the timers. Disarms D-state escalation.
    #[arg(long)]
    stop: bool,

    /// Stop, then start again with a fresh probe table.
    #[arg(long)]
    reload: bool,

    /// Show the current state.
    #[arg(long)]
    status: bool,

    /// Run every probe once (invoked by gdg.timer).
    #[arg(long)]
    gather: bool,

    /// Remove log files past the retention window (invoked by gdg-tidy.timer).
    #[arg(long)]
    tidylogs: bool,

    /// Toggle the rtmon monitor on or off.
    #[arg(long)]
    rtmon: bool,

    /// Arm D-state escalation: dump task states once N processes are in D state.
    #[arg(long, value_name = "N")]
    dst: Option<u64>,

    /// Gathering interval in seconds.
    #[arg(long, value_name = "SECS", requires = "lifecycle")]
    interval: Option<u32>,

    /// Days of logs to keep.
    #[arg(long, value_name = "DAYS", requires = "lifecycle")]
    logdays: Option<u32>,

    /// Print --status as JSON.
    #[arg(long)]
    json: bool,

    /// Configuration file.
    #[arg(long, value_name = "PATH", env = "GDG_CONFIG", default_value = DEFAULT_CONFIG)]
    config: PathBuf,

    /// Increase logging verbosity (-v for debug, -vv for trace). Default is info level.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode - only show errors.
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Start,
    Stop,
    Reload,
    Status,
    Gather,
    Tidy,
    Rtmon,
    Dst(u64),
}

impl Action {
    /// Only reading the state is allowed without root.
    fn needs_root(self) -> bool {
        self != Action::Status
    }
}

impl Args {
    fn action(&self) -> Action {
        if self.start {
            Action::Start
        } else if self.stop {
            Action::Stop
        } else if self.reload {
            Action::Reload
        } else if self.gather {
            Action::Gather
        } else if self.tidylogs {
            Action::Tidy
        } else if self.rtmon {
            Action::Rtmon
        } else if let Some(n) = self.dst {
            Action::Dst(n)
        } else {
            Action::Status
        }
    }

    /// Checks combinations the derive attributes cannot express.
    fn validate(self) -> std::result::Result<Self, clap::Error> {
        if self.json && !self.status {
            return Err(Args::command().error(
                ErrorKind::ArgumentConflict,
                "--json can only be used with --status",
            ));
        }
        Ok(self)
    }

    fn start_options(&self) -> StartOptions {
        StartOptions {
            interval: self.interval,
            logdays: self.logdays,
        }
    }
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else {
        match verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("gdg={},gdg_core={}", level, level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn print_transition(what: &str, t: &Transition) {
    if t.changed {
        println!("{}: {} -> {}", what, t.before, t.after);
    } else {
        println!("{}: already {}", what, t.after);
    }
}

fn gather_summary(report: &TickReport) -> String {
    let gather = format!(
        "gather: {} probes, {} failed",
        report.gather.probes.len(),
        report.gather.failed_count()
    );
    let escalation = match &report.escalation {
        EscalationOutcome::Disarmed => "d-state: disarmed".to_string(),
        EscalationOutcome::BelowThreshold { count, threshold } => {
            format!("d-state: {} processes, threshold {}", count, threshold)
        }
        EscalationOutcome::Fired { count, threshold } => format!(
            "d-state: {} processes reached threshold {}, task dump requested",
            count, threshold
        ),
        EscalationOutcome::TriggerFailed {
            count,
            threshold,
            error,
        } => format!(
            "d-state: {} processes reached threshold {}, task dump failed: {}",
            count, threshold, error
        ),
    };
    format!("{}\n{}", gather, escalation)
}

fn tidy_summary(report: &TidyReport) -> String {
    let mut line = format!(
        "tidy: removed {} files ({}), kept {}",
        report.files_removed,
        gdg_core::fmt::format_bytes(report.bytes_freed),
        report.files_kept
    );
    if report.files_failed > 0 {
        line.push_str(&format!(", {} could not be removed", report.files_failed));
    }
    line
}

fn lifecycle(config: &Path) -> Result<Lifecycle<SystemdScheduler, PathResolver>> {
    let executable =
        std::env::current_exe().map_err(|e| Error::io("current executable", e))?;
    debug!("Units will run {}", executable.display());
    Ok(Lifecycle::new(
        SystemdScheduler::new(executable, config),
        PathResolver,
        short_hostname(&RealFs::new()),
    ))
}

fn run(args: &Args, action: Action) -> Result<ExitCode> {
    let config = std::path::absolute(&args.config).map_err(|e| Error::io(&args.config, e))?;
    let mut store = FileStore::new(&config);

    match action {
        Action::Start => {
            let t = lifecycle(&config)?.start(&mut store, &args.start_options())?;
            print_transition(PROG_NAME, &t);
        }
        Action::Stop => {
            let t = lifecycle(&config)?.stop(&mut store)?;
            print_transition(PROG_NAME, &t);
        }
        Action::Reload => {
            let t = lifecycle(&config)?.reload(&mut store, &args.start_options())?;
            print_transition(PROG_NAME, &t);
        }
        Action::Dst(threshold) => {
            let t = lifecycle(&config)?.arm_escalation(&mut store, threshold)?;
            print_transition("d-state", &t);
        }
        Action::Rtmon => {
            let t = lifecycle(&config)?.toggle_monitor(&mut store)?;
            print_transition("rtmon", &t);
        }
        Action::Status => {
            store.load()?;
            let report = StatusReport::collect(&store)?;
            if args.json {
                match serde_json::to_string_pretty(&report) {
                    Ok(json) => println!("{}", json),
                    Err(e) => {
                        error!("Cannot serialize status: {}", e);
                        return Ok(ExitCode::FAILURE);
                    }
                }
            } else {
                println!("{}", report);
            }
        }
        Action::Gather => {
            let gatherer = Gatherer::new(ShellRunner::default());
            let escalation = EscalationController::new(
                DStateMonitor::new(RealFs::new(), "/proc"),
                SysrqTrigger::default(),
            );
            let report = on_gather_tick(&mut store, &gatherer, &escalation)?;
            println!("{}", gather_summary(&report));
            if report.trigger_failed() {
                return Ok(ExitCode::FAILURE);
            }
        }
        Action::Tidy => {
            let report = on_tidy_tick(&mut store, Local::now().date_naive())?;
            println!("{}", tidy_summary(&report));
        }
    }

    debug!("Config at {}", store.path().display());
    Ok(ExitCode::SUCCESS)
}

fn main() -> ExitCode {
    let args = Args::parse().validate().unwrap_or_else(|e| e.exit());
    init_logging(args.verbose, args.quiet);

    let action = args.action();
    debug!("{} {} {:?}", PROG_NAME, VERSION, action);

    if action.needs_root() && !is_root(&RealFs::new()) {
        eprintln!("{}: must be run as root", PROG_NAME);
        return ExitCode::FAILURE;
    }

    match run(&args, action) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}: {}", PROG_NAME, e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gdg_core::gather::{GatherReport, ProbeResult};

    fn parse(argv: &[&str]) -> std::result::Result<Args, clap::Error> {
        Args::try_parse_from(argv).and_then(Args::validate)
    }

    #[test]
    fn test_args_are_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_start_with_options() {
        let args = Args::try_parse_from(["gdg", "--start", "--interval", "60", "--logdays", "3"])
            .unwrap();
        assert_eq!(args.action(), Action::Start);
        assert_eq!(
            args.start_options(),
            StartOptions {
                interval: Some(60),
                logdays: Some(3)
            }
        );
    }

    #[test]
    fn test_actions_are_exclusive() {
        assert!(Args::try_parse_from(["gdg", "--start", "--stop"]).is_err());
        assert!(Args::try_parse_from(["gdg", "--gather", "--dst", "5"]).is_err());
    }

    #[test]
    fn test_action_is_required() {
        assert!(Args::try_parse_from(["gdg"]).is_err());
        assert!(Args::try_parse_from(["gdg", "-v"]).is_err());
    }

    #[test]
    fn test_interval_requires_start_or_reload() {
        assert!(Args::try_parse_from(["gdg", "--stop", "--interval", "10"]).is_err());
        assert!(Args::try_parse_from(["gdg", "--reload", "--interval", "10"]).is_ok());
    }

    #[test]
    fn test_dst_and_status_actions() {
        let args = Args::try_parse_from(["gdg", "--dst", "12"]).unwrap();
        assert_eq!(args.action(), Action::Dst(12));
        assert!(args.action().needs_root());

        let args = parse(&["gdg", "--status", "--json"]).unwrap();
        assert_eq!(args.action(), Action::Status);
        assert!(!args.action().needs_root());
    }

    #[test]
    fn test_json_only_with_status() {
        let err = parse(&["gdg", "--gather", "--json"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ArgumentConflict);
        assert!(parse(&["gdg", "--dst", "3", "--json"]).is_err());
        assert!(parse(&["gdg", "--status"]).is_ok());
        assert!(parse(&["gdg", "--gather"]).is_ok());
    }

    #[test]
    fn test_gather_summary() {
        let report = TickReport {
            gather: GatherReport {
                probes: vec![
                    ProbeResult {
                        name: "vmstat".to_string(),
                        bytes_written: 120,
                        error: None,
                    },
                    ProbeResult {
                        name: "iostat".to_string(),
                        bytes_written: 0,
                        error: Some("exited with code 1".to_string()),
                    },
                ],
            },
            escalation: EscalationOutcome::BelowThreshold {
                count: 2,
                threshold: 5,
            },
        };
        assert_eq!(
            gather_summary(&report),
            "gather: 2 probes, 1 failed\nd-state: 2 processes, threshold 5"
        );

        let report = TickReport {
            gather: GatherReport::default(),
            escalation: EscalationOutcome::TriggerFailed {
                count: 7,
                threshold: 5,
                error: "permission denied".to_string(),
            },
        };
        assert!(report.trigger_failed());
        assert!(gather_summary(&report).ends_with("task dump failed: permission denied"));
    }

    #[test]
    fn test_tidy_summary() {
        let mut report = TidyReport {
            files_removed: 3,
            files_kept: 9,
            bytes_freed: 2048,
            ..TidyReport::default()
        };
        let line = tidy_summary(&report);
        assert!(line.starts_with("tidy: removed 3 files ("), "{}", line);
        assert!(line.ends_with("), kept 9"), "{}", line);

        report.files_failed = 1;
        assert!(tidy_summary(&report).ends_with(", 1 could not be removed"));
    }

    #[test]
    fn test_config_path() {
        let args = Args::try_parse_from(["gdg", "--status", "--config", "/tmp/x.cfg"]).unwrap();
        assert_eq!(args.config, PathBuf::from("/tmp/x.cfg"));
    }
}
