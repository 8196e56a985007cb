//! systemd timers and services.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, info, warn};

use super::{JobKind, ScheduledJob, Scheduler};
use crate::error::{Error, Result};

/// Randomized delay of the hourly tidy timer, in seconds.
const TIDY_RANDOMIZED_DELAY: u32 = 900;

/// Installs gdg jobs as systemd units and enables them with `systemctl`.
#[derive(Debug, Clone)]
pub struct SystemdScheduler {
    unit_dir: PathBuf,
    executable: PathBuf,
    config_file: PathBuf,
    systemctl: Option<PathBuf>,
}

impl SystemdScheduler {
    pub const DEFAULT_UNIT_DIR: &'static str = "/etc/systemd/system";

    /// # Arguments
    /// * `executable` - gdg binary invoked by the units
    /// * `config_file` - passed to the binary as `--config`
    pub fn new(executable: impl Into<PathBuf>, config_file: impl Into<PathBuf>) -> Self {
        Self {
            unit_dir: PathBuf::from(Self::DEFAULT_UNIT_DIR),
            executable: executable.into(),
            config_file: config_file.into(),
            systemctl: None,
        }
    }

    /// Writes units somewhere other than `/etc/systemd/system`.
    pub fn with_unit_dir(mut self, unit_dir: impl Into<PathBuf>) -> Self {
        self.unit_dir = unit_dir.into();
        self
    }

    /// Uses a specific `systemctl` instead of looking it up on `$PATH`.
    pub fn with_systemctl(mut self, systemctl: impl Into<PathBuf>) -> Self {
        self.systemctl = Some(systemctl.into());
        self
    }

    fn systemctl(&self, args: &[&str]) -> Result<()> {
        let systemctl = match &self.systemctl {
            Some(path) => path.clone(),
            None => which::which("systemctl")
                .map_err(|_| Error::scheduler("cannot find 'systemctl' executable"))?,
        };

        debug!("systemctl {}", args.join(" "));
        let status = Command::new(&systemctl)
            .args(args)
            .status()
            .map_err(|e| Error::scheduler(format!("cannot run systemctl: {}", e)))?;
        if !status.success() {
            return Err(Error::scheduler(format!(
                "'systemctl {}' failed with {}",
                args.join(" "),
                status
            )));
        }
        Ok(())
    }

    fn exec_start(&self, action: &str) -> String {
        format!(
            "{} --config {} {}",
            quote_arg(&self.executable),
            quote_arg(&self.config_file),
            action
        )
    }

    /// Unit files for a job as `(file name, content)`.
    pub fn render(&self, job: &ScheduledJob) -> Vec<(String, String)> {
        match job {
            ScheduledJob::Gather { interval_secs } => vec![
                (
                    "gdg.timer".to_string(),
                    format!(
                        "[Unit]\n\
                         Description=Granular Data Gatherer Timer\n\
                         Requires=gdg.service\n\
                         \n\
                         [Timer]\n\
                         OnActiveSec=0\n\
                         OnUnitActiveSec={}\n\
                         AccuracySec=500msec\n\
                         \n\
                         [Install]\n\
                         WantedBy=timers.target\n",
                        interval_secs
                    ),
                ),
                (
                    "gdg.service".to_string(),
                    format!(
                        "[Unit]\n\
                         Description=Granular Data Gatherer\n\
                         Wants=gdg.timer\n\
                         \n\
                         [Service]\n\
                         Type=oneshot\n\
                         ExecStart={}\n",
                        self.exec_start("--gather")
                    ),
                ),
            ],
            ScheduledJob::Tidy => vec![
                (
                    "gdg-tidy.timer".to_string(),
                    format!(
                        "[Unit]\n\
                         Description=Granular Data Gatherer Tidylogs Timer\n\
                         Requires=gdg-tidy.service\n\
                         \n\
                         [Timer]\n\
                         OnCalendar=hourly\n\
                         RandomizedDelaySec={}\n\
                         \n\
                         [Install]\n\
                         WantedBy=timers.target\n",
                        TIDY_RANDOMIZED_DELAY
                    ),
                ),
                (
                    "gdg-tidy.service".to_string(),
                    format!(
                        "[Unit]\n\
                         Description=Granular Data Gatherer Tidylogs\n\
                         Wants=gdg-tidy.timer\n\
                         \n\
                         [Service]\n\
                         Type=oneshot\n\
                         ExecStart={}\n",
                        self.exec_start("--tidylogs")
                    ),
                ),
            ],
            ScheduledJob::Monitor { invocation } => vec![(
                "gdg-rtmon.service".to_string(),
                format!(
                    "[Unit]\n\
                     Description=Granular Data Gatherer rtmon\n\
                     \n\
                     [Service]\n\
                     Type=simple\n\
                     ExecStart={}\n\
                     Restart=on-failure\n\
                     \n\
                     [Install]\n\
                     WantedBy=multi-user.target\n",
                    invocation
                ),
            )],
        }
    }

    /// Units of a job kind; the first one is the unit that gets enabled.
    fn unit_names(kind: JobKind) -> &'static [&'static str] {
        match kind {
            JobKind::Gather => &["gdg.timer", "gdg.service"],
            JobKind::Tidy => &["gdg-tidy.timer", "gdg-tidy.service"],
            JobKind::Monitor => &["gdg-rtmon.service"],
        }
    }
}

impl Scheduler for SystemdScheduler {
    fn register(&self, job: &ScheduledJob) -> Result<()> {
        fs::create_dir_all(&self.unit_dir).map_err(|e| Error::io(&self.unit_dir, e))?;

        let units = self.render(job);
        for (name, content) in &units {
            let path = self.unit_dir.join(name);
            fs::write(&path, content).map_err(|e| Error::io(&path, e))?;
            debug!("Wrote {}", path.display());
        }

        self.systemctl(&["daemon-reload"])?;
        let primary = Self::unit_names(job.kind())[0];
        self.systemctl(&["enable", "--now", primary])?;
        info!("Enabled {}", primary);
        Ok(())
    }

    fn unregister(&self, kind: JobKind) -> Result<()> {
        let names = Self::unit_names(kind);

        if let Err(e) = self.systemctl(&["disable", "--now", names[0]]) {
            warn!("Cannot disable {}: {}", names[0], e);
        }

        for name in names {
            let path = self.unit_dir.join(name);
            match fs::remove_file(&path) {
                Ok(()) => debug!("Removed {}", path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!("Cannot remove {}: {}", path.display(), e),
            }
        }

        if let Err(e) = self.systemctl(&["daemon-reload"]) {
            warn!("{}", e);
        }
        info!("Disabled {}", names[0]);
        Ok(())
    }
}

/// Quotes a path for an `ExecStart=` line if it contains whitespace.
fn quote_arg(path: &Path) -> String {
    let s = path.display().to_string();
    if s.contains(char::is_whitespace) {
        format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
    } else {
        s
    }
}
