//! Start, stop and reload of the agent, plus the escalation and rtmon toggles.
//!
//! Every operation validates its arguments before touching the store and
//! reports the status change as a [`Transition`].

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::config::{
    AgentSettings, ConfigError, ConfigStore, EscalationState, RunStatus, Section, keys, run_status,
};
use crate::error::{Error, Result};
use crate::probe::{RTMON_UTILITY, UtilityResolver, derive_probe_table, rtmon_invocation};
use crate::schedule::{JobKind, ScheduledJob, Scheduler};

/// Name of the data directory created next to the config file.
pub const DATA_DIR_NAME: &str = "gdg-data";

/// Default data directory for a config file: `<config dir>/gdg-data`.
pub fn default_data_dir(config_file: &Path) -> PathBuf {
    config_file
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(DATA_DIR_NAME)
}

/// Optional overrides for start and reload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StartOptions {
    /// Gathering interval in seconds.
    pub interval: Option<u32>,
    /// Log retention in days.
    pub logdays: Option<u32>,
}

impl StartOptions {
    pub fn validate(&self) -> Result<()> {
        if let Some(interval) = self.interval {
            validate_interval(interval)?;
        }
        if let Some(logdays) = self.logdays {
            validate_logdays(logdays)?;
        }
        Ok(())
    }
}

fn validate_interval(interval: u32) -> Result<()> {
    if interval == 0 || interval > AgentSettings::MAX_INTERVAL {
        return Err(Error::validation(format!(
            "interval must be between 1 and {} seconds, got {}",
            AgentSettings::MAX_INTERVAL,
            interval
        )));
    }
    Ok(())
}

fn validate_logdays(logdays: u32) -> Result<()> {
    if logdays == 0 {
        return Err(Error::validation("logdays must be greater than 0"));
    }
    Ok(())
}

/// Status before and after an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub before: RunStatus,
    pub after: RunStatus,
    /// False when the operation was a no-op.
    pub changed: bool,
}

impl Transition {
    fn unchanged(status: RunStatus) -> Self {
        Self {
            before: status,
            after: status,
            changed: false,
        }
    }

    fn to(before: RunStatus, after: RunStatus) -> Self {
        Self {
            before,
            after,
            changed: true,
        }
    }
}

/// Drives the run status and keeps the scheduler in step with it.
pub struct Lifecycle<C: Scheduler, R: UtilityResolver> {
    scheduler: C,
    resolver: R,
    hostname: String,
}

impl<C: Scheduler, R: UtilityResolver> Lifecycle<C, R> {
    /// # Arguments
    /// * `scheduler` - Where the gather, tidy and rtmon jobs get registered
    /// * `resolver` - Utility lookup used to build the probe table
    /// * `hostname` - Written to the store on every start
    pub fn new(scheduler: C, resolver: R, hostname: impl Into<String>) -> Self {
        Self {
            scheduler,
            resolver,
            hostname: hostname.into(),
        }
    }

    /// Starts gathering. Creates the store on first start.
    ///
    /// A started agent is left alone, including its probe table.
    pub fn start<S: ConfigStore>(&self, store: &mut S, options: &StartOptions) -> Result<Transition> {
        options.validate()?;

        let stored = match store.load() {
            Ok(()) => Some(AgentSettings::from_store(store)?),
            Err(ConfigError::Missing(_)) => {
                info!("Creating {}", store.path().display());
                None
            }
            Err(e) => return Err(e.into()),
        };

        if let Some(settings) = &stored
            && settings.status.is_started()
        {
            info!("gdg is already started");
            return Ok(Transition::unchanged(RunStatus::Started));
        }

        let config_file = store.path().to_path_buf();
        let settings = AgentSettings {
            hostname: self.hostname.clone(),
            interval: options
                .interval
                .or(stored.as_ref().map(|s| s.interval))
                .unwrap_or(AgentSettings::DEFAULT_INTERVAL),
            logdays: options
                .logdays
                .or(stored.as_ref().map(|s| s.logdays))
                .unwrap_or(AgentSettings::DEFAULT_LOGDAYS),
            status: RunStatus::Started,
            rtmon: stored.as_ref().map_or(RunStatus::Stopped, |s| s.rtmon),
            data_dir: stored
                .as_ref()
                .map(|s| s.data_dir.clone())
                .unwrap_or_else(|| default_data_dir(&config_file)),
            config_file,
        };
        // Stored values may have been edited by hand.
        validate_interval(settings.interval)?;
        validate_logdays(settings.logdays)?;

        let probes = derive_probe_table(&self.resolver);
        if probes.is_empty() {
            return Err(Error::NoProbes);
        }

        for probe in &probes {
            let dir = settings.data_dir.join(&probe.name);
            fs::create_dir_all(&dir).map_err(|e| Error::io(&dir, e))?;
        }

        // Status is started before the timers go live: `enable --now` fires
        // the first gather tick immediately.
        store.set_all(Section::Global, &settings.to_entries())?;
        store.clear_section(Section::Utility)?;
        let table: Vec<(String, String)> = probes
            .into_iter()
            .map(|p| (p.name, p.invocation))
            .collect();
        store.set_all(Section::Utility, &table)?;
        if store.entries(Section::DState).is_empty() {
            EscalationState::DISARMED.store_into(store)?;
        }

        if let Err(e) = self.register_timers(settings.interval) {
            warn!("Cannot install timers, leaving gdg stopped");
            let reset = store.set(Section::Global, keys::STATUS, RunStatus::Stopped.as_str());
            if let Err(reset) = reset {
                warn!("Cannot reset status: {}", reset);
            }
            return Err(e);
        }

        info!(
            "gdg started: {} probes every {}s, logs kept {} days in {}",
            table.len(),
            settings.interval,
            settings.logdays,
            settings.data_dir.display()
        );
        Ok(Transition::to(RunStatus::Stopped, RunStatus::Started))
    }

    fn register_timers(&self, interval_secs: u32) -> Result<()> {
        self.scheduler.register(&ScheduledJob::Gather { interval_secs })?;
        if let Err(e) = self.scheduler.register(&ScheduledJob::Tidy) {
            if let Err(undo) = self.scheduler.unregister(JobKind::Gather) {
                warn!("Cannot remove gather timer: {}", undo);
            }
            return Err(e);
        }
        Ok(())
    }

    /// Stops gathering and disarms escalation.
    pub fn stop<S: ConfigStore>(&self, store: &mut S) -> Result<Transition> {
        store.load()?;
        let before = run_status(store)?;
        if !before.is_started() {
            info!("gdg is already stopped");
            return Ok(Transition::unchanged(before));
        }

        self.scheduler.unregister(JobKind::Gather)?;
        self.scheduler.unregister(JobKind::Tidy)?;
        EscalationState::DISARMED.store_into(store)?;
        store.set(Section::Global, keys::STATUS, RunStatus::Stopped.as_str())?;

        info!("gdg stopped");
        Ok(Transition::to(before, RunStatus::Stopped))
    }

    /// Stops (if started) and starts again with a freshly derived probe
    /// table. Escalation is always disarmed afterwards.
    pub fn reload<S: ConfigStore>(&self, store: &mut S, options: &StartOptions) -> Result<Transition> {
        options.validate()?;

        let stopped = self.stop(store)?;
        if !stopped.changed {
            EscalationState::DISARMED.store_into(store)?;
        }
        let started = self.start(store, options)?;

        Ok(Transition::to(stopped.before, started.after))
    }

    /// Arms D-state escalation with a process count threshold.
    pub fn arm_escalation<S: ConfigStore>(&self, store: &mut S, threshold: u64) -> Result<Transition> {
        if threshold == 0 {
            return Err(Error::validation("D-state threshold must be greater than 0"));
        }
        store.load()?;
        if !run_status(store)?.is_started() {
            return Err(Error::NotStarted);
        }

        let before = EscalationState::from_store(store)?;
        let armed = EscalationState {
            threshold,
            status: RunStatus::Started,
        };
        if before == armed {
            info!("D-state escalation already armed at {}", threshold);
            return Ok(Transition::unchanged(RunStatus::Started));
        }

        armed.store_into(store)?;
        info!("D-state escalation armed at {} processes", threshold);
        Ok(Transition::to(before.status, RunStatus::Started))
    }

    /// Flips the rtmon monitor on or off.
    pub fn toggle_monitor<S: ConfigStore>(&self, store: &mut S) -> Result<Transition> {
        store.load()?;
        let settings = AgentSettings::from_store(store)?;

        if settings.rtmon.is_started() {
            self.scheduler.unregister(JobKind::Monitor)?;
            store.set(Section::Global, keys::RTMON, RunStatus::Stopped.as_str())?;
            info!("rtmon stopped");
            return Ok(Transition::to(RunStatus::Started, RunStatus::Stopped));
        }

        let executable = self
            .resolver
            .resolve(RTMON_UTILITY)
            .ok_or_else(|| Error::UtilityMissing(RTMON_UTILITY.to_string()))?;
        let dir = settings.data_dir.join(RTMON_UTILITY);
        fs::create_dir_all(&dir).map_err(|e| Error::io(&dir, e))?;

        self.scheduler.register(&ScheduledJob::Monitor {
            invocation: rtmon_invocation(&executable, &settings.data_dir),
        })?;
        if let Err(e) = store.set(Section::Global, keys::RTMON, RunStatus::Started.as_str()) {
            warn!("rtmon registered but its status was not saved");
            return Err(e.into());
        }
        info!("rtmon started, logging to {}", dir.display());
        Ok(Transition::to(RunStatus::Stopped, RunStatus::Started))
    }
}
