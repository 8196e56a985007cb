//! Registration of gdg's periodic entry points with an external scheduler.
//!
//! The core only states what should run and how often; turning that into
//! scheduler units is the job of a [`Scheduler`] implementation.

mod systemd;

pub use systemd::SystemdScheduler;

use crate::error::Result;

/// Kinds of scheduled work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    /// `--gather` on a fixed interval.
    Gather,
    /// `--tidylogs` hourly with jitter.
    Tidy,
    /// The long-running rtmon monitor.
    Monitor,
}

/// A unit of scheduled work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduledJob {
    Gather { interval_secs: u32 },
    Tidy,
    Monitor { invocation: String },
}

impl ScheduledJob {
    pub fn kind(&self) -> JobKind {
        match self {
            ScheduledJob::Gather { .. } => JobKind::Gather,
            ScheduledJob::Tidy => JobKind::Tidy,
            ScheduledJob::Monitor { .. } => JobKind::Monitor,
        }
    }
}

/// Something that can run gdg entry points periodically.
pub trait Scheduler {
    /// Installs and enables a job, replacing an existing one of the same kind.
    fn register(&self, job: &ScheduledJob) -> Result<()>;

    /// Disables and removes a job. Removing a job that is not installed is
    /// not an error.
    fn unregister(&self, kind: JobKind) -> Result<()>;
}

impl<S: Scheduler + ?Sized> Scheduler for &S {
    fn register(&self, job: &ScheduledJob) -> Result<()> {
        (**self).register(job)
    }

    fn unregister(&self, kind: JobKind) -> Result<()> {
        (**self).unregister(kind)
    }
}
