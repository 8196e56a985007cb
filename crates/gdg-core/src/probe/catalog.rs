//! The fixed set of probes and discovery of the utilities behind them.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

/// Every probe gdg knows about, in gather order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProbeKind {
    Iostat,
    Top,
    Mpstat,
    Vmstat,
    Ss,
    Nstat,
    Ps,
    Nfsiostat,
    Ethtool,
    Ip,
    Pidstat,
    Meminfo,
    Slabinfo,
}

impl ProbeKind {
    pub const ALL: [ProbeKind; 13] = [
        ProbeKind::Iostat,
        ProbeKind::Top,
        ProbeKind::Mpstat,
        ProbeKind::Vmstat,
        ProbeKind::Ss,
        ProbeKind::Nstat,
        ProbeKind::Ps,
        ProbeKind::Nfsiostat,
        ProbeKind::Ethtool,
        ProbeKind::Ip,
        ProbeKind::Pidstat,
        ProbeKind::Meminfo,
        ProbeKind::Slabinfo,
    ];

    /// Probe name: key in the probe table and log subdirectory.
    pub fn name(self) -> &'static str {
        match self {
            ProbeKind::Iostat => "iostat",
            ProbeKind::Top => "top",
            ProbeKind::Mpstat => "mpstat",
            ProbeKind::Vmstat => "vmstat",
            ProbeKind::Ss => "ss",
            ProbeKind::Nstat => "nstat",
            ProbeKind::Ps => "ps",
            ProbeKind::Nfsiostat => "nfsiostat",
            ProbeKind::Ethtool => "ethtool",
            ProbeKind::Ip => "ip",
            ProbeKind::Pidstat => "pidstat",
            ProbeKind::Meminfo => "meminfo",
            ProbeKind::Slabinfo => "slabinfo",
        }
    }

    /// Executable looked up on `$PATH`.
    pub fn utility(self) -> &'static str {
        match self {
            ProbeKind::Meminfo | ProbeKind::Slabinfo => "cat",
            other => other.name(),
        }
    }

    /// Arguments appended to the resolved executable path.
    pub fn args(self) -> &'static str {
        match self {
            ProbeKind::Iostat => " 1 3 -t -k -x -N",
            ProbeKind::Top => " -c -b -n 1",
            ProbeKind::Mpstat => " 1 2 -P ALL",
            ProbeKind::Vmstat => " -d",
            ProbeKind::Ss => " -neopa",
            ProbeKind::Nstat => " -asz",
            ProbeKind::Ps => {
                " -eo user,pid,ppid,%cpu,%mem,vsz,rss,tty,stat,start,time,wchan:32,args"
            }
            ProbeKind::Nfsiostat => " 1 3",
            ProbeKind::Ethtool => " -S",
            ProbeKind::Ip => " -s -s addr",
            ProbeKind::Pidstat => "",
            ProbeKind::Meminfo => " /proc/meminfo",
            ProbeKind::Slabinfo => " /proc/slabinfo",
        }
    }

    /// Full invocation string for a resolved executable.
    pub fn invocation(self, executable: &Path) -> String {
        format!("{}{}", executable.display(), self.args())
    }
}

/// Executable behind the `--rtmon` monitor probe.
pub const RTMON_UTILITY: &str = "rtmon";

/// Invocation of the long-running rtmon monitor, logging under `data_dir`.
pub fn rtmon_invocation(executable: &Path, data_dir: &Path) -> String {
    format!(
        "{} file {}",
        executable.display(),
        data_dir.join(RTMON_UTILITY).join("rtmon.log").display()
    )
}

/// One entry of the probe table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeDefinition {
    pub name: String,
    pub invocation: String,
}

impl ProbeDefinition {
    pub fn new(name: impl Into<String>, invocation: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            invocation: invocation.into(),
        }
    }
}

/// Static lookup from utility name to executable path.
pub trait UtilityResolver {
    fn resolve(&self, utility: &str) -> Option<PathBuf>;
}

/// Resolves utilities on `$PATH`.
#[derive(Debug, Default, Clone, Copy)]
pub struct PathResolver;

impl UtilityResolver for PathResolver {
    fn resolve(&self, utility: &str) -> Option<PathBuf> {
        which::which(utility).ok()
    }
}

/// Snapshots which probes are available on this host, in catalog order.
pub fn derive_probe_table<R: UtilityResolver + ?Sized>(resolver: &R) -> Vec<ProbeDefinition> {
    info!("Finding supported utilities");
    ProbeKind::ALL
        .iter()
        .filter_map(|&kind| match resolver.resolve(kind.utility()) {
            Some(path) => {
                debug!("{} -> {}", kind.name(), path.display());
                Some(ProbeDefinition::new(kind.name(), kind.invocation(&path)))
            }
            None => {
                info!("Cannot find {}. Excluding", kind.utility());
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct FakeResolver(HashMap<&'static str, &'static str>);

    impl UtilityResolver for FakeResolver {
        fn resolve(&self, utility: &str) -> Option<PathBuf> {
            self.0.get(utility).map(PathBuf::from)
        }
    }

    #[test]
    fn test_probe_table_keeps_catalog_order_and_drops_missing() {
        let resolver = FakeResolver(HashMap::from([
            ("ps", "/usr/bin/ps"),
            ("iostat", "/usr/bin/iostat"),
            ("cat", "/usr/bin/cat"),
        ]));

        let table = derive_probe_table(&resolver);
        let names: Vec<&str> = table.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["iostat", "ps", "meminfo", "slabinfo"]);
        assert_eq!(table[0].invocation, "/usr/bin/iostat 1 3 -t -k -x -N");
        assert_eq!(table[2].invocation, "/usr/bin/cat /proc/meminfo");
    }

    #[test]
    fn test_probe_without_arguments() {
        let path = Path::new("/usr/bin/pidstat");
        assert_eq!(ProbeKind::Pidstat.invocation(path), "/usr/bin/pidstat");
    }

    #[test]
    fn test_names_are_unique() {
        let mut names: Vec<&str> = ProbeKind::ALL.iter().map(|k| k.name()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), ProbeKind::ALL.len());
    }

    #[test]
    fn test_rtmon_invocation() {
        let inv = rtmon_invocation(Path::new("/usr/sbin/rtmon"), Path::new("/var/lib/gdg/gdg-data"));
        assert_eq!(inv, "/usr/sbin/rtmon file /var/lib/gdg/gdg-data/rtmon/rtmon.log");
    }
}
