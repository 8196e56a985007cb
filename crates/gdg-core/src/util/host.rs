//! Facts about the host read from `/proc`.

use std::path::Path;

use crate::collector::procfs::parse_proc_status;
use crate::collector::traits::FileSystem;
use crate::error::{Error, Result};

/// Returns the host name without its domain part.
///
/// Reads `/proc/sys/kernel/hostname`; falls back to `"localhost"` when the
/// file is unreadable or empty.
pub fn short_hostname<F: FileSystem>(fs: &F) -> String {
    fs.read_to_string(Path::new("/proc/sys/kernel/hostname"))
        .ok()
        .and_then(|content| {
            content
                .trim()
                .split('.')
                .next()
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        })
        .unwrap_or_else(|| "localhost".to_string())
}

/// Effective uid of the calling process, from `/proc/self/status`.
pub fn effective_uid<F: FileSystem>(fs: &F) -> Result<u32> {
    let path = Path::new("/proc/self/status");
    let content = fs.read_to_string(path).map_err(|e| Error::io(path, e))?;
    Ok(parse_proc_status(&content)?.euid)
}

/// Whether the calling process runs with an effective uid of 0.
pub fn is_root<F: FileSystem>(fs: &F) -> bool {
    effective_uid(fs).is_ok_and(|uid| uid == 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::mock::MockFs;

    #[test]
    fn test_short_hostname_strips_domain() {
        let fs = MockFs::typical_system();
        assert_eq!(short_hostname(&fs), "web01");
    }

    #[test]
    fn test_short_hostname_fallback() {
        assert_eq!(short_hostname(&MockFs::new()), "localhost");

        let mut fs = MockFs::new();
        fs.add_file("/proc/sys/kernel/hostname", "\n");
        assert_eq!(short_hostname(&fs), "localhost");
    }

    #[test]
    fn test_root_detection() {
        assert!(is_root(&MockFs::typical_system()));

        let mut fs = MockFs::new();
        fs.add_file("/proc/self/status", "Name:\tgdg\nUid:\t1000\t1000\t1000\t1000\n");
        assert_eq!(effective_uid(&fs).unwrap(), 1000);
        assert!(!is_root(&fs));
        assert!(!is_root(&MockFs::new()));
    }
}
