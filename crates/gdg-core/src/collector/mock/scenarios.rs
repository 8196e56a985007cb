//! Pre-built mock filesystem scenarios for testing.

use super::filesystem::MockFs;

impl MockFs {
    /// A host with a handful of mostly idle processes, none in D state.
    ///
    /// Includes `/proc/self/status` for uid 0 and the kernel hostname.
    pub fn typical_system() -> Self {
        let mut fs = Self::new();

        fs.add_file("/proc/sys/kernel/hostname", "web01.example.com\n");
        fs.add_file(
            "/proc/self/status",
            "Name:\tgdg\nPid:\t4321\nPPid:\t1\nUid:\t0\t0\t0\t0\nGid:\t0\t0\t0\t0\n",
        );
        fs.add_file("/proc/uptime", "12345.67 98765.43\n");
        fs.add_file("/proc/loadavg", "0.15 0.10 0.05 1/150 1234\n");

        fs.add_process(1, "systemd", 'S');
        fs.add_process(2, "kthreadd", 'S');
        fs.add_process(812, "sshd", 'S');
        fs.add_process(1040, "bash", 'R');
        fs.add_process(1102, "defunct", 'Z');
        fs.add_process(1200, "kworker/0:1-events", 'I');

        fs
    }

    /// [`MockFs::typical_system`] plus `blocked` processes stuck in D state.
    pub fn with_blocked_io(blocked: u32) -> Self {
        let mut fs = Self::typical_system();
        for i in 0..blocked {
            fs.add_process(5000 + i, "jbd2/sda1-8", 'D');
        }
        fs
    }
}
