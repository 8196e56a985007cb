//! Running probe invocations.

use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::process::{Command, Stdio};

/// How a probe run ended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProbeExit {
    /// Exit code, `None` when killed by a signal.
    pub exit_code: Option<i32>,
}

impl ProbeExit {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Executes a probe invocation with its stdout connected to `stdout`.
///
/// Output lands in the file as the probe produces it, so a probe that dies
/// half way still leaves what it printed. A non-zero exit is not an error;
/// `Err` means the probe could not be run at all.
pub trait ProbeRunner {
    fn run(&self, invocation: &str, stdout: File) -> io::Result<ProbeExit>;
}

/// Runs invocations through `<shell> -c`, discarding stderr.
#[derive(Debug, Clone)]
pub struct ShellRunner {
    shell: PathBuf,
}

impl Default for ShellRunner {
    fn default() -> Self {
        Self::new("bash")
    }
}

impl ShellRunner {
    pub fn new(shell: impl Into<PathBuf>) -> Self {
        Self {
            shell: shell.into(),
        }
    }
}

impl ProbeRunner for ShellRunner {
    fn run(&self, invocation: &str, stdout: File) -> io::Result<ProbeExit> {
        let status = Command::new(&self.shell)
            .arg("-c")
            .arg(invocation)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::null())
            .status()?;

        Ok(ProbeExit {
            exit_code: status.code(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;
    use tempfile::tempdir;

    fn run_into(runner: &ShellRunner, invocation: &str, path: &Path) -> io::Result<ProbeExit> {
        runner.run(invocation, File::create(path)?)
    }

    #[test]
    fn test_shell_runner_writes_stdout_to_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.dat");
        let exit = run_into(&ShellRunner::new("sh"), "echo hello; echo oops >&2", &path).unwrap();

        assert!(exit.success());
        assert_eq!(fs::read_to_string(&path).unwrap(), "hello\n");
    }

    #[test]
    fn test_shell_runner_nonzero_exit_keeps_output() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.dat");
        let exit = run_into(&ShellRunner::new("sh"), "echo partial; exit 3", &path).unwrap();

        assert_eq!(exit.exit_code, Some(3));
        assert!(!exit.success());
        assert_eq!(fs::read_to_string(&path).unwrap(), "partial\n");
    }

    #[test]
    fn test_killed_probe_leaves_what_it_printed() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.dat");
        let exit = run_into(&ShellRunner::new("sh"), "echo before; kill -9 $$; echo after", &path)
            .unwrap();

        assert_eq!(exit.exit_code, None);
        assert_eq!(fs::read_to_string(&path).unwrap(), "before\n");
    }

    #[test]
    fn test_missing_shell_is_error() {
        let dir = tempdir().unwrap();
        let runner = ShellRunner::new("/nonexistent/shell");
        assert!(run_into(&runner, "true", &dir.path().join("out.dat")).is_err());
    }
}
