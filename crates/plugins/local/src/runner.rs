//! Subprocess execution with a hard time limit.

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use devops_core::{Error, Result};
use tokio::process::Command;
use tracing::debug;

/// A program invocation: argument vector, working directory and time limit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub timeout: Duration,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            timeout: Duration::from_secs(devops_core::config::DEFAULT_COMMAND_TIMEOUT_SECS),
        }
    }

    /// Run `command` through the platform shell (`sh -c` or `cmd /C`).
    pub fn shell(command: &str) -> Self {
        if cfg!(windows) {
            Self::new("cmd").args(["/C", command])
        } else {
            Self::new("sh").args(["-c", command])
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Captured result of a finished process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code; `None` when the process was terminated by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Runs processes on behalf of local tools.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run to completion. A non-zero exit is not an error at this level.
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput>;
}

/// [`CommandRunner`] backed by `tokio::process`.
///
/// On unix the child leads its own process group, and the whole group is
/// killed when the time limit elapses. Elsewhere only the child is killed.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioCommandRunner;

#[async_trait]
impl CommandRunner for TokioCommandRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);
        if let Some(dir) = &spec.cwd {
            command.current_dir(dir);
        }

        debug!(command = %spec, timeout_secs = spec.timeout.as_secs(), "Running command");

        let child = match command.spawn() {
            Ok(child) => child,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(Error::ExecutableNotFound(spec.program.clone()));
            }
            Err(e) => return Err(Error::Io(e)),
        };
        let pid = child.id();

        let output = match tokio::time::timeout(spec.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(Error::Io(e)),
            Err(_) => {
                kill_process_group(pid);
                return Err(Error::Timeout {
                    operation: spec.to_string(),
                    secs: spec.timeout.as_secs(),
                });
            }
        };

        let result = CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        debug!(command = %spec, code = ?result.code, "Command finished");
        Ok(result)
    }
}

/// SIGKILL every process in the group led by `pid`.
#[cfg(unix)]
fn kill_process_group(pid: Option<u32>) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Some(pid) = pid.and_then(|pid| i32::try_from(pid).ok()) else {
        return;
    };
    if let Err(e) = killpg(Pid::from_raw(pid), Signal::SIGKILL) {
        debug!(pid, error = %e, "Failed to kill process group");
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pid: Option<u32>) {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_spec_display() {
        let spec = CommandSpec::new("docker").args(["ps", "-a"]);
        assert_eq!(spec.to_string(), "docker ps -a");
        assert_eq!(spec.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_shell_spec() {
        let spec = CommandSpec::shell("echo hi");
        if cfg!(windows) {
            assert_eq!(spec.program, "cmd");
            assert_eq!(spec.args, vec!["/C", "echo hi"]);
        } else {
            assert_eq!(spec.program, "sh");
            assert_eq!(spec.args, vec!["-c", "echo hi"]);
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_captures_output_and_exit_code() {
        let output = TokioCommandRunner
            .run(&CommandSpec::shell("echo out; echo err >&2; exit 3"))
            .await
            .unwrap();

        assert_eq!(output.code, Some(3));
        assert!(!output.success());
        assert_eq!(output.stdout.trim(), "out");
        assert_eq!(output.stderr.trim(), "err");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_kills_process() {
        let started = Instant::now();
        let err = TokioCommandRunner
            .run(&CommandSpec::shell("sleep 5").timeout(Duration::from_secs(1)))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Timeout { secs: 1, .. }), "{:?}", err);
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_kills_background_children() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("survivor");
        let command = format!("(sleep 2; touch '{}') & wait", marker.display());

        let err = TokioCommandRunner
            .run(&CommandSpec::shell(&command).timeout(Duration::from_secs(1)))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Timeout { .. }), "{:?}", err);

        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert!(!marker.exists(), "background child outlived the timeout");
    }

    #[tokio::test]
    async fn test_missing_executable() {
        let err = TokioCommandRunner
            .run(&CommandSpec::new("definitely-not-a-real-binary-4242"))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::ExecutableNotFound(ref p) if p == "definitely-not-a-real-binary-4242"));
    }
}
