//! Command specification

use std::collections::BTreeMap;
use std::io;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

use crate::timeout::TimeoutController;

/// Default bound on a command's total runtime
pub const DEFAULT_EXIT_TIMEOUT: Duration = Duration::from_secs(30);
/// Default bound on output silence
pub const DEFAULT_IO_WAIT: Duration = Duration::from_secs(10);
/// Default pause between SIGTERM and SIGKILL on explicit termination
pub const DEFAULT_KILL_GRACE: Duration = Duration::from_millis(200);

/// Characters that make a command line need a real shell
const SHELL_METACHARACTERS: &[char] = &[
    '|', '&', ';', '<', '>', '(', ')', '$', '`', '\\', '"', '\'', '*', '?', '[', ']', '#', '~',
    '=', '%', '{', '}', '\n',
];

/// What to run and under which limits
///
/// Immutable once handed to a [`ProcessHandle`](crate::ProcessHandle). The
/// environment is a snapshot: later changes to whatever it was copied from do
/// not reach the child.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Command line as a user would type it
    pub cmdline: String,
    /// Bound on total runtime, measured from spawn
    pub exit_timeout: Duration,
    /// Bound on time without output activity
    pub io_wait: Duration,
    /// Working directory (None = caller's current dir)
    pub working_dir: Option<PathBuf>,
    /// Complete child environment (None = inherit the parent's)
    pub env: Option<BTreeMap<String, String>>,
    /// Grace between SIGTERM and SIGKILL on `terminate`
    pub kill_grace: Duration,
    /// Always go through the platform shell
    pub force_shell: bool,
}

/// How a command line is turned into an OS process
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    /// Plain words: exec the program directly
    Direct { program: String, args: Vec<String> },
    /// Needs quoting, pipes, redirection or expansion
    Shell(String),
}

impl CommandSpec {
    /// Create new command specification with default limits
    pub fn new(cmdline: impl Into<String>) -> Self {
        Self {
            cmdline: cmdline.into(),
            exit_timeout: DEFAULT_EXIT_TIMEOUT,
            io_wait: DEFAULT_IO_WAIT,
            working_dir: None,
            env: None,
            kill_grace: DEFAULT_KILL_GRACE,
            force_shell: false,
        }
    }

    /// Set exit-timeout duration
    pub fn exit_timeout(mut self, duration: Duration) -> Self {
        self.exit_timeout = duration;
        self
    }

    /// Set exit-timeout in seconds
    pub fn exit_timeout_secs(mut self, secs: u64) -> Self {
        self.exit_timeout = Duration::from_secs(secs);
        self
    }

    /// Set io-wait duration
    pub fn io_wait(mut self, duration: Duration) -> Self {
        self.io_wait = duration;
        self
    }

    /// Set io-wait in seconds
    pub fn io_wait_secs(mut self, secs: u64) -> Self {
        self.io_wait = Duration::from_secs(secs);
        self
    }

    /// Set working directory
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Replace the child's environment with a snapshot
    pub fn env_snapshot<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env = Some(
            vars.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }

    /// Set SIGTERM to SIGKILL grace
    pub fn kill_grace(mut self, duration: Duration) -> Self {
        self.kill_grace = duration;
        self
    }

    /// Run through the platform shell even for plain words
    pub fn force_shell(mut self, force: bool) -> Self {
        self.force_shell = force;
        self
    }

    pub fn timeouts(&self) -> TimeoutController {
        TimeoutController::new(self.exit_timeout, self.io_wait)
    }

    /// Decide between direct exec and the shell
    ///
    /// Plain whitespace-separated words are exec'd directly so that a missing
    /// executable is a spawn failure rather than a shell exit status of 127.
    pub fn invocation(&self) -> Invocation {
        let line = self.cmdline.trim();
        if self.force_shell || line.contains(SHELL_METACHARACTERS) {
            return Invocation::Shell(line.to_string());
        }

        let mut words = line.split_whitespace().map(str::to_string);
        match words.next() {
            Some(program) => Invocation::Direct {
                program,
                args: words.collect(),
            },
            None => Invocation::Shell(String::new()),
        }
    }

    /// Build the tokio command: piped stdio, own process group, killed on drop
    pub(crate) fn to_command(&self) -> io::Result<Command> {
        let mut cmd = match self.invocation() {
            Invocation::Shell(line) if line.is_empty() => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "empty command line",
                ));
            }
            Invocation::Shell(line) => shell_command(&line),
            Invocation::Direct { program, args } => {
                let mut cmd = Command::new(program);
                cmd.args(args);
                cmd
            }
        };

        if let Some(ref dir) = self.working_dir {
            cmd.current_dir(dir);
        }

        if let Some(ref env) = self.env {
            cmd.env_clear();
            cmd.envs(env);
        }

        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        #[cfg(unix)]
        cmd.process_group(0);

        Ok(cmd)
    }
}

/// Platform shell invocation for a command line
pub(crate) fn shell_command(line: &str) -> Command {
    #[cfg(windows)]
    {
        let mut cmd = Command::new("cmd");
        cmd.arg("/C").arg(line);
        cmd
    }

    #[cfg(not(windows))]
    {
        let mut cmd = Command::new("/bin/sh");
        cmd.arg("-c").arg(line);
        cmd
    }
}
