//! Lifecycle states and outcome snapshots

use std::fmt;
use std::time::Duration;

/// Lifecycle of a process handle
///
/// `Pending -> Running -> {Exited | TimedOut | Terminated}`. The last three are
/// terminal: no further transition and no further input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessState {
    /// Created, not yet spawned
    Pending,
    /// Spawned and supervised
    Running,
    /// Exited on its own within the exit-timeout
    Exited,
    /// Exceeded the exit-timeout or the io-wait timeout and was killed
    TimedOut,
    /// Stopped by an explicit termination request
    Terminated,
}

impl ProcessState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ProcessState::Exited | ProcessState::TimedOut | ProcessState::Terminated
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessState::Pending => "pending",
            ProcessState::Running => "running",
            ProcessState::Exited => "exited",
            ProcessState::TimedOut => "timed out",
            ProcessState::Terminated => "terminated",
        }
    }
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which deadline fired
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeoutKind {
    /// Total runtime exceeded the exit-timeout
    Exit,
    /// No output activity for longer than the io-wait timeout
    IoWait,
}

impl fmt::Display for TimeoutKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeoutKind::Exit => f.write_str("exit-timeout"),
            TimeoutKind::IoWait => f.write_str("io-wait timeout"),
        }
    }
}

/// One of the three standard streams of a child
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    Input,
    Output,
    Error,
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamKind::Input => f.write_str("stdin"),
            StreamKind::Output => f.write_str("stdout"),
            StreamKind::Error => f.write_str("stderr"),
        }
    }
}

/// Snapshot of a handle after `stop` or `terminate`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutcome {
    pub state: ProcessState,
    /// Defined only for `Exited`, or `Terminated` when the process still
    /// produced an exit code
    pub exit_status: Option<i32>,
    /// Terminating signal, when the OS reports one
    pub signal: Option<i32>,
    pub timed_out: bool,
    pub timeout: Option<TimeoutKind>,
    /// Wall-clock time from spawn to the terminal state (or to now)
    pub elapsed: Duration,
}

impl ProcessOutcome {
    /// Exited on its own with status zero
    pub fn success(&self) -> bool {
        self.state == ProcessState::Exited && self.exit_status == Some(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(!ProcessState::Pending.is_terminal());
        assert!(!ProcessState::Running.is_terminal());
        assert!(ProcessState::Exited.is_terminal());
        assert!(ProcessState::TimedOut.is_terminal());
        assert!(ProcessState::Terminated.is_terminal());
    }

    #[test]
    fn test_outcome_success_requires_exited() {
        let mut outcome = ProcessOutcome {
            state: ProcessState::Exited,
            exit_status: Some(0),
            signal: None,
            timed_out: false,
            timeout: None,
            elapsed: Duration::from_millis(5),
        };
        assert!(outcome.success());

        outcome.state = ProcessState::Terminated;
        assert!(!outcome.success());
    }
}
