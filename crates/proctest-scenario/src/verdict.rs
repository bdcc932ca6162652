//! Telling "the program failed" apart from "the program hung"

use std::time::Duration;

use proctest_process::{ProcessOutcome, ProcessState, TimeoutKind};
use thiserror::Error;

/// Why a process did not complete successfully
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompletionError {
    /// A timeout fired and the process was killed
    #[error("Process `{label}` hung ({kind} after {after:?})")]
    Hung {
        label: String,
        kind: TimeoutKind,
        after: Duration,
    },

    /// Exited on its own with a non-zero status
    #[error("Process `{label}` failed with exit status {status}")]
    Failed { label: String, status: i32 },

    /// Killed by `terminate` or by a signal from outside
    #[error("Process `{label}` was terminated")]
    Terminated { label: String },

    /// Still pending or running
    #[error("Process `{label}` has not finished (it is {state})")]
    NotFinished { label: String, state: ProcessState },
}

impl CompletionError {
    pub fn is_hang(&self) -> bool {
        matches!(self, CompletionError::Hung { .. })
    }
}

/// Ok only for a natural exit with status zero
pub fn check_completed(label: &str, outcome: &ProcessOutcome) -> Result<(), CompletionError> {
    let label = label.to_string();
    match outcome.state {
        ProcessState::Pending | ProcessState::Running => Err(CompletionError::NotFinished {
            label,
            state: outcome.state,
        }),
        ProcessState::TimedOut => Err(CompletionError::Hung {
            label,
            kind: outcome.timeout.unwrap_or(TimeoutKind::Exit),
            after: outcome.elapsed,
        }),
        ProcessState::Terminated => Err(CompletionError::Terminated { label }),
        ProcessState::Exited => match outcome.exit_status {
            Some(0) => Ok(()),
            Some(status) => Err(CompletionError::Failed { label, status }),
            None => Err(CompletionError::Terminated { label }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(state: ProcessState, exit_status: Option<i32>) -> ProcessOutcome {
        ProcessOutcome {
            state,
            exit_status,
            signal: None,
            timed_out: state == ProcessState::TimedOut,
            timeout: (state == ProcessState::TimedOut).then_some(TimeoutKind::IoWait),
            elapsed: Duration::from_secs(2),
        }
    }

    #[test]
    fn test_success() {
        assert!(check_completed("ok", &outcome(ProcessState::Exited, Some(0))).is_ok());
    }

    #[test]
    fn test_failure_is_not_a_hang() {
        let err = check_completed("bad", &outcome(ProcessState::Exited, Some(3))).unwrap_err();
        assert_eq!(
            err,
            CompletionError::Failed {
                label: "bad".to_string(),
                status: 3
            }
        );
        assert!(!err.is_hang());
    }

    #[test]
    fn test_timeout_is_a_hang() {
        let err = check_completed("slow", &outcome(ProcessState::TimedOut, None)).unwrap_err();
        assert!(err.is_hang());
        assert!(err.to_string().contains("io-wait timeout"));
    }

    #[test]
    fn test_unfinished_and_killed() {
        assert!(matches!(
            check_completed("p", &outcome(ProcessState::Running, None)),
            Err(CompletionError::NotFinished { .. })
        ));
        assert!(matches!(
            check_completed("p", &outcome(ProcessState::Terminated, None)),
            Err(CompletionError::Terminated { .. })
        ));
        assert!(matches!(
            check_completed("p", &outcome(ProcessState::Exited, None)),
            Err(CompletionError::Terminated { .. })
        ));
    }
}
