//! Signal delivery for graceful-then-forced termination
//!
//! Children are spawned as process-group leaders, so signals go to the whole
//! group (`-pid`) and reach anything the command forked.

use tracing::debug;

use crate::error::Result;

/// Step of the termination escalation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Escalation {
    /// SIGTERM
    Graceful,
    /// SIGKILL
    Forced,
}

/// Signal the process group led by `pid`. A group that no longer exists is
/// not an error.
#[cfg(unix)]
pub(crate) fn signal_group(pid: u32, step: Escalation) -> Result<()> {
    use nix::errno::Errno;
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    use crate::error::ProcessError;

    let signal = match step {
        Escalation::Graceful => Signal::SIGTERM,
        Escalation::Forced => Signal::SIGKILL,
    };

    match killpg(Pid::from_raw(pid as i32), signal) {
        Ok(()) => {
            debug!(pid = %pid, signal = %signal, "Signalled process group");
            Ok(())
        }
        Err(Errno::ESRCH) => {
            debug!(pid = %pid, signal = %signal, "Process group already gone");
            Ok(())
        }
        Err(e) => Err(ProcessError::Signal(format!(
            "{} to process group {}: {}",
            signal, pid, e
        ))),
    }
}

/// No process groups here; the supervisor's `start_kill` does the forced step.
#[cfg(not(unix))]
pub(crate) fn signal_group(pid: u32, step: Escalation) -> Result<()> {
    debug!(pid = %pid, step = ?step, "Group signals unsupported on this platform");
    Ok(())
}
