//! Capability interface for a supervised process

use async_trait::async_trait;

use crate::{
    error::Result,
    state::{ProcessOutcome, ProcessState, StreamKind},
};

/// Everything a scenario may do with one process
///
/// [`ProcessHandle`](crate::ProcessHandle) is the OS-backed implementation.
/// `stop` and `terminate` are no-ops on terminal handles.
#[async_trait]
pub trait ProcessControl: Send {
    fn label(&self) -> &str;

    /// OS process id, once spawned
    fn pid(&self) -> Option<u32>;

    fn state(&self) -> ProcessState;

    /// Spawn the process. Fails fatally if it cannot be launched.
    async fn run(&mut self) -> Result<()>;

    /// Write to stdin
    async fn write(&mut self, bytes: &[u8]) -> Result<()>;

    /// Close one stream; closing it again is a no-op
    fn close_stream(&mut self, stream: StreamKind);

    /// Wait for natural exit, bounded by the exit and io-wait timeouts
    async fn stop(&mut self) -> Result<ProcessOutcome>;

    /// Graceful signal, short grace, then forced kill
    async fn terminate(&mut self) -> Result<ProcessOutcome>;

    fn stdout(&self) -> Vec<u8>;

    fn stderr(&self) -> Vec<u8>;

    /// stdout and stderr interleaved in arrival order
    fn output(&self) -> Vec<u8>;

    fn exit_status(&self) -> Option<i32>;

    fn timed_out(&self) -> bool;

    fn outcome(&self) -> ProcessOutcome;

    fn successfully_executed(&self) -> bool {
        self.has_exit_status(0)
    }

    fn has_exit_status(&self, status: i32) -> bool {
        self.state() == ProcessState::Exited && self.exit_status() == Some(status)
    }

    fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout()).into_owned()
    }

    fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr()).into_owned()
    }
}
