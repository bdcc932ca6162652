//! # proctest-process
//!
//! **Purpose**: Supervised external processes for black-box CLI tests
//!
//! Spawns a command, captures its output concurrently with caller
//! interaction, and bounds it with two timeouts.
//!
//! ## Features
//!
//! - **Process Handle**: `Pending -> Running -> {Exited | TimedOut | Terminated}`
//! - **Concurrent Capture**: a supervising task drains stdout and stderr so
//!   neither pipe can fill up and deadlock the caller
//! - **Exit Timeout**: bound on total runtime, measured from spawn
//! - **IO-Wait Timeout**: output silence longer than the budget counts as a hang
//! - **Escalation**: SIGTERM to the process group, grace period, SIGKILL
//! - **Hooks and Diagnostics**: before/after spawn callbacks and an explicit
//!   announcement sink
//!
//! ## Usage
//!
//! ```rust,no_run
//! use proctest_process::{CommandSpec, ProcessControl, ProcessHandle};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let spec = CommandSpec::new("cat").exit_timeout_secs(5).io_wait_secs(2);
//! let mut handle = ProcessHandle::new("echo-back", spec);
//!
//! handle.run().await?;
//! handle.write(b"hello\n").await?;
//!
//! let outcome = handle.stop().await?;
//! assert!(outcome.success());
//! assert_eq!(handle.stdout(), b"hello\n");
//! # Ok(())
//! # }
//! ```

pub mod buffer;
pub mod child;
pub mod config;
pub mod control;
pub mod diagnostics;
pub mod error;
pub mod hooks;
pub mod state;
pub mod timeout;

mod signal;
mod supervisor;

pub use buffer::CaptureBuffers;
pub use child::ProcessHandle;
pub use config::{CommandSpec, Invocation, DEFAULT_EXIT_TIMEOUT, DEFAULT_IO_WAIT, DEFAULT_KILL_GRACE};
pub use control::ProcessControl;
pub use diagnostics::{
    Announcement, AnnouncementKind, Diagnostics, NullDiagnostics, RecordingDiagnostics,
    TracingDiagnostics,
};
pub use error::{ProcessError, Result};
pub use hooks::{NoopHooks, ShellHooks, SpawnHooks};
pub use state::{ProcessOutcome, ProcessState, StreamKind, TimeoutKind};
pub use timeout::TimeoutController;
