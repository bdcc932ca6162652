//! OS-backed process handle

use std::collections::HashSet;
use std::fmt;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::ChildStdin;
use tokio::sync::watch;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info, warn};

use crate::{
    buffer::CaptureBuffers,
    config::CommandSpec,
    control::ProcessControl,
    diagnostics::{announce_spawn, Diagnostics, TracingDiagnostics},
    error::{ProcessError, Result},
    hooks::{NoopHooks, SpawnHooks},
    signal::{signal_group, Escalation},
    state::{ProcessOutcome, ProcessState, StreamKind, TimeoutKind},
    supervisor::{ExitInfo, Progress, Supervisor},
    timeout::deadline,
};

/// Bound on waiting for the reap after SIGKILL
const REAP_TIMEOUT: Duration = Duration::from_millis(200);

/// One external command invocation
///
/// Owns the OS process (through its supervising task), stdin, and the
/// captured output. Output accessors work in every state; while running they
/// return what has arrived so far.
pub struct ProcessHandle {
    label: String,
    spec: CommandSpec,
    state: ProcessState,
    pid: Option<u32>,
    stdin: Option<ChildStdin>,
    closed: HashSet<StreamKind>,
    buffers: CaptureBuffers,
    supervisor: Option<Supervisor>,
    started_at: Option<Instant>,
    finished_at: Option<Instant>,
    exit: Option<ExitInfo>,
    timeout: Option<TimeoutKind>,
    diagnostics: Arc<dyn Diagnostics>,
    hooks: Arc<dyn SpawnHooks>,
}

impl ProcessHandle {
    /// Create a pending handle
    pub fn new(label: impl Into<String>, spec: CommandSpec) -> Self {
        Self {
            label: label.into(),
            spec,
            state: ProcessState::Pending,
            pid: None,
            stdin: None,
            closed: HashSet::new(),
            buffers: CaptureBuffers::new(),
            supervisor: None,
            started_at: None,
            finished_at: None,
            exit: None,
            timeout: None,
            diagnostics: Arc::new(TracingDiagnostics),
            hooks: Arc::new(NoopHooks),
        }
    }

    pub fn with_diagnostics(mut self, diagnostics: Arc<dyn Diagnostics>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn SpawnHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn spec(&self) -> &CommandSpec {
        &self.spec
    }

    /// Live view of the captured output, readable from another task
    pub fn buffers(&self) -> CaptureBuffers {
        self.buffers.clone()
    }

    /// `stop` with an explicit io-wait budget instead of the `CommandSpec` one
    ///
    /// The budget bounds output silence while running, the drain after a
    /// natural exit, and the wait between SIGTERM and SIGKILL on a timeout.
    pub async fn stop_with(&mut self, io_wait: Duration) -> Result<ProcessOutcome> {
        if self.state != ProcessState::Running {
            return Ok(self.outcome());
        }
        self.close_stream(StreamKind::Input);

        let policy = self.spec.timeouts().with_io_wait(io_wait);
        let started = self.started_at.unwrap_or_else(Instant::now);
        let mut progress = match self.supervisor {
            Some(ref supervisor) => supervisor.subscribe(),
            None => return Ok(self.outcome()),
        };

        let exit_deadline = policy.exit_deadline(started);

        loop {
            let snapshot = progress.borrow_and_update().clone();
            // An exit at or past the deadline is a timeout however the pipes ended
            if exited_late(&snapshot, exit_deadline) {
                return self.expire(TimeoutKind::Exit, io_wait).await;
            }
            if snapshot.drained {
                return Ok(self.finish_exit(snapshot.exit));
            }

            let now = Instant::now();
            let wake = match snapshot.exited_at {
                Some(exited_at) => {
                    let drain_deadline = deadline(exited_at, io_wait);
                    if now >= drain_deadline {
                        warn!(
                            label = %self.label,
                            pid = ?self.pid,
                            "Output pipes still open after exit; descendants may hold them"
                        );
                        self.close_stream(StreamKind::Output);
                        self.close_stream(StreamKind::Error);
                        return Ok(self.finish_exit(snapshot.exit));
                    }
                    drain_deadline
                }
                None => {
                    if let Some(kind) = policy.check(started, snapshot.last_activity, now) {
                        return self.expire(kind, io_wait).await;
                    }
                    policy.next_wakeup(started, snapshot.last_activity)
                }
            };

            tokio::select! {
                changed = progress.changed() => {
                    if changed.is_err() {
                        let last = progress.borrow().clone();
                        if exited_late(&last, exit_deadline) {
                            return self.expire(TimeoutKind::Exit, io_wait).await;
                        }
                        return Ok(self.finish_exit(last.exit));
                    }
                }
                _ = sleep_until(wake) => {}
            }
        }
    }

    fn finish_exit(&mut self, exit: Option<ExitInfo>) -> ProcessOutcome {
        self.finish(ProcessState::Exited, exit);
        self.outcome()
    }

    /// Timeout path: flag, escalate, record `TimedOut`
    async fn expire(&mut self, kind: TimeoutKind, budget: Duration) -> Result<ProcessOutcome> {
        warn!(
            label = %self.label,
            pid = ?self.pid,
            timeout = %kind,
            "Process timed out; forcing termination"
        );
        self.timeout = Some(kind);

        let escalated = self.escalate(budget).await;
        self.settle().await;
        match escalated {
            Ok(exit) => {
                self.finish(ProcessState::TimedOut, exit);
                Ok(self.outcome())
            }
            Err(e) => {
                self.finish(ProcessState::TimedOut, None);
                Err(e)
            }
        }
    }

    /// SIGTERM, wait up to `budget`, then SIGKILL
    ///
    /// If the leader already exited, the group still gets a SIGKILL sweep so
    /// forked descendants do not outlive the handle.
    async fn escalate(&mut self, budget: Duration) -> Result<Option<ExitInfo>> {
        let (pid, mut progress) = match (self.pid, self.supervisor.as_ref()) {
            (Some(pid), Some(supervisor)) => (pid, supervisor.subscribe()),
            _ => return Ok(None),
        };

        let already = progress.borrow().exit;
        if already.is_some() {
            if let Err(e) = signal_group(pid, Escalation::Forced) {
                debug!(pid = %pid, error = %e, "Group sweep after exit failed");
            }
            return Ok(already);
        }

        signal_group(pid, Escalation::Graceful)?;
        if let Some(exit) = wait_for_exit(&mut progress, budget).await {
            debug!(pid = %pid, "Exited after graceful signal");
            return Ok(Some(exit));
        }

        warn!(label = %self.label, pid = %pid, "Still running after grace period; killing");
        signal_group(pid, Escalation::Forced)?;
        if let Some(ref supervisor) = self.supervisor {
            supervisor.kill();
        }
        Ok(wait_for_exit(&mut progress, REAP_TIMEOUT).await)
    }

    /// Give the supervisor a moment to drain, then stop capturing
    async fn settle(&mut self) {
        let mut progress = match self.supervisor {
            Some(ref supervisor) => supervisor.subscribe(),
            None => return,
        };

        let drained = tokio::time::timeout(REAP_TIMEOUT, async {
            loop {
                let done = progress.borrow_and_update().drained;
                if done || progress.changed().await.is_err() {
                    return;
                }
            }
        })
        .await;

        if drained.is_err() {
            self.close_stream(StreamKind::Output);
            self.close_stream(StreamKind::Error);
        }
    }

    fn finish(&mut self, state: ProcessState, exit: Option<ExitInfo>) {
        self.state = state;
        self.exit = exit;
        self.finished_at = Some(Instant::now());
        self.stdin = None;
        info!(
            label = %self.label,
            pid = ?self.pid,
            state = %state,
            code = ?exit.and_then(|e| e.code),
            "Process finished"
        );
    }
}

fn exited_late(progress: &Progress, exit_deadline: Instant) -> bool {
    progress
        .exited_at
        .map_or(false, |exited_at| exited_at >= exit_deadline)
}

async fn wait_for_exit(progress: &mut watch::Receiver<Progress>, budget: Duration) -> Option<ExitInfo> {
    let waited = tokio::time::timeout(budget, async {
        loop {
            let exit = progress.borrow_and_update().exit;
            if exit.is_some() {
                return exit;
            }
            if progress.changed().await.is_err() {
                return progress.borrow().exit;
            }
        }
    })
    .await;

    waited.ok().flatten()
}

#[async_trait]
impl ProcessControl for ProcessHandle {
    fn label(&self) -> &str {
        &self.label
    }

    fn pid(&self) -> Option<u32> {
        self.pid
    }

    fn state(&self) -> ProcessState {
        self.state
    }

    async fn run(&mut self) -> Result<()> {
        if self.state != ProcessState::Pending {
            return Err(ProcessError::InvalidState {
                label: self.label.clone(),
                state: self.state,
                op: "run",
            });
        }

        self.hooks.before_spawn(&self.label, &self.spec).await?;
        announce_spawn(self.diagnostics.as_ref(), &self.label, &self.spec);

        debug!(label = %self.label, invocation = ?self.spec.invocation(), "Spawning process");
        let spawned = self.spec.to_command().and_then(|mut cmd| cmd.spawn());
        let mut child = match spawned {
            Ok(child) => child,
            Err(source) => {
                error!(
                    label = %self.label,
                    command = %self.spec.cmdline,
                    error = %source,
                    "Failed to spawn process"
                );
                return Err(ProcessError::SpawnFailed {
                    command: self.spec.cmdline.clone(),
                    source,
                });
            }
        };

        let pid = child.id().ok_or_else(|| ProcessError::SpawnFailed {
            command: self.spec.cmdline.clone(),
            source: io::Error::new(io::ErrorKind::Other, "Failed to get process ID"),
        })?;

        self.stdin = child.stdin.take();
        if self.closed.contains(&StreamKind::Input) {
            self.stdin = None;
        }
        let stdout = child
            .stdout
            .take()
            .filter(|_| !self.closed.contains(&StreamKind::Output));
        let stderr = child
            .stderr
            .take()
            .filter(|_| !self.closed.contains(&StreamKind::Error));

        self.started_at = Some(Instant::now());
        self.supervisor = Some(Supervisor::start(
            child,
            stdout,
            stderr,
            self.buffers.clone(),
            pid,
        ));
        self.pid = Some(pid);
        self.state = ProcessState::Running;
        info!(label = %self.label, pid = %pid, command = %self.spec.cmdline, "Process spawned");

        if let Err(e) = self.hooks.after_spawn(&self.label, &self.spec, pid).await {
            warn!(label = %self.label, error = %e, "After-spawn hook failed; terminating");
            if let Err(kill_err) = self.terminate().await {
                warn!(label = %self.label, error = %kill_err, "Cleanup after hook failure failed");
            }
            return Err(e);
        }

        Ok(())
    }

    async fn write(&mut self, bytes: &[u8]) -> Result<()> {
        let label = self.label.clone();
        if self.state != ProcessState::Running {
            return Err(ProcessError::InputClosed { label });
        }

        let io_wait = self.spec.io_wait;
        let stdin = match self.stdin.as_mut() {
            Some(stdin) => stdin,
            None => return Err(ProcessError::InputClosed { label }),
        };

        let written = tokio::time::timeout(io_wait, async {
            match stdin.write_all(bytes).await {
                Ok(()) => stdin.flush().await,
                Err(e) => Err(e),
            }
        })
        .await;

        match written {
            Ok(Ok(())) => {
                debug!(label = %label, bytes = bytes.len(), "Wrote to stdin");
                Ok(())
            }
            Ok(Err(e)) if e.kind() == io::ErrorKind::BrokenPipe => {
                debug!(label = %label, "Child closed its stdin");
                self.stdin = None;
                self.closed.insert(StreamKind::Input);
                Err(ProcessError::InputClosed { label })
            }
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Err(ProcessError::Io(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("write to `{}` blocked for {:?}", label, io_wait),
            ))),
        }
    }

    fn close_stream(&mut self, stream: StreamKind) {
        if !self.closed.insert(stream) {
            return;
        }

        debug!(label = %self.label, stream = %stream, "Closing stream");
        match stream {
            StreamKind::Input => self.stdin = None,
            StreamKind::Output | StreamKind::Error => {
                if let Some(ref supervisor) = self.supervisor {
                    supervisor.close(stream);
                }
            }
        }
    }

    async fn stop(&mut self) -> Result<ProcessOutcome> {
        let io_wait = self.spec.io_wait;
        self.stop_with(io_wait).await
    }

    async fn terminate(&mut self) -> Result<ProcessOutcome> {
        if self.state != ProcessState::Running {
            return Ok(self.outcome());
        }

        info!(label = %self.label, pid = ?self.pid, "Terminating process");
        self.close_stream(StreamKind::Input);

        let grace = self.spec.kill_grace;
        let escalated = self.escalate(grace).await;
        self.settle().await;
        match escalated {
            Ok(exit) => {
                self.finish(ProcessState::Terminated, exit);
                Ok(self.outcome())
            }
            Err(e) => {
                self.finish(ProcessState::Terminated, None);
                Err(e)
            }
        }
    }

    fn stdout(&self) -> Vec<u8> {
        self.buffers.stdout()
    }

    fn stderr(&self) -> Vec<u8> {
        self.buffers.stderr()
    }

    fn output(&self) -> Vec<u8> {
        self.buffers.combined()
    }

    fn exit_status(&self) -> Option<i32> {
        match self.state {
            ProcessState::Exited | ProcessState::Terminated => self.exit.and_then(|e| e.code),
            _ => None,
        }
    }

    fn timed_out(&self) -> bool {
        self.timeout.is_some()
    }

    fn outcome(&self) -> ProcessOutcome {
        let elapsed = match (self.started_at, self.finished_at) {
            (Some(start), Some(end)) => end.duration_since(start),
            (Some(start), None) => start.elapsed(),
            _ => Duration::ZERO,
        };

        ProcessOutcome {
            state: self.state,
            exit_status: self.exit_status(),
            signal: self.exit.and_then(|e| e.signal),
            timed_out: self.timeout.is_some(),
            timeout: self.timeout,
            elapsed,
        }
    }
}

impl Drop for ProcessHandle {
    fn drop(&mut self) {
        if self.state != ProcessState::Running {
            return;
        }
        let exited = self
            .supervisor
            .as_ref()
            .map_or(true, |supervisor| supervisor.snapshot().exit.is_some());
        if let (Some(pid), false) = (self.pid, exited) {
            if let Err(e) = signal_group(pid, Escalation::Forced) {
                debug!(pid = %pid, error = %e, "Kill on drop failed");
            }
        }
    }
}

impl fmt::Debug for ProcessHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessHandle")
            .field("label", &self.label)
            .field("pid", &self.pid)
            .field("state", &self.state)
            .field("spec", &self.spec)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
