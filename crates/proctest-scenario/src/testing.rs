//! In-memory `ProcessControl` used by unit tests

use std::time::Duration;

use async_trait::async_trait;
use proctest_process::{ProcessControl, ProcessOutcome, ProcessState, Result, StreamKind, TimeoutKind};

pub(crate) struct FakeProcess {
    label: String,
    state: ProcessState,
    stdout: Vec<u8>,
    status: Option<i32>,
    timed_out: bool,
}

impl FakeProcess {
    pub(crate) fn exited(label: &str, stdout: &str, status: i32) -> Self {
        Self {
            label: label.to_string(),
            state: ProcessState::Exited,
            stdout: stdout.as_bytes().to_vec(),
            status: Some(status),
            timed_out: false,
        }
    }

    pub(crate) fn running(label: &str, stdout: &str) -> Self {
        Self {
            state: ProcessState::Running,
            status: None,
            ..Self::exited(label, stdout, 0)
        }
    }

    pub(crate) fn hung(label: &str) -> Self {
        Self {
            state: ProcessState::TimedOut,
            status: None,
            timed_out: true,
            ..Self::exited(label, "", 0)
        }
    }
}

#[async_trait]
impl ProcessControl for FakeProcess {
    fn label(&self) -> &str {
        &self.label
    }

    fn pid(&self) -> Option<u32> {
        None
    }

    fn state(&self) -> ProcessState {
        self.state
    }

    async fn run(&mut self) -> Result<()> {
        Ok(())
    }

    async fn write(&mut self, _bytes: &[u8]) -> Result<()> {
        Ok(())
    }

    fn close_stream(&mut self, _stream: StreamKind) {}

    async fn stop(&mut self) -> Result<ProcessOutcome> {
        if self.state == ProcessState::Running {
            self.state = ProcessState::Exited;
            self.status = Some(0);
        }
        Ok(self.outcome())
    }

    async fn terminate(&mut self) -> Result<ProcessOutcome> {
        if self.state == ProcessState::Running {
            self.state = ProcessState::Terminated;
        }
        Ok(self.outcome())
    }

    fn stdout(&self) -> Vec<u8> {
        self.stdout.clone()
    }

    fn stderr(&self) -> Vec<u8> {
        Vec::new()
    }

    fn output(&self) -> Vec<u8> {
        self.stdout.clone()
    }

    fn exit_status(&self) -> Option<i32> {
        self.status
    }

    fn timed_out(&self) -> bool {
        self.timed_out
    }

    fn outcome(&self) -> ProcessOutcome {
        ProcessOutcome {
            state: self.state,
            exit_status: self.status,
            signal: None,
            timed_out: self.timed_out,
            timeout: self.timed_out.then_some(TimeoutKind::Exit),
            elapsed: Duration::ZERO,
        }
    }
}
