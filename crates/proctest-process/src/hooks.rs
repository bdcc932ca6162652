//! Before-spawn and after-spawn lifecycle hooks
//!
//! Each hook runs exactly once per `run`. A failing hook is fatal for that run.

use async_trait::async_trait;
use tracing::{debug, error};

use crate::{
    config::{shell_command, CommandSpec},
    error::{ProcessError, Result},
};

/// Callbacks around a spawn
#[async_trait]
pub trait SpawnHooks: Send + Sync {
    async fn before_spawn(&self, _label: &str, _spec: &CommandSpec) -> Result<()> {
        Ok(())
    }

    async fn after_spawn(&self, _label: &str, _spec: &CommandSpec, _pid: u32) -> Result<()> {
        Ok(())
    }
}

/// Does nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHooks;

#[async_trait]
impl SpawnHooks for NoopHooks {}

/// Runs configured shell commands around each spawn
///
/// The hook sees `PROCTEST_LABEL` and `PROCTEST_CMDLINE`, plus `PROCTEST_PID`
/// after the spawn, and runs in the command's working directory. A non-zero
/// exit fails the hook.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShellHooks {
    before: Option<String>,
    after: Option<String>,
}

impl ShellHooks {
    pub fn new(before: Option<String>, after: Option<String>) -> Self {
        Self { before, after }
    }

    pub fn is_empty(&self) -> bool {
        self.before.is_none() && self.after.is_none()
    }

    async fn execute(
        &self,
        phase: &str,
        hook: &str,
        label: &str,
        spec: &CommandSpec,
        pid: Option<u32>,
    ) -> Result<()> {
        debug!(phase = %phase, hook = %hook, label = %label, "Running lifecycle hook");

        let mut cmd = shell_command(hook);
        cmd.env("PROCTEST_LABEL", label)
            .env("PROCTEST_CMDLINE", &spec.cmdline);
        if let Some(pid) = pid {
            cmd.env("PROCTEST_PID", pid.to_string());
        }
        if let Some(ref dir) = spec.working_dir {
            cmd.current_dir(dir);
        }

        let output = cmd.output().await.map_err(|e| {
            ProcessError::Hook(format!("{} hook `{}` could not start: {}", phase, hook, e))
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            error!(
                phase = %phase,
                hook = %hook,
                status = ?output.status.code(),
                "Lifecycle hook failed"
            );
            return Err(ProcessError::Hook(format!(
                "{} hook `{}` exited with {:?}: {}",
                phase,
                hook,
                output.status.code(),
                stderr.trim()
            )));
        }

        Ok(())
    }
}

#[async_trait]
impl SpawnHooks for ShellHooks {
    async fn before_spawn(&self, label: &str, spec: &CommandSpec) -> Result<()> {
        match self.before {
            Some(ref hook) => self.execute("before-spawn", hook, label, spec, None).await,
            None => Ok(()),
        }
    }

    async fn after_spawn(&self, label: &str, spec: &CommandSpec, pid: u32) -> Result<()> {
        match self.after {
            Some(ref hook) => {
                self.execute("after-spawn", hook, label, spec, Some(pid))
                    .await
            }
            None => Ok(()),
        }
    }
}
