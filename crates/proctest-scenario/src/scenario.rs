//! Scenario context: one test's processes, environment and directory

use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use proctest_process::{
    CommandSpec, Diagnostics, NoopHooks, ProcessControl, ProcessHandle, ProcessOutcome,
    SpawnHooks, TracingDiagnostics,
};
use tracing::debug;

use crate::{
    config::HarnessConfig,
    env::EnvStore,
    error::{Result, ScenarioError},
    registry::ProcessRegistry,
    verdict::check_completed,
};

/// Per-spawn overrides of the scenario defaults
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub exit_timeout: Option<Duration>,
    pub io_wait: Option<Duration>,
    pub working_dir: Option<PathBuf>,
    /// Layered over the scenario environment for this spawn only
    pub env: Vec<(String, String)>,
    pub force_shell: bool,
}

impl RunOptions {
    pub fn exit_timeout(mut self, duration: Duration) -> Self {
        self.exit_timeout = Some(duration);
        self
    }

    pub fn io_wait(mut self, duration: Duration) -> Self {
        self.io_wait = Some(duration);
        self
    }

    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn force_shell(mut self) -> Self {
        self.force_shell = true;
        self
    }
}

/// Everything one black-box test needs to drive the program under test
///
/// Dropping a scenario kills whatever is still running.
pub struct Scenario {
    registry: ProcessRegistry,
    env: EnvStore,
    working_dir: PathBuf,
    config: HarnessConfig,
    diagnostics: Arc<dyn Diagnostics>,
    hooks: Arc<dyn SpawnHooks>,
}

impl Scenario {
    pub fn new(config: HarnessConfig) -> Result<Self> {
        config.validate()?;

        let working_dir = match config.working_dir {
            Some(ref dir) => dir.clone(),
            None => std::env::current_dir()?,
        };
        let mut env = if config.inherit_env {
            EnvStore::inherit()
        } else {
            EnvStore::empty()
        };
        for (key, value) in &config.env {
            env.set(key.clone(), value.clone());
        }

        let shell_hooks = config.shell_hooks();
        let hooks: Arc<dyn SpawnHooks> = if shell_hooks.is_empty() {
            Arc::new(NoopHooks)
        } else {
            Arc::new(shell_hooks)
        };

        Ok(Self {
            registry: ProcessRegistry::new(),
            env,
            working_dir,
            config,
            diagnostics: Arc::new(TracingDiagnostics),
            hooks,
        })
    }

    pub fn with_defaults() -> Result<Self> {
        Self::new(HarnessConfig::default())
    }

    pub fn with_diagnostics(mut self, diagnostics: Arc<dyn Diagnostics>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn SpawnHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn registry(&self) -> &ProcessRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ProcessRegistry {
        &mut self.registry
    }

    pub fn env(&self) -> &EnvStore {
        &self.env
    }

    /// Edits apply to commands spawned afterwards
    pub fn env_mut(&mut self) -> &mut EnvStore {
        &mut self.env
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Change the directory for later spawns; relative paths resolve
    /// against the current one
    pub fn chdir(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let target = self.working_dir.join(path.as_ref());
        if !target.is_dir() {
            return Err(ScenarioError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} is not a directory", target.display()),
            )));
        }
        debug!(dir = %target.display(), "Changing scenario directory");
        self.working_dir = target;
        Ok(())
    }

    /// Spec built from the scenario defaults, before per-spawn overrides
    pub fn command_spec(&self, cmdline: &str) -> CommandSpec {
        self.config
            .command_spec(cmdline)
            .working_dir(self.working_dir.clone())
            .env_snapshot(self.env.snapshot())
    }

    pub async fn spawn(&mut self, label: &str, cmdline: &str) -> Result<&mut dyn ProcessControl> {
        self.spawn_with(label, cmdline, RunOptions::default()).await
    }

    /// Start `cmdline` and register it under `label`
    ///
    /// A command that cannot be launched is not registered.
    pub async fn spawn_with(
        &mut self,
        label: &str,
        cmdline: &str,
        options: RunOptions,
    ) -> Result<&mut dyn ProcessControl> {
        let mut spec = self.command_spec(cmdline).force_shell(options.force_shell);
        if let Some(timeout) = options.exit_timeout {
            spec = spec.exit_timeout(timeout);
        }
        if let Some(io_wait) = options.io_wait {
            spec = spec.io_wait(io_wait);
        }
        if let Some(dir) = options.working_dir {
            spec = spec.working_dir(self.working_dir.join(dir));
        }
        if !options.env.is_empty() {
            let mut env = self.env.clone();
            for (key, value) in options.env {
                env.set(key, value);
            }
            spec = spec.env_snapshot(env.snapshot());
        }

        let mut handle = ProcessHandle::new(label, spec)
            .with_diagnostics(self.diagnostics.clone())
            .with_hooks(self.hooks.clone());
        handle.run().await?;

        self.registry.register(label, Box::new(handle));
        self.registry.last_mut()
    }

    /// Spawn and wait for the command to finish
    pub async fn execute(&mut self, label: &str, cmdline: &str) -> Result<ProcessOutcome> {
        let handle = self.spawn(label, cmdline).await?;
        Ok(handle.stop().await?)
    }

    /// Ok when the latest `label` exited with status zero
    pub fn expect_completed(&self, label: &str) -> Result<ProcessOutcome> {
        let outcome = self.registry.get_by_label(label)?.outcome();
        check_completed(label, &outcome)?;
        Ok(outcome)
    }

    /// Kill everything still running
    pub async fn teardown(&mut self) -> Result<()> {
        self.registry.terminate_all().await
    }
}

impl std::fmt::Debug for Scenario {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scenario")
            .field("working_dir", &self.working_dir)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}
