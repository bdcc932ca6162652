//! Harness configuration
//!
//! Loaded from an optional TOML file layered under `PROCTEST_*` environment
//! variables, e.g. `PROCTEST_EXIT_TIMEOUT_SECS=5` or
//! `PROCTEST_HOOKS__BEFORE_SPAWN="make build"`.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    time::Duration,
};

use config::{Config, Environment, File};
use proctest_process::{CommandSpec, ShellHooks};
use serde::{Deserialize, Serialize};

use crate::error::{Result, ScenarioError};

const ENV_PREFIX: &str = "PROCTEST";

/// Defaults applied to every command a scenario spawns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    pub exit_timeout_secs: u64,
    pub io_wait_secs: u64,
    pub kill_grace_ms: u64,
    /// Starting directory; the current directory when unset
    pub working_dir: Option<PathBuf>,
    /// Seed the environment store from the harness's own environment
    pub inherit_env: bool,
    /// Applied on top of the inherited (or empty) environment
    pub env: BTreeMap<String, String>,
    pub hooks: HookConfig,
    pub log_level: Option<String>,
}

/// Shell commands run around each spawn
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HookConfig {
    pub before_spawn: Option<String>,
    pub after_spawn: Option<String>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            exit_timeout_secs: 30,
            io_wait_secs: 10,
            kill_grace_ms: 200,
            working_dir: None,
            inherit_env: true,
            env: BTreeMap::new(),
            hooks: HookConfig::default(),
            log_level: None,
        }
    }
}

impl HarnessConfig {
    pub fn exit_timeout(&self) -> Duration {
        Duration::from_secs(self.exit_timeout_secs)
    }

    pub fn io_wait(&self) -> Duration {
        Duration::from_secs(self.io_wait_secs)
    }

    pub fn kill_grace(&self) -> Duration {
        Duration::from_millis(self.kill_grace_ms)
    }

    /// Base spec for `cmdline` carrying these defaults
    pub fn command_spec(&self, cmdline: impl Into<String>) -> CommandSpec {
        CommandSpec::new(cmdline)
            .exit_timeout(self.exit_timeout())
            .io_wait(self.io_wait())
            .kill_grace(self.kill_grace())
    }

    pub fn shell_hooks(&self) -> ShellHooks {
        ShellHooks::new(self.hooks.before_spawn.clone(), self.hooks.after_spawn.clone())
    }

    pub fn validate(&self) -> Result<()> {
        if self.exit_timeout_secs == 0 {
            return Err(ScenarioError::Config(
                "exit_timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.io_wait_secs == 0 {
            return Err(ScenarioError::Config(
                "io_wait_secs must be greater than 0".to_string(),
            ));
        }
        if let Some(ref dir) = self.working_dir {
            if !dir.is_dir() {
                return Err(ScenarioError::Config(format!(
                    "working_dir {} is not a directory",
                    dir.display()
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct EnvSection {
    env: BTreeMap<String, toml::Value>,
}

/// Reads and writes [`HarnessConfig`]
pub struct ConfigLoader {
    config_path: PathBuf,
    env_prefix: String,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::with_path(Self::default_path())
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: path.into(),
            env_prefix: ENV_PREFIX.to_string(),
        }
    }

    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// `<config dir>/proctest/config.toml`
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("proctest")
            .join("config.toml")
    }

    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Missing file means defaults; environment overrides the file
    pub fn load(&self) -> Result<HarnessConfig> {
        let builder = Config::builder()
            .add_source(File::from(self.config_path.clone()).required(false))
            .add_source(
                Environment::with_prefix(&self.env_prefix)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        let mut config: HarnessConfig = builder.build()?.try_deserialize()?;
        // `config` lowercases keys; variable names must keep their case
        config.env = self.load_env_table()?;
        config.validate()?;
        Ok(config)
    }

    /// `[env]` from the file, then `<PREFIX>_ENV__<NAME>` variables, names verbatim
    fn load_env_table(&self) -> Result<BTreeMap<String, String>> {
        let mut env = BTreeMap::new();

        if self.config_path.is_file() {
            let text = std::fs::read_to_string(&self.config_path)?;
            let section: EnvSection = toml::from_str(&text)?;
            env.extend(section.env.into_iter().map(|(key, value)| {
                let value = match value {
                    toml::Value::String(s) => s,
                    other => other.to_string(),
                };
                (key, value)
            }));
        }

        let prefix = format!("{}_ENV__", self.env_prefix);
        for (key, value) in std::env::vars() {
            match key.strip_prefix(&prefix) {
                Some(name) if !name.is_empty() => {
                    env.insert(name.to_string(), value);
                }
                _ => {}
            }
        }

        Ok(env)
    }

    pub fn save(&self, config: &HarnessConfig) -> Result<()> {
        let toml = toml::to_string_pretty(config)?;
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.config_path, toml)?;
        Ok(())
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
