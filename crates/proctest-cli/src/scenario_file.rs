// YAML scenario files
//
// ```yaml
// working_dir: ./fixtures
// env:
//   LANG: C
// steps:
//   - label: greet
//     cmd: echo hi
//   - label: server
//     cmd: ./server --stdio
//     stdin: "quit\n"
//     io_wait: 2
//     expect_status: 3
//   - label: stuck
//     cmd: sleep 60
//     exit_timeout: 0.5
//     expect_timeout: true
// ```

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{bail, Context, Result};
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioFile {
    /// Relative to the scenario file's directory
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Step {
    pub label: String,
    pub cmd: String,
    /// Written to stdin before waiting
    #[serde(default)]
    pub stdin: Option<String>,
    /// Seconds
    #[serde(default)]
    pub exit_timeout: Option<f64>,
    /// Seconds
    #[serde(default)]
    pub io_wait: Option<f64>,
    #[serde(default)]
    pub expect_status: i32,
    /// The step passes only if a timeout fires
    #[serde(default)]
    pub expect_timeout: bool,
}

impl Step {
    pub fn exit_timeout(&self) -> Result<Option<Duration>> {
        seconds(&self.label, "exit_timeout", self.exit_timeout)
    }

    pub fn io_wait(&self) -> Result<Option<Duration>> {
        seconds(&self.label, "io_wait", self.io_wait)
    }
}

impl ScenarioFile {
    pub fn parse(text: &str) -> Result<Self> {
        let file: ScenarioFile = serde_yaml::from_str(text).context("invalid scenario file")?;
        file.validate()?;
        Ok(file)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let mut file = Self::parse(&text).with_context(|| path.display().to_string())?;

        let base = path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        file.working_dir = Some(match file.working_dir.take() {
            Some(dir) => base.join(dir),
            None => base.to_path_buf(),
        });
        Ok(file)
    }

    fn validate(&self) -> Result<()> {
        if self.steps.is_empty() {
            bail!("scenario has no steps");
        }
        for step in &self.steps {
            if step.label.trim().is_empty() {
                bail!("step `{}` has an empty label", step.cmd);
            }
            if step.cmd.trim().is_empty() {
                bail!("step `{}` has an empty command", step.label);
            }
            step.exit_timeout()?;
            step.io_wait()?;
        }
        Ok(())
    }
}

fn seconds(label: &str, field: &str, value: Option<f64>) -> Result<Option<Duration>> {
    match value {
        None => Ok(None),
        Some(secs) if secs.is_finite() && secs > 0.0 => Ok(Some(Duration::from_secs_f64(secs))),
        Some(secs) => bail!("step `{}`: {} must be positive, got {}", label, field, secs),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_steps_with_defaults() {
        let file = ScenarioFile::parse(
            r#"
steps:
  - label: greet
    cmd: echo hi
  - label: stuck
    cmd: sleep 60
    exit_timeout: 0.5
    expect_timeout: true
"#,
        )
        .unwrap();

        assert_eq!(file.steps.len(), 2);
        assert_eq!(file.steps[0].expect_status, 0);
        assert!(!file.steps[0].expect_timeout);
        assert_eq!(file.steps[0].exit_timeout().unwrap(), None);
        assert_eq!(
            file.steps[1].exit_timeout().unwrap(),
            Some(Duration::from_millis(500))
        );
    }

    #[test]
    fn test_rejects_bad_files() {
        assert!(ScenarioFile::parse("steps: []").is_err());
        assert!(ScenarioFile::parse("steps:\n  - label: a\n    cmd: ''\n").is_err());
        assert!(ScenarioFile::parse("steps:\n  - label: a\n    cmd: x\n    io_wait: 0\n").is_err());
        assert!(ScenarioFile::parse("steps:\n  - label: a\n    cmd: x\n    retries: 3\n").is_err());
    }

    #[test]
    fn test_load_resolves_working_dir() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("smoke.yaml");
        std::fs::write(&path, "working_dir: data\nsteps:\n  - label: a\n    cmd: 'true'\n").unwrap();

        let file = ScenarioFile::load(&path).unwrap();
        assert_eq!(file.working_dir, Some(dir.path().join("data")));
    }
}
