// Subcommand implementations

use std::{
    borrow::Cow,
    io::Write,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use proctest_process::{ProcessOutcome, ProcessState};
use proctest_scenario::{check_completed, HarnessConfig, RunOptions, Scenario};
use tracing::{info, warn};

use crate::{
    output::{OutputStyle, StepVerdict},
    scenario_file::{ScenarioFile, Step},
};

/// Exit code for a hung command, as coreutils `timeout` uses
pub const EXIT_HUNG: i32 = 124;

/// `proctest exec`
pub async fn exec(
    config: HarnessConfig,
    timeout: Option<f64>,
    io_wait: Option<f64>,
    cwd: Option<PathBuf>,
    cmdline: &[String],
) -> Result<i32> {
    let line = join_cmdline(cmdline);
    let mut scenario = Scenario::new(config)?;
    if let Some(dir) = cwd {
        scenario.chdir(&dir)?;
    }

    let options = RunOptions {
        exit_timeout: positive_secs("--timeout", timeout)?,
        io_wait: positive_secs("--io-wait", io_wait)?,
        ..Default::default()
    };
    let handle = scenario
        .spawn_with("exec", &line, options)
        .await
        .with_context(|| format!("failed to start `{}`", line))?;
    let outcome = handle.stop().await?;

    std::io::stdout().write_all(&handle.stdout())?;
    std::io::stderr().write_all(&handle.stderr())?;

    info!(state = %outcome.state, status = ?outcome.exit_status, "Command finished");
    Ok(exit_code(&outcome))
}

/// `proctest run`
pub async fn run(config: HarnessConfig, path: &Path, style: &OutputStyle) -> Result<i32> {
    let file = ScenarioFile::load(path)?;
    let mut scenario = Scenario::new(config)?;
    if let Some(ref dir) = file.working_dir {
        scenario.chdir(dir)?;
    }
    for (key, value) in &file.env {
        scenario.env_mut().set(key.clone(), value.clone());
    }

    let mut passed = 0;
    for step in &file.steps {
        let verdict = run_step(&mut scenario, step).await?;
        if verdict.passed() {
            passed += 1;
        }
        println!("{}", style.step(&step.label, &verdict));
    }
    scenario.teardown().await?;

    println!("{}", style.summary(passed, file.steps.len()));
    Ok(if passed == file.steps.len() { 0 } else { 1 })
}

async fn run_step(scenario: &mut Scenario, step: &Step) -> Result<StepVerdict> {
    let options = RunOptions {
        exit_timeout: step.exit_timeout()?,
        io_wait: step.io_wait()?,
        ..Default::default()
    };

    let handle = match scenario.spawn_with(&step.label, &step.cmd, options).await {
        Ok(handle) => handle,
        Err(e) => return Ok(StepVerdict::Failed(e.to_string())),
    };
    if let Some(ref input) = step.stdin {
        if let Err(e) = handle.write(input.as_bytes()).await {
            warn!(label = %step.label, error = %e, "Could not write step input");
        }
    }
    let outcome = handle.stop().await?;
    Ok(judge(step, &outcome))
}

/// Compare an outcome with what the step expects
pub fn judge(step: &Step, outcome: &ProcessOutcome) -> StepVerdict {
    if step.expect_timeout {
        return if outcome.timed_out {
            StepVerdict::Ok
        } else {
            StepVerdict::Failed(format!("expected a timeout, but it {}", outcome.state))
        };
    }

    if outcome.timed_out {
        let kind = outcome
            .timeout
            .map(|kind| kind.to_string())
            .unwrap_or_else(|| "timeout".to_string());
        return StepVerdict::Hung(format!(
            "{} after {:.1}s",
            kind,
            outcome.elapsed.as_secs_f64()
        ));
    }

    match (outcome.state, outcome.exit_status) {
        (ProcessState::Exited, Some(status)) if status == step.expect_status => StepVerdict::Ok,
        (ProcessState::Exited, Some(status)) => StepVerdict::Failed(format!(
            "exit status {}, expected {}",
            status, step.expect_status
        )),
        _ => match check_completed(&step.label, outcome) {
            Err(e) => StepVerdict::Failed(e.to_string()),
            Ok(()) => StepVerdict::Failed(format!("unexpected state {}", outcome.state)),
        },
    }
}

/// Process exit code mirroring the child's
pub fn exit_code(outcome: &ProcessOutcome) -> i32 {
    if outcome.timed_out {
        return EXIT_HUNG;
    }
    match (outcome.exit_status, outcome.signal) {
        (Some(status), _) => status,
        (None, Some(signal)) => 128 + signal,
        (None, None) => 1,
    }
}

/// One argument is taken as a full command line; several are quoted
pub fn join_cmdline(args: &[String]) -> String {
    match args {
        [single] => single.clone(),
        _ => args
            .iter()
            .map(|arg| quote(arg))
            .collect::<Vec<_>>()
            .join(" "),
    }
}

fn quote(arg: &str) -> Cow<'_, str> {
    let plain = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:,+@".contains(c));
    if plain {
        Cow::Borrowed(arg)
    } else {
        Cow::Owned(format!("'{}'", arg.replace('\'', r"'\''")))
    }
}

fn positive_secs(flag: &str, value: Option<f64>) -> Result<Option<Duration>> {
    match value {
        None => Ok(None),
        Some(secs) if secs.is_finite() && secs > 0.0 => Ok(Some(Duration::from_secs_f64(secs))),
        Some(secs) => anyhow::bail!("{} must be positive, got {}", flag, secs),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proctest_process::TimeoutKind;

    fn step(expect_status: i32, expect_timeout: bool) -> Step {
        Step {
            label: "s".to_string(),
            cmd: "true".to_string(),
            stdin: None,
            exit_timeout: None,
            io_wait: None,
            expect_status,
            expect_timeout,
        }
    }

    fn exited(status: i32) -> ProcessOutcome {
        ProcessOutcome {
            state: ProcessState::Exited,
            exit_status: Some(status),
            signal: None,
            timed_out: false,
            timeout: None,
            elapsed: Duration::from_millis(10),
        }
    }

    fn hung() -> ProcessOutcome {
        ProcessOutcome {
            state: ProcessState::TimedOut,
            exit_status: None,
            signal: Some(9),
            timed_out: true,
            timeout: Some(TimeoutKind::Exit),
            elapsed: Duration::from_secs(1),
        }
    }

    #[test]
    fn test_judge_status() {
        assert_eq!(judge(&step(0, false), &exited(0)), StepVerdict::Ok);
        assert_eq!(judge(&step(3, false), &exited(3)), StepVerdict::Ok);
        assert_eq!(
            judge(&step(0, false), &exited(2)),
            StepVerdict::Failed("exit status 2, expected 0".to_string())
        );
    }

    #[test]
    fn test_judge_timeouts() {
        assert_eq!(
            judge(&step(0, false), &hung()),
            StepVerdict::Hung("exit-timeout after 1.0s".to_string())
        );
        assert_eq!(judge(&step(0, true), &hung()), StepVerdict::Ok);
        assert!(!judge(&step(0, true), &exited(0)).passed());
    }

    #[test]
    fn test_exit_code() {
        assert_eq!(exit_code(&exited(7)), 7);
        assert_eq!(exit_code(&hung()), EXIT_HUNG);

        let killed = ProcessOutcome {
            state: ProcessState::Terminated,
            exit_status: None,
            signal: Some(15),
            ..exited(0)
        };
        assert_eq!(exit_code(&killed), 143);
    }

    #[test]
    fn test_join_cmdline() {
        assert_eq!(join_cmdline(&["echo a | wc -c".to_string()]), "echo a | wc -c");
        assert_eq!(
            join_cmdline(&["grep".to_string(), "two words".to_string(), "it's".to_string()]),
            r"grep 'two words' 'it'\''s'"
        );
        assert_eq!(join_cmdline(&["ls".to_string(), "-la".to_string()]), "ls -la");
    }
}
