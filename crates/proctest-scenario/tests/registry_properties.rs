//! Property tests for the process registry

use std::time::Duration;

use async_trait::async_trait;
use proctest_process::{ProcessControl, ProcessOutcome, ProcessState, Result, StreamKind};
use proctest_scenario::ProcessRegistry;
use proptest::prelude::*;

/// Finished process with fixed output
struct Recorded {
    label: String,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
}

#[async_trait]
impl ProcessControl for Recorded {
    fn label(&self) -> &str {
        &self.label
    }

    fn pid(&self) -> Option<u32> {
        None
    }

    fn state(&self) -> ProcessState {
        ProcessState::Exited
    }

    async fn run(&mut self) -> Result<()> {
        Ok(())
    }

    async fn write(&mut self, _bytes: &[u8]) -> Result<()> {
        Ok(())
    }

    fn close_stream(&mut self, _stream: StreamKind) {}

    async fn stop(&mut self) -> Result<ProcessOutcome> {
        Ok(self.outcome())
    }

    async fn terminate(&mut self) -> Result<ProcessOutcome> {
        Ok(self.outcome())
    }

    fn stdout(&self) -> Vec<u8> {
        self.stdout.clone()
    }

    fn stderr(&self) -> Vec<u8> {
        self.stderr.clone()
    }

    fn output(&self) -> Vec<u8> {
        let mut out = self.stdout.clone();
        out.extend_from_slice(&self.stderr);
        out
    }

    fn exit_status(&self) -> Option<i32> {
        Some(0)
    }

    fn timed_out(&self) -> bool {
        false
    }

    fn outcome(&self) -> ProcessOutcome {
        ProcessOutcome {
            state: ProcessState::Exited,
            exit_status: Some(0),
            signal: None,
            timed_out: false,
            timeout: None,
            elapsed: Duration::ZERO,
        }
    }
}

fn arb_entry() -> impl Strategy<Value = (String, Vec<u8>, Vec<u8>)> {
    (
        "[a-d]",
        prop::collection::vec(any::<u8>(), 0..32),
        prop::collection::vec(any::<u8>(), 0..32),
    )
}

fn build(entries: &[(String, Vec<u8>, Vec<u8>)]) -> ProcessRegistry {
    let mut registry = ProcessRegistry::new();
    for (label, stdout, stderr) in entries {
        registry.register(
            label.clone(),
            Box::new(Recorded {
                label: label.clone(),
                stdout: stdout.clone(),
                stderr: stderr.clone(),
            }),
        );
    }
    registry
}

proptest! {
    #[test]
    fn prop_all_output_is_ordered_concatenation(entries in prop::collection::vec(arb_entry(), 0..12)) {
        let registry = build(&entries);

        let mut expected_out = Vec::new();
        let mut expected_err = Vec::new();
        let mut expected_all = Vec::new();
        for (_, stdout, stderr) in &entries {
            expected_out.extend_from_slice(stdout);
            expected_err.extend_from_slice(stderr);
            expected_all.extend_from_slice(stdout);
            expected_all.extend_from_slice(stderr);
        }

        prop_assert_eq!(registry.len(), entries.len());
        prop_assert_eq!(registry.all_stdout(), expected_out);
        prop_assert_eq!(registry.all_stderr(), expected_err);
        prop_assert_eq!(registry.all_output(), expected_all);
    }

    #[test]
    fn prop_label_lookup_returns_latest(entries in prop::collection::vec(arb_entry(), 1..12)) {
        let registry = build(&entries);

        for label in ["a", "b", "c", "d"] {
            let latest = entries.iter().rev().find(|(l, _, _)| l == label);
            match latest {
                Some((_, stdout, _)) => {
                    prop_assert_eq!(&registry.stdout_from(label).unwrap(), stdout);
                }
                None => prop_assert!(registry.get_by_label(label).is_err()),
            }
        }

        let (_, last_stdout, _) = entries.last().unwrap();
        prop_assert_eq!(&registry.last().unwrap().stdout(), last_stdout);
    }

    #[test]
    fn prop_labels_preserve_registration_order(entries in prop::collection::vec(arb_entry(), 0..12)) {
        let registry = build(&entries);
        let labels: Vec<&str> = registry.labels().collect();
        let expected: Vec<&str> = entries.iter().map(|(l, _, _)| l.as_str()).collect();
        prop_assert_eq!(labels, expected);
    }
}
