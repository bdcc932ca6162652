//! Ordered registry of process handles
//!
//! An append-only arena of `(label, handle)` entries plus a table of the
//! latest index per label. Entries never move and are never removed before
//! the registry is dropped; reusing a label appends a new entry.

use std::collections::HashMap;

use proctest_process::{ProcessControl, ProcessOutcome};
use tracing::{debug, warn};

use crate::error::{Result, ScenarioError};

struct Entry {
    label: String,
    handle: Box<dyn ProcessControl>,
}

/// Every process started during one scenario, in start order
#[derive(Default)]
pub struct ProcessRegistry {
    entries: Vec<Entry>,
    latest: HashMap<String, usize>,
}

impl ProcessRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a handle; returns its position
    pub fn register(&mut self, label: impl Into<String>, handle: Box<dyn ProcessControl>) -> usize {
        let label = label.into();
        let index = self.entries.len();
        debug!(label = %label, index = index, "Registering process");

        self.latest.insert(label.clone(), index);
        self.entries.push(Entry { label, handle });
        index
    }

    /// Handle from the most recent entry with `label`
    pub fn get_by_label(&self, label: &str) -> Result<&dyn ProcessControl> {
        let index = self.index_of(label)?;
        Ok(self.entries[index].handle.as_ref())
    }

    pub fn get_by_label_mut(&mut self, label: &str) -> Result<&mut dyn ProcessControl> {
        let index = self.index_of(label)?;
        Ok(self.entries[index].handle.as_mut())
    }

    /// Most recently registered handle, whatever its label
    pub fn last(&self) -> Result<&dyn ProcessControl> {
        self.entries
            .last()
            .map(|entry| entry.handle.as_ref())
            .ok_or(ScenarioError::Empty)
    }

    pub fn last_mut(&mut self) -> Result<&mut dyn ProcessControl> {
        match self.entries.last_mut() {
            Some(entry) => Ok(entry.handle.as_mut()),
            None => Err(ScenarioError::Empty),
        }
    }

    /// Combined output of the latest invocation under `label`
    pub fn output_from(&self, label: &str) -> Result<Vec<u8>> {
        Ok(self.get_by_label(label)?.output())
    }

    pub fn stdout_from(&self, label: &str) -> Result<Vec<u8>> {
        Ok(self.get_by_label(label)?.stdout())
    }

    pub fn stderr_from(&self, label: &str) -> Result<Vec<u8>> {
        Ok(self.get_by_label(label)?.stderr())
    }

    /// stdout of every entry, in registration order, no separators
    pub fn all_stdout(&self) -> Vec<u8> {
        self.concat(|handle| handle.stdout())
    }

    pub fn all_stderr(&self) -> Vec<u8> {
        self.concat(|handle| handle.stderr())
    }

    pub fn all_output(&self) -> Vec<u8> {
        self.concat(|handle| handle.output())
    }

    /// Exit status of the last handle
    pub fn last_exit_status(&self) -> Result<i32> {
        let handle = self.last()?;
        let state = handle.state();
        match handle.exit_status() {
            Some(status) if state.is_terminal() => Ok(status),
            _ => Err(ScenarioError::NoExitStatus {
                label: handle.label().to_string(),
                state,
            }),
        }
    }

    /// `stop` every handle in registration order
    ///
    /// Terminal handles are no-ops. A failing entry does not keep later ones
    /// from being stopped; the first error is returned at the end.
    pub async fn stop_all(&mut self) -> Result<Vec<ProcessOutcome>> {
        let mut outcomes = Vec::with_capacity(self.entries.len());
        let mut first_error = None;

        for entry in &mut self.entries {
            match entry.handle.stop().await {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    warn!(label = %entry.label, error = %e, "Failed to stop process");
                    outcomes.push(entry.handle.outcome());
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e.into()),
            None => Ok(outcomes),
        }
    }

    /// `terminate` every handle in registration order; terminal ones are no-ops
    pub async fn terminate_all(&mut self) -> Result<()> {
        let mut first_error = None;

        for entry in &mut self.entries {
            if let Err(e) = entry.handle.terminate().await {
                warn!(label = %entry.label, error = %e, "Failed to terminate process");
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    /// Current outcome of every entry, in registration order
    pub fn outcomes(&self) -> Vec<(String, ProcessOutcome)> {
        self.entries
            .iter()
            .map(|entry| (entry.label.clone(), entry.handle.outcome()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Labels in registration order, repeats included
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.label.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &dyn ProcessControl)> {
        self.entries
            .iter()
            .map(|entry| (entry.label.as_str(), entry.handle.as_ref()))
    }

    fn index_of(&self, label: &str) -> Result<usize> {
        self.latest
            .get(label)
            .copied()
            .ok_or_else(|| ScenarioError::NotFound(label.to_string()))
    }

    fn concat(&self, read: impl Fn(&dyn ProcessControl) -> Vec<u8>) -> Vec<u8> {
        self.entries
            .iter()
            .flat_map(|entry| read(entry.handle.as_ref()))
            .collect()
    }
}

impl std::fmt::Debug for ProcessRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(
                self.entries
                    .iter()
                    .map(|entry| (&entry.label, entry.handle.state())),
            )
            .finish()
    }
}
