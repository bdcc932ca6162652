//! Diagnostics sink
//!
//! Purely observational: announcements describe what is about to run and are
//! never consulted for control decisions. The sink is an explicit context
//! value handed to handles and scenarios.

use std::fmt;

use parking_lot::Mutex;
use tracing::info;

use crate::config::CommandSpec;

/// What an announcement is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnnouncementKind {
    Directory,
    Command,
    Environment,
    Timeout,
}

impl fmt::Display for AnnouncementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AnnouncementKind::Directory => "directory",
            AnnouncementKind::Command => "command",
            AnnouncementKind::Environment => "environment",
            AnnouncementKind::Timeout => "timeout",
        };
        f.write_str(name)
    }
}

/// One labelled diagnostic value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Announcement {
    pub kind: AnnouncementKind,
    pub label: String,
    pub value: String,
}

impl Announcement {
    pub fn new(kind: AnnouncementKind, label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            kind,
            label: label.into(),
            value: value.into(),
        }
    }
}

/// Receiver of announcements
pub trait Diagnostics: Send + Sync {
    fn announce(&self, announcement: Announcement);
}

/// Emits announcements as structured `tracing` events
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingDiagnostics;

impl Diagnostics for TracingDiagnostics {
    fn announce(&self, announcement: Announcement) {
        info!(
            kind = %announcement.kind,
            label = %announcement.label,
            value = %announcement.value,
            "announce"
        );
    }
}

/// Discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NullDiagnostics;

impl Diagnostics for NullDiagnostics {
    fn announce(&self, _announcement: Announcement) {}
}

/// Keeps every announcement in memory, for tests and reports
#[derive(Debug, Default)]
pub struct RecordingDiagnostics {
    records: Mutex<Vec<Announcement>>,
}

impl RecordingDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<Announcement> {
        self.records.lock().clone()
    }

    pub fn of_kind(&self, kind: AnnouncementKind) -> Vec<Announcement> {
        self.records
            .lock()
            .iter()
            .filter(|a| a.kind == kind)
            .cloned()
            .collect()
    }
}

impl Diagnostics for RecordingDiagnostics {
    fn announce(&self, announcement: Announcement) {
        self.records.lock().push(announcement);
    }
}

/// The four announcements made before a spawn
pub(crate) fn announce_spawn(sink: &dyn Diagnostics, label: &str, spec: &CommandSpec) {
    let directory = match spec.working_dir {
        Some(ref dir) => dir.display().to_string(),
        None => std::env::current_dir()
            .map(|dir| dir.display().to_string())
            .unwrap_or_else(|_| ".".to_string()),
    };
    sink.announce(Announcement::new(AnnouncementKind::Directory, label, directory));
    sink.announce(Announcement::new(
        AnnouncementKind::Command,
        label,
        spec.cmdline.clone(),
    ));
    sink.announce(Announcement::new(
        AnnouncementKind::Environment,
        label,
        describe_env(spec),
    ));
    sink.announce(Announcement::new(
        AnnouncementKind::Timeout,
        label,
        format!(
            "exit={}s io-wait={}s",
            spec.exit_timeout.as_secs_f64(),
            spec.io_wait.as_secs_f64()
        ),
    ));
}

fn describe_env(spec: &CommandSpec) -> String {
    match spec.env {
        None => "<inherited>".to_string(),
        Some(ref env) => env
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(" "),
    }
}
