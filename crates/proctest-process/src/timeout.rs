//! Exit-timeout and io-wait deadline policy
//!
//! The controller holds no clock of its own. `stop` feeds it the spawn instant
//! and the supervisor's last-activity timestamp and sleeps until
//! [`TimeoutController::next_wakeup`].

use std::time::Duration;

use tokio::time::Instant;

use crate::state::TimeoutKind;

/// Stand-in horizon for durations too large to add to an `Instant`
const FAR_FUTURE: Duration = Duration::from_secs(60 * 60 * 24 * 365);

/// Deadline policy for one running handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutController {
    exit_timeout: Duration,
    io_wait: Duration,
}

impl TimeoutController {
    pub fn new(exit_timeout: Duration, io_wait: Duration) -> Self {
        Self {
            exit_timeout,
            io_wait,
        }
    }

    pub fn exit_timeout(&self) -> Duration {
        self.exit_timeout
    }

    pub fn io_wait(&self) -> Duration {
        self.io_wait
    }

    /// Same exit-timeout, different io-wait budget
    pub fn with_io_wait(self, io_wait: Duration) -> Self {
        Self { io_wait, ..self }
    }

    pub fn exit_deadline(&self, started: Instant) -> Instant {
        deadline(started, self.exit_timeout)
    }

    pub fn idle_deadline(&self, last_activity: Instant) -> Instant {
        deadline(last_activity, self.io_wait)
    }

    /// Deadline that has passed at `now`, if any. Exit-timeout wins a tie.
    pub fn check(&self, started: Instant, last_activity: Instant, now: Instant) -> Option<TimeoutKind> {
        if now >= self.exit_deadline(started) {
            Some(TimeoutKind::Exit)
        } else if now >= self.idle_deadline(last_activity) {
            Some(TimeoutKind::IoWait)
        } else {
            None
        }
    }

    /// Earliest instant at which [`check`](Self::check) can change its answer
    pub fn next_wakeup(&self, started: Instant, last_activity: Instant) -> Instant {
        self.exit_deadline(started)
            .min(self.idle_deadline(last_activity))
    }
}

/// `base + after`, saturating instead of panicking on overflow
pub(crate) fn deadline(base: Instant, after: Duration) -> Instant {
    base.checked_add(after)
        .unwrap_or_else(|| base + FAR_FUTURE)
}
