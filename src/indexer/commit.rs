//! Commit debouncing for the monitor's outer transaction.

use std::time::{Duration, Instant};

/// Default wait between the first pending change and its durable commit.
pub const DEFAULT_COMMIT_WAIT: Duration = Duration::from_secs(5);

/// Decides when buffered index writes are committed.
///
/// The first event after an idle period arms the timer. Any later event, or a
/// periodic tick, that finds the timer armed for at least `wait` asks for a
/// commit and disarms it. A burst of events therefore costs one commit per
/// window, and no change stays uncommitted much longer than one window plus
/// one tick.
#[derive(Debug)]
pub struct CommitDebouncer {
    wait: Duration,
    armed_at: Option<Instant>,
}

impl CommitDebouncer {
    pub fn new(wait: Duration) -> Self {
        Self {
            wait,
            armed_at: None,
        }
    }

    /// Record an applied event. Returns true when a commit is due.
    pub fn on_event(&mut self, now: Instant) -> bool {
        match self.armed_at {
            None => {
                self.armed_at = Some(now);
                false
            }
            Some(_) => self.on_tick(now),
        }
    }

    /// Periodic check without new activity. Returns true when a commit is due.
    pub fn on_tick(&mut self, now: Instant) -> bool {
        match self.armed_at {
            Some(armed) if now.saturating_duration_since(armed) >= self.wait => {
                self.armed_at = None;
                true
            }
            _ => false,
        }
    }

    /// Disarm and report whether anything was pending, for shutdown.
    pub fn flush(&mut self) -> bool {
        self.armed_at.take().is_some()
    }

    pub fn is_pending(&self) -> bool {
        self.armed_at.is_some()
    }
}

impl Default for CommitDebouncer {
    fn default() -> Self {
        Self::new(DEFAULT_COMMIT_WAIT)
    }
}
