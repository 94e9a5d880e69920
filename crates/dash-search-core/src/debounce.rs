//! Debounced propagation of draft text to the committed query.
//!
//! The controller owns exactly one timer slot. Every draft change replaces
//! whatever was in the slot, so only the most recent input can ever commit.
//! Time is supplied by the host: each operation has an `*_at(now)` form and
//! the host calls [`DebounceController::poll_at`] when
//! [`DebounceController::next_deadline`] passes.
//!
//! # Invariants
//!
//! - At most one commit per quiet window, carrying the latest draft.
//! - A deadline is inclusive: `poll_at(deadline)` fires.
//! - After [`DebounceController::teardown`] nothing is ever committed.

use std::time::{Duration, Instant};

use crate::query::QueryState;

/// The single outstanding commit timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingCommit {
    armed_at: Instant,
    deadline: Instant,
}

/// Holds draft and committed text and decides when a draft becomes a commit.
#[derive(Debug, Clone)]
pub struct DebounceController {
    quiet_period: Duration,
    state: QueryState,
    pending: Option<PendingCommit>,
    torn_down: bool,
    commit_count: u64,
}

impl DebounceController {
    #[must_use]
    pub fn new(quiet_period: Duration, initial: impl Into<String>) -> Self {
        Self {
            quiet_period,
            state: QueryState::new(initial),
            pending: None,
            torn_down: false,
            commit_count: 0,
        }
    }

    #[must_use]
    pub const fn quiet_period(&self) -> Duration {
        self.quiet_period
    }

    #[must_use]
    pub const fn state(&self) -> &QueryState {
        &self.state
    }

    #[must_use]
    pub fn draft_text(&self) -> &str {
        &self.state.draft_text
    }

    #[must_use]
    pub fn committed_text(&self) -> &str {
        &self.state.committed_text
    }

    /// Number of commits fired so far.
    #[must_use]
    pub const fn commit_count(&self) -> u64 {
        self.commit_count
    }

    #[must_use]
    pub const fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    #[must_use]
    pub const fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    /// When the outstanding timer fires, if any.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.map(|p| p.deadline)
    }

    /// Record a keystroke: update the draft immediately and restart the timer.
    ///
    /// If the previous timer had already elapsed by `now` but was never
    /// polled, it fires first and its commit is returned.
    pub fn on_draft_change_at(&mut self, text: impl Into<String>, now: Instant) -> Option<String> {
        if self.torn_down {
            tracing::debug!("draft change after teardown ignored");
            return None;
        }
        let overdue = self.poll_at(now);
        self.state.draft_text = text.into();
        let replaced = self.pending.replace(PendingCommit {
            armed_at: now,
            deadline: now + self.quiet_period,
        });
        if let Some(old) = replaced {
            tracing::trace!(
                waited_ms = duration_ms(now.saturating_duration_since(old.armed_at)),
                "debounce timer restarted"
            );
        }
        overdue
    }

    /// [`Self::on_draft_change_at`] using the wall clock.
    pub fn on_draft_change(&mut self, text: impl Into<String>) -> Option<String> {
        self.on_draft_change_at(text, Instant::now())
    }

    /// Fire the pending commit if its deadline has been reached.
    pub fn poll_at(&mut self, now: Instant) -> Option<String> {
        let pending = self.pending?;
        if now < pending.deadline {
            return None;
        }
        self.pending = None;
        Some(self.commit())
    }

    /// [`Self::poll_at`] using the wall clock.
    pub fn poll(&mut self) -> Option<String> {
        self.poll_at(Instant::now())
    }

    /// Commit the pending draft immediately (e.g. the user pressed Enter).
    pub fn flush(&mut self) -> Option<String> {
        self.pending.take()?;
        Some(self.commit())
    }

    /// Drop the pending commit without committing. Returns whether one was pending.
    pub fn cancel(&mut self) -> bool {
        let had = self.pending.take().is_some();
        if had {
            tracing::debug!(draft = %self.state.draft_text, "pending commit cancelled");
        }
        had
    }

    /// Cancel any pending commit and refuse all further input.
    pub fn teardown(&mut self) {
        self.cancel();
        self.torn_down = true;
    }

    fn commit(&mut self) -> String {
        self.state.committed_text.clone_from(&self.state.draft_text);
        self.commit_count += 1;
        tracing::debug!(
            query = %self.state.committed_text,
            commit = self.commit_count,
            "query committed"
        );
        self.state.committed_text.clone()
    }
}

#[allow(clippy::cast_possible_truncation)]
fn duration_ms(d: Duration) -> u64 {
    d.as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUIET: Duration = Duration::from_millis(200);

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn rapid_typing_commits_last_value_once() {
        let t0 = Instant::now();
        let mut c = DebounceController::new(QUIET, "");
        assert_eq!(c.on_draft_change_at("g", t0), None);
        assert_eq!(c.on_draft_change_at("gr", t0 + ms(50)), None);
        assert_eq!(c.on_draft_change_at("gra", t0 + ms(100)), None);
        assert_eq!(c.draft_text(), "gra");
        assert_eq!(c.committed_text(), "");

        assert_eq!(c.next_deadline(), Some(t0 + ms(300)));
        assert_eq!(c.poll_at(t0 + ms(299)), None);
        assert_eq!(c.poll_at(t0 + ms(300)).as_deref(), Some("gra"));
        assert_eq!(c.poll_at(t0 + ms(1000)), None);
        assert_eq!(c.committed_text(), "gra");
        assert_eq!(c.commit_count(), 1);
    }

    #[test]
    fn spaced_typing_commits_each_value() {
        let t0 = Instant::now();
        let mut c = DebounceController::new(QUIET, "");
        c.on_draft_change_at("a", t0);
        assert_eq!(c.poll_at(t0 + ms(200)).as_deref(), Some("a"));
        c.on_draft_change_at("ab", t0 + ms(250));
        assert_eq!(c.poll_at(t0 + ms(449)), None);
        assert_eq!(c.poll_at(t0 + ms(450)).as_deref(), Some("ab"));
        assert_eq!(c.commit_count(), 2);
    }

    #[test]
    fn overdue_timer_fires_before_rearm() {
        let t0 = Instant::now();
        let mut c = DebounceController::new(QUIET, "");
        c.on_draft_change_at("a", t0);
        // Host never polled; the next keystroke arrives after the deadline.
        let fired = c.on_draft_change_at("ab", t0 + ms(250));
        assert_eq!(fired.as_deref(), Some("a"));
        assert_eq!(c.committed_text(), "a");
        assert_eq!(c.next_deadline(), Some(t0 + ms(450)));
    }

    #[test]
    fn empty_string_is_a_valid_commit() {
        let t0 = Instant::now();
        let mut c = DebounceController::new(QUIET, "cpu");
        c.on_draft_change_at("", t0);
        assert_eq!(c.poll_at(t0 + QUIET).as_deref(), Some(""));
        assert_eq!(c.committed_text(), "");
    }

    #[test]
    fn teardown_cancels_pending_and_blocks_future_input() {
        let t0 = Instant::now();
        let mut c = DebounceController::new(QUIET, "");
        c.on_draft_change_at("mem", t0);
        c.teardown();
        assert!(c.is_torn_down());
        assert!(!c.is_pending());
        assert_eq!(c.poll_at(t0 + ms(10_000)), None);
        assert_eq!(c.on_draft_change_at("more", t0 + ms(20)), None);
        assert_eq!(c.poll_at(t0 + ms(20_000)), None);
        assert_eq!(c.committed_text(), "");
        assert_eq!(c.commit_count(), 0);
    }

    #[test]
    fn flush_commits_immediately() {
        let t0 = Instant::now();
        let mut c = DebounceController::new(QUIET, "");
        assert_eq!(c.flush(), None);
        c.on_draft_change_at("disk", t0);
        assert_eq!(c.flush().as_deref(), Some("disk"));
        assert!(!c.is_pending());
        assert_eq!(c.poll_at(t0 + QUIET), None);
    }

    #[test]
    fn cancel_keeps_draft_but_drops_commit() {
        let t0 = Instant::now();
        let mut c = DebounceController::new(QUIET, "");
        c.on_draft_change_at("net", t0);
        assert!(c.cancel());
        assert!(!c.cancel());
        assert_eq!(c.draft_text(), "net");
        assert!(c.state().is_dirty());
        assert_eq!(c.poll_at(t0 + QUIET), None);
    }

    #[test]
    fn zero_quiet_period_fires_on_next_poll() {
        let t0 = Instant::now();
        let mut c = DebounceController::new(Duration::ZERO, "");
        c.on_draft_change_at("x", t0);
        assert_eq!(c.poll_at(t0).as_deref(), Some("x"));
    }
}
