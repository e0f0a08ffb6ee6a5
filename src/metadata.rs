//! Scheduling metadata — what a task hands back at every suspension
//!
//! A task expresses its wish as a [`Suspend`] request. The engine stamps it
//! with the time the suspension was observed, producing a fresh
//! [`Metadata`] that replaces the previous one.

use core::fmt;
use core::time::Duration;

use crate::condition::WaitCondition;
use crate::time::Instant;

/// Suspension request produced by a task
#[derive(Clone, Copy, Default)]
pub enum Suspend<'w> {
    /// No explicit timing, ready again on the next pass
    #[default]
    Now,
    /// Ready as soon as the condition is reached
    WaitFor(&'w dyn WaitCondition),
    /// Ready no earlier than `after` from now
    Delay {
        after: Duration,
        /// Advisory only, never used for ordering
        expected: Duration,
    },
}

impl<'w> Suspend<'w> {
    pub const fn now() -> Self {
        Suspend::Now
    }

    pub const fn wait_for(condition: &'w dyn WaitCondition) -> Self {
        Suspend::WaitFor(condition)
    }

    pub const fn delay(after: Duration) -> Self {
        Suspend::Delay {
            after,
            expected: Duration::ZERO,
        }
    }

    pub const fn delay_expecting(after: Duration, expected: Duration) -> Self {
        Suspend::Delay { after, expected }
    }
}

impl fmt::Debug for Suspend<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Suspend::Now => write!(f, "Now"),
            Suspend::WaitFor(_) => write!(f, "WaitFor(..)"),
            Suspend::Delay { after, expected } => f
                .debug_struct("Delay")
                .field("after", after)
                .field("expected", expected)
                .finish(),
        }
    }
}

/// Timing and blocking state captured at the most recent suspension
#[derive(Clone, Copy)]
pub struct Metadata<'w> {
    pub last_run: Instant,
    pub next_run: Instant,
    /// Diagnostic hint from the task author
    pub expected_duration: Duration,
    pub wait_condition: Option<&'w dyn WaitCondition>,
}

impl<'w> Metadata<'w> {
    /// State of a task that has not run yet: due immediately
    pub const fn initial() -> Self {
        Self {
            last_run: Instant::ZERO,
            next_run: Instant::ZERO,
            expected_duration: Duration::ZERO,
            wait_condition: None,
        }
    }

    /// Turn a suspension request observed at `now` into metadata
    pub fn stamp(request: Suspend<'w>, now: Instant) -> Self {
        match request {
            Suspend::Now => Self {
                last_run: now,
                next_run: now,
                expected_duration: Duration::ZERO,
                wait_condition: None,
            },
            Suspend::WaitFor(condition) => Self {
                last_run: now,
                next_run: now,
                expected_duration: Duration::ZERO,
                wait_condition: Some(condition),
            },
            Suspend::Delay { after, expected } => Self {
                last_run: now,
                next_run: now + after,
                expected_duration: expected,
                wait_condition: None,
            },
        }
    }

    /// Due at `now`
    pub fn is_due(&self, now: Instant) -> bool {
        self.next_run <= now
    }

    pub fn is_waiting(&self) -> bool {
        self.wait_condition.is_some()
    }

    /// Due and not blocked by its condition
    pub fn is_runnable(&self, now: Instant) -> bool {
        self.is_due(now)
            && self
                .wait_condition
                .map_or(true, |condition| condition.condition_reached())
    }
}

impl Default for Metadata<'_> {
    fn default() -> Self {
        Self::initial()
    }
}

impl fmt::Debug for Metadata<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Metadata")
            .field("last_run", &self.last_run)
            .field("next_run", &self.next_run)
            .field("expected_duration", &self.expected_duration)
            .field("waiting", &self.is_waiting())
            .finish()
    }
}
