//! Suspendable tasks — resumable computations the scheduler multiplexes
//!
//! A task runs from one suspension point to the next on each
//! [`Task::resume`] and leaves behind fresh [`Metadata`]. Its frame lives
//! wherever the application put it; the scheduler only borrows it through a
//! pinned [`TaskRef`].
//!
//! Two ways to write one:
//! - implement [`Coroutine`] on a struct holding the locals and wrap it in a
//!   [`Machine`] (no async, no allocation)
//! - write an `async` body against [`Co`](crate::generator::Co) and wrap it in a
//!   [`Generator`](crate::generator::Generator)

use core::pin::Pin;

use crate::error::TaskFault;
use crate::metadata::{Metadata, Suspend};
use crate::time::Clock;

/// Task lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Constructed, no code executed yet
    NotStarted,
    /// Parked at a suspension point with metadata
    Suspended,
    /// Ran to completion
    Completed,
    /// Ended with a fault; never resumable again
    Faulted,
}

impl TaskState {
    /// Completed or faulted
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Completed | TaskState::Faulted)
    }
}

/// Resumable computation
///
/// Once [`Task::is_done`] reports true it stays true, and `resume` must not
/// be called again; implementations panic if it is.
pub trait Task<'w> {
    /// Run to the next suspension point or to completion.
    ///
    /// A fault raised by the body is returned from this very call.
    fn resume(self: Pin<&mut Self>, clock: &dyn Clock) -> Result<(), TaskFault>;

    fn is_done(&self) -> bool;

    /// Metadata of the most recent suspension, [`Metadata::initial`] before
    /// the first resume.
    fn current_metadata(&self) -> Metadata<'w>;
}

/// Non-owning registration held by the scheduler
///
/// `'t` is how long the scheduler borrows the frame, `'w` is what the task
/// itself borrows (its wait conditions among them). Keeping them apart lets
/// the frame outlive the registration.
pub type TaskRef<'t, 'w> = Pin<&'t mut (dyn Task<'w> + 't)>;

/// Outcome of one [`Coroutine::step`]
#[derive(Debug, Clone, Copy)]
pub enum Step<'w> {
    Yield(Suspend<'w>),
    Complete,
}

/// Hand-rolled state machine body
///
/// Locals that must survive a suspension live in `self`.
pub trait Coroutine<'w> {
    fn step(&mut self) -> Result<Step<'w>, TaskFault>;
}

/// [`Task`] adapter for a [`Coroutine`]
///
/// The body is dropped as soon as it completes or faults.
pub struct Machine<'w, C> {
    body: Option<C>,
    state: TaskState,
    metadata: Metadata<'w>,
}

impl<'w, C: Coroutine<'w>> Machine<'w, C> {
    /// Prepares the body without running it
    pub const fn new(body: C) -> Self {
        Self {
            body: Some(body),
            state: TaskState::NotStarted,
            metadata: Metadata::initial(),
        }
    }

    pub fn state(&self) -> TaskState {
        self.state
    }
}

impl<'w, C: Coroutine<'w> + Unpin> Task<'w> for Machine<'w, C> {
    fn resume(self: Pin<&mut Self>, clock: &dyn Clock) -> Result<(), TaskFault> {
        let this = self.get_mut();
        let body = match this.body.as_mut() {
            Some(body) => body,
            None => panic!("task resumed after completion"),
        };

        match body.step() {
            Ok(Step::Yield(request)) => {
                this.metadata = Metadata::stamp(request, clock.now());
                this.state = TaskState::Suspended;
                Ok(())
            }
            Ok(Step::Complete) => {
                this.body = None;
                this.state = TaskState::Completed;
                Ok(())
            }
            Err(fault) => {
                this.body = None;
                this.state = TaskState::Faulted;
                Err(fault)
            }
        }
    }

    fn is_done(&self) -> bool {
        self.state.is_terminal()
    }

    fn current_metadata(&self) -> Metadata<'w> {
        self.metadata
    }
}
