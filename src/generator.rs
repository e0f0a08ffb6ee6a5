//! Async-backed tasks
//!
//! The body is an ordinary `async` block that suspends by awaiting the
//! futures handed out by [`Co`]. Each such await parks the body exactly
//! once; the request travels back to [`Generator::resume`] through a
//! [`Slot`] that both sides borrow. No allocation and no executor: the
//! future is polled with a no-op waker, only ever from `resume`.
//!
//! ```ignore
//! let slot = Slot::new();
//! let task = pin!(Generator::new(&slot, |co| async move {
//!     loop {
//!         blink();
//!         co.sleep(Duration::from_millis(500)).await;
//!     }
//! }));
//! ```
//!
//! Helper `async fn`s that take the same `Co` suspend on behalf of their
//! caller, so a task can delegate a stretch of its life to a sub-routine
//! and pick up where it left off.

use core::cell::Cell;
use core::future::Future;
use core::pin::Pin;
use core::task::{Context, Poll, Waker};
use core::time::Duration;

use log::warn;
use pin_project_lite::pin_project;

use crate::condition::{Mutex, MutexGuard, WaitCondition};
use crate::error::TaskFault;
use crate::metadata::{Metadata, Suspend};
use crate::task::{Task, TaskState};
use crate::time::Clock;

/// Hand-off cell between a body and its [`Generator`]
pub struct Slot<'w> {
    request: Cell<Option<Suspend<'w>>>,
}

impl<'w> Slot<'w> {
    pub const fn new() -> Self {
        Self {
            request: Cell::new(None),
        }
    }
}

impl Default for Slot<'_> {
    fn default() -> Self {
        Self::new()
    }
}

/// Suspension handle given to a generator body
#[derive(Clone, Copy)]
pub struct Co<'w> {
    slot: &'w Slot<'w>,
}

impl<'w> Co<'w> {
    /// Park once with an explicit request
    pub fn suspend(&self, request: Suspend<'w>) -> Suspension<'w> {
        Suspension {
            slot: self.slot,
            request: Some(request),
        }
    }

    /// Ready again on the next pass
    pub fn yield_now(&self) -> Suspension<'w> {
        self.suspend(Suspend::now())
    }

    pub fn sleep(&self, after: Duration) -> Suspension<'w> {
        self.suspend(Suspend::delay(after))
    }

    pub fn sleep_expecting(&self, after: Duration, expected: Duration) -> Suspension<'w> {
        self.suspend(Suspend::delay_expecting(after, expected))
    }

    /// Park until `condition` is reached
    ///
    /// The scheduler skips the task while the condition is false, so the
    /// body resumes with the condition observed true. It may have changed
    /// again by the time the body acts on it.
    pub fn wait_for(&self, condition: &'w dyn WaitCondition) -> Suspension<'w> {
        self.suspend(Suspend::wait_for(condition))
    }

    /// Take `mutex`, blocking on it between attempts
    pub async fn lock(&self, mutex: &'w Mutex) -> MutexGuard<'w> {
        loop {
            if let Some(guard) = mutex.try_guard() {
                return guard;
            }
            self.wait_for(mutex).await;
        }
    }
}

/// Future returned by [`Co`]: pending once, then ready
#[must_use = "a suspension does nothing unless awaited"]
pub struct Suspension<'w> {
    slot: &'w Slot<'w>,
    request: Option<Suspend<'w>>,
}

impl Future for Suspension<'_> {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<()> {
        match self.request.take() {
            Some(request) => {
                self.slot.request.set(Some(request));
                Poll::Pending
            }
            None => Poll::Ready(()),
        }
    }
}

pin_project! {
    /// [`Task`] driving an `async` body
    pub struct Generator<'w, F> {
        slot: &'w Slot<'w>,
        // Dropped in place once the body finishes
        #[pin]
        future: Option<F>,
        state: TaskState,
        metadata: Metadata<'w>,
    }
}

impl<'w, F> Generator<'w, F>
where
    F: Future<Output = Result<(), TaskFault>>,
{
    /// Build the body future without polling it
    pub fn new<B>(slot: &'w Slot<'w>, body: B) -> Self
    where
        B: FnOnce(Co<'w>) -> F,
    {
        Self {
            slot,
            future: Some(body(Co { slot })),
            state: TaskState::NotStarted,
            metadata: Metadata::initial(),
        }
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    /// Whether the body frame is still alive
    pub fn has_frame(&self) -> bool {
        self.future.is_some()
    }
}

impl<'w, F> Task<'w> for Generator<'w, F>
where
    F: Future<Output = Result<(), TaskFault>>,
{
    fn resume(self: Pin<&mut Self>, clock: &dyn Clock) -> Result<(), TaskFault> {
        let mut this = self.project();

        let running = match this.future.as_mut().as_pin_mut() {
            Some(running) => running,
            None => panic!("task resumed after completion"),
        };

        this.slot.request.set(None);
        let mut cx = Context::from_waker(Waker::noop());

        match running.poll(&mut cx) {
            Poll::Pending => {
                let request = this.slot.request.take().unwrap_or_else(|| {
                    warn!("task body awaited a foreign future; treating it as an immediate yield");
                    Suspend::now()
                });
                *this.metadata = Metadata::stamp(request, clock.now());
                *this.state = TaskState::Suspended;
                Ok(())
            }
            Poll::Ready(outcome) => {
                this.future.set(None);
                *this.state = match outcome {
                    Ok(()) => TaskState::Completed,
                    Err(_) => TaskState::Faulted,
                };
                outcome
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
