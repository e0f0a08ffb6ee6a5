//! Wait conditions — predicates a task can block on
//!
//! A task suspends with a reference to a condition; the scheduler re-asks
//! [`WaitCondition::condition_reached`] on every pass and only resumes the
//! task once it answers `true`. Conditions never cache their answer.
//!
//! All primitives here coordinate turn-taking between cooperatively
//! scheduled tasks. Atomics keep them usable from `static` items; they are
//! not a substitute for real cross-core exclusion.

use core::fmt;
use core::sync::atomic::{AtomicBool, Ordering};

/// Boolean predicate a task may block on
pub trait WaitCondition {
    /// Evaluated fresh on every call
    fn condition_reached(&self) -> bool;
}

/// Single-slot cooperative mutex
///
/// The condition is reached while the mutex is unlocked. There is no owner
/// check: any task may `unlock`, including one that never locked it.
pub struct Mutex {
    locked: AtomicBool,
}

impl Mutex {
    pub const fn new() -> Self {
        Self {
            locked: AtomicBool::new(false),
        }
    }

    /// Transition unlocked → locked
    ///
    /// Returns true only when this call performed the transition.
    pub fn try_lock(&self) -> bool {
        self.locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    /// Like [`Mutex::try_lock`], but releases the lock when the guard drops
    pub fn try_guard(&self) -> Option<MutexGuard<'_>> {
        if self.try_lock() {
            Some(MutexGuard { mutex: self })
        } else {
            None
        }
    }

    /// Reset to unlocked, whoever holds it
    pub fn unlock(&self) {
        self.locked.store(false, Ordering::Release);
    }

    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Acquire)
    }
}

impl Default for Mutex {
    fn default() -> Self {
        Self::new()
    }
}

impl WaitCondition for Mutex {
    fn condition_reached(&self) -> bool {
        !self.is_locked()
    }
}

impl fmt::Debug for Mutex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mutex").field("locked", &self.is_locked()).finish()
    }
}

/// Held lock on a [`Mutex`]
#[must_use = "dropping the guard unlocks the mutex immediately"]
pub struct MutexGuard<'m> {
    mutex: &'m Mutex,
}

impl MutexGuard<'_> {
    /// Unlock now
    pub fn release(self) {}
}

impl Drop for MutexGuard<'_> {
    fn drop(&mut self) {
        self.mutex.unlock();
    }
}

/// Boolean wait-for object, reached while set
pub struct Flag {
    value: AtomicBool,
}

impl Flag {
    pub const fn new(initial: bool) -> Self {
        Self {
            value: AtomicBool::new(initial),
        }
    }

    pub fn set(&self) {
        self.value.store(true, Ordering::Release);
    }

    pub fn clear(&self) {
        self.value.store(false, Ordering::Release);
    }

    pub fn is_set(&self) -> bool {
        self.value.load(Ordering::Acquire)
    }
}

impl Default for Flag {
    fn default() -> Self {
        Self::new(false)
    }
}

impl WaitCondition for Flag {
    fn condition_reached(&self) -> bool {
        self.is_set()
    }
}

impl fmt::Debug for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Flag").field("set", &self.is_set()).finish()
    }
}

/// Closure adapter: `FnCondition::new(|| queue.len() > 0)`
pub struct FnCondition<F> {
    predicate: F,
}

impl<F: Fn() -> bool> FnCondition<F> {
    pub const fn new(predicate: F) -> Self {
        Self { predicate }
    }
}

impl<F: Fn() -> bool> WaitCondition for FnCondition<F> {
    fn condition_reached(&self) -> bool {
        (self.predicate)()
    }
}
