//! Storage policies — container strategy and idle hook for the engine
//!
//! The scheduler never names a container type. It asks its
//! [`StoragePolicy`] for one per registry, so the same engine runs on a
//! fixed-capacity, allocation-free table ([`StaticConf`]) or on growable
//! vectors ([`DynamicConf`], feature `alloc`). A scheduler is committed to
//! one policy for its whole life.

use core::time::Duration;

use crate::condition::WaitCondition;
use crate::task::TaskRef;

/// Default task registry capacity for [`StaticConf`]
pub const MAX_TASKS: usize = 10;
/// Default waitable-object registry capacity for [`StaticConf`]
pub const MAX_WAITABLE_OBJECTS: usize = 10;
/// Default wait-for-object registry capacity for [`StaticConf`]
pub const MAX_WAIT_OBJECTS: usize = 10;

/// Pause used by [`IdleStrategy::default`] on hosts with `std`
pub const DEFAULT_IDLE: Duration = Duration::from_millis(10);

/// Ordered collection of non-owning references
///
/// `push` hands the item back when a bounded container is full and leaves
/// the contents untouched.
pub trait Registry<T> {
    fn push(&mut self, item: T) -> Result<(), T>;

    /// Order-preserving removal; panics if `index` is out of bounds
    fn remove(&mut self, index: usize) -> T;

    fn as_slice(&self) -> &[T];

    fn as_mut_slice(&mut self) -> &mut [T];

    fn clear(&mut self);

    /// `None` for growable containers
    fn capacity(&self) -> Option<usize>;

    fn len(&self) -> usize {
        self.as_slice().len()
    }

    fn is_empty(&self) -> bool {
        self.as_slice().is_empty()
    }

    fn is_full(&self) -> bool {
        self.capacity().is_some_and(|capacity| self.len() >= capacity)
    }
}

impl<T, const N: usize> Registry<T> for heapless::Vec<T, N> {
    fn push(&mut self, item: T) -> Result<(), T> {
        heapless::Vec::push(self, item)
    }

    fn remove(&mut self, index: usize) -> T {
        heapless::Vec::remove(self, index)
    }

    fn as_slice(&self) -> &[T] {
        heapless::Vec::as_slice(self)
    }

    fn as_mut_slice(&mut self) -> &mut [T] {
        heapless::Vec::as_mut_slice(self)
    }

    fn clear(&mut self) {
        heapless::Vec::clear(self)
    }

    fn capacity(&self) -> Option<usize> {
        Some(N)
    }
}

#[cfg(feature = "alloc")]
impl<T> Registry<T> for alloc::vec::Vec<T> {
    fn push(&mut self, item: T) -> Result<(), T> {
        alloc::vec::Vec::push(self, item);
        Ok(())
    }

    fn remove(&mut self, index: usize) -> T {
        alloc::vec::Vec::remove(self, index)
    }

    fn as_slice(&self) -> &[T] {
        alloc::vec::Vec::as_slice(self)
    }

    fn as_mut_slice(&mut self) -> &mut [T] {
        alloc::vec::Vec::as_mut_slice(self)
    }

    fn clear(&mut self) {
        alloc::vec::Vec::clear(self)
    }

    fn capacity(&self) -> Option<usize> {
        None
    }
}

/// What the run loop does after a pass with no work
#[derive(Debug, Clone, Copy)]
pub enum IdleStrategy {
    /// Block the thread for a fixed time
    #[cfg(feature = "std")]
    Sleep(Duration),
    /// Spin-loop hint, returns immediately
    Spin,
    /// Platform hook, e.g. `cortex_m::asm::wfi`
    Hook(fn()),
    /// Return immediately
    None,
}

impl IdleStrategy {
    pub fn run(&self) {
        match self {
            #[cfg(feature = "std")]
            IdleStrategy::Sleep(pause) => std::thread::sleep(*pause),
            IdleStrategy::Spin => core::hint::spin_loop(),
            IdleStrategy::Hook(hook) => hook(),
            IdleStrategy::None => {}
        }
    }
}

impl Default for IdleStrategy {
    #[cfg(feature = "std")]
    fn default() -> Self {
        IdleStrategy::Sleep(DEFAULT_IDLE)
    }

    #[cfg(not(feature = "std"))]
    fn default() -> Self {
        IdleStrategy::Spin
    }
}

/// Container strategy bundle injected into the scheduler
pub trait StoragePolicy {
    type Tasks<'t, 'w>: Registry<TaskRef<'t, 'w>> + Default
    where
        'w: 't;
    type WaitableObjects<'w>: Registry<&'w dyn WaitCondition> + Default;
    type WaitForObjects<'w>: Registry<&'w dyn WaitCondition> + Default;
    /// Per-pass scratch list of task indices; must hold as many entries as
    /// `Tasks` can
    type Candidates: Registry<usize> + Default;

    /// Called by the run loop after a pass that did no work
    fn idle(&mut self);
}

/// Fixed-capacity, allocation-free storage
///
/// Capacities are fixed at build time: `StaticConf<16, 4, 4>`.
#[derive(Debug, Clone, Copy)]
pub struct StaticConf<
    const TASKS: usize = MAX_TASKS,
    const WAITABLE: usize = MAX_WAITABLE_OBJECTS,
    const WAIT_FOR: usize = MAX_WAIT_OBJECTS,
> {
    idle: IdleStrategy,
}

impl<const TASKS: usize, const WAITABLE: usize, const WAIT_FOR: usize>
    StaticConf<TASKS, WAITABLE, WAIT_FOR>
{
    pub fn new() -> Self {
        Self::with_idle(IdleStrategy::default())
    }

    pub const fn with_idle(idle: IdleStrategy) -> Self {
        Self { idle }
    }

    pub fn idle_strategy(&self) -> IdleStrategy {
        self.idle
    }
}

impl<const TASKS: usize, const WAITABLE: usize, const WAIT_FOR: usize> Default
    for StaticConf<TASKS, WAITABLE, WAIT_FOR>
{
    fn default() -> Self {
        Self::new()
    }
}

impl<const TASKS: usize, const WAITABLE: usize, const WAIT_FOR: usize> StoragePolicy
    for StaticConf<TASKS, WAITABLE, WAIT_FOR>
{
    type Tasks<'t, 'w> = heapless::Vec<TaskRef<'t, 'w>, TASKS> where 'w: 't;
    type WaitableObjects<'w> = heapless::Vec<&'w dyn WaitCondition, WAITABLE>;
    type WaitForObjects<'w> = heapless::Vec<&'w dyn WaitCondition, WAIT_FOR>;
    type Candidates = heapless::Vec<usize, TASKS>;

    fn idle(&mut self) {
        self.idle.run();
    }
}

/// Growable heap-backed storage
#[cfg(feature = "alloc")]
#[derive(Debug, Clone, Copy, Default)]
pub struct DynamicConf {
    idle: IdleStrategy,
}

#[cfg(feature = "alloc")]
impl DynamicConf {
    pub fn new() -> Self {
        Self::with_idle(IdleStrategy::default())
    }

    pub const fn with_idle(idle: IdleStrategy) -> Self {
        Self { idle }
    }

    pub fn idle_strategy(&self) -> IdleStrategy {
        self.idle
    }
}

#[cfg(feature = "alloc")]
impl StoragePolicy for DynamicConf {
    type Tasks<'t, 'w> = alloc::vec::Vec<TaskRef<'t, 'w>> where 'w: 't;
    type WaitableObjects<'w> = alloc::vec::Vec<&'w dyn WaitCondition>;
    type WaitForObjects<'w> = alloc::vec::Vec<&'w dyn WaitCondition>;
    type Candidates = alloc::vec::Vec<usize>;

    fn idle(&mut self) {
        self.idle.run();
    }
}
