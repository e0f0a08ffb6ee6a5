//! co-scheduler — cooperative task scheduler for constrained targets
//!
//! Many lightweight suspendable tasks on one thread, woken by timers and
//! by wait conditions:
//! - Tasks are resumable computations that report [`Metadata`] each time
//!   they suspend ([`Generator`] for `async` bodies, [`Machine`] for
//!   hand-rolled state machines)
//! - Tasks may block on any [`WaitCondition`], e.g. a cooperative [`Mutex`]
//! - One pass resumes every due task, condition-gated ones first
//! - Storage is a policy: fixed-capacity and allocation-free
//!   ([`StaticConf`]) or growable ([`DynamicConf`], feature `alloc`)
//!
//! No preemption, no parallelism, no cancellation from outside a task.

#![no_std]

#[cfg(feature = "alloc")]
extern crate alloc;
#[cfg(any(feature = "std", test))]
extern crate std;

pub mod condition;
pub mod error;
pub mod generator;
pub mod metadata;
pub mod scheduler;
pub mod storage;
pub mod task;
pub mod time;

pub use condition::{Flag, FnCondition, Mutex, MutexGuard, WaitCondition};
pub use error::{Error, RegistryKind, Result, TaskFault};
pub use generator::{Co, Generator, Slot, Suspension};
pub use metadata::{Metadata, Suspend};
pub use scheduler::{Scheduler, Stats};
#[cfg(feature = "alloc")]
pub use storage::DynamicConf;
pub use storage::{IdleStrategy, Registry, StaticConf, StoragePolicy};
pub use task::{Coroutine, Machine, Step, Task, TaskRef, TaskState};
#[cfg(feature = "std")]
pub use time::StdClock;
pub use time::{Clock, Instant, SysTimer};
